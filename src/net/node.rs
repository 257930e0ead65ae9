//! 节点类型
//!
//! 定义网络节点，包括节点 trait 和具体实现（主机、数据中心内部交换机、DCI 交换机）。

use std::collections::BTreeMap;

use super::id::{NodeId, PortId};
use super::network::{ForwardError, Network};
use super::packet::Packet;
use super::topology::NodeKind;
use crate::config::RoutingConfig;
use crate::dci::{Candidate, CongestionMonitor, CostModel, PathSelector};
use crate::sim::{SimTime, Simulator};
use tracing::{debug, trace};

/// 节点接口
pub trait Node: Send {
    /// 获取节点标识符
    fn id(&self) -> NodeId;

    /// 获取节点名称
    fn name(&self) -> &str;

    fn kind(&self) -> NodeKind;

    /// 处理到达的数据包
    fn on_packet(&mut self, pkt: Packet, sim: &mut Simulator, net: &mut Network);

    /// 新链路接到本节点的 `port` 上
    fn attach_port(&mut self, _port: PortId, _peer: NodeId, _delay: SimTime, _bandwidth_bps: u64) {}

    /// 通往 `peer` 的链路被关闭
    fn on_link_down(&mut self, _peer: NodeId) {}

    fn as_dci(&self) -> Option<&DciSwitch> {
        None
    }
}

/// 主机节点
#[derive(Debug)]
pub struct Host {
    id: NodeId,
    name: String,
}

impl Host {
    /// 创建新主机
    pub fn new(id: NodeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl Node for Host {
    fn id(&self) -> NodeId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Host
    }

    #[tracing::instrument(level = "debug", skip(self, sim, net), fields(node_name = %self.name(), node_id = self.id.0, pkt_id = pkt.id))]
    fn on_packet(&mut self, pkt: Packet, sim: &mut Simulator, net: &mut Network) {
        if self.id == pkt.dst {
            net.on_delivered(pkt, sim.now());
        } else {
            trace!(dst = pkt.dst.0, "🖥️  Host 发出数据包");
            net.forward_ecmp(self.id, pkt, sim);
        }
    }
}

/// 数据中心内部交换机：按五元组哈希做普通 ECMP，不维护流表
#[derive(Debug)]
pub struct Switch {
    id: NodeId,
    name: String,
}

impl Switch {
    /// 创建新交换机
    pub fn new(id: NodeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl Node for Switch {
    fn id(&self) -> NodeId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::IntraSwitch
    }

    #[tracing::instrument(level = "debug", skip(self, sim, net), fields(node_name = %self.name(), node_id = self.id.0, pkt_id = pkt.id))]
    fn on_packet(&mut self, pkt: Packet, sim: &mut Simulator, net: &mut Network) {
        trace!(dst = pkt.dst.0, hops_taken = pkt.hops_taken, "🔀 Switch 处理数据包");
        if self.id == pkt.dst {
            net.on_delivered(pkt, sim.now());
        } else {
            net.forward_ecmp(self.id, pkt, sim);
        }
    }
}

/// 端口的静态链路特征
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortLink {
    pub port: PortId,
    pub delay: SimTime,
    pub bandwidth_bps: u64,
}

/// DCI 交换机：持有自己的选路器（拥塞监测、代价表、流亲和表）与各端口的链路特征。
#[derive(Debug)]
pub struct DciSwitch {
    id: NodeId,
    name: String,
    selector: PathSelector,
    /// 邻居 -> 端口与链路特征
    links: BTreeMap<NodeId, PortLink>,
}

impl DciSwitch {
    pub fn new(id: NodeId, name: impl Into<String>, cfg: &RoutingConfig) -> Self {
        let seed = cfg.ecmp_seed.unwrap_or(id.0 as u32);
        let selector = PathSelector::new(
            id,
            cfg.mode,
            seed,
            cfg.idle_timeout,
            CostModel::new(&cfg.cost),
            CongestionMonitor::new(cfg.smoothing_shift),
        );
        Self {
            id,
            name: name.into(),
            selector,
            links: BTreeMap::new(),
        }
    }

    pub fn selector(&self) -> &PathSelector {
        &self.selector
    }

    pub fn port_link(&self, peer: NodeId) -> Option<&PortLink> {
        self.links.get(&peer)
    }

    fn candidates(&self, next_hops: &[NodeId]) -> Vec<Candidate> {
        next_hops
            .iter()
            .filter_map(|nh| {
                let l = self.links.get(nh)?;
                Some(Candidate {
                    next_hop: *nh,
                    port: l.port,
                    delay: l.delay,
                    bandwidth_bps: l.bandwidth_bps,
                })
            })
            .collect()
    }
}

impl Node for DciSwitch {
    fn id(&self) -> NodeId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::DciSwitch
    }

    #[tracing::instrument(level = "debug", skip(self, sim, net), fields(node_name = %self.name(), node_id = self.id.0, pkt_id = pkt.id))]
    fn on_packet(&mut self, pkt: Packet, sim: &mut Simulator, net: &mut Network) {
        if self.id == pkt.dst {
            net.on_delivered(pkt, sim.now());
            return;
        }

        self.selector.set_max_rtt(net.routes().max_rtt());
        let candidates = match net.next_hops(self.id, pkt.dst) {
            Some(hops) => self.candidates(hops),
            None => Vec::new(),
        };
        let buffers = net.port_buffers(self.id);

        match self
            .selector
            .select(sim.now(), &pkt.flow, &candidates, &buffers)
        {
            Some(decision) => {
                trace!(next_hop = decision.next_hop.0, kind = ?decision.kind, "🌐 DCI 转发");
                net.transmit(self.id, decision.next_hop, pkt, sim);
            }
            None => {
                let (at, dst) = (self.id, pkt.dst);
                net.drop_packet(at, pkt, ForwardError::NoRoute { at, dst });
            }
        }
    }

    fn attach_port(&mut self, port: PortId, peer: NodeId, delay: SimTime, bandwidth_bps: u64) {
        self.links.insert(
            peer,
            PortLink {
                port,
                delay,
                bandwidth_bps,
            },
        );
    }

    fn on_link_down(&mut self, peer: NodeId) {
        let n = self.selector.affinity_mut().forget_next_hop(peer);
        if n > 0 {
            debug!(switch = self.id.0, peer = peer.0, flows = n, "链路关闭，清除相关流表项");
        }
    }

    fn as_dci(&self) -> Option<&DciSwitch> {
        Some(self)
    }
}
