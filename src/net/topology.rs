//! 拓扑图
//!
//! 节点与无向链路的 arena。每条链路在两端各占用一个本地端口，`up`
//! 状态两端共用，因此两个方向的启停总是一致的。路由计算只读这里的数据，
//! 运行时的队列、发送状态放在 `Network` 的有向 `Link` 上。

use std::collections::HashMap;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::id::{LinkId, NodeId, PortId};
use crate::sim::SimTime;

/// 节点类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// 端主机，只作为路由端点，不转发经过的流量
    Host,
    /// 数据中心内部交换机
    IntraSwitch,
    /// 数据中心互联交换机，运行拥塞感知选路
    DciSwitch,
}

impl NodeKind {
    pub fn is_switch(self) -> bool {
        !matches!(self, NodeKind::Host)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TopologyError {
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),
    #[error("self loop on node {0:?}")]
    SelfLoop(NodeId),
    #[error("link between {0:?} and {1:?} already exists")]
    DuplicateLink(NodeId, NodeId),
    #[error("link between {0:?} and {1:?} has zero bandwidth")]
    ZeroBandwidth(NodeId, NodeId),
    #[error("no link between {0:?} and {1:?}")]
    NoLink(NodeId, NodeId),
}

#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    /// 仅主机有地址
    pub ip: Option<Ipv4Addr>,
}

/// 无向链路属性
#[derive(Debug, Clone)]
pub struct LinkAttrs {
    pub a: NodeId,
    pub b: NodeId,
    pub a_port: PortId,
    pub b_port: PortId,
    pub up: bool,
    pub delay: SimTime,
    pub bandwidth_bps: u64,
}

impl LinkAttrs {
    /// 链路另一端
    pub fn peer(&self, of: NodeId) -> Option<NodeId> {
        if of == self.a {
            Some(self.b)
        } else if of == self.b {
            Some(self.a)
        } else {
            None
        }
    }

    /// `of` 一侧的本地端口
    pub fn port_of(&self, of: NodeId) -> Option<PortId> {
        if of == self.a {
            Some(self.a_port)
        } else if of == self.b {
            Some(self.b_port)
        } else {
            None
        }
    }
}

/// 节点的一个本地端口
#[derive(Debug, Clone, Copy)]
pub struct Port {
    pub neighbor: NodeId,
    pub link: LinkId,
}

#[derive(Debug, Default, Clone)]
pub struct Topology {
    nodes: Vec<NodeInfo>,
    ports: Vec<Vec<Port>>,
    links: Vec<LinkAttrs>,
    pairs: HashMap<(NodeId, NodeId), LinkId>,
}

/// 主机地址：11.0.x.y，由节点编号决定
pub fn node_id_to_ip(id: NodeId) -> Ipv4Addr {
    let id = id.0 as u32;
    Ipv4Addr::from(0x0b00_0001 + (id / 256) * 0x0001_0000 + (id % 256) * 0x0000_0100)
}

pub fn ip_to_node_id(ip: Ipv4Addr) -> NodeId {
    NodeId(((u32::from(ip) >> 8) & 0xffff) as usize)
}

impl Topology {
    pub fn add_node(&mut self, name: impl Into<String>, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        let ip = (kind == NodeKind::Host).then(|| node_id_to_ip(id));
        self.nodes.push(NodeInfo {
            id,
            name: name.into(),
            kind,
            ip,
        });
        self.ports.push(Vec::new());
        id
    }

    /// 新增一条双向链路，两端各分配一个端口。
    pub fn add_link(
        &mut self,
        a: NodeId,
        b: NodeId,
        delay: SimTime,
        bandwidth_bps: u64,
    ) -> Result<LinkId, TopologyError> {
        self.check_node(a)?;
        self.check_node(b)?;
        if a == b {
            return Err(TopologyError::SelfLoop(a));
        }
        if self.pairs.contains_key(&(a, b)) {
            return Err(TopologyError::DuplicateLink(a, b));
        }
        if bandwidth_bps == 0 {
            return Err(TopologyError::ZeroBandwidth(a, b));
        }

        let id = LinkId(self.links.len());
        let a_port = PortId(self.ports[a.0].len());
        let b_port = PortId(self.ports[b.0].len());
        self.ports[a.0].push(Port { neighbor: b, link: id });
        self.ports[b.0].push(Port { neighbor: a, link: id });
        self.links.push(LinkAttrs {
            a,
            b,
            a_port,
            b_port,
            up: true,
            delay,
            bandwidth_bps,
        });
        self.pairs.insert((a, b), id);
        self.pairs.insert((b, a), id);
        Ok(id)
    }

    /// 设置链路启停，返回状态是否真的发生了变化。
    pub fn set_link_up(&mut self, a: NodeId, b: NodeId, up: bool) -> Result<bool, TopologyError> {
        let id = self.link_between(a, b).ok_or(TopologyError::NoLink(a, b))?;
        let link = &mut self.links[id.0];
        let changed = link.up != up;
        link.up = up;
        Ok(changed)
    }

    fn check_node(&self, n: NodeId) -> Result<(), TopologyError> {
        if n.0 < self.nodes.len() {
            Ok(())
        } else {
            Err(TopologyError::UnknownNode(n))
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &NodeInfo {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> &[NodeInfo] {
        &self.nodes
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.nodes[id.0].kind
    }

    pub fn hosts(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Host)
            .map(|n| n.id)
    }

    pub fn host_by_ip(&self, ip: Ipv4Addr) -> Option<NodeId> {
        let id = ip_to_node_id(ip);
        let node = self.nodes.get(id.0)?;
        (node.ip == Some(ip)).then_some(id)
    }

    pub fn link(&self, id: LinkId) -> &LinkAttrs {
        &self.links[id.0]
    }

    pub fn links(&self) -> &[LinkAttrs] {
        &self.links
    }

    pub fn link_between(&self, a: NodeId, b: NodeId) -> Option<LinkId> {
        self.pairs.get(&(a, b)).copied()
    }

    pub fn ports(&self, n: NodeId) -> &[Port] {
        &self.ports[n.0]
    }

    pub fn port_towards(&self, from: NodeId, to: NodeId) -> Option<PortId> {
        let link = self.link_between(from, to)?;
        self.links[link.0].port_of(from)
    }

    /// `n` 所有处于 up 状态的邻居，按端口顺序
    pub fn up_neighbors(&self, n: NodeId) -> impl Iterator<Item = (NodeId, &LinkAttrs)> + '_ {
        self.ports[n.0].iter().filter_map(move |p| {
            let link = &self.links[p.link.0];
            link.up.then_some((p.neighbor, link))
        })
    }
}
