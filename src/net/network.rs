//! 网络
//!
//! `Network` 持有拓扑、节点、有向出端口与当前安装的路由表，负责逐跳转发、
//! 串行化发送、链路启停后的路由重建以及统计。

use std::collections::BTreeMap;

use thiserror::Error;

use super::deliver_packet::DeliverPacket;
use super::hash::pick_index;
use super::id::{LinkId, NodeId, PortId};
use super::link::{Link, tx_time};
use super::link_ready::LinkReady;
use super::monitor::{LinkMonitor, LinkSample};
use super::node::{DciSwitch, Host, Node, Switch};
use super::packet::{FiveTuple, Packet};
use super::routing::RoutingTable;
use super::stats::Stats;
use super::topology::{NodeKind, Topology, TopologyError};
use crate::config::RoutingConfig;
use crate::sim::{SimTime, Simulator};
use tracing::{debug, info, trace, warn};

/// 转发失败原因；都不是致命错误，packet 被丢弃并计数。
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ForwardError {
    #[error("no route at node {at} towards {dst}")]
    NoRoute { at: NodeId, dst: NodeId },
    #[error("link {from} -> {to} is down")]
    LinkDown { from: NodeId, to: NodeId },
    #[error("egress queue {from} -> {to} is full")]
    QueueFull { from: NodeId, to: NodeId },
}

/// 转发记录：某节点在某时刻把某条流的 packet 发往哪个下一跳
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardRecord {
    pub t: SimTime,
    pub node: NodeId,
    pub flow_key: u64,
    pub next: NodeId,
}

pub struct Network {
    topo: Topology,
    nodes: Vec<Option<Box<dyn Node>>>,
    /// 下标为 `link * 2 + dir`，dir 0 表示 a -> b
    egress: Vec<Link>,
    routes: RoutingTable,
    routes_dirty: bool,
    config: RoutingConfig,
    next_pkt_id: u64,
    pub stats: Stats,
    forward_log: Option<Vec<ForwardRecord>>,
    monitor: Option<LinkMonitor>,
}

impl Default for Network {
    fn default() -> Self {
        Self::new(RoutingConfig::default())
    }
}

impl Network {
    pub fn new(config: RoutingConfig) -> Self {
        Self {
            topo: Topology::default(),
            nodes: Vec::new(),
            egress: Vec::new(),
            routes: RoutingTable::default(),
            routes_dirty: false,
            config,
            next_pkt_id: 0,
            stats: Stats::default(),
            forward_log: None,
            monitor: None,
        }
    }

    /// 添加主机节点
    pub fn add_host(&mut self, name: impl Into<String>) -> NodeId {
        let name = name.into();
        let id = self.topo.add_node(name.clone(), NodeKind::Host);
        self.push_node(Box::new(Host::new(id, name)))
    }

    /// 添加数据中心内部交换机
    pub fn add_switch(&mut self, name: impl Into<String>) -> NodeId {
        let name = name.into();
        let id = self.topo.add_node(name.clone(), NodeKind::IntraSwitch);
        self.push_node(Box::new(Switch::new(id, name)))
    }

    /// 添加 DCI 交换机
    pub fn add_dci_switch(&mut self, name: impl Into<String>) -> NodeId {
        let name = name.into();
        let id = self.topo.add_node(name.clone(), NodeKind::DciSwitch);
        let node = DciSwitch::new(id, name, &self.config);
        self.push_node(Box::new(node))
    }

    pub fn add_node(&mut self, name: impl Into<String>, kind: NodeKind) -> NodeId {
        match kind {
            NodeKind::Host => self.add_host(name),
            NodeKind::IntraSwitch => self.add_switch(name),
            NodeKind::DciSwitch => self.add_dci_switch(name),
        }
    }

    fn push_node(&mut self, node: Box<dyn Node>) -> NodeId {
        let id = node.id();
        debug_assert_eq!(id.0, self.nodes.len());
        self.nodes.push(Some(node));
        self.routes_dirty = true;
        id
    }

    /// 连接两个节点（一条双向链路，两个方向各有独立的出队列）
    pub fn connect(
        &mut self,
        a: NodeId,
        b: NodeId,
        latency: SimTime,
        bandwidth_bps: u64,
    ) -> Result<LinkId, TopologyError> {
        let id = self.topo.add_link(a, b, latency, bandwidth_bps)?;
        let attrs = self.topo.link(id).clone();
        let queue_bytes = self.config.egress_queue_bytes;
        self.egress
            .push(Link::new(id, attrs.a, attrs.b, attrs.a_port, queue_bytes));
        self.egress
            .push(Link::new(id, attrs.b, attrs.a, attrs.b_port, queue_bytes));

        for (node, port, peer) in [(a, attrs.a_port, b), (b, attrs.b_port, a)] {
            if let Some(n) = self.nodes[node.0].as_mut() {
                n.attach_port(port, peer, latency, bandwidth_bps);
            }
        }
        self.routes_dirty = true;
        debug!(link = id.0, a = a.0, b = b.0, bandwidth_bps, latency = %latency, "🔗 新增链路");
        Ok(id)
    }

    pub fn topology(&self) -> &Topology {
        &self.topo
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    pub fn node_name(&self, id: NodeId) -> &str {
        &self.topo.node(id).name
    }

    /// 重新计算全部路由并整体替换当前路由表。
    #[tracing::instrument(skip(self), fields(nodes = self.topo.len()))]
    pub fn build_routes(&mut self) {
        let table = RoutingTable::compute(&self.topo, self.config.payload_bytes);
        info!(
            entries = table.len(),
            max_rtt = %table.max_rtt(),
            max_bdp_bytes = table.max_bdp_bytes(),
            "🧭 路由表已安装"
        );
        self.routes = table;
        self.routes_dirty = false;
    }

    /// 拓扑有变化时才重新计算
    pub fn ensure_routes(&mut self) {
        if self.routes_dirty {
            self.build_routes();
        }
    }

    pub fn routes(&self) -> &RoutingTable {
        &self.routes
    }

    pub fn next_hops(&self, at: NodeId, dst: NodeId) -> Option<&[NodeId]> {
        self.routes.next_hops(at, dst)
    }

    /// 两台主机之间的 UDP 五元组
    pub fn flow_tuple(&self, src: NodeId, dst: NodeId, src_port: u16, dst_port: u16) -> Option<FiveTuple> {
        let src_ip = self.topo.node(src).ip?;
        let dst_ip = self.topo.node(dst).ip?;
        Some(FiveTuple::udp(src_ip, dst_ip, src_port, dst_port))
    }

    /// 创建数据包
    pub fn make_packet(
        &mut self,
        flow: FiveTuple,
        size_bytes: u32,
        src: NodeId,
        dst: NodeId,
        now: SimTime,
    ) -> Packet {
        let id = self.next_pkt_id;
        self.next_pkt_id = self.next_pkt_id.wrapping_add(1);
        Packet {
            id,
            flow,
            size_bytes,
            src,
            dst,
            hops_taken: 0,
            sent_at: now,
        }
    }

    /// 将数据包交付给节点处理
    #[tracing::instrument(level = "debug", skip(self, sim), fields(pkt_id = pkt.id, to = to.0))]
    pub fn deliver(&mut self, to: NodeId, pkt: Packet, sim: &mut Simulator) {
        self.ensure_routes();

        // 暂时把节点取出来，避免 &mut self 与 &mut node 的重叠借用。
        let mut node = self.nodes[to.0].take().expect("node exists");
        trace!(node_name = %node.name(), "取出节点");
        node.on_packet(pkt, sim, self);
        self.nodes[to.0] = Some(node);
    }

    fn ecmp_seed(&self, at: NodeId) -> u32 {
        self.config.ecmp_seed.unwrap_or(at.0 as u32)
    }

    /// 按五元组哈希在等价下一跳中选一个转发（主机与数据中心内部交换机）
    #[tracing::instrument(level = "debug", skip(self, pkt, sim), fields(pkt_id = pkt.id, at = at.0, dst = pkt.dst.0))]
    pub fn forward_ecmp(&mut self, at: NodeId, pkt: Packet, sim: &mut Simulator) {
        let next = match self.routes.next_hops(at, pkt.dst) {
            Some(hops) if !hops.is_empty() => {
                hops[pick_index(&pkt.flow.hash_bytes(), self.ecmp_seed(at), hops.len())]
            }
            _ => {
                let dst = pkt.dst;
                self.drop_packet(at, pkt, ForwardError::NoRoute { at, dst });
                return;
            }
        };
        self.transmit(at, next, pkt, sim);
    }

    fn egress_index(&self, from: NodeId, to: NodeId) -> Option<usize> {
        let link = self.topo.link_between(from, to)?;
        let dir = usize::from(self.topo.link(link).a != from);
        Some(link.0 * 2 + dir)
    }

    pub fn egress(&self, from: NodeId, to: NodeId) -> Option<&Link> {
        self.egress_index(from, to).map(|i| &self.egress[i])
    }

    pub fn egress_mut(&mut self, from: NodeId, to: NodeId) -> Option<&mut Link> {
        self.egress_index(from, to).map(|i| &mut self.egress[i])
    }

    /// 全部有向出端口
    pub fn egress_links(&self) -> impl Iterator<Item = &Link> {
        self.egress.iter()
    }

    /// 把 packet 放到 `from -> to` 的出端口上发送
    #[tracing::instrument(level = "debug", skip(self, pkt, sim), fields(pkt_id = pkt.id, from = from.0, to = to.0))]
    pub fn transmit(&mut self, from: NodeId, to: NodeId, pkt: Packet, sim: &mut Simulator) {
        let Some(idx) = self.egress_index(from, to) else {
            self.drop_packet(from, pkt, ForwardError::LinkDown { from, to });
            return;
        };
        if !self.topo.link(self.egress[idx].id).up {
            self.drop_packet(from, pkt, ForwardError::LinkDown { from, to });
            return;
        }

        if let Some(log) = self.forward_log.as_mut() {
            log.push(ForwardRecord {
                t: sim.now(),
                node: from,
                flow_key: pkt.flow_key(),
                next: to,
            });
        }

        if let Err(pkt) = self.egress[idx].queue.enqueue(pkt) {
            self.drop_packet(from, pkt, ForwardError::QueueFull { from, to });
            return;
        }
        let link = &self.egress[idx];
        trace!(queue_bytes = link.queue.bytes(), busy = link.busy, "入队");
        if !link.busy {
            self.start_tx(idx, sim);
        }
    }

    /// 出队一个 packet 开始串行化，发送结束时触发 `LinkReady`，再经过传播时延到达对端。
    fn start_tx(&mut self, idx: usize, sim: &mut Simulator) {
        let attrs = self.topo.link(self.egress[idx].id);
        let (delay, bandwidth_bps) = (attrs.delay, attrs.bandwidth_bps);
        let link = &mut self.egress[idx];
        let Some(pkt) = link.queue.dequeue() else {
            return;
        };

        let now = sim.now();
        let depart = now.saturating_add(tx_time(pkt.size_bytes, bandwidth_bps));
        let arrive = depart.saturating_add(delay);
        link.busy = true;
        link.busy_until = depart;
        link.tx_bytes += pkt.size_bytes as u64;
        trace!(now = %now, depart = %depart, arrive = %arrive, "计算传输时间");

        let to = link.to;
        sim.schedule(depart, LinkReady { egress: idx });
        sim.schedule(arrive, DeliverPacket { to, pkt: pkt.advance() });
    }

    pub(crate) fn on_link_ready(&mut self, idx: usize, sim: &mut Simulator) {
        let up = self.topo.link(self.egress[idx].id).up;
        let link = &mut self.egress[idx];
        link.busy = false;
        if up && !link.queue.is_empty() {
            self.start_tx(idx, sim);
        }
    }

    /// 数据包送达目的主机
    #[tracing::instrument(level = "debug", skip(self, pkt), fields(pkt_id = pkt.id, flow_key = pkt.flow_key()))]
    pub(crate) fn on_delivered(&mut self, pkt: Packet, now: SimTime) {
        debug!(
            size_bytes = pkt.size_bytes,
            hops_taken = pkt.hops_taken,
            latency = %now.saturating_sub(pkt.sent_at),
            "✅ 数据包送达目的地"
        );
        self.stats
            .record_delivery(pkt.flow_key(), pkt.size_bytes as u64, now);
    }

    pub(crate) fn drop_packet(&mut self, at: NodeId, pkt: Packet, reason: ForwardError) {
        self.stats.dropped_pkts += 1;
        self.stats.dropped_bytes += pkt.size_bytes as u64;
        match reason {
            ForwardError::NoRoute { .. } => {
                self.stats.no_route_drops += 1;
                warn!(at = at.0, pkt_id = pkt.id, flow_key = pkt.flow_key(), %reason, "丢弃数据包");
            }
            ForwardError::LinkDown { .. } => {
                self.stats.link_down_drops += 1;
                debug!(at = at.0, pkt_id = pkt.id, %reason, "丢弃数据包");
            }
            ForwardError::QueueFull { .. } => {
                self.stats.queue_drops += 1;
                debug!(at = at.0, pkt_id = pkt.id, %reason, "丢弃数据包");
            }
        }
    }

    /// 关闭 `a`、`b` 之间的链路：两个方向的排队 packet 全部丢弃，通知两端节点，
    /// 然后立即重建并安装新路由表。
    #[tracing::instrument(skip(self), fields(a = a.0, b = b.0))]
    pub fn set_link_down(&mut self, a: NodeId, b: NodeId) -> Result<(), TopologyError> {
        if !self.topo.set_link_up(a, b, false)? {
            return Ok(());
        }
        info!("⛔ 链路关闭");
        for (from, to) in [(a, b), (b, a)] {
            let Some(idx) = self.egress_index(from, to) else {
                continue;
            };
            for pkt in self.egress[idx].queue.drain() {
                self.drop_packet(from, pkt, ForwardError::LinkDown { from, to });
            }
            if let Some(node) = self.nodes[from.0].as_mut() {
                node.on_link_down(to);
            }
        }
        self.build_routes();
        Ok(())
    }

    /// 恢复链路并重建路由
    #[tracing::instrument(skip(self), fields(a = a.0, b = b.0))]
    pub fn set_link_up(&mut self, a: NodeId, b: NodeId) -> Result<(), TopologyError> {
        if !self.topo.set_link_up(a, b, true)? {
            return Ok(());
        }
        info!("链路恢复");
        self.build_routes();
        Ok(())
    }

    /// `node` 各个 up 端口的出队列占用
    pub fn port_buffers(&self, node: NodeId) -> BTreeMap<PortId, u64> {
        self.topo
            .ports(node)
            .iter()
            .filter(|p| self.topo.link(p.link).up)
            .filter_map(|p| {
                let idx = self.egress_index(node, p.neighbor)?;
                let link = &self.egress[idx];
                Some((link.port, link.queue.bytes()))
            })
            .collect()
    }

    pub fn dci_switch(&self, id: NodeId) -> Option<&DciSwitch> {
        self.nodes.get(id.0)?.as_deref()?.as_dci()
    }

    /// 源主机按网卡速率发包的间隔
    pub fn host_pacing_gap(&self, host: NodeId, bytes: u32) -> SimTime {
        self.topo
            .up_neighbors(host)
            .map(|(_, link)| link.bandwidth_bps)
            .max()
            .map(|bw| tx_time(bytes, bw))
            .unwrap_or(SimTime::from_micros(1))
    }

    /// 开启转发记录
    pub fn enable_forward_log(&mut self) {
        self.forward_log.get_or_insert_with(Vec::new);
    }

    pub fn forward_log(&self) -> &[ForwardRecord] {
        self.forward_log.as_deref().unwrap_or(&[])
    }

    /// 开启端口监测，由 `SampleLinks` 事件按 `interval` 采样
    pub fn enable_link_monitor(&mut self, interval: SimTime) {
        self.monitor = Some(LinkMonitor::new(interval));
    }

    pub fn link_monitor(&self) -> Option<&LinkMonitor> {
        self.monitor.as_ref()
    }

    /// 采样一次：DCI 出端口记录累计发送字节，所有交换机出端口记录队列长度。
    /// 返回下一次采样的间隔；未开启监测时返回 `None`。
    pub(crate) fn sample_links(&mut self, now: SimTime) -> Option<SimTime> {
        let monitor = self.monitor.as_mut()?;
        for link in &self.egress {
            let kind = self.topo.node(link.from).kind;
            if kind == NodeKind::Host {
                continue;
            }
            let queue_bytes = link.queue.bytes();
            monitor.add_qlen(link.from, link.port, queue_bytes);
            if kind == NodeKind::DciSwitch {
                monitor.push_sample(LinkSample {
                    t: now,
                    node: link.from,
                    peer: link.to,
                    port: link.port,
                    tx_bytes: link.tx_bytes,
                    queue_bytes,
                });
            }
        }
        trace!(now = %now, "端口采样");
        Some(monitor.interval())
    }
}
