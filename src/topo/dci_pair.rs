//! 双数据中心互联拓扑构建

use crate::net::{NetWorld, NodeId, TopologyError};
use crate::sim::SimTime;

#[derive(Debug, Clone)]
pub struct DciPairOpts {
    pub hosts_per_dc: usize,
    /// 两台 DCI 交换机之间的并行广域路径数
    pub wan_paths: usize,
    pub host_link_gbps: u64,
    pub wan_link_gbps: u64,
    pub link_latency: SimTime,
    pub wan_latency: SimTime,
}

impl Default for DciPairOpts {
    fn default() -> Self {
        Self {
            hosts_per_dc: 4,
            wan_paths: 4,
            host_link_gbps: 100,
            wan_link_gbps: 100,
            link_latency: SimTime::from_micros(1),
            wan_latency: SimTime::from_micros(500),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DciPairTopology {
    pub left_hosts: Vec<NodeId>,
    pub right_hosts: Vec<NodeId>,
    pub left_tor: NodeId,
    pub right_tor: NodeId,
    pub dci_a: NodeId,
    pub dci_b: NodeId,
    /// 每条广域路径上的中继交换机
    pub wan: Vec<NodeId>,
}

/// 构建双数据中心拓扑
///
/// 拓扑结构：
/// a_h* <-> a_tor <-> dci_a <-> wan{0..n} <-> dci_b <-> b_tor <-> b_h*
///
/// 广域段的每条路径经过一台独立的中继交换机，因此 `dci_a` 到对端数据中心
/// 有 `wan_paths` 个等价下一跳。
pub fn build_dci_pair(world: &mut NetWorld, opts: &DciPairOpts) -> Result<DciPairTopology, TopologyError> {
    let net = &mut world.net;
    let gbps_to_bps = |g: u64| g.saturating_mul(1_000_000_000);
    let host_bps = gbps_to_bps(opts.host_link_gbps);
    let wan_bps = gbps_to_bps(opts.wan_link_gbps);

    let left_hosts: Vec<NodeId> = (0..opts.hosts_per_dc)
        .map(|i| net.add_host(format!("a_h{i}")))
        .collect();
    let right_hosts: Vec<NodeId> = (0..opts.hosts_per_dc)
        .map(|i| net.add_host(format!("b_h{i}")))
        .collect();
    let left_tor = net.add_switch("a_tor");
    let right_tor = net.add_switch("b_tor");
    let dci_a = net.add_dci_switch("dci_a");
    let dci_b = net.add_dci_switch("dci_b");
    let wan: Vec<NodeId> = (0..opts.wan_paths)
        .map(|i| net.add_switch(format!("wan{i}")))
        .collect();

    for &h in &left_hosts {
        net.connect(h, left_tor, opts.link_latency, host_bps)?;
    }
    for &h in &right_hosts {
        net.connect(h, right_tor, opts.link_latency, host_bps)?;
    }
    // 数据中心内部到 DCI 的汇聚链路按全部主机带宽之和配置，不成为瓶颈
    let uplink_bps = host_bps.saturating_mul(opts.hosts_per_dc.max(1) as u64);
    net.connect(left_tor, dci_a, opts.link_latency, uplink_bps)?;
    net.connect(right_tor, dci_b, opts.link_latency, uplink_bps)?;

    for &w in &wan {
        net.connect(dci_a, w, opts.wan_latency, wan_bps)?;
        net.connect(w, dci_b, opts.wan_latency, wan_bps)?;
    }

    Ok(DciPairTopology {
        left_hosts,
        right_hosts,
        left_tor,
        right_tor,
        dci_a,
        dci_b,
        wan,
    })
}
