//! 多路径路由计算
//!
//! 对每台主机 h 在 up 链路上做一次 BFS：
//! - 记录每个节点到 h 的最短跳数，凡满足 `dis[next] == dis[now] + 1` 的 `now`
//!   都是 `next` 朝向 h 的一个等价下一跳；
//! - 同时沿 BFS 携带所有路径变体的 (时延, 发送时延, 瓶颈带宽)，遍历结束后
//!   在每个节点上统一归约：先取最小时延，再在最小时延的路径中取最大瓶颈带宽。
//!
//! 只有交换机会被继续扩展，主机是叶子，流量不会穿越第三台主机。
//! 拓扑变化时整张表重新计算后再整体替换，不做增量修补。

use std::collections::HashMap;
use std::io::{self, Write};

use tracing::{debug, info};

use super::id::NodeId;
use super::topology::Topology;
use crate::sim::SimTime;

/// 默认报文负载，用于估算逐跳发送时延
pub const DEFAULT_PAYLOAD_BYTES: u32 = 1000;

/// 节点到目的主机的路径度量
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathMetric {
    /// 传播时延之和
    pub delay: SimTime,
    /// 固定负载的逐跳发送时延之和
    pub tx_delay: SimTime,
    /// 瓶颈带宽
    pub bandwidth_bps: u64,
    pub hops: u32,
}

impl PathMetric {
    /// `2 * delay + tx_delay`
    pub fn rtt(&self) -> SimTime {
        SimTime(
            self.delay
                .0
                .saturating_mul(2)
                .saturating_add(self.tx_delay.0),
        )
    }

    /// 带宽时延积（字节）
    pub fn bdp_bytes(&self) -> u64 {
        let bits = (self.rtt().0 as u128).saturating_mul(self.bandwidth_bps as u128) / 1_000_000_000;
        (bits / 8).min(u64::MAX as u128) as u64
    }
}

/// BFS 途中携带的一条路径变体
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PathVariant {
    delay: u64,
    tx_delay: u64,
    bandwidth_bps: u64,
}

impl PathVariant {
    const ORIGIN: PathVariant = PathVariant {
        delay: 0,
        tx_delay: 0,
        bandwidth_bps: u64::MAX,
    };

    fn extend(self, delay: SimTime, tx_delay: u64, bandwidth_bps: u64) -> PathVariant {
        PathVariant {
            delay: self.delay.saturating_add(delay.0),
            tx_delay: self.tx_delay.saturating_add(tx_delay),
            bandwidth_bps: self.bandwidth_bps.min(bandwidth_bps),
        }
    }
}

/// 逐跳发送时延：`payload * 8 * 1e9 / bandwidth`（纳秒，向下取整）
pub fn hop_tx_delay(payload_bytes: u32, bandwidth_bps: u64) -> u64 {
    if bandwidth_bps == 0 {
        return u64::MAX / 4;
    }
    let nanos = (payload_bytes as u128) * 8 * 1_000_000_000 / bandwidth_bps as u128;
    nanos.min(u64::MAX as u128) as u64
}

/// 最小时延优先，其次最大瓶颈带宽；同带宽时保留先出现的那条的发送时延。
fn reduce(variants: &[PathVariant], hops: u32) -> Option<PathMetric> {
    let min_delay = variants.iter().map(|v| v.delay).min()?;
    let mut best: Option<PathVariant> = None;
    for v in variants.iter().filter(|v| v.delay == min_delay) {
        if best.is_none_or(|b| v.bandwidth_bps > b.bandwidth_bps) {
            best = Some(*v);
        }
    }
    best.map(|b| PathMetric {
        delay: SimTime(b.delay),
        tx_delay: SimTime(b.tx_delay),
        bandwidth_bps: b.bandwidth_bps,
        hops,
    })
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RoutingTable {
    /// (当前节点, 目的主机) -> 等价下一跳，按节点编号排序
    next_hops: HashMap<(NodeId, NodeId), Vec<NodeId>>,
    /// (当前节点, 目的主机) -> 路径度量
    metrics: HashMap<(NodeId, NodeId), PathMetric>,
    hosts: Vec<NodeId>,
    max_rtt: SimTime,
    max_bdp_bytes: u64,
}

impl RoutingTable {
    /// 为拓扑中所有主机计算路由。
    #[tracing::instrument(skip(topo), fields(nodes = topo.len()))]
    pub fn compute(topo: &Topology, payload_bytes: u32) -> RoutingTable {
        let mut table = RoutingTable::default();
        table.hosts = topo.hosts().collect();
        for host in table.hosts.clone() {
            table.compute_towards(topo, host, payload_bytes);
        }
        table.max_rtt = table
            .host_pair_metrics()
            .map(|m| m.rtt())
            .max()
            .unwrap_or(SimTime::ZERO);
        table.max_bdp_bytes = table
            .host_pair_metrics()
            .map(|m| m.bdp_bytes())
            .max()
            .unwrap_or(0);
        info!(
            hosts = table.hosts.len(),
            entries = table.next_hops.len(),
            max_rtt = %table.max_rtt,
            "🧭 路由表计算完成"
        );
        table
    }

    fn compute_towards(&mut self, topo: &Topology, host: NodeId, payload_bytes: u32) {
        let n = topo.len();
        let mut dist: Vec<Option<u32>> = vec![None; n];
        let mut variants: Vec<Vec<PathVariant>> = vec![Vec::new(); n];
        let mut preds: Vec<Vec<NodeId>> = vec![Vec::new(); n];

        let mut queue = vec![host];
        dist[host.0] = Some(0);
        variants[host.0].push(PathVariant::ORIGIN);

        let mut head = 0;
        while head < queue.len() {
            let now = queue[head];
            head += 1;
            let Some(d) = dist[now.0] else { continue };
            let carried = variants[now.0].clone();

            for (next, link) in topo.up_neighbors(now) {
                match dist[next.0] {
                    None => {
                        dist[next.0] = Some(d + 1);
                        if topo.kind(next).is_switch() {
                            queue.push(next);
                        }
                    }
                    Some(dn) if dn == d + 1 => {}
                    Some(_) => continue,
                }

                let tx = hop_tx_delay(payload_bytes, link.bandwidth_bps);
                for v in &carried {
                    let nv = v.extend(link.delay, tx, link.bandwidth_bps);
                    // 相同三元组的变体归约结果一致，只保留一份
                    if !variants[next.0].contains(&nv) {
                        variants[next.0].push(nv);
                    }
                }
                if !preds[next.0].contains(&now) {
                    preds[next.0].push(now);
                }
            }
        }

        for (idx, hops) in dist.iter().enumerate() {
            let node = NodeId(idx);
            let Some(hops) = *hops else { continue };
            if node == host {
                continue;
            }
            let mut nh = std::mem::take(&mut preds[idx]);
            nh.sort();
            if let Some(metric) = reduce(&variants[idx], hops) {
                self.metrics.insert((node, host), metric);
            }
            self.next_hops.insert((node, host), nh);
        }
        debug!(host = ?host, reached = queue.len(), "BFS 完成");
    }

    /// `at` 朝向目的主机 `dst` 的等价下一跳
    pub fn next_hops(&self, at: NodeId, dst: NodeId) -> Option<&[NodeId]> {
        self.next_hops
            .get(&(at, dst))
            .map(|v| v.as_slice())
            .filter(|v| !v.is_empty())
    }

    pub fn metric(&self, at: NodeId, dst: NodeId) -> Option<PathMetric> {
        self.metrics.get(&(at, dst)).copied()
    }

    pub fn len(&self) -> usize {
        self.next_hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.next_hops.is_empty()
    }

    /// 主机对之间的最大 RTT
    pub fn max_rtt(&self) -> SimTime {
        self.max_rtt
    }

    /// 主机对之间的最大 BDP
    pub fn max_bdp_bytes(&self) -> u64 {
        self.max_bdp_bytes
    }

    /// 源主机到目的主机的 RTT
    pub fn pair_rtt(&self, src: NodeId, dst: NodeId) -> Option<SimTime> {
        self.metric(src, dst).map(|m| m.rtt())
    }

    fn host_pair_metrics(&self) -> impl Iterator<Item = &PathMetric> + '_ {
        self.metrics
            .iter()
            .filter(|((at, _), _)| self.hosts.binary_search(at).is_ok())
            .map(|(_, m)| m)
    }

    /// 按 (源, 目的) 排序的全部表项
    pub fn entries(&self) -> Vec<(NodeId, NodeId, &[NodeId])> {
        let mut out: Vec<_> = self
            .next_hops
            .iter()
            .map(|((at, dst), nh)| (*at, *dst, nh.as_slice()))
            .collect();
        out.sort_by_key(|(at, dst, _)| (*at, *dst));
        out
    }

    /// 导出 `src_id,dst_id,next_hop_id`，多个下一跳以 `;` 连接。
    pub fn write_csv<W: Write>(&self, mut w: W) -> io::Result<()> {
        writeln!(w, "src_id,dst_id,next_hop_id")?;
        for (at, dst, nh) in self.entries() {
            let hops: Vec<String> = nh.iter().map(|n| n.0.to_string()).collect();
            writeln!(w, "{},{},{}", at.0, dst.0, hops.join(";"))?;
        }
        Ok(())
    }
}
