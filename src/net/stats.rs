//! 统计信息
//!
//! 全网收发计数与按流的完成时间。

use std::collections::BTreeMap;

use super::id::NodeId;
use crate::sim::SimTime;

#[derive(Debug, Clone)]
pub struct FlowStats {
    pub src: NodeId,
    pub dst: NodeId,
    pub size_bytes: u64,
    pub delivered_bytes: u64,
    pub start: SimTime,
    pub finish: Option<SimTime>,
}

impl FlowStats {
    /// 流完成时间
    pub fn fct(&self) -> Option<SimTime> {
        self.finish.map(|f| f.saturating_sub(self.start))
    }
}

/// 网络统计信息
#[derive(Debug, Default)]
pub struct Stats {
    pub delivered_pkts: u64,
    pub delivered_bytes: u64,
    pub dropped_pkts: u64,
    pub dropped_bytes: u64,
    pub no_route_drops: u64,
    pub link_down_drops: u64,
    pub queue_drops: u64,
    /// 流键 -> 流统计
    pub flows: BTreeMap<u64, FlowStats>,
}

impl Stats {
    pub fn register_flow(&mut self, key: u64, src: NodeId, dst: NodeId, size_bytes: u64, start: SimTime) {
        self.flows.entry(key).or_insert(FlowStats {
            src,
            dst,
            size_bytes,
            delivered_bytes: 0,
            start,
            finish: None,
        });
    }

    pub(crate) fn record_delivery(&mut self, key: u64, bytes: u64, now: SimTime) {
        self.delivered_pkts += 1;
        self.delivered_bytes += bytes;
        if let Some(flow) = self.flows.get_mut(&key) {
            flow.delivered_bytes += bytes;
            if flow.finish.is_none() && flow.delivered_bytes >= flow.size_bytes {
                flow.finish = Some(now);
            }
        }
    }

    pub fn completed_flows(&self) -> usize {
        self.flows.values().filter(|f| f.finish.is_some()).count()
    }
}
