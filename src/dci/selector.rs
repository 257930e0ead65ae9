//! 流感知选路
//!
//! DCI 交换机在一个流的首包到达、且存在两个及以上等价下一跳时做一次
//! 选择并记入流亲和表，之后同一条流的包直接复用结果，直到空闲超时。
//! 三种模式共用同一套缓存规则：
//!
//! - `Ecmp`：只按五元组哈希在全部下一跳中选；
//! - `Ucmp`：选链路带宽最大的下一跳，并列时按哈希；
//! - `CongestionAware`：按合成代价升序排列，取较低的一半（至少 1 个，
//!   多于一个候选时至少 2 个），再在其中按哈希选。

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::affinity::FlowAffinityTable;
use super::congestion::{BufferOccupancy, CongestionMonitor};
use super::cost::{CostBreakdown, CostModel, LinkQuality};
use crate::net::{FiveTuple, NodeId, PortId, pick_index};
use crate::sim::SimTime;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum RoutingMode {
    Ecmp,
    Ucmp,
    #[default]
    #[value(alias = "ca")]
    CongestionAware,
}

/// 流空闲超时策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdleTimeout {
    /// 固定时长（毫秒）
    FixedMs(u64),
    /// 全网最大 RTT 的倍数
    RttMultiple(u32),
}

impl Default for IdleTimeout {
    fn default() -> Self {
        IdleTimeout::FixedMs(2_000)
    }
}

impl IdleTimeout {
    pub fn resolve(self, max_rtt: SimTime) -> SimTime {
        match self {
            IdleTimeout::FixedMs(ms) => SimTime::from_millis(ms),
            IdleTimeout::RttMultiple(k) => SimTime(max_rtt.0.saturating_mul(k as u64)),
        }
    }
}

/// 一个等价下一跳及其出端口的静态属性
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub next_hop: NodeId,
    pub port: PortId,
    pub delay: SimTime,
    pub bandwidth_bps: u64,
}

impl Candidate {
    fn quality(&self) -> LinkQuality {
        LinkQuality {
            delay: self.delay,
            bandwidth_bps: self.bandwidth_bps,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateScore {
    pub next_hop: NodeId,
    pub port: PortId,
    pub cost: CostBreakdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionKind {
    /// 只有一个候选，不建表项
    Single,
    /// 命中流亲和表
    Cached,
    /// 在低代价子集中按哈希选出
    LowCost { subset: usize },
    /// 低代价子集为空，退回全局最小代价
    LeastCost,
    /// 最大带宽候选中按哈希选出
    MaxBandwidth { ties: usize },
    /// 全部候选中按哈希选出
    Hashed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub next_hop: NodeId,
    pub kind: DecisionKind,
    /// 代价模式下的候选打分，按代价升序
    pub scores: Vec<CandidateScore>,
}

impl Decision {
    fn plain(next_hop: NodeId, kind: DecisionKind) -> Self {
        Self {
            next_hop,
            kind,
            scores: Vec::new(),
        }
    }
}

/// 低代价子集的大小
pub fn acceptable_subset_len(candidates: usize) -> usize {
    let half = candidates / 2;
    let len = if half < 1 {
        1
    } else if half < 2 {
        2
    } else {
        half
    };
    len.min(candidates)
}

#[derive(Debug, Clone)]
pub struct PathSelector {
    switch: NodeId,
    mode: RoutingMode,
    seed: u32,
    idle_policy: IdleTimeout,
    idle_timeout: SimTime,
    model: CostModel,
    monitor: CongestionMonitor,
    affinity: FlowAffinityTable,
}

impl PathSelector {
    pub fn new(
        switch: NodeId,
        mode: RoutingMode,
        seed: u32,
        idle_policy: IdleTimeout,
        model: CostModel,
        monitor: CongestionMonitor,
    ) -> Self {
        Self {
            switch,
            mode,
            seed,
            idle_policy,
            idle_timeout: idle_policy.resolve(SimTime::ZERO),
            model,
            monitor,
            affinity: FlowAffinityTable::default(),
        }
    }

    /// 路由表重建后更新 RTT 相关的空闲超时
    pub fn set_max_rtt(&mut self, max_rtt: SimTime) {
        self.idle_timeout = self.idle_policy.resolve(max_rtt);
    }

    pub fn idle_timeout(&self) -> SimTime {
        self.idle_timeout
    }

    pub fn mode(&self) -> RoutingMode {
        self.mode
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn model(&self) -> &CostModel {
        &self.model
    }

    pub fn monitor(&self) -> &CongestionMonitor {
        &self.monitor
    }

    pub fn affinity(&self) -> &FlowAffinityTable {
        &self.affinity
    }

    pub fn affinity_mut(&mut self) -> &mut FlowAffinityTable {
        &mut self.affinity
    }

    /// 为 `flow` 选出下一跳。候选为空时返回 `None`（由调用方按无路由处理）。
    #[tracing::instrument(level = "debug", skip(self, flow, candidates, buffer), fields(switch = self.switch.0, flow_key = flow.flow_key(), candidates = candidates.len()))]
    pub fn select(
        &mut self,
        now: SimTime,
        flow: &FiveTuple,
        candidates: &[Candidate],
        buffer: &dyn BufferOccupancy,
    ) -> Option<Decision> {
        match candidates {
            [] => return None,
            [only] => return Some(Decision::plain(only.next_hop, DecisionKind::Single)),
            _ => {}
        }

        let key = flow.flow_key();
        if let Some(cached) = self.affinity.lookup(key, now, self.idle_timeout) {
            if candidates.iter().any(|c| c.next_hop == cached) {
                trace!(next_hop = cached.0, "命中流亲和表");
                return Some(Decision::plain(cached, DecisionKind::Cached));
            }
            debug!(stale = cached.0, "缓存的下一跳已不在候选集中，重新选路");
            self.affinity.remove(key);
        }

        for evicted in self.affinity.evict_idle(now, self.idle_timeout) {
            debug!(switch = self.switch.0, flow_key = evicted, "[GC] 清理空闲流");
        }

        let decision = match self.mode {
            RoutingMode::Ecmp => {
                let idx = pick_index(&flow.hash_bytes(), self.seed, candidates.len());
                Decision::plain(candidates[idx].next_hop, DecisionKind::Hashed)
            }
            RoutingMode::Ucmp => self.choose_max_bandwidth(flow, candidates),
            RoutingMode::CongestionAware => self.choose_by_cost(now, flow, candidates, buffer),
        };

        self.affinity.insert(key, decision.next_hop, now);
        debug!(next_hop = decision.next_hop.0, kind = ?decision.kind, "新流选路完成");
        Some(decision)
    }

    fn choose_max_bandwidth(&self, flow: &FiveTuple, candidates: &[Candidate]) -> Decision {
        let max_bw = candidates
            .iter()
            .map(|c| c.bandwidth_bps)
            .max()
            .unwrap_or(0);
        let best: Vec<&Candidate> = candidates
            .iter()
            .filter(|c| c.bandwidth_bps == max_bw)
            .collect();
        let idx = pick_index(&flow.hash_bytes(), self.seed, best.len());
        Decision::plain(
            best[idx].next_hop,
            DecisionKind::MaxBandwidth { ties: best.len() },
        )
    }

    fn choose_by_cost(
        &mut self,
        now: SimTime,
        flow: &FiveTuple,
        candidates: &[Candidate],
        buffer: &dyn BufferOccupancy,
    ) -> Decision {
        self.monitor.sample(now, buffer, &self.model);
        for c in candidates {
            self.model.prime_rate_tier(c.bandwidth_bps);
        }

        let mut scores: Vec<CandidateScore> = candidates
            .iter()
            .map(|c| CandidateScore {
                next_hop: c.next_hop,
                port: c.port,
                cost: self.model.score(&c.quality(), &self.monitor.snapshot(c.port)),
            })
            .collect();
        scores.sort_by_key(|s| (s.cost.total, s.port));

        let key = flow.flow_key();
        for s in &scores {
            debug!(
                target: "dci_sim::decision",
                "[flow-{}][DCI {}] port {}: static={} inst={} trend={} total={}",
                key,
                self.switch.0,
                s.port.0,
                s.cost.static_cost,
                s.cost.inst_cost,
                s.cost.trend_cost,
                s.cost.total
            );
        }

        let subset = &scores[..acceptable_subset_len(scores.len())];
        let (next_hop, kind) = if !subset.is_empty() {
            let idx = pick_index(&flow.hash_bytes(), self.seed, subset.len());
            (subset[idx].next_hop, DecisionKind::LowCost { subset: subset.len() })
        } else {
            let least = scores
                .iter()
                .min_by_key(|s| (s.cost.total, s.port))
                .map(|s| s.next_hop)
                .unwrap_or(candidates[0].next_hop);
            (least, DecisionKind::LeastCost)
        };

        Decision {
            next_hop,
            kind,
            scores,
        }
    }
}
