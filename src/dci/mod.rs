//! DCI 交换机上的拥塞感知选路
//!
//! 拥塞监测（有状态采样）与代价模型（纯函数）分开，选路器把两者与流亲和表
//! 组合在一起。每台 DCI 交换机独占自己的一份状态。

mod affinity;
mod congestion;
mod cost;
mod selector;

pub use affinity::{AffinityEntry, FlowAffinityTable};
pub use congestion::{BufferOccupancy, CongestionMonitor, CongestionState, DEFAULT_SMOOTHING_SHIFT};
pub use cost::{
    CostBreakdown, CostConfig, CostModel, CostWeights, DELAY_CEILING_MS, LinkQuality, MAX_SCORE,
    PortSnapshot, clamp_u8, delay_cost, duration_penalty, level_scores, trend_score,
    trend_thresholds_for,
};
pub use selector::{
    Candidate, CandidateScore, Decision, DecisionKind, IdleTimeout, PathSelector, RoutingMode,
    acceptable_subset_len,
};
