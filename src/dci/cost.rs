//! 代价模型
//!
//! 把链路静态属性与端口拥塞信号换算成 8-bit 分数（0..=255）再加权合成：
//!
//! ```text
//! static = clamp((w_delay * delay + w_bandwidth * bandwidth) >> s_static)
//! inst   = clamp((w_queue * queue_level + w_duration * duration) >> s_inst)
//! total  = clamp((alpha * static + beta * inst + gamma * trend) >> s_final)
//! ```
//!
//! 这里的函数都不修改拥塞状态；唯一的缓存是按链路速率惰性生成的趋势阈值表。

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::sim::SimTime;

pub const MAX_SCORE: u8 = 255;

/// 时延代价的参考上限（毫秒），对应满分
pub const DELAY_CEILING_MS: u64 = 512;

/// 各分量权重与归一化右移位数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostWeights {
    pub w_delay: u32,
    pub w_bandwidth: u32,
    pub s_static: u32,
    pub w_queue: u32,
    pub w_duration: u32,
    pub s_inst: u32,
    pub alpha: u32,
    pub beta: u32,
    pub gamma: u32,
    pub s_final: u32,
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            w_delay: 3,
            w_bandwidth: 1,
            s_static: 2,
            w_queue: 3,
            w_duration: 1,
            s_inst: 2,
            alpha: 4,
            beta: 2,
            gamma: 2,
            s_final: 3,
        }
    }
}

/// 代价模型配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostConfig {
    pub weights: CostWeights,
    /// 队列与趋势的分级数量
    pub level_classes: usize,
    /// 带宽分级阈值（Gbps，升序）
    pub bandwidth_classes_gbps: Vec<u64>,
    /// 预先生成趋势阈值表的链路速率（Gbps）
    pub trend_rate_tiers_gbps: Vec<u64>,
    /// 所有端口共享的缓冲容量（字节）
    pub buffer_capacity_bytes: u64,
    /// 持续高占用计数的高/低水位（占满分的百分比）
    pub high_water_pct: u32,
    pub low_water_pct: u32,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            weights: CostWeights::default(),
            level_classes: 10,
            bandwidth_classes_gbps: (1..=10).map(|i| 400 * i / 10).collect(),
            trend_rate_tiers_gbps: vec![25, 100, 200, 400, 800],
            buffer_capacity_bytes: 5_000_000_000,
            high_water_pct: 80,
            low_water_pct: 40,
        }
    }
}

impl CostConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Validation(msg.to_string()));
        if self.level_classes == 0 {
            return invalid("cost.level_classes must be > 0");
        }
        if self.bandwidth_classes_gbps.is_empty() {
            return invalid("cost.bandwidth_classes_gbps must not be empty");
        }
        if self.bandwidth_classes_gbps.windows(2).any(|w| w[0] >= w[1]) {
            return invalid("cost.bandwidth_classes_gbps must be strictly ascending");
        }
        if self.buffer_capacity_bytes == 0 {
            return invalid("cost.buffer_capacity_bytes must be > 0");
        }
        if self.low_water_pct > self.high_water_pct || self.high_water_pct > 100 {
            return invalid("cost watermarks must satisfy low <= high <= 100");
        }
        let w = &self.weights;
        if [w.s_static, w.s_inst, w.s_final].iter().any(|s| *s >= 64) {
            return invalid("cost shifts must be < 64");
        }
        Ok(())
    }
}

/// 链路静态属性
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkQuality {
    pub delay: SimTime,
    pub bandwidth_bps: u64,
}

/// 某个端口在决策时刻的拥塞快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortSnapshot {
    pub queue_bytes: u64,
    /// 平滑后的队列增量（字节/采样周期）
    pub trend: i64,
    pub duration_counter: u32,
    /// 上一次采样到本次采样的间隔
    pub interval: SimTime,
}

/// 单个候选的各项分数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CostBreakdown {
    pub delay: u8,
    pub bandwidth: u8,
    pub queue_level: u8,
    pub duration_penalty: u8,
    pub static_cost: u8,
    pub inst_cost: u8,
    pub trend_cost: u8,
    pub total: u8,
}

pub fn clamp_u8(v: u64) -> u8 {
    v.min(MAX_SCORE as u64) as u8
}

fn weighted_shift(terms: &[(u32, u8)], shift: u32) -> u8 {
    let sum = terms
        .iter()
        .fold(0u64, |acc, (w, s)| acc.saturating_add(*w as u64 * *s as u64));
    clamp_u8(sum.checked_shr(shift).unwrap_or(0))
}

/// 时延代价：0..=512ms 线性映射到 0..=255，超过上限饱和。
pub fn delay_cost(one_way_delay_ms: u64) -> u8 {
    if one_way_delay_ms > DELAY_CEILING_MS {
        MAX_SCORE
    } else {
        ((one_way_delay_ms * 255) >> 9) as u8
    }
}

/// 分级分数表：第 i 级为 `255 * (i + 1) / n`
pub fn level_scores(classes: usize) -> Vec<u8> {
    (0..classes)
        .map(|i| (255 * (i + 1) / classes) as u8)
        .collect()
}

/// 某速率下的趋势阈值（字节/毫秒）：理论满速每毫秒字节数的 `(i + 1) / n`
pub fn trend_thresholds_for(rate_bps: u64, classes: usize) -> Vec<u64> {
    let bytes_per_ms = rate_bps / 8 / 1000;
    (0..classes as u64)
        .map(|i| bytes_per_ms * (i + 1) / classes as u64)
        .collect()
}

/// 趋势分数：只惩罚增长；把每毫秒阈值乘上采样间隔后与 `trend` 比较。
pub fn trend_score(trend: i64, interval: SimTime, thresholds: &[u64], scores: &[u8]) -> u8 {
    if trend <= 0 {
        return 0;
    }
    let interval_ms = interval.as_millis().max(1);
    for (i, th) in thresholds.iter().enumerate().rev() {
        let scaled = th.saturating_mul(interval_ms);
        if trend as u64 >= scaled {
            return scores.get(i).copied().unwrap_or(MAX_SCORE);
        }
    }
    0
}

/// 持续高占用惩罚：`min(counter >> 2, 255)`
pub fn duration_penalty(counter: u32) -> u8 {
    clamp_u8((counter >> 2) as u64)
}

#[derive(Debug, Clone)]
pub struct CostModel {
    weights: CostWeights,
    level_scores: Vec<u8>,
    bandwidth_thresholds_gbps: Vec<u64>,
    bandwidth_scores: Vec<u8>,
    queue_thresholds: Vec<u64>,
    high_water_pct: u32,
    low_water_pct: u32,
    /// 链路速率（bps） -> 趋势阈值表
    trend_thresholds: BTreeMap<u64, Vec<u64>>,
}

impl Default for CostModel {
    fn default() -> Self {
        Self::new(&CostConfig::default())
    }
}

impl CostModel {
    pub fn new(cfg: &CostConfig) -> Self {
        let classes = cfg.level_classes.max(1);
        let queue_thresholds = (0..classes as u64)
            .map(|i| (cfg.buffer_capacity_bytes as u128 * i as u128 / classes as u128) as u64)
            .collect();
        let trend_thresholds = cfg
            .trend_rate_tiers_gbps
            .iter()
            .map(|g| {
                let bps = g.saturating_mul(1_000_000_000);
                (bps, trend_thresholds_for(bps, classes))
            })
            .collect();
        Self {
            weights: cfg.weights,
            level_scores: level_scores(classes),
            bandwidth_thresholds_gbps: cfg.bandwidth_classes_gbps.clone(),
            bandwidth_scores: level_scores(cfg.bandwidth_classes_gbps.len().max(1)),
            queue_thresholds,
            high_water_pct: cfg.high_water_pct,
            low_water_pct: cfg.low_water_pct,
            trend_thresholds,
        }
    }

    pub fn weights(&self) -> &CostWeights {
        &self.weights
    }

    pub fn level_score_table(&self) -> &[u8] {
        &self.level_scores
    }

    /// 带宽代价：带宽越高代价越低，低于最低一级时为 255。
    pub fn bandwidth_cost(&self, bandwidth_bps: u64) -> u8 {
        let gbps = bandwidth_bps / 1_000_000_000;
        for (i, th) in self.bandwidth_thresholds_gbps.iter().enumerate().rev() {
            if gbps >= *th {
                return MAX_SCORE - self.bandwidth_scores[i];
            }
        }
        MAX_SCORE
    }

    pub fn static_cost(&self, link: &LinkQuality) -> (u8, u8, u8) {
        let d = delay_cost(link.delay.as_millis());
        let b = self.bandwidth_cost(link.bandwidth_bps);
        let w = &self.weights;
        let s = weighted_shift(&[(w.w_delay, d), (w.w_bandwidth, b)], w.s_static);
        (d, b, s)
    }

    /// 队列占用分数：不超过占用的最高一级阈值对应的分数，空队列为 0。
    pub fn queue_level_cost(&self, queue_bytes: u64) -> u8 {
        if queue_bytes == 0 {
            return 0;
        }
        for (i, th) in self.queue_thresholds.iter().enumerate().rev() {
            if queue_bytes >= *th {
                return self.level_scores[i];
            }
        }
        0
    }

    /// 持续高占用计数的滞回更新：高于高水位 +1，低于低水位 -1（不低于 0），之间保持。
    pub fn next_duration_counter(&self, counter: u32, queue_level: u8) -> u32 {
        let level = queue_level as u32 * 100;
        if level >= MAX_SCORE as u32 * self.high_water_pct {
            counter.saturating_add(1)
        } else if level <= MAX_SCORE as u32 * self.low_water_pct {
            counter.saturating_sub(1)
        } else {
            counter
        }
    }

    pub fn inst_cost(&self, queue_level: u8, duration: u8) -> u8 {
        let w = &self.weights;
        weighted_shift(&[(w.w_queue, queue_level), (w.w_duration, duration)], w.s_inst)
    }

    /// 为尚未见过的链路速率生成趋势阈值表
    pub fn prime_rate_tier(&mut self, rate_bps: u64) {
        let classes = self.level_scores.len();
        self.trend_thresholds
            .entry(rate_bps)
            .or_insert_with(|| trend_thresholds_for(rate_bps, classes));
    }

    pub fn has_rate_tier(&self, rate_bps: u64) -> bool {
        self.trend_thresholds.contains_key(&rate_bps)
    }

    fn thresholds(&self, rate_bps: u64) -> Cow<'_, [u64]> {
        match self.trend_thresholds.get(&rate_bps) {
            Some(t) => Cow::Borrowed(t.as_slice()),
            None => Cow::Owned(trend_thresholds_for(rate_bps, self.level_scores.len())),
        }
    }

    pub fn trend_cost(&self, snap: &PortSnapshot, rate_bps: u64) -> u8 {
        trend_score(
            snap.trend,
            snap.interval,
            &self.thresholds(rate_bps),
            &self.level_scores,
        )
    }

    pub fn composite(&self, static_cost: u8, inst_cost: u8, trend_cost: u8) -> u8 {
        let w = &self.weights;
        weighted_shift(
            &[(w.alpha, static_cost), (w.beta, inst_cost), (w.gamma, trend_cost)],
            w.s_final,
        )
    }

    /// 对一个候选端口打分
    pub fn score(&self, link: &LinkQuality, snap: &PortSnapshot) -> CostBreakdown {
        let (delay, bandwidth, static_cost) = self.static_cost(link);
        let queue_level = self.queue_level_cost(snap.queue_bytes);
        let duration = duration_penalty(snap.duration_counter);
        let inst_cost = self.inst_cost(queue_level, duration);
        let trend_cost = self.trend_cost(snap, link.bandwidth_bps);
        CostBreakdown {
            delay,
            bandwidth,
            queue_level,
            duration_penalty: duration,
            static_cost,
            inst_cost,
            trend_cost,
            total: self.composite(static_cost, inst_cost, trend_cost),
        }
    }
}
