//! 拥塞状态监测
//!
//! 每个 DCI 交换机为自己的每个出端口维护一份 `CongestionState`。采样不是
//! 周期定时器驱动的：新流需要选路时才对所有活动端口采样一次，所以两次
//! 采样之间的间隔随流到达而变化，趋势分数会按这个间隔归一化。

use std::collections::{BTreeMap, HashMap};

use tracing::trace;

use super::cost::{CostModel, PortSnapshot};
use crate::net::PortId;
use crate::sim::SimTime;

/// 默认平滑位移（α = 1/8）
pub const DEFAULT_SMOOTHING_SHIFT: u32 = 3;

/// 缓冲/准入控制单元对外暴露的占用读数
pub trait BufferOccupancy {
    /// 当前链路处于 up 的端口
    fn active_ports(&self) -> Vec<PortId>;
    /// 端口出队列的字节占用
    fn queue_bytes(&self, port: PortId) -> u64;
}

impl BufferOccupancy for BTreeMap<PortId, u64> {
    fn active_ports(&self) -> Vec<PortId> {
        self.keys().copied().collect()
    }

    fn queue_bytes(&self, port: PortId) -> u64 {
        self.get(&port).copied().unwrap_or(0)
    }
}

impl BufferOccupancy for HashMap<PortId, u64> {
    fn active_ports(&self) -> Vec<PortId> {
        let mut ports: Vec<PortId> = self.keys().copied().collect();
        ports.sort();
        ports
    }

    fn queue_bytes(&self, port: PortId) -> u64 {
        self.get(&port).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CongestionState {
    pub queue_bytes_current: u64,
    pub queue_bytes_previous: u64,
    /// 平滑后的队列增量，可以为负
    pub trend: i64,
    pub duration_counter: u32,
    pub last_sample_time: SimTime,
    /// 上一次采样到最近一次采样的间隔
    pub last_interval: SimTime,
}

impl CongestionState {
    /// `trend ← trend − (trend >> K) + (delta >> K)`，随后把当前值记为上一次的值。
    pub fn update_trend(&mut self, shift: u32) {
        let delta = self.queue_bytes_current as i64 - self.queue_bytes_previous as i64;
        self.trend = self.trend - (self.trend >> shift) + (delta >> shift);
        self.queue_bytes_previous = self.queue_bytes_current;
    }

    pub fn snapshot(&self) -> PortSnapshot {
        PortSnapshot {
            queue_bytes: self.queue_bytes_current,
            trend: self.trend,
            duration_counter: self.duration_counter,
            interval: self.last_interval,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CongestionMonitor {
    states: BTreeMap<PortId, CongestionState>,
    smoothing_shift: u32,
}

impl Default for CongestionMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_SMOOTHING_SHIFT)
    }
}

impl CongestionMonitor {
    pub fn new(smoothing_shift: u32) -> Self {
        Self {
            states: BTreeMap::new(),
            smoothing_shift: smoothing_shift.min(63),
        }
    }

    pub fn smoothing_shift(&self) -> u32 {
        self.smoothing_shift
    }

    /// 对所有活动端口采样一次：读队列占用、更新趋势与持续高占用计数。
    /// 返回采样的端口数。
    pub fn sample(&mut self, now: SimTime, buffer: &dyn BufferOccupancy, model: &CostModel) -> usize {
        let ports = buffer.active_ports();
        for &port in &ports {
            let state = self.states.entry(port).or_default();
            state.queue_bytes_current = buffer.queue_bytes(port);
            state.last_interval = now.saturating_sub(state.last_sample_time);
            state.last_sample_time = now;
            state.update_trend(self.smoothing_shift);

            let level = model.queue_level_cost(state.queue_bytes_current);
            state.duration_counter = model.next_duration_counter(state.duration_counter, level);

            trace!(
                port = port.0,
                queue_bytes = state.queue_bytes_current,
                trend = state.trend,
                duration_counter = state.duration_counter,
                "端口采样"
            );
        }
        ports.len()
    }

    pub fn state(&self, port: PortId) -> Option<&CongestionState> {
        self.states.get(&port)
    }

    /// 从未采样过的端口视为空闲
    pub fn snapshot(&self, port: PortId) -> PortSnapshot {
        self.states
            .get(&port)
            .map(CongestionState::snapshot)
            .unwrap_or_default()
    }

    pub fn ports(&self) -> impl Iterator<Item = (&PortId, &CongestionState)> {
        self.states.iter()
    }
}
