//! 仿真器
//!
//! 单线程、协作式的离散事件循环。所有交换机状态（拥塞采样、流表、路由表）
//! 只在事件内部被修改，因此天然按仿真时间全序，不需要任何锁。
//! 同一时刻的事件按调度先后执行：链路就绪与包到达落在同一纳秒时，
//! 先调度的先执行。

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

use super::event::{Event, World};
use super::time::SimTime;
use tracing::{debug, info, trace};

/// 队列中的一个待执行事件
struct Queued {
    at: SimTime,
    seq: u64,
    kind: &'static str,
    ev: Box<dyn Event>,
}

// BinaryHeap 是大顶堆，反转后 (at, seq) 最小的先出。
impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        (other.at, other.seq).cmp(&(self.at, self.seq))
    }
}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        (self.at, self.seq) == (other.at, other.seq)
    }
}

impl Eq for Queued {}

/// 事件驱动仿真器：维护当前时间、事件队列与按种类的执行计数。
#[derive(Default)]
pub struct Simulator {
    now: SimTime,
    next_seq: u64,
    executed: u64,
    by_kind: BTreeMap<&'static str, u64>,
    q: BinaryHeap<Queued>,
}

impl Simulator {
    /// 当前仿真时间
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// 已执行的事件数
    pub fn executed(&self) -> u64 {
        self.executed
    }

    /// 某一种类事件的已执行次数
    pub fn executed_of(&self, kind: &str) -> u64 {
        self.by_kind.get(kind).copied().unwrap_or(0)
    }

    /// 尚未执行的事件数
    pub fn pending(&self) -> usize {
        self.q.len()
    }

    /// 下一个待执行事件的时间
    pub fn next_event_at(&self) -> Option<SimTime> {
        self.q.peek().map(|e| e.at)
    }

    /// 在绝对时间 `at` 调度事件；早于 `now` 的时间按 `now` 处理。
    #[tracing::instrument(level = "trace", skip(self, ev), fields(kind = ev.kind(), schedule_at = %at))]
    pub fn schedule<E: Event>(&mut self, at: SimTime, ev: E) {
        let at = at.max(self.now);
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.q.push(Queued {
            at,
            seq,
            kind: ev.kind(),
            ev: Box::new(ev),
        });
        trace!(seq, queue_size = self.q.len(), "事件已加入队列");
    }

    /// 在 `now + delay` 调度事件
    pub fn schedule_after<E: Event>(&mut self, delay: SimTime, ev: E) {
        let at = self.now.saturating_add(delay);
        self.schedule(at, ev);
    }

    /// 运行直到事件队列为空或越过 `until`；结束时时钟推进到 `until`。
    pub fn run_until(&mut self, until: SimTime, world: &mut dyn World) {
        while self.next_event_at().is_some_and(|at| at <= until) {
            let Some(item) = self.q.pop() else { break };
            self.step(item, world);
        }
        self.now = self.now.max(until);
    }

    /// 运行所有事件直到队列为空。
    #[tracing::instrument(skip(self, world))]
    pub fn run(&mut self, world: &mut dyn World) {
        info!(pending = self.q.len(), "▶️  开始运行仿真");
        let before = self.executed;
        while let Some(item) = self.q.pop() {
            self.step(item, world);
        }
        info!(
            total_events = self.executed - before,
            final_time = %self.now,
            by_kind = ?self.by_kind,
            "✅ 仿真完成"
        );
    }

    fn step(&mut self, item: Queued, world: &mut dyn World) {
        let Queued { at, seq, kind, ev } = item;
        self.now = at;
        self.executed += 1;
        *self.by_kind.entry(kind).or_insert(0) += 1;
        debug!(seq, kind, now = %self.now, remaining = self.q.len(), "执行事件");
        ev.execute(self, world);
    }
}
