//! 流亲和表
//!
//! 流键 -> (所选下一跳, 最近一次见到的时间)。超过空闲时长的表项在访问时
//! 或新流决策前的惰性清扫中删除，不需要单独的定时器。被清理的流再次
//! 出现时与新流无异。

use std::collections::HashMap;

use crate::net::NodeId;
use crate::sim::SimTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AffinityEntry {
    pub next_hop: NodeId,
    pub last_seen: SimTime,
}

impl AffinityEntry {
    fn is_idle(&self, now: SimTime, timeout: SimTime) -> bool {
        now.saturating_sub(self.last_seen) > timeout
    }
}

#[derive(Debug, Default, Clone)]
pub struct FlowAffinityTable {
    entries: HashMap<u64, AffinityEntry>,
}

impl FlowAffinityTable {
    /// 查找并刷新时间戳；已经空闲超时的表项在这里被删除并按未见过处理。
    pub fn lookup(&mut self, key: u64, now: SimTime, timeout: SimTime) -> Option<NodeId> {
        let entry = self.entries.get_mut(&key)?;
        if entry.is_idle(now, timeout) {
            self.entries.remove(&key);
            return None;
        }
        entry.last_seen = now;
        Some(entry.next_hop)
    }

    pub fn insert(&mut self, key: u64, next_hop: NodeId, now: SimTime) {
        self.entries.insert(
            key,
            AffinityEntry {
                next_hop,
                last_seen: now,
            },
        );
    }

    pub fn remove(&mut self, key: u64) -> Option<AffinityEntry> {
        self.entries.remove(&key)
    }

    /// 删除全部空闲超时的表项，返回被删除的流键（升序）。
    pub fn evict_idle(&mut self, now: SimTime, timeout: SimTime) -> Vec<u64> {
        let mut evicted: Vec<u64> = self
            .entries
            .iter()
            .filter(|(_, e)| e.is_idle(now, timeout))
            .map(|(k, _)| *k)
            .collect();
        for key in &evicted {
            self.entries.remove(key);
        }
        evicted.sort_unstable();
        evicted
    }

    /// 删除所有指向 `next_hop` 的表项
    pub fn forget_next_hop(&mut self, next_hop: NodeId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.next_hop != next_hop);
        before - self.entries.len()
    }

    pub fn get(&self, key: u64) -> Option<&AffinityEntry> {
        self.entries.get(&key)
    }

    pub fn contains(&self, key: u64) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按流键排序的全部表项
    pub fn entries(&self) -> Vec<(u64, AffinityEntry)> {
        let mut out: Vec<_> = self.entries.iter().map(|(k, e)| (*k, *e)).collect();
        out.sort_unstable_by_key(|(k, _)| *k);
        out
    }
}
