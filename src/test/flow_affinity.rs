use crate::dci::{FlowAffinityTable, IdleTimeout};
use crate::net::NodeId;
use crate::sim::SimTime;

fn ms(v: u64) -> SimTime {
    SimTime::from_millis(v)
}

/// 两种空闲超时策略分别解析到的时长
fn policies() -> Vec<(IdleTimeout, SimTime)> {
    let max_rtt = SimTime::from_micros(400);
    vec![
        (IdleTimeout::default(), ms(2_000)),
        (IdleTimeout::RttMultiple(5), SimTime::from_micros(2_000)),
    ]
    .into_iter()
    .map(|(p, expect)| {
        assert_eq!(p.resolve(max_rtt), expect);
        (p, p.resolve(max_rtt))
    })
    .collect()
}

#[test]
fn default_idle_timeout_is_two_seconds() {
    assert_eq!(IdleTimeout::default(), IdleTimeout::FixedMs(2_000));
    assert_eq!(IdleTimeout::default().resolve(SimTime::ZERO), ms(2_000));
    assert_eq!(IdleTimeout::RttMultiple(5).resolve(SimTime::ZERO), SimTime::ZERO);
}

#[test]
fn lookup_refreshes_last_seen_within_timeout() {
    for (_, timeout) in policies() {
        let mut t = FlowAffinityTable::default();
        t.insert(7, NodeId(3), SimTime::ZERO);

        let half = SimTime(timeout.0 / 2);
        assert_eq!(t.lookup(7, half, timeout), Some(NodeId(3)));
        assert_eq!(t.get(7).expect("entry").last_seen, half);

        // 距上次访问恰好一个超时：仍然有效
        let edge = half.saturating_add(timeout);
        assert_eq!(t.lookup(7, edge, timeout), Some(NodeId(3)));
        assert_eq!(t.len(), 1);
    }
}

#[test]
fn idle_entries_are_removed_on_lookup() {
    for (_, timeout) in policies() {
        let mut t = FlowAffinityTable::default();
        t.insert(7, NodeId(3), SimTime::ZERO);
        let late = timeout.saturating_add(SimTime(1));
        assert_eq!(t.lookup(7, late, timeout), None);
        assert!(!t.contains(7));
        assert!(t.is_empty());
    }
}

#[test]
fn evict_idle_sweeps_only_stale_entries() {
    for (_, timeout) in policies() {
        let mut t = FlowAffinityTable::default();
        t.insert(30, NodeId(1), SimTime::ZERO);
        t.insert(10, NodeId(2), SimTime::ZERO);
        t.insert(20, NodeId(1), timeout);

        let now = timeout.saturating_add(SimTime(1));
        assert_eq!(t.evict_idle(now, timeout), vec![10, 30]);
        assert_eq!(t.len(), 1);
        assert!(t.contains(20));
        assert!(t.evict_idle(now, timeout).is_empty());
    }
}

#[test]
fn forget_next_hop_drops_all_flows_pinned_to_it() {
    let mut t = FlowAffinityTable::default();
    t.insert(1, NodeId(4), SimTime::ZERO);
    t.insert(2, NodeId(5), SimTime::ZERO);
    t.insert(3, NodeId(4), SimTime::ZERO);

    assert_eq!(t.forget_next_hop(NodeId(4)), 2);
    let keys: Vec<u64> = t.entries().iter().map(|(k, _)| *k).collect();
    assert_eq!(keys, vec![2]);
    assert_eq!(t.forget_next_hop(NodeId(9)), 0);
    assert!(t.remove(2).is_some());
    assert!(t.remove(2).is_none());
}
