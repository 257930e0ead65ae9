use crate::dci::{
    CostConfig, CostModel, LinkQuality, PortSnapshot, delay_cost, duration_penalty, level_scores,
    trend_score, trend_thresholds_for,
};
use crate::sim::SimTime;

const G: u64 = 1_000_000_000;

fn link(delay_us: u64, gbps: u64) -> LinkQuality {
    LinkQuality {
        delay: SimTime::from_micros(delay_us),
        bandwidth_bps: gbps * G,
    }
}

#[test]
fn delay_cost_is_linear_up_to_ceiling_then_saturates() {
    assert_eq!(delay_cost(0), 0);
    assert_eq!(delay_cost(256), 127);
    assert_eq!(delay_cost(512), 255);
    assert_eq!(delay_cost(513), 255);
    assert_eq!(delay_cost(u64::MAX), 255);

    let mut prev = 0;
    for ms in 0..=600 {
        let c = delay_cost(ms);
        assert!(c >= prev, "delay cost must be non-decreasing at {ms}ms");
        prev = c;
    }
}

#[test]
fn level_scores_cover_full_range() {
    assert_eq!(
        level_scores(10),
        vec![25, 51, 76, 102, 127, 153, 178, 204, 229, 255]
    );
    assert_eq!(level_scores(1), vec![255]);
}

#[test]
fn bandwidth_cost_decreases_with_bandwidth() {
    let m = CostModel::default();
    assert_eq!(m.bandwidth_cost(400 * G), 0);
    assert_eq!(m.bandwidth_cost(800 * G), 0);
    assert_eq!(m.bandwidth_cost(100 * G), 204);
    assert_eq!(m.bandwidth_cost(40 * G), 230);
    assert_eq!(m.bandwidth_cost(10 * G), 255);

    let mut prev = u8::MAX;
    for gbps in (0..=500).step_by(5) {
        let c = m.bandwidth_cost(gbps * G);
        assert!(c <= prev, "bandwidth cost must be non-increasing at {gbps}G");
        prev = c;
    }
}

#[test]
fn static_cost_combines_delay_and_bandwidth() {
    let m = CostModel::default();
    assert_eq!(m.static_cost(&link(500, 100)), (0, 204, 51));
    // 256ms, 400G: (3 * 127 + 0) >> 2
    let slow = LinkQuality {
        delay: SimTime::from_millis(256),
        bandwidth_bps: 400 * G,
    };
    assert_eq!(m.static_cost(&slow), (127, 0, 95));
    let worst = LinkQuality {
        delay: SimTime::from_secs(10),
        bandwidth_bps: G,
    };
    assert_eq!(m.static_cost(&worst).2, 255);
}

#[test]
fn queue_level_is_zero_only_for_empty_queue() {
    let cfg = CostConfig {
        buffer_capacity_bytes: 1_000_000,
        ..CostConfig::default()
    };
    let m = CostModel::new(&cfg);
    assert_eq!(m.queue_level_cost(0), 0);
    assert_eq!(m.queue_level_cost(1), 25);
    assert_eq!(m.queue_level_cost(99_999), 25);
    assert_eq!(m.queue_level_cost(100_000), 51);
    assert_eq!(m.queue_level_cost(900_000), 255);
    assert_eq!(m.queue_level_cost(u64::MAX), 255);
}

#[test]
fn duration_counter_has_hysteresis() {
    let m = CostModel::default();
    assert_eq!(m.next_duration_counter(0, 255), 1);
    assert_eq!(m.next_duration_counter(5, 204), 6);
    assert_eq!(m.next_duration_counter(5, 178), 5);
    assert_eq!(m.next_duration_counter(5, 127), 5);
    assert_eq!(m.next_duration_counter(5, 102), 4);
    assert_eq!(m.next_duration_counter(0, 0), 0);

    assert_eq!(duration_penalty(3), 0);
    assert_eq!(duration_penalty(4), 1);
    assert_eq!(duration_penalty(1_000), 250);
    assert_eq!(duration_penalty(u32::MAX), 255);
}

#[test]
fn trend_score_only_penalizes_growth_scaled_by_interval() {
    let th = trend_thresholds_for(100 * G, 10);
    assert_eq!(th[0], 1_250_000);
    assert_eq!(th[9], 12_500_000);
    let scores = level_scores(10);
    let ms = SimTime::from_millis(1);

    assert_eq!(trend_score(0, ms, &th, &scores), 0);
    assert_eq!(trend_score(-5_000_000, ms, &th, &scores), 0);
    assert_eq!(trend_score(1_249_999, ms, &th, &scores), 0);
    assert_eq!(trend_score(1_250_000, ms, &th, &scores), 25);
    assert_eq!(trend_score(12_500_000, ms, &th, &scores), 255);
    assert_eq!(trend_score(i64::MAX, ms, &th, &scores), 255);
    // 同样的增量摊到两毫秒上只有一半的强度
    assert_eq!(trend_score(2_500_000, SimTime::from_millis(2), &th, &scores), 25);
    // 不足 1ms 的间隔按 1ms 计
    assert_eq!(trend_score(1_250_000, SimTime::from_micros(10), &th, &scores), 25);
}

#[test]
fn unknown_rate_gets_thresholds_synthesized() {
    let mut m = CostModel::default();
    let rate = 37 * G;
    assert!(!m.has_rate_tier(rate));
    let snap = PortSnapshot {
        trend: 4_625_000,
        interval: SimTime::from_millis(1),
        ..PortSnapshot::default()
    };
    let before = m.trend_cost(&snap, rate);
    m.prime_rate_tier(rate);
    assert!(m.has_rate_tier(rate));
    assert_eq!(m.trend_cost(&snap, rate), before);
    assert_eq!(before, 255);
    assert!(m.has_rate_tier(100 * G));
}

#[test]
fn composite_scores_stay_in_range_and_grow_with_congestion() {
    let m = CostModel::default();
    let l = link(500, 100);
    let idle = m.score(&l, &PortSnapshot::default());
    assert_eq!(idle.static_cost, 51);
    assert_eq!(idle.inst_cost, 0);
    assert_eq!(idle.trend_cost, 0);
    assert_eq!(idle.total, 25);

    let busy = m.score(
        &l,
        &PortSnapshot {
            queue_bytes: 4_600_000_000,
            trend: 20_000_000,
            duration_counter: 400,
            interval: SimTime::from_millis(1),
        },
    );
    assert_eq!(busy.queue_level, 255);
    assert_eq!(busy.duration_penalty, 100);
    assert_eq!(busy.trend_cost, 255);
    assert!(busy.total > idle.total);

    assert_eq!(m.composite(255, 255, 255), 255);
    assert_eq!(m.composite(0, 0, 0), 0);
    assert_eq!(m.inst_cost(255, 255), 255);
}
