use std::collections::HashMap;

use crate::dci::{CongestionMonitor, CongestionState, CostConfig, CostModel};
use crate::net::PortId;
use crate::sim::SimTime;

fn small_buffer_model() -> CostModel {
    CostModel::new(&CostConfig {
        buffer_capacity_bytes: 1_000_000,
        ..CostConfig::default()
    })
}

#[test]
fn trend_update_is_an_exponential_moving_average_of_deltas() {
    let mut s = CongestionState {
        queue_bytes_current: 8_000,
        ..CongestionState::default()
    };
    s.update_trend(3);
    assert_eq!(s.trend, 1_000);
    assert_eq!(s.queue_bytes_previous, 8_000);

    // 队列不变：趋势按 7/8 衰减
    s.update_trend(3);
    assert_eq!(s.trend, 875);

    // 队列清空：增量为负，趋势可以变为负数
    s.queue_bytes_current = 0;
    s.update_trend(3);
    assert_eq!(s.trend, 875 - 109 - 1_000);
}

#[test]
fn sample_reads_every_active_port_and_records_interval() {
    let model = small_buffer_model();
    let mut mon = CongestionMonitor::default();
    let mut buf: HashMap<PortId, u64> = HashMap::new();
    buf.insert(PortId(0), 0);
    buf.insert(PortId(1), 950_000);

    assert_eq!(mon.sample(SimTime::from_millis(3), &buf, &model), 2);
    let p1 = mon.state(PortId(1)).expect("sampled");
    assert_eq!(p1.queue_bytes_current, 950_000);
    assert_eq!(p1.queue_bytes_previous, 950_000);
    assert_eq!(p1.trend, 950_000 >> 3);
    assert_eq!(p1.duration_counter, 1);
    assert_eq!(p1.last_interval, SimTime::from_millis(3));
    assert_eq!(mon.state(PortId(0)).expect("sampled").duration_counter, 0);

    mon.sample(SimTime::from_millis(5), &buf, &model);
    let snap = mon.snapshot(PortId(1));
    assert_eq!(snap.interval, SimTime::from_millis(2));
    assert_eq!(snap.duration_counter, 2);
    assert_eq!(snap.queue_bytes, 950_000);

    assert!(mon.state(PortId(7)).is_none());
    assert_eq!(mon.snapshot(PortId(7)).queue_bytes, 0);
    assert_eq!(mon.ports().count(), 2);
}

#[test]
fn duration_counter_rises_while_high_and_decays_when_low() {
    let model = small_buffer_model();
    let mut mon = CongestionMonitor::default();
    let mut buf: HashMap<PortId, u64> = HashMap::new();

    buf.insert(PortId(0), 900_000);
    for ms in 1..=8 {
        mon.sample(SimTime::from_millis(ms), &buf, &model);
    }
    assert_eq!(mon.snapshot(PortId(0)).duration_counter, 8);

    // 60%：介于高低水位之间，计数保持
    buf.insert(PortId(0), 600_000);
    mon.sample(SimTime::from_millis(9), &buf, &model);
    assert_eq!(mon.snapshot(PortId(0)).duration_counter, 8);

    buf.insert(PortId(0), 100_000);
    for ms in 10..=30 {
        mon.sample(SimTime::from_millis(ms), &buf, &model);
    }
    assert_eq!(mon.snapshot(PortId(0)).duration_counter, 0);
}

#[test]
fn smoothing_shift_is_configurable() {
    let model = CostModel::default();
    let mut mon = CongestionMonitor::new(1);
    assert_eq!(mon.smoothing_shift(), 1);
    let mut buf: HashMap<PortId, u64> = HashMap::new();
    buf.insert(PortId(2), 1_000);
    mon.sample(SimTime::from_millis(1), &buf, &model);
    assert_eq!(mon.snapshot(PortId(2)).trend, 500);
}
