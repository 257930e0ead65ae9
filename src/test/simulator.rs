use std::any::Any;

use crate::config::RoutingConfig;
use crate::net::{InjectFlow, NetWorld, Network};
use crate::sim::{Event, SimTime, Simulator, World};

/// 记录 (执行时刻, 事件编号)
#[derive(Default)]
struct Trace {
    seen: Vec<(SimTime, u32)>,
}

impl World for Trace {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn trace(world: &mut dyn World) -> &mut Trace {
    world.as_any_mut().downcast_mut::<Trace>().expect("trace world")
}

#[derive(Debug)]
struct Mark(u32);

impl Event for Mark {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        trace(world).seen.push((sim.now(), self.0));
    }
}

/// 执行时记录自己，再在 `delay` 之后调度 `Mark(next)`
#[derive(Debug)]
struct Relay {
    id: u32,
    next: u32,
    delay: SimTime,
}

impl Event for Relay {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        trace(world).seen.push((sim.now(), self.id));
        sim.schedule_after(self.delay, Mark(self.next));
    }

    fn kind(&self) -> &'static str {
        "relay"
    }
}

fn ids(world: &Trace) -> Vec<u32> {
    world.seen.iter().map(|(_, id)| *id).collect()
}

#[test]
fn same_instant_events_run_in_scheduling_order() {
    let mut sim = Simulator::default();
    let at = SimTime::from_micros(3);
    // 交错调度同一时刻与更早时刻的事件
    for id in [1, 2, 3] {
        sim.schedule(at, Mark(id));
        sim.schedule(SimTime::from_micros(1), Mark(10 + id));
    }
    assert_eq!(sim.pending(), 6);
    assert_eq!(sim.next_event_at(), Some(SimTime::from_micros(1)));

    let mut world = Trace::default();
    sim.run(&mut world);
    assert_eq!(ids(&world), vec![11, 12, 13, 1, 2, 3]);
    assert_eq!(sim.now(), at);
    assert_eq!(sim.pending(), 0);
    assert_eq!(sim.next_event_at(), None);
}

#[test]
fn zero_delay_follow_up_runs_after_already_queued_peers() {
    let mut sim = Simulator::default();
    sim.schedule(
        SimTime(50),
        Relay {
            id: 1,
            next: 3,
            delay: SimTime::ZERO,
        },
    );
    sim.schedule(SimTime(50), Mark(2));

    let mut world = Trace::default();
    sim.run(&mut world);
    assert_eq!(world.seen, vec![(SimTime(50), 1), (SimTime(50), 2), (SimTime(50), 3)]);
}

#[test]
fn past_times_are_clamped_to_now() {
    let mut sim = Simulator::default();
    let mut world = Trace::default();
    sim.run_until(SimTime::from_micros(100), &mut world);
    assert_eq!(sim.now(), SimTime::from_micros(100));
    assert_eq!(sim.executed(), 0);

    sim.schedule(SimTime::from_micros(10), Mark(1));
    assert_eq!(sim.next_event_at(), Some(SimTime::from_micros(100)));
    sim.schedule_after(SimTime::from_micros(5), Mark(2));
    sim.run(&mut world);

    assert_eq!(
        world.seen,
        vec![(SimTime::from_micros(100), 1), (SimTime::from_micros(105), 2)]
    );
}

#[test]
fn run_until_is_inclusive_and_resumable() {
    let mut sim = Simulator::default();
    sim.schedule(
        SimTime(5),
        Relay {
            id: 1,
            next: 2,
            delay: SimTime(10),
        },
    );
    sim.schedule(SimTime(8), Mark(3));

    let mut world = Trace::default();
    sim.run_until(SimTime(5), &mut world);
    assert_eq!(ids(&world), vec![1]);
    assert_eq!(sim.pending(), 2);
    assert_eq!(sim.now(), SimTime(5));

    sim.run_until(SimTime(14), &mut world);
    assert_eq!(ids(&world), vec![1, 3]);
    assert_eq!(sim.now(), SimTime(14));

    sim.run(&mut world);
    assert_eq!(ids(&world), vec![1, 3, 2]);
    assert_eq!(sim.now(), SimTime(15));
}

#[test]
fn executed_events_are_counted_by_kind() {
    let mut sim = Simulator::default();
    for i in 0..3 {
        sim.schedule(
            SimTime(i),
            Relay {
                id: i as u32,
                next: 100,
                delay: SimTime(1),
            },
        );
    }
    let mut world = Trace::default();
    sim.run(&mut world);

    assert_eq!(sim.executed(), 6);
    assert_eq!(sim.executed_of("relay"), 3);
    assert_eq!(sim.executed_of("Mark"), 3);
    assert_eq!(sim.executed_of("LinkReady"), 0);
}

#[test]
fn packet_events_per_hop_and_per_transmission() {
    let mut world = NetWorld::new(Network::new(RoutingConfig::default()));
    let h0 = world.net.add_host("h0");
    let h1 = world.net.add_host("h1");
    let s = world.net.add_switch("s");
    world
        .net
        .connect(h0, s, SimTime::from_micros(1), 10_000_000_000)
        .expect("link");
    world
        .net
        .connect(s, h1, SimTime::from_micros(1), 10_000_000_000)
        .expect("link");

    let mut sim = Simulator::default();
    let tuple = world.net.flow_tuple(h0, h1, 1, 2).expect("hosts");
    sim.schedule(SimTime::ZERO, InjectFlow::new(tuple, h0, h1, 3_000, 1_000));
    sim.run(&mut world);

    // 3 个包各走两跳：每跳一次串行化结束、一次到达
    assert_eq!(sim.executed_of("InjectFlow"), 3);
    assert_eq!(sim.executed_of("LinkReady"), 6);
    assert_eq!(sim.executed_of("DeliverPacket"), 6);
    assert_eq!(sim.executed(), 15);
    assert_eq!(world.net.stats.delivered_pkts, 3);
    assert_eq!(world.net.egress(h0, s).expect("egress").tx_bytes, 3_000);
    assert_eq!(world.net.egress(s, h1).expect("egress").tx_bytes, 3_000);
    assert_eq!(world.net.egress(h1, s).expect("egress").tx_bytes, 0);
}
