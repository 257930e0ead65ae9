use std::collections::BTreeSet;

use crate::config::RoutingConfig;
use crate::dci::{CostConfig, IdleTimeout, RoutingMode};
use crate::net::{InjectFlow, NetWorld, Network, NodeId, PortId, SampleLinks};
use crate::sim::{SimTime, Simulator};
use crate::topo::{DciPairOpts, DciPairTopology, build_dci_pair};

fn config(mode: RoutingMode) -> RoutingConfig {
    RoutingConfig {
        mode,
        cost: CostConfig {
            buffer_capacity_bytes: 1_000_000,
            ..CostConfig::default()
        },
        ..RoutingConfig::default()
    }
}

fn build(cfg: RoutingConfig) -> (NetWorld, DciPairTopology) {
    let mut world = NetWorld::new(Network::new(cfg));
    let opts = DciPairOpts {
        hosts_per_dc: 2,
        wan_paths: 4,
        ..DciPairOpts::default()
    };
    let topo = build_dci_pair(&mut world, &opts).expect("dci pair");
    world.net.build_routes();
    world.net.enable_forward_log();
    (world, topo)
}

/// 调度一条单包流，返回流键
fn inject(
    sim: &mut Simulator,
    world: &NetWorld,
    src: NodeId,
    dst: NodeId,
    sport: u16,
    at: SimTime,
) -> u64 {
    let tuple = world.net.flow_tuple(src, dst, sport, 80).expect("hosts");
    sim.schedule(at, InjectFlow::new(tuple, src, dst, 1_000, 1_000));
    tuple.flow_key()
}

/// `node` 在 `since` 之后为 `key` 选择的下一跳
fn hops_at(world: &NetWorld, node: NodeId, key: u64, since: SimTime) -> Vec<NodeId> {
    world
        .net
        .forward_log()
        .iter()
        .filter(|r| r.node == node && r.flow_key == key && r.t >= since)
        .map(|r| r.next)
        .collect()
}

#[test]
fn dci_pair_routes_have_one_next_hop_per_wan_path() {
    let (world, topo) = build(config(RoutingMode::CongestionAware));
    let routes = world.net.routes();
    let dst = topo.right_hosts[0];

    assert_eq!(routes.next_hops(topo.dci_a, dst).expect("route"), topo.wan.as_slice());
    assert_eq!(routes.next_hops(topo.left_hosts[0], dst).expect("route"), &[topo.left_tor]);
    assert_eq!(routes.next_hops(topo.wan[2], dst).expect("route"), &[topo.dci_b]);
    assert_eq!(routes.next_hops(topo.dci_b, dst).expect("route"), &[topo.right_tor]);
    assert_eq!(routes.metric(topo.left_hosts[0], dst).expect("metric").hops, 6);
}

#[test]
fn flows_cross_the_interconnect_and_complete() {
    let (mut world, topo) = build(config(RoutingMode::CongestionAware));
    let mut sim = Simulator::default();
    let (src, dst) = (topo.left_hosts[0], topo.right_hosts[0]);

    let keys: Vec<u64> = (0..32)
        .map(|i| inject(&mut sim, &world, src, dst, 1000 + i, SimTime::ZERO))
        .collect();
    sim.run(&mut world);

    let stats = &world.net.stats;
    assert_eq!(stats.completed_flows(), 32);
    assert_eq!(stats.delivered_pkts, 32);
    assert_eq!(stats.dropped_pkts, 0);

    // 空闲时四条路径代价相同，低代价子集是端口号最小的两条
    let used: BTreeSet<NodeId> = keys
        .iter()
        .flat_map(|k| hops_at(&world, topo.dci_a, *k, SimTime::ZERO))
        .collect();
    assert_eq!(used, BTreeSet::from([topo.wan[0], topo.wan[1]]));

    let dci = world.net.dci_switch(topo.dci_a).expect("dci switch");
    assert_eq!(dci.selector().affinity().len(), 32);
    // 对端 DCI 只有一个下一跳，不建流表项
    let peer = world.net.dci_switch(topo.dci_b).expect("dci switch");
    assert!(peer.selector().affinity().is_empty());

    for f in stats.flows.values() {
        let fct = f.fct().expect("finished");
        assert!(fct >= SimTime::from_micros(1_000), "fct {fct} shorter than the WAN latency");
    }
}

#[test]
fn new_flows_steer_around_congested_wan_link_while_existing_flows_stay() {
    let (mut world, topo) = build(config(RoutingMode::CongestionAware));
    let mut sim = Simulator::default();
    let (src, dst) = (topo.left_hosts[0], topo.right_hosts[0]);
    let (dci_a, wan0) = (topo.dci_a, topo.wan[0]);

    let old: Vec<u64> = (0..32)
        .map(|i| inject(&mut sim, &world, src, dst, 1000 + i, SimTime::ZERO))
        .collect();
    sim.run(&mut world);
    let pinned: Vec<u64> = old
        .iter()
        .copied()
        .filter(|k| hops_at(&world, dci_a, *k, SimTime::ZERO) == vec![wan0])
        .collect();
    assert!(!pinned.is_empty(), "some flows should start on wan0");

    // 把 dci_a -> wan0 的出队列灌到 90%（不启动发送）
    let filler_tuple = world.net.flow_tuple(src, dst, 9, 9).expect("hosts");
    for _ in 0..900 {
        let pkt = world.net.make_packet(filler_tuple, 1_000, src, dst, sim.now());
        world
            .net
            .egress_mut(dci_a, wan0)
            .expect("egress")
            .queue
            .enqueue(pkt)
            .expect("fits");
    }
    assert_eq!(world.net.port_buffers(dci_a).values().max(), Some(&900_000));

    let t_new = sim.now().saturating_add(SimTime::from_micros(10));
    let t_old = t_new.saturating_add(SimTime::from_micros(100));
    let fresh: Vec<u64> = (0..16)
        .map(|i| inject(&mut sim, &world, src, dst, 2000 + i, t_new))
        .collect();
    for (i, _) in old.iter().enumerate() {
        inject(&mut sim, &world, src, dst, 1000 + i as u16, t_old);
    }
    sim.run(&mut world);

    for k in &fresh {
        let hops = hops_at(&world, dci_a, *k, t_new);
        assert_eq!(hops.len(), 1);
        assert_ne!(hops[0], wan0, "new flow placed on the congested link");
        assert!(hops[0] == topo.wan[1] || hops[0] == topo.wan[2]);
    }
    for k in &pinned {
        assert_eq!(hops_at(&world, dci_a, *k, t_old), vec![wan0]);
    }
    assert_eq!(world.net.stats.dropped_pkts, 0);
    assert_eq!(world.net.stats.completed_flows(), 48);
}

#[test]
fn ecmp_mode_ignores_congestion() {
    let (mut world, topo) = build(config(RoutingMode::Ecmp));
    let mut sim = Simulator::default();
    let (src, dst) = (topo.left_hosts[0], topo.right_hosts[0]);
    let (dci_a, wan0) = (topo.dci_a, topo.wan[0]);

    let filler_tuple = world.net.flow_tuple(src, dst, 9, 9).expect("hosts");
    for _ in 0..900 {
        let pkt = world.net.make_packet(filler_tuple, 1_000, src, dst, SimTime::ZERO);
        world
            .net
            .egress_mut(dci_a, wan0)
            .expect("egress")
            .queue
            .enqueue(pkt)
            .expect("fits");
    }
    let keys: Vec<u64> = (0..16)
        .map(|i| inject(&mut sim, &world, src, dst, 2000 + i, SimTime::ZERO))
        .collect();
    sim.run(&mut world);

    let used: BTreeSet<NodeId> = keys
        .iter()
        .flat_map(|k| hops_at(&world, dci_a, *k, SimTime::ZERO))
        .collect();
    assert!(used.contains(&wan0));
    assert_eq!(used.len(), 4);
    let dci = world.net.dci_switch(dci_a).expect("dci switch");
    assert!(dci.selector().monitor().ports().next().is_none());
}

#[test]
fn rtt_based_idle_timeout_tracks_installed_routes() {
    let mut cfg = config(RoutingMode::CongestionAware);
    cfg.idle_timeout = IdleTimeout::RttMultiple(5);
    let (mut world, topo) = build(cfg);
    let mut sim = Simulator::default();
    inject(&mut sim, &world, topo.left_hosts[0], topo.right_hosts[1], 1, SimTime::ZERO);
    sim.run(&mut world);

    let max_rtt = world.net.routes().max_rtt();
    assert!(max_rtt > SimTime::from_millis(2));
    let dci = world.net.dci_switch(topo.dci_a).expect("dci switch");
    assert_eq!(dci.selector().idle_timeout(), SimTime(max_rtt.0 * 5));
}

fn wan_tx_bytes(world: &NetWorld, topo: &DciPairTopology) -> Vec<u64> {
    topo.wan
        .iter()
        .map(|w| world.net.egress(topo.dci_a, *w).expect("egress").tx_bytes)
        .collect()
}

#[test]
fn wan_byte_counters_follow_the_chosen_paths() {
    let (mut world, topo) = build(config(RoutingMode::CongestionAware));
    let mut sim = Simulator::default();
    let (src, dst) = (topo.left_hosts[0], topo.right_hosts[0]);
    for i in 0..32 {
        inject(&mut sim, &world, src, dst, 1000 + i, SimTime::ZERO);
    }
    sim.run(&mut world);

    // 空闲时只有低代价子集（wan0、wan1）承载流量
    let tx = wan_tx_bytes(&world, &topo);
    assert!(tx[0] > 0 && tx[1] > 0, "tx {tx:?}");
    assert_eq!(&tx[2..], &[0, 0]);
    assert_eq!(tx.iter().sum::<u64>(), 32_000);
    let peer = world.net.egress(topo.dci_b, topo.right_tor).expect("egress");
    assert_eq!(peer.tx_bytes, 32_000);
}

#[test]
fn ecmp_spreads_bytes_over_every_wan_path() {
    let (mut world, topo) = build(config(RoutingMode::Ecmp));
    let mut sim = Simulator::default();
    let (src, dst) = (topo.left_hosts[0], topo.right_hosts[0]);
    for i in 0..16 {
        inject(&mut sim, &world, src, dst, 2000 + i, SimTime::ZERO);
    }
    sim.run(&mut world);

    let tx = wan_tx_bytes(&world, &topo);
    assert!(tx.iter().all(|b| *b > 0), "tx {tx:?}");
    assert_eq!(tx.iter().sum::<u64>(), 16_000);
}

#[test]
fn periodic_sampling_records_dci_ports_until_the_network_drains() {
    let (mut world, topo) = build(config(RoutingMode::CongestionAware));
    world.net.enable_link_monitor(SimTime::from_micros(50));
    let mut sim = Simulator::default();
    let (src, dst) = (topo.left_hosts[0], topo.right_hosts[0]);
    for i in 0..32 {
        inject(&mut sim, &world, src, dst, 1000 + i, SimTime::ZERO);
    }
    sim.schedule(SimTime::ZERO, SampleLinks);
    sim.run(&mut world);

    let monitor = world.net.link_monitor().expect("monitor enabled");
    let rounds = sim.executed_of("SampleLinks");
    // WAN 单程 500us，流量要跑 1ms 以上
    assert!(rounds >= 20, "only {rounds} sampling rounds");

    let samples = monitor.samples();
    // 每轮两台 DCI 各 5 个出端口（1 个 ToR + 4 条广域路径）
    assert_eq!(samples.len() as u64, rounds * 10);
    assert!(samples.iter().all(|s| s.node == topo.dci_a || s.node == topo.dci_b));
    assert!(samples.iter().all(|s| s.t <= sim.now()));

    let wan0: Vec<_> = samples
        .iter()
        .filter(|s| s.node == topo.dci_a && s.peer == topo.wan[0])
        .collect();
    assert_eq!(wan0.len() as u64, rounds);
    assert!(wan0.windows(2).all(|w| w[0].t < w[1].t && w[0].tx_bytes <= w[1].tx_bytes));
    let last = wan0.last().expect("samples");
    assert_eq!(last.tx_bytes, world.net.egress(topo.dci_a, topo.wan[0]).expect("egress").tx_bytes);

    // 每个交换机出端口每轮都计入一次队列长度分布
    let port = wan0[0].port;
    let dist = monitor.qlen_distribution(topo.dci_a, port).expect("distribution");
    assert_eq!(dist.iter().sum::<u64>(), rounds);
    let tor_port = world.net.egress(topo.left_tor, topo.dci_a).expect("egress").port;
    assert!(monitor.qlen_distribution(topo.left_tor, tor_port).is_some());
    assert!(monitor.qlen_distribution(src, PortId(0)).is_none());
}
