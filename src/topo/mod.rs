//! 拓扑构建与场景装载

mod dci_pair;
mod explicit;

use std::collections::HashMap;

use tracing::info;

pub use dci_pair::{DciPairOpts, DciPairTopology, build_dci_pair};
pub use explicit::build_explicit;

use crate::config::{ConfigError, LinkAction, ScenarioSpec, TopologySpec};
use crate::net::{BringLinkUp, InjectFlow, NetWorld, Network, NodeId, TakeLinkDown};
use crate::sim::{SimTime, Simulator};

/// 装载好的场景：网络世界加节点名索引
pub struct Scenario {
    pub world: NetWorld,
    pub names: HashMap<String, NodeId>,
}

impl Scenario {
    /// 按场景描述建立拓扑并安装初始路由
    pub fn build(spec: &ScenarioSpec) -> Result<Scenario, ConfigError> {
        let mut world = NetWorld::new(Network::new(spec.routing.clone()));
        let names = match &spec.topology {
            TopologySpec::DciPair {
                hosts_per_dc,
                wan_paths,
                host_link_gbps,
                wan_link_gbps,
                link_latency_us,
                wan_latency_us,
            } => {
                let defaults = DciPairOpts::default();
                let opts = DciPairOpts {
                    hosts_per_dc: *hosts_per_dc,
                    wan_paths: *wan_paths,
                    host_link_gbps: host_link_gbps.unwrap_or(defaults.host_link_gbps),
                    wan_link_gbps: wan_link_gbps.unwrap_or(defaults.wan_link_gbps),
                    link_latency: link_latency_us
                        .map(SimTime::from_micros)
                        .unwrap_or(defaults.link_latency),
                    wan_latency: wan_latency_us
                        .map(SimTime::from_micros)
                        .unwrap_or(defaults.wan_latency),
                };
                build_dci_pair(&mut world, &opts)?;
                world
                    .net
                    .topology()
                    .nodes()
                    .iter()
                    .map(|n| (n.name.clone(), n.id))
                    .collect()
            }
            TopologySpec::Explicit { nodes, links } => build_explicit(&mut world, nodes, links)?,
        };
        world.net.build_routes();
        info!(nodes = names.len(), "场景拓扑已建立");
        Ok(Scenario { world, names })
    }

    pub fn node(&self, name: &str) -> Result<NodeId, ConfigError> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| ConfigError::Validation(format!("unknown node {name:?}")))
    }

    /// 把流与链路事件调度进模拟器
    pub fn schedule(&self, spec: &ScenarioSpec, sim: &mut Simulator) -> Result<(), ConfigError> {
        let payload = spec.routing.payload_bytes;
        for (i, f) in spec.flows.iter().enumerate() {
            let src = self.node(&f.src)?;
            let dst = self.node(&f.dst)?;
            let sport = f.src_port.unwrap_or(10_000u16.wrapping_add(i as u16));
            let dport = f.dst_port.unwrap_or(100);
            let tuple = self
                .world
                .net
                .flow_tuple(src, dst, sport, dport)
                .ok_or_else(|| {
                    ConfigError::Validation(format!("flows[{i}]: endpoints must be hosts"))
                })?;
            let ev = InjectFlow::new(tuple, src, dst, f.size_bytes, f.pkt_bytes.unwrap_or(payload));
            sim.schedule(SimTime::from_micros(f.start_us), ev);
        }
        for ev in &spec.link_events {
            let a = self.node(&ev.a)?;
            let b = self.node(&ev.b)?;
            if self.world.net.topology().link_between(a, b).is_none() {
                return Err(ConfigError::Validation(format!(
                    "link event between unlinked nodes {:?} and {:?}",
                    ev.a, ev.b
                )));
            }
            let at = SimTime::from_micros(ev.at_us);
            match ev.action {
                LinkAction::Down => sim.schedule(at, TakeLinkDown { a, b }),
                LinkAction::Up => sim.schedule(at, BringLinkUp { a, b }),
            }
        }
        Ok(())
    }
}
