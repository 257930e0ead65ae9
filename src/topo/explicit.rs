//! 按节点/链路列表构建任意拓扑

use std::collections::HashMap;

use crate::config::{ConfigError, LinkSpec, NodeSpec};
use crate::net::{NetWorld, NodeId};
use crate::sim::SimTime;

/// 依次添加节点与链路，返回节点名到编号的映射。
pub fn build_explicit(
    world: &mut NetWorld,
    nodes: &[NodeSpec],
    links: &[LinkSpec],
) -> Result<HashMap<String, NodeId>, ConfigError> {
    let mut names = HashMap::with_capacity(nodes.len());
    for n in nodes {
        if names.contains_key(&n.name) {
            return Err(ConfigError::Validation(format!("duplicate node name {:?}", n.name)));
        }
        let id = world.net.add_node(n.name.clone(), n.kind);
        names.insert(n.name.clone(), id);
    }

    let lookup = |name: &str| {
        names
            .get(name)
            .copied()
            .ok_or_else(|| ConfigError::Validation(format!("unknown node {name:?}")))
    };
    for l in links {
        let a = lookup(&l.a)?;
        let b = lookup(&l.b)?;
        world.net.connect(
            a,
            b,
            SimTime::from_micros(l.latency_us),
            l.gbps.saturating_mul(1_000_000_000),
        )?;
    }
    Ok(names)
}
