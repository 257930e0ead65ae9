//! 数据包交付事件

use super::id::NodeId;
use super::net_world::NetWorld;
use super::packet::Packet;
use crate::sim::{Event, Simulator, World};
use tracing::trace;

/// 事件：packet 到达节点 `to`，交给该节点处理。
#[derive(Debug)]
pub struct DeliverPacket {
    pub to: NodeId,
    pub pkt: Packet,
}

impl Event for DeliverPacket {
    #[tracing::instrument(level = "debug", skip(self, sim, world), fields(pkt_id = self.pkt.id, flow_key = self.pkt.flow_key(), to = self.to.0))]
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let DeliverPacket { to, pkt } = *self;
        trace!(
            size_bytes = pkt.size_bytes,
            dst = pkt.dst.0,
            hops_taken = pkt.hops_taken,
            now = %sim.now(),
            "📨 数据包到达节点"
        );
        NetWorld::downcast(world).net.deliver(to, pkt, sim);
    }
}
