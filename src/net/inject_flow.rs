//! 流注入事件
//!
//! 源主机按网卡速率逐包发出一条流，每发一个包重新调度自己。

use super::id::NodeId;
use super::net_world::NetWorld;
use super::packet::FiveTuple;
use crate::sim::{Event, SimTime, Simulator, World};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct InjectFlow {
    pub flow: FiveTuple,
    pub src: NodeId,
    pub dst: NodeId,
    pub size_bytes: u64,
    pub pkt_bytes: u32,
    /// 已发送字节
    pub sent_bytes: u64,
    /// 包间隔；为空时按源主机网卡速率
    pub gap: Option<SimTime>,
}

impl InjectFlow {
    pub fn new(flow: FiveTuple, src: NodeId, dst: NodeId, size_bytes: u64, pkt_bytes: u32) -> Self {
        Self {
            flow,
            src,
            dst,
            size_bytes,
            pkt_bytes: pkt_bytes.max(1),
            sent_bytes: 0,
            gap: None,
        }
    }
}

impl Event for InjectFlow {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let mut me = *self;
        let net = &mut NetWorld::downcast(world).net;
        let now = sim.now();

        if me.sent_bytes == 0 {
            net.stats
                .register_flow(me.flow.flow_key(), me.src, me.dst, me.size_bytes, now);
            debug!(flow_key = me.flow.flow_key(), src = me.src.0, dst = me.dst.0, size_bytes = me.size_bytes, "🚀 流开始发送");
        }
        if me.sent_bytes >= me.size_bytes {
            return;
        }

        let bytes = (me.size_bytes - me.sent_bytes).min(me.pkt_bytes as u64) as u32;
        let pkt = net.make_packet(me.flow, bytes, me.src, me.dst, now);
        net.deliver(me.src, pkt, sim);
        me.sent_bytes += bytes as u64;

        if me.sent_bytes < me.size_bytes {
            let gap = me.gap.unwrap_or_else(|| net.host_pacing_gap(me.src, bytes));
            sim.schedule_after(gap, me);
        }
    }
}
