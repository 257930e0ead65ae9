//! 有向出端口
//!
//! 拓扑里的一条无向链路在运行时对应两个有向 `Link`，各自有出队列与
//! 串行化状态。链路属性（时延、带宽、启停）只存在 `Topology` 中。

use super::id::{LinkId, NodeId, PortId};
use crate::queue::{DropTailQueue, PacketQueue};
use crate::sim::SimTime;

#[derive(Debug)]
pub struct Link {
    pub id: LinkId,
    pub from: NodeId,
    pub to: NodeId,
    /// `from` 上的本地端口
    pub port: PortId,
    /// 正在串行化一个 packet
    pub busy: bool,
    pub busy_until: SimTime,
    /// 累计已开始串行化的字节数
    pub tx_bytes: u64,
    pub queue: Box<dyn PacketQueue>,
}

impl Link {
    pub fn new(id: LinkId, from: NodeId, to: NodeId, port: PortId, queue_bytes: u64) -> Self {
        Self {
            id,
            from,
            to,
            port,
            busy: false,
            busy_until: SimTime::ZERO,
            tx_bytes: 0,
            queue: Box::new(DropTailQueue::new(queue_bytes)),
        }
    }
}

/// 串行化 `bytes` 所需时间：ceil(bytes * 8 / bps) 秒，换算为纳秒
pub fn tx_time(bytes: u32, bandwidth_bps: u64) -> SimTime {
    if bandwidth_bps == 0 {
        return SimTime(u64::MAX / 4);
    }
    let bits = (bytes as u128).saturating_mul(8);
    let nanos = (bits.saturating_mul(1_000_000_000u128) + (bandwidth_bps as u128 - 1))
        / bandwidth_bps as u128;
    SimTime(nanos.min(u64::MAX as u128) as u64)
}
