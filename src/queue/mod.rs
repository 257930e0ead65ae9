//! 出端口队列
//!
//! 交换机的缓冲/准入控制在这里只体现为每个出端口的字节占用：
//! 拥塞监测器通过 `bytes()` 读取占用，队列本身不做 PFC 暂停/恢复决策。

use crate::net::Packet;

mod drop_tail;

pub use drop_tail::DropTailQueue;

/// Packet 队列抽象
pub trait PacketQueue: std::fmt::Debug + Send {
    /// 入队：成功返回 Ok；若被丢弃则返回 Err(pkt)
    fn enqueue(&mut self, pkt: Packet) -> Result<(), Packet>;
    /// 出队：按队列策略返回下一个 packet
    fn dequeue(&mut self) -> Option<Packet>;
    /// 清空队列并返回其中的全部 packet（链路被关闭时使用）
    fn drain(&mut self) -> Vec<Packet>;

    fn len(&self) -> usize;
    fn bytes(&self) -> u64;
    /// 自创建以来的最大字节占用
    fn peak_bytes(&self) -> u64;
    fn capacity_bytes(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
