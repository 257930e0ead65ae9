//! DropTail（尾丢弃）出端口缓冲
//!
//! 按字节计容量，放不下的新包直接拒绝。另外记录占用的历史峰值，
//! 供端口统计查看一条广域路径最深排到过多少。

use std::collections::VecDeque;

use crate::net::Packet;

use super::PacketQueue;

#[derive(Debug)]
pub struct DropTailQueue {
    capacity: u64,
    occupied: u64,
    peak: u64,
    pkts: VecDeque<Packet>,
}

impl DropTailQueue {
    pub fn new(capacity_bytes: u64) -> Self {
        Self {
            capacity: capacity_bytes,
            occupied: 0,
            peak: 0,
            pkts: VecDeque::new(),
        }
    }

    fn fits(&self, bytes: u64) -> bool {
        self.occupied.saturating_add(bytes) <= self.capacity
    }
}

impl PacketQueue for DropTailQueue {
    fn enqueue(&mut self, pkt: Packet) -> Result<(), Packet> {
        let bytes = pkt.size_bytes as u64;
        if !self.fits(bytes) {
            return Err(pkt);
        }
        self.occupied += bytes;
        self.peak = self.peak.max(self.occupied);
        self.pkts.push_back(pkt);
        Ok(())
    }

    fn dequeue(&mut self) -> Option<Packet> {
        let pkt = self.pkts.pop_front()?;
        self.occupied -= pkt.size_bytes as u64;
        Some(pkt)
    }

    fn drain(&mut self) -> Vec<Packet> {
        self.occupied = 0;
        std::mem::take(&mut self.pkts).into()
    }

    fn len(&self) -> usize {
        self.pkts.len()
    }

    fn bytes(&self) -> u64 {
        self.occupied
    }

    fn peak_bytes(&self) -> u64 {
        self.peak
    }

    fn capacity_bytes(&self) -> u64 {
        self.capacity
    }
}
