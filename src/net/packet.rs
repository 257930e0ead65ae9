//! 数据包与流标识
//!
//! 流以五元组区分方向：A→B 与 B→A 是两条不同的流。

use std::net::Ipv4Addr;

use super::hash::mix64;
use super::id::NodeId;
use crate::sim::SimTime;

pub const PROTO_TCP: u8 = 0x06;
pub const PROTO_UDP: u8 = 0x11;

/// 五元组
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FiveTuple {
    pub protocol: u8,
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
}

impl FiveTuple {
    pub fn udp(src_ip: Ipv4Addr, dst_ip: Ipv4Addr, src_port: u16, dst_port: u16) -> Self {
        Self {
            protocol: PROTO_UDP,
            src_ip,
            dst_ip,
            src_port,
            dst_port,
        }
    }

    /// 64-bit 流键，流表与选路共用。
    pub fn flow_key(&self) -> u64 {
        let addrs = ((u32::from(self.src_ip) as u64) << 32) | u32::from(self.dst_ip) as u64;
        let ports = ((self.protocol as u64) << 32)
            | ((self.src_port as u64) << 16)
            | self.dst_port as u64;
        mix64(addrs ^ mix64(ports))
    }

    /// ECMP 哈希输入：源地址、目的地址、`sport | dport << 16`，各 4 字节小端。
    pub fn hash_bytes(&self) -> [u8; 12] {
        let mut buf = [0u8; 12];
        buf[0..4].copy_from_slice(&u32::from(self.src_ip).to_le_bytes());
        buf[4..8].copy_from_slice(&u32::from(self.dst_ip).to_le_bytes());
        let ports = self.src_port as u32 | ((self.dst_port as u32) << 16);
        buf[8..12].copy_from_slice(&ports.to_le_bytes());
        buf
    }

    pub fn reversed(&self) -> Self {
        Self {
            protocol: self.protocol,
            src_ip: self.dst_ip,
            dst_ip: self.src_ip,
            src_port: self.dst_port,
            dst_port: self.src_port,
        }
    }
}

/// 网络数据包
#[derive(Debug, Clone)]
pub struct Packet {
    pub id: u64,
    pub flow: FiveTuple,
    pub size_bytes: u32,
    pub src: NodeId,
    pub dst: NodeId,
    pub hops_taken: u32,
    pub sent_at: SimTime,
}

impl Packet {
    pub fn flow_key(&self) -> u64 {
        self.flow.flow_key()
    }

    /// 经过一跳
    pub fn advance(mut self) -> Self {
        self.hops_taken += 1;
        self
    }
}
