//! 端口监测
//!
//! 周期性读取出端口计数：DCI 交换机各出端口的累计发送字节（用于算广域路径的
//! 利用率），以及所有交换机出端口的队列长度分布（按 KB 分桶计数）。

use std::collections::BTreeMap;
use std::io::{self, Write};

use super::id::{NodeId, PortId};
use super::net_world::NetWorld;
use crate::sim::{Event, SimTime, Simulator, World};
use tracing::debug;

/// 一次采样中某个 DCI 出端口的读数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSample {
    pub t: SimTime,
    pub node: NodeId,
    pub peer: NodeId,
    pub port: PortId,
    pub tx_bytes: u64,
    pub queue_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct LinkMonitor {
    interval: SimTime,
    samples: Vec<LinkSample>,
    /// (节点, 端口) -> 第 i 个桶是队列长度落在 [i KB, i+1 KB) 的次数
    qlen: BTreeMap<(NodeId, PortId), Vec<u64>>,
}

impl LinkMonitor {
    pub fn new(interval: SimTime) -> Self {
        Self {
            interval: interval.max(SimTime(1)),
            samples: Vec::new(),
            qlen: BTreeMap::new(),
        }
    }

    pub fn interval(&self) -> SimTime {
        self.interval
    }

    pub(crate) fn push_sample(&mut self, sample: LinkSample) {
        self.samples.push(sample);
    }

    pub(crate) fn add_qlen(&mut self, node: NodeId, port: PortId, queue_bytes: u64) {
        let kb = (queue_bytes / 1_000) as usize;
        let dist = self.qlen.entry((node, port)).or_default();
        if dist.len() < kb + 1 {
            dist.resize(kb + 1, 0);
        }
        dist[kb] += 1;
    }

    pub fn samples(&self) -> &[LinkSample] {
        &self.samples
    }

    pub fn qlen_distribution(&self, node: NodeId, port: PortId) -> Option<&[u64]> {
        self.qlen.get(&(node, port)).map(Vec::as_slice)
    }

    /// 导出 `time_ns,node_id,peer_id,tx_bytes,queue_bytes`
    pub fn write_csv<W: Write>(&self, mut w: W) -> io::Result<()> {
        writeln!(w, "time_ns,node_id,peer_id,tx_bytes,queue_bytes")?;
        for s in &self.samples {
            writeln!(
                w,
                "{},{},{},{},{}",
                s.t.as_nanos(),
                s.node.0,
                s.peer.0,
                s.tx_bytes,
                s.queue_bytes
            )?;
        }
        Ok(())
    }

    /// 每个端口一行：`node port c0 c1 ...`
    pub fn write_qlen<W: Write>(&self, mut w: W) -> io::Result<()> {
        for ((node, port), dist) in &self.qlen {
            write!(w, "{} {}", node.0, port.0)?;
            for c in dist {
                write!(w, " {c}")?;
            }
            writeln!(w)?;
        }
        Ok(())
    }
}

/// 事件：对所有交换机出端口采样一次。只要还有别的事件待执行就按间隔重新调度，
/// 网络空闲后自行停止。
#[derive(Debug)]
pub struct SampleLinks;

impl Event for SampleLinks {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        let net = &mut NetWorld::downcast(world).net;
        let Some(interval) = net.sample_links(sim.now()) else {
            debug!("端口监测未开启");
            return;
        };
        if sim.pending() > 0 {
            sim.schedule_after(interval, *self);
        }
    }
}
