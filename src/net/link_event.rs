//! 链路启停事件

use super::id::NodeId;
use super::net_world::NetWorld;
use crate::sim::{Event, Simulator, World};
use tracing::error;

/// 事件：关闭 `a`、`b` 之间的链路（两个方向），并立即重建路由。
#[derive(Debug)]
pub struct TakeLinkDown {
    pub a: NodeId,
    pub b: NodeId,
}

impl Event for TakeLinkDown {
    fn execute(self: Box<Self>, _sim: &mut Simulator, world: &mut dyn World) {
        let net = &mut NetWorld::downcast(world).net;
        if let Err(err) = net.set_link_down(self.a, self.b) {
            error!(%err, a = self.a.0, b = self.b.0, "关闭链路失败");
        }
    }
}

/// 事件：恢复 `a`、`b` 之间的链路。
#[derive(Debug)]
pub struct BringLinkUp {
    pub a: NodeId,
    pub b: NodeId,
}

impl Event for BringLinkUp {
    fn execute(self: Box<Self>, _sim: &mut Simulator, world: &mut dyn World) {
        let net = &mut NetWorld::downcast(world).net;
        if let Err(err) = net.set_link_up(self.a, self.b) {
            error!(%err, a = self.a.0, b = self.b.0, "恢复链路失败");
        }
    }
}
