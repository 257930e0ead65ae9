//! 链路就绪事件（驱动出队）

use super::net_world::NetWorld;
use crate::sim::{Event, Simulator, World};

/// 事件：某个有向出端口完成一次串行化，尝试发送队列中的下一个 packet。
#[derive(Debug)]
pub struct LinkReady {
    pub egress: usize,
}

impl Event for LinkReady {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) {
        NetWorld::downcast(world).net.on_link_ready(self.egress, sim);
    }
}
