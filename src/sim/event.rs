//! 事件与世界
//!
//! 包到达、链路就绪、流注入、链路启停、端口采样都以事件的形式进入仿真器；
//! 事件执行时通过 `World::as_any_mut` 取回具体的网络世界。

use std::any::Any;

use super::simulator::Simulator;

/// 可被调度执行的事件
pub trait Event: Send + 'static {
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World);

    /// 事件种类，用于日志与按种类计数；默认取类型名的最后一段
    fn kind(&self) -> &'static str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }
}

/// 仿真世界，通常是 `NetWorld`
pub trait World: Any {
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
