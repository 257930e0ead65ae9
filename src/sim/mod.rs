//! 仿真核心模块
//!
//! 时间、事件与仿真器；网络相关的一切都在 `net` 里以事件的形式接入。

mod event;
mod simulator;
mod time;

pub use event::{Event, World};
pub use simulator::Simulator;
pub use time::SimTime;
