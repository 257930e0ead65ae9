//! 网络模拟模块
//!
//! 此模块包含网络模拟的核心组件：拓扑图、路由计算、节点、有向出端口、
//! 数据包以及驱动它们的事件。

// 子模块声明
mod id;
mod topology;
mod routing;
mod hash;
mod packet;
mod node;
mod link;
mod stats;
mod network;
mod net_world;
mod deliver_packet;
mod link_ready;
mod inject_flow;
mod link_event;
mod monitor;

// 重新导出公共接口
pub use id::{LinkId, NodeId, PortId};
pub use topology::{
    LinkAttrs, NodeInfo, NodeKind, Port, Topology, TopologyError, ip_to_node_id, node_id_to_ip,
};
pub use routing::{DEFAULT_PAYLOAD_BYTES, PathMetric, RoutingTable, hop_tx_delay};
pub use hash::{ecmp_hash, mix64, pick_index};
pub use packet::{FiveTuple, PROTO_TCP, PROTO_UDP, Packet};
pub use node::{DciSwitch, Host, Node, PortLink, Switch};
pub use link::{Link, tx_time};
pub use stats::{FlowStats, Stats};
pub use network::{ForwardError, ForwardRecord, Network};
pub use net_world::NetWorld;
pub use deliver_packet::DeliverPacket;
pub use link_ready::LinkReady;
pub use inject_flow::InjectFlow;
pub use link_event::{BringLinkUp, TakeLinkDown};
pub use monitor::{LinkMonitor, LinkSample, SampleLinks};
