//! 场景与路由配置（JSON）
//!
//! 一个场景文件描述拓扑、路由参数、要注入的流以及定时的链路启停事件。

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dci::{CostConfig, DEFAULT_SMOOTHING_SHIFT, IdleTimeout, RoutingMode};
use crate::net::{DEFAULT_PAYLOAD_BYTES, NodeKind, TopologyError};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read scenario file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse scenario JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Validation(String),
    #[error("invalid topology: {0}")]
    Topology(#[from] TopologyError),
}

/// 路由相关参数，每台 DCI 交换机按它创建自己的选路器
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub mode: RoutingMode,
    #[serde(flatten)]
    pub cost: CostConfig,
    /// 趋势平滑位移 K
    pub smoothing_shift: u32,
    pub idle_timeout: IdleTimeout,
    /// 为空时各交换机以自身节点编号作为哈希种子
    pub ecmp_seed: Option<u32>,
    /// 计算逐跳发送时延所用的包长
    pub payload_bytes: u32,
    /// 每个出端口队列的字节容量
    pub egress_queue_bytes: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            mode: RoutingMode::default(),
            cost: CostConfig::default(),
            smoothing_shift: DEFAULT_SMOOTHING_SHIFT,
            idle_timeout: IdleTimeout::default(),
            ecmp_seed: None,
            payload_bytes: DEFAULT_PAYLOAD_BYTES,
            egress_queue_bytes: 5_000_000_000,
        }
    }
}

impl RoutingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cost.validate()?;
        if self.payload_bytes == 0 {
            return Err(ConfigError::Validation("payload_bytes must be > 0".into()));
        }
        if self.egress_queue_bytes == 0 {
            return Err(ConfigError::Validation("egress_queue_bytes must be > 0".into()));
        }
        if self.smoothing_shift == 0 || self.smoothing_shift >= 32 {
            return Err(ConfigError::Validation(
                "smoothing_shift must be in 1..32".into(),
            ));
        }
        match self.idle_timeout {
            IdleTimeout::FixedMs(0) | IdleTimeout::RttMultiple(0) => Err(ConfigError::Validation(
                "idle_timeout must be non-zero".into(),
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub schema_version: u32,
    pub topology: TopologySpec,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub flows: Vec<FlowSpec>,
    #[serde(default)]
    pub link_events: Vec<LinkEventSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TopologySpec {
    /// 两个数据中心经若干条并行广域路径互联
    DciPair {
        hosts_per_dc: usize,
        wan_paths: usize,
        #[serde(default)]
        host_link_gbps: Option<u64>,
        #[serde(default)]
        wan_link_gbps: Option<u64>,
        #[serde(default)]
        link_latency_us: Option<u64>,
        #[serde(default)]
        wan_latency_us: Option<u64>,
    },
    Explicit {
        nodes: Vec<NodeSpec>,
        links: Vec<LinkSpec>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSpec {
    pub a: String,
    pub b: String,
    pub gbps: u64,
    pub latency_us: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowSpec {
    pub src: String,
    pub dst: String,
    pub size_bytes: u64,
    #[serde(default)]
    pub start_us: u64,
    #[serde(default)]
    pub src_port: Option<u16>,
    #[serde(default)]
    pub dst_port: Option<u16>,
    /// 为空时使用 routing.payload_bytes
    #[serde(default)]
    pub pkt_bytes: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkAction {
    #[default]
    Down,
    Up,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkEventSpec {
    pub at_us: u64,
    pub a: String,
    pub b: String,
    #[serde(default)]
    pub action: LinkAction,
}

impl ScenarioSpec {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let spec: ScenarioSpec = serde_json::from_str(raw)?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(ConfigError::Validation(format!(
                "unsupported schema_version {} (expected {})",
                self.schema_version, SCHEMA_VERSION
            )));
        }
        self.routing.validate()?;
        if let TopologySpec::DciPair {
            hosts_per_dc,
            wan_paths,
            ..
        } = &self.topology
        {
            if *hosts_per_dc == 0 || *wan_paths == 0 {
                return Err(ConfigError::Validation(
                    "dci_pair needs at least one host per DC and one WAN path".into(),
                ));
            }
        }
        for (i, f) in self.flows.iter().enumerate() {
            if f.size_bytes == 0 {
                return Err(ConfigError::Validation(format!("flows[{i}].size_bytes must be > 0")));
            }
            if f.pkt_bytes == Some(0) {
                return Err(ConfigError::Validation(format!("flows[{i}].pkt_bytes must be > 0")));
            }
        }
        Ok(())
    }
}
