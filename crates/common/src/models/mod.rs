/// 共享数据模型
///
/// 定义指标名称、指标值、单次采样以及发送到后端的线路格式

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 指标名称
///
/// 固定集合，不支持动态扩展
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MetricName {
    CpuUsage,
    MemoryUsage,
    DiskUsage,
    NetworkSent,
    ActiveConnections,
}

impl MetricName {
    /// 按采集顺序排列的全部指标
    pub const ALL: [MetricName; 5] = [
        MetricName::CpuUsage,
        MetricName::MemoryUsage,
        MetricName::DiskUsage,
        MetricName::NetworkSent,
        MetricName::ActiveConnections,
    ];

    /// 转换为线路上使用的名称
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CpuUsage => "cpu_usage",
            Self::MemoryUsage => "memory_usage",
            Self::DiskUsage => "disk_usage",
            Self::NetworkSent => "network_sent",
            Self::ActiveConnections => "active_connections",
        }
    }

    /// 是否为百分比指标
    pub fn is_percentage(&self) -> bool {
        matches!(self, Self::CpuUsage | Self::MemoryUsage | Self::DiskUsage)
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 指标值
///
/// 序列化为裸 JSON 数字，整数不带小数部分
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MetricValue {
    Integer(u64),
    Float(f64),
}

impl MetricValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Integer(v) => *v as f64,
            Self::Float(v) => *v,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Self::Integer(_))
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<u64> for MetricValue {
    fn from(value: u64) -> Self {
        Self::Integer(value)
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
        }
    }
}

/// 单次采样结果
///
/// 保持插入顺序，重复插入同名指标时原位替换
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    collected_at: DateTime<Utc>,
    entries: Vec<(MetricName, MetricValue)>,
}

impl MetricSample {
    pub fn new() -> Self {
        Self {
            collected_at: Utc::now(),
            entries: Vec::with_capacity(MetricName::ALL.len()),
        }
    }

    /// 写入指标值
    pub fn insert(&mut self, name: MetricName, value: impl Into<MetricValue>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: MetricName) -> Option<MetricValue> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetricName, MetricValue)> + '_ {
        self.entries.iter().copied()
    }

    pub fn names(&self) -> Vec<MetricName> {
        self.entries.iter().map(|(n, _)| *n).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 采集时间，仅用于日志
    pub fn collected_at(&self) -> DateTime<Utc> {
        self.collected_at
    }
}

impl Default for MetricSample {
    fn default() -> Self {
        Self::new()
    }
}

/// 发送到后端的单条指标
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricPayload {
    pub metric_name: MetricName,
    pub value: MetricValue,
}

impl MetricPayload {
    pub fn new(metric_name: MetricName, value: MetricValue) -> Self {
        Self { metric_name, value }
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// 常量定义
pub mod constants {
    /// 默认后端地址
    pub const DEFAULT_BACKEND_URL: &str = "http://backend:5000";

    /// 指标上报路径
    pub const METRICS_PATH: &str = "/api/metrics";

    /// 默认采集间隔（秒）
    pub const DEFAULT_COLLECT_INTERVAL: u64 = 15;

    /// 默认出错退避时间（秒）
    pub const DEFAULT_ERROR_BACKOFF: u64 = 5;

    /// 默认请求超时（秒）
    pub const DEFAULT_REQUEST_TIMEOUT: u64 = 5;

    /// 默认 CPU 观测窗口（毫秒）
    pub const DEFAULT_CPU_SAMPLE_WINDOW_MS: u64 = 1000;
}
