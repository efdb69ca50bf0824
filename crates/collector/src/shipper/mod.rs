/// 指标发送
/// 
/// 将采样中的每一项指标独立发送到后端

pub mod http;

use async_trait::async_trait;
use common::{MetricName, MetricSample, MetricValue, Result};

pub use http::HttpShipper;

/// 单条指标的发送结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// 收到了后端响应（不区分状态码）
    Sent { status: u16 },
    /// 传输层失败：超时、连接被拒绝、DNS 失败等
    Failed { error: String },
}

impl DeliveryOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent { .. })
    }

    /// 后端返回了 4xx/5xx
    pub fn is_error_status(&self) -> bool {
        matches!(self, Self::Sent { status } if *status >= 400)
    }
}

/// 一次发送的结果汇总，按发送顺序排列
#[derive(Debug, Clone, Default)]
pub struct ShipReport {
    pub deliveries: Vec<(MetricName, MetricValue, DeliveryOutcome)>,
}

impl ShipReport {
    pub fn record(&mut self, name: MetricName, value: MetricValue, outcome: DeliveryOutcome) {
        self.deliveries.push((name, value, outcome));
    }

    pub fn attempted(&self) -> usize {
        self.deliveries.len()
    }

    pub fn sent(&self) -> usize {
        self.deliveries.iter().filter(|(_, _, o)| o.is_sent()).count()
    }

    pub fn failed(&self) -> usize {
        self.attempted() - self.sent()
    }

    pub fn error_statuses(&self) -> usize {
        self.deliveries
            .iter()
            .filter(|(_, _, o)| o.is_error_status())
            .count()
    }
}

/// 发送器 Trait
#[async_trait]
pub trait Shipper: Send + Sync {
    /// 发送一次采样中的全部指标
    async fn send(&self, sample: &MetricSample) -> Result<ShipReport>;
}
