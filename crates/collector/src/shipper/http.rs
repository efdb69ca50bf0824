/// HTTP 发送器
///
/// 每条指标一个 POST 请求，失败只记录日志，不重试

use async_trait::async_trait;
use common::{MetricPayload, MetricSample, Result};
use std::time::Duration;
use tracing::{error, info, warn};

use super::{DeliveryOutcome, ShipReport, Shipper};

pub struct HttpShipper {
    /// 上报地址，例如 http://backend:5000/api/metrics
    endpoint: String,
    client: reqwest::Client,
}

impl HttpShipper {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| common::Error::Transport(format!("创建 HTTP 客户端失败: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// 发送单条指标
    async fn post(&self, payload: &MetricPayload) -> DeliveryOutcome {
        match self.client.post(&self.endpoint).json(payload).send().await {
            Ok(response) => DeliveryOutcome::Sent {
                status: response.status().as_u16(),
            },
            // 带上完整错误链，区分超时、连接被拒绝等
            Err(e) => DeliveryOutcome::Failed {
                error: format!("{:#}", anyhow::Error::from(e)),
            },
        }
    }
}

#[async_trait]
impl Shipper for HttpShipper {
    async fn send(&self, sample: &MetricSample) -> Result<ShipReport> {
        let mut report = ShipReport::default();

        for (name, value) in sample.iter() {
            let payload = MetricPayload::new(name, value);
            let outcome = self.post(&payload).await;

            match &outcome {
                DeliveryOutcome::Sent { status } if outcome.is_error_status() => {
                    // 非 2xx 仍视为已发送，只提高日志级别
                    warn!("已发送 {}: {} - 状态码: {}", name, value, status);
                }
                DeliveryOutcome::Sent { status } => {
                    info!("已发送 {}: {} - 状态码: {}", name, value, status);
                }
                DeliveryOutcome::Failed { error } => {
                    error!("发送 {} 失败: {}", name, error);
                }
            }

            report.record(name, value, outcome);
        }

        Ok(report)
    }
}
