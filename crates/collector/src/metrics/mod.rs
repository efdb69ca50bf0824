/// 指标采集
/// 
/// 从操作系统读取主机资源信息，生成一次采样

pub mod connections;
pub mod sampler;

use async_trait::async_trait;
use common::{MetricSample, Result};

pub use sampler::HostSampler;

/// 采样器 Trait
#[async_trait]
pub trait Sampler: Send {
    /// 采集一次全部指标
    async fn collect(&mut self) -> Result<MetricSample>;
}
