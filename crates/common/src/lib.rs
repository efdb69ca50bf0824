/// Host Metrics Collector - 公共库
/// 
/// 提供指标数据模型、线路格式、统一错误处理与工具函数

pub mod errors;
pub mod models;
pub mod utils;

// 重新导出常用类型
pub use errors::{Error, Result};
pub use models::{MetricName, MetricPayload, MetricSample, MetricValue};
