/// 配置管理

use common::models::constants;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub backend_url: String,
    pub collect_interval: u64,
    pub error_backoff: u64,
    pub request_timeout: u64,
    pub cpu_sample_window_ms: u64,
    pub log_level: String,
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源加载配置
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend_url = lookup("BACKEND_URL")
            .unwrap_or_else(|| constants::DEFAULT_BACKEND_URL.to_string())
            .trim()
            .to_string();
        if backend_url.is_empty() {
            return Err(common::Error::Config("BACKEND_URL 不能为空".to_string()).into());
        }

        let collect_interval = positive_number(
            &lookup,
            "COLLECT_INTERVAL",
            constants::DEFAULT_COLLECT_INTERVAL,
        )?;

        let error_backoff =
            positive_number(&lookup, "ERROR_BACKOFF", constants::DEFAULT_ERROR_BACKOFF)?;

        let request_timeout = positive_number(
            &lookup,
            "REQUEST_TIMEOUT",
            constants::DEFAULT_REQUEST_TIMEOUT,
        )?;

        let cpu_sample_window_ms = positive_number(
            &lookup,
            "CPU_SAMPLE_WINDOW_MS",
            constants::DEFAULT_CPU_SAMPLE_WINDOW_MS,
        )?;

        let log_level = lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            backend_url,
            collect_interval,
            error_backoff,
            request_timeout,
            cpu_sample_window_ms,
            log_level,
        })
    }

    /// 指标上报地址
    pub fn metrics_endpoint(&self) -> String {
        format!(
            "{}{}",
            self.backend_url.trim_end_matches('/'),
            constants::METRICS_PATH
        )
    }

    pub fn collect_interval(&self) -> Duration {
        Duration::from_secs(self.collect_interval)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn cpu_sample_window(&self) -> Duration {
        Duration::from_millis(self.cpu_sample_window_ms)
    }
}

fn positive_number<F>(lookup: &F, key: &str, default: u64) -> anyhow::Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let value = match lookup(key) {
        Some(raw) => raw.trim().parse::<u64>().map_err(|e| {
            common::Error::Config(format!("{} 不是有效的数字 ({}): {}", key, raw, e))
        })?,
        None => default,
    };

    if value == 0 {
        return Err(common::Error::Config(format!("{} 必须大于 0", key)).into());
    }

    Ok(value)
}
