/// 主机指标采样器
///
/// 使用 sysinfo 收集系统资源信息

use async_trait::async_trait;
use common::utils::{bytes_to_gib, clamp_percent, format_bytes, used_percent};
use common::{MetricName, MetricSample, Result};
use std::time::Duration;
use sysinfo::{Networks, System, MINIMUM_CPU_UPDATE_INTERVAL};
#[cfg(unix)]
use common::utils::fs_used_percent;
#[cfg(not(unix))]
use std::path::Path;
#[cfg(not(unix))]
use sysinfo::Disks;
use tracing::{debug, warn};

use super::{connections, Sampler};

pub struct HostSampler {
    system: System,
    cpu_window: Duration,
    /// 连接数不可用的告警只打印一次
    connections_warned: bool,
}

impl HostSampler {
    pub fn new(cpu_window: Duration) -> Self {
        Self {
            system: System::new(),
            cpu_window: cpu_window.max(MINIMUM_CPU_UPDATE_INTERVAL),
            connections_warned: false,
        }
    }

    /// 获取 CPU 使用率
    ///
    /// 在观测窗口内阻塞，窗口前后各刷新一次
    async fn cpu_usage(&mut self) -> f64 {
        self.system.refresh_cpu_usage();
        tokio::time::sleep(self.cpu_window).await;
        self.system.refresh_cpu_usage();
        clamp_percent(self.system.global_cpu_usage() as f64)
    }

    /// 获取内存使用率
    fn memory_usage(&mut self) -> f64 {
        self.system.refresh_memory();
        let total = self.system.total_memory();
        let available = self.system.available_memory();
        if total == 0 {
            warn!("无法获取内存总量，内存使用率记为 0");
        }
        used_percent(total, available)
    }

    /// 获取根文件系统使用率
    ///
    /// 与 df 口径一致，保留块不计为已用
    #[cfg(unix)]
    fn disk_usage(&self) -> f64 {
        use nix::sys::statvfs::statvfs;

        match statvfs("/") {
            Ok(stat) => fs_used_percent(
                stat.blocks() as u64,
                stat.blocks_free() as u64,
                stat.blocks_available() as u64,
            ),
            Err(e) => {
                warn!("读取根文件系统信息失败，磁盘使用率记为 0: {}", e);
                0.0
            }
        }
    }

    /// 获取根文件系统使用率
    #[cfg(not(unix))]
    fn disk_usage(&self) -> f64 {
        let disks = Disks::new_with_refreshed_list();
        match disks
            .list()
            .iter()
            .find(|disk| disk.mount_point() == Path::new("/"))
        {
            Some(root) => used_percent(root.total_space(), root.available_space()),
            None => {
                warn!("未找到根文件系统挂载点，磁盘使用率记为 0");
                0.0
            }
        }
    }

    /// 获取累计发送量（GiB）
    ///
    /// 计数器在主机重启后归零，此时数值会回落
    fn network_sent(&self) -> f64 {
        let networks = Networks::new_with_refreshed_list();
        let bytes: u64 = networks
            .iter()
            .map(|(_, data)| data.total_transmitted())
            .sum();
        debug!("累计发送字节: {}", format_bytes(bytes));
        bytes_to_gib(bytes)
    }

    /// 获取活跃连接数
    fn active_connections(&mut self) -> Option<u64> {
        let count = connections::count_established();
        if count.is_none() && !self.connections_warned {
            warn!("当前主机无法枚举 TCP 连接，active_connections 将不会上报");
            self.connections_warned = true;
        }
        count
    }
}

#[async_trait]
impl Sampler for HostSampler {
    async fn collect(&mut self) -> Result<MetricSample> {
        let mut sample = MetricSample::new();

        sample.insert(MetricName::CpuUsage, self.cpu_usage().await);
        sample.insert(MetricName::MemoryUsage, self.memory_usage());
        sample.insert(MetricName::DiskUsage, self.disk_usage());
        sample.insert(MetricName::NetworkSent, self.network_sent());
        if let Some(count) = self.active_connections() {
            sample.insert(MetricName::ActiveConnections, count);
        }

        debug!("采样完成: {} 项指标 ({})", sample.len(), sample.collected_at());
        Ok(sample)
    }
}
