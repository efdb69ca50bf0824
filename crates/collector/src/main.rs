/// Host Metrics Collector
///
/// 定时采集主机资源指标，并逐条发送到后端

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod config;
mod metrics;
mod runner;
mod shipper;

use metrics::HostSampler;
use runner::CollectorLoop;
use shipper::HttpShipper;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // 加载配置
    dotenvy::dotenv().ok();
    let cfg = config::Config::from_env()?;

    // 初始化日志
    // RUST_LOG 优先，未设置时使用 LOG_LEVEL，例如：
    // RUST_LOG=metrics_collector=debug cargo run
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.log_level))
        )
        .init();

    info!("🚀 启动指标采集器...");

    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());
    info!("📌 主机: {}", hostname);

    let sampler = HostSampler::new(cfg.cpu_sample_window());
    let shipper = HttpShipper::new(cfg.metrics_endpoint(), cfg.request_timeout())?;
    info!("🎯 上报地址: {}", shipper.endpoint());

    let shutdown = CancellationToken::new();
    tokio::spawn(watch_shutdown_signal(shutdown.clone()));

    let mut collector = CollectorLoop::new(
        sampler,
        shipper,
        cfg.collect_interval(),
        cfg.error_backoff(),
        shutdown,
    );
    collector.run().await;

    let stats = collector.stats();
    info!(
        "✅ 已退出: 完成 {} 轮，失败 {} 轮，最后状态 {:?}",
        stats.cycles_completed,
        stats.cycles_failed,
        collector.state()
    );

    Ok(())
}

/// 等待 Ctrl-C 或 SIGTERM，收到后通知采集循环停止
async fn watch_shutdown_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("收到 Ctrl-C"),
                    _ = sigterm.recv() => info!("收到 SIGTERM"),
                }
            }
            Err(e) => {
                warn!("注册 SIGTERM 处理失败: {}", e);
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("注册 Ctrl-C 处理失败: {}", e);
                    return;
                }
                info!("收到 Ctrl-C");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("注册 Ctrl-C 处理失败: {}", e);
            return;
        }
        info!("收到 Ctrl-C");
    }

    shutdown.cancel();
}
