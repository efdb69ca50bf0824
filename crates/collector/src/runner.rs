/// 采集循环
///
/// 采样 → 发送 → 休眠，外层故障屏障保证循环不会因意外错误退出

use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::metrics::Sampler;
use crate::shipper::{ShipReport, Shipper};

/// 循环状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// 正常采集
    Running,
    /// 上一轮出错，处于退避等待中
    Recovering,
}

/// 循环统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub cycles_completed: u64,
    pub cycles_failed: u64,
}

pub struct CollectorLoop<S, H> {
    sampler: S,
    shipper: H,
    /// 采集间隔
    interval: Duration,
    /// 出错后的退避时间
    error_backoff: Duration,
    shutdown: CancellationToken,
    state: LoopState,
    stats: LoopStats,
}

impl<S, H> CollectorLoop<S, H>
where
    S: Sampler,
    H: Shipper,
{
    pub fn new(
        sampler: S,
        shipper: H,
        interval: Duration,
        error_backoff: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            sampler,
            shipper,
            interval,
            error_backoff,
            shutdown,
            state: LoopState::Running,
            stats: LoopStats::default(),
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    /// 运行直到收到停止信号
    pub async fn run(&mut self) {
        let shutdown = self.shutdown.clone();
        info!("🚀 启动指标采集循环 (间隔 {:?})", self.interval);

        loop {
            if self.state == LoopState::Recovering {
                info!("🔄 退避结束，恢复采集");
                self.state = LoopState::Running;
            }

            let started = Instant::now();
            let cycle = AssertUnwindSafe(self.run_cycle()).catch_unwind();

            let outcome = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                outcome = cycle => outcome,
            };

            let delay = match outcome {
                Ok(Ok(report)) => {
                    self.stats.cycles_completed += 1;
                    info!(
                        "📊 本轮完成: 成功 {}/{}（错误状态码 {}），失败 {}，耗时 {:?}",
                        report.sent(),
                        report.attempted(),
                        report.error_statuses(),
                        report.failed(),
                        started.elapsed()
                    );
                    self.interval
                }
                Ok(Err(e)) => self.enter_recovering(&e.to_string()),
                Err(panic) => self.enter_recovering(&panic_message(panic.as_ref())),
            };

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("👋 采集循环已停止");
    }

    /// 执行一轮采样和发送
    async fn run_cycle(&mut self) -> common::Result<ShipReport> {
        let sample = self.sampler.collect().await?;
        self.shipper.send(&sample).await
    }

    fn enter_recovering(&mut self, reason: &str) -> Duration {
        self.stats.cycles_failed += 1;
        self.state = LoopState::Recovering;
        error!("采集循环出错: {}", reason);
        warn!("{:?} 后重试...", self.error_backoff);
        self.error_backoff
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("panic: {}", msg)
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("panic: {}", msg)
    } else {
        "panic: 未知错误".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use common::{MetricName, MetricSample};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use tracing_test::traced_test;

    const INTERVAL: Duration = Duration::from_secs(15);
    const BACKOFF: Duration = Duration::from_secs(5);

    #[derive(Debug, Clone, Copy)]
    enum Step {
        Ok,
        Fail,
        Panic,
    }

    /// 按脚本返回结果的采样器，第 `stop_after` 次调用时触发停止
    struct ScriptedSampler {
        script: VecDeque<Step>,
        calls: Arc<Mutex<Vec<Instant>>>,
        stop_after: usize,
        shutdown: CancellationToken,
    }

    impl ScriptedSampler {
        fn new(script: &[Step], stop_after: usize, shutdown: CancellationToken) -> Self {
            Self {
                script: script.iter().copied().collect(),
                calls: Arc::new(Mutex::new(Vec::new())),
                stop_after,
                shutdown,
            }
        }
    }

    #[async_trait]
    impl Sampler for ScriptedSampler {
        async fn collect(&mut self) -> common::Result<MetricSample> {
            let call_count = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(Instant::now());
                calls.len()
            };
            if call_count >= self.stop_after {
                self.shutdown.cancel();
            }

            match self.script.pop_front().unwrap_or(Step::Ok) {
                Step::Ok => {
                    let mut sample = MetricSample::new();
                    sample.insert(MetricName::CpuUsage, 10.0);
                    Ok(sample)
                }
                Step::Fail => Err(common::Error::Sampling("模拟采样失败".to_string())),
                Step::Panic => panic!("模拟采样崩溃"),
            }
        }
    }

    /// 记录调用次数的发送器
    struct CountingShipper {
        script: Mutex<VecDeque<Step>>,
        calls: Arc<Mutex<usize>>,
    }

    impl CountingShipper {
        fn new(script: &[Step]) -> Self {
            Self {
                script: Mutex::new(script.iter().copied().collect()),
                calls: Arc::new(Mutex::new(0)),
            }
        }
    }

    #[async_trait]
    impl Shipper for CountingShipper {
        async fn send(&self, _sample: &MetricSample) -> common::Result<ShipReport> {
            *self.calls.lock().unwrap() += 1;
            let step = self.script.lock().unwrap().pop_front().unwrap_or(Step::Ok);
            match step {
                Step::Ok => Ok(ShipReport::default()),
                Step::Fail => Err(common::Error::Internal("模拟发送失败".to_string())),
                Step::Panic => panic!("模拟发送崩溃"),
            }
        }
    }

    fn gaps(calls: &[Instant]) -> Vec<Duration> {
        calls.windows(2).map(|w| w[1] - w[0]).collect()
    }

    #[test]
    fn test_failure_enters_recovering() {
        let mut runner = CollectorLoop::new(
            ScriptedSampler::new(&[], usize::MAX, CancellationToken::new()),
            CountingShipper::new(&[]),
            INTERVAL,
            BACKOFF,
            CancellationToken::new(),
        );
        assert_eq!(runner.state(), LoopState::Running);
        assert_eq!(runner.enter_recovering("断开"), BACKOFF);
        assert_eq!(runner.state(), LoopState::Recovering);
        assert_eq!(runner.stats().cycles_failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_steady_state_uses_interval() {
        let shutdown = CancellationToken::new();
        let sampler = ScriptedSampler::new(&[], 3, shutdown.clone());
        let calls = sampler.calls.clone();
        let shipper = CountingShipper::new(&[]);
        let shipped = shipper.calls.clone();

        let started = Instant::now();
        let mut runner = CollectorLoop::new(sampler, shipper, INTERVAL, BACKOFF, shutdown);
        runner.run().await;

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        // 启动后立即进行第一次采集
        assert_eq!(calls[0], started);
        assert_eq!(gaps(&calls), vec![INTERVAL, INTERVAL]);
        assert_eq!(*shipped.lock().unwrap(), 3);
        assert_eq!(
            runner.stats(),
            LoopStats { cycles_completed: 3, cycles_failed: 0 }
        );
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn test_sampling_error_backs_off_and_resumes() {
        let shutdown = CancellationToken::new();
        let sampler = ScriptedSampler::new(&[Step::Fail, Step::Ok], 3, shutdown.clone());
        let calls = sampler.calls.clone();
        let shipper = CountingShipper::new(&[]);
        let shipped = shipper.calls.clone();

        let mut runner = CollectorLoop::new(sampler, shipper, INTERVAL, BACKOFF, shutdown);
        runner.run().await;

        let calls = calls.lock().unwrap();
        assert_eq!(gaps(&calls), vec![BACKOFF, INTERVAL]);
        // 采样失败的那一轮不会发送
        assert_eq!(*shipped.lock().unwrap(), 2);
        assert_eq!(
            runner.stats(),
            LoopStats { cycles_completed: 2, cycles_failed: 1 }
        );
        assert_eq!(runner.state(), LoopState::Running);
        assert!(logs_contain("采集循环出错: 采样错误: 模拟采样失败"));
        assert!(logs_contain("退避结束，恢复采集"));
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn test_sampler_panic_is_caught() {
        let shutdown = CancellationToken::new();
        let sampler = ScriptedSampler::new(&[Step::Panic], 2, shutdown.clone());
        let calls = sampler.calls.clone();

        let mut runner = CollectorLoop::new(
            sampler,
            CountingShipper::new(&[]),
            INTERVAL,
            BACKOFF,
            shutdown,
        );
        runner.run().await;

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(gaps(&calls), vec![BACKOFF]);
        assert_eq!(runner.stats().cycles_failed, 1);
        assert!(logs_contain("采集循环出错: panic: 模拟采样崩溃"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shipper_failure_backs_off() {
        let shutdown = CancellationToken::new();
        let sampler = ScriptedSampler::new(&[], 4, shutdown.clone());
        let calls = sampler.calls.clone();
        let shipper = CountingShipper::new(&[Step::Fail, Step::Panic, Step::Ok]);

        let mut runner = CollectorLoop::new(sampler, shipper, INTERVAL, BACKOFF, shutdown);
        runner.run().await;

        let calls = calls.lock().unwrap();
        assert_eq!(gaps(&calls), vec![BACKOFF, BACKOFF, INTERVAL]);
        assert_eq!(
            runner.stats(),
            LoopStats { cycles_completed: 2, cycles_failed: 2 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_start_collects_nothing() {
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let sampler = ScriptedSampler::new(&[], usize::MAX, shutdown.clone());
        let calls = sampler.calls.clone();

        let mut runner = CollectorLoop::new(
            sampler,
            CountingShipper::new(&[]),
            INTERVAL,
            BACKOFF,
            shutdown,
        );
        runner.run().await;

        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(runner.stats(), LoopStats::default());
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "panic: boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "panic: bang");
        let boxed: Box<dyn Any + Send> = Box::new(42);
        assert_eq!(panic_message(boxed.as_ref()), "panic: 未知错误");
    }
}
