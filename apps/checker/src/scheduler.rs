use std::sync::Arc;
use std::time::{Duration, Instant};

use broker::unix_now;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

use crate::checker::{CheckType, Checker};
use crate::types::CheckResult;

/// A monitor ready to be scheduled
pub struct Monitor {
    pub name: String,
    pub check_type: CheckType,
    pub target: String,
    pub interval: Duration,
    pub checker: Arc<dyn Checker>,
}

impl Monitor {
    /// Run the probe once, timing it
    pub async fn probe(&self) -> CheckResult {
        let time = unix_now();
        let start = Instant::now();
        let outcome = self.checker.check(&self.target).await;
        let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        let (up, message) = match outcome {
            Ok(message) => (true, message),
            Err(err) => (false, format!("{err:#}")),
        };

        CheckResult {
            monitor: self.name.clone(),
            check_type: self.check_type,
            target: self.target.clone(),
            time,
            up,
            message,
            latency_ms,
        }
    }
}

/// Runs every monitor on its own timer and funnels results into one channel
pub struct MonitoringScheduler {
    result_tx: mpsc::Sender<CheckResult>,
    shutdown: CancellationToken,
}

impl MonitoringScheduler {
    pub fn new(result_tx: mpsc::Sender<CheckResult>, shutdown: CancellationToken) -> Self {
        Self { result_tx, shutdown }
    }

    /// Schedule a single monitor for periodic checking
    pub fn schedule_monitor(&self, monitor: Monitor) -> JoinHandle<()> {
        let result_tx = self.result_tx.clone();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            let mut timer = interval(monitor.interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = timer.tick() => {}
                }

                let result = monitor.probe().await;

                if let Err(e) = result_tx.send(result).await {
                    tracing::error!("Failed to send check result: {}", e);
                    break;
                }
            }
        })
    }

    /// Schedule multiple monitors
    pub fn schedule_monitors(&self, monitors: Vec<Monitor>) -> Vec<JoinHandle<()>> {
        monitors.into_iter().map(|monitor| self.schedule_monitor(monitor)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, anyhow};

    struct Fixed(bool);

    #[async_trait::async_trait]
    impl Checker for Fixed {
        async fn check(&self, _target: &str) -> Result<String> {
            if self.0 { Ok("fine".into()) } else { Err(anyhow!("refused")) }
        }
    }

    fn monitor(name: &str, up: bool, seconds: u64) -> Monitor {
        Monitor {
            name: name.into(),
            check_type: CheckType::Tcp,
            target: "db.internal:5432".into(),
            interval: Duration::from_secs(seconds),
            checker: Arc::new(Fixed(up)),
        }
    }

    #[tokio::test]
    async fn test_probe_reports_failure_message() {
        let result = monitor("db", false, 1).probe().await;
        assert!(!result.up);
        assert_eq!(result.message, "refused");
        assert_eq!(result.monitor, "db");
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitors_run_on_their_own_frequency() {
        let (tx, mut rx) = mpsc::channel(64);
        let shutdown = CancellationToken::new();
        let scheduler = MonitoringScheduler::new(tx, shutdown.clone());

        let handles =
            scheduler.schedule_monitors(vec![monitor("fast", true, 10), monitor("slow", true, 30)]);

        // fast: 0s, 10s, 20s, 30s, 40s; slow: 0s, 30s
        tokio::time::sleep(Duration::from_secs(45)).await;
        shutdown.cancel();
        for handle in handles {
            handle.await.unwrap();
        }
        drop(scheduler);

        let mut fast = 0;
        let mut slow = 0;
        while let Some(result) = rx.recv().await {
            match result.monitor.as_str() {
                "fast" => fast += 1,
                _ => slow += 1,
            }
        }
        assert_eq!((fast, slow), (5, 2));
    }
}
