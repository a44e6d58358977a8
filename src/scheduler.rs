//! Drives request executors over time according to the selected profile.
//!
//! Rate-paced and budget-paced runs advance in ticks: every URL gets a batch
//! of concurrent requests, the batch is awaited, then the loop sleeps until
//! the next tick. Saturation runs fire everything up front and cancel what is
//! still in flight once the duration is over.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::{Profile, RunConfig};
use crate::error::EngineError;
use crate::executor::Executor;
use crate::stats::{StatsSnapshot, StatsStore};

pub struct Scheduler {
    config: RunConfig,
    stats: Arc<StatsStore>,
    cancel: CancellationToken,
    progress_tx: watch::Sender<u8>,
}

impl Scheduler {
    pub fn new(config: RunConfig) -> Self {
        let (progress_tx, _) = watch::channel(0);
        Scheduler {
            config,
            stats: Arc::new(StatsStore::new()),
            cancel: CancellationToken::new(),
            progress_tx,
        }
    }

    /// Cancelling this token ends the run early. Ticks already launched are
    /// awaited; saturation requests in flight are cancelled and counted.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run progress as a percentage in `0..=100`, replaced on every update.
    pub fn progress_rx(&self) -> watch::Receiver<u8> {
        self.progress_tx.subscribe()
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Runs the configured profile to completion and returns the final
    /// statistics. The pooled client lives exactly as long as this call.
    pub async fn run(self) -> Result<StatsSnapshot, EngineError> {
        let executor = Executor::new(self.stats.clone(), self.config.timeout)?;
        let start = Instant::now();

        tracing::info!(
            profile = %self.config.profile,
            clients = self.config.clients,
            duration = self.config.duration_secs,
            urls = self.config.urls.len(),
            "Starting run"
        );

        match self.config.profile {
            Profile::RatePaced => self.run_rate_paced(&executor, start).await,
            Profile::BudgetPaced => self.run_budget_paced(&executor, start).await,
            Profile::Saturation => self.run_saturation(executor, start).await,
        }

        self.progress_tx.send_replace(100);
        tracing::info!(elapsed = ?start.elapsed(), "Run finished");

        Ok(self.stats.snapshot())
    }

    async fn run_rate_paced(&self, executor: &Executor, start: Instant) {
        let tick = self.config.tick();

        for second in 0..self.config.duration_secs {
            if self.cancel.is_cancelled() {
                tracing::info!(second, "Run cancelled");
                break;
            }
            self.publish(percent(second as f64, self.config.duration_secs as f64));

            for url in &self.config.urls {
                fire_batch(executor, url, self.config.clients).await;
            }

            // No catch-up: a slow tick just starts the next one late.
            let next = start + tick_offset(tick, second + 1);
            self.pause_until(next).await;
        }
    }

    async fn run_budget_paced(&self, executor: &Executor, start: Instant) {
        let per_tick = self.config.budget_per_tick();
        let tick = self.config.tick();
        tracing::debug!(per_tick, "Budget split across ticks");

        for second in 0..self.config.duration_secs {
            if self.cancel.is_cancelled() {
                tracing::info!(second, "Run cancelled");
                break;
            }
            self.publish_elapsed(start);

            for url in &self.config.urls {
                fire_batch(executor, url, per_tick).await;
            }

            // Overruns are not compensated for.
            self.pause_until(Instant::now() + tick).await;
        }
    }

    async fn run_saturation(&self, executor: Executor, start: Instant) {
        let in_flight = self.cancel.child_token();
        let mut tasks = JoinSet::new();

        for _ in 0..self.config.clients {
            for url in &self.config.urls {
                let executor = executor.clone();
                let url = url.clone();
                let cancel = in_flight.clone();
                tasks.spawn(async move {
                    executor.execute_until_cancelled(&url, &cancel).await;
                });
            }
        }
        drop(executor);
        tracing::debug!(tasks = tasks.len(), "Requests launched");

        let deadline = start + self.config.duration();
        let mut ticker = time::interval(self.config.tick());
        loop {
            tokio::select! {
                _ = time::sleep_until(deadline) => break,
                _ = self.cancel.cancelled() => {
                    tracing::info!("Run cancelled");
                    break;
                }
                _ = ticker.tick() => self.publish_elapsed(start),
            }
        }

        in_flight.cancel();
        while let Some(res) = tasks.join_next().await {
            if let Err(e) = res {
                tracing::warn!("Request task ended abnormally: {}", e);
            }
        }
    }

    async fn pause_until(&self, deadline: Instant) {
        tokio::select! {
            _ = time::sleep_until(deadline) => {}
            _ = self.cancel.cancelled() => {}
        }
    }

    fn publish_elapsed(&self, start: Instant) {
        let elapsed = start.elapsed().as_secs_f64();
        self.publish(percent(elapsed, self.config.duration().as_secs_f64()));
    }

    fn publish(&self, pct: u8) {
        self.progress_tx.send_replace(pct);
    }
}

async fn fire_batch(executor: &Executor, url: &str, count: usize) {
    join_all((0..count).map(|_| executor.execute(url))).await;
}

fn tick_offset(tick: Duration, ticks: u64) -> Duration {
    tick.saturating_mul(u32::try_from(ticks).unwrap_or(u32::MAX))
}

/// `done / total` as a whole percentage, capped at 100.
fn percent(done: f64, total: f64) -> u8 {
    if total <= 0.0 {
        return 100;
    }
    (done / total * 100.0).clamp(0.0, 100.0) as u8
}
