//! Background refresh loop.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use crate::aggregator::RateAggregator;
use crate::config::RatesConfig;

/// Scheduler lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
}

/// Runs the aggregator on a fixed interval until stopped.
///
/// Failures of a run are logged and never end the loop. `stop` interrupts the
/// sleep between runs but does not cancel a run already in progress.
pub struct RefreshScheduler {
    aggregator: Arc<RateAggregator>,
    interval: RwLock<Duration>,
    min_interval: Duration,
    state: RwLock<SchedulerState>,
    completed_runs: AtomicU64,
    shutdown_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshScheduler {
    /// Create a stopped scheduler. `interval` is clamped to `min_interval`.
    pub fn new(aggregator: Arc<RateAggregator>, interval: Duration, min_interval: Duration) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            aggregator,
            interval: RwLock::new(clamp(interval, min_interval)),
            min_interval,
            state: RwLock::new(SchedulerState::Stopped),
            completed_runs: AtomicU64::new(0),
            shutdown_tx,
            task: Mutex::new(None),
        }
    }

    pub fn from_config(aggregator: Arc<RateAggregator>, config: &RatesConfig) -> Self {
        Self::new(aggregator, config.refresh_interval, config.min_refresh_interval)
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.read()
    }

    pub fn interval(&self) -> Duration {
        *self.interval.read()
    }

    /// Runs finished since creation, successful or not.
    pub fn completed_runs(&self) -> u64 {
        self.completed_runs.load(Ordering::SeqCst)
    }

    /// Change the interval, effective from the next sleep.
    pub fn set_interval(&self, interval: Duration) {
        let clamped = clamp(interval, self.min_interval);
        if clamped != interval {
            warn!(
                requested_secs = interval.as_secs_f64(),
                min_secs = self.min_interval.as_secs_f64(),
                "Refresh interval below minimum, clamping"
            );
        }
        *self.interval.write() = clamped;
    }

    /// Spawn the refresh loop. Returns `false` if it is already running.
    #[instrument(skip(self))]
    pub fn start(self: &Arc<Self>) -> bool {
        {
            let mut state = self.state.write();
            if *state == SchedulerState::Running {
                warn!("Scheduler already running");
                return false;
            }
            *state = SchedulerState::Running;
        }

        self.shutdown_tx.send_replace(false);
        let shutdown_rx = self.shutdown_tx.subscribe();

        let scheduler = Arc::clone(self);
        let handle = tokio::spawn(async move {
            scheduler.run_loop(shutdown_rx).await;
        });
        *self.task.lock() = Some(handle);

        info!(interval_secs = self.interval().as_secs_f64(), "Scheduler started");
        true
    }

    /// Signal the loop to stop and wait for it to exit.
    #[instrument(skip(self))]
    pub async fn stop(&self) {
        self.shutdown_tx.send_replace(true);

        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "Scheduler task ended abnormally");
            }
        }

        *self.state.write() = SchedulerState::Stopped;
        info!("Scheduler stopped");
    }

    async fn run_loop(&self, mut shutdown_rx: watch::Receiver<bool>) {
        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            self.run_once().await;

            let interval = self.interval();
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
    }

    async fn run_once(&self) {
        let outcome = AssertUnwindSafe(self.aggregator.run_update()).catch_unwind().await;

        match outcome {
            Ok(Ok(result)) if result.has_rates() => {
                info!(
                    rates = result.total_rates,
                    failed = ?result.failed_sources,
                    "Scheduled refresh completed"
                );
            }
            Ok(Ok(result)) => {
                warn!(failed = ?result.failed_sources, "Scheduled refresh produced no rates");
            }
            Ok(Err(e)) => {
                error!(error = %e, code = e.error_code(), "Scheduled refresh failed");
            }
            Err(_) => {
                error!("Scheduled refresh panicked");
            }
        }

        self.completed_runs.fetch_add(1, Ordering::SeqCst);
    }
}

fn clamp(interval: Duration, min: Duration) -> Duration {
    interval.max(min)
}
