//! Background timers: the "now" tick and the periodic staleness check.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::refresh::{RefreshOutcome, UvRefresher};

pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_CLOCK_TICK: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
pub struct SchedulerSettings {
    /// How often the staleness policy is consulted
    pub check_interval: Duration,
    /// How often the "now" marker moves
    pub clock_tick: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            check_interval: DEFAULT_CHECK_INTERVAL,
            clock_tick: DEFAULT_CLOCK_TICK,
        }
    }
}

impl SchedulerSettings {
    /// Replace zero periods with the defaults. `tokio::time::interval`
    /// panics on a zero period.
    pub fn sanitized(self) -> Self {
        let mut settings = self;
        if settings.check_interval.is_zero() {
            tracing::warn!(
                "Zero check interval, using {:?}",
                DEFAULT_CHECK_INTERVAL
            );
            settings.check_interval = DEFAULT_CHECK_INTERVAL;
        }
        if settings.clock_tick.is_zero() {
            tracing::warn!("Zero clock tick, using {:?}", DEFAULT_CLOCK_TICK);
            settings.clock_tick = DEFAULT_CLOCK_TICK;
        }
        settings
    }
}

/// Owns the two timer tasks. Stopping or dropping the scheduler cancels
/// both, so nothing keeps ticking against a discarded refresher.
pub struct RefreshScheduler {
    cancel: CancellationToken,
    now_rx: watch::Receiver<DateTime<Utc>>,
    tasks: Vec<JoinHandle<()>>,
}

impl RefreshScheduler {
    /// Spawn the timers on the current tokio runtime. The first staleness
    /// check runs immediately.
    pub fn start(
        refresher: Arc<UvRefresher>,
        clock: Arc<dyn Clock>,
        settings: SchedulerSettings,
    ) -> Self {
        let settings = settings.sanitized();
        let cancel = CancellationToken::new();
        let (now_tx, now_rx) = watch::channel(clock.now());

        let staleness_task = tokio::spawn(run_staleness_checks(
            refresher,
            settings.check_interval,
            cancel.child_token(),
        ));
        let clock_task = tokio::spawn(run_clock_tick(
            clock,
            now_tx,
            settings.clock_tick,
            cancel.child_token(),
        ));

        tracing::info!(
            check_interval = ?settings.check_interval,
            clock_tick = ?settings.clock_tick,
            "Refresh scheduler started"
        );
        Self {
            cancel,
            now_rx,
            tasks: vec![staleness_task, clock_task],
        }
    }

    /// Receiver for the current instant, updated every clock tick
    pub fn now(&self) -> watch::Receiver<DateTime<Utc>> {
        self.now_rx.clone()
    }

    /// Cancel the timers and wait for both tasks to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                tracing::error!("Scheduler task ended abnormally: {}", e);
            }
        }
        tracing::info!("Refresh scheduler stopped");
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_staleness_checks(
    refresher: Arc<UvRefresher>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = interval.tick() => {
                match refresher.refresh_if_needed().await {
                    RefreshOutcome::Applied { points } => {
                        tracing::debug!(points, "Periodic check refreshed UV data");
                    }
                    outcome => tracing::trace!(?outcome, "Periodic check done"),
                }
            }
        }
    }
}

async fn run_clock_tick(
    clock: Arc<dyn Clock>,
    now_tx: watch::Sender<DateTime<Utc>>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The channel already holds the starting instant
    interval.tick().await;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = interval.tick() => {
                now_tx.send_replace(clock.now());
            }
        }
    }
}
