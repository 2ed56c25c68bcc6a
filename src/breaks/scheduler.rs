use std::sync::Arc;

use log::{info, warn};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::utils::callback::invoke_guarded;

use super::state::{
    BreakDue, BreakSettings, ScheduleSettingsUpdate, ScheduleState, SchedulerStatistics,
    SchedulerStatus, TickOutcome,
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

const TICK_INTERVAL: Duration = Duration::from_secs(1);
const IDLE_TICK_INTERVAL: Duration = Duration::from_secs(5);
const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

pub type BreakCallback = Arc<dyn Fn(BreakDue) -> anyhow::Result<()> + Send + Sync>;

struct Ticker {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

/// Work/break timer driven by a one-second background ticker.
#[derive(Clone)]
pub struct BreakScheduler {
    state: Arc<Mutex<ScheduleState>>,
    ticker: Arc<Mutex<Option<Ticker>>>,
    on_break: BreakCallback,
}

impl BreakScheduler {
    pub fn new(settings: BreakSettings, on_break: BreakCallback) -> Self {
        Self {
            state: Arc::new(Mutex::new(ScheduleState::new(settings, Instant::now()))),
            ticker: Arc::new(Mutex::new(None)),
            on_break,
        }
    }

    pub async fn start(&self) {
        let mut ticker = self.ticker.lock().await;
        if ticker.is_some() {
            warn!("Break scheduler already running");
            return;
        }

        let work_interval = {
            let mut state = self.state.lock().await;
            state.start(Instant::now());
            state.settings.work_interval
        };

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(scheduler_loop(
            Arc::clone(&self.state),
            Arc::clone(&self.on_break),
            cancel_token.clone(),
        ));
        *ticker = Some(Ticker {
            handle,
            cancel_token,
        });

        info!(
            "Break scheduler started, first break in {}s",
            work_interval.as_secs()
        );
    }

    pub async fn stop(&self) {
        let Some(Ticker {
            mut handle,
            cancel_token,
        }) = self.ticker.lock().await.take()
        else {
            return;
        };

        cancel_token.cancel();
        match tokio::time::timeout(STOP_JOIN_TIMEOUT, &mut handle).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!("Break scheduler task ended abnormally: {err}"),
            Err(_) => {
                warn!(
                    "Break scheduler did not stop within {}s, aborting",
                    STOP_JOIN_TIMEOUT.as_secs()
                );
                handle.abort();
            }
        }

        self.state.lock().await.stop(Instant::now());
        info!("Break scheduler stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.ticker.lock().await.is_some()
    }

    /// `Some(duration)` pauses temporarily, `None` until [`BreakScheduler::resume`].
    pub async fn pause(&self, duration: Option<Duration>) {
        self.state.lock().await.pause(duration, Instant::now());
        match duration {
            Some(duration) => info!("Breaks paused for {}s", duration.as_secs()),
            None => info!("Breaks paused until resumed"),
        }
    }

    pub async fn resume(&self) {
        self.state.lock().await.resume(Instant::now());
        info!("Breaks resumed");
    }

    pub async fn record_activity(&self) {
        self.state.lock().await.record_activity(Instant::now());
    }

    /// Returns false when there was no outstanding break to complete.
    pub async fn break_completed(&self) -> bool {
        let recorded = self.state.lock().await.break_completed();
        if recorded {
            info!("Break completed");
        }
        recorded
    }

    /// Returns false when there was no outstanding break to skip.
    pub async fn break_skipped(&self) -> bool {
        let recorded = self.state.lock().await.break_skipped();
        if recorded {
            info!("Break skipped");
        }
        recorded
    }

    pub async fn trigger_break_now(&self) -> BreakDue {
        let due = self.state.lock().await.fire(Instant::now());
        info!("Break triggered manually (#{})", due.breaks_offered);
        deliver(&self.on_break, due.clone());
        due
    }

    /// Restarts the countdown without touching pauses or counters.
    pub async fn reset_timer(&self) {
        self.state.lock().await.rebase(Instant::now());
        info!("Break timer reset");
    }

    pub async fn get_time_until_break(&self) -> Duration {
        self.state.lock().await.time_until_break(Instant::now())
    }

    pub async fn get_status(&self) -> SchedulerStatus {
        self.state.lock().await.status(Instant::now())
    }

    pub async fn get_statistics(&self) -> SchedulerStatistics {
        self.state.lock().await.statistics(Instant::now())
    }

    pub async fn update_settings(&self, update: ScheduleSettingsUpdate) {
        let mut state = self.state.lock().await;
        state.apply_update(&update, Instant::now());
        info!(
            "Break settings updated: every {}s for {}s, enabled={}",
            state.settings.work_interval.as_secs(),
            state.settings.break_duration_seconds,
            state.settings.enabled
        );
    }

    pub async fn settings(&self) -> BreakSettings {
        self.state.lock().await.settings.clone()
    }
}

fn deliver(on_break: &BreakCallback, due: BreakDue) {
    let on_break = Arc::clone(on_break);
    invoke_guarded("break", move || on_break(due));
}

async fn scheduler_loop(
    state: Arc<Mutex<ScheduleState>>,
    on_break: BreakCallback,
    cancel_token: CancellationToken,
) {
    loop {
        let outcome = state.lock().await.tick(Instant::now());

        let wait = match outcome {
            TickOutcome::BreakDue(due) => {
                log_info!(
                    "break #{} due, next at {}",
                    due.breaks_offered,
                    due.next_break_at
                );
                deliver(&on_break, due);
                TICK_INTERVAL
            }
            TickOutcome::Idle => {
                log_debug!("user idle, skipping break tick");
                IDLE_TICK_INTERVAL
            }
            TickOutcome::Paused | TickOutcome::Waiting => TICK_INTERVAL,
        };

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = cancel_token.cancelled() => {
                log_info!("break scheduler loop shutting down");
                break;
            }
        }
    }
}
