use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::time::{Duration, Instant};

use crate::settings::AgentConfig;

/// Reported by `time_until_break` while any pause is in effect.
pub const PAUSED_SENTINEL: Duration = Duration::from_secs(99 * 60 * 60);

#[derive(Debug, Clone, PartialEq)]
pub struct BreakSettings {
    pub work_interval: Duration,
    pub break_duration_seconds: u32,
    pub enabled: bool,
    pub auto_pause_on_idle: bool,
    pub idle_threshold: Duration,
}

impl Default for BreakSettings {
    fn default() -> Self {
        Self::from(&AgentConfig::default())
    }
}

impl From<&AgentConfig> for BreakSettings {
    fn from(config: &AgentConfig) -> Self {
        Self {
            work_interval: minutes(config.work_interval_minutes),
            break_duration_seconds: config.break_duration_seconds,
            enabled: config.enable_breaks,
            auto_pause_on_idle: config.auto_pause_on_idle,
            idle_threshold: minutes(config.idle_threshold_minutes),
        }
    }
}

fn minutes(value: u32) -> Duration {
    Duration::from_secs(u64::from(value.max(1)) * 60)
}

/// Partial settings change; `None` leaves a field as it is.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScheduleSettingsUpdate {
    pub work_interval_minutes: Option<u32>,
    pub break_duration_seconds: Option<u32>,
    pub enable_breaks: Option<bool>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerPhase {
    Stopped,
    Running,
    Paused,
    TemporarilyPaused,
}

/// Payload of a fired break.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BreakDue {
    pub break_duration_seconds: u32,
    pub breaks_offered: u64,
    pub next_break_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Paused,
    Idle,
    Waiting,
    BreakDue(BreakDue),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SchedulerStatus {
    pub phase: SchedulerPhase,
    pub enabled: bool,
    pub time_until_break_seconds: u64,
    /// `None` while paused.
    pub next_break_at: Option<DateTime<Utc>>,
    pub paused_until: Option<DateTime<Utc>>,
    pub work_interval_seconds: u64,
    pub break_duration_seconds: u32,
    pub auto_pause_on_idle: bool,
    pub idle: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SchedulerStatistics {
    pub breaks_offered: u64,
    pub breaks_completed: u64,
    pub breaks_skipped: u64,
    pub compliance_rate: f64,
    pub total_work_seconds: u64,
    pub current_session_seconds: u64,
    pub seconds_since_last_break: u64,
}

/// The break timer. Every method takes the current monotonic time so the
/// state itself never reads a clock.
#[derive(Debug, Clone)]
pub struct ScheduleState {
    pub settings: BreakSettings,
    pub running: bool,
    pub last_break_at: Instant,
    pub next_break_at: Instant,
    pub paused_indefinitely: bool,
    pub paused_until: Option<Instant>,
    pub last_activity_at: Instant,
    pub breaks_offered: u64,
    pub breaks_completed: u64,
    pub breaks_skipped: u64,
    pub session_started_at: Option<Instant>,
    /// Time from earlier sessions; combines with `session_started_at`.
    pub accumulated_work: Duration,
}

impl ScheduleState {
    pub fn new(settings: BreakSettings, now: Instant) -> Self {
        Self {
            next_break_at: now + settings.work_interval,
            settings,
            running: false,
            last_break_at: now,
            paused_indefinitely: false,
            paused_until: None,
            last_activity_at: now,
            breaks_offered: 0,
            breaks_completed: 0,
            breaks_skipped: 0,
            session_started_at: None,
            accumulated_work: Duration::ZERO,
        }
    }

    pub fn start(&mut self, now: Instant) {
        self.running = true;
        self.paused_indefinitely = false;
        self.paused_until = None;
        self.last_activity_at = now;
        self.session_started_at = Some(now);
        self.rebase(now);
    }

    pub fn stop(&mut self, now: Instant) {
        if let Some(started) = self.session_started_at.take() {
            self.accumulated_work += now.saturating_duration_since(started);
        }
        self.running = false;
    }

    pub fn rebase(&mut self, now: Instant) {
        self.last_break_at = now;
        self.next_break_at = now + self.settings.work_interval;
    }

    pub fn pause(&mut self, duration: Option<Duration>, now: Instant) {
        match duration {
            Some(duration) => self.paused_until = Some(now + duration),
            None => self.paused_indefinitely = true,
        }
    }

    pub fn resume(&mut self, now: Instant) {
        self.paused_indefinitely = false;
        self.paused_until = None;
        self.rebase(now);
    }

    pub fn record_activity(&mut self, now: Instant) {
        self.last_activity_at = now;
    }

    fn outstanding_breaks(&self) -> u64 {
        self.breaks_offered
            .saturating_sub(self.breaks_completed + self.breaks_skipped)
    }

    /// Returns false, leaving the counters alone, if no offered break is outstanding.
    pub fn break_completed(&mut self) -> bool {
        if self.outstanding_breaks() == 0 {
            warn!("Ignoring break completion: no outstanding break");
            return false;
        }
        self.breaks_completed += 1;
        true
    }

    /// Returns false, leaving the counters alone, if no offered break is outstanding.
    pub fn break_skipped(&mut self) -> bool {
        if self.outstanding_breaks() == 0 {
            warn!("Ignoring break skip: no outstanding break");
            return false;
        }
        self.breaks_skipped += 1;
        true
    }

    /// Offers a break now and starts the next work interval.
    pub fn fire(&mut self, now: Instant) -> BreakDue {
        self.breaks_offered += 1;
        self.rebase(now);
        BreakDue {
            break_duration_seconds: self.settings.break_duration_seconds,
            breaks_offered: self.breaks_offered,
            next_break_at: wall_clock_at(self.next_break_at, now),
        }
    }

    pub fn temporarily_paused(&self, now: Instant) -> bool {
        self.paused_until.is_some_and(|until| now < until)
    }

    pub fn is_paused(&self, now: Instant) -> bool {
        self.paused_indefinitely || self.temporarily_paused(now)
    }

    pub fn is_idle(&self, now: Instant) -> bool {
        self.settings.auto_pause_on_idle
            && now.saturating_duration_since(self.last_activity_at) > self.settings.idle_threshold
    }

    pub fn phase(&self, now: Instant) -> SchedulerPhase {
        if !self.running {
            SchedulerPhase::Stopped
        } else if self.paused_indefinitely {
            SchedulerPhase::Paused
        } else if self.temporarily_paused(now) {
            SchedulerPhase::TemporarilyPaused
        } else {
            SchedulerPhase::Running
        }
    }

    pub fn time_until_break(&self, now: Instant) -> Duration {
        if self.is_paused(now) {
            return PAUSED_SENTINEL;
        }
        self.next_break_at.saturating_duration_since(now)
    }

    pub fn compliance_rate(&self) -> f64 {
        if self.breaks_offered == 0 {
            return 100.0;
        }
        (100.0 * self.breaks_completed as f64 / self.breaks_offered as f64).clamp(0.0, 100.0)
    }

    pub fn current_session(&self, now: Instant) -> Duration {
        self.session_started_at
            .map(|started| now.saturating_duration_since(started))
            .unwrap_or(Duration::ZERO)
    }

    pub fn total_work(&self, now: Instant) -> Duration {
        self.accumulated_work + self.current_session(now)
    }

    pub fn apply_update(&mut self, update: &ScheduleSettingsUpdate, now: Instant) {
        if let Some(value) = update.work_interval_minutes {
            self.settings.work_interval = minutes(value);
        }
        if let Some(value) = update.break_duration_seconds {
            self.settings.break_duration_seconds = value;
        }
        if let Some(value) = update.enable_breaks {
            self.settings.enabled = value;
        }
        self.rebase(now);
    }

    /// One step of the scheduler loop.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        if self.is_paused(now) {
            return TickOutcome::Paused;
        }

        if self.paused_until.take().is_some() {
            info!("Temporary pause expired, countdown continues");
        }

        if self.is_idle(now) {
            return TickOutcome::Idle;
        }

        if self.settings.enabled && now >= self.next_break_at {
            return TickOutcome::BreakDue(self.fire(now));
        }

        TickOutcome::Waiting
    }

    pub fn status(&self, now: Instant) -> SchedulerStatus {
        let paused = self.is_paused(now);
        SchedulerStatus {
            phase: self.phase(now),
            enabled: self.settings.enabled,
            time_until_break_seconds: self.time_until_break(now).as_secs(),
            next_break_at: (!paused).then(|| wall_clock_at(self.next_break_at, now)),
            paused_until: self
                .paused_until
                .filter(|until| now < *until)
                .map(|until| wall_clock_at(until, now)),
            work_interval_seconds: self.settings.work_interval.as_secs(),
            break_duration_seconds: self.settings.break_duration_seconds,
            auto_pause_on_idle: self.settings.auto_pause_on_idle,
            idle: self.is_idle(now),
        }
    }

    pub fn statistics(&self, now: Instant) -> SchedulerStatistics {
        SchedulerStatistics {
            breaks_offered: self.breaks_offered,
            breaks_completed: self.breaks_completed,
            breaks_skipped: self.breaks_skipped,
            compliance_rate: self.compliance_rate(),
            total_work_seconds: self.total_work(now).as_secs(),
            current_session_seconds: self.current_session(now).as_secs(),
            seconds_since_last_break: now.saturating_duration_since(self.last_break_at).as_secs(),
        }
    }
}

/// Wall-clock time of a monotonic instant, for outward snapshots only.
fn wall_clock_at(instant: Instant, now: Instant) -> DateTime<Utc> {
    let ahead = instant.saturating_duration_since(now);
    let ahead = chrono::Duration::from_std(ahead).unwrap_or_else(|_| chrono::Duration::zero());
    Utc::now() + ahead
}
