use tokio::time::{Duration, Instant};

use super::classifier::LightStatus;

pub const CRITICAL_WINDOW: Duration = Duration::from_secs(5 * 60);
pub const NORMAL_WINDOW: Duration = Duration::from_secs(30 * 60);

/// Rate limit for advice requests. Critical statuses use the short window,
/// everything else the long one; both share a single timestamp, so a critical
/// request also restarts the window for ordinary ones.
#[derive(Debug, Clone)]
pub struct RecommendationThrottle {
    last_request_at: Option<Instant>,
    critical_window: Duration,
    normal_window: Duration,
}

impl Default for RecommendationThrottle {
    fn default() -> Self {
        Self::new(CRITICAL_WINDOW, NORMAL_WINDOW)
    }
}

impl RecommendationThrottle {
    pub fn new(critical_window: Duration, normal_window: Duration) -> Self {
        Self {
            last_request_at: None,
            critical_window,
            normal_window,
        }
    }

    /// Returns true, and records `now`, when a request for `status` is allowed.
    pub fn should_recommend(&mut self, status: LightStatus, now: Instant) -> bool {
        let window = if status.is_critical() {
            self.critical_window
        } else {
            self.normal_window
        };

        if let Some(last) = self.last_request_at {
            if now.saturating_duration_since(last) < window {
                return false;
            }
        }

        self.last_request_at = Some(now);
        true
    }

    pub fn last_request_at(&self) -> Option<Instant> {
        self.last_request_at
    }
}
