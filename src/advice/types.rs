use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::light::{LightReading, LightStatus};

pub const MAX_ACTION_ITEMS: usize = 5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WarningLevel {
    Low,
    Medium,
    High,
}

impl WarningLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningLevel::Low => "low",
            WarningLevel::Medium => "medium",
            WarningLevel::High => "high",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationResult {
    pub text: String,
    /// 0.0 to 1.0.
    pub confidence: f64,
    pub action_items: Vec<String>,
    pub warning_level: WarningLevel,
    pub produced_at: DateTime<Utc>,
    pub from_cache: bool,
}

impl RecommendationResult {
    pub fn new(
        text: impl Into<String>,
        confidence: f64,
        mut action_items: Vec<String>,
        warning_level: WarningLevel,
    ) -> Self {
        action_items.truncate(MAX_ACTION_ITEMS);
        Self {
            text: text.into(),
            confidence: confidence.clamp(0.0, 1.0),
            action_items,
            warning_level,
            produced_at: Utc::now(),
            from_cache: false,
        }
    }

    pub(crate) fn as_cached(&self) -> Self {
        Self {
            from_cache: true,
            ..self.clone()
        }
    }
}

/// Light conditions an advice request is about.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightContext {
    pub lux: f64,
    pub status: LightStatus,
}

impl From<&LightReading> for LightContext {
    fn from(reading: &LightReading) -> Self {
        Self {
            lux: reading.lux,
            status: reading.status,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserContext {
    pub screen_brightness: Option<u8>,
    pub activity: String,
}

impl Default for UserContext {
    fn default() -> Self {
        Self {
            screen_brightness: None,
            activity: "general computer work".into(),
        }
    }
}
