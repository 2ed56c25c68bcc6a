use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::classifier::LightStatus;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LightSource {
    Webcam,
    TimeBasedFallback,
}

impl LightSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LightSource::Webcam => "webcam",
            LightSource::TimeBasedFallback => "time_based_fallback",
        }
    }
}

/// One ambient light sample. Never mutated after construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LightReading {
    pub lux: f64,
    pub status: LightStatus,
    pub source: LightSource,
    pub captured_at: DateTime<Utc>,
    /// Diagnostics only; consumers must not depend on particular keys.
    pub metadata: Map<String, Value>,
}
