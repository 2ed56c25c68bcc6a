use std::collections::HashMap;

use tokio::time::{Duration, Instant};

use super::types::RecommendationResult;

pub const CACHE_TTL: Duration = Duration::from_secs(30 * 60);

/// Readings within the same 50-lux band share a cache entry.
pub fn light_key(lux: f64) -> String {
    let band = (lux.max(0.0) / 50.0).floor() as i64 * 50;
    format!("light_{band}")
}

/// Symptoms are not part of the key.
pub fn strain_key(screen_time_hours: f64, break_compliance: f64) -> String {
    format!(
        "strain_{}_{}",
        screen_time_hours.max(0.0).floor() as i64,
        break_compliance.max(0.0).floor() as i64
    )
}

#[derive(Debug, Clone)]
struct CacheEntry {
    result: RecommendationResult,
    stored_at: Instant,
}

/// Remote advice keyed by a coarse description of the request.
#[derive(Debug)]
pub struct ResponseCache {
    entries: HashMap<String, CacheEntry>,
    ttl: Duration,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(CACHE_TTL)
    }
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    /// Fresh entries come back marked `from_cache`. Stale ones are dropped.
    pub fn get(&mut self, key: &str, now: Instant) -> Option<RecommendationResult> {
        let entry = self.entries.get(key)?;
        if now.saturating_duration_since(entry.stored_at) < self.ttl {
            return Some(entry.result.as_cached());
        }

        self.entries.remove(key);
        None
    }

    pub fn insert(&mut self, key: String, result: RecommendationResult, now: Instant) {
        self.entries.insert(
            key,
            CacheEntry {
                result,
                stored_at: now,
            },
        );
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
