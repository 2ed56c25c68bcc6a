use std::collections::{BTreeMap, VecDeque};

use serde::Serialize;

use super::{classifier::LightStatus, reading::LightReading};

pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Number of most recent readings the statistics are computed over.
const STATS_WINDOW: usize = 20;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LightStatistics {
    pub current: f64,
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub readings_count: usize,
    pub status_distribution: BTreeMap<LightStatus, usize>,
}

/// Bounded FIFO of readings; the oldest entry is evicted first.
#[derive(Debug, Clone)]
pub struct LightHistory {
    entries: VecDeque<LightReading>,
    capacity: usize,
}

impl Default for LightHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

impl LightHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, reading: LightReading) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(reading);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&LightReading> {
        self.entries.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LightReading> {
        self.entries.iter()
    }

    pub fn statistics(&self) -> Option<LightStatistics> {
        let current = self.latest()?.lux;
        let skip = self.entries.len().saturating_sub(STATS_WINDOW);
        let recent: Vec<&LightReading> = self.entries.iter().skip(skip).collect();

        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        let mut status_distribution = BTreeMap::new();
        for reading in &recent {
            min = min.min(reading.lux);
            max = max.max(reading.lux);
            sum += reading.lux;
            *status_distribution.entry(reading.status).or_insert(0) += 1;
        }

        Some(LightStatistics {
            current,
            average: sum / recent.len() as f64,
            min,
            max,
            readings_count: self.entries.len(),
            status_distribution,
        })
    }
}
