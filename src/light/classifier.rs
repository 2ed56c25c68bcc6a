//! Pixel statistics, the empirical pixel→lux model and the status bands.
//!
//! Everything here is pure. The numeric constants are calibration parameters
//! for consumer webcams and are kept as the defaults of [`LuxModel`] and
//! [`ClassifierThresholds`].

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::error::SensorError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LightStatus {
    VeryLow,
    Low,
    Optimal,
    High,
    Changing,
}

impl LightStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LightStatus::VeryLow => "very_low",
            LightStatus::Low => "low",
            LightStatus::Optimal => "optimal",
            LightStatus::High => "high",
            LightStatus::Changing => "changing",
        }
    }

    /// Statuses that warrant advice on the short throttle window.
    pub fn is_critical(&self) -> bool {
        matches!(self, LightStatus::VeryLow | LightStatus::Changing)
    }
}

/// Grayscale statistics of one frame. Ratios are fractions of the pixel count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStats {
    pub mean: f64,
    pub std_dev: f64,
    pub median: f64,
    pub overexposed_ratio: f64,
    pub underexposed_ratio: f64,
    pub width: u32,
    pub height: u32,
}

const OVEREXPOSED_LEVEL: u8 = 240;
const UNDEREXPOSED_LEVEL: u8 = 30;

pub fn analyze_frame(gray: &GrayImage) -> Result<FrameStats, SensorError> {
    let (width, height) = gray.dimensions();
    let count = u64::from(width) * u64::from(height);
    if count == 0 {
        return Err(SensorError::EmptyFrame);
    }

    let mut histogram = [0u64; 256];
    for pixel in gray.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }

    let n = count as f64;
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    let mut over = 0u64;
    let mut under = 0u64;
    for (level, &hits) in histogram.iter().enumerate() {
        let value = level as f64;
        let hits_f = hits as f64;
        sum += value * hits_f;
        sum_sq += value * value * hits_f;
        if level > OVEREXPOSED_LEVEL as usize {
            over += hits;
        }
        if level < UNDEREXPOSED_LEVEL as usize {
            under += hits;
        }
    }

    let mean = sum / n;
    let variance = (sum_sq / n - mean * mean).max(0.0);

    Ok(FrameStats {
        mean,
        std_dev: variance.sqrt(),
        median: histogram_median(&histogram, count),
        overexposed_ratio: over as f64 / n,
        underexposed_ratio: under as f64 / n,
        width,
        height,
    })
}

/// Median over a level histogram; averages the two middle values for an even count.
fn histogram_median(histogram: &[u64; 256], count: u64) -> f64 {
    let value_at = |rank: u64| -> f64 {
        let mut seen = 0u64;
        for (level, &hits) in histogram.iter().enumerate() {
            seen += hits;
            if seen > rank {
                return level as f64;
            }
        }
        255.0
    };

    if count % 2 == 1 {
        value_at(count / 2)
    } else {
        (value_at(count / 2 - 1) + value_at(count / 2)) / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LuxModel {
    /// Lux assigned to a uniformly white frame before any correction.
    pub full_scale_lux: f64,
    /// Standard deviation that doubles the estimate.
    pub contrast_divisor: f64,
    pub overexposed_boost_threshold: f64,
    pub overexposed_boost_gain: f64,
    pub underexposed_cut_threshold: f64,
    pub underexposed_cut_factor: f64,
    pub min_lux: f64,
    pub max_lux: f64,
}

impl Default for LuxModel {
    fn default() -> Self {
        Self {
            full_scale_lux: 800.0,
            contrast_divisor: 100.0,
            overexposed_boost_threshold: 0.1,
            overexposed_boost_gain: 2.0,
            underexposed_cut_threshold: 0.5,
            underexposed_cut_factor: 0.5,
            min_lux: 10.0,
            max_lux: 2000.0,
        }
    }
}

pub fn estimate_lux(stats: &FrameStats, model: &LuxModel, calibration_factor: f64) -> f64 {
    let mut lux = (stats.mean / 255.0) * model.full_scale_lux;
    lux *= 1.0 + stats.std_dev / model.contrast_divisor;

    if stats.overexposed_ratio > model.overexposed_boost_threshold {
        lux *= 1.0 + stats.overexposed_ratio * model.overexposed_boost_gain;
    }
    if stats.underexposed_ratio > model.underexposed_cut_threshold {
        lux *= model.underexposed_cut_factor;
    }

    (lux * calibration_factor).clamp(model.min_lux, model.max_lux)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierThresholds {
    pub changing_min_std: f64,
    pub changing_min_overexposed: f64,
    pub high_min_overexposed: f64,
    pub very_low_below: f64,
    pub low_from: f64,
    pub optimal_from: f64,
    pub optimal_to: f64,
    pub bright_to: f64,
    pub high_above: f64,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            changing_min_std: 60.0,
            changing_min_overexposed: 0.2,
            high_min_overexposed: 0.3,
            very_low_below: 100.0,
            low_from: 200.0,
            optimal_from: 300.0,
            optimal_to: 500.0,
            bright_to: 700.0,
            high_above: 1000.0,
        }
    }
}

pub fn classify(lux: f64, overexposed_ratio: f64, std_dev: f64) -> LightStatus {
    classify_with(&ClassifierThresholds::default(), lux, overexposed_ratio, std_dev)
}

/// First matching rule wins. `[100, 200)` and `(700, 1000]` are not named by
/// any band and land on the final low/high split.
pub fn classify_with(
    t: &ClassifierThresholds,
    lux: f64,
    overexposed_ratio: f64,
    std_dev: f64,
) -> LightStatus {
    if std_dev > t.changing_min_std && overexposed_ratio > t.changing_min_overexposed {
        return LightStatus::Changing;
    }

    if lux > t.high_above || overexposed_ratio > t.high_min_overexposed {
        return LightStatus::High;
    }

    if (t.optimal_from..=t.optimal_to).contains(&lux) {
        return LightStatus::Optimal;
    }

    if (t.low_from..t.optimal_from).contains(&lux) {
        return LightStatus::Low;
    }
    if lux > t.optimal_to && lux <= t.bright_to {
        return LightStatus::High;
    }

    if lux < t.very_low_below {
        return LightStatus::VeryLow;
    }

    if lux < t.optimal_from {
        LightStatus::Low
    } else {
        LightStatus::High
    }
}

/// Screen brightness above which a lit screen at night implies room lights are on.
const NIGHT_SCREEN_BRIGHTNESS: u8 = 70;

/// Rough lux estimate from the local hour when no camera is usable.
pub fn estimate_from_time_of_day(hour: u32, screen_brightness: Option<u8>) -> (f64, LightStatus) {
    let (lux, status) = match hour {
        6..=7 => (150.0, LightStatus::Low),
        8..=9 => (300.0, LightStatus::Optimal),
        10..=15 => (450.0, LightStatus::Optimal),
        16..=17 => (300.0, LightStatus::Optimal),
        18..=19 => (200.0, LightStatus::Low),
        _ => (80.0, LightStatus::VeryLow),
    };

    let is_night = !(6..20).contains(&hour);
    match screen_brightness {
        Some(brightness) if is_night && brightness > NIGHT_SCREEN_BRIGHTNESS => {
            (250.0, LightStatus::Low)
        }
        _ => (lux, status),
    }
}
