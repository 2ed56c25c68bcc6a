use std::{
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard, TryLockError},
};

use chrono::{Local, Timelike, Utc};
use image::DynamicImage;
use log::{debug, error, info, warn};
use serde_json::{json, Map, Value};

use crate::error::SensorError;

use super::{
    brightness::BrightnessControl,
    classifier::{
        analyze_frame, classify_with, estimate_from_time_of_day, estimate_lux,
        ClassifierThresholds, FrameStats, LuxModel,
    },
    reading::{LightReading, LightSource},
};

/// Camera collaborator. Implementations may block.
pub trait FrameSource: Send {
    fn is_available(&self) -> bool;

    fn capture_frame(&mut self) -> Result<DynamicImage, SensorError>;

    /// Must be safe to call more than once.
    fn release(&mut self);

    /// Re-acquires the device after [`FrameSource::release`].
    fn reopen(&mut self) -> bool {
        self.is_available()
    }
}

/// Used when light monitoring runs without any camera.
#[derive(Debug, Default)]
pub struct NoCamera;

impl FrameSource for NoCamera {
    fn is_available(&self) -> bool {
        false
    }

    fn capture_frame(&mut self) -> Result<DynamicImage, SensorError> {
        Err(SensorError::Unavailable("no camera configured".into()))
    }

    fn release(&mut self) {}
}

/// Reads the latest frame an external capture tool wrote to disk.
#[derive(Debug)]
pub struct SnapshotCamera {
    path: PathBuf,
    released: bool,
}

impl SnapshotCamera {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            released: false,
        }
    }
}

impl FrameSource for SnapshotCamera {
    fn is_available(&self) -> bool {
        !self.released && self.path.is_file()
    }

    fn capture_frame(&mut self) -> Result<DynamicImage, SensorError> {
        if self.released {
            return Err(SensorError::Unavailable("snapshot camera released".into()));
        }
        Ok(image::open(&self.path)?)
    }

    fn release(&mut self) {
        self.released = true;
    }

    fn reopen(&mut self) -> bool {
        self.released = false;
        self.is_available()
    }
}

/// Small, I/O-free state. Never held across a capture.
#[derive(Debug)]
struct SamplerState {
    calibration_factor: f64,
    last_reading: Option<LightReading>,
    camera_available: bool,
    released: bool,
}

/// Turns camera frames into [`LightReading`]s, or estimates from the clock
/// when the camera cannot deliver.
///
/// The camera sits behind its own lock. Captures only `try_lock` it, so a
/// hung device makes later samples fall back instead of queueing threads,
/// and status reads never wait for a frame.
pub struct AmbientLightSampler {
    camera: Mutex<Box<dyn FrameSource>>,
    state: Mutex<SamplerState>,
    brightness: Arc<dyn BrightnessControl>,
    camera_index: u32,
    model: LuxModel,
    thresholds: ClassifierThresholds,
}

impl AmbientLightSampler {
    pub fn new(
        camera: Box<dyn FrameSource>,
        brightness: Arc<dyn BrightnessControl>,
        camera_index: u32,
    ) -> Self {
        let camera_available = camera.is_available();
        if camera_available {
            info!("Light sampler using camera {camera_index}");
        } else {
            info!("Light sampler has no camera, using time-based estimates");
        }

        Self {
            camera: Mutex::new(camera),
            state: Mutex::new(SamplerState {
                calibration_factor: 1.0,
                last_reading: None,
                camera_available,
                released: false,
            }),
            brightness,
            camera_index,
            model: LuxModel::default(),
            thresholds: ClassifierThresholds::default(),
        }
    }

    pub fn with_model(mut self, model: LuxModel, thresholds: ClassifierThresholds) -> Self {
        self.model = model;
        self.thresholds = thresholds;
        self
    }

    fn state(&self) -> MutexGuard<'_, SamplerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// `None` while another capture holds the camera.
    fn try_camera(&self) -> Option<MutexGuard<'_, Box<dyn FrameSource>>> {
        match self.camera.try_lock() {
            Ok(camera) => Some(camera),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    fn camera(&self) -> MutexGuard<'_, Box<dyn FrameSource>> {
        self.camera.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn calibration_factor(&self) -> f64 {
        self.state().calibration_factor
    }

    /// Reports the last known availability while a capture is in flight.
    pub fn camera_available(&self) -> bool {
        if self.state().released {
            return false;
        }
        match self.try_camera() {
            Some(camera) => {
                let available = camera.is_available();
                self.state().camera_available = available;
                available
            }
            None => self.state().camera_available,
        }
    }

    pub fn is_released(&self) -> bool {
        self.state().released
    }

    pub fn last_reading(&self) -> Option<LightReading> {
        self.state().last_reading.clone()
    }

    /// Never fails: camera problems fall back to the time-of-day estimate.
    pub fn sample(&self) -> LightReading {
        let reading = match self.capture_stats() {
            Ok(stats) => self.reading_from_stats(&stats),
            Err(SensorError::Unavailable(reason)) => {
                debug!("Camera unavailable ({reason}), using time-based estimate");
                self.fallback_reading(Local::now().hour())
            }
            Err(err) => {
                warn!("Camera sample failed, using time-based estimate: {err}");
                self.fallback_reading(Local::now().hour())
            }
        };

        self.state().last_reading = Some(reading.clone());
        reading
    }

    /// Derives `calibration_factor` so the current scene reads as `known_lux`.
    pub fn calibrate(&self, known_lux: f64) -> bool {
        if !known_lux.is_finite() || known_lux <= 0.0 {
            error!("Calibration needs a positive reference, got {known_lux}");
            return false;
        }

        let stats = match self.capture_stats() {
            Ok(stats) => stats,
            Err(err) => {
                error!("Cannot calibrate without a live frame: {err}");
                return false;
            }
        };

        let raw_lux = estimate_lux(&stats, &self.model, 1.0);
        if raw_lux <= 0.0 {
            error!("Calibration baseline reading is not positive ({raw_lux})");
            return false;
        }

        let factor = known_lux / raw_lux;
        self.state().calibration_factor = factor;
        info!(
            "Calibrated light sampler: factor = {:.2} (raw {:.0} lux, target {:.0} lux)",
            factor, raw_lux, known_lux
        );
        true
    }

    /// Waits for any capture in flight before closing the device.
    pub fn release(&self) {
        {
            let mut state = self.state();
            if state.released {
                return;
            }
            state.released = true;
            state.camera_available = false;
        }
        self.camera().release();
        info!("Camera released");
    }

    /// Undoes [`AmbientLightSampler::release`]. Returns whether a camera is usable.
    pub fn reopen(&self) -> bool {
        if !self.state().released {
            return self.camera_available();
        }

        let available = self.camera().reopen();
        {
            let mut state = self.state();
            state.released = false;
            state.camera_available = available;
        }
        if available {
            info!("Camera {} reopened", self.camera_index);
        } else {
            warn!("Camera {} not available after reopen, using time-based estimates", self.camera_index);
        }
        available
    }

    fn capture_stats(&self) -> Result<FrameStats, SensorError> {
        if self.state().released {
            return Err(SensorError::Unavailable("camera released".into()));
        }

        let frame = {
            let Some(mut camera) = self.try_camera() else {
                return Err(SensorError::Unavailable("camera busy with another capture".into()));
            };
            let available = camera.is_available();
            self.state().camera_available = available;
            if !available {
                return Err(SensorError::Unavailable("no capture device".into()));
            }
            camera.capture_frame()?
        };

        analyze_frame(&frame.to_luma8())
    }

    fn reading_from_stats(&self, stats: &FrameStats) -> LightReading {
        let calibration_factor = self.calibration_factor();
        let lux = estimate_lux(stats, &self.model, calibration_factor);
        let status = classify_with(&self.thresholds, lux, stats.overexposed_ratio, stats.std_dev);

        let mut metadata = Map::new();
        metadata.insert("mean_brightness".into(), json!(stats.mean));
        metadata.insert("std_brightness".into(), json!(stats.std_dev));
        metadata.insert("median_brightness".into(), json!(stats.median));
        metadata.insert("overexposed_ratio".into(), json!(stats.overexposed_ratio));
        metadata.insert("underexposed_ratio".into(), json!(stats.underexposed_ratio));
        metadata.insert("frame_width".into(), json!(stats.width));
        metadata.insert("frame_height".into(), json!(stats.height));
        metadata.insert("camera_index".into(), json!(self.camera_index));
        metadata.insert("calibration_factor".into(), json!(calibration_factor));
        metadata.insert("source".into(), Value::from(LightSource::Webcam.as_str()));

        LightReading {
            lux,
            status,
            source: LightSource::Webcam,
            captured_at: Utc::now(),
            metadata,
        }
    }

    pub(crate) fn fallback_reading(&self, hour: u32) -> LightReading {
        let screen_brightness = self.brightness.get_brightness();
        let (lux, status) = estimate_from_time_of_day(hour, screen_brightness);

        let mut metadata = Map::new();
        metadata.insert("hour".into(), json!(hour));
        metadata.insert("screen_brightness".into(), json!(screen_brightness));
        metadata.insert(
            "source".into(),
            Value::from(LightSource::TimeBasedFallback.as_str()),
        );
        metadata.insert(
            "note".into(),
            Value::from("Camera not available, using time-based estimation"),
        );

        LightReading {
            lux,
            status,
            source: LightSource::TimeBasedFallback,
            captured_at: Utc::now(),
            metadata,
        }
    }
}

impl Drop for AmbientLightSampler {
    fn drop(&mut self) {
        self.release();
    }
}
