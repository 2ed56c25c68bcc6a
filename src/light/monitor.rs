use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::advice::{RecommendationCache, RecommendationResult};
use crate::settings::AgentConfig;

use super::{
    brightness::{recommended_brightness, BrightnessControl},
    classifier::LightStatus,
    history::{LightStatistics, DEFAULT_HISTORY_CAPACITY},
    loop_worker::{
        monitoring_loop, read_screen_brightness, take_sample, MonitorContext, MonitorState,
        SharedSampler, SAMPLE_TIMEOUT_SECS,
    },
    reading::{LightReading, LightSource},
    sampler::AmbientLightSampler,
};

const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Payload emitted after every monitoring check.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LightUpdate {
    pub lux: f64,
    pub status: LightStatus,
    pub metadata: Map<String, Value>,
    pub recommendation: Option<RecommendationResult>,
}

pub type LightCallback = Arc<dyn Fn(LightUpdate) -> anyhow::Result<()> + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSettings {
    pub check_interval: Duration,
    pub auto_adjust_brightness: bool,
    pub history_capacity: usize,
    pub activity: String,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self::from(&AgentConfig::default())
    }
}

impl From<&AgentConfig> for MonitorSettings {
    fn from(config: &AgentConfig) -> Self {
        Self {
            check_interval: Duration::from_secs(config.light_monitoring.check_interval_seconds.max(1)),
            auto_adjust_brightness: config.light_monitoring.auto_adjust_brightness,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            activity: "general computer work".into(),
        }
    }
}

/// Result of an on-demand check. Does not touch history or the throttle.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ManualCheck {
    pub reading: LightReading,
    pub screen_brightness: Option<u8>,
    pub recommended_brightness: u8,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MonitorStatus {
    pub running: bool,
    pub camera_available: bool,
    pub calibration_factor: f64,
    pub auto_adjust_brightness: bool,
    pub current_lux: Option<f64>,
    pub status: Option<LightStatus>,
    pub source: Option<LightSource>,
    pub captured_at: Option<DateTime<Utc>>,
    pub recommended_brightness: Option<u8>,
    pub last_recommendation: Option<RecommendationResult>,
    pub readings_count: usize,
}

struct Worker {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

#[derive(Clone)]
pub struct LightMonitor {
    ctx: MonitorContext,
    check_interval: Duration,
    worker: Arc<Mutex<Option<Worker>>>,
}

impl LightMonitor {
    pub fn new(
        settings: MonitorSettings,
        sampler: AmbientLightSampler,
        brightness: Arc<dyn BrightnessControl>,
        advice: Option<Arc<RecommendationCache>>,
        on_update: LightCallback,
    ) -> Self {
        let ctx = MonitorContext {
            sampler: Arc::new(sampler),
            brightness,
            advice,
            state: Arc::new(Mutex::new(MonitorState::new(settings.history_capacity))),
            on_update,
            auto_adjust_brightness: settings.auto_adjust_brightness,
            activity: settings.activity,
        };

        Self {
            ctx,
            check_interval: settings.check_interval,
            worker: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns false if the loop was already running. Reopens the camera if
    /// an earlier [`LightMonitor::release`] closed it.
    pub async fn start(&self) -> bool {
        let mut worker = self.worker.lock().await;
        if worker.is_some() {
            warn!("Light monitor already running");
            return false;
        }

        if let Err(err) = self.reopen().await {
            warn!("Could not reopen camera: {err:#}");
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(monitoring_loop(
            self.ctx.clone(),
            self.check_interval,
            cancel_token.clone(),
        ));

        *worker = Some(Worker {
            handle,
            cancel_token,
        });
        info!(
            "Light monitor started (every {}s)",
            self.check_interval.as_secs()
        );
        true
    }

    /// Stops the loop. The camera stays open until [`LightMonitor::release`].
    pub async fn stop(&self) {
        let Some(Worker {
            mut handle,
            cancel_token,
        }) = self.worker.lock().await.take()
        else {
            return;
        };

        cancel_token.cancel();
        match tokio::time::timeout(STOP_JOIN_TIMEOUT, &mut handle).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!("Light monitor task ended abnormally: {err}"),
            Err(_) => {
                warn!(
                    "Light monitor did not stop within {}s, aborting",
                    STOP_JOIN_TIMEOUT.as_secs()
                );
                handle.abort();
            }
        }
        info!("Light monitor stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.worker.lock().await.is_some()
    }

    /// Stops the loop and releases the camera.
    pub async fn release(&self) -> Result<()> {
        self.stop().await;
        self.with_sampler(|sampler| sampler.release()).await
    }

    /// Re-acquires the camera after [`LightMonitor::release`]; no-op otherwise.
    pub async fn reopen(&self) -> Result<()> {
        if !self.ctx.sampler.is_released() {
            return Ok(());
        }
        let available = self.with_sampler(|sampler| sampler.reopen()).await?;
        if !available {
            warn!("Camera still unavailable after reopen");
        }
        Ok(())
    }

    pub async fn manual_check(&self) -> Result<ManualCheck> {
        let reading = take_sample(&self.ctx.sampler).await?;
        let screen_brightness = read_screen_brightness(&self.ctx.brightness).await?;

        Ok(ManualCheck {
            recommended_brightness: recommended_brightness(reading.lux),
            screen_brightness,
            reading,
        })
    }

    pub async fn get_current_status(&self) -> Result<MonitorStatus> {
        let running = self.is_running().await;
        let (camera_available, calibration_factor, last) = self
            .with_sampler(|sampler| {
                (
                    sampler.camera_available(),
                    sampler.calibration_factor(),
                    sampler.last_reading(),
                )
            })
            .await?;

        let state = self.ctx.state.lock().await;
        Ok(MonitorStatus {
            running,
            camera_available,
            calibration_factor,
            auto_adjust_brightness: self.ctx.auto_adjust_brightness,
            current_lux: last.as_ref().map(|r| r.lux),
            status: last.as_ref().map(|r| r.status),
            source: last.as_ref().map(|r| r.source),
            captured_at: last.as_ref().map(|r| r.captured_at),
            recommended_brightness: last.as_ref().map(|r| recommended_brightness(r.lux)),
            last_recommendation: state.last_recommendation.clone(),
            readings_count: state.history.len(),
        })
    }

    /// `None` until the loop has recorded a reading.
    pub async fn get_statistics(&self) -> Option<LightStatistics> {
        self.ctx.state.lock().await.history.statistics()
    }

    pub async fn calibrate(&self, known_lux: f64) -> Result<bool> {
        self.with_sampler(move |sampler| sampler.calibrate(known_lux))
            .await
    }

    pub async fn get_last_reading(&self) -> Result<Option<LightReading>> {
        Ok(self.ctx.sampler.last_reading())
    }

    pub async fn history_len(&self) -> usize {
        self.ctx.state.lock().await.history.len()
    }

    pub async fn last_recommendation(&self) -> Option<RecommendationResult> {
        self.ctx.state.lock().await.last_recommendation.clone()
    }

    /// Runs `f` on the blocking pool, bounded like a sample.
    async fn with_sampler<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&AmbientLightSampler) -> T + Send + 'static,
    {
        let sampler: SharedSampler = Arc::clone(&self.ctx.sampler);
        tokio::time::timeout(
            Duration::from_secs(SAMPLE_TIMEOUT_SECS),
            tokio::task::spawn_blocking(move || f(sampler.as_ref())),
        )
        .await
        .map_err(|_| anyhow!("light sampler call timed out (> {SAMPLE_TIMEOUT_SECS}s)"))?
        .context("light sampler worker join failed")
    }
}
