use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::advice::{LightContext, RecommendationCache, UserContext};
use crate::utils::callback::invoke_guarded;

use super::{
    brightness::{auto_adjust, BrightnessControl},
    history::LightHistory,
    monitor::{LightCallback, LightUpdate},
    reading::LightReading,
    sampler::AmbientLightSampler,
    throttle::RecommendationThrottle,
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

pub(crate) const SAMPLE_TIMEOUT_SECS: u64 = 10;

pub(crate) type SharedSampler = Arc<AmbientLightSampler>;

/// Everything the monitor remembers between checks.
#[derive(Debug)]
pub(crate) struct MonitorState {
    pub history: LightHistory,
    pub throttle: RecommendationThrottle,
    pub last_recommendation: Option<crate::advice::RecommendationResult>,
}

impl MonitorState {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            history: LightHistory::with_capacity(history_capacity),
            throttle: RecommendationThrottle::default(),
            last_recommendation: None,
        }
    }
}

/// Collaborators shared by the loop and the on-demand operations.
#[derive(Clone)]
pub(crate) struct MonitorContext {
    pub sampler: SharedSampler,
    pub brightness: Arc<dyn BrightnessControl>,
    pub advice: Option<Arc<RecommendationCache>>,
    pub state: Arc<Mutex<MonitorState>>,
    pub on_update: LightCallback,
    pub auto_adjust_brightness: bool,
    pub activity: String,
}

/// Takes one sample off the async runtime, bounded by [`SAMPLE_TIMEOUT_SECS`].
pub(crate) async fn take_sample(sampler: &SharedSampler) -> Result<LightReading> {
    let sampler = Arc::clone(sampler);
    tokio::time::timeout(
        Duration::from_secs(SAMPLE_TIMEOUT_SECS),
        tokio::task::spawn_blocking(move || sampler.sample()),
    )
    .await
    .map_err(|_| anyhow!("light sample timed out (> {SAMPLE_TIMEOUT_SECS}s)"))?
    .context("light sampler worker join failed")
}

/// Brightness backends may shell out, so reads stay off the async workers.
pub(crate) async fn read_screen_brightness(
    brightness: &Arc<dyn BrightnessControl>,
) -> Result<Option<u8>> {
    let brightness = Arc::clone(brightness);
    tokio::task::spawn_blocking(move || brightness.get_brightness())
        .await
        .context("brightness worker join failed")
}

pub(crate) async fn monitoring_loop(
    ctx: MonitorContext,
    check_interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(check_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tokio::select! {
                    result = perform_check(&ctx) => {
                        if let Err(err) = result {
                            log_error!("light check failed: {err:?}");
                        }
                    }
                    _ = cancel_token.cancelled() => {
                        log_info!("light monitor cancelled mid-check");
                        break;
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("light monitor loop shutting down");
                break;
            }
        }
    }
}

async fn perform_check(ctx: &MonitorContext) -> Result<()> {
    let check_start = Instant::now();
    let reading = take_sample(&ctx.sampler).await?;

    log_debug!(
        "light sample: {:.0} lux ({}) via {}",
        reading.lux,
        reading.status.as_str(),
        reading.source.as_str()
    );

    let wants_advice = {
        let mut state = ctx.state.lock().await;
        state.history.push(reading.clone());
        state
            .throttle
            .should_recommend(reading.status, Instant::now())
    };

    if wants_advice {
        if let Some(advice) = &ctx.advice {
            let user = UserContext {
                screen_brightness: read_screen_brightness(&ctx.brightness).await?,
                activity: ctx.activity.clone(),
            };
            let recommendation = advice
                .get_light_recommendation(&LightContext::from(&reading), &user)
                .await;
            ctx.state.lock().await.last_recommendation = Some(recommendation);
        }
    }

    if ctx.auto_adjust_brightness {
        let brightness = Arc::clone(&ctx.brightness);
        let lux = reading.lux;
        let adjusted = tokio::task::spawn_blocking(move || auto_adjust(brightness.as_ref(), lux))
            .await
            .context("brightness worker join failed")?;
        if !adjusted {
            log_debug!("screen brightness left unchanged for {lux:.0} lux");
        }
    }

    let recommendation = ctx.state.lock().await.last_recommendation.clone();
    let update = LightUpdate {
        lux: reading.lux,
        status: reading.status,
        metadata: reading.metadata,
        recommendation,
    };

    let on_update = Arc::clone(&ctx.on_update);
    if !invoke_guarded("light update", move || on_update(update)) {
        log_warn!("light update was not delivered");
    }

    log_debug!("light check took {}ms", check_start.elapsed().as_millis());
    Ok(())
}
