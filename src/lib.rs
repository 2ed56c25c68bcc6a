pub mod advice;
pub mod agent;
pub mod breaks;
pub mod error;
pub mod light;
pub mod settings;
pub mod utils;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use log::{info, warn};

pub use advice::{OpenRouterClient, RecommendationCache, RecommendationResult, WarningLevel};
pub use agent::{Agent, AgentEvent, EventSink, LogSink};
pub use breaks::{BreakDue, BreakScheduler, BreakSettings, ScheduleSettingsUpdate};
pub use error::{AdviceError, SensorError};
pub use light::{LightMonitor, LightReading, LightStatus, LightUpdate, SnapshotCamera};
pub use settings::{AgentConfig, SettingsStore};

const DEFAULT_SETTINGS_FILE: &str = "eyecare.json";

pub fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("Eyecare starting up...");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    runtime.block_on(run_agent())
}

async fn run_agent() -> Result<()> {
    let settings_path = std::env::var_os("EYECARE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE));
    let store = Arc::new(SettingsStore::new(settings_path)?);
    info!("Settings loaded from {}", store.path().display());

    let config = store.config().with_env_overrides();
    let mut builder = Agent::builder(config.clone())
        .event_sink(Arc::new(LogSink))
        .settings_store(Arc::clone(&store));

    if let Some(path) = &config.light_monitoring.snapshot_path {
        info!("Reading camera frames from {}", path.display());
        builder = builder.camera(Box::new(SnapshotCamera::new(path.clone())));
    }

    match OpenRouterClient::from_config(&config.ai) {
        Ok(Some(client)) => builder = builder.advice_provider(Arc::new(client)),
        Ok(None) => info!("Remote advice disabled, using rule-based advice"),
        Err(err) => warn!("Remote advice unavailable ({err}), using rule-based advice"),
    }

    let agent = builder.build();
    agent.start().await;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutdown requested");

    agent.shutdown().await
}
