use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::RwLock,
};

pub const DEFAULT_MODEL: &str = "meta-llama/llama-3.1-8b-instruct";
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LightMonitoringConfig {
    pub enabled: bool,
    pub camera_index: u32,
    pub check_interval_seconds: u64,
    pub auto_adjust_brightness: bool,
    /// File an external capture tool keeps overwriting with the latest webcam frame.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for LightMonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            camera_index: 0,
            check_interval_seconds: 30,
            auto_adjust_brightness: false,
            snapshot_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AiConfig {
    pub enabled: bool,
    pub model: String,
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: DEFAULT_MODEL.into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: None,
        }
    }
}

/// The flat configuration surface consumed by the core. Every field has a
/// default, so a partial (or empty) settings file is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    pub work_interval_minutes: u32,
    pub break_duration_seconds: u32,
    pub enable_breaks: bool,
    pub auto_pause_on_idle: bool,
    pub idle_threshold_minutes: u32,
    pub light_monitoring: LightMonitoringConfig,
    pub ai: AiConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            work_interval_minutes: 20,
            break_duration_seconds: 20,
            enable_breaks: true,
            auto_pause_on_idle: false,
            idle_threshold_minutes: 5,
            light_monitoring: LightMonitoringConfig::default(),
            ai: AiConfig::default(),
        }
    }
}

impl AgentConfig {
    pub fn from_json_str(contents: &str) -> Result<Self> {
        serde_json::from_str(contents).context("Failed to parse settings JSON")
    }

    /// Apply `OPENROUTER_*` environment overrides on top of the file values.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var("OPENROUTER_API_KEY") {
            if !key.trim().is_empty() {
                self.ai.api_key = Some(key);
            }
        }
        if let Ok(model) = std::env::var("OPENROUTER_MODEL") {
            if !model.trim().is_empty() {
                self.ai.model = model;
            }
        }
        if let Ok(base_url) = std::env::var("OPENROUTER_BASE_URL") {
            if !base_url.trim().is_empty() {
                self.ai.base_url = base_url;
            }
        }
        self
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<AgentConfig>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            AgentConfig::from_json_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring unreadable settings at {}: {err:#}", path.display());
                AgentConfig::default()
            })
        } else {
            AgentConfig::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> AgentConfig {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update<F>(&self, apply: F) -> Result<AgentConfig>
    where
        F: FnOnce(&mut AgentConfig),
    {
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        apply(&mut guard);
        self.persist(&guard)?;
        Ok(guard.clone())
    }

    fn persist(&self, data: &AgentConfig) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
