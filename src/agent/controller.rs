use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use serde::Serialize;
use tokio::sync::{
    mpsc::{self, UnboundedReceiver, UnboundedSender},
    Mutex,
};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::advice::{
    fallback::strain_warning_level, AdviceProvider, RecommendationCache, RecommendationResult,
};
use crate::breaks::{
    BreakCallback, BreakDue, BreakScheduler, BreakSettings, ScheduleSettingsUpdate,
    SchedulerStatistics, SchedulerStatus,
};
use crate::light::{
    AmbientLightSampler, BrightnessControl, FrameSource, LightCallback, LightMonitor,
    LightStatistics, ManualCheck, MonitorSettings, MonitorStatus, NoBrightnessControl, NoCamera,
};
use crate::settings::{AgentConfig, SettingsStore};
use crate::utils::callback::invoke_guarded;

use super::events::{AgentEvent, EventSink, NullSink};

const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

type SharedSink = Arc<Mutex<Arc<dyn EventSink>>>;

#[derive(Debug, Clone, Serialize)]
pub struct AgentStatus {
    pub running: bool,
    pub breaks: SchedulerStatus,
    pub light_monitoring_enabled: bool,
    pub light: MonitorStatus,
    pub remote_advice_enabled: bool,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentStatistics {
    pub breaks: SchedulerStatistics,
    pub light: Option<LightStatistics>,
}

struct Dispatcher {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

pub struct AgentBuilder {
    config: AgentConfig,
    break_settings: BreakSettings,
    monitor_settings: MonitorSettings,
    camera: Box<dyn FrameSource>,
    brightness: Arc<dyn BrightnessControl>,
    provider: Option<Arc<dyn AdviceProvider>>,
    sink: Arc<dyn EventSink>,
    store: Option<Arc<SettingsStore>>,
}

impl AgentBuilder {
    pub fn camera(mut self, camera: Box<dyn FrameSource>) -> Self {
        self.camera = camera;
        self
    }

    pub fn brightness(mut self, brightness: Arc<dyn BrightnessControl>) -> Self {
        self.brightness = brightness;
        self
    }

    pub fn advice_provider(mut self, provider: Arc<dyn AdviceProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Schedule changes made through the agent are written back to this store.
    pub fn settings_store(mut self, store: Arc<SettingsStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Overrides the timings derived from the config.
    pub fn break_settings(mut self, settings: BreakSettings) -> Self {
        self.break_settings = settings;
        self
    }

    pub fn monitor_settings(mut self, settings: MonitorSettings) -> Self {
        self.monitor_settings = settings;
        self
    }

    pub fn build(self) -> Agent {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let advice = Arc::new(RecommendationCache::new(self.provider));

        let scheduler = BreakScheduler::new(self.break_settings, break_forwarder(events_tx.clone()));

        let sampler = AmbientLightSampler::new(
            self.camera,
            Arc::clone(&self.brightness),
            self.config.light_monitoring.camera_index,
        );
        let monitor = LightMonitor::new(
            self.monitor_settings,
            sampler,
            self.brightness,
            Some(Arc::clone(&advice)),
            light_forwarder(events_tx),
        );

        Agent {
            config: Arc::new(Mutex::new(self.config)),
            scheduler,
            monitor,
            advice,
            sink: Arc::new(Mutex::new(self.sink)),
            events_rx: Arc::new(Mutex::new(events_rx)),
            dispatcher: Arc::new(Mutex::new(None)),
            store: self.store,
        }
    }
}

fn break_forwarder(tx: UnboundedSender<AgentEvent>) -> BreakCallback {
    Arc::new(move |due| {
        tx.send(AgentEvent::BreakDue(due))
            .map_err(|_| anyhow!("agent event channel closed"))
    })
}

fn light_forwarder(tx: UnboundedSender<AgentEvent>) -> LightCallback {
    Arc::new(move |update| {
        tx.send(AgentEvent::LightUpdate(update))
            .map_err(|_| anyhow!("agent event channel closed"))
    })
}

/// Composition root: owns the break scheduler and the light monitor and
/// funnels their events through one ordered channel to the event sink.
#[derive(Clone)]
pub struct Agent {
    config: Arc<Mutex<AgentConfig>>,
    scheduler: BreakScheduler,
    monitor: LightMonitor,
    advice: Arc<RecommendationCache>,
    sink: SharedSink,
    events_rx: Arc<Mutex<UnboundedReceiver<AgentEvent>>>,
    dispatcher: Arc<Mutex<Option<Dispatcher>>>,
    store: Option<Arc<SettingsStore>>,
}

impl Agent {
    pub fn builder(config: AgentConfig) -> AgentBuilder {
        AgentBuilder {
            break_settings: BreakSettings::from(&config),
            monitor_settings: MonitorSettings::from(&config),
            config,
            camera: Box::new(NoCamera),
            brightness: Arc::new(NoBrightnessControl),
            provider: None,
            sink: Arc::new(NullSink),
            store: None,
        }
    }

    pub async fn start(&self) {
        {
            let mut dispatcher = self.dispatcher.lock().await;
            if dispatcher.is_some() {
                warn!("Agent already running");
                return;
            }

            let cancel_token = CancellationToken::new();
            let handle = tokio::spawn(dispatch_loop(
                Arc::clone(&self.events_rx),
                Arc::clone(&self.sink),
                cancel_token.clone(),
            ));
            *dispatcher = Some(Dispatcher {
                handle,
                cancel_token,
            });
        }

        self.scheduler.start().await;

        let monitoring = self.config.lock().await.light_monitoring.enabled;
        if monitoring {
            self.monitor.start().await;
        } else {
            info!("Light monitoring disabled by config");
            if let Err(err) = self.monitor.reopen().await {
                warn!("Could not reopen camera: {err:#}");
            }
        }

        info!(
            "Agent started (remote advice: {})",
            self.advice
                .model_name()
                .unwrap_or_else(|| "off".to_string())
        );
    }

    /// Stops both loops, releases the camera, then flushes queued events.
    pub async fn shutdown(&self) -> Result<()> {
        self.scheduler.stop().await;
        let released = self.monitor.release().await;

        let dispatcher = self.dispatcher.lock().await.take();
        if let Some(Dispatcher {
            mut handle,
            cancel_token,
        }) = dispatcher
        {
            cancel_token.cancel();
            match tokio::time::timeout(STOP_JOIN_TIMEOUT, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!("Event dispatcher ended abnormally: {err}"),
                Err(_) => {
                    warn!(
                        "Event dispatcher did not stop within {}s, aborting",
                        STOP_JOIN_TIMEOUT.as_secs()
                    );
                    handle.abort();
                }
            }
        }

        info!("Agent shut down");
        released
    }

    pub async fn is_running(&self) -> bool {
        self.dispatcher.lock().await.is_some()
    }

    pub async fn set_event_sink(&self, sink: Arc<dyn EventSink>) {
        *self.sink.lock().await = sink;
    }

    pub async fn pause(&self, duration: Option<Duration>) {
        self.scheduler.pause(duration).await;
    }

    pub async fn resume(&self) {
        self.scheduler.resume().await;
    }

    pub async fn trigger_break_now(&self) -> BreakDue {
        self.scheduler.trigger_break_now().await
    }

    pub async fn record_break_completed(&self) -> bool {
        self.scheduler.break_completed().await
    }

    pub async fn record_break_skipped(&self) -> bool {
        self.scheduler.break_skipped().await
    }

    pub async fn record_activity(&self) {
        self.scheduler.record_activity().await;
    }

    pub async fn reset_timer(&self) {
        self.scheduler.reset_timer().await;
    }

    pub async fn get_time_until_break(&self) -> Duration {
        self.scheduler.get_time_until_break().await
    }

    pub async fn get_status(&self) -> Result<AgentStatus> {
        let light_monitoring_enabled = self.config.lock().await.light_monitoring.enabled;
        Ok(AgentStatus {
            running: self.is_running().await,
            breaks: self.scheduler.get_status().await,
            light_monitoring_enabled,
            light: self.monitor.get_current_status().await?,
            remote_advice_enabled: self.advice.is_remote_enabled(),
            model: self.advice.model_name(),
        })
    }

    pub async fn get_statistics(&self) -> AgentStatistics {
        AgentStatistics {
            breaks: self.scheduler.get_statistics().await,
            light: self.monitor.get_statistics().await,
        }
    }

    pub async fn manual_light_check(&self) -> Result<ManualCheck> {
        self.monitor.manual_check().await
    }

    pub async fn calibrate_light_sensor(&self, known_lux: f64) -> Result<bool> {
        self.monitor.calibrate(known_lux).await
    }

    /// Exercise suited to the time since the last break and today's strain.
    pub async fn get_break_exercise(&self) -> Result<String> {
        let stats = self.scheduler.get_statistics().await;
        let strain = strain_warning_level(screen_hours(&stats), stats.compliance_rate, &[]);
        let light_status = self
            .monitor
            .get_last_reading()
            .await?
            .map(|reading| reading.status);

        Ok(self
            .advice
            .get_break_recommendation(stats.seconds_since_last_break / 60, strain, light_status)
            .await)
    }

    pub async fn get_strain_advice(&self, symptoms: &[String]) -> RecommendationResult {
        let stats = self.scheduler.get_statistics().await;
        self.advice
            .get_strain_advice(screen_hours(&stats), stats.compliance_rate, symptoms)
            .await
    }

    pub async fn clear_advice_cache(&self) {
        self.advice.clear_cache().await;
    }

    /// Applies the change to the running scheduler, then persists it when a
    /// settings store is attached.
    pub async fn update_settings(&self, update: ScheduleSettingsUpdate) -> Result<()> {
        apply_schedule_update(&mut *self.config.lock().await, &update);
        self.scheduler.update_settings(update.clone()).await;

        let Some(store) = &self.store else {
            return Ok(());
        };
        let store = Arc::clone(store);
        tokio::task::spawn_blocking(move || {
            store.update(|config| apply_schedule_update(config, &update))
        })
        .await
        .context("settings worker join failed")??;
        Ok(())
    }

    pub async fn config(&self) -> AgentConfig {
        self.config.lock().await.clone()
    }
}

fn apply_schedule_update(config: &mut AgentConfig, update: &ScheduleSettingsUpdate) {
    if let Some(value) = update.work_interval_minutes {
        config.work_interval_minutes = value;
    }
    if let Some(value) = update.break_duration_seconds {
        config.break_duration_seconds = value;
    }
    if let Some(value) = update.enable_breaks {
        config.enable_breaks = value;
    }
}

fn screen_hours(stats: &SchedulerStatistics) -> f64 {
    stats.total_work_seconds as f64 / 3600.0
}

async fn deliver(sink: &SharedSink, event: AgentEvent) {
    let sink = Arc::clone(&*sink.lock().await);
    let kind = event.kind();
    invoke_guarded(kind, move || sink.deliver(event));
}

async fn dispatch_loop(
    events_rx: Arc<Mutex<UnboundedReceiver<AgentEvent>>>,
    sink: SharedSink,
    cancel_token: CancellationToken,
) {
    let mut events_rx = events_rx.lock().await;
    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                while let Ok(event) = events_rx.try_recv() {
                    deliver(&sink, event).await;
                }
                break;
            }
            event = events_rx.recv() => match event {
                Some(event) => deliver(&sink, event).await,
                None => break,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use super::*;

    fn recording() -> (Arc<dyn EventSink>, Arc<StdMutex<Vec<AgentEvent>>>) {
        let events = Arc::new(StdMutex::new(Vec::new()));
        let seen = Arc::clone(&events);
        let sink: Arc<dyn EventSink> = Arc::new(move |event: AgentEvent| -> anyhow::Result<()> {
            seen.lock().unwrap().push(event);
            Ok(())
        });
        (sink, events)
    }

    fn quiet_config() -> AgentConfig {
        let mut config = AgentConfig::default();
        config.light_monitoring.enabled = false;
        config
    }

    #[tokio::test(start_paused = true)]
    async fn manual_breaks_reach_the_sink_in_order() {
        let (sink, events) = recording();
        let agent = Agent::builder(quiet_config()).event_sink(sink).build();
        agent.start().await;

        agent.trigger_break_now().await;
        agent.trigger_break_now().await;
        agent.shutdown().await.unwrap();

        let offered: Vec<u64> = events
            .lock()
            .unwrap()
            .iter()
            .map(|event| match event {
                AgentEvent::BreakDue(due) => due.breaks_offered,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(offered, vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_sink_does_not_block_later_events() {
        let calls = Arc::new(StdMutex::new(0u32));
        let counter = Arc::clone(&calls);
        let sink: Arc<dyn EventSink> = Arc::new(move |_event: AgentEvent| -> anyhow::Result<()> {
            *counter.lock().unwrap() += 1;
            anyhow::bail!("window closed")
        });
        let agent = Agent::builder(quiet_config()).event_sink(sink).build();
        agent.start().await;

        agent.trigger_break_now().await;
        agent.trigger_break_now().await;
        agent.shutdown().await.unwrap();

        assert_eq!(*calls.lock().unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn sink_can_be_swapped_while_running() {
        let (first, first_events) = recording();
        let (second, second_events) = recording();
        let agent = Agent::builder(quiet_config()).event_sink(first).build();
        agent.start().await;

        agent.trigger_break_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        agent.set_event_sink(second).await;
        agent.trigger_break_now().await;
        agent.shutdown().await.unwrap();

        assert_eq!(first_events.lock().unwrap().len(), 1);
        assert_eq!(second_events.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn strain_advice_uses_scheduler_statistics() {
        let agent = Agent::builder(quiet_config()).build();
        agent.trigger_break_now().await;
        agent.record_break_skipped().await;

        // 0 % compliance is high strain even on a fresh session.
        let advice = agent.get_strain_advice(&[]).await;
        assert_eq!(advice.warning_level, crate::advice::WarningLevel::High);
        assert!(!agent.record_break_completed().await);
    }

    #[tokio::test]
    async fn break_exercise_falls_back_without_provider() {
        let agent = Agent::builder(quiet_config()).build();
        let text = agent.get_break_exercise().await.unwrap();
        assert!(text.contains("Exercise"));
    }

    #[tokio::test(start_paused = true)]
    async fn settings_update_is_mirrored_in_config() {
        let agent = Agent::builder(quiet_config()).build();
        agent
            .update_settings(ScheduleSettingsUpdate {
                work_interval_minutes: Some(45),
                break_duration_seconds: None,
                enable_breaks: Some(false),
            })
            .await
            .unwrap();

        let config = agent.config().await;
        assert_eq!(config.work_interval_minutes, 45);
        assert!(!config.enable_breaks);
        assert_eq!(agent.get_time_until_break().await, Duration::from_secs(45 * 60));
    }

    #[tokio::test]
    async fn settings_update_is_written_to_the_store() {
        let path = std::env::temp_dir().join(format!(
            "eyecare-agent-settings-{}-{}.json",
            std::process::id(),
            line!()
        ));
        let _ = std::fs::remove_file(&path);

        let store = Arc::new(SettingsStore::new(path.clone()).unwrap());
        let agent = Agent::builder(quiet_config())
            .settings_store(Arc::clone(&store))
            .build();
        agent
            .update_settings(ScheduleSettingsUpdate {
                work_interval_minutes: None,
                break_duration_seconds: Some(40),
                enable_breaks: None,
            })
            .await
            .unwrap();

        assert_eq!(store.config().break_duration_seconds, 40);
        let reloaded = SettingsStore::new(path.clone()).unwrap();
        assert_eq!(reloaded.config().break_duration_seconds, 40);
        assert_eq!(reloaded.config().work_interval_minutes, 20);

        let _ = std::fs::remove_file(&path);
    }
}
