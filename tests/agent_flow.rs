use std::sync::{Arc, Mutex};
use std::time::Duration;

use eyecare_lib::advice::OpenRouterClient;
use eyecare_lib::agent::{Agent, AgentEvent, EventSink};
use eyecare_lib::breaks::BreakSettings;
use eyecare_lib::error::SensorError;
use eyecare_lib::light::{FrameSource, LightSource, LightStatus, MonitorSettings};
use eyecare_lib::settings::AgentConfig;
use image::{DynamicImage, GrayImage, Luma};

struct GrayCamera(u8);

impl FrameSource for GrayCamera {
    fn is_available(&self) -> bool {
        true
    }

    fn capture_frame(&mut self) -> Result<DynamicImage, SensorError> {
        Ok(DynamicImage::ImageLuma8(GrayImage::from_pixel(16, 16, Luma([self.0]))))
    }

    fn release(&mut self) {}
}

fn recording_sink() -> (Arc<dyn EventSink>, Arc<Mutex<Vec<AgentEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&events);
    let sink: Arc<dyn EventSink> = Arc::new(move |event: AgentEvent| -> anyhow::Result<()> {
        seen.lock().unwrap().push(event);
        Ok(())
    });
    (sink, events)
}

fn config(light_monitoring: bool) -> AgentConfig {
    let mut config = AgentConfig::default();
    config.light_monitoring.enabled = light_monitoring;
    config.ai.enabled = false;
    config
}

fn fast_light() -> MonitorSettings {
    MonitorSettings {
        check_interval: Duration::from_millis(50),
        ..MonitorSettings::default()
    }
}

async fn wait_for_light_update(events: &Arc<Mutex<Vec<AgentEvent>>>) -> AgentEvent {
    for _ in 0..300 {
        let found = events
            .lock()
            .unwrap()
            .iter()
            .find(|event| matches!(event, AgentEvent::LightUpdate(_)))
            .cloned();
        if let Some(event) = found {
            return event;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no light update arrived");
}

#[tokio::test(start_paused = true)]
async fn one_second_work_interval_offers_one_break() {
    let (sink, events) = recording_sink();
    let agent = Agent::builder(config(false))
        .break_settings(BreakSettings {
            work_interval: Duration::from_secs(1),
            ..BreakSettings::default()
        })
        .event_sink(sink)
        .build();

    agent.start().await;
    tokio::time::sleep(Duration::from_millis(1500)).await;

    {
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            AgentEvent::BreakDue(due) => {
                assert_eq!(due.breaks_offered, 1);
                assert_eq!(due.break_duration_seconds, 20);
            }
            other => panic!("expected a break, got {other:?}"),
        }
    }

    assert!(agent.record_break_skipped().await);
    let stats = agent.get_statistics().await.breaks;
    assert_eq!(stats.breaks_offered, 1);
    assert_eq!(stats.breaks_completed + stats.breaks_skipped, 1);
    assert_eq!(stats.compliance_rate, 0.0);

    agent.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn temporary_pause_reports_sentinel_then_resumes_countdown() {
    let agent = Agent::builder(config(false)).build();
    agent.start().await;

    agent.pause(Some(Duration::from_secs(2))).await;
    assert!(agent.get_time_until_break().await >= Duration::from_secs(24 * 60 * 60));

    tokio::time::sleep(Duration::from_secs(3)).await;
    let remaining = agent.get_time_until_break().await;
    assert!(remaining < Duration::from_secs(20 * 60));
    assert!(remaining >= Duration::from_secs(20 * 60 - 4));

    agent.shutdown().await.unwrap();
}

#[tokio::test]
async fn light_updates_flow_to_the_sink() {
    let (sink, events) = recording_sink();
    let agent = Agent::builder(config(true))
        .camera(Box::new(GrayCamera(51)))
        .monitor_settings(fast_light())
        .event_sink(sink)
        .build();

    agent.start().await;
    let event = wait_for_light_update(&events).await;
    agent.shutdown().await.unwrap();

    let AgentEvent::LightUpdate(update) = &event else {
        unreachable!()
    };
    assert_eq!(update.status, LightStatus::Low);
    let recommendation = update.recommendation.as_ref().expect("fallback advice");
    assert_eq!(recommendation.confidence, 0.70);

    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["kind"], "light_update");
    assert_eq!(json["status"], "low");

    let status = agent.get_status().await.unwrap();
    assert!(!status.running);
    assert!(!status.light.camera_available);
    assert_eq!(status.light.source, Some(LightSource::Webcam));
}

#[tokio::test]
async fn remote_advice_is_attached_to_light_updates() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer integration-key")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"choices":[{"message":{"content":"Dim room.\n- Switch on a desk lamp\n- Lower screen brightness"}}]}"#,
        )
        .expect(1)
        .create_async()
        .await;

    let client = OpenRouterClient::new("integration-key", "test-model", server.url()).unwrap();
    let (sink, events) = recording_sink();
    let agent = Agent::builder(config(true))
        .camera(Box::new(GrayCamera(51)))
        .monitor_settings(fast_light())
        .advice_provider(Arc::new(client))
        .event_sink(sink)
        .build();

    agent.start().await;
    let event = wait_for_light_update(&events).await;
    // A few more checks; the throttle must keep them off the network.
    tokio::time::sleep(Duration::from_millis(200)).await;
    agent.shutdown().await.unwrap();

    let AgentEvent::LightUpdate(update) = event else {
        unreachable!()
    };
    let recommendation = update.recommendation.expect("remote advice");
    assert_eq!(recommendation.confidence, 0.85);
    assert!(!recommendation.from_cache);
    assert_eq!(
        recommendation.action_items,
        vec!["Switch on a desk lamp", "Lower screen brightness"]
    );
    mock.assert_async().await;

    let status = agent.get_status().await.unwrap();
    assert!(status.remote_advice_enabled);
    assert_eq!(status.model.as_deref(), Some("test-model"));
}

#[tokio::test]
async fn manual_check_without_camera_uses_the_clock() {
    let agent = Agent::builder(config(false)).build();

    let check = agent.manual_light_check().await.unwrap();
    assert_eq!(check.reading.source, LightSource::TimeBasedFallback);
    assert!(!agent.calibrate_light_sensor(300.0).await.unwrap());

    let advice = agent
        .get_strain_advice(&["headache".to_string()])
        .await;
    assert_eq!(advice.warning_level, eyecare_lib::WarningLevel::High);
}

#[tokio::test]
async fn restart_after_shutdown_uses_the_camera_again() {
    let agent = Agent::builder(config(false))
        .camera(Box::new(GrayCamera(51)))
        .build();

    agent.start().await;
    let before = agent.manual_light_check().await.unwrap();
    assert_eq!(before.reading.source, LightSource::Webcam);
    agent.shutdown().await.unwrap();

    agent.start().await;
    let after = agent.manual_light_check().await.unwrap();
    assert_eq!(after.reading.source, LightSource::Webcam);
    assert!(agent.get_status().await.unwrap().light.camera_available);
    agent.shutdown().await.unwrap();
}
