use log::info;
use serde::Serialize;

use crate::breaks::BreakDue;
use crate::light::LightUpdate;

/// Outward update delivered to the UI collaborator.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentEvent {
    BreakDue(BreakDue),
    LightUpdate(LightUpdate),
}

impl AgentEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            AgentEvent::BreakDue(_) => "break_due",
            AgentEvent::LightUpdate(_) => "light_update",
        }
    }
}

/// Receives events from the agent's dispatcher, one at a time and in order.
pub trait EventSink: Send + Sync {
    fn deliver(&self, event: AgentEvent) -> anyhow::Result<()>;
}

impl<F> EventSink for F
where
    F: Fn(AgentEvent) -> anyhow::Result<()> + Send + Sync,
{
    fn deliver(&self, event: AgentEvent) -> anyhow::Result<()> {
        self(event)
    }
}

/// Writes each event to the log as a JSON line.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn deliver(&self, event: AgentEvent) -> anyhow::Result<()> {
        info!("{}", serde_json::to_string(&event)?);
        Ok(())
    }
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn deliver(&self, _event: AgentEvent) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Map};

    use super::*;
    use crate::light::LightStatus;

    #[test]
    fn break_event_is_tagged() {
        let event = AgentEvent::BreakDue(BreakDue {
            break_duration_seconds: 20,
            breaks_offered: 3,
            next_break_at: Utc.with_ymd_and_hms(2026, 10, 19, 9, 20, 0).unwrap(),
        });

        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "kind": "break_due",
                "break_duration_seconds": 20,
                "breaks_offered": 3,
                "next_break_at": "2026-10-19T09:20:00Z",
            })
        );
        assert_eq!(event.kind(), "break_due");
    }

    #[test]
    fn light_event_is_tagged() {
        let event = AgentEvent::LightUpdate(LightUpdate {
            lux: 420.0,
            status: LightStatus::Optimal,
            metadata: Map::new(),
            recommendation: None,
        });

        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "kind": "light_update",
                "lux": 420.0,
                "status": "optimal",
                "metadata": {},
                "recommendation": null,
            })
        );
    }

    #[test]
    fn closures_are_sinks() {
        let sink = |event: AgentEvent| -> anyhow::Result<()> {
            anyhow::ensure!(event.kind() == "light_update", "unexpected {}", event.kind());
            Ok(())
        };
        let event = AgentEvent::LightUpdate(LightUpdate {
            lux: 10.0,
            status: LightStatus::VeryLow,
            metadata: Map::new(),
            recommendation: None,
        });
        assert!(sink.deliver(event).is_ok());
        assert!(LogSink.deliver(AgentEvent::LightUpdate(LightUpdate {
            lux: 10.0,
            status: LightStatus::VeryLow,
            metadata: Map::new(),
            recommendation: None,
        }))
        .is_ok());
    }
}
