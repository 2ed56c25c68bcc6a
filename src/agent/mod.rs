pub mod controller;
pub mod events;

pub use controller::{Agent, AgentBuilder, AgentStatistics, AgentStatus};
pub use events::{AgentEvent, EventSink, LogSink, NullSink};
