pub mod scheduler;
pub mod state;

pub use scheduler::{BreakCallback, BreakScheduler};
pub use state::{
    BreakDue, BreakSettings, ScheduleSettingsUpdate, ScheduleState, SchedulerPhase,
    SchedulerStatistics, SchedulerStatus, TickOutcome, PAUSED_SENTINEL,
};
