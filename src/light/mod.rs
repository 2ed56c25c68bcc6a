pub mod brightness;
pub mod classifier;
pub mod history;
pub mod loop_worker;
pub mod monitor;
pub mod reading;
pub mod sampler;
pub mod throttle;

pub use brightness::{BrightnessControl, NoBrightnessControl};
pub use classifier::LightStatus;
pub use history::LightStatistics;
pub use monitor::{LightCallback, LightMonitor, LightUpdate, ManualCheck, MonitorSettings, MonitorStatus};
pub use reading::{LightReading, LightSource};
pub use sampler::{AmbientLightSampler, FrameSource, NoCamera, SnapshotCamera};
