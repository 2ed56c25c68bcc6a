pub mod cache;
pub mod fallback;
pub mod prompts;
pub mod provider;
pub mod service;
pub mod types;

pub use provider::{AdviceProvider, AdviceRequest, OpenRouterClient};
pub use service::RecommendationCache;
pub use types::{LightContext, RecommendationResult, UserContext, WarningLevel};
