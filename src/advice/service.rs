use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::Mutex;
use tokio::time::{timeout, Duration, Instant};

use super::{
    cache::{light_key, strain_key, ResponseCache, CACHE_TTL},
    fallback, prompts,
    provider::{AdviceProvider, AdviceRequest},
    types::{LightContext, RecommendationResult, UserContext, WarningLevel},
};
use crate::error::AdviceError;
use crate::light::LightStatus;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub const REMOTE_LIGHT_CONFIDENCE: f64 = 0.85;
pub const REMOTE_STRAIN_CONFIDENCE: f64 = 0.80;

/// Advice front door. Every call returns something: remote text when a
/// provider is configured and answers in time, rule-based text otherwise.
/// Only remote answers are cached.
pub struct RecommendationCache {
    provider: Option<Arc<dyn AdviceProvider>>,
    cache: Mutex<ResponseCache>,
    request_timeout: Duration,
}

impl RecommendationCache {
    pub fn new(provider: Option<Arc<dyn AdviceProvider>>) -> Self {
        Self {
            provider,
            cache: Mutex::new(ResponseCache::new(CACHE_TTL)),
            request_timeout: REQUEST_TIMEOUT,
        }
    }

    pub fn fallback_only() -> Self {
        Self::new(None)
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.cache = Mutex::new(ResponseCache::new(ttl));
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn is_remote_enabled(&self) -> bool {
        self.provider.is_some()
    }

    pub fn model_name(&self) -> Option<String> {
        self.provider.as_ref().map(|p| p.model_name().to_string())
    }

    pub async fn get_light_recommendation(
        &self,
        light: &LightContext,
        user: &UserContext,
    ) -> RecommendationResult {
        let key = light_key(light.lux);
        if let Some(hit) = self.cache.lock().await.get(&key, Instant::now()) {
            debug!("Light advice cache hit for {key}");
            return hit;
        }

        let request = AdviceRequest {
            system_prompt: prompts::LIGHT_ANALYSIS_SYSTEM.into(),
            user_prompt: prompts::light_user_prompt(light, user),
            temperature: 0.3,
            max_tokens: 500,
        };

        match self.request_remote(&request).await {
            Ok(text) => {
                let items = fallback::extract_action_items(&text);
                let warning = fallback::light_warning_level(light.lux);
                let result =
                    RecommendationResult::new(text, REMOTE_LIGHT_CONFIDENCE, items, warning);
                self.cache
                    .lock()
                    .await
                    .insert(key, result.clone(), Instant::now());
                result
            }
            Err(err) => {
                log_fallback("light", &err);
                fallback::light_fallback(light)
            }
        }
    }

    /// `break_compliance` is a percentage.
    pub async fn get_strain_advice(
        &self,
        screen_time_hours: f64,
        break_compliance: f64,
        symptoms: &[String],
    ) -> RecommendationResult {
        let key = strain_key(screen_time_hours, break_compliance);
        if let Some(hit) = self.cache.lock().await.get(&key, Instant::now()) {
            debug!("Strain advice cache hit for {key}");
            return hit;
        }

        let request = AdviceRequest {
            system_prompt: prompts::EYE_STRAIN_SYSTEM.into(),
            user_prompt: prompts::strain_user_prompt(screen_time_hours, break_compliance, symptoms),
            temperature: 0.4,
            max_tokens: 400,
        };

        match self.request_remote(&request).await {
            Ok(text) => {
                let items = fallback::extract_action_items(&text);
                let warning =
                    fallback::strain_warning_level(screen_time_hours, break_compliance, symptoms);
                let result =
                    RecommendationResult::new(text, REMOTE_STRAIN_CONFIDENCE, items, warning);
                self.cache
                    .lock()
                    .await
                    .insert(key, result.clone(), Instant::now());
                result
            }
            Err(err) => {
                log_fallback("strain", &err);
                fallback::strain_fallback(screen_time_hours, break_compliance, symptoms)
            }
        }
    }

    /// Break exercise text. Never cached.
    pub async fn get_break_recommendation(
        &self,
        minutes_since_break: u64,
        strain_level: WarningLevel,
        light_status: Option<LightStatus>,
    ) -> String {
        let request = AdviceRequest {
            system_prompt: prompts::BREAK_EXERCISE_SYSTEM.into(),
            user_prompt: prompts::break_user_prompt(minutes_since_break, strain_level, light_status),
            temperature: 0.5,
            max_tokens: 200,
        };

        match self.request_remote(&request).await {
            Ok(text) => text,
            Err(err) => {
                log_fallback("break exercise", &err);
                fallback::exercise_fallback(minutes_since_break, strain_level).to_string()
            }
        }
    }

    pub async fn clear_cache(&self) {
        self.cache.lock().await.clear();
        info!("Advice cache cleared");
    }

    pub async fn cached_entries(&self) -> usize {
        self.cache.lock().await.len()
    }

    async fn request_remote(&self, request: &AdviceRequest) -> Result<String, AdviceError> {
        let provider = self.provider.as_ref().ok_or(AdviceError::Disabled)?;

        let text = timeout(self.request_timeout, provider.request(request))
            .await
            .map_err(|_| AdviceError::Timeout(self.request_timeout))??;

        if text.trim().is_empty() {
            return Err(AdviceError::MalformedResponse("empty completion".into()));
        }
        Ok(text)
    }
}

fn log_fallback(kind: &str, err: &AdviceError) {
    match err {
        AdviceError::Disabled => debug!("Using rule-based {kind} advice"),
        _ => warn!("Remote {kind} advice unavailable, using rule-based advice: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;

    struct ScriptedProvider {
        reply: Result<&'static str, ()>,
        delay: Duration,
        calls: AtomicUsize,
        last_temperature: std::sync::Mutex<Option<f32>>,
    }

    impl ScriptedProvider {
        fn replying(reply: &'static str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
                last_temperature: std::sync::Mutex::new(None),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err(()),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
                last_temperature: std::sync::Mutex::new(None),
            })
        }

        fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok("- too late"),
                delay,
                calls: AtomicUsize::new(0),
                last_temperature: std::sync::Mutex::new(None),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AdviceProvider for ScriptedProvider {
        async fn request(&self, request: &AdviceRequest) -> Result<String, AdviceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_temperature.lock().unwrap() = Some(request.temperature);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.reply
                .map(str::to_string)
                .map_err(|_| AdviceError::Status {
                    status: 503,
                    body: "unavailable".into(),
                })
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn light(lux: f64, status: LightStatus) -> LightContext {
        LightContext { lux, status }
    }

    #[tokio::test(start_paused = true)]
    async fn remote_light_advice_is_cached_per_band() {
        let provider = ScriptedProvider::replying("Try this:\n• Close the blinds\n1. Dim the screen");
        let advice = RecommendationCache::new(Some(provider.clone()));
        let user = UserContext::default();

        let first = advice
            .get_light_recommendation(&light(287.0, LightStatus::Low), &user)
            .await;
        assert!(!first.from_cache);
        assert_eq!(first.confidence, REMOTE_LIGHT_CONFIDENCE);
        assert_eq!(first.action_items, vec!["Close the blinds", "Dim the screen"]);
        assert_eq!(first.warning_level, WarningLevel::Low);

        let second = advice
            .get_light_recommendation(&light(299.0, LightStatus::Low), &user)
            .await;
        assert!(second.from_cache);
        assert_eq!(second.text, first.text);
        assert_eq!(provider.calls(), 1);

        advice
            .get_light_recommendation(&light(300.0, LightStatus::Optimal), &user)
            .await;
        assert_eq!(provider.calls(), 2);
        assert_eq!(*provider.last_temperature.lock().unwrap(), Some(0.3));
    }

    #[tokio::test(start_paused = true)]
    async fn cache_entries_expire() {
        let provider = ScriptedProvider::replying("- Add a lamp");
        let advice = RecommendationCache::new(Some(provider.clone()));
        let user = UserContext::default();

        advice
            .get_light_recommendation(&light(150.0, LightStatus::Low), &user)
            .await;
        tokio::time::advance(CACHE_TTL + Duration::from_secs(1)).await;
        let again = advice
            .get_light_recommendation(&light(150.0, LightStatus::Low), &user)
            .await;

        assert!(!again.from_cache);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn without_provider_light_advice_falls_back() {
        let advice = RecommendationCache::fallback_only();
        assert!(!advice.is_remote_enabled());
        assert_eq!(advice.model_name(), None);

        let result = advice
            .get_light_recommendation(&light(50.0, LightStatus::VeryLow), &UserContext::default())
            .await;
        assert_eq!(result.confidence, fallback::LIGHT_FALLBACK_CONFIDENCE);
        assert_eq!(result.warning_level, WarningLevel::High);
        assert!(!result.from_cache);
        assert_eq!(advice.cached_entries().await, 0);
    }

    #[tokio::test]
    async fn provider_errors_fall_back_and_are_not_cached() {
        let provider = ScriptedProvider::failing();
        let advice = RecommendationCache::new(Some(provider.clone()));

        let result = advice.get_strain_advice(9.0, 40.0, &[]).await;
        assert_eq!(result.confidence, fallback::STRAIN_FALLBACK_CONFIDENCE);
        assert_eq!(result.warning_level, WarningLevel::High);

        advice.get_strain_advice(9.0, 40.0, &[]).await;
        assert_eq!(provider.calls(), 2);
        assert_eq!(advice.cached_entries().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_times_out_into_fallback() {
        let provider = ScriptedProvider::slow(Duration::from_secs(60));
        let advice = RecommendationCache::new(Some(provider.clone()));

        let started = Instant::now();
        let result = advice
            .get_light_recommendation(&light(900.0, LightStatus::High), &UserContext::default())
            .await;

        let waited = started.elapsed();
        assert!(waited >= REQUEST_TIMEOUT && waited < REQUEST_TIMEOUT + Duration::from_secs(1));
        assert_eq!(result.confidence, fallback::LIGHT_FALLBACK_CONFIDENCE);
        assert!(result.text.starts_with("Bright light"));
    }

    #[tokio::test]
    async fn remote_strain_advice_escalates_on_symptoms() {
        let provider = ScriptedProvider::replying("- Blink more often");
        let advice = RecommendationCache::new(Some(provider.clone()));

        let calm = advice.get_strain_advice(3.0, 90.0, &[]).await;
        assert_eq!(calm.warning_level, WarningLevel::Low);
        assert_eq!(calm.confidence, REMOTE_STRAIN_CONFIDENCE);

        // Same key, so symptoms do not bypass the cached entry.
        let cached = advice
            .get_strain_advice(3.2, 90.5, &["dry eyes".to_string()])
            .await;
        assert!(cached.from_cache);
        assert_eq!(provider.calls(), 1);

        advice.clear_cache().await;
        let fresh = advice
            .get_strain_advice(3.2, 90.5, &["dry eyes".to_string()])
            .await;
        assert_eq!(fresh.warning_level, WarningLevel::High);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn break_exercise_is_never_cached() {
        let provider = ScriptedProvider::replying("EXERCISE: Palming");
        let advice = RecommendationCache::new(Some(provider.clone()));

        let text = advice
            .get_break_recommendation(25, WarningLevel::Low, Some(LightStatus::Optimal))
            .await;
        assert_eq!(text, "EXERCISE: Palming");
        advice
            .get_break_recommendation(25, WarningLevel::Low, Some(LightStatus::Optimal))
            .await;
        assert_eq!(provider.calls(), 2);
        assert_eq!(*provider.last_temperature.lock().unwrap(), Some(0.5));
    }

    #[tokio::test]
    async fn break_exercise_fallback_follows_strain() {
        let advice = RecommendationCache::fallback_only();
        assert_eq!(
            advice.get_break_recommendation(45, WarningLevel::Low, None).await,
            prompts::EXERCISE_20_20_20
        );
        assert_eq!(
            advice.get_break_recommendation(10, WarningLevel::Medium, None).await,
            prompts::EXERCISE_FOCUS_SHIFT
        );
    }
}
