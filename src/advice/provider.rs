use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::error::AdviceError;
use crate::settings::AiConfig;

const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq)]
pub struct AdviceRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// A remote text-generation backend.
#[async_trait]
pub trait AdviceProvider: Send + Sync {
    async fn request(&self, request: &AdviceRequest) -> Result<String, AdviceError>;

    fn model_name(&self) -> &str;
}

/// Chat-completions client for OpenRouter and compatible APIs.
pub struct OpenRouterClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl OpenRouterClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, AdviceError> {
        let client = Client::builder().timeout(CLIENT_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// `None` when remote advice is switched off or no key is configured.
    pub fn from_config(config: &AiConfig) -> Result<Option<Self>, AdviceError> {
        if !config.enabled {
            return Ok(None);
        }
        let key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(AdviceError::MissingCredentials)?;

        Self::new(key, config.model.clone(), config.base_url.clone()).map(Some)
    }
}

#[async_trait]
impl AdviceProvider for OpenRouterClient {
    async fn request(&self, request: &AdviceRequest) -> Result<String, AdviceError> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": request.user_prompt },
            ],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AdviceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|err| AdviceError::MalformedResponse(err.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| AdviceError::MalformedResponse("response had no message content".into()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
