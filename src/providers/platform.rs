//! Chat-completion platforms (OpenAI-compatible HTTP APIs).
//!
//! A [`ChatPlatform`] turns one prompt into one completion string. The
//! [`ChatPlatforms`] set maps platform ids to clients and resolves which
//! platform serves a given model through the pricing table.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::http::{DEFAULT_TIMEOUT, build_client, check_status};
use crate::pricing::PricingTable;
use crate::{MimirError, Result};

/// Default base URL for the OpenAI API.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default base URL for the xAI (Grok) API.
pub const GROK_BASE_URL: &str = "https://api.x.ai/v1";

/// A backend that completes a single-message prompt.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Platform id, matching `ModelSpec::platform` ("openai", "grok").
    fn id(&self) -> &str;

    /// Send `prompt` as one user message and return the reply text.
    async fn complete(&self, model: &str, prompt: &str) -> Result<String>;
}

/// Client for any API speaking the OpenAI chat-completions protocol.
#[derive(Clone)]
pub struct OpenAiCompatiblePlatform {
    id: String,
    api_key: String,
    http: Client,
    base_url: String,
}

impl OpenAiCompatiblePlatform {
    /// OpenAI at its public endpoint.
    pub fn openai(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url("openai", api_key, OPENAI_BASE_URL)
    }

    /// xAI's Grok models.
    pub fn grok(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url("grok", api_key, GROK_BASE_URL)
    }

    /// Any id and base URL (self-hosted gateways, wiremock in tests).
    pub fn with_base_url(
        id: impl Into<String>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        Self::with_timeout(id, api_key, base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        id: impl Into<String>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            id: id.into(),
            api_key: api_key.into(),
            http: build_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ChatPlatform for OpenAiCompatiblePlatform {
    fn id(&self) -> &str {
        &self.id
    }

    async fn complete(&self, model: &str, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&CompletionRequest {
                model,
                messages: vec![RequestMessage {
                    role: "user",
                    content: prompt,
                }],
            })
            .send()
            .await?;

        let response = check_status(response, &self.id).await?;
        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| MimirError::DataError(format!("malformed completion body: {e}")))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(MimirError::EmptyResponse)
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<RequestMessage<'a>>,
}

#[derive(Serialize)]
struct RequestMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Registered chat platforms, keyed by id.
#[derive(Clone, Default)]
pub struct ChatPlatforms {
    platforms: HashMap<String, Arc<dyn ChatPlatform>>,
}

impl ChatPlatforms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, platform: Arc<dyn ChatPlatform>) {
        self.platforms.insert(platform.id().to_string(), platform);
    }

    pub fn with(mut self, platform: Arc<dyn ChatPlatform>) -> Self {
        self.register(platform);
        self
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn ChatPlatform>> {
        self.platforms.get(id)
    }

    pub fn is_empty(&self) -> bool {
        self.platforms.is_empty()
    }

    /// Platform serving `model`.
    ///
    /// Known models go to the platform named in the pricing table. A model
    /// the table does not know is sent to the only registered platform, if
    /// there is exactly one; otherwise it is ambiguous.
    pub fn resolve(&self, model: &str, pricing: &PricingTable) -> Result<Arc<dyn ChatPlatform>> {
        if let Some(spec) = pricing.get(model) {
            return self.get(&spec.platform).cloned().ok_or_else(|| {
                MimirError::Configuration(format!(
                    "model {model} needs platform '{}', which is not configured",
                    spec.platform
                ))
            });
        }
        match self.platforms.values().collect::<Vec<_>>().as_slice() {
            [only] => Ok(Arc::clone(only)),
            _ => Err(MimirError::UnknownModel(model.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    #[async_trait]
    impl ChatPlatform for Named {
        fn id(&self) -> &str {
            self.0
        }

        async fn complete(&self, _model: &str, _prompt: &str) -> Result<String> {
            Ok(String::new())
        }
    }

    #[test]
    fn resolve_by_pricing_table() {
        let pricing = PricingTable::embedded();
        let platforms = ChatPlatforms::new()
            .with(Arc::new(Named("openai")))
            .with(Arc::new(Named("grok")));
        assert_eq!(platforms.resolve("grok-4", &pricing).unwrap().id(), "grok");
        assert_eq!(platforms.resolve("gpt-5", &pricing).unwrap().id(), "openai");
        assert!(matches!(
            platforms.resolve("llama-3", &pricing),
            Err(MimirError::UnknownModel(_))
        ));
    }

    #[test]
    fn unknown_model_uses_single_platform() {
        let pricing = PricingTable::embedded();
        let platforms = ChatPlatforms::new().with(Arc::new(Named("local")));
        assert_eq!(platforms.resolve("llama-3", &pricing).unwrap().id(), "local");
    }

    #[test]
    fn known_model_without_its_platform_is_a_config_error() {
        let pricing = PricingTable::embedded();
        let platforms = ChatPlatforms::new().with(Arc::new(Named("openai")));
        assert!(matches!(
            platforms.resolve("grok-3-mini", &pricing),
            Err(MimirError::Configuration(_))
        ));
    }
}
