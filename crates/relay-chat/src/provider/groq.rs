//! Groq provider: OpenAI-compatible chat completions (fast inference)

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use relay_config::ProviderConfig;

use super::{ProviderClient, ProviderReply, http_client};
use crate::classify::{classify_http_failure, classify_transport_error};
use crate::error::ProviderError;

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

const SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant. Provide clear, accurate, and helpful responses.";

/// OpenAI-compatible chat completion provider
pub struct GroqProvider {
    name: String,
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
}

impl GroqProvider {
    /// Create from provider configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to initialize
    pub fn new(name: String, config: &ProviderConfig) -> anyhow::Result<Self> {
        let base_url = config
            .base_url
            .as_ref()
            .map_or(DEFAULT_BASE_URL, |u| u.as_str().trim_end_matches('/'))
            .to_owned();

        Ok(Self {
            name,
            client: http_client(config.timeout_secs)?,
            base_url,
            api_key: config.api_key.clone(),
            model: config.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
        })
    }
}

#[async_trait]
impl ProviderClient for GroqProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(
        &self,
        prompt: &str,
        context: Option<&str>,
    ) -> Result<ProviderReply, ProviderError> {
        let Some(api_key) = &self.api_key else {
            return Err(ProviderError::Permanent(format!(
                "{} api key not configured",
                self.name
            )));
        };

        let mut messages = vec![WireMessage {
            role: "system",
            content: SYSTEM_PROMPT.to_owned(),
        }];
        if let Some(context) = context {
            messages.push(WireMessage {
                role: "system",
                content: format!("Context from the ongoing conversation:\n{context}"),
            });
        }
        messages.push(WireMessage {
            role: "user",
            content: prompt.to_owned(),
        });

        let request = CompletionRequest {
            model: &self.model,
            messages,
            temperature: 0.7,
            max_tokens: 2048,
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(provider = %self.name, error = %e, "upstream request failed");
                classify_transport_error(&self.name, &e)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(provider = %self.name, %status, "upstream returned error");
            return Err(classify_http_failure(&self.name, status, &body));
        }

        let completion: CompletionResponse = response.json().await.map_err(|e| {
            ProviderError::Transient(format!("{}: failed to parse response: {e}", self.name))
        })?;

        let text = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .unwrap_or_default();

        if text.is_empty() {
            return Err(ProviderError::Transient(format!(
                "{}: empty completion",
                self.name
            )));
        }

        let tokens_used = completion.usage.map(|usage| {
            usage
                .total_tokens
                .unwrap_or(usage.prompt_tokens.unwrap_or(0) + usage.completion_tokens.unwrap_or(0))
        });

        Ok(ProviderReply { text, tokens_used })
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: Option<u64>,
    #[serde(default)]
    completion_tokens: Option<u64>,
    #[serde(default)]
    total_tokens: Option<u64>,
}
