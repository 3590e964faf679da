//! Gemini provider: Google Generative Language API (multimodal)

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use relay_config::ProviderConfig;

use super::{ProviderClient, ProviderReply, http_client};
use crate::classify::{classify_http_failure, classify_transport_error};
use crate::error::ProviderError;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Google Generative Language provider
///
/// Does not report token usage, so callers estimate it from character
/// length.
pub struct GeminiProvider {
    name: String,
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
}

impl GeminiProvider {
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

    fn generate_url(&self, api_key: &str) -> String {
        format!(
            "{}/models/{}:generateContent?key={api_key}",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl ProviderClient for GeminiProvider {
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

        // Gemini takes one flat text part, so context is folded inline
        let full_prompt = match context {
            Some(context) => format!("{context}\n\nCurrent user message: {prompt}"),
            None => format!("Human: {prompt}"),
        };

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: full_prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.7,
                top_p: 0.8,
                top_k: 40,
                max_output_tokens: 2048,
            },
        };

        let response = self
            .client
            .post(self.generate_url(api_key.expose_secret()))
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

        let generated: GenerateResponse = response.json().await.map_err(|e| {
            ProviderError::Transient(format!("{}: failed to parse response: {e}", self.name))
        })?;

        let text: String = generated
            .candidates
            .into_iter()
            .next()
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .into_iter()
                    .map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(ProviderError::Transient(format!(
                "{}: empty response",
                self.name
            )));
        }

        Ok(ProviderReply {
            text,
            tokens_used: None,
        })
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "topP")]
    top_p: f32,
    #[serde(rename = "topK")]
    top_k: u32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}
