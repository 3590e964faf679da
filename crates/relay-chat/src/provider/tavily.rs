//! Tavily provider: real-time web search
//!
//! Search calls are standalone queries — this provider never receives
//! conversational context and its responses are rendered from search
//! results rather than generated text.

use std::fmt::Write;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use relay_config::ProviderConfig;

use super::{ProviderClient, ProviderReply, http_client};
use crate::classify::{classify_http_failure, classify_transport_error};
use crate::error::ProviderError;

const DEFAULT_BASE_URL: &str = "https://api.tavily.com";

/// How many search hits are rendered when no direct answer is returned
const RENDERED_RESULTS: usize = 3;

/// Tavily web-search provider
pub struct TavilyProvider {
    name: String,
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl TavilyProvider {
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
        })
    }
}

#[async_trait]
impl ProviderClient for TavilyProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn uses_context(&self) -> bool {
        false
    }

    async fn call(
        &self,
        prompt: &str,
        _context: Option<&str>,
    ) -> Result<ProviderReply, ProviderError> {
        let Some(api_key) = &self.api_key else {
            return Err(ProviderError::Permanent(format!(
                "{} api key not configured",
                self.name
            )));
        };

        let request = SearchRequest {
            api_key: api_key.expose_secret(),
            query: prompt,
            search_depth: "basic",
            include_answer: true,
            include_raw_content: false,
            max_results: 5,
        };

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
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

        let search: SearchResponse = response.json().await.map_err(|e| {
            ProviderError::Transient(format!("{}: failed to parse response: {e}", self.name))
        })?;

        let text = render_search(&search).ok_or_else(|| {
            ProviderError::Transient(format!("{}: no relevant search results", self.name))
        })?;

        Ok(ProviderReply {
            text,
            tokens_used: None,
        })
    }
}

/// Render a search response as assistant-style prose
fn render_search(search: &SearchResponse) -> Option<String> {
    if let Some(answer) = &search.answer
        && !answer.is_empty()
    {
        return Some(format!("Based on my search: {answer}"));
    }

    if search.results.is_empty() {
        return None;
    }

    let mut text = "Here's what I found:\n\n".to_owned();
    for (index, result) in search.results.iter().take(RENDERED_RESULTS).enumerate() {
        let _ = writeln!(text, "{}. {}\n{}\n", index + 1, result.title, result.content);
    }
    Some(text)
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'static str,
    include_answer: bool,
    include_raw_content: bool,
    max_results: u32,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
}
