use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Configuration for a single AI provider
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Provider protocol type
    #[serde(rename = "type")]
    pub kind: ProviderKind,
    /// API key for authentication
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Base URL override (mock servers in tests, regional endpoints)
    #[serde(default)]
    pub base_url: Option<Url>,
    /// Model identifier override
    #[serde(default)]
    pub model: Option<String>,
    /// Per-call timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Quota policy for this provider
    #[serde(default)]
    pub quota: QuotaPolicyConfig,
}

/// Supported provider protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// OpenAI-compatible chat completions (fast inference)
    Groq,
    /// Google Generative Language API (multimodal)
    Gemini,
    /// Tavily web search — no conversational context threading
    Tavily,
}

impl ProviderKind {
    /// Whether this provider participates in conversational context
    /// carry-over. Search calls are standalone queries.
    pub const fn conversational(self) -> bool {
        !matches!(self, Self::Tavily)
    }
}

/// Quota ceilings and reset window for a provider
///
/// A `None` ceiling means unlimited on that dimension.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuotaPolicyConfig {
    /// Maximum tokens per reset window
    #[serde(default)]
    pub max_tokens: Option<u64>,
    /// Maximum requests per reset window
    #[serde(default)]
    pub max_requests: Option<u64>,
    /// Window duration (e.g. "24h")
    #[serde(default = "default_reset_interval")]
    pub reset_interval: String,
}

impl Default for QuotaPolicyConfig {
    fn default() -> Self {
        Self {
            max_tokens: None,
            max_requests: None,
            reset_interval: default_reset_interval(),
        }
    }
}

impl QuotaPolicyConfig {
    /// Parse the configured reset interval
    ///
    /// # Errors
    ///
    /// Returns an error if the duration string cannot be parsed
    pub fn reset_interval(&self) -> anyhow::Result<Duration> {
        duration_str::parse(&self.reset_interval)
            .map_err(|e| anyhow::anyhow!("invalid reset interval '{}': {e}", self.reset_interval))
    }
}

const fn default_timeout_secs() -> u64 {
    60
}

fn default_reset_interval() -> String {
    "24h".to_owned()
}
