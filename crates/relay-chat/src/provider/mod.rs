//! Provider clients for the external AI backends
//!
//! Each adapter performs exactly one HTTP call per invocation and returns
//! plain text or a classified [`ProviderError`]. Retry decisions belong to
//! the orchestrator, never to the adapters.

pub mod gemini;
pub mod groq;
pub mod tavily;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use relay_config::{Config, ProviderKind};

use crate::error::ProviderError;

/// Successful provider response
#[derive(Debug, Clone)]
pub struct ProviderReply {
    /// Response text, non-empty on success
    pub text: String,
    /// Exact token usage when the provider reports it; `None` means the
    /// caller estimates from character length
    pub tokens_used: Option<u64>,
}

/// One external AI backend
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Configured provider name
    fn name(&self) -> &str;

    /// Whether conversational context is threaded into calls
    ///
    /// False for the search provider: each search is a standalone query
    /// and never receives carry-over context.
    fn uses_context(&self) -> bool {
        true
    }

    /// Perform one call against the external service
    async fn call(
        &self,
        prompt: &str,
        context: Option<&str>,
    ) -> Result<ProviderReply, ProviderError>;
}

/// Construct all configured provider clients, preserving declaration order
///
/// # Errors
///
/// Returns an error if an HTTP client fails to initialize
pub fn build_providers(
    config: &Config,
) -> anyhow::Result<IndexMap<String, Arc<dyn ProviderClient>>> {
    let mut providers: IndexMap<String, Arc<dyn ProviderClient>> = IndexMap::new();

    for (name, provider_config) in &config.providers {
        let provider: Arc<dyn ProviderClient> = match provider_config.kind {
            ProviderKind::Groq => Arc::new(groq::GroqProvider::new(name.clone(), provider_config)?),
            ProviderKind::Gemini => {
                Arc::new(gemini::GeminiProvider::new(name.clone(), provider_config)?)
            }
            ProviderKind::Tavily => {
                Arc::new(tavily::TavilyProvider::new(name.clone(), provider_config)?)
            }
        };
        providers.insert(name.clone(), provider);
    }

    Ok(providers)
}

/// Shared HTTP client setup: independent per-call timeout per provider
pub(crate) fn http_client(timeout_secs: u64) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build HTTP client: {e}"))
}
