//! Programmatic config construction for tests

use relay_config::{ChatConfig, Config, ProviderConfig, ProviderKind, QuotaPolicyConfig, ServerConfig};
use secrecy::SecretString;
use url::Url;

/// Builds a relay [`Config`] pointed at mock upstream servers
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config {
                server: ServerConfig {
                    listen_address: None,
                    expose_debug: false,
                },
                chat: ChatConfig::default(),
                providers: indexmap(),
            },
        }
    }

    pub fn with_groq(mut self, name: &str, base_url: &str) -> Self {
        self.config
            .providers
            .insert(name.to_owned(), provider(ProviderKind::Groq, base_url));
        self
    }

    pub fn with_gemini(mut self, name: &str, base_url: &str) -> Self {
        self.config
            .providers
            .insert(name.to_owned(), provider(ProviderKind::Gemini, base_url));
        self
    }

    pub fn with_tavily(mut self, name: &str, base_url: &str) -> Self {
        self.config
            .providers
            .insert(name.to_owned(), provider(ProviderKind::Tavily, base_url));
        self
    }

    /// Override the quota policy of an already-added provider
    pub fn with_quota(mut self, name: &str, max_tokens: Option<u64>, max_requests: Option<u64>) -> Self {
        if let Some(provider) = self.config.providers.get_mut(name) {
            provider.quota = QuotaPolicyConfig {
                max_tokens,
                max_requests,
                reset_interval: "24h".to_owned(),
            };
        }
        self
    }

    pub fn build(self) -> Config {
        self.config.validate().expect("test config must validate");
        self.config
    }
}

fn provider(kind: ProviderKind, base_url: &str) -> ProviderConfig {
    ProviderConfig {
        kind,
        api_key: Some(SecretString::from("test-key".to_owned())),
        base_url: Some(Url::parse(base_url).expect("valid mock URL")),
        model: None,
        timeout_secs: 10,
        quota: QuotaPolicyConfig::default(),
    }
}

fn indexmap() -> indexmap::IndexMap<String, ProviderConfig> {
    indexmap::IndexMap::new()
}
