use std::path::Path;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, placeholder expansion
    /// fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        let expanded = crate::env::expand_env(&raw)
            .map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self =
            toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error if no providers are configured, no conversational
    /// provider exists, a quota interval is unparseable, or turn limits
    /// are zero
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.providers.is_empty() {
            anyhow::bail!("at least one provider must be configured");
        }

        if !self
            .providers
            .values()
            .any(|p| p.kind.conversational())
        {
            anyhow::bail!("at least one conversational (non-search) provider must be configured");
        }

        for (name, provider) in &self.providers {
            provider
                .quota
                .reset_interval()
                .map_err(|e| anyhow::anyhow!("provider '{name}': {e}"))?;

            if provider.timeout_secs == 0 {
                anyhow::bail!("provider '{name}': timeout_secs must be greater than 0");
            }
        }

        if self.chat.max_attempts == 0 {
            anyhow::bail!("chat.max_attempts must be greater than 0");
        }

        if self.chat.context_char_budget == 0 {
            anyhow::bail!("chat.context_char_budget must be greater than 0");
        }

        Ok(())
    }

    /// Name of the first search-kind provider, if one is configured
    pub fn search_provider(&self) -> Option<&str> {
        self.providers
            .iter()
            .find(|(_, p)| !p.kind.conversational())
            .map(|(name, _)| name.as_str())
    }
}
