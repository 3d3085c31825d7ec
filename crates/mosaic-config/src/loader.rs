use std::path::Path;

use secrecy::ExposeSecret;

use crate::{Config, PersistenceBackend, ProviderKind, StorageConfig};

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::parse(&raw)
    }

    /// Parse and validate configuration text
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing, or validation fails
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// Missing credentials are reported here, at startup, rather than on
    /// the first request that reaches the provider.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first inconsistency found
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_providers()?;
        self.validate_storage()?;
        self.validate_persistence()?;

        if self.quota.enabled && self.quota.max_generations == 0 {
            anyhow::bail!("quota.max_generations must be greater than 0");
        }

        if let Some(ref enhancer) = self.enhancer
            && enhancer.api_key.expose_secret().is_empty()
        {
            anyhow::bail!("enhancer.api_key must not be empty");
        }

        Ok(())
    }

    fn validate_providers(&self) -> anyhow::Result<()> {
        if self.providers.is_empty() {
            anyhow::bail!("at least one provider must be configured");
        }

        for (name, provider) in &self.providers {
            if name.is_empty() || name.contains('/') {
                anyhow::bail!("provider id '{name}' must be non-empty and must not contain '/'");
            }

            match provider.api_key {
                Some(ref key) if !key.expose_secret().is_empty() => {}
                _ => anyhow::bail!("API key required for provider '{name}'"),
            }

            if provider.kind == ProviderKind::Prediction {
                if provider.poll.max_attempts == 0 {
                    anyhow::bail!("provider '{name}': poll.max_attempts must be greater than 0");
                }
                provider.poll.interval_duration()?;
                if provider.model.is_none() {
                    anyhow::bail!("provider '{name}': prediction providers require a model");
                }
            }

            if parse_size(&provider.size).is_none() {
                anyhow::bail!("provider '{name}': size '{}' must look like 1024x1024", provider.size);
            }
        }

        Ok(())
    }

    fn validate_storage(&self) -> anyhow::Result<()> {
        if let StorageConfig::Http(ref http) = self.storage
            && http.bucket.trim().is_empty()
        {
            anyhow::bail!("storage.bucket must not be empty");
        }
        Ok(())
    }

    fn validate_persistence(&self) -> anyhow::Result<()> {
        if let PersistenceBackend::Jsonl { ref path } = self.persistence.backend
            && path.as_os_str().is_empty()
        {
            anyhow::bail!("persistence.path must not be empty");
        }
        Ok(())
    }
}

/// Parse a `WIDTHxHEIGHT` size string
pub fn parse_size(size: &str) -> Option<(u32, u32)> {
    let (width, height) = size.split_once('x')?;
    let width = width.trim().parse().ok().filter(|w| *w > 0)?;
    let height = height.trim().parse().ok().filter(|h| *h > 0)?;
    Some((width, height))
}
