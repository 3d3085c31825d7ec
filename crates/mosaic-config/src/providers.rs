use std::time::Duration;

use indexmap::IndexMap;
use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Provider table keyed by provider id, in declaration order
pub type ProvidersConfig = IndexMap<String, ProviderConfig>;

/// Configuration for a single generation provider
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Which upstream protocol the provider speaks
    #[serde(rename = "type")]
    pub kind: ProviderKind,
    /// Upstream API key
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Base URL override
    #[serde(default)]
    pub base_url: Option<Url>,
    /// Upstream model (or model version for prediction providers)
    #[serde(default)]
    pub model: Option<String>,
    /// Expected output size, used to size loading placeholders (e.g. "1024x1024")
    #[serde(default = "default_size")]
    pub size: String,
    /// Poll settings for submit-then-poll providers
    #[serde(default)]
    pub poll: PollConfig,
}

/// Supported upstream protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Single request/response image generation (`OpenAI` images API)
    ImagesApi,
    /// Submit a prediction, then poll it to completion (Replicate API)
    Prediction,
    /// Streamed text and image generation (Google Generative Language API)
    Gemini,
}

impl ProviderKind {
    /// Stable identifier used in responses and logs
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ImagesApi => "images_api",
            Self::Prediction => "prediction",
            Self::Gemini => "gemini",
        }
    }
}

/// Bounded polling for submit-then-poll providers
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollConfig {
    /// Delay between polls (e.g. "500ms")
    #[serde(default = "default_poll_interval")]
    pub interval: String,
    /// Maximum number of polls before giving up
    #[serde(default = "default_poll_attempts")]
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: default_poll_interval(),
            max_attempts: default_poll_attempts(),
        }
    }
}

impl PollConfig {
    /// Parse the configured interval
    ///
    /// # Errors
    ///
    /// Returns an error if the interval is not a valid duration string
    pub fn interval_duration(&self) -> anyhow::Result<Duration> {
        duration_str::parse(&self.interval).map_err(|e| anyhow::anyhow!("invalid poll interval '{}': {e}", self.interval))
    }
}

fn default_size() -> String {
    "1024x1024".to_string()
}

fn default_poll_interval() -> String {
    "500ms".to_string()
}

#[allow(clippy::missing_const_for_fn)]
fn default_poll_attempts() -> u32 {
    120
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_defaults_cap_wait_at_one_minute() {
        let poll = PollConfig::default();
        let total = poll.interval_duration().unwrap() * poll.max_attempts;
        assert_eq!(total, Duration::from_secs(60));
    }

    #[test]
    fn deserialize_prediction_provider() {
        let toml = r#"
            type = "prediction"
            api_key = "r8_test"
            model = "black-forest-labs/flux-schnell"

            [poll]
            interval = "1s"
            max_attempts = 30
        "#;

        let config: ProviderConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.kind, ProviderKind::Prediction);
        assert_eq!(config.size, "1024x1024");
        assert_eq!(config.poll.max_attempts, 30);
        assert_eq!(config.poll.interval_duration().unwrap(), Duration::from_secs(1));
    }

    #[test]
    fn unknown_provider_type_rejected() {
        let toml = r#"type = "midjourney""#;
        assert!(toml::from_str::<ProviderConfig>(toml).is_err());
    }
}
