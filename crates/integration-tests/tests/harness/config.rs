//! Programmatic configuration builder for integration tests

use std::net::SocketAddr;

use mosaic_config::{
    Config, EnhancerConfig, HealthConfig, PersistenceConfig, PollConfig, ProviderConfig, ProviderKind, QuotaConfig,
    ServerConfig,
};
use secrecy::SecretString;

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Minimal defaults: random port, health on, inline storage, in-memory log
    pub fn new() -> Self {
        Self {
            config: Config {
                server: ServerConfig {
                    listen_address: Some(SocketAddr::from(([127, 0, 0, 1], 0))),
                    health: HealthConfig {
                        enabled: true,
                        ..HealthConfig::default()
                    },
                    ..ServerConfig::default()
                },
                ..Config::default()
            },
        }
    }

    fn with_provider(mut self, name: &str, kind: ProviderKind, base_url: &str, model: Option<&str>) -> Self {
        self.config.providers.insert(
            name.to_owned(),
            ProviderConfig {
                kind,
                api_key: Some(SecretString::from("test-key")),
                base_url: Some(base_url.parse().expect("valid URL")),
                model: model.map(str::to_owned),
                size: "1024x1024".to_owned(),
                poll: PollConfig {
                    interval: "20ms".to_owned(),
                    max_attempts: 50,
                },
            },
        );
        self
    }

    /// Add an OpenAI-compatible images provider
    pub fn with_images_api(self, name: &str, base_url: &str) -> Self {
        self.with_provider(name, ProviderKind::ImagesApi, base_url, Some("dall-e-3"))
    }

    /// Add a submit-then-poll prediction provider
    pub fn with_prediction(self, name: &str, base_url: &str) -> Self {
        self.with_provider(name, ProviderKind::Prediction, base_url, Some("black-forest-labs/flux-schnell"))
    }

    /// Add a streaming Gemini provider
    pub fn with_gemini(self, name: &str, base_url: &str) -> Self {
        self.with_provider(name, ProviderKind::Gemini, base_url, Some("gemini-test"))
    }

    /// Route prompt enhancement to a chat completion mock
    pub fn with_enhancer(mut self, base_url: &str) -> Self {
        self.config.enhancer = Some(EnhancerConfig {
            api_key: SecretString::from("test-key"),
            base_url: Some(base_url.parse().expect("valid URL")),
            model: "rewrite-test".to_owned(),
            instruction: "Rewrite the prompt.".to_owned(),
        });
        self
    }

    /// Cap completed generations per user
    pub fn with_quota(mut self, max_generations: u32) -> Self {
        self.config.quota = QuotaConfig {
            enabled: true,
            max_generations,
        };
        self
    }

    /// Persist failed branches too
    pub fn recording_failures(mut self) -> Self {
        self.config.persistence = PersistenceConfig {
            record_failures: true,
            ..PersistenceConfig::default()
        };
        self
    }

    /// Disable health endpoint
    pub fn without_health(mut self) -> Self {
        self.config.server.health.enabled = false;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
