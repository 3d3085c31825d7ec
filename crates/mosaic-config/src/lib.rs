#![allow(clippy::must_use_candidate)]

pub mod cors;
pub mod enhancer;
mod env;
pub mod health;
pub mod identity;
mod loader;
pub mod persistence;
pub mod providers;
pub mod quota;
pub mod server;
pub mod storage;
pub mod telemetry;

use serde::Deserialize;

pub use cors::*;
pub use enhancer::*;
pub use health::*;
pub use identity::*;
pub use loader::parse_size;
pub use persistence::*;
pub use providers::*;
pub use quota::*;
pub use server::*;
pub use storage::*;
pub use telemetry::TelemetryConfig;

/// Top-level Mosaic configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Generation providers keyed by the id clients select them with
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// Prompt rewriting step shared by all providers
    #[serde(default)]
    pub enhancer: Option<EnhancerConfig>,
    /// Object storage for generated images
    #[serde(default)]
    pub storage: StorageConfig,
    /// Generation record log
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Per-user generation ceiling
    #[serde(default)]
    pub quota: QuotaConfig,
    /// Telemetry configuration
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
}
