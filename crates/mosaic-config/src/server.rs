use std::{net::SocketAddr, num::NonZeroUsize};

use serde::Deserialize;

use crate::{cors::CorsConfig, health::HealthConfig, identity::IdentityConfig};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub listen_address: Option<SocketAddr>,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub cors: Option<CorsConfig>,
    #[serde(default)]
    pub identity: IdentityConfig,
    /// Live conversations kept in memory; the oldest is dropped past this
    #[serde(default)]
    pub max_conversations: Option<NonZeroUsize>,
}
