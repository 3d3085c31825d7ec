use std::time::Duration;

use serde::Deserialize;

/// CORS configuration for browser clients
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins; `["*"]` allows any
    #[serde(default = "wildcard")]
    pub origins: Vec<String>,
    /// Allowed methods; `["*"]` allows any
    #[serde(default = "wildcard")]
    pub methods: Vec<String>,
    /// Allowed request headers; `["*"]` allows any
    #[serde(default = "wildcard")]
    pub headers: Vec<String>,
    /// Allow credentials
    #[serde(default)]
    pub credentials: bool,
    /// Max age for preflight cache in seconds
    #[serde(default)]
    pub max_age: Option<u64>,
}

impl CorsConfig {
    /// Get max age as Duration
    pub fn max_age_duration(&self) -> Option<Duration> {
        self.max_age.map(Duration::from_secs)
    }
}

/// Whether a list is the `*` wildcard
pub fn is_wildcard(values: &[String]) -> bool {
    values.iter().any(|v| v == "*")
}

fn wildcard() -> Vec<String> {
    vec!["*".to_string()]
}
