use serde::Deserialize;

/// Per-user generation ceiling
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuotaConfig {
    /// Whether the ceiling is enforced
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Completed generations allowed per user
    #[serde(default = "default_max_generations")]
    pub max_generations: u32,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_generations: default_max_generations(),
        }
    }
}

#[allow(clippy::missing_const_for_fn)]
fn default_enabled() -> bool {
    true
}

#[allow(clippy::missing_const_for_fn)]
fn default_max_generations() -> u32 {
    10
}
