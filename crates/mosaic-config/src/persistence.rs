use std::path::PathBuf;

use serde::Deserialize;

/// Generation record log configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PersistenceConfig {
    /// Storage backend
    #[serde(default)]
    pub backend: PersistenceBackend,
    /// Also record failed branches
    #[serde(default)]
    pub record_failures: bool,
}

/// Record log backend
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PersistenceBackend {
    /// In-memory log, lost on restart
    #[default]
    Memory,
    /// Append-only JSON lines file
    Jsonl {
        /// Path of the log file
        path: PathBuf,
    },
}
