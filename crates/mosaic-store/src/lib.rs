//! Storage and persistence collaborators
//!
//! Object storage hands out durable URLs for generated images; the
//! generation log is an append-only record of finished generations.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod error;
mod log;
mod record;
mod storage;

use std::sync::Arc;

use mosaic_config::{PersistenceBackend, PersistenceConfig, StorageConfig};

pub use error::{Result, StoreError};
pub use log::{GenerationLog, JsonlGenerationLog, MemoryGenerationLog};
pub use record::{GenerationRecord, RecordStatus};
pub use storage::{HttpObjectStore, InlineObjectStore, ObjectStore};

/// Build the configured object store
pub fn object_store(config: &StorageConfig) -> anyhow::Result<Arc<dyn ObjectStore>> {
    let store: Arc<dyn ObjectStore> = match config {
        StorageConfig::Inline => {
            tracing::debug!("inlining generated images as data URLs");
            Arc::new(InlineObjectStore)
        }
        StorageConfig::Http(http) => {
            tracing::debug!(endpoint = %http.endpoint, bucket = %http.bucket, "using HTTP object storage");
            Arc::new(HttpObjectStore::new(http)?)
        }
    };
    Ok(store)
}

/// Open the configured generation log
pub async fn generation_log(config: &PersistenceConfig) -> anyhow::Result<Arc<dyn GenerationLog>> {
    let log: Arc<dyn GenerationLog> = match &config.backend {
        PersistenceBackend::Memory => Arc::new(MemoryGenerationLog::default()),
        PersistenceBackend::Jsonl { path } => Arc::new(
            JsonlGenerationLog::open(path)
                .await
                .map_err(|e| anyhow::anyhow!("failed to open generation log {}: {e}", path.display()))?,
        ),
    };
    Ok(log)
}
