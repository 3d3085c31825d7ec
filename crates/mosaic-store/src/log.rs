use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mosaic_core::UserId;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};

use crate::error::Result;
use crate::record::{GenerationRecord, RecordStatus};

/// Append-only log of generation records
#[async_trait]
pub trait GenerationLog: Send + Sync {
    /// Append a record
    async fn insert(&self, record: GenerationRecord) -> Result<()>;

    /// Completed records for a user, newest first
    async fn query_completed(&self, user: &UserId) -> Result<Vec<GenerationRecord>>;

    /// Number of completed records for a user
    async fn count_completed(&self, user: &UserId) -> Result<usize> {
        Ok(self.query_completed(user).await?.len())
    }
}

fn completed_for(records: &[GenerationRecord], user: &UserId) -> Vec<GenerationRecord> {
    let mut matching: Vec<_> = records
        .iter()
        .filter(|r| &r.user_id == user && r.status == RecordStatus::Completed)
        .cloned()
        .collect();
    matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    matching
}

/// Log held in process memory
#[derive(Default)]
pub struct MemoryGenerationLog {
    records: RwLock<Vec<GenerationRecord>>,
}

impl MemoryGenerationLog {
    /// Every record in insertion order, whatever its status
    pub async fn snapshot(&self) -> Vec<GenerationRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl GenerationLog for MemoryGenerationLog {
    async fn insert(&self, record: GenerationRecord) -> Result<()> {
        self.records.write().await.push(record);
        Ok(())
    }

    async fn query_completed(&self, user: &UserId) -> Result<Vec<GenerationRecord>> {
        Ok(completed_for(&self.records.read().await, user))
    }

    async fn count_completed(&self, user: &UserId) -> Result<usize> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| &r.user_id == user && r.status == RecordStatus::Completed)
            .count())
    }
}

/// Log persisted as one JSON document per line
///
/// The file is replayed into memory on open; inserts append to the file
/// before becoming visible to queries.
pub struct JsonlGenerationLog {
    path: PathBuf,
    writer: Mutex<tokio::fs::File>,
    records: RwLock<Vec<GenerationRecord>>,
}

impl JsonlGenerationLog {
    /// Open (or create) the log at `path`
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut records = Vec::new();
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => {
                for (number, line) in contents.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<GenerationRecord>(line) {
                        Ok(record) => records.push(record),
                        Err(e) => tracing::warn!(
                            path = %path.display(),
                            line = number + 1,
                            error = %e,
                            "skipping unreadable generation record"
                        ),
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let writer = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;

        tracing::debug!(path = %path.display(), records = records.len(), "generation log opened");

        Ok(Self {
            path: path.to_owned(),
            writer: Mutex::new(writer),
            records: RwLock::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl GenerationLog for JsonlGenerationLog {
    async fn insert(&self, record: GenerationRecord) -> Result<()> {
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        {
            let mut writer = self.writer.lock().await;
            writer.write_all(&line).await?;
            writer.flush().await?;
        }

        self.records.write().await.push(record);
        Ok(())
    }

    async fn query_completed(&self, user: &UserId) -> Result<Vec<GenerationRecord>> {
        Ok(completed_for(&self.records.read().await, user))
    }
}
