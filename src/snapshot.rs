//! Snapshot sinks for recording intermediate token states.
//!
//! Snapshots never influence a reduction; they exist so a run can be
//! inspected afterwards.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::TokenId;
use crate::divisors::Divisor;
use crate::errors::SnapshotError;

/// Abstraction over the external snapshot service.
#[async_trait]
pub trait Snapshot: Send + Sync {
    /// Record the state of `id` at `divisor`.
    async fn record(&self, id: TokenId, divisor: Divisor) -> Result<(), SnapshotError>;
}

/// Discards every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSnapshot;

#[async_trait]
impl Snapshot for NoopSnapshot {
    async fn record(&self, _id: TokenId, _divisor: Divisor) -> Result<(), SnapshotError> {
        Ok(())
    }
}

/// Keeps `(id, divisor)` pairs in call order.
#[derive(Debug, Default)]
pub struct MemorySnapshot {
    records: Mutex<Vec<(TokenId, Divisor)>>,
}

impl MemorySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<(TokenId, Divisor)> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl Snapshot for MemorySnapshot {
    async fn record(&self, id: TokenId, divisor: Divisor) -> Result<(), SnapshotError> {
        self.records.lock().await.push((id, divisor));
        Ok(())
    }
}

/// Document written by [`FileSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub id: TokenId,
    pub divisor: Divisor,
    pub recorded_at: DateTime<Utc>,
}

/// Writes one JSON file per record to `<dir>/<id>-<divisor>.json`.
///
/// Recording the same `(id, divisor)` twice overwrites the earlier file.
#[derive(Debug, Clone)]
pub struct FileSnapshot {
    dir: PathBuf,
}

impl FileSnapshot {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, id: TokenId, divisor: Divisor) -> PathBuf {
        self.dir.join(format!("{}-{}.json", id, divisor))
    }
}

#[async_trait]
impl Snapshot for FileSnapshot {
    async fn record(&self, id: TokenId, divisor: Divisor) -> Result<(), SnapshotError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| SnapshotError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let record = SnapshotRecord {
            id,
            divisor,
            recorded_at: Utc::now(),
        };
        let content = serde_json::to_string_pretty(&record)?;

        let path = self.path_for(id, divisor);
        tokio::fs::write(&path, content)
            .await
            .map_err(|source| SnapshotError::Io {
                path: path.clone(),
                source,
            })?;

        tracing::debug!(id, divisor, path = %path.display(), "snapshot recorded");
        Ok(())
    }
}
