//! Resume state persistence
//!
//! Two stores: an in-memory one for tests and single-process reruns, and a JSON file
//! written atomically (temp file + rename) so an interrupted save never leaves a
//! truncated snapshot behind.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::domain::ports::{ResumeSnapshot, ResumeStore};
use crate::error::StoreError;

/// Snapshot kept in process memory
#[derive(Debug, Default)]
pub struct MemoryResumeStore {
    snapshot: RwLock<ResumeSnapshot>,
}

impl MemoryResumeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: ResumeSnapshot) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
        }
    }

    pub async fn current(&self) -> ResumeSnapshot {
        self.snapshot.read().await.clone()
    }
}

#[async_trait]
impl ResumeStore for MemoryResumeStore {
    async fn load(&self) -> Result<ResumeSnapshot, StoreError> {
        Ok(self.snapshot.read().await.clone())
    }

    async fn save(&self, snapshot: &ResumeSnapshot) -> Result<(), StoreError> {
        *self.snapshot.write().await = snapshot.clone();
        Ok(())
    }
}

/// Snapshot stored as pretty-printed JSON on disk
#[derive(Debug, Clone)]
pub struct JsonFileResumeStore {
    path: PathBuf,
}

impl JsonFileResumeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "resume".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl ResumeStore for JsonFileResumeStore {
    async fn load(&self) -> Result<ResumeSnapshot, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                let snapshot: ResumeSnapshot = serde_json::from_slice(&bytes)?;
                info!(
                    "📂 Loaded resume state from {}: {} URLs, {} keys",
                    self.path.display(),
                    snapshot.visited_urls.len(),
                    snapshot.dedup_keys.len()
                );
                Ok(snapshot)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No resume state at {}, starting fresh", self.path.display());
                Ok(ResumeSnapshot::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, snapshot: &ResumeSnapshot) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let temp = self.temp_path();
        tokio::fs::write(&temp, bytes).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        debug!(
            "Saved resume state to {} ({} URLs, {} keys)",
            self.path.display(),
            snapshot.visited_urls.len(),
            snapshot.dedup_keys.len()
        );
        Ok(())
    }
}
