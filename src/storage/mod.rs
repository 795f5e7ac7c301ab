//! Persisted fingerprint state.
//!
//! One JSON file maps each source URL to its last-seen fingerprint and
//! check metadata. The file is read once at run start (absent file means an
//! empty store, not an error), mutated in memory by the run task only, and
//! written back exactly once at run end with a temp-file-then-rename so a
//! concurrent reader never observes a partial write.
//!
//! Records are never deleted: a URL removed from the source list simply
//! stops being updated.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};

/// Persisted record for one URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceRecord {
    /// Last fingerprint from a successful fetch. Retained across failed
    /// fetches so an outage cannot manufacture a spurious baseline later.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,

    /// When this URL was last attempted (success or failure)
    pub last_checked_at: DateTime<Utc>,

    /// Error text of the last attempt, cleared on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// In-memory store backed by one JSON file.
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    records: HashMap<String, SourceRecord>,
}

impl StateStore {
    /// Load the store from disk. A missing file yields an empty store.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(AppError::Io(e)),
        };

        Ok(Self { path, records })
    }

    /// Get the record for a URL, if any.
    pub fn get(&self, url: &str) -> Option<&SourceRecord> {
        self.records.get(url)
    }

    /// Get or create the record for a URL.
    pub fn entry(&mut self, url: &str) -> &mut SourceRecord {
        self.records
            .entry(url.to_string())
            .or_insert_with(|| SourceRecord {
                fingerprint: None,
                last_checked_at: Utc::now(),
                last_error: None,
            })
    }

    /// All records, keyed by URL.
    pub fn records(&self) -> &HashMap<String, SourceRecord> {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write the complete store atomically (write to temp, then rename).
    pub async fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let bytes = serde_json::to_vec_pretty(&self.records)?;
        let tmp = self.path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
