use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::StoreError;

/// A document as the durable layer holds it. Tombstoned rows are returned
/// too — filtering them out is the store's job, so every reader applies the
/// same rule.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub body: Value,
    pub version: u64,
    pub deleted: bool,
    pub updated_at: DateTime<Utc>,
}

impl StoredDocument {
    /// Version as seen by optimistic-concurrency callers: a tombstoned row
    /// reads as absent, so its live version is 0.
    pub fn live_version(&self) -> u64 {
        if self.deleted {
            0
        } else {
            self.version
        }
    }
}

/// One row from a prefix listing. `body` is `None` when the row exists but
/// could not be decoded; such rows are still listed.
#[derive(Debug, Clone)]
pub struct ListedDocument {
    pub path: String,
    pub body: Option<Value>,
}

/// Durable layer behind the document store. Version counters are strictly
/// monotonic per path, starting at 1, and keep counting across tombstones
/// and resurrections.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    async fn fetch(&self, path: &str) -> Result<Option<StoredDocument>, StoreError>;

    /// Unconditional upsert. Clears any tombstone. Returns the new version.
    async fn write(&self, path: &str, body: &Value) -> Result<u64, StoreError>;

    /// Compare-and-set against the live version. `expected = 0` means
    /// "create only if absent (or tombstoned)". Returns false without
    /// writing on mismatch.
    async fn write_if_version(
        &self,
        path: &str,
        body: &Value,
        expected: u64,
    ) -> Result<bool, StoreError>;

    /// Replace the body with the tombstone payload and set the deleted
    /// flag. A tombstone for an absent path is a no-op.
    async fn mark_deleted(&self, path: &str, tombstone: &Value) -> Result<(), StoreError>;

    /// Every live path under `prefix`, with bodies where readable.
    async fn list(&self, prefix: &str) -> Result<Vec<ListedDocument>, StoreError>;
}

/// In-memory backend for tests and local runs.
#[derive(Default)]
pub struct MemoryBackend {
    docs: Mutex<HashMap<String, StoredDocument>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentBackend for MemoryBackend {
    async fn fetch(&self, path: &str) -> Result<Option<StoredDocument>, StoreError> {
        let docs = self.docs.lock().expect("memory backend poisoned");
        Ok(docs.get(path).cloned())
    }

    async fn write(&self, path: &str, body: &Value) -> Result<u64, StoreError> {
        let mut docs = self.docs.lock().expect("memory backend poisoned");
        let version = docs.get(path).map(|d| d.version).unwrap_or(0) + 1;
        docs.insert(
            path.to_string(),
            StoredDocument {
                body: body.clone(),
                version,
                deleted: false,
                updated_at: Utc::now(),
            },
        );
        Ok(version)
    }

    async fn write_if_version(
        &self,
        path: &str,
        body: &Value,
        expected: u64,
    ) -> Result<bool, StoreError> {
        let mut docs = self.docs.lock().expect("memory backend poisoned");
        let current = docs.get(path).map(|d| d.live_version()).unwrap_or(0);
        if current != expected {
            return Ok(false);
        }
        let version = docs.get(path).map(|d| d.version).unwrap_or(0) + 1;
        docs.insert(
            path.to_string(),
            StoredDocument {
                body: body.clone(),
                version,
                deleted: false,
                updated_at: Utc::now(),
            },
        );
        Ok(true)
    }

    async fn mark_deleted(&self, path: &str, tombstone: &Value) -> Result<(), StoreError> {
        let mut docs = self.docs.lock().expect("memory backend poisoned");
        if let Some(doc) = docs.get_mut(path) {
            doc.body = tombstone.clone();
            doc.version += 1;
            doc.deleted = true;
            doc.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ListedDocument>, StoreError> {
        let docs = self.docs.lock().expect("memory backend poisoned");
        let mut listed: Vec<ListedDocument> = docs
            .iter()
            .filter(|(path, doc)| path.starts_with(prefix) && !doc.deleted)
            .map(|(path, doc)| ListedDocument {
                path: path.clone(),
                body: Some(doc.body.clone()),
            })
            .collect();
        listed.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(listed)
    }
}
