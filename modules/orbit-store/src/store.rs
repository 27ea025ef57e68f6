use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::backend::DocumentBackend;
use crate::cache::{ReadCache, DEFAULT_TTL};
use crate::error::StoreError;

/// Versioned, cacheable document store with tombstone deletion.
///
/// Read failures degrade to absent results and never cross this boundary as
/// errors; write failures always propagate so callers can retry or report.
pub struct DocumentStore {
    backend: Arc<dyn DocumentBackend>,
    cache: ReadCache,
}

impl DocumentStore {
    pub fn new(backend: Arc<dyn DocumentBackend>) -> Self {
        Self::with_ttl(backend, DEFAULT_TTL)
    }

    pub fn with_ttl(backend: Arc<dyn DocumentBackend>, ttl: Duration) -> Self {
        Self {
            backend,
            cache: ReadCache::new(ttl),
        }
    }

    /// Freshest non-tombstoned document, or `None` when absent, tombstoned,
    /// or unreadable. Served from the cache within the TTL; concurrent
    /// misses for the same path share one backing fetch.
    pub async fn get(&self, path: &str) -> Option<Value> {
        if let Some(value) = self.cache.get_fresh(path) {
            return Some(value);
        }

        let cell = self.cache.inflight_cell(path);
        let value = cell
            .get_or_init(|| async {
                match self.backend.fetch(path).await {
                    Ok(Some(doc)) if !doc.deleted => Some(doc.body),
                    Ok(_) => None,
                    Err(e) => {
                        warn!(path, error = %e, "Document fetch failed, treating as absent");
                        None
                    }
                }
            })
            .await
            .clone();

        if let Some(ref body) = value {
            self.cache.insert(path, body.clone());
        }
        self.cache.clear_inflight(path, &cell);
        value
    }

    /// `get` plus decode. A document that doesn't match the expected shape
    /// is treated as absent, so old schemas read as empty rather than
    /// erroring.
    pub async fn get_as<T: DeserializeOwned>(&self, path: &str) -> Option<T> {
        let value = self.get(path).await?;
        match serde_json::from_value(value) {
            Ok(doc) => Some(doc),
            Err(e) => {
                debug!(path, error = %e, "Document shape mismatch, treating as absent");
                None
            }
        }
    }

    /// Document plus its version token for optimistic concurrency. Bypasses
    /// the TTL cache — a version check against a stale snapshot would be
    /// meaningless. Version 0 means no live document.
    pub async fn get_with_version(&self, path: &str) -> (Option<Value>, u64) {
        match self.backend.fetch(path).await {
            Ok(Some(doc)) if !doc.deleted => {
                self.cache.insert(path, doc.body.clone());
                (Some(doc.body), doc.version)
            }
            Ok(_) => (None, 0),
            Err(e) => {
                warn!(path, error = %e, "Versioned fetch failed, treating as absent");
                (None, 0)
            }
        }
    }

    /// Upsert. When the existing live document and the new one are both
    /// objects, fields are shallow-merged with the new values winning;
    /// anything else replaces. The cache is updated on success.
    pub async fn put(&self, path: &str, body: Value) -> Result<(), StoreError> {
        let existing = self.backend.fetch(path).await?;
        let merged = match existing {
            Some(doc) if !doc.deleted => merge_documents(doc.body, body),
            _ => body,
        };

        self.backend.write(path, &merged).await?;
        self.cache.insert(path, merged);
        Ok(())
    }

    /// Write only if the live version still equals `expected` (0 = create
    /// if absent). No merge — the caller read the document it is replacing.
    /// Returns false on conflict, leaving the stored document unchanged.
    pub async fn put_if_version(
        &self,
        path: &str,
        body: Value,
        expected: u64,
    ) -> Result<bool, StoreError> {
        let written = self.backend.write_if_version(path, &body, expected).await?;
        if written {
            self.cache.insert(path, body);
        }
        Ok(written)
    }

    /// Soft delete: the document is overwritten with a tombstone payload
    /// and flagged, never physically erased. Evicts the cache entry.
    pub async fn delete(&self, path: &str) -> Result<(), StoreError> {
        let tombstone = json!({
            "deleted": true,
            "deleted_at": Utc::now(),
            "original_path": path,
        });
        self.backend.mark_deleted(path, &tombstone).await?;
        self.cache.evict(path);
        Ok(())
    }

    /// Live paths under `prefix`. A row that exists but cannot be read is
    /// still listed — completeness wins over strictness here. Backend
    /// failure degrades to an empty listing.
    pub async fn list(&self, prefix: &str) -> Vec<String> {
        match self.backend.list(prefix).await {
            Ok(rows) => {
                for row in rows.iter().filter(|r| r.body.is_none()) {
                    warn!(path = %row.path, "Unreadable document kept in listing");
                }
                rows.into_iter().map(|r| r.path).collect()
            }
            Err(e) => {
                warn!(prefix, error = %e, "List failed, returning empty");
                Vec::new()
            }
        }
    }
}

/// Shallow merge when both sides are objects (new fields override old);
/// otherwise the new document replaces the old wholesale.
fn merge_documents(existing: Value, new: Value) -> Value {
    match (existing, new) {
        (Value::Object(mut base), Value::Object(update)) => {
            for (key, value) in update {
                base.insert(key, value);
            }
            Value::Object(base)
        }
        (_, new) => new,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_overrides_and_keeps() {
        let merged = merge_documents(json!({"a": 1, "b": 2}), json!({"b": 3, "c": 4}));
        assert_eq!(merged, json!({"a": 1, "b": 3, "c": 4}));
    }

    #[test]
    fn merge_replaces_non_objects() {
        assert_eq!(merge_documents(json!({"a": 1}), json!([1, 2])), json!([1, 2]));
        assert_eq!(merge_documents(json!(5), json!({"a": 1})), json!({"a": 1}));
    }
}
