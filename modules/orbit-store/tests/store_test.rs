use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use orbit_store::{
    DocumentBackend, DocumentStore, ListedDocument, MemoryBackend, StoreError, StoredDocument,
};

/// Wraps a MemoryBackend and counts fetches, optionally delaying them so
/// concurrent misses overlap.
struct CountingBackend {
    inner: MemoryBackend,
    fetches: AtomicUsize,
    fetch_delay: Duration,
}

impl CountingBackend {
    fn new() -> Self {
        Self {
            inner: MemoryBackend::new(),
            fetches: AtomicUsize::new(0),
            fetch_delay: Duration::ZERO,
        }
    }

    fn with_delay(delay: Duration) -> Self {
        Self {
            fetch_delay: delay,
            ..Self::new()
        }
    }

    fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentBackend for CountingBackend {
    async fn fetch(&self, path: &str) -> Result<Option<StoredDocument>, StoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }
        self.inner.fetch(path).await
    }

    async fn write(&self, path: &str, body: &Value) -> Result<u64, StoreError> {
        self.inner.write(path, body).await
    }

    async fn write_if_version(
        &self,
        path: &str,
        body: &Value,
        expected: u64,
    ) -> Result<bool, StoreError> {
        self.inner.write_if_version(path, body, expected).await
    }

    async fn mark_deleted(&self, path: &str, tombstone: &Value) -> Result<(), StoreError> {
        self.inner.mark_deleted(path, tombstone).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ListedDocument>, StoreError> {
        self.inner.list(prefix).await
    }
}

/// A backend whose rows decode as unreadable, for the listing contract.
struct UnreadableRowBackend;

#[async_trait]
impl DocumentBackend for UnreadableRowBackend {
    async fn fetch(&self, _path: &str) -> Result<Option<StoredDocument>, StoreError> {
        Ok(None)
    }

    async fn write(&self, _path: &str, _body: &Value) -> Result<u64, StoreError> {
        Ok(1)
    }

    async fn write_if_version(
        &self,
        _path: &str,
        _body: &Value,
        _expected: u64,
    ) -> Result<bool, StoreError> {
        Ok(true)
    }

    async fn mark_deleted(&self, _path: &str, _tombstone: &Value) -> Result<(), StoreError> {
        Ok(())
    }

    async fn list(&self, _prefix: &str) -> Result<Vec<ListedDocument>, StoreError> {
        Ok(vec![
            ListedDocument {
                path: "classifications/v2/ok".into(),
                body: Some(json!({"labels": []})),
            },
            ListedDocument {
                path: "classifications/v2/corrupt".into(),
                body: None,
            },
        ])
    }
}

fn store() -> DocumentStore {
    DocumentStore::new(Arc::new(MemoryBackend::new()))
}

#[tokio::test]
async fn put_then_get_round_trips() {
    let store = store();
    let doc = json!({"title": "Ada Lovelace", "views": 3});
    store.put("stats/entities", doc.clone()).await.unwrap();
    assert_eq!(store.get("stats/entities").await, Some(doc));
}

#[tokio::test]
async fn get_returns_none_for_absent_path() {
    let store = store();
    assert_eq!(store.get("nope").await, None);
}

#[tokio::test]
async fn put_shallow_merges_objects() {
    let store = store();
    store
        .put("doc", json!({"a": 1, "b": {"nested": true}}))
        .await
        .unwrap();
    store.put("doc", json!({"b": 2, "c": 3})).await.unwrap();

    // Top-level fields merge; the new value wins wholesale per field.
    assert_eq!(store.get("doc").await, Some(json!({"a": 1, "b": 2, "c": 3})));
}

#[tokio::test]
async fn put_replaces_when_either_side_not_object() {
    let store = store();
    store.put("doc", json!({"a": 1})).await.unwrap();
    store.put("doc", json!([1, 2, 3])).await.unwrap();
    assert_eq!(store.get("doc").await, Some(json!([1, 2, 3])));
}

#[tokio::test]
async fn delete_tombstones_without_erasing() {
    let backend = Arc::new(MemoryBackend::new());
    let store = DocumentStore::new(backend.clone());

    store.put("doc", json!({"a": 1})).await.unwrap();
    store.delete("doc").await.unwrap();

    assert_eq!(store.get("doc").await, None);
    assert!(store.list("").await.is_empty());

    // The row is still physically present, flagged and carrying the
    // tombstone payload.
    let raw = backend.fetch("doc").await.unwrap().expect("row kept");
    assert!(raw.deleted);
    assert_eq!(raw.body["original_path"], json!("doc"));
    assert_eq!(raw.body["deleted"], json!(true));
}

#[tokio::test]
async fn deleted_then_recreated_continues_version_counter() {
    let store = store();
    store.put("doc", json!({"a": 1})).await.unwrap();
    let (_, v1) = store.get_with_version("doc").await;
    store.delete("doc").await.unwrap();

    store.put("doc", json!({"a": 2})).await.unwrap();
    let (body, v2) = store.get_with_version("doc").await;
    assert_eq!(body, Some(json!({"a": 2})));
    assert!(v2 > v1, "counter must not restart after a tombstone");
}

#[tokio::test]
async fn stale_version_write_is_rejected_and_bytes_unchanged() {
    let store = store();
    store.put("doc", json!({"n": 1})).await.unwrap();
    let (_, stale) = store.get_with_version("doc").await;

    store.put("doc", json!({"n": 2})).await.unwrap();

    let accepted = store
        .put_if_version("doc", json!({"n": 99}), stale)
        .await
        .unwrap();
    assert!(!accepted);
    assert_eq!(store.get_with_version("doc").await.0, Some(json!({"n": 2})));
}

#[tokio::test]
async fn version_zero_means_create_if_absent() {
    let store = store();
    assert!(store.put_if_version("doc", json!(1), 0).await.unwrap());
    // Second create loses: the document now exists at version 1.
    assert!(!store.put_if_version("doc", json!(2), 0).await.unwrap());
    assert_eq!(store.get("doc").await, Some(json!(1)));
}

#[tokio::test]
async fn current_version_write_succeeds() {
    let store = store();
    store.put("doc", json!({"n": 1})).await.unwrap();
    let (_, version) = store.get_with_version("doc").await;

    assert!(store
        .put_if_version("doc", json!({"n": 2}), version)
        .await
        .unwrap());
    assert_eq!(store.get("doc").await, Some(json!({"n": 2})));
}

#[tokio::test]
async fn cache_serves_repeat_reads_without_backend() {
    let backend = Arc::new(CountingBackend::new());
    let store = DocumentStore::new(backend.clone());

    backend.write("doc", &json!({"a": 1})).await.unwrap();
    assert_eq!(store.get("doc").await, Some(json!({"a": 1})));
    assert_eq!(store.get("doc").await, Some(json!({"a": 1})));
    assert_eq!(backend.fetch_count(), 1);
}

#[tokio::test]
async fn expired_cache_refetches() {
    let backend = Arc::new(CountingBackend::new());
    let store = DocumentStore::with_ttl(backend.clone(), Duration::ZERO);

    backend.write("doc", &json!({"a": 1})).await.unwrap();
    store.get("doc").await;
    store.get("doc").await;
    assert_eq!(backend.fetch_count(), 2);
}

#[tokio::test]
async fn concurrent_misses_share_one_fetch() {
    let backend = Arc::new(CountingBackend::with_delay(Duration::from_millis(50)));
    let store = Arc::new(DocumentStore::new(backend.clone()));

    backend.write("doc", &json!({"a": 1})).await.unwrap();

    let (first, second) = tokio::join!(store.get("doc"), store.get("doc"));
    assert_eq!(first, Some(json!({"a": 1})));
    assert_eq!(second, Some(json!({"a": 1})));
    assert_eq!(backend.fetch_count(), 1, "in-flight registry must dedup");
}

#[tokio::test]
async fn put_updates_cache_immediately() {
    let backend = Arc::new(CountingBackend::new());
    let store = DocumentStore::new(backend.clone());

    store.put("doc", json!({"a": 1})).await.unwrap();
    assert_eq!(store.get("doc").await, Some(json!({"a": 1})));
    // put() fetched once for merge; get() was answered from the cache.
    assert_eq!(backend.fetch_count(), 1);
}

#[tokio::test]
async fn malformed_shape_reads_as_absent() {
    #[derive(serde::Deserialize)]
    struct Shaped {
        #[allow(dead_code)]
        title: String,
    }

    let store = store();
    store.put("doc", json!(42)).await.unwrap();
    assert!(store.get_as::<Shaped>("doc").await.is_none());
}

#[tokio::test]
async fn unreadable_rows_stay_listed() {
    let store = DocumentStore::new(Arc::new(UnreadableRowBackend));
    let paths = store.list("classifications/v2/").await;
    assert_eq!(
        paths,
        vec![
            "classifications/v2/ok".to_string(),
            "classifications/v2/corrupt".to_string(),
        ]
    );
}

#[tokio::test]
async fn list_filters_by_prefix() {
    let store = store();
    store.put("classifications/v2/ada", json!({})).await.unwrap();
    store.put("classifications/v1/ada", json!({})).await.unwrap();
    store.put("stats/entities", json!({})).await.unwrap();

    let paths = store.list("classifications/v2/").await;
    assert_eq!(paths, vec!["classifications/v2/ada".to_string()]);
}
