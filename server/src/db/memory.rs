use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Document, DocumentStore, Filter, StoreError, StoreResult};

struct Entry {
    seq: u64,
    doc: Document,
}

#[derive(Default)]
struct Collections {
    next_seq: u64,
    docs: HashMap<(String, String), Entry>,
}

/// Process-local store for tests and `DATA_STORE=memory` runs.
#[derive(Default)]
pub struct MemoryDocumentStore {
    inner: RwLock<Collections>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn key(collection: &str, id: &str) -> (String, String) {
    (collection.to_string(), id.to_string())
}

fn ensure_object(data: &Value) -> StoreResult<()> {
    if data.is_object() {
        Ok(())
    } else {
        Err(StoreError::NotAnObject)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn insert(&self, collection: &str, data: Value) -> StoreResult<Document> {
        let id = Uuid::new_v4().to_string();
        self.set(collection, &id, data).await
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let inner = self.inner.read().await;
        Ok(inner.docs.get(&key(collection, id)).map(|e| e.doc.clone()))
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> StoreResult<Document> {
        ensure_object(&data)?;
        let now = Utc::now();
        let mut inner = self.inner.write().await;
        let k = key(collection, id);

        if let Some(entry) = inner.docs.get_mut(&k) {
            entry.doc.data = data;
            entry.doc.updated_at = now;
            return Ok(entry.doc.clone());
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        let doc = Document {
            id: id.to_string(),
            data,
            created_at: now,
            updated_at: now,
        };
        inner.docs.insert(k, Entry { seq, doc: doc.clone() });
        Ok(doc)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Value,
    ) -> StoreResult<Option<Document>> {
        let Value::Object(patch) = patch else {
            return Err(StoreError::NotAnObject);
        };
        let mut inner = self.inner.write().await;
        let Some(entry) = inner.docs.get_mut(&key(collection, id)) else {
            return Ok(None);
        };
        if let Value::Object(map) = &mut entry.doc.data {
            for (field, value) in patch {
                map.insert(field, value);
            }
        }
        entry.doc.updated_at = Utc::now();
        Ok(Some(entry.doc.clone()))
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner.docs.remove(&key(collection, id)).is_some())
    }

    async fn query(&self, collection: &str, filters: &[Filter]) -> StoreResult<Vec<Document>> {
        let inner = self.inner.read().await;
        let mut hits: Vec<&Entry> = inner
            .docs
            .iter()
            .filter(|((c, _), _)| c == collection)
            .map(|(_, entry)| entry)
            .filter(|entry| filters.iter().all(|f| f.matches(&entry.doc.data)))
            .collect();
        hits.sort_by_key(|entry| entry.seq);
        Ok(hits.into_iter().map(|entry| entry.doc.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn set_keeps_creation_time_on_replace() {
        let store = MemoryDocumentStore::new();
        let first = store.set("c", "x", json!({"v": 1})).await.unwrap();
        let second = store.set("c", "x", json!({"v": 2})).await.unwrap();
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(second.data, json!({"v": 2}));
    }

    #[tokio::test]
    async fn collections_are_isolated() {
        let store = MemoryDocumentStore::new();
        store.set("a", "same", json!({"v": 1})).await.unwrap();
        store.set("b", "same", json!({"v": 2})).await.unwrap();
        assert_eq!(store.query("a", &[]).await.unwrap().len(), 1);
        assert!(store.delete("a", "same").await.unwrap());
        assert!(store.get("b", "same").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn query_preserves_insertion_order() {
        let store = MemoryDocumentStore::new();
        for n in 0..5 {
            store.insert("c", json!({"n": n})).await.unwrap();
        }
        let ns: Vec<i64> = store
            .query("c", &[])
            .await
            .unwrap()
            .iter()
            .map(|d| d.data["n"].as_i64().unwrap())
            .collect();
        assert_eq!(ns, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn rejects_non_object_bodies() {
        let store = MemoryDocumentStore::new();
        assert!(store.insert("c", json!("text")).await.is_err());
        assert!(store.update("c", "x", json!(3)).await.is_err());
    }
}
