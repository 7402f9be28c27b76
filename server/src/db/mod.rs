//! Document storage.
//!
//! Records live in named collections as JSON documents keyed by string ids.
//! `id`, `createdAt` and `updatedAt` are owned by the store and stripped from
//! the stored body; [`Database`] puts them back when hydrating a record.

mod memory;
pub mod migrations;
mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

pub use memory::MemoryDocumentStore;
pub use postgres::PgDocumentStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("document body must be a JSON object")]
    NotAnObject,
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Equality match on a top-level document field.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, data: &Value) -> bool {
        data.get(&self.field) == Some(&self.value)
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new document under a freshly generated id
    async fn insert(&self, collection: &str, data: Value) -> StoreResult<Document>;

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>>;

    /// Create or fully replace the document at `id`
    async fn set(&self, collection: &str, id: &str, data: Value) -> StoreResult<Document>;

    /// Shallow-merge `patch` into an existing document; `None` if it does not exist
    async fn update(&self, collection: &str, id: &str, patch: Value)
        -> StoreResult<Option<Document>>;

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool>;

    /// Documents matching every filter, oldest first
    async fn query(&self, collection: &str, filters: &[Filter]) -> StoreResult<Vec<Document>>;
}

/// A typed record stored in one collection.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: &'static str;
}

const META_FIELDS: [&str; 3] = ["id", "createdAt", "updatedAt"];

fn strip_meta(value: Value) -> StoreResult<Value> {
    match value {
        Value::Object(mut map) => {
            for key in META_FIELDS {
                map.remove(key);
            }
            Ok(Value::Object(map))
        }
        _ => Err(StoreError::NotAnObject),
    }
}

fn hydrate<T: DeserializeOwned>(doc: Document) -> StoreResult<T> {
    let mut map = match doc.data {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    map.insert("id".to_string(), Value::String(doc.id));
    map.insert("createdAt".to_string(), serde_json::to_value(doc.created_at)?);
    map.insert("updatedAt".to_string(), serde_json::to_value(doc.updated_at)?);
    Ok(serde_json::from_value(Value::Object(map))?)
}

/// Typed access to the document store.
#[derive(Clone)]
pub struct Database {
    store: Arc<dyn DocumentStore>,
}

impl Database {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryDocumentStore::new()))
    }

    pub async fn create<T: Record>(&self, record: &T) -> StoreResult<T> {
        let data = strip_meta(serde_json::to_value(record)?)?;
        let doc = self.store.insert(T::COLLECTION, data).await?;
        hydrate(doc)
    }

    /// Write a record under a caller-chosen id, replacing what was there
    pub async fn put<T: Record>(&self, id: &str, record: &T) -> StoreResult<T> {
        let data = strip_meta(serde_json::to_value(record)?)?;
        let doc = self.store.set(T::COLLECTION, id, data).await?;
        hydrate(doc)
    }

    pub async fn find<T: Record>(&self, id: &str) -> StoreResult<Option<T>> {
        match self.store.get(T::COLLECTION, id).await? {
            Some(doc) => Ok(Some(hydrate(doc)?)),
            None => Ok(None),
        }
    }

    pub async fn find_by<T: Record>(&self, filters: &[Filter]) -> StoreResult<Vec<T>> {
        self.store
            .query(T::COLLECTION, filters)
            .await?
            .into_iter()
            .map(hydrate::<T>)
            .collect()
    }

    pub async fn count<T: Record>(&self, filters: &[Filter]) -> StoreResult<usize> {
        Ok(self.store.query(T::COLLECTION, filters).await?.len())
    }

    /// Merge the serialized `patch` into the record at `id`
    pub async fn update<T: Record, P: Serialize + Sync>(
        &self,
        id: &str,
        patch: &P,
    ) -> StoreResult<Option<T>> {
        let patch = strip_meta(serde_json::to_value(patch)?)?;
        match self.store.update(T::COLLECTION, id, patch).await? {
            Some(doc) => Ok(Some(hydrate(doc)?)),
            None => Ok(None),
        }
    }

    pub async fn delete<T: Record>(&self, id: &str) -> StoreResult<bool> {
        self.store.delete(T::COLLECTION, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Note {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        owner_id: String,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        created_at: Option<DateTime<Utc>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        updated_at: Option<DateTime<Utc>>,
    }

    impl Record for Note {
        const COLLECTION: &'static str = "notes";
    }

    fn note(owner: &str, text: &str) -> Note {
        Note {
            id: None,
            owner_id: owner.into(),
            text: text.into(),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn strip_meta_removes_store_owned_fields() {
        let stripped = strip_meta(json!({"id": "x", "createdAt": 1, "text": "hi"})).unwrap();
        assert_eq!(stripped, json!({"text": "hi"}));
        assert!(matches!(strip_meta(json!([1, 2])), Err(StoreError::NotAnObject)));
    }

    #[test]
    fn filter_matches_top_level_field() {
        let filter = Filter::eq("ownerId", "a");
        assert!(filter.matches(&json!({"ownerId": "a"})));
        assert!(!filter.matches(&json!({"ownerId": "b"})));
        assert!(!filter.matches(&json!({})));
    }

    #[tokio::test]
    async fn create_assigns_id_and_timestamps() {
        let db = Database::in_memory();
        let created = db.create(&note("a", "first")).await.unwrap();
        assert!(created.id.is_some());
        assert!(created.created_at.is_some());

        let found: Note = db.find(created.id.as_deref().unwrap()).await.unwrap().unwrap();
        assert_eq!(found, created);
    }

    #[tokio::test]
    async fn update_merges_and_preserves_other_fields() {
        let db = Database::in_memory();
        let created = db.create(&note("a", "first")).await.unwrap();
        let id = created.id.unwrap();

        let updated: Note = db
            .update(&id, &json!({"text": "second"}))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.text, "second");
        assert_eq!(updated.owner_id, "a");

        let missing: Option<Note> = db.update("nope", &json!({"text": "x"})).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn find_by_filters_and_delete() {
        let db = Database::in_memory();
        db.create(&note("a", "1")).await.unwrap();
        let b = db.create(&note("b", "2")).await.unwrap();
        db.create(&note("a", "3")).await.unwrap();

        let owned: Vec<Note> = db.find_by(&[Filter::eq("ownerId", "a")]).await.unwrap();
        assert_eq!(owned.len(), 2);
        assert_eq!(owned[0].text, "1");
        assert_eq!(db.count::<Note>(&[]).await.unwrap(), 3);

        assert!(db.delete::<Note>(b.id.as_deref().unwrap()).await.unwrap());
        assert!(!db.delete::<Note>("missing").await.unwrap());
        assert_eq!(db.count::<Note>(&[]).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn put_replaces_at_chosen_id() {
        let db = Database::in_memory();
        db.put("fixed", &note("a", "one")).await.unwrap();
        let replaced = db.put("fixed", &note("a", "two")).await.unwrap();
        assert_eq!(replaced.id.as_deref(), Some("fixed"));
        assert_eq!(db.count::<Note>(&[]).await.unwrap(), 1);
    }
}
