use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{postgres::PgRow, PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use super::{Document, DocumentStore, Filter, StoreError, StoreResult};

/// Documents stored as JSONB rows in a single `documents` table
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_document(row: PgRow) -> Document {
    Document {
        id: row.get("id"),
        data: row.get("data"),
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
        updated_at: row.get::<DateTime<Utc>, _>("updated_at"),
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn insert(&self, collection: &str, data: Value) -> StoreResult<Document> {
        if !data.is_object() {
            return Err(StoreError::NotAnObject);
        }
        let id = Uuid::new_v4().to_string();

        let row = sqlx::query(
            "INSERT INTO documents (collection, id, data, created_at, updated_at)
             VALUES ($1, $2, $3, NOW(), NOW())
             RETURNING id, data, created_at, updated_at",
        )
        .bind(collection)
        .bind(&id)
        .bind(&data)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(collection, %id, "document inserted");
        Ok(row_to_document(row))
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let row = sqlx::query(
            "SELECT id, data, created_at, updated_at FROM documents
             WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(row_to_document))
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> StoreResult<Document> {
        if !data.is_object() {
            return Err(StoreError::NotAnObject);
        }

        // created_at survives the replace; only the body and updated_at change
        let row = sqlx::query(
            "INSERT INTO documents (collection, id, data, created_at, updated_at)
             VALUES ($1, $2, $3, NOW(), NOW())
             ON CONFLICT (collection, id)
             DO UPDATE SET data = EXCLUDED.data, updated_at = NOW()
             RETURNING id, data, created_at, updated_at",
        )
        .bind(collection)
        .bind(id)
        .bind(&data)
        .fetch_one(&self.pool)
        .await?;

        Ok(row_to_document(row))
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Value,
    ) -> StoreResult<Option<Document>> {
        if !patch.is_object() {
            return Err(StoreError::NotAnObject);
        }

        // jsonb || is a shallow merge, matching Firestore's update()
        let row = sqlx::query(
            "UPDATE documents
             SET data = data || $3, updated_at = NOW()
             WHERE collection = $1 AND id = $2
             RETURNING id, data, created_at, updated_at",
        )
        .bind(collection)
        .bind(id)
        .bind(&patch)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(row_to_document))
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn query(&self, collection: &str, filters: &[Filter]) -> StoreResult<Vec<Document>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT id, data, created_at, updated_at FROM documents WHERE collection = ",
        );
        builder.push_bind(collection.to_string());

        for filter in filters {
            builder.push(" AND data -> ");
            builder.push_bind(filter.field.clone());
            builder.push(" = ");
            builder.push_bind(filter.value.clone());
        }

        builder.push(" ORDER BY created_at, id");

        let rows = builder.build().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(row_to_document).collect())
    }
}
