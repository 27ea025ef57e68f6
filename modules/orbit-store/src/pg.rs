// Postgres durable layer. One row per path; the version counter is bumped
// inside the statement so concurrent writers never mint the same token.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use crate::backend::{DocumentBackend, ListedDocument, StoredDocument};
use crate::error::StoreError;

pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.into()))?;
        Ok(())
    }
}

#[async_trait]
impl DocumentBackend for PgBackend {
    async fn fetch(&self, path: &str) -> Result<Option<StoredDocument>, StoreError> {
        let row = sqlx::query_as::<_, (Value, i64, bool, DateTime<Utc>)>(
            r#"
            SELECT body, version, deleted, updated_at
            FROM documents
            WHERE path = $1
            "#,
        )
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(body, version, deleted, updated_at)| StoredDocument {
            body,
            version: version as u64,
            deleted,
            updated_at,
        }))
    }

    async fn write(&self, path: &str, body: &Value) -> Result<u64, StoreError> {
        let version = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO documents (path, body, version, deleted, updated_at)
            VALUES ($1, $2, 1, FALSE, NOW())
            ON CONFLICT (path) DO UPDATE
                SET body = EXCLUDED.body,
                    version = documents.version + 1,
                    deleted = FALSE,
                    updated_at = NOW()
            RETURNING version
            "#,
        )
        .bind(path)
        .bind(body)
        .fetch_one(&self.pool)
        .await?;

        Ok(version as u64)
    }

    async fn write_if_version(
        &self,
        path: &str,
        body: &Value,
        expected: u64,
    ) -> Result<bool, StoreError> {
        let result = if expected == 0 {
            // Create-if-absent: an existing tombstone also counts as absent,
            // but its counter keeps going.
            sqlx::query(
                r#"
                INSERT INTO documents (path, body, version, deleted, updated_at)
                VALUES ($1, $2, 1, FALSE, NOW())
                ON CONFLICT (path) DO UPDATE
                    SET body = EXCLUDED.body,
                        version = documents.version + 1,
                        deleted = FALSE,
                        updated_at = NOW()
                    WHERE documents.deleted
                "#,
            )
            .bind(path)
            .bind(body)
            .execute(&self.pool)
            .await?
        } else {
            sqlx::query(
                r#"
                UPDATE documents
                SET body = $2, version = version + 1, deleted = FALSE, updated_at = NOW()
                WHERE path = $1 AND version = $3 AND NOT deleted
                "#,
            )
            .bind(path)
            .bind(body)
            .bind(expected as i64)
            .execute(&self.pool)
            .await?
        };

        Ok(result.rows_affected() == 1)
    }

    async fn mark_deleted(&self, path: &str, tombstone: &Value) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE documents
            SET body = $2, version = version + 1, deleted = TRUE, updated_at = NOW()
            WHERE path = $1
            "#,
        )
        .bind(path)
        .bind(tombstone)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ListedDocument>, StoreError> {
        let rows = sqlx::query_as::<_, (String, Option<Value>)>(
            r#"
            SELECT path, body
            FROM documents
            WHERE path LIKE $1 || '%' AND NOT deleted
            ORDER BY path
            "#,
        )
        .bind(prefix)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(path, body)| ListedDocument { path, body })
            .collect())
    }
}
