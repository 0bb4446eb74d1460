//! SQLite-backed [`DocumentStore`] implementation.
//!
//! Maps each [`DocumentStore`] operation onto the `document_references`
//! table created by [`migrate::apply_schema`](crate::migrate::apply_schema).

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::warn;

use crate::config::Config;
use crate::db;
use crate::error::DuplicatePathError;
use crate::migrate::apply_schema;
use crate::models::{
    Category, DocumentReference, DocumentType, EntityType, NewDocumentReference, RecordUpdate,
};
use crate::store::DocumentStore;

const SELECT_COLUMNS: &str = "SELECT id, file_path, category, document_type, entity_type, \
     entity_id, content_hash, created_at, updated_at FROM document_references";

/// SQLite implementation of the [`DocumentStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the configured database, creating the schema if needed.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        apply_schema(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn ts_to_datetime(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_default()
}

/// Unknown names load as `None` so one bad row cannot stop a pass.
fn parse_column<T: std::str::FromStr>(id: i64, column: &str, value: Option<String>) -> Option<T> {
    let value = value.filter(|v| !v.is_empty())?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(id, column, value = %value, "unrecognised stored value; treating as unset");
            None
        }
    }
}

fn row_to_record(row: &SqliteRow) -> DocumentReference {
    let id: i64 = row.get("id");
    DocumentReference {
        id,
        file_path: row.get("file_path"),
        category: parse_column::<Category>(id, "category", row.get("category")),
        document_type: parse_column::<DocumentType>(id, "document_type", row.get("document_type")),
        entity_type: parse_column::<EntityType>(id, "entity_type", row.get("entity_type")),
        entity_id: row.get("entity_id"),
        content_hash: row.get("content_hash"),
        created_at: ts_to_datetime(row.get("created_at")),
        updated_at: ts_to_datetime(row.get("updated_at")),
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn list_records(&self) -> Result<Vec<DocumentReference>> {
        let rows = sqlx::query(&format!("{} ORDER BY id ASC", SELECT_COLUMNS))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<DocumentReference>> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_record))
    }

    async fn find_by_path(&self, file_path: &str) -> Result<Vec<DocumentReference>> {
        let rows = sqlx::query(&format!("{} WHERE file_path = ? ORDER BY id ASC", SELECT_COLUMNS))
            .bind(file_path)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn insert(&self, record: &NewDocumentReference) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let existing: Vec<i64> =
            sqlx::query_scalar("SELECT id FROM document_references WHERE file_path = ? ORDER BY id")
                .bind(&record.file_path)
                .fetch_all(&mut *tx)
                .await?;
        if !existing.is_empty() {
            return Err(DuplicatePathError {
                file_path: record.file_path.clone(),
                ids: existing,
            }
            .into());
        }

        let now = Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO document_references
                (file_path, category, document_type, entity_type, entity_id, content_hash, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.file_path)
        .bind(record.classification.category().as_str())
        .bind(record.classification.document_type().as_str())
        .bind(record.entity_type.map(|e| e.as_str()))
        .bind(record.entity_id)
        .bind(&record.content_hash)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.last_insert_rowid())
    }

    async fn update(&self, id: i64, update: &RecordUpdate) -> Result<()> {
        // Dropping `tx` without commit rolls back.
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE document_references SET
                file_path = ?,
                category = COALESCE(?, category),
                document_type = COALESCE(?, document_type),
                content_hash = COALESCE(?, content_hash),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&update.file_path)
        .bind(update.classification.map(|c| c.category().as_str()))
        .bind(update.classification.map(|c| c.document_type().as_str()))
        .bind(&update.content_hash)
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() != 1 {
            bail!(
                "update of document reference {} touched {} rows",
                id,
                result.rows_affected()
            );
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM document_references WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            bail!("document reference not found: {}", id);
        }
        Ok(())
    }
}

/// Insert a row verbatim, bypassing the duplicate check. Used to load
/// legacy data and by tests that need inconsistent state.
pub async fn insert_raw(
    pool: &SqlitePool,
    file_path: &str,
    category: Option<&str>,
    document_type: Option<&str>,
) -> Result<i64> {
    let now = Utc::now().timestamp();
    let result = sqlx::query(
        "INSERT INTO document_references (file_path, category, document_type, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(file_path)
    .bind(category)
    .bind(document_type)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}
