use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create the schema on an open pool. Idempotent.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    // file_path uniqueness is enforced on insert and audited by reconcile,
    // not by a constraint, so legacy duplicates can still be loaded.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS document_references (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_path TEXT NOT NULL,
            category TEXT,
            document_type TEXT,
            entity_type TEXT,
            entity_id INTEGER,
            content_hash TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_document_references_file_path ON document_references(file_path)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_document_references_category ON document_references(category, document_type)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
