//! Storage abstraction for document references.
//!
//! The [`DocumentStore`] trait is everything the reconciliation pipeline
//! needs from persistence. [`SqliteStore`](crate::sqlite_store::SqliteStore)
//! backs the CLI; [`memory::InMemoryStore`] backs tests and library callers
//! that keep records elsewhere.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{DocumentReference, NewDocumentReference, RecordUpdate};

/// Abstract storage backend for `document_references`.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`list_records`](DocumentStore::list_records) | All records, ordered by id |
/// | [`get_by_id`](DocumentStore::get_by_id) | One record |
/// | [`find_by_path`](DocumentStore::find_by_path) | Records sharing a path (normally zero or one) |
/// | [`insert`](DocumentStore::insert) | Register a new document; rejects an existing path |
/// | [`update`](DocumentStore::update) | Single-row transactional update |
/// | [`delete`](DocumentStore::delete) | Remove the row only |
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list_records(&self) -> Result<Vec<DocumentReference>>;

    async fn get_by_id(&self, id: i64) -> Result<Option<DocumentReference>>;

    async fn find_by_path(&self, file_path: &str) -> Result<Vec<DocumentReference>>;

    /// Returns the new record's id. Fails with
    /// [`DuplicatePathError`](crate::error::DuplicatePathError) when the path
    /// is already tracked.
    async fn insert(&self, record: &NewDocumentReference) -> Result<i64>;

    /// Applies `update` and refreshes `updated_at` in one transaction. Nothing
    /// is written unless exactly one row matched.
    async fn update(&self, id: i64, update: &RecordUpdate) -> Result<()>;

    async fn delete(&self, id: i64) -> Result<()>;
}
