//! In-memory [`DocumentStore`] implementation for tests and library callers.

use std::collections::BTreeMap;
use std::sync::RwLock;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::Utc;

use crate::error::DuplicatePathError;
use crate::models::{DocumentReference, NewDocumentReference, RecordUpdate};

use super::DocumentStore;

struct State {
    records: BTreeMap<i64, DocumentReference>,
    next_id: i64,
}

pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    /// Seed with existing rows as-is, duplicates included.
    pub fn with_records(records: Vec<DocumentReference>) -> Self {
        let next_id = records.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        Self {
            state: RwLock::new(State {
                records: records.into_iter().map(|r| (r.id, r)).collect(),
                next_id,
            }),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn list_records(&self) -> Result<Vec<DocumentReference>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.records.values().cloned().collect())
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<DocumentReference>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.records.get(&id).cloned())
    }

    async fn find_by_path(&self, file_path: &str) -> Result<Vec<DocumentReference>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state
            .records
            .values()
            .filter(|r| r.file_path == file_path)
            .cloned()
            .collect())
    }

    async fn insert(&self, record: &NewDocumentReference) -> Result<i64> {
        let mut state = self.state.write().map_err(poisoned)?;
        let ids: Vec<i64> = state
            .records
            .values()
            .filter(|r| r.file_path == record.file_path)
            .map(|r| r.id)
            .collect();
        if !ids.is_empty() {
            return Err(DuplicatePathError {
                file_path: record.file_path.clone(),
                ids,
            }
            .into());
        }

        let id = state.next_id;
        state.next_id += 1;
        let now = Utc::now();
        state.records.insert(
            id,
            DocumentReference {
                id,
                file_path: record.file_path.clone(),
                category: Some(record.classification.category()),
                document_type: Some(record.classification.document_type()),
                entity_type: record.entity_type,
                entity_id: record.entity_id,
                content_hash: record.content_hash.clone(),
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn update(&self, id: i64, update: &RecordUpdate) -> Result<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        let Some(record) = state.records.get_mut(&id) else {
            bail!("document reference not found: {}", id);
        };
        record.file_path = update.file_path.clone();
        if let Some(c) = update.classification {
            record.category = Some(c.category());
            record.document_type = Some(c.document_type());
        }
        if update.content_hash.is_some() {
            record.content_hash = update.content_hash.clone();
        }
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        if state.records.remove(&id).is_none() {
            bail!("document reference not found: {}", id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Classification, DocumentType};

    fn new_ref(path: &str) -> NewDocumentReference {
        NewDocumentReference {
            file_path: path.to_string(),
            classification: Classification::new(Category::Guides, DocumentType::Tutorial).unwrap(),
            entity_type: None,
            entity_id: None,
            content_hash: None,
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_increasing_ids() {
        let store = InMemoryStore::new();
        let a = store.insert(&new_ref("docs/guides/tutorial/a.md")).await.unwrap();
        let b = store.insert(&new_ref("docs/guides/tutorial/b.md")).await.unwrap();
        assert!(b > a);
        assert_eq!(store.list_records().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_path() {
        let store = InMemoryStore::new();
        store.insert(&new_ref("docs/guides/tutorial/a.md")).await.unwrap();
        let err = store
            .insert(&new_ref("docs/guides/tutorial/a.md"))
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<DuplicatePathError>().is_some());
    }

    #[tokio::test]
    async fn test_update_refreshes_timestamp() {
        let store = InMemoryStore::new();
        let id = store.insert(&new_ref("docs/guides/tutorial/a.md")).await.unwrap();
        let before = store.get_by_id(id).await.unwrap().unwrap();
        store
            .update(
                id,
                &RecordUpdate {
                    file_path: "docs/guides/user_guide/a.md".to_string(),
                    classification: Some(
                        Classification::new(Category::Guides, DocumentType::UserGuide).unwrap(),
                    ),
                    content_hash: Some("abc".to_string()),
                },
            )
            .await
            .unwrap();
        let after = store.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(after.file_path, "docs/guides/user_guide/a.md");
        assert_eq!(after.document_type, Some(DocumentType::UserGuide));
        assert_eq!(after.content_hash.as_deref(), Some("abc"));
        assert!(after.updated_at >= before.updated_at);
        assert_eq!(after.created_at, before.created_at);
    }

    #[tokio::test]
    async fn test_missing_ids_error() {
        let store = InMemoryStore::new();
        assert!(store.delete(7).await.is_err());
        assert!(store.get_by_id(7).await.unwrap().is_none());
    }
}
