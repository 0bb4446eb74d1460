//! `doctax add`: register a single document.

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::classify::{PathClassifier, Verdict};
use crate::config::Config;
use crate::error::NotADocumentError;
use crate::hashing::sha256_file;
use crate::models::{Category, Classification, DocumentType, EntityType, NewDocumentReference};
use crate::reconcile::target_path;
use crate::sqlite_store::SqliteStore;
use crate::store::DocumentStore;
use crate::taxonomy::TaxonomyRules;
use crate::validate::PathValidator;

#[derive(Debug, Clone, Default)]
pub struct AddRequest {
    pub file_path: String,
    pub category: Option<Category>,
    pub document_type: Option<DocumentType>,
    pub entity_type: Option<EntityType>,
    pub entity_id: Option<i64>,
}

/// Validate, classify, hash and insert. Nothing is written unless every
/// check passes.
pub async fn add_document(
    config: &Config,
    store: &dyn DocumentStore,
    request: &AddRequest,
) -> Result<i64> {
    let path = request.file_path.as_str();
    let validator = PathValidator::new(&config.project.root, &config.classify);
    validator.ensure_valid(path)?;

    let rules = TaxonomyRules::with_config(&config.rules)?;
    let classifier = PathClassifier::new(&rules, &config.classify);
    if let Some((_, reason)) = classifier.non_document(path) {
        return Err(NotADocumentError {
            file_path: path.to_string(),
            reason,
        }
        .into());
    }

    let classification = match (request.category, request.document_type) {
        (Some(category), Some(document_type)) => Classification::new(category, document_type)?,
        (category, document_type) => {
            match classifier.classify(path, category, document_type) {
                Verdict::Classified(result) => match result.classification() {
                    Some(c) => c,
                    None => bail!("cannot classify '{}'", path),
                },
                _ => bail!(
                    "cannot classify '{}'; pass --category and --type",
                    path
                ),
            }
        }
    };

    if path.starts_with("docs/") {
        let expected = target_path(path, classification);
        if expected != path {
            bail!(
                "'{}' is classified as {} which belongs at '{}'; move the file or pass --category and --type",
                path,
                classification,
                expected
            );
        }
    }

    if request.entity_id.is_some() && request.entity_type.is_none() {
        bail!("--entity-id requires --entity-type");
    }

    let abs = config.project.root.join(path);
    if !abs.is_file() {
        bail!("file does not exist: {}", abs.display());
    }
    let content_hash =
        sha256_file(&abs).with_context(|| format!("Failed to hash {}", abs.display()))?;

    let id = store
        .insert(&NewDocumentReference {
            file_path: path.to_string(),
            classification,
            entity_type: request.entity_type,
            entity_id: request.entity_id,
            content_hash: Some(content_hash),
        })
        .await?;
    info!(id, file_path = path, %classification, "document added");
    Ok(id)
}

pub async fn run_add(config: &Config, request: &AddRequest) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let result = add_document(config, &store, request).await;
    store.close().await;
    let id = result?;
    println!("added #{} {}", id, request.file_path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DuplicatePathError, ValidationError};
    use crate::store::memory::InMemoryStore;
    use std::fs;
    use tempfile::TempDir;

    fn project(files: &[&str]) -> (TempDir, Config) {
        let tmp = TempDir::new().unwrap();
        for rel in files {
            let path = tmp.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "body").unwrap();
        }
        let config = Config::for_root(tmp.path());
        (tmp, config)
    }

    fn request(path: &str) -> AddRequest {
        AddRequest {
            file_path: path.to_string(),
            ..AddRequest::default()
        }
    }

    #[tokio::test]
    async fn test_add_infers_classification_and_hashes() {
        let (_tmp, config) = project(&["docs/guides/tutorial/start.md"]);
        let store = InMemoryStore::new();
        let id = add_document(&config, &store, &request("docs/guides/tutorial/start.md"))
            .await
            .unwrap();
        let rec = store.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(rec.category, Some(Category::Guides));
        assert_eq!(rec.document_type, Some(DocumentType::Tutorial));
        assert!(rec.content_hash.is_some());
    }

    #[tokio::test]
    async fn test_add_rejects_traversal_without_writing() {
        let (_tmp, config) = project(&[]);
        let store = InMemoryStore::new();
        let err = add_document(&config, &store, &request("../../etc/passwd"))
            .await
            .unwrap_err();
        let validation = err.downcast_ref::<ValidationError>().unwrap();
        assert!(validation
            .violations
            .contains(&"path contains directory traversal".to_string()));
        assert!(store.list_records().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_refuses_non_documents_and_duplicates() {
        let (_tmp, config) = project(&["bad.md", "docs/guides/tutorial/a.md"]);
        let store = InMemoryStore::new();

        let err = add_document(&config, &store, &request("bad.md")).await.unwrap_err();
        assert!(err.downcast_ref::<NotADocumentError>().is_some());

        add_document(&config, &store, &request("docs/guides/tutorial/a.md"))
            .await
            .unwrap();
        let err = add_document(&config, &store, &request("docs/guides/tutorial/a.md"))
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<DuplicatePathError>().is_some());
    }

    #[tokio::test]
    async fn test_add_requires_file_on_disk() {
        let (_tmp, config) = project(&[]);
        let store = InMemoryStore::new();
        let err = add_document(&config, &store, &request("docs/guides/tutorial/missing.md"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[tokio::test]
    async fn test_add_refuses_classification_contradicting_location() {
        let path = "docs/architecture/specification/WI-5-COMPLETION.md";
        let (_tmp, config) = project(&[path]);
        let store = InMemoryStore::new();
        let err = add_document(&config, &store, &request(path)).await.unwrap_err();
        assert!(err
            .to_string()
            .contains("docs/communication/status_report/WI-5-COMPLETION.md"));
        assert!(store.list_records().await.unwrap().is_empty());

        // An explicit classification matching the location is accepted.
        let req = AddRequest {
            category: Some(Category::Architecture),
            document_type: Some(DocumentType::Specification),
            ..request(path)
        };
        add_document(&config, &store, &req).await.unwrap();
    }

    #[tokio::test]
    async fn test_add_rejects_disallowed_pair() {
        let (_tmp, config) = project(&["docs/testing/test_plan/p.md"]);
        let store = InMemoryStore::new();
        let req = AddRequest {
            category: Some(Category::Testing),
            document_type: Some(DocumentType::Runbook),
            ..request("docs/testing/test_plan/p.md")
        };
        assert!(add_document(&config, &store, &req).await.is_err());
    }
}
