//! Typed errors for the classification and migration pipeline.
//!
//! Plumbing (config, SQL, CLI) returns `anyhow::Result`. The types here are
//! the per-record failures that the report renders, so they carry the record
//! id and path rather than wrapping lower-level errors.

use serde::Serialize;
use thiserror::Error;

use crate::models::{Category, DocumentType};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaxonomyError {
    #[error("unknown category: '{0}'")]
    UnknownCategory(String),
    #[error("unknown document type: '{0}'")]
    UnknownDocumentType(String),
    #[error("unknown entity type: '{0}'")]
    UnknownEntityType(String),
    #[error("document type '{document_type}' is not allowed in category '{category}'")]
    NotAllowed {
        category: Category,
        document_type: DocumentType,
    },
}

/// Two or more records share one `file_path`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("duplicate file_path '{file_path}' shared by records {ids:?}")]
pub struct DuplicatePathError {
    pub file_path: String,
    pub ids: Vec<i64>,
}

/// A path failed one or more structural or security checks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid path '{file_path}': {}", .violations.join("; "))]
pub struct ValidationError {
    pub file_path: String,
    pub violations: Vec<String>,
}

/// Content hash changed while a file was being moved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("content hash mismatch moving '{from}' to '{to}': expected {expected}, found {actual}")]
pub struct IntegrityError {
    pub from: String,
    pub to: String,
    pub expected: String,
    pub actual: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{file_path}' is not a document ({reason})")]
pub struct NotADocumentError {
    pub file_path: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{file_path}' no longer exists on disk")]
pub struct OrphanedRecordError {
    pub file_path: String,
}

/// Everything that can end a single record's pass without applying it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error(transparent)]
    Duplicate(#[from] DuplicatePathError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
    #[error(transparent)]
    NotADocument(#[from] NotADocumentError),
    #[error(transparent)]
    Orphaned(#[from] OrphanedRecordError),
    #[error("{0}")]
    Execution(String),
}

impl RecordError {
    pub fn kind(&self) -> &'static str {
        match self {
            RecordError::Duplicate(_) => "duplicate_path",
            RecordError::Validation(_) => "validation",
            RecordError::Integrity(_) => "integrity",
            RecordError::NotADocument(_) => "not_a_document",
            RecordError::Orphaned(_) => "orphaned",
            RecordError::Execution(_) => "execution",
        }
    }
}
