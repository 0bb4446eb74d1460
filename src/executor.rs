//! Applies planned operations, one record at a time.
//!
//! A reclassification that moves a file runs to completion or rolls back:
//!
//! 1. hash the source
//! 2. copy it to the backup directory
//! 3. move it to the target (parents created as needed)
//! 4. hash the target; on mismatch restore from backup and fail
//! 5. update the row in a single transaction; on error restore and fail
//! 6. only then discard the backup
//!
//! Creates whose classification points elsewhere take the same move path
//! before the row is inserted. Deletes remove the row only, unless physical
//! deletion was requested; then the file is backed up and removed first and
//! restored if the row delete fails.
//! The executor never prompts; confirmation happens at the call site.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{
    DuplicatePathError, IntegrityError, OrphanedRecordError, RecordError,
};
use crate::hashing::sha256_file;
use crate::models::{Category, Classification, DocumentType, NewDocumentReference, RecordUpdate};
use crate::reconcile::Operation;
use crate::store::DocumentStore;
use crate::validate::PathValidator;

/// Moves a file from one absolute path to another.
pub trait Transfer: Send + Sync {
    fn transfer(&self, from: &Path, to: &Path) -> std::io::Result<()>;
}

/// Rename, falling back to copy + remove across filesystems.
pub struct RenameTransfer;

impl Transfer for RenameTransfer {
    fn transfer(&self, from: &Path, to: &Path) -> std::io::Result<()> {
        match fs::rename(from, to) {
            Ok(()) => Ok(()),
            Err(e) => {
                debug!(error = %e, "rename failed, copying instead");
                fs::copy(from, to)?;
                fs::remove_file(from)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub success: bool,
    pub error: Option<RecordError>,
    /// Id of the record created or touched.
    pub record_id: Option<i64>,
}

impl ExecutionResult {
    fn ok(record_id: Option<i64>) -> Self {
        Self {
            success: true,
            error: None,
            record_id,
        }
    }

    fn failed(record_id: Option<i64>, error: RecordError) -> Self {
        Self {
            success: false,
            error: Some(error),
            record_id,
        }
    }
}

pub struct MigrationExecutor<'a> {
    store: &'a dyn DocumentStore,
    validator: &'a PathValidator,
    root: PathBuf,
    backup_dir: PathBuf,
    transfer: Box<dyn Transfer>,
    delete_files: bool,
}

fn execution(context: &str, err: impl std::fmt::Display) -> RecordError {
    RecordError::Execution(format!("{}: {}", context, err))
}

/// A verified move whose database write has not committed yet.
struct Relocated {
    src: PathBuf,
    dst: PathBuf,
    backup: PathBuf,
    content_hash: String,
}

fn store_error(context: &str, err: anyhow::Error) -> RecordError {
    match err.downcast::<DuplicatePathError>() {
        Ok(dup) => RecordError::Duplicate(dup),
        Err(other) => RecordError::Execution(format!("{}: {:#}", context, other)),
    }
}

/// `{stem}-{timestamp}{suffix}` for a file being backed up.
pub fn backup_file_name(path: &Path, timestamp: &str) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "document".to_string());
    let suffix = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    format!("{}-{}{}", stem, timestamp, suffix)
}

impl<'a> MigrationExecutor<'a> {
    pub fn new(store: &'a dyn DocumentStore, validator: &'a PathValidator, config: &Config) -> Self {
        Self {
            store,
            validator,
            root: config.project.root.clone(),
            backup_dir: config.backup_dir(),
            transfer: Box::new(RenameTransfer),
            delete_files: false,
        }
    }

    pub fn with_transfer(mut self, transfer: Box<dyn Transfer>) -> Self {
        self.transfer = transfer;
        self
    }

    /// Also remove the file from disk when a delete is applied.
    pub fn with_delete_files(mut self, delete_files: bool) -> Self {
        self.delete_files = delete_files;
        self
    }

    pub async fn execute(&self, operation: &Operation) -> ExecutionResult {
        let record_id = operation.record_id();
        let outcome = match operation {
            Operation::Reclassify {
                id,
                file_path,
                category,
                document_type,
                new_path,
                ..
            } => self
                .reclassify(*id, file_path, *category, *document_type, new_path)
                .await
                .map(|_| Some(*id)),
            Operation::Create {
                file_path,
                new_path,
                category,
                document_type,
                ..
            } => self
                .create(file_path, new_path, *category, *document_type)
                .await
                .map(Some),
            Operation::Delete { id, file_path, .. } => {
                self.delete(*id, file_path).await.map(|_| Some(*id))
            }
            Operation::RefreshHash {
                id,
                file_path,
                content_hash,
            } => self
                .store
                .update(
                    *id,
                    &RecordUpdate {
                        file_path: file_path.clone(),
                        classification: None,
                        content_hash: Some(content_hash.clone()),
                    },
                )
                .await
                .map(|_| Some(*id))
                .map_err(|e| store_error("database update failed", e)),
        };

        match outcome {
            Ok(id) => ExecutionResult::ok(id),
            Err(err) => {
                warn!(op = operation.label(), file_path = operation.file_path(), error = %err, "operation failed");
                ExecutionResult::failed(record_id, err)
            }
        }
    }

    async fn reclassify(
        &self,
        id: i64,
        file_path: &str,
        category: Category,
        document_type: DocumentType,
        new_path: &str,
    ) -> Result<(), RecordError> {
        let classification = Classification::new(category, document_type)
            .map_err(|e| execution("invalid classification", e))?;
        self.validator.ensure_valid(new_path)?;

        if file_path == new_path {
            let content_hash = self.hash_existing(file_path)?;
            self.store
                .update(
                    id,
                    &RecordUpdate {
                        file_path: file_path.to_string(),
                        classification: Some(classification),
                        content_hash: Some(content_hash),
                    },
                )
                .await
                .map_err(|e| store_error("database update failed", e))?;
            info!(id, file_path, %classification, "reclassified in place");
            return Ok(());
        }

        let moved = self.relocate(file_path, new_path)?;
        let update = RecordUpdate {
            file_path: new_path.to_string(),
            classification: Some(classification),
            content_hash: Some(moved.content_hash.clone()),
        };
        if let Err(e) = self.store.update(id, &update).await {
            self.rollback(&moved);
            return Err(store_error("database update failed", e));
        }

        info!(id, from = file_path, to = new_path, %classification, "moved and reclassified");
        self.discard_backup(&moved.backup);
        Ok(())
    }

    async fn create(
        &self,
        file_path: &str,
        new_path: &str,
        category: Category,
        document_type: DocumentType,
    ) -> Result<i64, RecordError> {
        let classification = Classification::new(category, document_type)
            .map_err(|e| execution("invalid classification", e))?;
        self.validator.ensure_valid(new_path)?;

        let record = |content_hash: String| NewDocumentReference {
            file_path: new_path.to_string(),
            classification,
            entity_type: None,
            entity_id: None,
            content_hash: Some(content_hash),
        };

        if file_path == new_path {
            // Hash now rather than trusting the scan.
            let content_hash = self.hash_existing(file_path)?;
            let id = self
                .store
                .insert(&record(content_hash))
                .await
                .map_err(|e| store_error("database insert failed", e))?;
            info!(id, file_path, %classification, "registered document");
            return Ok(id);
        }

        let moved = self.relocate(file_path, new_path)?;
        let id = match self.store.insert(&record(moved.content_hash.clone())).await {
            Ok(id) => id,
            Err(e) => {
                self.rollback(&moved);
                return Err(store_error("database insert failed", e));
            }
        };
        info!(id, from = file_path, to = new_path, %classification, "moved and registered document");
        self.discard_backup(&moved.backup);
        Ok(id)
    }

    async fn delete(&self, id: i64, file_path: &str) -> Result<(), RecordError> {
        let abs = self.root.join(file_path);
        let mut remove_file = self.delete_files && abs.is_file();
        if remove_file && self.validator.validate(file_path).has_security_violation() {
            warn!(id, file_path, "refusing to remove file at unsafe path");
            remove_file = false;
        }

        // The file goes first, behind a backup, so a failed row delete can
        // put it back.
        let backup = if remove_file {
            let backup = self.backup(&abs)?;
            if let Err(e) = fs::remove_file(&abs) {
                self.discard_backup(&backup);
                return Err(execution("failed to remove file", e));
            }
            Some(backup)
        } else {
            None
        };

        if let Err(e) = self.store.delete(id).await {
            if let Some(backup) = &backup {
                match fs::copy(backup, &abs) {
                    Ok(_) => self.discard_backup(backup),
                    Err(restore) => {
                        error!(id, file_path, backup = %backup.display(), error = %restore, "restore after failed delete failed; backup kept")
                    }
                }
            }
            return Err(store_error("database delete failed", e));
        }
        info!(id, file_path, "deleted record");
        if let Some(backup) = backup {
            info!(id, file_path, backup = %backup.display(), "removed file");
        }
        Ok(())
    }

    fn hash_existing(&self, file_path: &str) -> Result<String, RecordError> {
        let abs = self.root.join(file_path);
        if !abs.is_file() {
            return Err(OrphanedRecordError {
                file_path: file_path.to_string(),
            }
            .into());
        }
        sha256_file(&abs).map_err(|e| execution("failed to hash file", e))
    }

    /// Move `from` to `to` under the project root and verify the content
    /// hash. On any failure the source is restored before returning. On
    /// success the caller owns the backup: [`Self::rollback`] if the database
    /// write fails, [`Self::discard_backup`] once it commits.
    fn relocate(&self, from: &str, to: &str) -> Result<Relocated, RecordError> {
        let src = self.root.join(from);
        let dst = self.root.join(to);
        if !src.is_file() {
            return Err(OrphanedRecordError {
                file_path: from.to_string(),
            }
            .into());
        }
        if dst.exists() {
            return Err(RecordError::Execution(format!(
                "target '{}' already exists",
                to
            )));
        }

        let expected = sha256_file(&src).map_err(|e| execution("failed to hash source", e))?;
        let backup = self.backup(&src)?;
        let moved = Relocated {
            src,
            dst,
            backup,
            content_hash: expected,
        };

        if let Some(parent) = moved.dst.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                self.discard_backup(&moved.backup);
                return Err(execution("failed to create target directory", e));
            }
        }

        if let Err(e) = self.transfer.transfer(&moved.src, &moved.dst) {
            self.rollback(&moved);
            return Err(execution("move failed", e));
        }

        let actual = match sha256_file(&moved.dst) {
            Ok(hash) => hash,
            Err(e) => {
                self.rollback(&moved);
                return Err(execution("failed to hash target", e));
            }
        };
        if actual != moved.content_hash {
            error!(from, to, expected = %moved.content_hash, %actual, "content hash mismatch after move");
            self.rollback(&moved);
            return Err(IntegrityError {
                from: from.to_string(),
                to: to.to_string(),
                expected: moved.content_hash,
                actual,
            }
            .into());
        }
        Ok(moved)
    }

    fn backup(&self, src: &Path) -> Result<PathBuf, RecordError> {
        fs::create_dir_all(&self.backup_dir)
            .map_err(|e| execution("failed to create backup directory", e))?;

        let timestamp = Utc::now().format("%Y%m%dT%H%M%S%3f").to_string();
        let mut candidate = self.backup_dir.join(backup_file_name(src, &timestamp));
        let mut n = 1;
        while candidate.exists() {
            candidate = self
                .backup_dir
                .join(backup_file_name(src, &format!("{}-{}", timestamp, n)));
            n += 1;
        }

        fs::copy(src, &candidate).map_err(|e| execution("failed to write backup", e))?;
        debug!(backup = %candidate.display(), "backup written");
        Ok(candidate)
    }

    fn discard_backup(&self, backup: &Path) {
        if let Err(e) = fs::remove_file(backup) {
            warn!(backup = %backup.display(), error = %e, "failed to remove backup");
        }
    }

    /// Put the source back and remove the half-written target. The backup is
    /// kept whenever the restored source cannot be verified.
    fn rollback(&self, moved: &Relocated) {
        let Relocated {
            src,
            dst,
            backup,
            content_hash: expected,
        } = moved;
        if dst.exists() {
            if let Err(e) = fs::remove_file(dst) {
                error!(target_path = %dst.display(), error = %e, "failed to remove target during rollback");
            }
        }

        let intact = src.is_file() && sha256_file(src).ok().as_deref() == Some(expected.as_str());
        if !intact {
            if let Err(e) = fs::copy(backup, src) {
                error!(source = %src.display(), backup = %backup.display(), error = %e, "restore from backup failed; backup kept");
                return;
            }
            if sha256_file(src).ok().as_deref() != Some(expected.as_str()) {
                error!(source = %src.display(), backup = %backup.display(), "restored file does not match; backup kept");
                return;
            }
        }

        info!(source = %src.display(), "rolled back move");
        self.discard_backup(backup);
    }
}
