//! Applies a [`Plan`] through a [`MigrationExecutor`].
//!
//! Operations run strictly one at a time in plan order. A failed operation is
//! recorded and the batch moves on. Deletes are gated on explicit
//! confirmation and stay in the report as skipped when not confirmed.

use serde::Serialize;
use tracing::{info, warn};

use crate::executor::MigrationExecutor;
use crate::progress::{ApplyProgressEvent, ApplyProgressReporter};
use crate::reconcile::{DeleteKind, Operation, Plan, RecordState};

pub const AWAITING_DELETE_CONFIRMATION: &str = "awaiting confirmation (--confirm-deletes)";
pub const AWAITING_PRUNE_CONFIRMATION: &str = "awaiting confirmation (--prune-orphans)";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Remove records of non-documents.
    pub confirm_deletes: bool,
    /// Remove records whose file is gone.
    pub prune_orphans: bool,
    /// Also remove the file itself when a non-document record is deleted.
    pub delete_files: bool,
}

impl ApplyOptions {
    /// Why `operation` may not run under these options, if it may not.
    pub fn gate(&self, operation: &Operation) -> Option<&'static str> {
        match operation {
            Operation::Delete {
                kind: DeleteKind::NotADocument,
                ..
            } if !self.confirm_deletes => Some(AWAITING_DELETE_CONFIRMATION),
            Operation::Delete {
                kind: DeleteKind::Orphaned,
                ..
            } if !self.prune_orphans => Some(AWAITING_PRUNE_CONFIRMATION),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Applied,
    Failed { kind: &'static str, error: String },
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<i64>,
    pub operation: Operation,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub outcomes: Vec<OperationOutcome>,
}

impl ApplyReport {
    pub fn applied(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Applied))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Skipped { .. }))
    }

    fn count(&self, pred: impl Fn(&OutcomeStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }
}

pub async fn apply_plan(
    plan: &mut Plan,
    executor: &MigrationExecutor<'_>,
    options: &ApplyOptions,
    progress: &dyn ApplyProgressReporter,
) -> ApplyReport {
    let mut report = ApplyReport::default();
    let operations = plan.operations.clone();
    let total = operations.len() as u64;

    for (i, operation) in operations.into_iter().enumerate() {
        if let Some(reason) = options.gate(&operation) {
            info!(op = operation.label(), file_path = operation.file_path(), reason, "skipped");
            report.outcomes.push(OperationOutcome {
                record_id: operation.record_id(),
                operation,
                status: OutcomeStatus::Skipped {
                    reason: reason.to_string(),
                },
            });
            continue;
        }

        let result = executor.execute(&operation).await;
        progress.report(ApplyProgressEvent::Applying {
            n: i as u64 + 1,
            total,
            op: operation.label(),
            file_path: operation.file_path().to_string(),
            success: result.success,
        });

        let status = match &result.error {
            None => OutcomeStatus::Applied,
            Some(err) => OutcomeStatus::Failed {
                kind: err.kind(),
                error: err.to_string(),
            },
        };

        if let Some(id) = operation.record_id() {
            if let Some(trace) = plan.trace_mut(id) {
                let next = if result.success {
                    RecordState::Applied
                } else {
                    RecordState::Failed
                };
                if let Err(e) = trace.advance(next) {
                    warn!(id, error = %e, "record trace not advanced");
                }
                if let Some(err) = &result.error {
                    trace.error = Some(err.to_string());
                }
            }
        }

        report.outcomes.push(OperationOutcome {
            record_id: result.record_id,
            operation,
            status,
        });
    }

    info!(
        applied = report.applied(),
        failed = report.failed(),
        skipped = report.skipped(),
        "reconcile pass applied"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::{Category, DocumentReference, DocumentType};
    use crate::progress::NoProgress;
    use crate::reconcile::RecordTrace;
    use crate::store::memory::InMemoryStore;
    use crate::store::DocumentStore;
    use crate::validate::PathValidator;
    use chrono::Utc;
    use std::fs;
    use tempfile::TempDir;

    fn record(id: i64, path: &str) -> DocumentReference {
        DocumentReference {
            id,
            file_path: path.to_string(),
            category: Some(Category::Architecture),
            document_type: Some(DocumentType::Specification),
            entity_type: None,
            entity_id: None,
            content_hash: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn trace(id: i64, path: &str) -> RecordTrace {
        RecordTrace {
            id,
            file_path: path.to_string(),
            state: RecordState::Validated,
            error: None,
        }
    }

    fn reclassify(id: i64, name: &str) -> Operation {
        Operation::Reclassify {
            id,
            file_path: format!("docs/architecture/specification/{}", name),
            category: Category::Communication,
            document_type: DocumentType::StatusReport,
            new_path: format!("docs/communication/status_report/{}", name),
            reason: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_failure_does_not_abort_batch() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("docs/architecture/specification");
        fs::create_dir_all(&dir).unwrap();
        // Only the second file exists.
        fs::write(dir.join("WI-2-AUDIT.md"), "audit").unwrap();

        let a = "docs/architecture/specification/WI-1-AUDIT.md";
        let b = "docs/architecture/specification/WI-2-AUDIT.md";
        let store = InMemoryStore::with_records(vec![record(1, a), record(2, b)]);
        let config = Config::for_root(tmp.path());
        let validator = PathValidator::new(tmp.path(), &config.classify);
        let executor = MigrationExecutor::new(&store, &validator, &config);

        let mut plan = Plan {
            operations: vec![reclassify(1, "WI-1-AUDIT.md"), reclassify(2, "WI-2-AUDIT.md")],
            records: vec![trace(1, a), trace(2, b)],
            ..Plan::default()
        };

        let report = apply_plan(&mut plan, &executor, &ApplyOptions::default(), &NoProgress).await;
        assert_eq!(report.failed(), 1);
        assert_eq!(report.applied(), 1);
        assert_eq!(plan.records[0].state, RecordState::Failed);
        assert!(plan.records[0].error.is_some());
        assert_eq!(plan.records[1].state, RecordState::Applied);
        assert!(matches!(
            &report.outcomes[0].status,
            OutcomeStatus::Failed { kind: "orphaned", .. }
        ));
        assert_eq!(
            store.get_by_id(2).await.unwrap().unwrap().file_path,
            "docs/communication/status_report/WI-2-AUDIT.md"
        );
    }

    #[tokio::test]
    async fn test_deletes_wait_for_confirmation() {
        let tmp = TempDir::new().unwrap();
        let store = InMemoryStore::with_records(vec![record(1, "bad.md"), record(2, "docs/a/b/gone.md")]);
        let config = Config::for_root(tmp.path());
        let validator = PathValidator::new(tmp.path(), &config.classify);
        let executor = MigrationExecutor::new(&store, &validator, &config);

        let delete = Operation::Delete {
            id: 1,
            file_path: "bad.md".to_string(),
            kind: DeleteKind::NotADocument,
            reason: "denylisted filename".to_string(),
        };
        let orphan = Operation::Delete {
            id: 2,
            file_path: "docs/a/b/gone.md".to_string(),
            kind: DeleteKind::Orphaned,
            reason: "file no longer exists on disk".to_string(),
        };
        let fresh_plan = || Plan {
            operations: vec![delete.clone(), orphan.clone()],
            records: vec![trace(1, "bad.md"), trace(2, "docs/a/b/gone.md")],
            ..Plan::default()
        };

        let mut plan = fresh_plan();
        let report = apply_plan(&mut plan, &executor, &ApplyOptions::default(), &NoProgress).await;
        assert_eq!(report.skipped(), 2);
        assert_eq!(store.list_records().await.unwrap().len(), 2);
        assert_eq!(plan.records[0].state, RecordState::Validated);

        let options = ApplyOptions {
            confirm_deletes: true,
            ..ApplyOptions::default()
        };
        let mut plan = fresh_plan();
        let report = apply_plan(&mut plan, &executor, &options, &NoProgress).await;
        assert_eq!(report.applied(), 1);
        assert_eq!(report.skipped(), 1);
        assert!(store.get_by_id(1).await.unwrap().is_none());
        assert!(store.get_by_id(2).await.unwrap().is_some());
    }
}
