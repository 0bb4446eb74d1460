//! Reconciliation planning.
//!
//! [`ReconciliationEngine::plan`] compares stored records with the files the
//! scanner observed and produces an ordered list of [`Operation`]s. Planning
//! is pure: nothing here touches the filesystem or the database.
//!
//! Operations are emitted in fixed groups so an interrupted run has already
//! applied the most urgent fixes:
//!
//! 1. deletes of denylisted file names
//! 2. deletes of source/template files
//! 3. reclassification of records outside `docs/`
//! 4. reclassification of `other`-typed records
//! 5. everything else (other reclassifications, orphans, creates, hash refreshes)
//!
//! Untracked files under `docs/` are registered at the path their
//! classification maps to, which may mean a move.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use crate::classify::{infer_from_path, NonDocumentKind, PathClassifier, Verdict};
use crate::error::{DuplicatePathError, RecordError, ValidationError};
use crate::models::{
    file_name, Category, Classification, DocumentReference, DocumentType, ObservedFile,
};
use crate::validate::PathValidator;

pub const REASON_ORPHANED: &str = "file no longer exists on disk";

/// Per-record progress through a reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    Unclassified,
    Classified,
    Validated,
    Applied,
    Rejected,
    Failed,
}

impl RecordState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RecordState::Applied | RecordState::Rejected | RecordState::Failed
        )
    }

    /// Move to `next`, refusing transitions the pipeline never makes.
    pub fn advance(self, next: RecordState) -> Result<RecordState, IllegalTransition> {
        use RecordState::*;
        let ok = matches!(
            (self, next),
            (Unclassified, Classified)
                | (Unclassified, Rejected)
                | (Classified, Validated)
                | (Classified, Rejected)
                | (Validated, Applied)
                | (Validated, Failed)
        );
        if ok {
            Ok(next)
        } else {
            Err(IllegalTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for RecordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecordState::Unclassified => "UNCLASSIFIED",
            RecordState::Classified => "CLASSIFIED",
            RecordState::Validated => "VALIDATED",
            RecordState::Applied => "APPLIED",
            RecordState::Rejected => "REJECTED",
            RecordState::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal record state transition {from} -> {to}")]
pub struct IllegalTransition {
    pub from: RecordState,
    pub to: RecordState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteKind {
    NotADocument,
    Orphaned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    Delete {
        id: i64,
        file_path: String,
        kind: DeleteKind,
        reason: String,
    },
    Reclassify {
        id: i64,
        file_path: String,
        category: Category,
        document_type: DocumentType,
        new_path: String,
        reason: String,
    },
    Create {
        file_path: String,
        /// Where the file is registered. Differs from `file_path` when the
        /// classification belongs under another `docs/` prefix; the file is
        /// moved there first.
        new_path: String,
        category: Category,
        document_type: DocumentType,
        content_hash: Option<String>,
    },
    RefreshHash {
        id: i64,
        file_path: String,
        content_hash: String,
    },
}

impl Operation {
    pub fn record_id(&self) -> Option<i64> {
        match self {
            Operation::Delete { id, .. }
            | Operation::Reclassify { id, .. }
            | Operation::RefreshHash { id, .. } => Some(*id),
            Operation::Create { .. } => None,
        }
    }

    pub fn file_path(&self) -> &str {
        match self {
            Operation::Delete { file_path, .. }
            | Operation::Reclassify { file_path, .. }
            | Operation::Create { file_path, .. }
            | Operation::RefreshHash { file_path, .. } => file_path,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Operation::Delete { .. } => "delete",
            Operation::Reclassify { .. } => "reclassify",
            Operation::Create { .. } => "create",
            Operation::RefreshHash { .. } => "refresh",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordTrace {
    pub id: i64,
    pub file_path: String,
    pub state: RecordState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RecordTrace {
    pub fn advance(&mut self, next: RecordState) -> Result<(), IllegalTransition> {
        self.state = self.state.advance(next)?;
        Ok(())
    }
}

/// Advance during planning. An illegal step is a planner bug, so it is logged
/// and the trace keeps its last legal state.
fn step(trace: &mut RecordTrace, next: RecordState) {
    if let Err(e) = trace.advance(next) {
        tracing::warn!(id = trace.id, file_path = %trace.file_path, error = %e, "trace not advanced");
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub id: i64,
    pub file_path: String,
    pub violations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unclassified {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub file_path: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Plan {
    pub operations: Vec<Operation>,
    pub duplicates: Vec<DuplicatePathError>,
    pub rejected: Vec<Rejection>,
    pub needs_classification: Vec<Unclassified>,
    pub records: Vec<RecordTrace>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn trace_mut(&mut self, id: i64) -> Option<&mut RecordTrace> {
        self.records.iter_mut().find(|t| t.id == id)
    }

    pub fn count_state(&self, state: RecordState) -> usize {
        self.records.iter().filter(|t| t.state == state).count()
    }

    /// Every per-record failure, for the final report.
    pub fn errors(&self) -> Vec<(Option<i64>, RecordError)> {
        let mut out: Vec<(Option<i64>, RecordError)> = self
            .duplicates
            .iter()
            .map(|d| (None, RecordError::from(d.clone())))
            .collect();
        out.extend(self.rejected.iter().map(|r| {
            (
                Some(r.id),
                RecordError::from(ValidationError {
                    file_path: r.file_path.clone(),
                    violations: r.violations.clone(),
                }),
            )
        }));
        out
    }
}

/// Plans corrective operations. Classification and validation problems are
/// collected per record; one bad record never stops the pass.
pub struct ReconciliationEngine<'a> {
    classifier: &'a PathClassifier<'a>,
    validator: &'a PathValidator,
}

struct Planned {
    group: u8,
    operation: Operation,
}

impl<'a> ReconciliationEngine<'a> {
    pub fn new(classifier: &'a PathClassifier<'a>, validator: &'a PathValidator) -> Self {
        Self {
            classifier,
            validator,
        }
    }

    pub fn plan(&self, records: &[DocumentReference], observed: &[ObservedFile]) -> Plan {
        let mut plan = Plan::default();
        let mut planned: Vec<Planned> = Vec::new();

        let mut by_path: BTreeMap<&str, Vec<&DocumentReference>> = BTreeMap::new();
        for record in records {
            by_path.entry(record.file_path.as_str()).or_default().push(record);
        }
        let tracked: HashSet<&str> = by_path.keys().copied().collect();
        let on_disk: HashMap<&str, &ObservedFile> =
            observed.iter().map(|f| (f.path.as_str(), f)).collect();

        let mut singles: Vec<&DocumentReference> = Vec::new();
        for (path, group) in &by_path {
            if group.len() > 1 {
                let mut ids: Vec<i64> = group.iter().map(|r| r.id).collect();
                ids.sort_unstable();
                tracing::warn!(file_path = %path, ?ids, "duplicate file_path excluded from plan");
                plan.duplicates.push(DuplicatePathError {
                    file_path: path.to_string(),
                    ids,
                });
            } else {
                singles.extend(group.iter().copied());
            }
        }
        singles.sort_by_key(|r| r.id);

        // Paths that planned moves will occupy, so two records never target
        // the same file.
        let mut claimed: HashSet<String> = HashSet::new();

        for record in singles {
            let (trace, op) = self.plan_record(record, &on_disk, &tracked, &mut claimed, &mut plan);
            plan.records.push(trace);
            if let Some(p) = op {
                planned.push(p);
            }
        }

        for file in observed {
            if tracked.contains(file.path.as_str()) || claimed.contains(&file.path) {
                continue;
            }
            if let Some(p) = self.plan_untracked(file, &on_disk, &tracked, &mut claimed, &mut plan) {
                planned.push(p);
            }
        }

        // Stable: keeps record-id order inside each group.
        planned.sort_by_key(|p| p.group);
        plan.operations = planned.into_iter().map(|p| p.operation).collect();
        plan
    }

    fn plan_record(
        &self,
        record: &DocumentReference,
        on_disk: &HashMap<&str, &ObservedFile>,
        tracked: &HashSet<&str>,
        claimed: &mut HashSet<String>,
        plan: &mut Plan,
    ) -> (RecordTrace, Option<Planned>) {
        let mut trace = RecordTrace {
            id: record.id,
            file_path: record.file_path.clone(),
            state: RecordState::Unclassified,
            error: None,
        };
        let path = record.file_path.as_str();

        // Non-documents are removed, never reclassified. The verdict is their
        // classification.
        if let Some((kind, reason)) = self.classifier.non_document(path) {
            step(&mut trace, RecordState::Classified);
            step(&mut trace, RecordState::Validated);
            let group = match kind {
                NonDocumentKind::Denylisted => 1,
                NonDocumentKind::Extension => 2,
            };
            let operation = Operation::Delete {
                id: record.id,
                file_path: record.file_path.clone(),
                kind: DeleteKind::NotADocument,
                reason,
            };
            return (trace, Some(Planned { group, operation }));
        }

        let current = self.validator.validate(path);
        if current.has_security_violation() {
            let violations = current.messages();
            step(&mut trace, RecordState::Rejected);
            trace.error = Some(violations.join("; "));
            plan.rejected.push(Rejection {
                id: record.id,
                file_path: record.file_path.clone(),
                violations,
            });
            return (trace, None);
        }

        // A missing file classifies the record as orphaned.
        let Some(observed) = on_disk.get(path) else {
            step(&mut trace, RecordState::Classified);
            step(&mut trace, RecordState::Validated);
            let operation = Operation::Delete {
                id: record.id,
                file_path: record.file_path.clone(),
                kind: DeleteKind::Orphaned,
                reason: REASON_ORPHANED.to_string(),
            };
            return (trace, Some(Planned { group: 5, operation }));
        };

        let result = match self
            .classifier
            .classify(path, record.category, record.document_type)
        {
            Verdict::Classified(r) => r,
            Verdict::NotADocument { .. } | Verdict::NeedsClassification => {
                plan.needs_classification.push(Unclassified {
                    id: Some(record.id),
                    file_path: record.file_path.clone(),
                });
                return (trace, None);
            }
        };
        let Some(target) = result.classification() else {
            plan.needs_classification.push(Unclassified {
                id: Some(record.id),
                file_path: record.file_path.clone(),
            });
            return (trace, None);
        };
        step(&mut trace, RecordState::Classified);

        let outside_docs = !current.valid && !path.starts_with("docs/");
        let new_path = if result.changed || !current.valid {
            target_path(path, target)
        } else {
            path.to_string()
        };

        if new_path == path && !result.changed {
            step(&mut trace, RecordState::Validated);
            return match &observed.content_hash {
                Some(hash) if record.content_hash.as_deref() != Some(hash.as_str()) => {
                    let operation = Operation::RefreshHash {
                        id: record.id,
                        file_path: record.file_path.clone(),
                        content_hash: hash.clone(),
                    };
                    (trace, Some(Planned { group: 5, operation }))
                }
                _ => (trace, None),
            };
        }

        let mut violations = self.validator.validate(&new_path).messages();
        if new_path != path {
            if tracked.contains(new_path.as_str()) || on_disk.contains_key(new_path.as_str()) {
                violations.push(format!("target path '{}' already exists", new_path));
            } else if claimed.contains(&new_path) {
                violations.push(format!(
                    "target path '{}' is claimed by another record in this pass",
                    new_path
                ));
            }
        }
        if !violations.is_empty() {
            step(&mut trace, RecordState::Rejected);
            trace.error = Some(violations.join("; "));
            plan.rejected.push(Rejection {
                id: record.id,
                file_path: record.file_path.clone(),
                violations,
            });
            return (trace, None);
        }
        step(&mut trace, RecordState::Validated);
        claimed.insert(new_path.clone());

        let group = if outside_docs {
            3
        } else if record.document_type == Some(DocumentType::Other) {
            4
        } else {
            5
        };
        let operation = Operation::Reclassify {
            id: record.id,
            file_path: record.file_path.clone(),
            category: target.category(),
            document_type: target.document_type(),
            new_path,
            reason: result.reason,
        };
        (trace, Some(Planned { group, operation }))
    }

    fn plan_untracked(
        &self,
        file: &ObservedFile,
        on_disk: &HashMap<&str, &ObservedFile>,
        tracked: &HashSet<&str>,
        claimed: &mut HashSet<String>,
        plan: &mut Plan,
    ) -> Option<Planned> {
        let path = file.path.as_str();
        let verdict = self.classifier.classify(path, None, None);
        let classified = match verdict {
            Verdict::NotADocument { .. } => return None,
            Verdict::Classified(r) => r.classification(),
            Verdict::NeedsClassification => None,
        };
        let needs_classification = |plan: &mut Plan| -> Option<Planned> {
            plan.needs_classification.push(Unclassified {
                id: None,
                file_path: file.path.clone(),
            });
            None
        };

        let Some(c) = classified else {
            return needs_classification(plan);
        };
        if !self.validator.validate(path).valid {
            return needs_classification(plan);
        }

        // A file under the wrong docs/ prefix is registered where its
        // classification puts it. Root-level files stay where they are.
        let new_path = if path.starts_with("docs/") {
            target_path(path, c)
        } else {
            path.to_string()
        };
        if new_path != path {
            let occupied = tracked.contains(new_path.as_str())
                || on_disk.contains_key(new_path.as_str())
                || claimed.contains(&new_path);
            if occupied || !self.validator.validate(&new_path).valid {
                tracing::warn!(file_path = path, to = %new_path, "untracked file cannot move to its classified location");
                return needs_classification(plan);
            }
            claimed.insert(new_path.clone());
        }

        Some(Planned {
            group: 5,
            operation: Operation::Create {
                file_path: file.path.clone(),
                new_path,
                category: c.category(),
                document_type: c.document_type(),
                content_hash: file.content_hash.clone(),
            },
        })
    }
}

/// Where a record with classification `target` belongs. A path that already
/// sits under the matching `docs/{category}/{type}/` prefix keeps its
/// sub-directories.
pub fn target_path(current: &str, target: Classification) -> String {
    if infer_from_path(current) == Some(target) {
        return current.to_string();
    }
    target.canonical_path(file_name(current))
}
