//! Compliance summary and human-readable rendering of plans and outcomes.

use std::collections::HashMap;
use std::io::{self, Write};

use serde::Serialize;

use crate::apply::{ApplyReport, OutcomeStatus};
use crate::models::DocumentReference;
use crate::reconcile::{Operation, Plan, RecordState};
use crate::validate::PathValidator;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplianceSummary {
    pub total: usize,
    pub compliant: usize,
    pub non_compliant: usize,
    pub needs_classification: usize,
    /// Number of paths shared by more than one record.
    pub duplicates: usize,
    /// Percentage of compliant records; 100 for an empty table.
    pub compliance_rate: f64,
}

impl ComplianceSummary {
    /// A record is compliant when its path and classification validate and
    /// no other record shares its path.
    pub fn compute(records: &[DocumentReference], validator: &PathValidator) -> Self {
        let mut per_path: HashMap<&str, usize> = HashMap::new();
        for record in records {
            *per_path.entry(record.file_path.as_str()).or_default() += 1;
        }

        let compliant = records
            .iter()
            .filter(|r| per_path.get(r.file_path.as_str()) == Some(&1))
            .filter(|r| validator.validate_record(r).valid)
            .count();
        let needs_classification = records
            .iter()
            .filter(|r| r.classification().is_none())
            .count();

        let total = records.len();
        let compliance_rate = if total == 0 {
            100.0
        } else {
            (compliant as f64 / total as f64) * 100.0
        };

        Self {
            total,
            compliant,
            non_compliant: total - compliant,
            needs_classification,
            duplicates: per_path.values().filter(|n| **n > 1).count(),
            compliance_rate,
        }
    }
}

pub fn write_summary(out: &mut impl Write, summary: &ComplianceSummary) -> io::Result<()> {
    writeln!(out, "Document compliance")?;
    writeln!(out, "===================")?;
    writeln!(out)?;
    writeln!(out, "  Total:                 {}", summary.total)?;
    writeln!(out, "  Compliant:             {}", summary.compliant)?;
    writeln!(out, "  Non-compliant:         {}", summary.non_compliant)?;
    writeln!(out, "  Needs classification:  {}", summary.needs_classification)?;
    writeln!(out, "  Duplicate paths:       {}", summary.duplicates)?;
    writeln!(out, "  Compliance rate:       {:.1}%", summary.compliance_rate)?;
    Ok(())
}

fn write_operation(out: &mut impl Write, operation: &Operation) -> io::Result<()> {
    match operation {
        Operation::Delete {
            id,
            file_path,
            reason,
            ..
        } => writeln!(out, "  delete      #{:<5} {}  ({})", id, file_path, reason),
        Operation::Reclassify {
            id,
            file_path,
            category,
            document_type,
            new_path,
            reason,
        } => {
            writeln!(
                out,
                "  reclassify  #{:<5} {}/{}  ({})",
                id, category, document_type, reason
            )?;
            if new_path == file_path {
                writeln!(out, "              {}  (path unchanged)", file_path)
            } else {
                writeln!(out, "              {}", file_path)?;
                writeln!(out, "           -> {}", new_path)
            }
        }
        Operation::Create {
            file_path,
            new_path,
            category,
            document_type,
            ..
        } => {
            writeln!(
                out,
                "  create             {}  ({}/{})",
                file_path, category, document_type
            )?;
            if new_path != file_path {
                writeln!(out, "           -> {}", new_path)?;
            }
            Ok(())
        }
        Operation::RefreshHash { id, file_path, .. } => {
            writeln!(out, "  refresh     #{:<5} {}  (content changed)", id, file_path)
        }
    }
}

pub fn write_plan(out: &mut impl Write, plan: &Plan) -> io::Result<()> {
    if plan.operations.is_empty() {
        writeln!(out, "Nothing to do: {} records in place.", plan.records.len())?;
    } else {
        writeln!(out, "Planned operations ({}):", plan.operations.len())?;
        for operation in &plan.operations {
            write_operation(out, operation)?;
        }
    }

    if !plan.duplicates.is_empty() {
        writeln!(out)?;
        writeln!(out, "Duplicate paths ({}), excluded:", plan.duplicates.len())?;
        for dup in &plan.duplicates {
            let ids: Vec<String> = dup.ids.iter().map(|id| format!("#{}", id)).collect();
            writeln!(out, "  {}  {}", dup.file_path, ids.join(", "))?;
        }
    }

    if !plan.rejected.is_empty() {
        writeln!(out)?;
        writeln!(out, "Rejected ({}):", plan.rejected.len())?;
        for rejection in &plan.rejected {
            writeln!(
                out,
                "  #{:<5} {}  {}",
                rejection.id,
                rejection.file_path,
                rejection.violations.join("; ")
            )?;
        }
    }

    if !plan.needs_classification.is_empty() {
        writeln!(out)?;
        writeln!(
            out,
            "Needs classification ({}):",
            plan.needs_classification.len()
        )?;
        for item in &plan.needs_classification {
            match item.id {
                Some(id) => writeln!(out, "  #{:<5} {}", id, item.file_path)?,
                None => writeln!(out, "  (untracked) {}", item.file_path)?,
            }
        }
    }
    Ok(())
}

pub fn write_outcomes(out: &mut impl Write, report: &ApplyReport) -> io::Result<()> {
    writeln!(
        out,
        "Applied {}, failed {}, skipped {}.",
        report.applied(),
        report.failed(),
        report.skipped()
    )?;
    for outcome in &report.outcomes {
        let id = outcome
            .record_id
            .map(|id| format!("#{}", id))
            .unwrap_or_else(|| "-".to_string());
        let path = outcome.operation.file_path();
        let label = outcome.operation.label();
        match &outcome.status {
            OutcomeStatus::Applied => writeln!(out, "  APPLIED  {:<7}{:<11} {}", id, label, path)?,
            OutcomeStatus::Failed { error, .. } => {
                writeln!(out, "  FAILED   {:<7}{:<11} {}  {}", id, label, path, error)?
            }
            OutcomeStatus::Skipped { reason } => {
                writeln!(out, "  SKIPPED  {:<7}{:<11} {}  {}", id, label, path, reason)?
            }
        }
    }
    Ok(())
}

/// Whether a `--strict` run should exit non-zero. Creates carry no record
/// trace, so their failures are only visible in `outcomes`.
pub fn has_failures(plan: &Plan, outcomes: Option<&ApplyReport>) -> bool {
    !plan.duplicates.is_empty()
        || plan.count_state(RecordState::Rejected) > 0
        || plan.count_state(RecordState::Failed) > 0
        || outcomes.is_some_and(|report| report.failed() > 0)
}

/// Machine-readable output of `reconcile --json`.
#[derive(Debug, Serialize)]
pub struct ReconcileOutput<'a> {
    pub applied: bool,
    pub plan: &'a Plan,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcomes: Option<&'a ApplyReport>,
    pub summary: &'a ComplianceSummary,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::OperationOutcome;
    use crate::config::ClassifyConfig;
    use crate::error::DuplicatePathError;
    use crate::models::{Category, DocumentType};
    use crate::reconcile::{DeleteKind, RecordTrace};
    use chrono::Utc;
    use std::path::Path;

    fn rec(id: i64, path: &str, typed: bool) -> DocumentReference {
        DocumentReference {
            id,
            file_path: path.to_string(),
            category: Some(Category::Guides),
            document_type: typed.then_some(DocumentType::Tutorial),
            entity_type: None,
            entity_id: None,
            content_hash: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn validator() -> PathValidator {
        PathValidator::new(Path::new("/nonexistent/project"), &ClassifyConfig::default())
    }

    #[test]
    fn test_summary_counts() {
        let records = vec![
            rec(1, "docs/guides/tutorial/a.md", true),
            rec(2, "docs/guides/tutorial/b.md", false),
            rec(3, "notes/c.md", true),
            rec(4, "docs/guides/tutorial/d.md", true),
            rec(5, "docs/guides/tutorial/d.md", true),
        ];
        let s = ComplianceSummary::compute(&records, &validator());
        assert_eq!(s.total, 5);
        assert_eq!(s.compliant, 1);
        assert_eq!(s.non_compliant, 4);
        assert_eq!(s.needs_classification, 1);
        assert_eq!(s.duplicates, 1);
        assert!((s.compliance_rate - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_summary_is_fully_compliant() {
        let s = ComplianceSummary::compute(&[], &validator());
        assert_eq!(s.total, 0);
        assert_eq!(s.compliance_rate, 100.0);
    }

    #[test]
    fn test_plan_text_shows_before_and_after() {
        let plan = Plan {
            operations: vec![
                Operation::Delete {
                    id: 3,
                    file_path: "bad.md".to_string(),
                    kind: DeleteKind::NotADocument,
                    reason: "denylisted filename".to_string(),
                },
                Operation::Reclassify {
                    id: 7,
                    file_path: "docs/architecture/specification/WI-1-AUDIT.md".to_string(),
                    category: Category::Communication,
                    document_type: DocumentType::StatusReport,
                    new_path: "docs/communication/status_report/WI-1-AUDIT.md".to_string(),
                    reason: "matched rule".to_string(),
                },
            ],
            duplicates: vec![DuplicatePathError {
                file_path: "x.md".to_string(),
                ids: vec![4, 5],
            }],
            ..Plan::default()
        };
        let mut buf = Vec::new();
        write_plan(&mut buf, &plan).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Planned operations (2)"));
        assert!(text.contains("bad.md  (denylisted filename)"));
        assert!(text.contains("docs/architecture/specification/WI-1-AUDIT.md\n"));
        assert!(text.contains("-> docs/communication/status_report/WI-1-AUDIT.md"));
        assert!(text.contains("x.md  #4, #5"));
        assert!(has_failures(&plan, None));
    }

    #[test]
    fn test_create_text_shows_move() {
        let plan = Plan {
            operations: vec![Operation::Create {
                file_path: "docs/architecture/specification/WI-5-COMPLETION.md".to_string(),
                new_path: "docs/communication/status_report/WI-5-COMPLETION.md".to_string(),
                category: Category::Communication,
                document_type: DocumentType::StatusReport,
                content_hash: None,
            }],
            ..Plan::default()
        };
        let mut buf = Vec::new();
        write_plan(&mut buf, &plan).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("docs/architecture/specification/WI-5-COMPLETION.md  (communication/status_report)"));
        assert!(text.contains("-> docs/communication/status_report/WI-5-COMPLETION.md"));
    }

    #[test]
    fn test_strict_counts_failed_create() {
        let plan = Plan::default();
        let report = ApplyReport {
            outcomes: vec![OperationOutcome {
                record_id: None,
                operation: Operation::Create {
                    file_path: "docs/guides/tutorial/missing.md".to_string(),
                    new_path: "docs/guides/tutorial/missing.md".to_string(),
                    category: Category::Guides,
                    document_type: DocumentType::Tutorial,
                    content_hash: None,
                },
                status: OutcomeStatus::Failed {
                    kind: "orphaned",
                    error: "file no longer exists".to_string(),
                },
            }],
        };
        assert!(!has_failures(&plan, None));
        assert!(has_failures(&plan, Some(&report)));
        assert!(!has_failures(&plan, Some(&ApplyReport::default())));
    }

    #[test]
    fn test_strict_failures() {
        let mut plan = Plan {
            records: vec![RecordTrace {
                id: 1,
                file_path: "docs/a/b/c.md".to_string(),
                state: RecordState::Applied,
                error: None,
            }],
            ..Plan::default()
        };
        assert!(!has_failures(&plan, None));
        plan.records[0].state = RecordState::Failed;
        assert!(has_failures(&plan, None));
    }
}
