//! Path classification.
//!
//! [`PathClassifier`] decides the `(category, document_type)` for a path,
//! given the record's current values as a hint. Non-document paths (source,
//! templates, denylisted names) are terminal: they are never reclassified.

use anyhow::Result;
use serde::Serialize;

use crate::config::{ClassifyConfig, Config};
use crate::models::{file_name, Category, Classification, DocumentType};
use crate::taxonomy::{RuleInput, TaxonomyRules};

pub const REASON_RETAINED: &str = "no rule matched — retained existing classification";
pub const REASON_DENYLISTED: &str = "denylisted filename";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationResult {
    pub category: Category,
    pub document_type: DocumentType,
    pub changed: bool,
    pub reason: String,
}

impl ClassificationResult {
    pub fn classification(&self) -> Option<Classification> {
        Classification::new(self.category, self.document_type).ok()
    }
}

/// Why a path is not documentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NonDocumentKind {
    /// Exact file name match against the denylist.
    Denylisted,
    /// Source or template extension.
    Extension,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Classified(ClassificationResult),
    NotADocument { kind: NonDocumentKind, reason: String },
    NeedsClassification,
}

pub struct PathClassifier<'a> {
    rules: &'a TaxonomyRules,
    denylist: Vec<String>,
    extensions: Vec<String>,
}

impl<'a> PathClassifier<'a> {
    pub fn new(rules: &'a TaxonomyRules, config: &ClassifyConfig) -> Self {
        Self {
            rules,
            denylist: config.denylist.clone(),
            extensions: config.non_document_extensions.clone(),
        }
    }

    /// Returns the non-document kind and reason, if `file_path` must never be
    /// tracked.
    pub fn non_document(&self, file_path: &str) -> Option<(NonDocumentKind, String)> {
        let name = file_name(file_path);
        if self.denylist.iter().any(|d| d == name || d == file_path) {
            return Some((NonDocumentKind::Denylisted, REASON_DENYLISTED.to_string()));
        }
        let ext = name.rsplit_once('.').map(|(_, e)| e)?;
        if self.extensions.iter().any(|e| e == ext) {
            return Some((
                NonDocumentKind::Extension,
                format!("non-document extension .{}", ext),
            ));
        }
        None
    }

    pub fn classify(
        &self,
        file_path: &str,
        current_category: Option<Category>,
        current_document_type: Option<DocumentType>,
    ) -> Verdict {
        if let Some((kind, reason)) = self.non_document(file_path) {
            return Verdict::NotADocument { kind, reason };
        }

        let input = RuleInput {
            file_path,
            category: current_category,
            document_type: current_document_type,
        };

        if let Some(m) = self.rules.find(&input) {
            let target = m.classification;
            let changed = current_category != Some(target.category())
                || current_document_type != Some(target.document_type());
            return Verdict::Classified(ClassificationResult {
                category: target.category(),
                document_type: target.document_type(),
                changed,
                reason: format!("matched rule '{}'", m.rule.name),
            });
        }

        if let (Some(category), Some(document_type)) = (current_category, current_document_type)
        {
            return Verdict::Classified(ClassificationResult {
                category,
                document_type,
                changed: false,
                reason: REASON_RETAINED.to_string(),
            });
        }

        match infer_from_path(file_path) {
            Some(c) => Verdict::Classified(ClassificationResult {
                category: c.category(),
                document_type: c.document_type(),
                changed: true,
                reason: "inferred from docs/{category}/{document_type} path".to_string(),
            }),
            None => Verdict::NeedsClassification,
        }
    }
}

/// Reads the classification from a `docs/{category}/{document_type}/...` path.
pub fn infer_from_path(file_path: &str) -> Option<Classification> {
    let mut segments = file_path.split('/');
    if segments.next()? != "docs" {
        return None;
    }
    let category = segments.next()?;
    let document_type = segments.next()?;
    // at least a file name must follow
    segments.next()?;
    Classification::parse(category, document_type).ok()
}

/// CLI entry point: print the verdict for one path.
pub fn run_classify(
    config: &Config,
    file_path: &str,
    category: Option<Category>,
    document_type: Option<DocumentType>,
    json: bool,
) -> Result<()> {
    let rules = TaxonomyRules::with_config(&config.rules)?;
    let verdict = PathClassifier::new(&rules, &config.classify).classify(
        file_path,
        category,
        document_type,
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&verdict)?);
        return Ok(());
    }
    match verdict {
        Verdict::Classified(r) => {
            println!("{}/{}", r.category, r.document_type);
            println!("changed: {}", r.changed);
            println!("reason:  {}", r.reason);
            if let Some(c) = r.classification() {
                println!("target:  {}", c.canonical_path(file_name(file_path)));
            }
        }
        Verdict::NotADocument { reason, .. } => println!("not a document: {}", reason),
        Verdict::NeedsClassification => println!("needs classification"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier(rules: &TaxonomyRules) -> PathClassifier<'_> {
        PathClassifier::new(rules, &ClassifyConfig::default())
    }

    #[test]
    fn test_rule_match_marks_changed() {
        let rules = TaxonomyRules::standard().unwrap();
        let v = classifier(&rules).classify(
            "docs/architecture/specification/WI-42-COMPLETION.md",
            Some(Category::Architecture),
            Some(DocumentType::Specification),
        );
        match v {
            Verdict::Classified(r) => {
                assert!(r.changed);
                assert_eq!(r.category, Category::Communication);
                assert_eq!(r.document_type, DocumentType::StatusReport);
            }
            other => panic!("unexpected verdict: {:?}", other),
        }
    }

    #[test]
    fn test_no_rule_retains_current() {
        let rules = TaxonomyRules::standard().unwrap();
        let v = classifier(&rules).classify(
            "docs/guides/tutorial/getting-started.md",
            Some(Category::Guides),
            Some(DocumentType::Tutorial),
        );
        assert_eq!(
            v,
            Verdict::Classified(ClassificationResult {
                category: Category::Guides,
                document_type: DocumentType::Tutorial,
                changed: false,
                reason: REASON_RETAINED.to_string(),
            })
        );
    }

    #[test]
    fn test_reclassifying_at_target_is_stable() {
        let rules = TaxonomyRules::standard().unwrap();
        let c = classifier(&rules);
        let path = "docs/architecture/specification/WI-9-AUDIT.md";
        let first = match c.classify(path, None, None) {
            Verdict::Classified(r) => r,
            other => panic!("unexpected verdict: {:?}", other),
        };
        let second = match c.classify(path, Some(first.category), Some(first.document_type)) {
            Verdict::Classified(r) => r,
            other => panic!("unexpected verdict: {:?}", other),
        };
        assert!(!second.changed);
        assert_eq!(second.category, first.category);
        assert_eq!(second.document_type, first.document_type);
    }

    #[test]
    fn test_non_documents_are_terminal() {
        let rules = TaxonomyRules::standard().unwrap();
        let c = classifier(&rules);
        for path in [
            "bad.md",
            "docs/testing/other/bad.md",
            "agentpm/cli/main.py",
            "docs/architecture/specification/WI-1-COMPLETION.py",
            "templates/dashboard.html.j2",
        ] {
            assert!(
                matches!(c.classify(path, Some(Category::Testing), Some(DocumentType::Other)), Verdict::NotADocument { .. }),
                "expected NotADocument for {}",
                path
            );
        }
    }

    #[test]
    fn test_denylist_reason() {
        let rules = TaxonomyRules::standard().unwrap();
        let v = classifier(&rules).classify("bad.md", Some(Category::Testing), None);
        assert_eq!(
            v,
            Verdict::NotADocument {
                kind: NonDocumentKind::Denylisted,
                reason: REASON_DENYLISTED.to_string(),
            }
        );
    }

    #[test]
    fn test_infers_from_canonical_path() {
        let rules = TaxonomyRules::standard().unwrap();
        match classifier(&rules).classify("docs/operations/runbook/restore.md", None, None) {
            Verdict::Classified(r) => {
                assert_eq!(r.category, Category::Operations);
                assert_eq!(r.document_type, DocumentType::Runbook);
                assert!(r.changed);
            }
            other => panic!("unexpected verdict: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_path_needs_classification() {
        let rules = TaxonomyRules::standard().unwrap();
        let c = classifier(&rules);
        assert_eq!(c.classify("notes/idea.md", None, None), Verdict::NeedsClassification);
        assert_eq!(
            c.classify("docs/misc/stuff/idea.md", None, None),
            Verdict::NeedsClassification
        );
    }

    #[test]
    fn test_infer_requires_filename() {
        assert!(infer_from_path("docs/guides/tutorial").is_none());
        assert!(infer_from_path("docs/guides/tutorial/a.md").is_some());
    }
}
