//! Path taxonomy rules.
//!
//! A rule pairs a matcher with a target classification and a priority. The
//! table is sorted once on construction (lower priority fires first, equal
//! priorities keep insertion order) and is then read-only. Adding a rule is
//! adding a value to the table; the classifier never changes.

use anyhow::{Context, Result};
use globset::{Glob, GlobMatcher};

use crate::config::RuleConfig;
use crate::models::{file_name, Category, Classification, DocumentType};

/// What a rule looks at.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Glob over the full relative path. `*` crosses `/`.
    Path(GlobMatcher),
    /// The record's current type is `document_type` and its file name
    /// contains any of `markers`.
    TypeWithMarkers {
        document_type: DocumentType,
        markers: Vec<String>,
    },
}

impl Matcher {
    pub fn glob(pattern: &str) -> Result<Self> {
        let glob = Glob::new(pattern).with_context(|| format!("Invalid rule glob: '{}'", pattern))?;
        Ok(Matcher::Path(glob.compile_matcher()))
    }

    pub fn type_with_markers(document_type: DocumentType, markers: &[&str]) -> Self {
        Matcher::TypeWithMarkers {
            document_type,
            markers: markers.iter().map(|m| m.to_string()).collect(),
        }
    }

    fn is_match(&self, input: &RuleInput<'_>) -> bool {
        match self {
            Matcher::Path(glob) => glob.is_match(input.file_path),
            Matcher::TypeWithMarkers {
                document_type,
                markers,
            } => {
                if input.document_type != Some(*document_type) {
                    return false;
                }
                let name = file_name(input.file_path);
                markers.iter().any(|m| name.contains(m.as_str()))
            }
        }
    }
}

/// Where a matching rule sends the document.
#[derive(Debug, Clone, Copy)]
pub enum RuleTarget {
    Fixed(Classification),
    /// Keep the current category and set the type. Only matches records that
    /// already have a category.
    KeepCategory(DocumentType),
}

#[derive(Debug, Clone)]
pub struct TaxonomyRule {
    pub name: String,
    pub matcher: Matcher,
    pub target: RuleTarget,
    pub priority: i32,
}

impl TaxonomyRule {
    pub fn new(name: &str, priority: i32, matcher: Matcher, target: RuleTarget) -> Self {
        Self {
            name: name.to_string(),
            matcher,
            target,
            priority,
        }
    }
}

/// What a rule sees about a path.
#[derive(Debug, Clone, Copy)]
pub struct RuleInput<'a> {
    pub file_path: &'a str,
    pub category: Option<Category>,
    pub document_type: Option<DocumentType>,
}

impl<'a> RuleInput<'a> {
    pub fn path(file_path: &'a str) -> Self {
        Self {
            file_path,
            category: None,
            document_type: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RuleMatch<'r> {
    pub rule: &'r TaxonomyRule,
    pub classification: Classification,
}

/// Ordered, immutable rule table.
#[derive(Debug, Clone)]
pub struct TaxonomyRules {
    rules: Vec<TaxonomyRule>,
}

impl TaxonomyRules {
    pub fn new(mut rules: Vec<TaxonomyRule>) -> Self {
        rules.sort_by_key(|r| r.priority);
        Self { rules }
    }

    /// The built-in rules plus any configured extras.
    pub fn with_config(extra: &[RuleConfig]) -> Result<Self> {
        let mut rules = builtin_rules()?;
        for rc in extra {
            let classification = Classification::parse(&rc.category, &rc.document_type)
                .with_context(|| format!("Invalid classification in rule '{}'", rc.name))?;
            rules.push(TaxonomyRule::new(
                &rc.name,
                rc.priority,
                Matcher::glob(&rc.glob)?,
                RuleTarget::Fixed(classification),
            ));
        }
        Ok(Self::new(rules))
    }

    pub fn standard() -> Result<Self> {
        Ok(Self::new(builtin_rules()?))
    }

    pub fn rules(&self) -> &[TaxonomyRule] {
        &self.rules
    }

    /// First rule, in priority order, that matches and yields an allowed
    /// classification.
    pub fn find(&self, input: &RuleInput<'_>) -> Option<RuleMatch<'_>> {
        self.rules.iter().find_map(|rule| {
            if !rule.matcher.is_match(input) {
                return None;
            }
            let classification = match rule.target {
                RuleTarget::Fixed(c) => c,
                RuleTarget::KeepCategory(t) => Classification::new(input.category?, t).ok()?,
            };
            Some(RuleMatch {
                rule,
                classification,
            })
        })
    }

    /// Path-only lookup.
    pub fn match_path(&self, file_path: &str) -> Option<Classification> {
        self.find(&RuleInput::path(file_path))
            .map(|m| m.classification)
    }
}

fn fixed(category: Category, document_type: DocumentType) -> Result<RuleTarget> {
    Ok(RuleTarget::Fixed(Classification::new(category, document_type)?))
}

fn builtin_rules() -> Result<Vec<TaxonomyRule>> {
    use Category::*;
    use DocumentType::*;

    let status = fixed(Communication, StatusReport)?;
    Ok(vec![
        TaxonomyRule::new(
            "work-item-completion",
            10,
            Matcher::glob("*/architecture/specification/WI-*COMPLETION*")?,
            status,
        ),
        TaxonomyRule::new(
            "work-item-audit",
            11,
            Matcher::glob("*/architecture/specification/WI-*AUDIT*")?,
            status,
        ),
        TaxonomyRule::new(
            "work-item-summary",
            12,
            Matcher::glob("*/architecture/specification/WI-*SUMMARY*")?,
            status,
        ),
        TaxonomyRule::new(
            "implementation-plan",
            20,
            Matcher::glob("*/architecture/implementation_plan/PLAN-*.md")?,
            fixed(Planning, ProjectPlan)?,
        ),
        TaxonomyRule::new(
            "testing-report",
            30,
            Matcher::glob("*/testing/other/*REPORT*.md")?,
            fixed(Testing, TestReport)?,
        ),
        TaxonomyRule::new(
            "other-session-summary",
            40,
            Matcher::type_with_markers(Other, &["SESSION-SUMMARY"]),
            RuleTarget::KeepCategory(StatusReport),
        ),
        TaxonomyRule::new(
            "other-audit",
            41,
            Matcher::type_with_markers(Other, &["AUDIT"]),
            RuleTarget::KeepCategory(StatusReport),
        ),
        TaxonomyRule::new(
            "other-summary",
            42,
            Matcher::type_with_markers(Other, &["SUMMARY"]),
            RuleTarget::KeepCategory(StatusReport),
        ),
        TaxonomyRule::new(
            "other-report",
            43,
            Matcher::type_with_markers(Other, &["REPORT"]),
            RuleTarget::KeepCategory(StatusReport),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input<'a>(path: &'a str, c: Category, t: DocumentType) -> RuleInput<'a> {
        RuleInput {
            file_path: path,
            category: Some(c),
            document_type: Some(t),
        }
    }

    #[test]
    fn test_work_item_completion_rule() {
        let rules = TaxonomyRules::standard().unwrap();
        let c = rules
            .match_path("docs/architecture/specification/WI-42-COMPLETION.md")
            .unwrap();
        assert_eq!(c.category(), Category::Communication);
        assert_eq!(c.document_type(), DocumentType::StatusReport);
    }

    #[test]
    fn test_plan_rule() {
        let rules = TaxonomyRules::standard().unwrap();
        let c = rules
            .match_path("docs/architecture/implementation_plan/PLAN-7-rollout.md")
            .unwrap();
        assert_eq!(c.category(), Category::Planning);
        assert_eq!(c.document_type(), DocumentType::ProjectPlan);
    }

    #[test]
    fn test_no_match_returns_none() {
        let rules = TaxonomyRules::standard().unwrap();
        assert!(rules.match_path("docs/guides/user_guide/intro.md").is_none());
    }

    #[test]
    fn test_testing_report_beats_other_report() {
        let rules = TaxonomyRules::standard().unwrap();
        let m = rules
            .find(&input(
                "docs/testing/other/LOAD-REPORT.md",
                Category::Testing,
                DocumentType::Other,
            ))
            .unwrap();
        assert_eq!(m.rule.name, "testing-report");
        assert_eq!(m.classification.document_type(), DocumentType::TestReport);
    }

    #[test]
    fn test_other_marker_keeps_category() {
        let rules = TaxonomyRules::standard().unwrap();
        let m = rules
            .find(&input(
                "docs/operations/other/SPRINT-SUMMARY.md",
                Category::Operations,
                DocumentType::Other,
            ))
            .unwrap();
        assert_eq!(m.classification.category(), Category::Operations);
        assert_eq!(m.classification.document_type(), DocumentType::StatusReport);
    }

    #[test]
    fn test_marker_rule_needs_category() {
        let rules = TaxonomyRules::standard().unwrap();
        let m = rules.find(&RuleInput {
            file_path: "notes/AUDIT.md",
            category: None,
            document_type: Some(DocumentType::Other),
        });
        assert!(m.is_none());
    }

    #[test]
    fn test_summary_and_audit_resolved_by_priority() {
        let rules = TaxonomyRules::standard().unwrap();
        let m = rules
            .find(&input(
                "docs/governance/other/AUDIT-SUMMARY.md",
                Category::Governance,
                DocumentType::Other,
            ))
            .unwrap();
        assert_eq!(m.rule.name, "other-audit");
    }

    #[test]
    fn test_lower_priority_number_wins_regardless_of_insertion_order() {
        let plan = Classification::new(Category::Planning, DocumentType::Roadmap).unwrap();
        let guide = Classification::new(Category::Guides, DocumentType::Tutorial).unwrap();
        let rules = TaxonomyRules::new(vec![
            TaxonomyRule::new(
                "late",
                50,
                Matcher::glob("docs/**/*.md").unwrap(),
                RuleTarget::Fixed(guide),
            ),
            TaxonomyRule::new(
                "early",
                5,
                Matcher::glob("docs/*/x/*.md").unwrap(),
                RuleTarget::Fixed(plan),
            ),
        ]);
        assert_eq!(rules.match_path("docs/a/x/file.md"), Some(plan));
        assert_eq!(rules.match_path("docs/a/y/file.md"), Some(guide));
    }

    #[test]
    fn test_configured_rules_are_merged() {
        let extra = vec![RuleConfig {
            name: "runbooks".to_string(),
            glob: "ops/**/*.md".to_string(),
            category: "operations".to_string(),
            document_type: "runbook".to_string(),
            priority: 5,
        }];
        let rules = TaxonomyRules::with_config(&extra).unwrap();
        assert_eq!(rules.rules()[0].name, "runbooks");
        assert_eq!(
            rules.match_path("ops/db/restore.md"),
            Some(Classification::new(Category::Operations, DocumentType::Runbook).unwrap())
        );
    }
}
