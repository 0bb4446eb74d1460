//! Core data models used throughout doctax.
//!
//! The taxonomy is closed: [`Category`] and [`DocumentType`] are enums, and a
//! [`Classification`] can only be built from a pair the taxonomy allows.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TaxonomyError;

/// Top-level taxonomy bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Architecture,
    Communication,
    Guides,
    Operations,
    Planning,
    Testing,
    Governance,
    Processes,
    Reference,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Architecture,
        Category::Communication,
        Category::Guides,
        Category::Operations,
        Category::Planning,
        Category::Testing,
        Category::Governance,
        Category::Processes,
        Category::Reference,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Architecture => "architecture",
            Category::Communication => "communication",
            Category::Guides => "guides",
            Category::Operations => "operations",
            Category::Planning => "planning",
            Category::Testing => "testing",
            Category::Governance => "governance",
            Category::Processes => "processes",
            Category::Reference => "reference",
        }
    }

    /// Category-specific document types. [`DocumentType::Other`] and
    /// [`DocumentType::StatusReport`] are accepted everywhere in addition.
    pub fn document_types(&self) -> &'static [DocumentType] {
        use DocumentType::*;
        match self {
            Category::Architecture => &[
                ArchitectureDoc,
                DesignDoc,
                Adr,
                Specification,
                ImplementationPlan,
            ],
            Category::Communication => &[MeetingNotes, Announcement, StakeholderUpdate],
            Category::Guides => &[UserGuide, DeveloperGuide, Tutorial, Runbook, Troubleshooting],
            Category::Operations => &[Runbook, DeploymentGuide, IncidentReport, Monitoring],
            Category::Planning => &[ProjectPlan, Roadmap, Requirements, UserStory],
            Category::Testing => &[TestPlan, TestReport, TestCase],
            Category::Governance => &[Policy, Standard, ComplianceReport],
            Category::Processes => &[Workflow, Checklist, Procedure],
            Category::Reference => &[ApiDoc, Glossary, Changelog, Readme],
        }
    }

    pub fn allows(&self, document_type: DocumentType) -> bool {
        document_type.is_universal() || self.document_types().contains(&document_type)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = TaxonomyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| TaxonomyError::UnknownCategory(s.to_string()))
    }
}

/// Second-level taxonomy bucket, scoped by [`Category::allows`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Other,
    StatusReport,
    ArchitectureDoc,
    DesignDoc,
    Adr,
    Specification,
    ImplementationPlan,
    MeetingNotes,
    Announcement,
    StakeholderUpdate,
    UserGuide,
    DeveloperGuide,
    Tutorial,
    Runbook,
    Troubleshooting,
    DeploymentGuide,
    IncidentReport,
    Monitoring,
    ProjectPlan,
    Roadmap,
    Requirements,
    UserStory,
    TestPlan,
    TestReport,
    TestCase,
    Policy,
    Standard,
    ComplianceReport,
    Workflow,
    Checklist,
    Procedure,
    ApiDoc,
    Glossary,
    Changelog,
    Readme,
}

impl DocumentType {
    pub const ALL: [DocumentType; 35] = [
        DocumentType::Other,
        DocumentType::StatusReport,
        DocumentType::ArchitectureDoc,
        DocumentType::DesignDoc,
        DocumentType::Adr,
        DocumentType::Specification,
        DocumentType::ImplementationPlan,
        DocumentType::MeetingNotes,
        DocumentType::Announcement,
        DocumentType::StakeholderUpdate,
        DocumentType::UserGuide,
        DocumentType::DeveloperGuide,
        DocumentType::Tutorial,
        DocumentType::Runbook,
        DocumentType::Troubleshooting,
        DocumentType::DeploymentGuide,
        DocumentType::IncidentReport,
        DocumentType::Monitoring,
        DocumentType::ProjectPlan,
        DocumentType::Roadmap,
        DocumentType::Requirements,
        DocumentType::UserStory,
        DocumentType::TestPlan,
        DocumentType::TestReport,
        DocumentType::TestCase,
        DocumentType::Policy,
        DocumentType::Standard,
        DocumentType::ComplianceReport,
        DocumentType::Workflow,
        DocumentType::Checklist,
        DocumentType::Procedure,
        DocumentType::ApiDoc,
        DocumentType::Glossary,
        DocumentType::Changelog,
        DocumentType::Readme,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Other => "other",
            DocumentType::StatusReport => "status_report",
            DocumentType::ArchitectureDoc => "architecture_doc",
            DocumentType::DesignDoc => "design_doc",
            DocumentType::Adr => "adr",
            DocumentType::Specification => "specification",
            DocumentType::ImplementationPlan => "implementation_plan",
            DocumentType::MeetingNotes => "meeting_notes",
            DocumentType::Announcement => "announcement",
            DocumentType::StakeholderUpdate => "stakeholder_update",
            DocumentType::UserGuide => "user_guide",
            DocumentType::DeveloperGuide => "developer_guide",
            DocumentType::Tutorial => "tutorial",
            DocumentType::Runbook => "runbook",
            DocumentType::Troubleshooting => "troubleshooting",
            DocumentType::DeploymentGuide => "deployment_guide",
            DocumentType::IncidentReport => "incident_report",
            DocumentType::Monitoring => "monitoring",
            DocumentType::ProjectPlan => "project_plan",
            DocumentType::Roadmap => "roadmap",
            DocumentType::Requirements => "requirements",
            DocumentType::UserStory => "user_story",
            DocumentType::TestPlan => "test_plan",
            DocumentType::TestReport => "test_report",
            DocumentType::TestCase => "test_case",
            DocumentType::Policy => "policy",
            DocumentType::Standard => "standard",
            DocumentType::ComplianceReport => "compliance_report",
            DocumentType::Workflow => "workflow",
            DocumentType::Checklist => "checklist",
            DocumentType::Procedure => "procedure",
            DocumentType::ApiDoc => "api_doc",
            DocumentType::Glossary => "glossary",
            DocumentType::Changelog => "changelog",
            DocumentType::Readme => "readme",
        }
    }

    /// Types every category accepts.
    pub fn is_universal(&self) -> bool {
        matches!(self, DocumentType::Other | DocumentType::StatusReport)
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = TaxonomyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DocumentType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| TaxonomyError::UnknownDocumentType(s.to_string()))
    }
}

/// A (category, document type) pair that the taxonomy allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Classification {
    category: Category,
    document_type: DocumentType,
}

impl Classification {
    pub fn new(category: Category, document_type: DocumentType) -> Result<Self, TaxonomyError> {
        if !category.allows(document_type) {
            return Err(TaxonomyError::NotAllowed {
                category,
                document_type,
            });
        }
        Ok(Self {
            category,
            document_type,
        })
    }

    /// Parse a pair of stored names.
    pub fn parse(category: &str, document_type: &str) -> Result<Self, TaxonomyError> {
        Self::new(category.parse()?, document_type.parse()?)
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn document_type(&self) -> DocumentType {
        self.document_type
    }

    /// `docs/{category}/{document_type}/{filename}`
    pub fn canonical_path(&self, filename: &str) -> String {
        format!("docs/{}/{}/{}", self.category, self.document_type, filename)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.document_type)
    }
}

/// Kind of domain object that owns a document. Lookup only, never ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Project,
    WorkItem,
    Task,
    Idea,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Project => "project",
            EntityType::WorkItem => "work_item",
            EntityType::Task => "task",
            EntityType::Idea => "idea",
        }
    }
}

impl FromStr for EntityType {
    type Err = TaxonomyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "project" => Ok(EntityType::Project),
            "work_item" => Ok(EntityType::WorkItem),
            "task" => Ok(EntityType::Task),
            "idea" => Ok(EntityType::Idea),
            other => Err(TaxonomyError::UnknownEntityType(other.to_string())),
        }
    }
}

/// A tracked documentation file, as stored in `document_references`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentReference {
    pub id: i64,
    pub file_path: String,
    pub category: Option<Category>,
    pub document_type: Option<DocumentType>,
    pub entity_type: Option<EntityType>,
    pub entity_id: Option<i64>,
    pub content_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentReference {
    /// The stored pair, when both halves are present and allowed together.
    pub fn classification(&self) -> Option<Classification> {
        match (self.category, self.document_type) {
            (Some(c), Some(t)) => Classification::new(c, t).ok(),
            _ => None,
        }
    }

    pub fn filename(&self) -> &str {
        file_name(&self.file_path)
    }
}

/// Fields for a record that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDocumentReference {
    pub file_path: String,
    pub classification: Classification,
    pub entity_type: Option<EntityType>,
    pub entity_id: Option<i64>,
    pub content_hash: Option<String>,
}

/// Fields changed by a reclassification or content refresh. `updated_at` is
/// always refreshed by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordUpdate {
    pub file_path: String,
    pub classification: Option<Classification>,
    pub content_hash: Option<String>,
}

/// A documentation file seen by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedFile {
    pub path: String,
    pub content_hash: Option<String>,
}

impl ObservedFile {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content_hash: None,
        }
    }

    pub fn with_hash(path: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content_hash: Some(hash.into()),
        }
    }
}

/// Last `/`-delimited segment of a relative path.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trips_through_str() {
        for c in Category::ALL {
            assert_eq!(c.as_str().parse::<Category>().unwrap(), c);
        }
        assert!("misc".parse::<Category>().is_err());
    }

    #[test]
    fn test_document_type_names_are_unique() {
        let mut names: Vec<&str> = DocumentType::ALL.iter().map(|t| t.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), DocumentType::ALL.len());
    }

    #[test]
    fn test_universal_types_allowed_everywhere() {
        for c in Category::ALL {
            assert!(c.allows(DocumentType::Other));
            assert!(c.allows(DocumentType::StatusReport));
        }
    }

    #[test]
    fn test_classification_rejects_foreign_type() {
        let err = Classification::new(Category::Testing, DocumentType::Runbook).unwrap_err();
        assert!(matches!(err, TaxonomyError::NotAllowed { .. }));
        assert!(Classification::new(Category::Operations, DocumentType::Runbook).is_ok());
    }

    #[test]
    fn test_canonical_path() {
        let c = Classification::parse("communication", "status_report").unwrap();
        assert_eq!(
            c.canonical_path("WI-42-COMPLETION.md"),
            "docs/communication/status_report/WI-42-COMPLETION.md"
        );
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("docs/a/b/c.md"), "c.md");
        assert_eq!(file_name("README.md"), "README.md");
    }
}
