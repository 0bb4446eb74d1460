//! Structural and security checks for document paths.
//!
//! Every add or move must pass [`PathValidator::validate`] before the
//! filesystem is touched. All violations are collected so the caller can
//! show every problem at once.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use anyhow::Result;
use serde::Serialize;

use crate::config::{ClassifyConfig, Config};
use crate::error::ValidationError;
use crate::models::DocumentReference;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum Violation {
    Empty,
    Traversal,
    Absolute,
    Structure,
    EscapesRoot,
    MissingCategory,
    MissingDocumentType,
}

impl Violation {
    /// Violations that make a path unsafe to touch at all, as opposed to
    /// merely misplaced.
    pub fn is_security(&self) -> bool {
        matches!(
            self,
            Violation::Traversal | Violation::Absolute | Violation::EscapesRoot
        )
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Violation::Empty => "path is empty",
            Violation::Traversal => "path contains directory traversal",
            Violation::Absolute => "path must be relative",
            Violation::Structure => {
                "path must follow docs/{category}/{document_type}/{filename} or be an allowed root file"
            }
            Violation::EscapesRoot => "path resolves outside the project root",
            Violation::MissingCategory => "record has no category",
            Violation::MissingDocumentType => "record has no document type",
        })
    }
}

impl From<Violation> for String {
    fn from(v: Violation) -> Self {
        v.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub violations: Vec<Violation>,
}

impl ValidationResult {
    fn from_violations(violations: Vec<Violation>) -> Self {
        Self {
            valid: violations.is_empty(),
            violations,
        }
    }

    pub fn has_security_violation(&self) -> bool {
        self.violations.iter().any(Violation::is_security)
    }

    pub fn messages(&self) -> Vec<String> {
        self.violations.iter().map(|v| v.to_string()).collect()
    }

    pub fn into_error(self, file_path: &str) -> Option<ValidationError> {
        if self.valid {
            return None;
        }
        Some(ValidationError {
            file_path: file_path.to_string(),
            violations: self.messages(),
        })
    }
}

pub struct PathValidator {
    root: PathBuf,
    legacy_root_files: Vec<String>,
}

impl PathValidator {
    pub fn new(root: &Path, config: &ClassifyConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            legacy_root_files: config.legacy_root_files.clone(),
        }
    }

    pub fn validate(&self, file_path: &str) -> ValidationResult {
        if file_path.is_empty() {
            return ValidationResult::from_violations(vec![Violation::Empty]);
        }

        let mut violations = Vec::new();

        if file_path.split(|c: char| c == '/' || c == '\\').any(|seg| seg == "..") {
            violations.push(Violation::Traversal);
        }

        if is_absolute(file_path) {
            violations.push(Violation::Absolute);
        }

        if !self.is_well_formed(file_path) {
            violations.push(Violation::Structure);
        }

        if !self.stays_within_root(file_path) {
            violations.push(Violation::EscapesRoot);
        }

        ValidationResult::from_violations(violations)
    }

    /// Path checks plus the record's own membership invariants.
    pub fn validate_record(&self, record: &DocumentReference) -> ValidationResult {
        let mut result = self.validate(&record.file_path);
        if record.category.is_none() {
            result.violations.push(Violation::MissingCategory);
        }
        if record.document_type.is_none() {
            result.violations.push(Violation::MissingDocumentType);
        }
        result.valid = result.violations.is_empty();
        result
    }

    /// Fails with every violation, for callers that must stop on an invalid path.
    pub fn ensure_valid(&self, file_path: &str) -> Result<(), ValidationError> {
        match self.validate(file_path).into_error(file_path) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// `docs/` paths need at least four segments; otherwise only bare root
    /// markdown files and the listed legacy files are accepted.
    pub fn is_well_formed(&self, file_path: &str) -> bool {
        if let Some(rest) = file_path.strip_prefix("docs/") {
            let segments: Vec<&str> = rest.split('/').collect();
            return segments.len() >= 3 && segments.iter().all(|s| !s.is_empty());
        }
        if file_path.contains('/') {
            return false;
        }
        file_path.ends_with(".md") || self.legacy_root_files.iter().any(|f| f == file_path)
    }

    pub fn is_legacy_exception(&self, file_path: &str) -> bool {
        !file_path.starts_with("docs/") && self.is_well_formed(file_path)
    }

    fn stays_within_root(&self, file_path: &str) -> bool {
        let mut depth: i64 = 0;
        for component in Path::new(file_path).components() {
            match component {
                Component::Normal(_) => depth += 1,
                Component::CurDir => {}
                Component::ParentDir => {
                    depth -= 1;
                    if depth < 0 {
                        return false;
                    }
                }
                Component::RootDir | Component::Prefix(_) => return false,
            }
        }

        // Symlinks can still point out of the tree; check existing paths.
        let joined = self.root.join(file_path);
        if joined.exists() {
            let (Ok(canonical), Ok(canonical_root)) =
                (joined.canonicalize(), self.root.canonicalize())
            else {
                return false;
            };
            return canonical.starts_with(canonical_root);
        }
        true
    }
}

/// CLI entry point. Returns whether the path is valid.
pub fn run_validate(config: &Config, file_path: &str, json: bool) -> Result<bool> {
    let result = PathValidator::new(&config.project.root, &config.classify).validate(file_path);
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if result.valid {
        println!("valid: {}", file_path);
    } else {
        println!("invalid: {}", file_path);
        for message in result.messages() {
            println!("  - {}", message);
        }
    }
    Ok(result.valid)
}

fn is_absolute(file_path: &str) -> bool {
    if file_path.starts_with('/') || file_path.starts_with('\\') {
        return true;
    }
    let bytes = file_path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
