use anyhow::{bail, Context, Result};
use globset::Glob;
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};

use crate::models::Classification;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub project: ProjectConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub classify: ClassifyConfig,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProjectConfig {
    pub root: PathBuf,
    /// Relative to `root`. Holds backups and the reconcile lock.
    #[serde(default = "default_tool_dir")]
    pub tool_dir: PathBuf,
}

fn default_tool_dir() -> PathBuf {
    PathBuf::from(".doctax")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScanConfig {
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClassifyConfig {
    /// Exact file names that are never documentation.
    #[serde(default = "default_denylist")]
    pub denylist: Vec<String>,
    /// Root-level files allowed outside `docs/`.
    #[serde(default = "default_legacy_root_files")]
    pub legacy_root_files: Vec<String>,
    /// Extensions (without the dot) of source and template files.
    #[serde(default = "default_non_document_extensions")]
    pub non_document_extensions: Vec<String>,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            denylist: default_denylist(),
            legacy_root_files: default_legacy_root_files(),
            non_document_extensions: default_non_document_extensions(),
        }
    }
}

fn default_denylist() -> Vec<String> {
    vec!["bad.md".to_string()]
}
fn default_legacy_root_files() -> Vec<String> {
    vec![
        "CHANGELOG.md".to_string(),
        "README.md".to_string(),
        "LICENSE.md".to_string(),
    ]
}
fn default_non_document_extensions() -> Vec<String> {
    vec!["py".to_string(), "j2".to_string()]
}

/// An extra path rule appended to the built-in taxonomy rules.
#[derive(Debug, Deserialize, Clone)]
pub struct RuleConfig {
    pub name: String,
    pub glob: String,
    pub category: String,
    pub document_type: String,
    #[serde(default = "default_rule_priority")]
    pub priority: i32,
}

fn default_rule_priority() -> i32 {
    100
}

impl Config {
    /// Defaults for a project rooted at `root`, with the database under the
    /// tool directory.
    pub fn for_root(root: &Path) -> Self {
        let tool_dir = default_tool_dir();
        Self {
            db: DbConfig {
                path: root.join(&tool_dir).join("doctax.sqlite"),
            },
            project: ProjectConfig {
                root: root.to_path_buf(),
                tool_dir,
            },
            scan: ScanConfig::default(),
            classify: ClassifyConfig::default(),
            rules: Vec::new(),
        }
    }

    /// Absolute location of the tool directory.
    pub fn tool_dir(&self) -> PathBuf {
        self.project.root.join(&self.project.tool_dir)
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.tool_dir().join("backups").join("document-migration")
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &Config) -> Result<()> {
    // Validate scan
    if config.scan.include_globs.is_empty() {
        bail!("scan.include_globs must not be empty");
    }
    for pattern in config
        .scan
        .include_globs
        .iter()
        .chain(config.scan.exclude_globs.iter())
    {
        Glob::new(pattern).with_context(|| format!("Invalid scan glob: '{}'", pattern))?;
    }

    // Validate project
    let tool_dir = &config.project.tool_dir;
    if tool_dir.as_os_str().is_empty()
        || tool_dir.is_absolute()
        || tool_dir.components().any(|c| matches!(c, Component::ParentDir))
    {
        bail!(
            "project.tool_dir must be a relative path inside the project root, got '{}'",
            tool_dir.display()
        );
    }

    // Validate classify
    for ext in &config.classify.non_document_extensions {
        if ext.is_empty() || ext.starts_with('.') {
            bail!(
                "classify.non_document_extensions entries must be bare extensions, got '{}'",
                ext
            );
        }
    }

    // Validate rules
    for rule in &config.rules {
        Glob::new(&rule.glob)
            .with_context(|| format!("Invalid glob in rule '{}': '{}'", rule.name, rule.glob))?;
        Classification::parse(&rule.category, &rule.document_type)
            .with_context(|| format!("Invalid classification in rule '{}'", rule.name))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        validate_config(&config)?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse(
            r#"
            [db]
            path = "./data/doctax.sqlite"

            [project]
            root = "."
            "#,
        )
        .unwrap();
        assert_eq!(config.project.tool_dir, PathBuf::from(".doctax"));
        assert_eq!(config.scan.include_globs, vec!["**/*.md"]);
        assert_eq!(config.classify.denylist, vec!["bad.md"]);
        assert_eq!(config.classify.non_document_extensions, vec!["py", "j2"]);
        assert!(config.rules.is_empty());
    }

    #[test]
    fn test_rule_with_foreign_type_rejected() {
        let err = parse(
            r#"
            [db]
            path = "x.sqlite"

            [project]
            root = "."

            [[rules]]
            name = "bad"
            glob = "*/ops/*.md"
            category = "testing"
            document_type = "runbook"
            "#,
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("not allowed"));
    }

    #[test]
    fn test_tool_dir_must_stay_inside_root() {
        let err = parse(
            r#"
            [db]
            path = "x.sqlite"

            [project]
            root = "."
            tool_dir = "../elsewhere"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("tool_dir"));
    }

    #[test]
    fn test_backup_dir_layout() {
        let config = Config::for_root(Path::new("/srv/project"));
        assert_eq!(
            config.backup_dir(),
            PathBuf::from("/srv/project/.doctax/backups/document-migration")
        );
    }
}
