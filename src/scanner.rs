//! Filesystem scanner.
//!
//! Walks the project root and returns the files that are candidates for
//! tracking, as relative `/`-separated paths with their content hashes.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::debug;
use walkdir::WalkDir;

use crate::config::Config;
use crate::hashing::sha256_file;
use crate::models::ObservedFile;

pub fn scan_project(config: &Config) -> Result<Vec<ObservedFile>> {
    let root = &config.project.root;
    if !root.exists() {
        bail!("Project root does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.scan.include_globs)?;

    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
        format!("{}/**", config.project.tool_dir.to_string_lossy()),
    ];
    default_excludes.extend(config.scan.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut files = Vec::new();

    let walker = WalkDir::new(root).follow_links(config.scan.follow_symlinks);
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        // Apply exclude patterns
        if exclude_set.is_match(&rel_str) {
            continue;
        }

        // Apply include patterns
        if !include_set.is_match(&rel_str) {
            continue;
        }

        let hash = sha256_file(path)
            .with_context(|| format!("Failed to hash {}", path.display()))?;
        files.push(ObservedFile::with_hash(rel_str, hash));
    }

    // Sort for deterministic ordering
    files.sort_by(|a, b| a.path.cmp(&b.path));
    debug!(count = files.len(), root = %root.display(), "scan complete");

    Ok(files)
}

/// CLI entry point: print every observed file.
pub fn run_scan(config: &Config) -> Result<()> {
    let files = scan_project(config)?;
    for file in &files {
        println!("{}", file.path);
    }
    eprintln!("{} files under {}", files.len(), config.project.root.display());
    Ok(())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
