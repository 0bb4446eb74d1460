//! Single-writer lock for applying a reconcile pass.
//!
//! The lock is a file created with `create_new`, so a second process fails
//! immediately instead of racing the first. It is removed when the guard
//! drops. A crashed run leaves the file behind; remove it by hand once no
//! other `doctax` process is running.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{debug, warn};

pub const LOCK_FILE: &str = "reconcile.lock";

#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    pub fn acquire(tool_dir: &Path) -> Result<Self> {
        fs::create_dir_all(tool_dir)
            .with_context(|| format!("Failed to create tool directory: {}", tool_dir.display()))?;
        let path = tool_dir.join(LOCK_FILE);

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                bail!(
                    "another reconcile run holds {} (remove it if no run is active)",
                    path.display()
                );
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to create lock {}", path.display()))
            }
        };
        writeln!(file, "pid={}", std::process::id())
            .with_context(|| format!("Failed to write lock {}", path.display()))?;

        debug!(lock = %path.display(), "acquired run lock");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(lock = %self.path.display(), error = %e, "failed to release run lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_acquire_fails_until_release() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join(".doctax");

        let first = RunLock::acquire(&dir).unwrap();
        assert!(first.path().exists());
        let err = RunLock::acquire(&dir).unwrap_err();
        assert!(err.to_string().contains("another reconcile run"));

        drop(first);
        assert!(!dir.join(LOCK_FILE).exists());
        assert!(RunLock::acquire(&dir).is_ok());
    }
}
