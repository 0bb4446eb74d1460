//! Reconcile progress reporting.
//!
//! Emitted on **stderr** so stdout (the plan and report, or their JSON form)
//! stays parseable for scripts.

use std::io::Write;

/// A single progress event for a reconcile pass.
#[derive(Clone, Debug)]
pub enum ApplyProgressEvent {
    /// The plan has been built; `total` operations are about to run.
    Planned { records: u64, files: u64, total: u64 },
    /// Operation `n` of `total` has finished.
    Applying {
        n: u64,
        total: u64,
        op: &'static str,
        file_path: String,
        success: bool,
    },
}

pub trait ApplyProgressReporter: Send + Sync {
    fn report(&self, event: ApplyProgressEvent);
}

/// "reconcile  applying  12 / 1,040 operations  reclassify docs/x.md"
pub struct StderrProgress;

impl ApplyProgressReporter for StderrProgress {
    fn report(&self, event: ApplyProgressEvent) {
        let line = match &event {
            ApplyProgressEvent::Planned {
                records,
                files,
                total,
            } => format!(
                "reconcile  planned  {} operations ({} records, {} files)\n",
                format_number(*total),
                format_number(*records),
                format_number(*files)
            ),
            ApplyProgressEvent::Applying {
                n,
                total,
                op,
                file_path,
                success,
            } => format!(
                "reconcile  applying  {} / {} operations  {} {}{}\n",
                format_number(*n),
                format_number(*total),
                op,
                file_path,
                if *success { "" } else { "  FAILED" }
            ),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// One JSON object per line on stderr.
pub struct JsonProgress;

impl ApplyProgressReporter for JsonProgress {
    fn report(&self, event: ApplyProgressEvent) {
        let obj = match &event {
            ApplyProgressEvent::Planned {
                records,
                files,
                total,
            } => serde_json::json!({
                "event": "progress",
                "phase": "planned",
                "records": records,
                "files": files,
                "total": total
            }),
            ApplyProgressEvent::Applying {
                n,
                total,
                op,
                file_path,
                success,
            } => serde_json::json!({
                "event": "progress",
                "phase": "applying",
                "n": n,
                "total": total,
                "op": op,
                "file_path": file_path,
                "success": success
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

pub struct NoProgress;

impl ApplyProgressReporter for NoProgress {
    fn report(&self, _event: ApplyProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Parse `--progress` (`off`, `human`, `json`); `None` means auto.
    pub fn from_flag(flag: Option<&str>) -> anyhow::Result<Self> {
        match flag {
            None => Ok(Self::default_for_tty()),
            Some("off") => Ok(ProgressMode::Off),
            Some("human") => Ok(ProgressMode::Human),
            Some("json") => Ok(ProgressMode::Json),
            Some(other) => anyhow::bail!(
                "Unknown progress mode: '{}'. Use off, human, or json.",
                other
            ),
        }
    }

    pub fn reporter(&self) -> Box<dyn ApplyProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
