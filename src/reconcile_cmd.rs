//! `doctax reconcile`: plan, and optionally apply, a full pass.
//!
//! [`run_pass`] is the library entry point; [`run_reconcile`] wraps it with
//! the single-writer lock, rendering and the `--strict` exit status.

use std::io::Write;

use anyhow::{Context, Result};
use tracing::info;

use crate::apply::{apply_plan, ApplyOptions, ApplyReport};
use crate::classify::PathClassifier;
use crate::config::Config;
use crate::executor::MigrationExecutor;
use crate::lock::RunLock;
use crate::progress::{ApplyProgressEvent, ApplyProgressReporter, ProgressMode};
use crate::reconcile::{Plan, ReconciliationEngine};
use crate::report::{self, ComplianceSummary, ReconcileOutput};
use crate::scanner::scan_project;
use crate::sqlite_store::SqliteStore;
use crate::store::DocumentStore;
use crate::taxonomy::TaxonomyRules;
use crate::validate::PathValidator;

#[derive(Debug)]
pub struct PassResult {
    pub plan: Plan,
    /// Present only when the pass was applied.
    pub outcomes: Option<ApplyReport>,
    /// Computed from the records as they stand after the pass.
    pub summary: ComplianceSummary,
}

/// Plan a pass over `store` and, when `apply` is set, execute it.
pub async fn run_pass(
    config: &Config,
    store: &dyn DocumentStore,
    apply: Option<&ApplyOptions>,
    progress: &dyn ApplyProgressReporter,
) -> Result<PassResult> {
    let rules = TaxonomyRules::with_config(&config.rules)?;
    let classifier = PathClassifier::new(&rules, &config.classify);
    let validator = PathValidator::new(&config.project.root, &config.classify);

    let records = store.list_records().await?;
    let observed = scan_project(config)?;
    let mut plan = ReconciliationEngine::new(&classifier, &validator).plan(&records, &observed);
    info!(
        records = records.len(),
        files = observed.len(),
        operations = plan.operations.len(),
        duplicates = plan.duplicates.len(),
        rejected = plan.rejected.len(),
        "reconcile plan built"
    );
    progress.report(ApplyProgressEvent::Planned {
        records: records.len() as u64,
        files: observed.len() as u64,
        total: plan.operations.len() as u64,
    });

    let outcomes = match apply {
        Some(options) => {
            let executor = MigrationExecutor::new(store, &validator, config)
                .with_delete_files(options.delete_files);
            Some(apply_plan(&mut plan, &executor, options, progress).await)
        }
        None => None,
    };

    let records = if outcomes.is_some() {
        store.list_records().await?
    } else {
        records
    };
    let summary = ComplianceSummary::compute(&records, &validator);

    Ok(PassResult {
        plan,
        outcomes,
        summary,
    })
}

#[derive(Debug, Clone, Copy)]
pub struct ReconcileArgs {
    pub apply: bool,
    pub options: ApplyOptions,
    pub strict: bool,
    pub json: bool,
    pub progress: ProgressMode,
}

/// Returns `false` when `--strict` was given and the pass left rejected,
/// failed or duplicate records behind.
pub async fn run_reconcile(config: &Config, args: &ReconcileArgs) -> Result<bool> {
    let store = SqliteStore::open(config).await?;
    let reporter = args.progress.reporter();

    let result = if args.apply {
        let _lock = RunLock::acquire(&config.tool_dir())?;
        run_pass(config, &store, Some(&args.options), reporter.as_ref()).await?
    } else {
        run_pass(config, &store, None, reporter.as_ref()).await?
    };
    store.close().await;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if args.json {
        let output = ReconcileOutput {
            applied: args.apply,
            plan: &result.plan,
            outcomes: result.outcomes.as_ref(),
            summary: &result.summary,
        };
        serde_json::to_writer_pretty(&mut out, &output)?;
        writeln!(out)?;
    } else {
        if !args.apply {
            writeln!(out, "Dry run. Pass --apply to execute.")?;
            writeln!(out)?;
        }
        report::write_plan(&mut out, &result.plan)?;
        if let Some(outcomes) = &result.outcomes {
            writeln!(out)?;
            report::write_outcomes(&mut out, outcomes)?;
        }
        writeln!(out)?;
        report::write_summary(&mut out, &result.summary)?;
    }
    out.flush().context("Failed to write report")?;

    Ok(!(args.strict && report::has_failures(&result.plan, result.outcomes.as_ref())))
}
