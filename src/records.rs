//! `doctax list` and `doctax summary`.

use anyhow::Result;

use crate::config::Config;
use crate::models::{Category, DocumentReference};
use crate::report::{write_summary, ComplianceSummary};
use crate::sqlite_store::SqliteStore;
use crate::store::DocumentStore;
use crate::validate::PathValidator;

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

fn filter_by_category(
    records: Vec<DocumentReference>,
    category: Option<Category>,
) -> Vec<DocumentReference> {
    match category {
        Some(c) => records
            .into_iter()
            .filter(|r| r.category == Some(c))
            .collect(),
        None => records,
    }
}

pub async fn run_list(config: &Config, category: Option<Category>) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let records = filter_by_category(store.list_records().await?, category);
    store.close().await;

    if records.is_empty() {
        println!("No documents.");
        return Ok(());
    }

    println!(
        "{:<6} {:<14} {:<20} {}",
        "ID", "CATEGORY", "TYPE", "PATH"
    );
    for r in &records {
        println!(
            "{:<6} {:<14} {:<20} {}",
            r.id,
            or_dash(r.category),
            or_dash(r.document_type),
            r.file_path
        );
    }
    println!();
    println!("{} documents", records.len());
    Ok(())
}

pub async fn run_summary(config: &Config, json: bool) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let records = store.list_records().await?;
    store.close().await;

    let validator = PathValidator::new(&config.project.root, &config.classify);
    let summary = ComplianceSummary::compute(&records, &validator);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        write_summary(&mut std::io::stdout().lock(), &summary)?;
    }
    Ok(())
}
