//! # doctax
//!
//! Keeps a project's document registry consistent with a fixed taxonomy.
//!
//! Every tracked document belongs at `docs/{category}/{document_type}/{file}`.
//! Records drift: files get renamed by hand, sessions write summaries into the
//! wrong directory, templates and scripts get registered as documents. A
//! reconcile pass classifies every record, validates its target path, and
//! moves files into place with hash verification and rollback.
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌───────────┐   ┌──────────┐
//! │ records  │──▶│ classifier │──▶│ validator │──▶│   plan   │
//! │ + scan   │   │  (rules)   │   │  (paths)  │   │ (ordered)│
//! └──────────┘   └────────────┘   └───────────┘   └────┬─────┘
//!                                                      ▼
//!                                              ┌──────────────┐
//!                                              │   executor   │
//!                                              │ move+verify  │
//!                                              └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! doctax init
//! doctax reconcile                    # dry run
//! doctax reconcile --apply --confirm-deletes
//! doctax summary
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Taxonomy and record types |
//! | [`error`] | Per-record error types |
//! | [`taxonomy`] | Ordered classification rules |
//! | [`classify`] | Path classifier |
//! | [`validate`] | Path validator |
//! | [`scanner`] | Filesystem scanner |
//! | [`reconcile`] | Reconciliation planning |
//! | [`executor`] | Single-operation execution with rollback |
//! | [`apply`] | Batch application of a plan |
//! | [`report`] | Compliance summary and rendering |
//! | [`store`] | Storage trait and in-memory store |
//! | [`sqlite_store`] | SQLite store |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod apply;
pub mod classify;
pub mod config;
pub mod db;
pub mod error;
pub mod executor;
pub mod hashing;
pub mod lock;
pub mod migrate;
pub mod models;
pub mod progress;
pub mod reconcile;
pub mod reconcile_cmd;
pub mod records;
pub mod register;
pub mod report;
pub mod scanner;
pub mod sqlite_store;
pub mod store;
pub mod taxonomy;
pub mod validate;
