//! # doctax CLI
//!
//! ## Usage
//!
//! ```bash
//! doctax --config ./config/doctax.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `doctax init` | Create the SQLite database and schema |
//! | `doctax scan` | List the document files the scanner sees |
//! | `doctax classify <path>` | Show how a path would be classified |
//! | `doctax validate <path>` | Check a path against the layout and security rules |
//! | `doctax add <path>` | Register a document |
//! | `doctax list` | List registered documents |
//! | `doctax summary` | Compliance summary |
//! | `doctax reconcile` | Plan (and with `--apply`, execute) a reconcile pass |
//!
//! ## Exit status
//!
//! `validate` exits 1 for an invalid path. `reconcile --strict` exits 2 when
//! any record was rejected or failed, or duplicate paths were found.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use doctax::apply::ApplyOptions;
use doctax::models::{Category, DocumentType, EntityType};
use doctax::progress::ProgressMode;
use doctax::reconcile_cmd::{run_reconcile, ReconcileArgs};
use doctax::register::{run_add, AddRequest};
use doctax::{classify, config, migrate, records, scanner, validate};

/// doctax keeps a document registry aligned with the
/// `docs/{category}/{document_type}/` taxonomy.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/doctax.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "doctax",
    about = "Classify, validate and migrate project documents into a fixed taxonomy",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/doctax.toml")]
    config: PathBuf,

    /// Log at debug level (RUST_LOG overrides).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent: running it multiple times is safe.
    Init,

    /// List the files the scanner observes under the project root.
    Scan,

    /// Show the classifier verdict for a path.
    Classify {
        path: String,

        /// Current category, if the path is already registered.
        #[arg(long)]
        category: Option<Category>,

        /// Current document type.
        #[arg(long = "type")]
        document_type: Option<DocumentType>,

        #[arg(long)]
        json: bool,
    },

    /// Validate a path. Exits 1 when invalid.
    Validate {
        path: String,

        #[arg(long)]
        json: bool,
    },

    /// Register a document.
    ///
    /// The path must be valid and exist on disk. Classification is inferred
    /// from the path unless given.
    Add {
        path: String,

        #[arg(long)]
        category: Option<Category>,

        #[arg(long = "type")]
        document_type: Option<DocumentType>,

        /// Owning entity kind (project, work_item, task, idea).
        #[arg(long)]
        entity_type: Option<EntityType>,

        #[arg(long, requires = "entity_type")]
        entity_id: Option<i64>,
    },

    /// List registered documents.
    List {
        /// Only show this category.
        #[arg(long)]
        category: Option<Category>,
    },

    /// Print the compliance summary.
    Summary {
        #[arg(long)]
        json: bool,
    },

    /// Reconcile records with the taxonomy and the filesystem.
    ///
    /// Dry run by default: prints every planned operation with before and
    /// after paths. Nothing is written without `--apply`.
    Reconcile {
        /// Execute the plan.
        #[arg(long)]
        apply: bool,

        /// Delete records of non-documents (denylisted names, source files).
        #[arg(long, requires = "apply")]
        confirm_deletes: bool,

        /// Delete records whose file no longer exists.
        #[arg(long, requires = "apply")]
        prune_orphans: bool,

        /// Also remove the files of deleted non-document records (backed up first).
        #[arg(long, requires = "confirm_deletes")]
        delete_files: bool,

        /// Exit 2 if any record is rejected, fails, or shares its path.
        #[arg(long)]
        strict: bool,

        /// Emit the plan and outcomes as JSON on stdout.
        #[arg(long)]
        json: bool,

        /// Progress on stderr: `off`, `human` or `json`. Default: human on a TTY.
        #[arg(long)]
        progress: Option<String>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "doctax=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            std::fs::create_dir_all(cfg.tool_dir())?;
            println!("Database initialized successfully.");
        }
        Commands::Scan => {
            scanner::run_scan(&cfg)?;
        }
        Commands::Classify {
            path,
            category,
            document_type,
            json,
        } => {
            classify::run_classify(&cfg, &path, category, document_type, json)?;
        }
        Commands::Validate { path, json } => {
            if !validate::run_validate(&cfg, &path, json)? {
                std::process::exit(1);
            }
        }
        Commands::Add {
            path,
            category,
            document_type,
            entity_type,
            entity_id,
        } => {
            let request = AddRequest {
                file_path: path,
                category,
                document_type,
                entity_type,
                entity_id,
            };
            run_add(&cfg, &request).await?;
        }
        Commands::List { category } => {
            records::run_list(&cfg, category).await?;
        }
        Commands::Summary { json } => {
            records::run_summary(&cfg, json).await?;
        }
        Commands::Reconcile {
            apply,
            confirm_deletes,
            prune_orphans,
            delete_files,
            strict,
            json,
            progress,
        } => {
            let args = ReconcileArgs {
                apply,
                options: ApplyOptions {
                    confirm_deletes,
                    prune_orphans,
                    delete_files,
                },
                strict,
                json,
                progress: ProgressMode::from_flag(progress.as_deref())?,
            };
            if !run_reconcile(&cfg, &args).await? {
                std::process::exit(2);
            }
        }
    }

    Ok(())
}
