//! rampart-sync binary
//!
//! Usage:
//!   rampart-sync sync [--wipe] [--author NAME]
//!   rampart-sync audit [--json] [--fail-on-drift]
//!   rampart-sync validate
//!   rampart-sync show

use clap::{Parser, Subcommand, ValueEnum};
use rampart_store::{MemoryStore, RocksStore, StoreError, StoreSnapshot, StoreTx, TopologyStore};
use rampart_sync::{
    detect_drift, reconcile, CancelToken, DriftReport, SyncConfig, SyncError, SyncOptions,
    SyncReport,
};
use rampart_taxonomy::{forest_fingerprint, validate, walk};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "rampart-sync")]
#[command(about = "Reconcile the forum taxonomy into the store and audit drift")]
struct Cli {
    /// RocksDB data directory
    #[arg(long, env = "RAMPART_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Taxonomy file (.toml or .json); the built-in forest when omitted
    #[arg(long, env = "RAMPART_TAXONOMY")]
    taxonomy: Option<PathBuf>,

    /// Transaction timeout in seconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    timeout_secs: Option<u64>,

    /// Store backend; `memory` runs against an empty, throwaway store
    #[arg(long, value_enum, default_value_t = Backend::Rocks)]
    store: Backend,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    Rocks,
    Memory,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile the taxonomy into the store
    Sync {
        /// Delete every row and content item first
        #[arg(long)]
        wipe: bool,

        /// Author of bootstrap content
        #[arg(long, env = "RAMPART_SYSTEM_AUTHOR")]
        author: Option<String>,
    },

    /// Report drift between the taxonomy and the store
    Audit {
        /// Print discrepancies as a JSON array
        #[arg(long)]
        json: bool,

        /// Exit with status 1 when drift is found
        #[arg(long)]
        fail_on_drift: bool,
    },

    /// Validate the taxonomy without touching the store
    Validate,

    /// Print the resolved taxonomy as JSON
    Show,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rampart_sync=info,rampart_store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, SyncError> {
    let config = load_config(&cli)?;
    let forest = config.load_forest()?;

    // Structural problems are reported before the store is opened
    validate(&forest)?;

    match cli.command {
        Command::Validate => {
            println!(
                "ok: {} nodes, fingerprint {}",
                forest.node_count(),
                forest_fingerprint(&forest)?
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::Show => {
            println!("{}", serde_json::to_string_pretty(&walk(&forest))?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Sync { wipe, author } => {
            let mut options = SyncOptions::from_config(&config);
            options.wipe = wipe;
            if let Some(author) = author.filter(|a| !a.trim().is_empty()) {
                options.author = author;
            }

            let cancel = options.cancel.clone();
            let (backend, data_dir) = (cli.store, config.data_dir.clone());
            let report = run_blocking(cancel, move || {
                let store = open_store(backend, &data_dir)?;
                reconcile(&forest, &store, &options)
            })
            .await?;

            print_sync(&report);
            Ok(ExitCode::SUCCESS)
        }
        Command::Audit {
            json,
            fail_on_drift,
        } => {
            let (backend, data_dir) = (cli.store, config.data_dir.clone());
            let report = run_blocking(CancelToken::new(), move || {
                let store = open_snapshot_store(backend, &data_dir)?;
                detect_drift(&forest, &store)
            })
            .await?;

            print_audit(&report, json)?;
            if fail_on_drift && !report.is_clean() {
                return Ok(ExitCode::FAILURE);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Environment config with command line overrides applied.
fn load_config(cli: &Cli) -> Result<SyncConfig, SyncError> {
    let mut config = SyncConfig::from_env()?;
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(path) = &cli.taxonomy {
        config.taxonomy = Some(path.clone());
    }
    if let Some(secs) = cli.timeout_secs {
        config.txn_timeout = Duration::from_secs(secs);
    }
    Ok(config)
}

/// The backend selected on the command line.
enum AnyStore {
    Memory(MemoryStore),
    Rocks(RocksStore),
}

impl TopologyStore for AnyStore {
    fn transaction<T, E, F>(&self, timeout: Duration, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreTx) -> Result<T, E>,
        E: From<StoreError>,
    {
        match self {
            Self::Memory(store) => store.transaction(timeout, f),
            Self::Rocks(store) => store.transaction(timeout, f),
        }
    }

    fn snapshot(&self) -> rampart_store::Result<StoreSnapshot> {
        match self {
            Self::Memory(store) => store.snapshot(),
            Self::Rocks(store) => store.snapshot(),
        }
    }
}

fn open_store(backend: Backend, data_dir: &Path) -> Result<AnyStore, SyncError> {
    match backend {
        Backend::Memory => Ok(AnyStore::Memory(MemoryStore::new())),
        Backend::Rocks => {
            std::fs::create_dir_all(data_dir)?;
            tracing::info!(path = %data_dir.display(), "Opening store");
            Ok(AnyStore::Rocks(RocksStore::open(data_dir)?))
        }
    }
}

/// Store for a drift audit. RocksDB is opened read-only so the audit can run
/// while a sync holds the database; a data dir with no database yet audits
/// as an empty store.
fn open_snapshot_store(backend: Backend, data_dir: &Path) -> Result<AnyStore, SyncError> {
    match backend {
        Backend::Memory => Ok(AnyStore::Memory(MemoryStore::new())),
        Backend::Rocks if !data_dir.join("CURRENT").exists() => {
            tracing::info!(path = %data_dir.display(), "No store yet, auditing as empty");
            Ok(AnyStore::Memory(MemoryStore::new()))
        }
        Backend::Rocks => {
            tracing::info!(path = %data_dir.display(), "Opening store read-only");
            Ok(AnyStore::Rocks(RocksStore::open_read_only(data_dir)?))
        }
    }
}

/// Run `job` on a blocking thread. Ctrl-C cancels it; the job still runs to
/// its next cancellation point and rolls back.
async fn run_blocking<T, F>(cancel: CancelToken, job: F) -> Result<T, SyncError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, SyncError> + Send + 'static,
{
    let mut handle = tokio::task::spawn_blocking(job);

    tokio::select! {
        joined = &mut handle => joined.map_err(|e| SyncError::Worker(e.to_string()))?,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupt received, cancelling run");
            cancel.cancel();
            handle.await.map_err(|e| SyncError::Worker(e.to_string()))?
        }
    }
}

fn print_sync(report: &SyncReport) {
    if let Some(wiped) = report.wiped {
        println!(
            "Wiped {} rows and {} content items",
            wiped.rows, wiped.content
        );
    }
    println!(
        "Synced {} nodes: {} inserted, {} updated, {} unchanged",
        report.outcomes.len(),
        report.inserted(),
        report.updated(),
        report.unchanged()
    );
    if !report.seeded.is_empty() {
        println!("Seeded welcome content in: {}", report.seeded.join(", "));
    }
    for slug in &report.seed_races {
        eprintln!("warning: {} already had content, welcome thread skipped", slug);
    }
    println!("Fingerprint: {}", report.fingerprint);
}

fn print_audit(report: &DriftReport, json: bool) -> Result<(), SyncError> {
    if json {
        println!("{}", serde_json::to_string_pretty(&report.discrepancies)?);
        return Ok(());
    }

    for discrepancy in &report.discrepancies {
        println!("{}", discrepancy);
    }
    match &report.last_sync {
        Some(stamp) if report.fingerprint_matches() => {
            println!("Last sync at {} applied this taxonomy", stamp.synced_at)
        }
        Some(stamp) => println!(
            "Last sync at {} applied a different taxonomy ({})",
            stamp.synced_at, stamp.fingerprint
        ),
        None => println!("Store has never been synced"),
    }
    if report.is_clean() {
        println!("No drift");
    } else {
        println!("{} discrepancies", report.discrepancies.len());
    }
    Ok(())
}
