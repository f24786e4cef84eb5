//! The `archivist` command-line surface (spec §6): `initdb`, `index
//! <start_dir>`, `drop`, plus the global flags the original CLI
//! exposed.
//!
//! Grounded on the teacher's `infrastructure::cli` dispatcher shape
//! (`Cli`/`Commands` via `clap::Parser`, env-filter logging set up in
//! `run()` before dispatch) but with a daemon-free, single-shot command
//! loop instead of the teacher's daemon/RPC split, since this crate has
//! no long-running service to talk to.

use crate::config::Config;
use crate::error::{ArchivistError, Result};
use crate::infrastructure::database::Database;
use crate::infrastructure::extract::{ExtractionClient, TikaExtractionClient};
use crate::infrastructure::search::{ElasticSearchClient, SearchClient};
use crate::operations::pipeline;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(Parser)]
#[command(name = "archivist")]
#[command(about = "Incremental filesystem indexer", long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file (spec §6).
    #[arg(long, global = true)]
    pub config: PathBuf,

    /// Increase log verbosity; repeatable (0=info, 1=debug, 2+=trace).
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Locale tag, logged at startup for parity with the original CLI
    /// surface. Does not affect indexing behavior.
    #[arg(long, global = true)]
    pub locale: Option<String>,

    /// Path to an Alembic-style config, recorded in the migration log
    /// line but not executed (this crate's own migrator performs the
    /// schema work).
    #[arg(long, global = true)]
    pub alembic_config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the catalog schema if it does not already exist.
    Initdb,

    /// Run one Walker → Analyser → Indexer pass over `start_dir`.
    Index {
        /// Directory to walk (spec §4.4).
        start_dir: PathBuf,
    },

    /// Empty the catalog and delete the search index.
    Drop,
}

/// Builds the `tracing-subscriber` env-filter from `-v`/`RUST_LOG`
/// (SPEC_FULL.md §A.1).
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("archivist={level}")));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

/// Parses arguments, sets up logging, and dispatches to the requested
/// subcommand. Returns the process exit code (spec §6 exit-code
/// contract: 0 on success, non-zero on any unhandled error).
pub async fn run() -> i32 {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Some(locale) = &cli.locale {
        debug!(locale, "locale tag (informational only)");
    }

    match dispatch(cli).await {
        Ok(()) => 0,
        Err(e) => {
            error!(error = %e, "archivist: fatal error");
            1
        }
    }
}

async fn dispatch(cli: Cli) -> Result<()> {
    let config = Config::load(&cli.config)?;
    debug!(environment = %config.environment, "configuration loaded");

    match cli.command {
        Commands::Initdb => cmd_initdb(&config, cli.alembic_config.as_deref()).await,
        Commands::Index { start_dir } => cmd_index(&config, &start_dir).await,
        Commands::Drop => cmd_drop(&config).await,
    }
}

async fn cmd_initdb(config: &Config, alembic_config: Option<&std::path::Path>) -> Result<()> {
    if let Some(path) = alembic_config {
        debug!(path = %path.display(), "alembic-config recorded; migrations run via the crate's own migrator");
    }

    let database = Database::connect(&config.database).await?;
    database.migrate().await?;
    info!("initdb: catalog schema ready");
    Ok(())
}

/// Logs the extraction/search liveness and version probes the original
/// CLI performed at startup (SPEC_FULL.md §B), aborting before any
/// pipeline work starts if either service is unreachable.
async fn probe_services(
    extraction: &dyn ExtractionClient,
    search: &dyn SearchClient,
    index_name: &str,
) -> Result<()> {
    let extraction_live = extraction.liveness().await?;
    debug!(live = extraction_live, "extraction service liveness probe");
    if !extraction_live {
        return Err(ArchivistError::TransientRemote(
            "extraction service liveness check failed".to_string(),
        ));
    }

    let search_live = search.liveness().await?;
    debug!(live = search_live, "search service liveness probe");
    if !search_live {
        return Err(ArchivistError::TransientRemote(
            "search service liveness check failed".to_string(),
        ));
    }

    match search.count(index_name).await {
        Ok(count) => debug!(index = index_name, count, "search index document count"),
        Err(e) => warn!(index = index_name, error = %e, "could not fetch index count at startup"),
    }

    Ok(())
}

async fn cmd_index(config: &Config, start_dir: &std::path::Path) -> Result<()> {
    let started = Instant::now();

    let result = async {
        let database = Database::connect(&config.database).await?;
        let extraction = TikaExtractionClient::new(config.extraction.base_url());
        let search = ElasticSearchClient::new(config.search.base_url());

        probe_services(&extraction, &search, &config.index.name).await?;

        let start_dir = start_dir
            .to_str()
            .ok_or_else(|| ArchivistError::validation("start_dir is not valid UTF-8"))?;

        pipeline::run_index(database.conn(), config, &extraction, &search, start_dir).await
    }
    .await;

    let elapsed = started.elapsed();
    match &result {
        Ok(summary) => info!(
            elapsed_secs = elapsed.as_secs_f64(),
            inserted_or_updated = summary.walker.inserted_or_updated,
            marked_for_deletion = summary.walker.marked_for_deletion,
            analysed = summary.analyser.analysed,
            indexed = summary.indexer.indexed,
            deleted = summary.indexer.deleted,
            "index: run complete"
        ),
        Err(e) => error!(elapsed_secs = elapsed.as_secs_f64(), error = %e, "index: run failed"),
    }

    result.map(|_| ())
}

async fn cmd_drop(config: &Config) -> Result<()> {
    let search = ElasticSearchClient::new(config.search.base_url());

    if !search.liveness().await? {
        return Err(ArchivistError::TransientRemote(
            "refusing to drop: search service liveness check failed".to_string(),
        ));
    }

    search.delete_index(&config.index.name).await?;
    info!(index = %config.index.name, "drop: search index deleted");

    let database = Database::connect(&config.database).await?;
    database.drop_all().await?;
    info!("drop: catalog schema dropped");
    Ok(())
}
