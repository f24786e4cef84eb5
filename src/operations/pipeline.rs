//! Ties Walker → Analyser → Indexer together for one `index` run (spec
//! §2 "Control flow per run").

use crate::config::Config;
use crate::error::Result;
use crate::infrastructure::extract::ExtractionClient;
use crate::infrastructure::search::SearchClient;
use crate::operations::{analyser, indexer, walker};
use sea_orm::DatabaseConnection;
use tracing::info;

/// Per-stage batch size for the Analyser's and Indexer's claim loops.
/// Not configurable via the config file; the spec places no requirement
/// on batch size, only on ordering and ownership within a batch.
const STAGE_BATCH_LIMIT: u64 = 200;

#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineSummary {
    pub walker: walker::WalkerSummary,
    pub analyser: analyser::AnalyserSummary,
    pub indexer: indexer::IndexerSummary,
}

/// Runs Walker, then Analyser, then Indexer over `start_dir` (the
/// `index` CLI subcommand). Each stage commits its own transaction
/// boundary on success and is independently safe to re-run (spec §2).
pub async fn run_index(
    conn: &DatabaseConnection,
    config: &Config,
    extraction: &dyn ExtractionClient,
    search: &dyn SearchClient,
    start_dir: &str,
) -> Result<PipelineSummary> {
    info!(start_dir, "pipeline: starting index run");

    let walker_summary = walker::run(conn, start_dir).await?;
    let analyser_summary = analyser::run(conn, extraction, STAGE_BATCH_LIMIT).await?;
    let indexer_summary =
        indexer::run(conn, search, &config.index, STAGE_BATCH_LIMIT).await?;

    info!("pipeline: index run complete");

    Ok(PipelineSummary {
        walker: walker_summary,
        analyser: analyser_summary,
        indexer: indexer_summary,
    })
}
