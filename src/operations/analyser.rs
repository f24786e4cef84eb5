//! Analyser (spec §4.5): drains *need_analysis* rows through the
//! extraction client, claiming each under a row-level lock so
//! concurrent workers never double-process a path (spec §5, §8
//! "Concurrent stages").
//!
//! Per spec §5 ("a worker holds a transaction across at most one row's
//! network round-trip"), claim, extraction call, and the resulting
//! state write all happen inside one transaction per row: on success it
//! commits the row as *need_indexing*; on failure the transaction is
//! rolled back, which atomically restores *need_analysis* (spec §4.5
//! step 4, §5 "Cancellation / timeout" — no compensating write is
//! needed).

use crate::domain::ItemState;
use crate::error::Result;
use crate::infrastructure::database::entities::ItemActive;
use crate::infrastructure::extract::{scrub_nul, ExtractionClient};
use crate::operations::catalog::Catalog;
use sea_orm::{ActiveValue::Set, ConnectionTrait, TransactionTrait};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalyserSummary {
    pub analysed: u64,
    pub failed: u64,
}

/// Runs one Analyser pass: repeatedly lists up to `batch_limit`
/// candidate paths in *need_analysis*, in ascending path order (spec §5
/// ordering guarantee), and processes each under its own claim
/// transaction, until a listing comes back empty.
pub async fn run<C>(
    conn: &C,
    extraction: &dyn ExtractionClient,
    batch_limit: u64,
) -> Result<AnalyserSummary>
where
    C: ConnectionTrait + TransactionTrait,
{
    let mut summary = AnalyserSummary::default();
    let mut cursor: Option<String> = None;

    loop {
        let candidates = Catalog::new(conn)
            .list_candidates(ItemState::NeedAnalysis, cursor.as_deref(), batch_limit)
            .await?;

        if candidates.is_empty() {
            break;
        }
        cursor = candidates.last().cloned();

        for path in &candidates {
            let txn = conn.begin().await?;
            let claimed = Catalog::new(&txn)
                .try_claim_path(path, ItemState::NeedAnalysis, ItemState::Analysing)
                .await?;

            if !claimed {
                // Another worker already took this row; the loser
                // observes the new state and skips it (spec §5).
                txn.rollback().await?;
                continue;
            }

            match extraction.extract(Path::new(path)).await {
                Ok(result) => {
                    Catalog::new(&txn)
                        .update_row(path, |active: &mut ItemActive| {
                            active.state = Set(ItemState::NeedIndexing.to_string());
                            active.mime_type = Set(result.mime_type.clone());
                            active.language = Set(result.language.clone());
                            active.meta_json = Set(result.meta_json.as_deref().map(scrub_nul));
                            active.meta_xmp = Set(result.meta_xmp.clone());
                            active.data_text = Set(result.data_text.clone());
                            active.data_html_head = Set(result.data_html_head.clone());
                            active.data_html_body = Set(result.data_html_body.clone());
                        })
                        .await?;
                    txn.commit().await?;
                    summary.analysed += 1;
                }
                Err(e) => {
                    warn!(
                        path = %path,
                        error = %e,
                        "analyser: extraction failed, row returns to need_analysis"
                    );
                    txn.rollback().await?;
                    summary.failed += 1;
                }
            }
        }
    }

    info!(
        analysed = summary.analysed,
        failed = summary.failed,
        "analyser: pass complete"
    );
    Ok(summary)
}
