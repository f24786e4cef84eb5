//! Indexer (spec §4.6): publishes analysed rows to the search index and
//! removes deleted rows from it, in two passes, each row claimed and
//! processed under its own transaction (spec §5, as in
//! [`crate::operations::analyser`]).

use crate::config::IndexConfig;
use crate::domain::ItemState;
use crate::error::{ArchivistError, Result};
use crate::infrastructure::database::entities::ItemActive;
use crate::infrastructure::search::{SearchClient, SearchDocument};
use crate::operations::catalog::Catalog;
use sea_orm::{ActiveValue::Set, ConnectionTrait, TransactionTrait};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexerSummary {
    pub indexed: u64,
    pub deleted: u64,
}

/// Runs both Indexer passes. Refuses outright if the search service is
/// not live (spec §4.6 "Liveness").
pub async fn run<C>(
    conn: &C,
    search: &dyn SearchClient,
    index: &IndexConfig,
    batch_limit: u64,
) -> Result<IndexerSummary>
where
    C: ConnectionTrait + TransactionTrait,
{
    if !search.liveness().await? {
        return Err(ArchivistError::TransientRemote(
            "search service liveness check failed".to_string(),
        ));
    }

    let indexed = run_save_pass(conn, search, index, batch_limit).await?;
    let deleted = run_delete_pass(conn, search, index, batch_limit).await?;

    let summary = IndexerSummary { indexed, deleted };
    info!(indexed = summary.indexed, deleted = summary.deleted, "indexer: run complete");
    Ok(summary)
}

/// Save pass (spec §4.6): `need_indexing → indexing → indexed`.
async fn run_save_pass<C>(
    conn: &C,
    search: &dyn SearchClient,
    index: &IndexConfig,
    batch_limit: u64,
) -> Result<u64>
where
    C: ConnectionTrait + TransactionTrait,
{
    let mut count = 0u64;
    let mut cursor: Option<String> = None;

    loop {
        let candidates = Catalog::new(conn)
            .list_candidates(ItemState::NeedIndexing, cursor.as_deref(), batch_limit)
            .await?;
        if candidates.is_empty() {
            break;
        }
        cursor = candidates.last().cloned();

        for path in &candidates {
            let txn = conn.begin().await?;
            let claimed = Catalog::new(&txn)
                .try_claim_path(path, ItemState::NeedIndexing, ItemState::Indexing)
                .await?;
            if !claimed {
                txn.rollback().await?;
                continue;
            }

            let row = match Catalog::new(&txn).get(path).await? {
                Some(row) => row,
                None => {
                    txn.rollback().await?;
                    continue;
                }
            };

            if !row.mime_type.contains('/') {
                warn!(path, "indexer: mime_type missing '/', treating row as validation failure");
                txn.rollback().await?;
                continue;
            }

            let document = SearchDocument::from_item(
                &row.path,
                &row.mime_type,
                row.encoding.clone(),
                row.language.clone(),
                row.size,
                row.item_ctime,
                row.item_mtime,
                row.meta_json.as_deref(),
                row.data_text.clone(),
            );

            let publish_result = search
                .publish(&index.name, &index.kind, row.search_id.as_deref(), &document)
                .await;

            match publish_result {
                Ok(published) => {
                    Catalog::new(&txn)
                        .update_row(path, |active: &mut ItemActive| {
                            active.state = Set(ItemState::Indexed.to_string());
                            active.search_id = Set(Some(published.id));
                            active.search_version = Set(Some(published.version));
                        })
                        .await?;
                    txn.commit().await?;
                    count += 1;
                }
                Err(e) => {
                    warn!(path, error = %e, "indexer: publish failed, row returns to need_indexing");
                    txn.rollback().await?;
                }
            }
        }
    }

    Ok(count)
}

/// Delete pass (spec §4.6): `need_deletion → indexing → deleted`.
async fn run_delete_pass<C>(
    conn: &C,
    search: &dyn SearchClient,
    index: &IndexConfig,
    batch_limit: u64,
) -> Result<u64>
where
    C: ConnectionTrait + TransactionTrait,
{
    let mut count = 0u64;
    let mut cursor: Option<String> = None;

    loop {
        let candidates = Catalog::new(conn)
            .list_candidates(ItemState::NeedDeletion, cursor.as_deref(), batch_limit)
            .await?;
        if candidates.is_empty() {
            break;
        }
        cursor = candidates.last().cloned();

        for path in &candidates {
            let txn = conn.begin().await?;
            let claimed = Catalog::new(&txn)
                .try_claim_path(path, ItemState::NeedDeletion, ItemState::Indexing)
                .await?;
            if !claimed {
                txn.rollback().await?;
                continue;
            }

            let row = match Catalog::new(&txn).get(path).await? {
                Some(row) => row,
                None => {
                    txn.rollback().await?;
                    continue;
                }
            };

            let remove_result = match row.search_id.as_deref() {
                Some(search_id) => search.remove(&index.name, &index.kind, search_id).await,
                None => Ok(true),
            };

            match remove_result {
                Ok(existed) => {
                    if !existed {
                        warn!(path, "indexer: remove found no document, continuing");
                    }
                    Catalog::new(&txn)
                        .update_row(path, |active: &mut ItemActive| {
                            active.state = Set(ItemState::Deleted.to_string());
                            active.search_id = Set(None);
                            active.search_version = Set(None);
                        })
                        .await?;
                    txn.commit().await?;
                    count += 1;
                }
                Err(e) => {
                    warn!(path, error = %e, "indexer: remove failed, row returns to need_deletion");
                    txn.rollback().await?;
                }
            }
        }
    }

    Ok(count)
}
