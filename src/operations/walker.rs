//! Walker (spec §4.4): reconciles filesystem state with the catalog.
//!
//! Grounded on the teacher's discovery phase
//! (`operations/indexing/phases/discovery.rs`, a queue-driven async
//! directory walk) and its `ChangeDetector`
//! (`operations/indexing/change_detection/mod.rs`, two keyed maps
//! diffed against each other) — generalised here to the spec's
//! Present/Known reconciliation and corrected per §9's two open
//! questions (the real DELETE-set predicate, and the normalised LIKE
//! prefix).

use crate::domain::{ItemState, OsStat};
use crate::error::{ArchivistError, Result};
use crate::mime::guess_mime_type;
use crate::operations::catalog::{Catalog, UpsertRow};
use sea_orm::{ConnectionTrait, TransactionTrait};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A present-on-disk path's captured stat triple (spec §4.4 step 1).
#[derive(Debug, Clone)]
struct PresentEntry {
    os_stat: OsStat,
    ctime: i64,
    mtime: i64,
    size: i64,
}

/// Normalises `start_dir` to end with exactly one trailing path
/// separator, so the prefix filter cannot over-match siblings (spec §9,
/// "Open question — LIKE prefix"; e.g. `/a` must not match `/abc`).
pub fn normalize_prefix(start_dir: &str) -> String {
    if start_dir.ends_with('/') {
        start_dir.to_string()
    } else {
        format!("{}/", start_dir)
    }
}

/// Recursively enumerates every regular file under `start_dir`,
/// following no symlinks (spec §4.4 step 1, "Collect"). Per-path
/// failures are logged and skipped (spec §7, `FilesystemError`), not
/// fatal to the run.
async fn collect(start_dir: &Path) -> HashMap<String, PresentEntry> {
    let mut present = HashMap::new();
    let mut queue: VecDeque<PathBuf> = VecDeque::new();
    queue.push_back(start_dir.to_path_buf());

    while let Some(dir) = queue.pop_front() {
        let mut read_dir = match tokio::fs::read_dir(&dir).await {
            Ok(rd) => rd,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "failed to read directory, skipping");
                continue;
            }
        };

        loop {
            let entry = match read_dir.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(path = %dir.display(), error = %e, "failed to read directory entry, skipping remainder");
                    break;
                }
            };

            let path = entry.path();

            let metadata = match tokio::fs::symlink_metadata(&path).await {
                Ok(m) => m,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "stat failed, skipping path");
                    continue;
                }
            };

            if metadata.is_symlink() {
                continue;
            } else if metadata.is_dir() {
                queue.push_back(path);
            } else if metadata.is_file() {
                let os_stat = OsStat::from(&metadata);
                let ctime = os_stat.st_ctime;
                let mtime = os_stat.st_mtime;
                let size = os_stat.st_size;
                if let Some(path_str) = path.to_str() {
                    present.insert(
                        path_str.to_string(),
                        PresentEntry {
                            os_stat,
                            ctime,
                            mtime,
                            size,
                        },
                    );
                } else {
                    warn!(path = %path.display(), "path is not valid UTF-8, skipping");
                }
            }
        }
    }

    present
}

enum Classification {
    Noop,
    Update,
    Insert,
}

/// Runs the Walker over `start_dir` against `conn`, in a single
/// transaction (spec §4.4 step 4). Returns the counts of rows written
/// for each classification, for logging at the CLI boundary.
pub async fn run<C: ConnectionTrait + TransactionTrait>(
    conn: &C,
    start_dir: &str,
) -> Result<WalkerSummary> {
    let prefix = normalize_prefix(start_dir);
    info!(start_dir, prefix = %prefix, "walker: starting reconciliation");

    let present = collect(Path::new(start_dir)).await;
    info!(count = present.len(), "walker: collected present files");

    let txn = conn.begin().await?;
    let summary = {
        let catalog = Catalog::new(&txn);

        let known = catalog.scan_under(&prefix).await?;
        let known_map: HashMap<String, (i64, ItemState)> = known
            .into_iter()
            .map(|row| (row.path, (row.item_mtime, row.state)))
            .collect();
        debug!(count = known_map.len(), "walker: loaded known catalog rows");

        let mut upserts = Vec::new();
        let mut delete_paths = Vec::new();
        let mut noop = 0u64;

        for (path, entry) in &present {
            let classification = match known_map.get(path) {
                Some((known_mtime, known_state)) => {
                    if known_state.is_in_process() {
                        Classification::Noop
                    } else if *known_mtime != entry.mtime {
                        Classification::Update
                    } else {
                        Classification::Noop
                    }
                }
                None => Classification::Insert,
            };

            match classification {
                Classification::Noop => noop += 1,
                Classification::Update | Classification::Insert => {
                    let (mime_type, encoding) = guess_mime_type(path);
                    let os_stat_json = serde_json::to_value(&entry.os_stat)
                        .map_err(|e| ArchivistError::validation(e.to_string()))?;
                    upserts.push(UpsertRow {
                        path: path.clone(),
                        state: ItemState::NeedAnalysis,
                        mime_type,
                        encoding,
                        item_ctime: entry.ctime,
                        item_mtime: entry.mtime,
                        size: entry.size,
                        os_stat: os_stat_json,
                    });
                }
            }
        }

        // `Known ∖ Present` (spec §4.4 step 3, third bullet): this is
        // the real DELETE set. The source's save step instead filtered
        // on `v is None`, a predicate that never matched anything and
        // silently dropped every deletion — that bug is not
        // reproduced here (spec §9).
        for path in known_map.keys() {
            if !present.contains_key(path) {
                delete_paths.push(path.clone());
            }
        }

        // Reset: establish a clean baseline before applying this run's
        // classifications, so paths the filesystem no longer mentions
        // at all don't carry forward a stale in-process-adjacent state.
        let reset = catalog
            .bulk_reset_under(&prefix, ItemState::Unchanged)
            .await?;

        catalog.bulk_upsert(&upserts).await?;

        let marked_deleted = catalog
            .bulk_set_state_where_path_in(&delete_paths, ItemState::NeedDeletion)
            .await?;

        WalkerSummary {
            inserted_or_updated: upserts.len() as u64,
            marked_for_deletion: marked_deleted,
            noop,
            reset,
        }
    };
    txn.commit().await?;

    info!(
        inserted_or_updated = summary.inserted_or_updated,
        marked_for_deletion = summary.marked_for_deletion,
        noop = summary.noop,
        "walker: reconciliation committed"
    );

    Ok(summary)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkerSummary {
    pub inserted_or_updated: u64,
    pub marked_for_deletion: u64,
    pub noop: u64,
    pub reset: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_bare_path_with_trailing_separator() {
        assert_eq!(normalize_prefix("/a"), "/a/");
    }

    #[test]
    fn leaves_already_normalized_path_untouched() {
        assert_eq!(normalize_prefix("/a/"), "/a/");
    }

    #[test]
    fn prevents_sibling_over_match() {
        let prefix = normalize_prefix("/a");
        assert!(!"/abc/file.txt".starts_with(&prefix));
        assert!("/a/file.txt".starts_with(&prefix));
    }
}
