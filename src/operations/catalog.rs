//! The catalog store (spec §4.1): the durable per-path record and the
//! operations every pipeline stage is built from.
//!
//! Row-level locking is abstracted behind [`Catalog::claim`]. Since not
//! every backend SeaORM drives here supports literal `SELECT … FOR
//! UPDATE` (SQLite does not), claim is implemented as an atomic
//! conditional `UPDATE item SET state = new WHERE path = p AND state =
//! old`, executed inside the caller's transaction, with the affected-row
//! count as the ownership check: a worker only proceeds past `claim` if
//! it flipped the row itself (spec §9, row-level locking design note).

use crate::domain::ItemState;
use crate::error::Result;
use crate::infrastructure::database::entities::{Item, ItemActive};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use serde_json::Value as Json;

/// Catalog operations, bound to whatever connection the caller is
/// currently inside a transaction on.
pub struct Catalog<'c, C: ConnectionTrait> {
    conn: &'c C,
}

/// Columns the Walker writes when applying an INSERT or UPDATE
/// classification (spec §4.4 step 4).
#[derive(Debug, Clone)]
pub struct UpsertRow {
    pub path: String,
    pub state: ItemState,
    pub mime_type: String,
    pub encoding: Option<String>,
    pub item_ctime: i64,
    pub item_mtime: i64,
    pub size: i64,
    pub os_stat: Json,
}

/// The catalog's view of a known path, as loaded by the Walker (spec
/// §4.4 step 2).
#[derive(Debug, Clone)]
pub struct KnownRow {
    pub path: String,
    pub item_mtime: i64,
    pub state: ItemState,
}

impl<'c, C: ConnectionTrait> Catalog<'c, C> {
    pub fn new(conn: &'c C) -> Self {
        Self { conn }
    }

    /// `scan_under(prefix)`: the `(path, item_mtime, state)` projection
    /// for every row whose path has `prefix` (already normalised with a
    /// trailing separator) as a string prefix.
    pub async fn scan_under(&self, prefix: &str) -> Result<Vec<KnownRow>> {
        let models = Item::find()
            .filter(
                crate::infrastructure::database::entities::item::Column::Path
                    .starts_with(prefix),
            )
            .all(self.conn)
            .await?;

        Ok(models
            .into_iter()
            .filter_map(|m| {
                ItemState::from_str_lenient(&m.state).map(|state| KnownRow {
                    path: m.path,
                    item_mtime: m.item_mtime,
                    state,
                })
            })
            .collect())
    }

    /// `bulk_set_state_under(prefix, new_state)`: resets every row under
    /// `prefix` whose state is NOT an in-process state to `new_state`
    /// (the Walker's reset step).
    pub async fn bulk_reset_under(&self, prefix: &str, new_state: ItemState) -> Result<u64> {
        use crate::infrastructure::database::entities::item::Column;

        let in_process: Vec<String> = crate::domain::IN_PROCESS_STATES
            .iter()
            .map(|s| s.to_string())
            .collect();

        let result = Item::update_many()
            .col_expr(Column::State, Expr::value(new_state.to_string()))
            .col_expr(Column::RowMtime, Expr::value(now_expr()))
            .filter(Column::Path.starts_with(prefix))
            .filter(Column::State.is_not_in(in_process))
            .exec(self.conn)
            .await?;

        Ok(result.rows_affected)
    }

    /// `bulk_upsert(rows)`: insert-or-update many rows atomically, used
    /// for the Walker's INSERT and UPDATE classifications.
    pub async fn bulk_upsert(&self, rows: &[UpsertRow]) -> Result<()> {
        for row in rows {
            let existing = Item::find_by_id(row.path.clone()).one(self.conn).await?;
            let now = Utc::now();

            let mut active = match existing {
                Some(_) => ItemActive {
                    path: Set(row.path.clone()),
                    ..Default::default()
                },
                None => ItemActive {
                    path: Set(row.path.clone()),
                    search_id: Set(None),
                    search_version: Set(None),
                    meta_json: Set(None),
                    meta_xmp: Set(None),
                    data_text: Set(None),
                    data_html_head: Set(None),
                    data_html_body: Set(None),
                    data_json: Set(None),
                    language: Set(None),
                    xattr: Set(None),
                    row_ctime: Set(now.into()),
                    ..Default::default()
                },
            };

            active.state = Set(row.state.to_string());
            active.mime_type = Set(row.mime_type.clone());
            active.encoding = Set(row.encoding.clone());
            active.item_ctime = Set(row.item_ctime);
            active.item_mtime = Set(row.item_mtime);
            active.size = Set(row.size);
            active.os_stat = Set(row.os_stat.clone());
            active.row_mtime = Set(now.into());

            Item::insert(active)
                .on_conflict(
                    sea_orm::sea_query::OnConflict::column(
                        crate::infrastructure::database::entities::item::Column::Path,
                    )
                    .update_columns([
                        crate::infrastructure::database::entities::item::Column::State,
                        crate::infrastructure::database::entities::item::Column::MimeType,
                        crate::infrastructure::database::entities::item::Column::Encoding,
                        crate::infrastructure::database::entities::item::Column::ItemCtime,
                        crate::infrastructure::database::entities::item::Column::ItemMtime,
                        crate::infrastructure::database::entities::item::Column::Size,
                        crate::infrastructure::database::entities::item::Column::OsStat,
                        crate::infrastructure::database::entities::item::Column::RowMtime,
                    ])
                    .to_owned(),
                )
                .exec(self.conn)
                .await?;
        }
        Ok(())
    }

    /// `bulk_set_state_where_path_in(paths, new_state)`: marks the given
    /// paths for deletion, skipping any already in an in-process state
    /// (the Walker's DELETE application, classified per §4.4 step 3 —
    /// `Known ∖ Present`, not a stale `v is None` check).
    pub async fn bulk_set_state_where_path_in(
        &self,
        paths: &[String],
        new_state: ItemState,
    ) -> Result<u64> {
        use crate::infrastructure::database::entities::item::Column;

        if paths.is_empty() {
            return Ok(0);
        }

        let in_process: Vec<String> = crate::domain::IN_PROCESS_STATES
            .iter()
            .map(|s| s.to_string())
            .collect();

        let result = Item::update_many()
            .col_expr(Column::State, Expr::value(new_state.to_string()))
            .col_expr(Column::RowMtime, Expr::value(now_expr()))
            .filter(Column::Path.is_in(paths.to_vec()))
            .filter(Column::State.is_not_in(in_process))
            .exec(self.conn)
            .await?;

        Ok(result.rows_affected)
    }

    /// Realizes the spec's `claim(state_in, filter)` contract (§4.1) as
    /// two composable steps rather than one call: listing candidates
    /// (this method) and [`Catalog::try_claim_path`] (one conditional
    /// `UPDATE` per row). Splitting them lets the stage driver open a
    /// fresh transaction per row that also spans that row's extraction
    /// or publish call, per §5's "a worker holds a transaction across
    /// at most one row's network round-trip".
    ///
    /// Lists up to `limit` paths currently in `state_in`, in ascending
    /// path order (spec §5 ordering guarantee), without claiming them.
    ///
    /// `after` is a keyset-pagination cursor (the last path seen in the
    /// previous batch): only paths strictly greater than it are
    /// returned. This is deliberate rather than re-querying `state_in`
    /// from scratch each batch — a row that fails and returns to
    /// `state_in` must not be re-listed within the same pass, or a
    /// sustained outage would make the caller's batch loop never
    /// terminate. Each path in a single run is visited at most once.
    pub async fn list_candidates(
        &self,
        state_in: ItemState,
        after: Option<&str>,
        limit: u64,
    ) -> Result<Vec<String>> {
        use crate::infrastructure::database::entities::item::Column;

        let mut query = Item::find().filter(Column::State.eq(state_in.to_string()));
        if let Some(cursor) = after {
            query = query.filter(Column::Path.gt(cursor));
        }

        let candidates = query
            .order_by_asc(Column::Path)
            .limit(limit)
            .all(self.conn)
            .await?;

        Ok(candidates.into_iter().map(|m| m.path).collect())
    }

    /// Attempts to atomically flip `path` from `state_in` to
    /// `claiming_state`. Returns `true` if this call performed the
    /// flip, `false` if the row had already moved on (claimed by
    /// another worker, or no longer in `state_in`) — the caller should
    /// skip the row in that case rather than process it twice (spec
    /// §5 "Row claim").
    pub async fn try_claim_path(
        &self,
        path: &str,
        state_in: ItemState,
        claiming_state: ItemState,
    ) -> Result<bool> {
        use crate::infrastructure::database::entities::item::Column;

        let result = Item::update_many()
            .col_expr(Column::State, Expr::value(claiming_state.to_string()))
            .col_expr(Column::RowMtime, Expr::value(now_expr()))
            .filter(Column::Path.eq(path))
            .filter(Column::State.eq(state_in.to_string()))
            .exec(self.conn)
            .await?;

        Ok(result.rows_affected == 1)
    }

    /// Persists the extraction/search verdict columns for a single row
    /// and transitions its state, inside the caller's transaction.
    pub async fn update_row(&self, path: &str, mutate: impl FnOnce(&mut ItemActive)) -> Result<()> {
        let mut active = ItemActive {
            path: Set(path.to_string()),
            ..Default::default()
        };
        mutate(&mut active);
        active.row_mtime = Set(Utc::now().into());
        Item::update(active).exec(self.conn).await?;
        Ok(())
    }

    pub async fn get(&self, path: &str) -> Result<Option<crate::infrastructure::database::entities::item::Model>> {
        Ok(Item::find_by_id(path.to_string()).one(self.conn).await?)
    }
}

/// SQL `CURRENT_TIMESTAMP`-equivalent expression usable in both the
/// SQLite and Postgres backends SeaORM targets here.
fn now_expr() -> sea_orm::Value {
    sea_orm::Value::ChronoDateTimeUtc(Some(Box::new(Utc::now())))
}

impl ItemState {
    /// Like `FromStr`, but tolerant of a persisted value this process
    /// doesn't recognise (treated as `unchanged` rather than panicking
    /// a scan).
    pub fn from_str_lenient(s: &str) -> Option<Self> {
        use std::str::FromStr;
        Self::from_str(s).ok()
    }
}
