//! The `item` entity: one row per filesystem path under any indexed
//! `start_dir`, in schema `stoma` (spec §6).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "item", schema_name = "stoma")]
pub struct Model {
    /// Absolute path. Primary key; capped at 1024 chars per spec §3.
    #[sea_orm(primary_key, auto_increment = false, column_type = "String(StringLen::N(1024))")]
    pub path: String,

    /// `ItemState` as its snake_case string (see `domain::ItemState`).
    pub state: String,

    pub size: i64,
    pub item_ctime: i64,
    pub item_mtime: i64,

    pub mime_type: String,
    pub encoding: Option<String>,
    pub language: Option<String>,

    /// Captured `struct stat` fields, as JSON (`domain::OsStat`).
    pub os_stat: Json,

    /// Reserved for extended attributes; unused by this version.
    pub xattr: Option<Json>,

    pub meta_json: Option<String>,
    pub meta_xmp: Option<String>,

    pub data_text: Option<String>,
    pub data_html_head: Option<String>,
    pub data_html_body: Option<String>,
    pub data_json: Option<String>,

    pub search_id: Option<String>,
    pub search_version: Option<i64>,

    pub row_ctime: DateTimeUtc,
    pub row_mtime: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
