//! Creates schema `stoma` and its `item` table (spec §6).
//!
//! The `item` entity (`infrastructure::database::entities::item`)
//! qualifies every query with `schema_name = "stoma"`, which on Postgres
//! means `stoma.item`. This migration creates the table inside that same
//! schema on non-SQLite backends (SQLite has no notion of a `stoma`
//! schema and the entity's schema qualifier is a no-op there), so the
//! table the migration creates is the same one the entity queries.

use sea_orm::sea_query::Alias;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let is_sqlite = manager.get_database_backend() == sea_orm::DatabaseBackend::Sqlite;

        if !is_sqlite {
            manager
                .get_connection()
                .execute_unprepared("CREATE SCHEMA IF NOT EXISTS stoma")
                .await?;
        }

        let mut create_table = Table::create();
        if is_sqlite {
            create_table.table(Item::Table);
        } else {
            create_table.table((Alias::new("stoma"), Item::Table));
        }
        create_table
            .if_not_exists()
            .col(
                ColumnDef::new(Item::Path)
                    .string_len(1024)
                    .not_null()
                    .primary_key(),
            )
            .col(ColumnDef::new(Item::State).string().not_null())
            .col(ColumnDef::new(Item::Size).big_integer().not_null())
            .col(ColumnDef::new(Item::ItemCtime).big_integer().not_null())
            .col(ColumnDef::new(Item::ItemMtime).big_integer().not_null())
            .col(ColumnDef::new(Item::MimeType).string().not_null())
            .col(ColumnDef::new(Item::Encoding).string())
            .col(ColumnDef::new(Item::Language).string())
            .col(ColumnDef::new(Item::OsStat).json().not_null())
            .col(ColumnDef::new(Item::Xattr).json())
            .col(ColumnDef::new(Item::MetaJson).text())
            .col(ColumnDef::new(Item::MetaXmp).text())
            .col(ColumnDef::new(Item::DataText).text())
            .col(ColumnDef::new(Item::DataHtmlHead).text())
            .col(ColumnDef::new(Item::DataHtmlBody).text())
            .col(ColumnDef::new(Item::DataJson).text())
            .col(ColumnDef::new(Item::SearchId).string())
            .col(ColumnDef::new(Item::SearchVersion).big_integer())
            .col(
                ColumnDef::new(Item::RowCtime)
                    .timestamp_with_time_zone()
                    .not_null(),
            )
            .col(
                ColumnDef::new(Item::RowMtime)
                    .timestamp_with_time_zone()
                    .not_null(),
            );

        manager.create_table(create_table).await?;

        let mut create_index = Index::create();
        if is_sqlite {
            create_index.table(Item::Table);
        } else {
            create_index.table((Alias::new("stoma"), Item::Table));
        }
        create_index.name("idx_item_state").col(Item::State);

        manager.create_index(create_index).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let is_sqlite = manager.get_database_backend() == sea_orm::DatabaseBackend::Sqlite;

        let mut drop_table = Table::drop();
        if is_sqlite {
            drop_table.table(Item::Table);
        } else {
            drop_table.table((Alias::new("stoma"), Item::Table));
        }

        manager.drop_table(drop_table).await
    }
}

#[derive(Iden)]
pub enum Item {
    #[iden = "item"]
    Table,
    Path,
    State,
    Size,
    ItemCtime,
    ItemMtime,
    MimeType,
    Encoding,
    Language,
    OsStat,
    Xattr,
    MetaJson,
    MetaXmp,
    DataText,
    DataHtmlHead,
    DataHtmlBody,
    DataJson,
    SearchId,
    SearchVersion,
    RowCtime,
    RowMtime,
}
