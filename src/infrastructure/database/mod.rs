//! Catalog database wrapper, built on SeaORM.

pub mod entities;
pub mod migration;

use crate::config::DatabaseConfig;
use crate::error::Result;
use sea_orm::{ConnectOptions, Database as SeaDatabase, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;
use tracing::info;

/// Owns the pooled connection to the catalog.
pub struct Database {
    conn: DatabaseConnection,
}

impl Database {
    /// Connects using the pool settings from `config` (spec §6,
    /// SPEC_FULL.md §A.3). Does not run migrations; call
    /// [`Database::migrate`] explicitly (the `initdb` subcommand).
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let mut opt = ConnectOptions::new(config.url.clone());
        opt.max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .sqlx_logging(false);

        let conn = SeaDatabase::connect(opt).await?;
        info!("connected to catalog database");
        Ok(Self { conn })
    }

    /// Runs all pending migrations, creating schema `stoma` and the
    /// `item` table if absent (the `initdb` subcommand).
    pub async fn migrate(&self) -> Result<()> {
        migration::Migrator::up(&self.conn, None).await?;
        info!("catalog migrations applied");
        Ok(())
    }

    /// Drops every migration (the `drop` subcommand), after the caller
    /// has confirmed the search service is reachable (SPEC_FULL.md §B).
    pub async fn drop_all(&self) -> Result<()> {
        migration::Migrator::down(&self.conn, None).await?;
        info!("catalog schema dropped");
        Ok(())
    }

    pub fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }
}
