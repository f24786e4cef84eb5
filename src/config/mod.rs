//! Configuration tree loaded from the file given by `--config PATH`.
//!
//! Grounded on the teacher's `config::app_config::AppConfig` (load from
//! disk, defaults, validation at load time) but re-shaped around the
//! keys spec.md §6 actually requires.

use crate::error::{ArchivistError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Scopes this config; required, fatal if absent (spec §6).
    pub environment: String,

    pub database: DatabaseConfig,
    pub extraction: ServiceEndpoint,
    pub search: ServiceEndpoint,

    #[serde(default)]
    pub index: IndexConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}
fn default_min_connections() -> u32 {
    1
}
fn default_connect_timeout_secs() -> u64 {
    8
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    pub host: String,
    pub port: u16,
}

impl ServiceEndpoint {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default = "default_index_name")]
    pub name: String,
    #[serde(default = "default_index_kind")]
    pub kind: String,
}

fn default_index_name() -> String {
    "files".to_string()
}
fn default_index_kind() -> String {
    "file".to_string()
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            name: default_index_name(),
            kind: default_index_kind(),
        }
    }
}

impl Config {
    /// Loads and validates configuration from a TOML file at `path`.
    /// Missing or invalid configuration is fatal before any work starts
    /// (spec §7, `ConfigError`).
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ArchivistError::config(format!("failed to read config {}: {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&text)
            .map_err(|e| ArchivistError::config(format!("invalid config {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.environment.trim().is_empty() {
            return Err(ArchivistError::config(
                "missing key \"environment\" in config",
            ));
        }
        if self.database.url.trim().is_empty() {
            return Err(ArchivistError::config("missing key \"database.url\" in config"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_environment() {
        let toml = r#"
            environment = ""
            [database]
            url = "sqlite::memory:"
            [extraction]
            host = "localhost"
            port = 9998
            [search]
            host = "localhost"
            port = 9200
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn index_defaults_match_spec() {
        let toml = r#"
            environment = "testing"
            [database]
            url = "sqlite::memory:"
            [extraction]
            host = "localhost"
            port = 9998
            [search]
            host = "localhost"
            port = 9200
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.index.name, "files");
        assert_eq!(config.index.kind, "file");
    }
}
