//! Error taxonomy for the indexing pipeline.
//!
//! Mirrors the kinds a stage driver needs to tell apart when deciding
//! whether to abort the current transaction, skip a single path, or bail
//! out of the whole run.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ArchivistError>;

#[derive(Debug, Error)]
pub enum ArchivistError {
    /// Extraction or search service unreachable, or responded 5xx.
    /// The caller should abort the current stage's transaction and retry
    /// on the next run.
    #[error("remote service unavailable: {0}")]
    TransientRemote(String),

    /// Extraction or search service responded with a malformed body or a
    /// 4xx. Logged at higher severity than `TransientRemote`, but handled
    /// the same way: abort the row's transaction.
    #[error("remote service rejected request: {0}")]
    PermanentRemote(String),

    /// Catalog (database) constraint or connectivity failure. Aborts the
    /// whole pipeline run, not just the current row.
    #[error("catalog error: {0}")]
    Catalog(#[from] sea_orm::DbErr),

    /// `stat`/read failure on a specific path during Walker collection.
    /// Callers log and skip the path rather than aborting the run.
    #[error("filesystem error at {path}: {source}")]
    Filesystem {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Missing or invalid configuration. Fatal before any work starts.
    #[error("configuration error: {0}")]
    Config(String),

    /// A row failed a data invariant (e.g. `mime_type` missing `/`).
    /// Surfaced to the caller as equivalent to `PermanentRemote` for that
    /// row: the row should not be written as-is.
    #[error("validation error: {0}")]
    Validation(String),
}

impl ArchivistError {
    pub fn filesystem(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether this error should abort the current stage's transaction
    /// but let the next run retry (as opposed to aborting the whole
    /// pipeline invocation).
    pub fn is_row_local(&self) -> bool {
        matches!(
            self,
            Self::TransientRemote(_) | Self::PermanentRemote(_) | Self::Validation(_)
        )
    }
}

/// Classifies an HTTP response/transport failure from the extraction or
/// search clients into the §7 taxonomy.
pub fn classify_http_error(err: &reqwest_middleware::Error) -> ArchivistError {
    match err {
        reqwest_middleware::Error::Reqwest(e) => {
            if let Some(status) = e.status() {
                if status.is_server_error() {
                    ArchivistError::TransientRemote(format!("{}: {}", status, e))
                } else {
                    ArchivistError::PermanentRemote(format!("{}: {}", status, e))
                }
            } else {
                // Connect/timeout/DNS failures with no status code.
                ArchivistError::TransientRemote(e.to_string())
            }
        }
        reqwest_middleware::Error::Middleware(e) => ArchivistError::TransientRemote(e.to_string()),
    }
}
