//! The `Item` lifecycle state and the structured `os_stat` payload.
//!
//! The `Item` record itself lives as a SeaORM entity
//! (`infrastructure::database::entities::item`) since its columns are the
//! catalog's schema; this module holds the state machine and the small
//! value types that travel alongside it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle tag for a catalog row. See spec §3 for the full state
/// machine; transitions are driven by Walker, Analyser and Indexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    Unchanged,
    NeedAnalysis,
    Analysing,
    NeedIndexing,
    Indexing,
    Indexed,
    NeedDeletion,
    Deleted,
}

/// States that mark a row as owned by some worker's in-flight
/// transaction. Other workers, including a re-entrant Walker, must not
/// touch a row in one of these states (spec §3, §5).
pub const IN_PROCESS_STATES: [ItemState; 3] = [
    ItemState::Analysing,
    ItemState::NeedIndexing,
    ItemState::Indexing,
];

impl ItemState {
    pub fn is_in_process(&self) -> bool {
        IN_PROCESS_STATES.contains(self)
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unchanged => "unchanged",
            Self::NeedAnalysis => "need_analysis",
            Self::Analysing => "analysing",
            Self::NeedIndexing => "need_indexing",
            Self::Indexing => "indexing",
            Self::Indexed => "indexed",
            Self::NeedDeletion => "need_deletion",
            Self::Deleted => "deleted",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ItemState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unchanged" => Ok(Self::Unchanged),
            "need_analysis" => Ok(Self::NeedAnalysis),
            "analysing" => Ok(Self::Analysing),
            "need_indexing" => Ok(Self::NeedIndexing),
            "indexing" => Ok(Self::Indexing),
            "indexed" => Ok(Self::Indexed),
            "need_deletion" => Ok(Self::NeedDeletion),
            "deleted" => Ok(Self::Deleted),
            other => Err(format!("unknown item state: {}", other)),
        }
    }
}

/// `os_stat` structured payload, captured at scan time and persisted
/// verbatim (spec §3). Stored as JSON in the catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OsStat {
    pub st_mode: u32,
    pub st_ino: u64,
    pub st_dev: u64,
    pub st_nlink: u64,
    pub st_uid: u32,
    pub st_gid: u32,
    pub st_size: i64,
    pub st_atime: i64,
    pub st_mtime: i64,
    pub st_ctime: i64,
}

#[cfg(unix)]
impl From<&std::fs::Metadata> for OsStat {
    fn from(meta: &std::fs::Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self {
            st_mode: meta.mode(),
            st_ino: meta.ino(),
            st_dev: meta.dev(),
            st_nlink: meta.nlink(),
            st_uid: meta.uid(),
            st_gid: meta.gid(),
            st_size: meta.size() as i64,
            st_atime: meta.atime(),
            st_mtime: meta.mtime(),
            st_ctime: meta.ctime(),
        }
    }
}

#[cfg(not(unix))]
impl From<&std::fs::Metadata> for OsStat {
    fn from(meta: &std::fs::Metadata) -> Self {
        Self {
            st_size: meta.len() as i64,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_display_and_from_str() {
        for state in [
            ItemState::Unchanged,
            ItemState::NeedAnalysis,
            ItemState::Analysing,
            ItemState::NeedIndexing,
            ItemState::Indexing,
            ItemState::Indexed,
            ItemState::NeedDeletion,
            ItemState::Deleted,
        ] {
            let s = state.to_string();
            assert_eq!(ItemState::from_str(&s).unwrap(), state);
        }
    }

    #[test]
    fn in_process_states_are_exactly_the_worker_owned_ones() {
        assert!(ItemState::Analysing.is_in_process());
        assert!(ItemState::NeedIndexing.is_in_process());
        assert!(ItemState::Indexing.is_in_process());
        assert!(!ItemState::Unchanged.is_in_process());
        assert!(!ItemState::NeedAnalysis.is_in_process());
        assert!(!ItemState::Indexed.is_in_process());
        assert!(!ItemState::NeedDeletion.is_in_process());
        assert!(!ItemState::Deleted.is_in_process());
    }
}
