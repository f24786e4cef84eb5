//! Incremental filesystem indexer: walks a directory tree, extracts text
//! and metadata via a content-analysis service, and publishes documents
//! into a search index.

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod mime;
pub mod operations;
