//! Everything that talks to the outside world: the catalog database,
//! the extraction and search HTTP services, and the CLI surface.

pub mod cli;
pub mod database;
pub mod extract;
pub mod search;
