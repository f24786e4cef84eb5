//! Domain types shared by every stage of the pipeline.

mod item;

pub use item::{ItemState, OsStat, IN_PROCESS_STATES};
