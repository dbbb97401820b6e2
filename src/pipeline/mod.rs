//! Run orchestration and statistics.

mod runner;

pub use runner::{PatchRunner, PatchStats, TileFailure};
