//! Mosaic Patch
//!
//! Patches a tiled georeferenced raster mosaic held in a spatial database
//! with a smaller "patch" raster: every tile intersecting the patch
//! footprint gets its pixels overwritten where the patch has data, while
//! pixels outside the patch (or under its no-data sentinel) keep their
//! original values. All rasters share one CRS; each tile is read, merged,
//! and committed independently.
//!
//! # Architecture
//!
//! - **Raster / Grid**: immutable raster value object and pure grid geometry
//! - **I/O**: the tile store adapter (SQLite) and the ASCII grid codec
//! - **Transform**: nearest-neighbor resampling and the no-data-aware merge
//! - **Pipeline**: per-tile orchestration with independent commits
//!
//! # Usage
//!
//! ```no_run
//! use mosaic_patch::{run_patch, Config};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::from_file(&"config.yaml".into())?;
//!     run_patch(&config)?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod grid;
pub mod io;
pub mod pipeline;
pub mod raster;
pub mod transform;

pub use config::Config;
pub use grid::GeoTransform;
pub use io::{SqliteTileStore, StoreError, TileStore};
pub use pipeline::{PatchRunner, PatchStats};
pub use raster::{Raster, PATCH_NO_DATA};
pub use transform::{patch_tile, MergeOutcome, NearestResampler};

use anyhow::Result;
use std::path::Path;

/// Load and normalize the patch raster named by the configuration.
///
/// The raster's no-data convention (from the file header or the configured
/// override) is rewritten to the fixed [`PATCH_NO_DATA`] sentinel the merge
/// rule keys on.
pub fn load_patch(config: &Config) -> Result<Raster> {
    let mut patch = io::asc::open(Path::new(&config.patch.path))?.with_srid(config.patch.srid);

    if let Some(source_no_data) = config.patch.source_no_data {
        patch = patch.with_no_data(source_no_data);
    }

    Ok(patch.normalize_no_data(PATCH_NO_DATA))
}

/// Run a full patch pass with the given configuration.
pub fn run_patch(config: &Config) -> Result<PatchStats> {
    config.validate()?;

    tracing::info!("Loading patch raster from {}", config.patch.path);
    let patch = load_patch(config)?;

    let bounds = patch.bounds();
    tracing::info!(
        "Patch: {}x{} pixels, bounds [{:.4}, {:.4}, {:.4}, {:.4}], EPSG:{}",
        patch.rows(),
        patch.cols(),
        bounds[0],
        bounds[1],
        bounds[2],
        bounds[3],
        patch.srid
    );

    tracing::info!("Opening tile store at {}", config.store.database);
    let store = SqliteTileStore::open(&config.store.database)?;

    let mut runner = PatchRunner::new(store);
    let stats = runner.run(&patch, &config.patch.category)?;

    tracing::info!("Patch run complete: {}", stats);

    Ok(stats)
}
