//! Orchestration: locate affected tiles, merge, and commit per tile.

use crate::io::{StoreError, TileStore};
use crate::raster::Raster;
use crate::transform::{patch_tile, NearestResampler};
use anyhow::Result;

/// Drives one patch run against a tile store.
///
/// Each tile's read→merge→write sequence is an independent unit committed on
/// its own: aborting mid-run leaves already-committed tiles merged and the
/// rest untouched. Per-tile failures are reported and skipped; only a store
/// outage aborts the run.
pub struct PatchRunner<S: TileStore> {
    store: S,
}

impl<S: TileStore> PatchRunner<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Identifiers of tiles the patch would touch, without writing anything.
    pub fn affected_tiles(&self, patch: &Raster, category: &str) -> Result<Vec<i64>, StoreError> {
        self.store
            .find_tiles(&patch.footprint_wkt(), patch.srid, category)
    }

    /// Patch every affected tile, committing each one independently.
    pub fn run(&mut self, patch: &Raster, category: &str) -> Result<PatchStats> {
        let rids = self.affected_tiles(patch, category)?;
        tracing::info!(
            "{} tiles intersect the patch footprint (category '{}')",
            rids.len(),
            category
        );

        let resampler = NearestResampler::new(patch);

        let mut stats = PatchStats {
            tiles_matched: rids.len(),
            ..PatchStats::default()
        };

        for rid in rids {
            match self.patch_one(rid, &resampler) {
                Ok(pixels_changed) => {
                    tracing::info!("tile {}: {} pixels changed", rid, pixels_changed);
                    stats.tiles_patched += 1;
                    stats.pixels_changed += pixels_changed;
                }
                Err(err @ StoreError::Unavailable(_)) => {
                    return Err(err.into());
                }
                Err(err) => {
                    tracing::warn!("tile {} skipped: {}", rid, err);
                    stats.failures.push(TileFailure {
                        rid,
                        error: err.to_string(),
                    });
                }
            }
        }

        Ok(stats)
    }

    fn patch_one(&mut self, rid: i64, resampler: &NearestResampler<'_>) -> Result<usize, StoreError> {
        let old = self.store.read_tile(rid)?;
        let outcome = patch_tile(&old, resampler).map_err(|e| StoreError::MalformedRaster {
            rid,
            reason: e.to_string(),
        })?;
        self.store.write_tile(rid, &outcome.raster)?;
        Ok(outcome.pixels_changed)
    }
}

/// A tile that could not be patched.
#[derive(Debug, Clone)]
pub struct TileFailure {
    pub rid: i64,
    pub error: String,
}

/// Statistics from one patch run.
#[derive(Debug, Default)]
pub struct PatchStats {
    /// Tiles whose footprint intersects the patch
    pub tiles_matched: usize,

    /// Tiles merged and committed
    pub tiles_patched: usize,

    /// Total pixels changed across all committed tiles
    pub pixels_changed: usize,

    /// Tiles skipped with their error, by identifier
    pub failures: Vec<TileFailure>,
}

impl PatchStats {
    pub fn tiles_failed(&self) -> usize {
        self.failures.len()
    }
}

impl std::fmt::Display for PatchStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Matched: {}, Patched: {}, Failed: {}, Pixels changed: {}",
            self.tiles_matched,
            self.tiles_patched,
            self.tiles_failed(),
            self.pixels_changed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GeoTransform;
    use crate::io::SqliteTileStore;
    use crate::raster::PATCH_NO_DATA;
    use ndarray::Array2;
    use rusqlite::params;

    fn unit_raster(origin_x: f64, origin_y: f64, size: usize, fill: f64) -> Raster {
        let gt = GeoTransform::north_up(origin_x, origin_y, 1.0, -1.0);
        Raster::new(
            4326,
            gt,
            Array2::from_elem((size, size), fill),
            PATCH_NO_DATA,
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_run_patches_only_intersecting_tiles() {
        let mut store = SqliteTileStore::open_in_memory().unwrap();
        let near = store.insert_tile("rice", &unit_raster(0.0, 4.0, 4, 1.0)).unwrap();
        let far = store
            .insert_tile("rice", &unit_raster(50.0, 54.0, 4, 1.0))
            .unwrap();

        // 2x2 patch of 5s over the upper-left corner of the near tile
        let patch = unit_raster(0.0, 4.0, 2, 5.0);

        let mut runner = PatchRunner::new(store);
        let stats = runner.run(&patch, "rice").unwrap();

        assert_eq!(stats.tiles_matched, 1);
        assert_eq!(stats.tiles_patched, 1);
        assert_eq!(stats.tiles_failed(), 0);
        assert_eq!(stats.pixels_changed, 4);

        let merged = runner.store.read_tile(near).unwrap();
        assert_eq!(merged.samples()[[0, 0]], 5.0);
        assert_eq!(merged.samples()[[1, 1]], 5.0);
        assert_eq!(merged.samples()[[2, 2]], 1.0);

        let untouched = runner.store.read_tile(far).unwrap();
        assert_eq!(untouched.samples(), &Array2::from_elem((4, 4), 1.0));
    }

    #[test]
    fn test_run_skips_category_mismatch() {
        let mut store = SqliteTileStore::open_in_memory().unwrap();
        store.insert_tile("maize", &unit_raster(0.0, 4.0, 4, 1.0)).unwrap();

        let patch = unit_raster(0.0, 4.0, 2, 5.0);
        let mut runner = PatchRunner::new(store);
        let stats = runner.run(&patch, "rice").unwrap();

        assert_eq!(stats.tiles_matched, 0);
        assert_eq!(stats.tiles_patched, 0);
    }

    #[test]
    fn test_run_continues_past_malformed_tile() {
        let mut store = SqliteTileStore::open_in_memory().unwrap();
        let bad = store.insert_tile("rice", &unit_raster(0.0, 4.0, 4, 1.0)).unwrap();
        let good = store.insert_tile("rice", &unit_raster(2.0, 4.0, 4, 1.0)).unwrap();

        // Corrupt the first tile's sample blob
        store
            .raw_connection()
            .execute(
                "UPDATE tiles SET samples = ?1 WHERE rid = ?2",
                params![vec![1u8, 2, 3], bad],
            )
            .unwrap();

        let patch = unit_raster(0.0, 4.0, 4, 5.0);
        let mut runner = PatchRunner::new(store);
        let stats = runner.run(&patch, "rice").unwrap();

        assert_eq!(stats.tiles_matched, 2);
        assert_eq!(stats.tiles_patched, 1);
        assert_eq!(stats.tiles_failed(), 1);
        assert_eq!(stats.failures[0].rid, bad);

        // The good tile was still committed
        let merged = runner.store.read_tile(good).unwrap();
        assert_eq!(merged.samples()[[0, 0]], 5.0);
    }

    #[test]
    fn test_affected_tiles_is_read_only() {
        let mut store = SqliteTileStore::open_in_memory().unwrap();
        let rid = store.insert_tile("rice", &unit_raster(0.0, 4.0, 4, 1.0)).unwrap();

        let patch = unit_raster(0.0, 4.0, 2, 5.0);
        let runner = PatchRunner::new(store);

        assert_eq!(runner.affected_tiles(&patch, "rice").unwrap(), vec![rid]);
        let tile = runner.store.read_tile(rid).unwrap();
        assert_eq!(tile.samples(), &Array2::from_elem((4, 4), 1.0));
    }

    #[test]
    fn test_stats_display() {
        let stats = PatchStats {
            tiles_matched: 3,
            tiles_patched: 2,
            pixels_changed: 40,
            failures: vec![TileFailure {
                rid: 9,
                error: "boom".to_string(),
            }],
        };

        let display = format!("{}", stats);
        assert!(display.contains("Matched: 3"));
        assert!(display.contains("Patched: 2"));
        assert!(display.contains("Failed: 1"));
        assert!(display.contains("Pixels changed: 40"));
    }
}
