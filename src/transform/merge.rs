//! Merging a resampled patch into an existing tile.

use crate::raster::{Raster, RasterError};
use crate::transform::NearestResampler;

/// Result of patching one tile.
#[derive(Debug)]
pub struct MergeOutcome {
    /// The merged raster; same shape, geotransform, CRS, and identity as the
    /// input tile
    pub raster: Raster,

    /// Number of pixels whose merged value differs from the original
    /// (diagnostic only)
    pub pixels_changed: usize,
}

/// Overwrite a tile's pixels with the patch wherever the patch has data.
///
/// The patch is resampled onto every pixel center of the tile's own grid;
/// no grid congruence between the two rasters is assumed. Per pixel, the
/// resampled value wins unless it equals the patch's no-data sentinel, in
/// which case the tile's original value is kept. Tiles fully outside the
/// patch extent therefore come back pixel-identical, and patch no-data
/// pixels never punch holes into tiles the patch covers.
pub fn patch_tile(
    old: &Raster,
    resampler: &NearestResampler<'_>,
) -> Result<MergeOutcome, RasterError> {
    let (rows, cols) = old.samples().dim();
    let no_data = resampler.no_data();

    let mut merged = old.samples().clone();
    let mut pixels_changed = 0;

    for row in 0..rows {
        for col in 0..cols {
            let (x, y) = old.geotransform.pixel_center(col, row);
            let value = resampler.sample(x, y);
            if value == no_data {
                continue;
            }
            if merged[[row, col]] != value {
                pixels_changed += 1;
            }
            merged[[row, col]] = value;
        }
    }

    Ok(MergeOutcome {
        raster: old.with_samples(merged)?,
        pixels_changed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GeoTransform;
    use crate::raster::PATCH_NO_DATA;
    use ndarray::{array, Array2};

    fn tile(origin_x: f64, origin_y: f64, samples: Array2<f64>, rid: i64) -> Raster {
        let gt = GeoTransform::north_up(origin_x, origin_y, 1.0, -1.0);
        Raster::new(4326, gt, samples, 0.0, Some(rid)).unwrap()
    }

    fn patch(origin_x: f64, origin_y: f64, samples: Array2<f64>) -> Raster {
        let gt = GeoTransform::north_up(origin_x, origin_y, 1.0, -1.0);
        Raster::new(4326, gt, samples, PATCH_NO_DATA, None).unwrap()
    }

    #[test]
    fn test_corner_overlap_scenario() {
        // 4x4 tile of 1s covering [0,4]x[0,4]; 2x2 patch of 5s sharing the
        // upper-left corner.
        let old = tile(0.0, 4.0, Array2::ones((4, 4)), 7);
        let new = patch(0.0, 4.0, Array2::from_elem((2, 2), 5.0));

        let interp = NearestResampler::new(&new);
        let outcome = patch_tile(&old, &interp).unwrap();

        assert_eq!(outcome.pixels_changed, 4);
        let merged = outcome.raster.samples();
        for row in 0..4 {
            for col in 0..4 {
                let expected = if row < 2 && col < 2 { 5.0 } else { 1.0 };
                assert_eq!(merged[[row, col]], expected, "pixel ({row}, {col})");
            }
        }
    }

    #[test]
    fn test_disjoint_patch_leaves_tile_untouched() {
        let old = tile(0.0, 4.0, Array2::ones((4, 4)), 7);
        let new = patch(100.0, 104.0, Array2::from_elem((2, 2), 5.0));

        let interp = NearestResampler::new(&new);
        let outcome = patch_tile(&old, &interp).unwrap();

        assert_eq!(outcome.pixels_changed, 0);
        assert_eq!(outcome.raster.samples(), old.samples());
    }

    #[test]
    fn test_all_no_data_patch_is_a_noop() {
        let old = tile(0.0, 4.0, Array2::from_elem((4, 4), 3.0), 1);
        let new = patch(0.0, 4.0, Array2::from_elem((4, 4), PATCH_NO_DATA));

        let interp = NearestResampler::new(&new);
        let outcome = patch_tile(&old, &interp).unwrap();

        assert_eq!(outcome.pixels_changed, 0);
        assert_eq!(outcome.raster.samples(), old.samples());
    }

    #[test]
    fn test_patch_no_data_pixels_fall_back_to_old_values() {
        let old = tile(0.0, 2.0, array![[1.0, 2.0], [3.0, 4.0]], 1);
        let new = patch(0.0, 2.0, array![[9.0, PATCH_NO_DATA], [PATCH_NO_DATA, 9.0]]);

        let interp = NearestResampler::new(&new);
        let outcome = patch_tile(&old, &interp).unwrap();

        assert_eq!(outcome.raster.samples(), &array![[9.0, 2.0], [3.0, 9.0]]);
        assert_eq!(outcome.pixels_changed, 2);
    }

    #[test]
    fn test_finer_patch_maps_nearest_centers() {
        // 2x2 tile with unit cells; patch at half resolution, fully covering.
        // Every tile center is equidistant between two patch centers on each
        // axis, so the result pins down the tie-break (toward the lower
        // index): tile pixel (0, 0) at (0.5, 1.5) snaps to patch cell (0, 0).
        let old = tile(0.0, 2.0, Array2::zeros((2, 2)), 1);
        let gt = GeoTransform::north_up(0.0, 2.0, 0.5, -0.5);
        let samples = array![
            [1.0, 2.0, 3.0, 4.0],
            [5.0, 6.0, 7.0, 8.0],
            [9.0, 10.0, 11.0, 12.0],
            [13.0, 14.0, 15.0, 16.0],
        ];
        let new = Raster::new(4326, gt, samples, PATCH_NO_DATA, None).unwrap();

        let interp = NearestResampler::new(&new);
        let outcome = patch_tile(&old, &interp).unwrap();

        assert_eq!(
            outcome.raster.samples(),
            &array![[1.0, 3.0], [9.0, 11.0]]
        );
        assert_eq!(outcome.pixels_changed, 4);
    }

    #[test]
    fn test_metadata_preserved() {
        let old = tile(10.0, 20.0, Array2::ones((3, 3)), 42);
        let new = patch(10.0, 20.0, Array2::from_elem((3, 3), 2.0));

        let interp = NearestResampler::new(&new);
        let outcome = patch_tile(&old, &interp).unwrap();

        assert_eq!(outcome.raster.rid, Some(42));
        assert_eq!(outcome.raster.srid, old.srid);
        assert_eq!(outcome.raster.geotransform, old.geotransform);
        assert_eq!(outcome.raster.samples().dim(), (3, 3));
        // Input raster not mutated
        assert_eq!(old.samples(), &Array2::<f64>::ones((3, 3)));
    }

    #[test]
    fn test_changed_count_ignores_equal_overwrites() {
        // Patch value equals the old value for half the pixels
        let old = tile(0.0, 2.0, array![[5.0, 1.0], [5.0, 1.0]], 1);
        let new = patch(0.0, 2.0, Array2::from_elem((2, 2), 5.0));

        let interp = NearestResampler::new(&new);
        let outcome = patch_tile(&old, &interp).unwrap();

        assert_eq!(outcome.pixels_changed, 2);
        assert_eq!(outcome.raster.samples(), &Array2::from_elem((2, 2), 5.0));
    }
}
