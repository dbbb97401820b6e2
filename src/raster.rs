//! In-memory raster value object.
//!
//! A [`Raster`] is immutable once constructed: the merge engine produces a
//! fresh raster rather than mutating its input, so no two rasters ever alias
//! the same sample buffer.

use crate::grid::GeoTransform;
use geo_types::Polygon;
use ndarray::Array2;
use thiserror::Error;
use wkt::ToWkt;

/// No-data sentinel carried by the patch raster.
///
/// Any resampled value equal to this sentinel is treated as "no observation"
/// by the merge rule, even though -99 could in principle be a legitimate
/// domain value. This matches the upstream data convention.
pub const PATCH_NO_DATA: f64 = -99.0;

/// Construction-time validation failures.
#[derive(Debug, Error)]
pub enum RasterError {
    #[error("raster grid has a zero-sized dimension ({rows}x{cols})")]
    EmptyGrid { rows: usize, cols: usize },

    #[error("geotransform has a zero pixel size")]
    ZeroPixelSize,

    #[error("sample shape {got:?} does not match raster shape {want:?}")]
    ShapeMismatch {
        want: (usize, usize),
        got: (usize, usize),
    },
}

/// A single georeferenced grid.
///
/// Samples are indexed `[row][col]` with rows growing south and columns
/// growing east.
#[derive(Debug, Clone)]
pub struct Raster {
    /// Numeric CRS identifier (EPSG code); must match across all rasters in
    /// one merge operation
    pub srid: i32,

    /// Pixel-to-world affine mapping
    pub geotransform: GeoTransform,

    /// No-data sentinel for this raster's samples
    pub no_data: f64,

    /// Store identity: present for store-resident tiles, `None` for the
    /// patch raster
    pub rid: Option<i64>,

    samples: Array2<f64>,
}

impl Raster {
    /// Create a raster, validating shape and geotransform consistency.
    pub fn new(
        srid: i32,
        geotransform: GeoTransform,
        samples: Array2<f64>,
        no_data: f64,
        rid: Option<i64>,
    ) -> Result<Self, RasterError> {
        let (rows, cols) = samples.dim();
        if rows == 0 || cols == 0 {
            return Err(RasterError::EmptyGrid { rows, cols });
        }
        if geotransform.pixel_width == 0.0 || geotransform.pixel_height == 0.0 {
            return Err(RasterError::ZeroPixelSize);
        }

        Ok(Self {
            srid,
            geotransform,
            no_data,
            rid,
            samples,
        })
    }

    /// Number of rows (y axis).
    pub fn rows(&self) -> usize {
        self.samples.nrows()
    }

    /// Number of columns (x axis).
    pub fn cols(&self) -> usize {
        self.samples.ncols()
    }

    /// Sample grid, `[row][col]`.
    pub fn samples(&self) -> &Array2<f64> {
        &self.samples
    }

    /// Bounding rectangle `[min_x, min_y, max_x, max_y]` in world coordinates.
    pub fn bounds(&self) -> [f64; 4] {
        self.geotransform.bounds(self.cols(), self.rows())
    }

    /// Four-corner bounding polygon in world coordinates.
    pub fn footprint(&self) -> Polygon<f64> {
        self.geotransform.footprint(self.cols(), self.rows())
    }

    /// Footprint as well-known text, the store's spatial query key.
    pub fn footprint_wkt(&self) -> String {
        self.footprint().wkt_string()
    }

    /// Same raster with a different CRS identifier.
    pub fn with_srid(mut self, srid: i32) -> Self {
        self.srid = srid;
        self
    }

    /// Same raster reinterpreted with a different no-data sentinel.
    ///
    /// Sample values are unchanged; only the sentinel is replaced.
    pub fn with_no_data(mut self, no_data: f64) -> Self {
        self.no_data = no_data;
        self
    }

    /// New raster with every pixel equal to the current sentinel rewritten
    /// to `sentinel`, which becomes the raster's no-data value.
    pub fn normalize_no_data(self, sentinel: f64) -> Self {
        if self.no_data == sentinel {
            return self;
        }
        let old = self.no_data;
        let samples = self.samples.mapv(|v| if v == old { sentinel } else { v });
        Self {
            no_data: sentinel,
            samples,
            ..self
        }
    }

    /// New raster with identical metadata but replaced samples.
    ///
    /// The replacement must have the same shape; this is the merge engine's
    /// output path.
    pub fn with_samples(&self, samples: Array2<f64>) -> Result<Self, RasterError> {
        if samples.dim() != self.samples.dim() {
            return Err(RasterError::ShapeMismatch {
                want: self.samples.dim(),
                got: samples.dim(),
            });
        }

        Ok(Self {
            srid: self.srid,
            geotransform: self.geotransform,
            no_data: self.no_data,
            rid: self.rid,
            samples,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn unit_raster(samples: Array2<f64>) -> Raster {
        let rows = samples.nrows();
        let gt = GeoTransform::north_up(0.0, rows as f64, 1.0, -1.0);
        Raster::new(4326, gt, samples, PATCH_NO_DATA, None).unwrap()
    }

    #[test]
    fn test_new_rejects_empty_grid() {
        let gt = GeoTransform::north_up(0.0, 0.0, 1.0, -1.0);
        let result = Raster::new(4326, gt, Array2::zeros((0, 4)), -99.0, None);
        assert!(matches!(result, Err(RasterError::EmptyGrid { .. })));
    }

    #[test]
    fn test_new_rejects_zero_pixel_size() {
        let gt = GeoTransform::north_up(0.0, 0.0, 0.0, -1.0);
        let result = Raster::new(4326, gt, Array2::zeros((2, 2)), -99.0, None);
        assert!(matches!(result, Err(RasterError::ZeroPixelSize)));
    }

    #[test]
    fn test_footprint_wkt_matches_extent() {
        let raster = unit_raster(Array2::ones((4, 4)));
        let wkt = raster.footprint_wkt();

        assert!(wkt.starts_with("POLYGON"));
        assert!(wkt.contains("0 4"));
        assert!(wkt.contains("4 0"));
    }

    #[test]
    fn test_bounds() {
        let raster = unit_raster(Array2::ones((3, 5)));
        assert_eq!(raster.bounds(), [0.0, 0.0, 5.0, 3.0]);
    }

    #[test]
    fn test_normalize_no_data_rewrites_sentinel_pixels() {
        let raster = unit_raster(array![[0.0, 7.0], [0.0, 3.0]]).with_no_data(0.0);
        let normalized = raster.normalize_no_data(-99.0);

        assert_eq!(normalized.no_data, -99.0);
        assert_eq!(normalized.samples(), &array![[-99.0, 7.0], [-99.0, 3.0]]);
    }

    #[test]
    fn test_normalize_no_data_noop_when_already_normalized() {
        let raster = unit_raster(array![[-99.0, 7.0], [1.0, 3.0]]);
        let normalized = raster.normalize_no_data(-99.0);
        assert_eq!(normalized.samples(), &array![[-99.0, 7.0], [1.0, 3.0]]);
    }

    #[test]
    fn test_with_samples_checks_shape() {
        let raster = unit_raster(Array2::ones((4, 4)));

        assert!(raster.with_samples(Array2::zeros((4, 4))).is_ok());
        assert!(matches!(
            raster.with_samples(Array2::zeros((2, 4))),
            Err(RasterError::ShapeMismatch { .. })
        ));
    }
}
