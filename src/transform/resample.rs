//! Nearest-neighbor resampling over a patch raster's pixel-center grid.

use crate::raster::Raster;
use ndarray::Array2;

/// Nearest-neighbor interpolant over one raster's pixel-center grid.
///
/// Built once from the patch raster and reused for every affected tile.
/// Each axis is matched independently against the uniform center grid, which
/// for uniform spacing is equivalent to Euclidean nearest in `(y, x)` space.
/// Queries outside the center-domain extents return the raster's no-data
/// value rather than extrapolating; ties between two equidistant centers
/// resolve toward the lower index. Lookups are pure and deterministic.
///
/// Skew terms are ignored: the center grid is treated as axis-aligned, the
/// convention of the mosaic this tool maintains.
#[derive(Debug)]
pub struct NearestResampler<'a> {
    samples: &'a Array2<f64>,
    no_data: f64,

    /// First x center and x step (signed)
    x0: f64,
    dx: f64,
    cols: usize,

    /// First y center and y step (signed, negative for north-up)
    y0: f64,
    dy: f64,
    rows: usize,

    /// Inclusive center-domain extents per axis
    x_extent: (f64, f64),
    y_extent: (f64, f64),
}

impl<'a> NearestResampler<'a> {
    /// Build the interpolant from the patch raster.
    pub fn new(patch: &'a Raster) -> Self {
        let gt = &patch.geotransform;
        let (rows, cols) = patch.samples().dim();

        let x0 = gt.origin_x + gt.pixel_width / 2.0;
        let y0 = gt.origin_y + gt.pixel_height / 2.0;
        let x_last = x0 + (cols - 1) as f64 * gt.pixel_width;
        let y_last = y0 + (rows - 1) as f64 * gt.pixel_height;

        Self {
            samples: patch.samples(),
            no_data: patch.no_data,
            x0,
            dx: gt.pixel_width,
            cols,
            y0,
            dy: gt.pixel_height,
            rows,
            x_extent: (x0.min(x_last), x0.max(x_last)),
            y_extent: (y0.min(y_last), y0.max(y_last)),
        }
    }

    /// The fill value returned for out-of-domain queries.
    pub fn no_data(&self) -> f64 {
        self.no_data
    }

    /// Nearest index along one axis; ties resolve toward the lower index.
    fn nearest_index(query: f64, first: f64, step: f64, len: usize) -> usize {
        let t = (query - first) / step;
        let idx = (t - 0.5).ceil();
        idx.clamp(0.0, (len - 1) as f64) as usize
    }

    fn in_domain(&self, x: f64, y: f64) -> bool {
        x >= self.x_extent.0 && x <= self.x_extent.1 && y >= self.y_extent.0 && y <= self.y_extent.1
    }

    /// Value of the patch pixel whose center is nearest to `(x, y)`, or the
    /// no-data fill when the point lies outside the center domain.
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        if !self.in_domain(x, y) {
            return self.no_data;
        }

        let col = Self::nearest_index(x, self.x0, self.dx, self.cols);
        let row = Self::nearest_index(y, self.y0, self.dy, self.rows);
        self.samples[[row, col]]
    }

    /// Resample a set of query coordinates.
    pub fn lookup(&self, coords: &[(f64, f64)]) -> Vec<f64> {
        coords.iter().map(|&(x, y)| self.sample(x, y)).collect()
    }
}
