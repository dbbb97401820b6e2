//! Grid geometry: mapping between pixel indices and world coordinates.
//!
//! All functions here are pure derivations from a raster's geotransform and
//! shape. Nearest-neighbor lookups elsewhere rely on *pixel-center*
//! coordinates, so the center helpers add the half-pixel offset.

use geo_types::{LineString, Polygon};
use serde::{Deserialize, Serialize};

/// Affine mapping from pixel indices to world coordinates.
///
/// Coefficients follow the GDAL ordering
/// `(origin_x, pixel_width, x_skew, origin_y, y_skew, pixel_height)`.
/// For a north-up raster the skews are zero and `pixel_height` is negative:
/// row 0 is the northernmost row and rows grow south.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner of pixel (0, 0)
    pub origin_x: f64,

    /// Pixel size along the x axis
    pub pixel_width: f64,

    /// Row rotation term (0 for north-up rasters)
    pub x_skew: f64,

    /// Y coordinate of the upper-left corner of pixel (0, 0)
    pub origin_y: f64,

    /// Column rotation term (0 for north-up rasters)
    pub y_skew: f64,

    /// Pixel size along the y axis (negative for north-up rasters)
    pub pixel_height: f64,
}

impl GeoTransform {
    /// Create a north-up geotransform with no rotation.
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            pixel_width,
            x_skew: 0.0,
            origin_y,
            y_skew: 0.0,
            pixel_height,
        }
    }

    /// Create from a GDAL-style coefficient array.
    pub fn from_coeffs(coeffs: [f64; 6]) -> Self {
        Self {
            origin_x: coeffs[0],
            pixel_width: coeffs[1],
            x_skew: coeffs[2],
            origin_y: coeffs[3],
            y_skew: coeffs[4],
            pixel_height: coeffs[5],
        }
    }

    /// Convert to a GDAL-style coefficient array.
    pub fn to_coeffs(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.x_skew,
            self.origin_y,
            self.y_skew,
            self.pixel_height,
        ]
    }

    /// World coordinates of the upper-left corner of pixel `(col, row)`.
    ///
    /// `col` and `row` may equal the raster's full extent to address the
    /// lower-right corner of the grid.
    pub fn pixel_corner(&self, col: usize, row: usize) -> (f64, f64) {
        let (c, r) = (col as f64, row as f64);
        let x = self.origin_x + c * self.pixel_width + r * self.x_skew;
        let y = self.origin_y + c * self.y_skew + r * self.pixel_height;
        (x, y)
    }

    /// World coordinates of the *center* of pixel `(col, row)`.
    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        let (c, r) = (col as f64 + 0.5, row as f64 + 0.5);
        let x = self.origin_x + c * self.pixel_width + r * self.x_skew;
        let y = self.origin_y + c * self.y_skew + r * self.pixel_height;
        (x, y)
    }

    /// X coordinates of the pixel centers of every column.
    pub fn x_centers(&self, cols: usize) -> Vec<f64> {
        (0..cols)
            .map(|c| self.origin_x + (c as f64 + 0.5) * self.pixel_width)
            .collect()
    }

    /// Y coordinates of the pixel centers of every row.
    ///
    /// Descending for north-up rasters (negative `pixel_height`).
    pub fn y_centers(&self, rows: usize) -> Vec<f64> {
        (0..rows)
            .map(|r| self.origin_y + (r as f64 + 0.5) * self.pixel_height)
            .collect()
    }

    /// Bounding rectangle `[min_x, min_y, max_x, max_y]` of a grid with the
    /// given shape, derived from the corners at pixel (0, 0) and
    /// pixel (cols, rows).
    pub fn bounds(&self, cols: usize, rows: usize) -> [f64; 4] {
        let corners = [
            self.pixel_corner(0, 0),
            self.pixel_corner(cols, 0),
            self.pixel_corner(cols, rows),
            self.pixel_corner(0, rows),
        ];

        let mut min_x = f64::MAX;
        let mut min_y = f64::MAX;
        let mut max_x = f64::MIN;
        let mut max_y = f64::MIN;
        for (x, y) in corners {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }

        [min_x, min_y, max_x, max_y]
    }

    /// Four-corner bounding polygon of a grid with the given shape.
    ///
    /// Ring order: upper-left, upper-right, lower-right, lower-left, closed
    /// back on the upper-left.
    pub fn footprint(&self, cols: usize, rows: usize) -> Polygon<f64> {
        let ul = self.pixel_corner(0, 0);
        let ur = self.pixel_corner(cols, 0);
        let lr = self.pixel_corner(cols, rows);
        let ll = self.pixel_corner(0, rows);

        Polygon::new(LineString::from(vec![ul, ur, lr, ll, ul]), vec![])
    }
}
