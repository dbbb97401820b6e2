//! ESRI ASCII grid codec.
//!
//! Reads the patch raster from an `.asc` file and writes rasters back out in
//! the same format. Both the single `cellsize` header and the `dx`/`dy` pair
//! (non-square cells) are accepted; the first data row is the northernmost
//! row. A missing `nodata_value` defaults to the patch sentinel.

use crate::grid::GeoTransform;
use crate::raster::{Raster, PATCH_NO_DATA};
use anyhow::{bail, Context, Result};
use ndarray::Array2;
use std::fmt::Write as _;
use std::path::Path;

/// Read an ASCII grid file into a raster.
///
/// The raster carries no store identity and defaults to SRID 4326; callers
/// override via [`Raster::with_srid`].
pub fn open(path: &Path) -> Result<Raster> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read raster file: {}", path.display()))?;

    let mut ncols: Option<usize> = None;
    let mut nrows: Option<usize> = None;
    let mut xllcorner: Option<f64> = None;
    let mut yllcorner: Option<f64> = None;
    let mut cellsize: Option<f64> = None;
    let mut dx: Option<f64> = None;
    let mut dy: Option<f64> = None;
    let mut nodata = PATCH_NO_DATA;

    let mut lines = contents.lines();
    let mut data_start: Option<&str> = None;

    for line in lines.by_ref() {
        let mut parts = line.split_whitespace();
        let Some(key) = parts.next() else { continue };

        // Header ends at the first line that does not start with a keyword
        if key.chars().next().is_some_and(|c| c.is_ascii_digit() || c == '-') {
            data_start = Some(line);
            break;
        }

        let value = parts
            .next()
            .with_context(|| format!("header line '{line}' has no value"))?;

        match key.to_ascii_lowercase().as_str() {
            "ncols" => ncols = Some(value.parse().context("invalid ncols")?),
            "nrows" => nrows = Some(value.parse().context("invalid nrows")?),
            "xllcorner" => xllcorner = Some(value.parse().context("invalid xllcorner")?),
            "yllcorner" => yllcorner = Some(value.parse().context("invalid yllcorner")?),
            "cellsize" => cellsize = Some(value.parse().context("invalid cellsize")?),
            "dx" => dx = Some(value.parse().context("invalid dx")?),
            "dy" => dy = Some(value.parse().context("invalid dy")?),
            "nodata_value" => nodata = value.parse().context("invalid nodata_value")?,
            other => bail!("unrecognized header keyword '{other}'"),
        }
    }

    let ncols = ncols.context("missing ncols header")?;
    let nrows = nrows.context("missing nrows header")?;
    let xllcorner = xllcorner.context("missing xllcorner header")?;
    let yllcorner = yllcorner.context("missing yllcorner header")?;
    let (dx, dy) = match (cellsize, dx, dy) {
        (Some(c), None, None) => (c, c),
        (None, Some(dx), Some(dy)) => (dx, dy),
        _ => bail!("expected either cellsize or both dx and dy"),
    };
    if dx <= 0.0 || dy <= 0.0 {
        bail!("cell sizes must be positive");
    }

    let mut values = Vec::with_capacity(nrows * ncols);
    for line in data_start.into_iter().chain(lines) {
        for token in line.split_whitespace() {
            values.push(
                token
                    .parse::<f64>()
                    .with_context(|| format!("invalid sample value '{token}'"))?,
            );
        }
    }
    if values.len() != nrows * ncols {
        bail!(
            "expected {} samples ({}x{}), found {}",
            nrows * ncols,
            nrows,
            ncols,
            values.len()
        );
    }

    // First data row is the northernmost: origin sits above the lower-left
    // corner by the full grid height.
    let geotransform =
        GeoTransform::north_up(xllcorner, yllcorner + nrows as f64 * dy, dx, -dy);
    let samples = Array2::from_shape_vec((nrows, ncols), values)?;

    Ok(Raster::new(4326, geotransform, samples, nodata, None)?)
}

/// Write sample values to an ASCII grid file, taking georeferencing and the
/// no-data sentinel from a template raster.
///
/// The samples must match the template's shape; everything else about the
/// template (geotransform, nodata) is preserved.
pub fn write(path: &Path, template: &Raster, samples: &Array2<f64>) -> Result<()> {
    if samples.dim() != (template.rows(), template.cols()) {
        bail!(
            "sample shape {:?} does not match template shape ({}, {})",
            samples.dim(),
            template.rows(),
            template.cols()
        );
    }

    let gt = template.geotransform;
    if gt.x_skew != 0.0 || gt.y_skew != 0.0 {
        bail!("ASCII grid output requires a north-up geotransform");
    }

    let (rows, cols) = samples.dim();
    let dx = gt.pixel_width;
    let dy = -gt.pixel_height;
    let yllcorner = gt.origin_y - rows as f64 * dy;

    let mut out = String::new();
    writeln!(out, "ncols {cols}")?;
    writeln!(out, "nrows {rows}")?;
    writeln!(out, "xllcorner {}", gt.origin_x)?;
    writeln!(out, "yllcorner {yllcorner}")?;
    if dx == dy {
        writeln!(out, "cellsize {dx}")?;
    } else {
        writeln!(out, "dx {dx}")?;
        writeln!(out, "dy {dy}")?;
    }
    writeln!(out, "nodata_value {}", template.no_data)?;

    for row in samples.rows() {
        let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        writeln!(out, "{}", line.join(" "))?;
    }

    std::fs::write(path, out)
        .with_context(|| format!("failed to write raster file: {}", path.display()))?;

    Ok(())
}
