//! Tile store: the backing spatial database holding the mosaic.
//!
//! The [`TileStore`] trait is the orchestrator's only view of persistence.
//! [`SqliteTileStore`] backs it with a single-file SQLite database: the
//! category filter runs in SQL, the spatial test (patch polygon against the
//! convex hull of each stored footprint) runs in-process with `geo`, and
//! each tile write commits in its own transaction.

use crate::grid::GeoTransform;
use crate::raster::Raster;
use geo::{ConvexHull, Intersects};
use geo_types::Polygon;
use ndarray::Array2;
use rusqlite::{params, Connection};
use std::path::Path;
use thiserror::Error;
use wkt::TryFromWkt;

/// Store failure taxonomy.
///
/// `Unavailable` aborts a patch run; the per-tile variants are reported for
/// the failing tile and the run continues.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("tile store unavailable: {0}")]
    Unavailable(String),

    #[error("tile {rid}: malformed raster: {reason}")]
    MalformedRaster { rid: i64, reason: String },

    #[error("tile {rid}: write failed: {reason}")]
    WriteFailure { rid: i64, reason: String },
}

/// The backing store's raster interface.
pub trait TileStore {
    /// Identifiers of tiles whose stored footprint's convex hull intersects
    /// the given polygon (WKT, in the CRS named by `srid`) and whose
    /// category matches, in ascending order.
    fn find_tiles(
        &self,
        footprint_wkt: &str,
        srid: i32,
        category: &str,
    ) -> Result<Vec<i64>, StoreError>;

    /// Materialize one stored tile as a raster.
    fn read_tile(&self, rid: i64) -> Result<Raster, StoreError>;

    /// Replace one stored tile's content wholesale, atomically.
    ///
    /// On failure the original tile must remain in place.
    fn write_tile(&mut self, rid: i64, raster: &Raster) -> Result<(), StoreError>;
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tiles (
    rid          INTEGER PRIMARY KEY,
    category     TEXT NOT NULL,
    srid         INTEGER NOT NULL,
    footprint    TEXT NOT NULL,
    origin_x     REAL NOT NULL,
    pixel_width  REAL NOT NULL,
    x_skew       REAL NOT NULL,
    origin_y     REAL NOT NULL,
    y_skew       REAL NOT NULL,
    pixel_height REAL NOT NULL,
    rows         INTEGER NOT NULL,
    cols         INTEGER NOT NULL,
    nodata       REAL NOT NULL,
    samples      BLOB NOT NULL
);
CREATE INDEX IF NOT EXISTS tiles_category ON tiles (category);
";

/// SQLite-backed tile store.
pub struct SqliteTileStore {
    conn: Connection,
}

impl SqliteTileStore {
    /// Open (creating if needed) a tile database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(unavailable)?;
        Self::from_connection(conn)
    }

    /// Open a transient in-memory tile database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(unavailable)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA).map_err(unavailable)?;
        Ok(Self { conn })
    }

    /// Insert a new tile, returning its assigned identifier.
    ///
    /// The footprint is derived from the raster's geotransform and shape.
    pub fn insert_tile(&mut self, category: &str, raster: &Raster) -> Result<i64, StoreError> {
        let gt = raster.geotransform;
        self.conn
            .execute(
                "INSERT INTO tiles (category, srid, footprint,
                     origin_x, pixel_width, x_skew, origin_y, y_skew, pixel_height,
                     rows, cols, nodata, samples)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    category,
                    raster.srid,
                    raster.footprint_wkt(),
                    gt.origin_x,
                    gt.pixel_width,
                    gt.x_skew,
                    gt.origin_y,
                    gt.y_skew,
                    gt.pixel_height,
                    raster.rows() as i64,
                    raster.cols() as i64,
                    raster.no_data,
                    encode_samples(raster.samples()),
                ],
            )
            .map_err(unavailable)?;

        Ok(self.conn.last_insert_rowid())
    }

    /// Number of stored tiles.
    pub fn len(&self) -> Result<usize, StoreError> {
        self.conn
            .query_row("SELECT COUNT(*) FROM tiles", [], |row| row.get::<_, i64>(0))
            .map(|n| n as usize)
            .map_err(unavailable)
    }

    /// Whether the store holds no tiles.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    #[cfg(test)]
    pub(crate) fn raw_connection(&self) -> &Connection {
        &self.conn
    }
}

impl TileStore for SqliteTileStore {
    fn find_tiles(
        &self,
        footprint_wkt: &str,
        srid: i32,
        category: &str,
    ) -> Result<Vec<i64>, StoreError> {
        let query: Polygon<f64> = Polygon::try_from_wkt_str(footprint_wkt)
            .map_err(|e| StoreError::Unavailable(format!("invalid query polygon: {e}")))?;

        let mut stmt = self
            .conn
            .prepare(
                "SELECT rid, footprint FROM tiles
                 WHERE category = ?1 AND srid = ?2
                 ORDER BY rid",
            )
            .map_err(unavailable)?;

        let rows = stmt
            .query_map(params![category, srid], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(unavailable)?;

        let mut rids = Vec::new();
        for row in rows {
            let (rid, footprint) = row.map_err(unavailable)?;
            let tile_poly: Polygon<f64> = match Polygon::try_from_wkt_str(&footprint) {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!("tile {}: unreadable footprint, skipping: {}", rid, e);
                    continue;
                }
            };
            if tile_poly.convex_hull().intersects(&query) {
                rids.push(rid);
            }
        }

        Ok(rids)
    }

    fn read_tile(&self, rid: i64) -> Result<Raster, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT srid, origin_x, pixel_width, x_skew, origin_y, y_skew, pixel_height,
                        rows, cols, nodata, samples
                 FROM tiles WHERE rid = ?1",
                params![rid],
                |row| {
                    Ok((
                        row.get::<_, i32>(0)?,
                        [
                            row.get::<_, f64>(1)?,
                            row.get::<_, f64>(2)?,
                            row.get::<_, f64>(3)?,
                            row.get::<_, f64>(4)?,
                            row.get::<_, f64>(5)?,
                            row.get::<_, f64>(6)?,
                        ],
                        row.get::<_, i64>(7)?,
                        row.get::<_, i64>(8)?,
                        row.get::<_, f64>(9)?,
                        row.get::<_, Vec<u8>>(10)?,
                    ))
                },
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::MalformedRaster {
                    rid,
                    reason: "no such tile".to_string(),
                },
                other => unavailable(other),
            })?;

        let (srid, coeffs, rows, cols, nodata, blob) = row;
        let (rows, cols) = (rows as usize, cols as usize);

        let samples = decode_samples(&blob, rows, cols)
            .map_err(|reason| StoreError::MalformedRaster { rid, reason })?;

        Raster::new(
            srid,
            GeoTransform::from_coeffs(coeffs),
            samples,
            nodata,
            Some(rid),
        )
        .map_err(|e| StoreError::MalformedRaster {
            rid,
            reason: e.to_string(),
        })
    }

    fn write_tile(&mut self, rid: i64, raster: &Raster) -> Result<(), StoreError> {
        let write_failed = |reason: String| StoreError::WriteFailure { rid, reason };
        let gt = raster.geotransform;

        let tx = self
            .conn
            .transaction()
            .map_err(|e| write_failed(e.to_string()))?;

        let updated = tx
            .execute(
                "UPDATE tiles SET
                     srid = ?1, footprint = ?2,
                     origin_x = ?3, pixel_width = ?4, x_skew = ?5,
                     origin_y = ?6, y_skew = ?7, pixel_height = ?8,
                     rows = ?9, cols = ?10, nodata = ?11, samples = ?12
                 WHERE rid = ?13",
                params![
                    raster.srid,
                    raster.footprint_wkt(),
                    gt.origin_x,
                    gt.pixel_width,
                    gt.x_skew,
                    gt.origin_y,
                    gt.y_skew,
                    gt.pixel_height,
                    raster.rows() as i64,
                    raster.cols() as i64,
                    raster.no_data,
                    encode_samples(raster.samples()),
                    rid,
                ],
            )
            .map_err(|e| write_failed(e.to_string()))?;

        if updated == 0 {
            return Err(write_failed("no such tile".to_string()));
        }

        tx.commit().map_err(|e| write_failed(e.to_string()))
    }
}

fn unavailable(err: rusqlite::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

/// Samples as a row-major little-endian f64 blob.
fn encode_samples(samples: &Array2<f64>) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 8);
    for &v in samples.iter() {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

fn decode_samples(blob: &[u8], rows: usize, cols: usize) -> Result<Array2<f64>, String> {
    let expected = rows * cols * 8;
    if blob.len() != expected {
        return Err(format!(
            "sample blob is {} bytes, expected {} for a {}x{} grid",
            blob.len(),
            expected,
            rows,
            cols
        ));
    }

    let values: Vec<f64> = blob
        .chunks_exact(8)
        .map(|chunk| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(chunk);
            f64::from_le_bytes(buf)
        })
        .collect();

    Array2::from_shape_vec((rows, cols), values).map_err(|e| e.to_string())
}
