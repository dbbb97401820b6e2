//! I/O: the tile store adapter and the raster file codec.

pub mod asc;
mod store;

pub use store::{SqliteTileStore, StoreError, TileStore};
