//! Pure raster transforms: nearest-neighbor resampling and the patch merge.

mod merge;
mod resample;

pub use merge::{patch_tile, MergeOutcome};
pub use resample::NearestResampler;
