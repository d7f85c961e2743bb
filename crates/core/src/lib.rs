//! fontflat core - presets, file I/O, batch subsetting and reference
//! comparison on top of the subsetting engine.

pub mod batch;
pub mod compare;
pub mod config;
pub mod inspect;
pub mod io;
pub mod reference;

pub use batch::{BatchResult, SubsetStats, subset_batch, subset_file};
pub use config::{JAPANESE_RANGES, LAYOUT_FEATURES, Preset};
pub use fontflat_subsetter::{SubsetRequest, Subsetter, TagFilter};
