//! OpenType font subsetting for CFF and TrueType outlines.
//!
//! The engine parses an SFNT file, closes the requested code points and
//! glyphs over GSUB substitutions and composite glyph references, then
//! rewrites every table it understands for the new glyph order: CFF
//! charstrings (optionally desubroutinized), glyf/loca, metrics, cmap,
//! post, and GSUB/GPOS/GDEF pruned to the selected features. It operates
//! purely on byte slices with no file I/O.
//!
//! # Example
//!
//! ```no_run
//! use fontflat_subsetter::{Subsetter, TagFilter};
//!
//! let font_data: &[u8] = &[];
//! let subset = Subsetter::new()
//!     .with_text("中文")
//!     .with_layout_features(TagFilter::none())
//!     .subset(font_data);
//! ```

pub mod cff;
mod error;
pub mod glyf;
pub mod layout;
mod options;
pub mod plan;
pub mod reader;
pub mod repack;
pub mod sfnt;
mod subsetter;
pub mod tables;
mod types;
pub mod writer;

pub use error::{Result, SubsetError};
pub use options::{DEFAULT_DROP_TABLES, FeatureFilter, ScriptFilter, SubsetRequest, TagFilter};
pub use subsetter::{Subsetter, subset_font};
pub use types::{FeatureIndex, GlyphId, GlyphMap, LookupIndex, parse_tag};
