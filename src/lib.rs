//! # bcfnt
//!
//! Builder and codec for the BCFNT bitmap font container (CFNT), the format
//! a certain handheld console consumes for its system and game fonts.
//!
//! The engine ingests outline fonts (rasterized to alpha bitmaps) or
//! existing containers, filters and merges their glyphs, packs them onto
//! fixed 256×256 sheets of swizzled 4-bit-alpha texels, and writes a single
//! container that round-trips through the reader.
//!
//! ## Architecture
//!
//! ```text
//! Inputs (TTF/OTF via raster, or decoded containers)
//!        ↓
//!   [container]  — glyph store, geometry, merge paths
//!        ↓
//!   [cmap]       — code-point → glyph-index maps, coalescing
//!        ↓
//!   [sheet]      — 4-bit alpha texel packing ← [swizzle] Morton tiles
//!        ↓
//!   [codec]      — block layout, offset fixups ← [stream] LE primitives
//!        ↓
//!   container bytes
//! ```
//!
//! Decoding runs the same path in reverse: headers, then CMAPs (sheet cells
//! cannot be attributed to code points without them), then sheets, then the
//! trailing width data.

pub mod cmap;
pub mod container;
pub mod error;
pub mod raster;
pub mod sheet;
pub mod stream;
pub mod swizzle;

pub use container::{Bcfnt, CharWidthInfo, Glyph};
pub use error::BcfntError;
pub use raster::{FaceMetrics, RasterFont, RasterGlyph, RasterSource};
