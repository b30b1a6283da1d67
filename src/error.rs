//! Structured error types for the BCFNT engine.
//!
//! Decode errors carry the offending value so callers can report what the
//! file actually contained; `Io` wraps the underlying sink failure.

use std::fmt;
use std::io;

/// The unified error type returned by all public bcfnt API functions.
#[derive(Debug)]
pub enum BcfntError {
    /// The byte-order mark on decode was not 0xFEFF (little-endian).
    UnsupportedEndianness(u16),
    /// The TGLP sheet format tag was not 0x000B (4-bit alpha).
    UnsupportedPixelFormat(u16),
    /// A CMAP block used a mapping method outside the three known variants.
    UnknownMappingMethod(u16),
    /// A read ran past the end of the input buffer.
    Truncated { offset: usize, len: usize },
    /// A section size or offset disagrees with the file contents.
    InvalidBlockSize(String),
    /// Serialize was called on a font with no glyphs.
    EmptyFont,
    /// A font could not be loaded, parsed, or rasterized.
    Font(String),
    /// An underlying I/O operation failed.
    Io(io::Error),
}

impl fmt::Display for BcfntError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BcfntError::UnsupportedEndianness(bom) => {
                write!(f, "unsupported byte order mark 0x{:04X} (big-endian BCFNTs are not supported)", bom)
            }
            BcfntError::UnsupportedPixelFormat(tag) => {
                write!(f, "unsupported sheet format 0x{:04X} (only 4-bit alpha is supported)", tag)
            }
            BcfntError::UnknownMappingMethod(method) => {
                write!(f, "unknown CMAP mapping method {}", method)
            }
            BcfntError::Truncated { offset, len } => {
                write!(f, "truncated input: read at offset 0x{:X} past end of {} bytes", offset, len)
            }
            BcfntError::InvalidBlockSize(msg) => write!(f, "invalid block: {}", msg),
            BcfntError::EmptyFont => write!(f, "font has no glyphs"),
            BcfntError::Font(msg) => write!(f, "font error: {}", msg),
            BcfntError::Io(e) => write!(f, "i/o error: {}", e),
        }
    }
}

impl std::error::Error for BcfntError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BcfntError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for BcfntError {
    fn from(e: io::Error) -> Self {
        BcfntError::Io(e)
    }
}
