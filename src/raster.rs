//! Outline font rasterization.
//!
//! The container engine only consumes a narrow slice of what a font
//! rasterizer can do: scaled global metrics, the set of mapped BMP code
//! points in ascending order, and per-glyph alpha bitmaps with horizontal
//! metrics. [`RasterSource`] captures exactly that seam; [`RasterFont`] is
//! the production implementation over a TrueType/OpenType file, with
//! ttf-parser supplying face-level metrics and ab_glyph rendering coverage.
//!
//! Sizing matches the classic rasterizer convention: a point size maps to
//! pixels at 96 dpi, so an em square of `size × 4/3` pixels.

use ab_glyph::{point, Font, FontVec, PxScale, ScaleFont};
use image::{GrayImage, Luma};

use crate::error::BcfntError;

/// Scaled face-wide metrics, in integer pixels.
#[derive(Debug, Clone, Copy)]
pub struct FaceMetrics {
    /// Baseline-to-baseline distance (line spacing).
    pub line_height: i32,
    /// Pixels above the baseline of the typical ascender.
    pub ascent: i32,
    /// Pixels below the baseline of the typical descender; negative.
    pub descent: i32,
    /// Height of the union of all glyph bounding boxes.
    pub bbox_height: i32,
    /// Width of the union of all glyph bounding boxes.
    pub bbox_width: i32,
    /// Widest advance among mapped glyphs.
    pub max_advance: i32,
}

/// A rendered glyph: coverage bitmap plus the horizontal metrics the
/// container stores per glyph.
pub struct RasterGlyph {
    /// Alpha coverage, tightly cropped to the glyph's bounding box. May be
    /// zero-sized for blank glyphs such as the space.
    pub bitmap: GrayImage,
    /// Left side bearing.
    pub left: i8,
    /// Bounding-box width.
    pub width: u8,
    /// Horizontal advance.
    pub advance: u8,
    /// Rows between the baseline and the bitmap's top edge.
    pub bitmap_top: i32,
}

/// The rasterizer seam consumed by the font aggregator.
pub trait RasterSource {
    /// Scaled global metrics for the face.
    fn metrics(&self) -> FaceMetrics;

    /// Mapped code points below 0xFFFF, ascending.
    fn code_points(&self) -> &[u16];

    /// Render one glyph. Failures here are recoverable: the aggregator
    /// skips the code point and moves on.
    fn load_glyph(&self, code: u16) -> Result<RasterGlyph, BcfntError>;
}

/// An outline font opened at a fixed point size.
pub struct RasterFont {
    font: FontVec,
    scale: PxScale,
    metrics: FaceMetrics,
    code_points: Vec<u16>,
}

impl RasterFont {
    /// Parse font data and precompute metrics and character coverage at
    /// `size_pt` points (96 dpi).
    pub fn from_data(data: Vec<u8>, size_pt: u32) -> Result<Self, BcfntError> {
        let face = ttf_parser::Face::parse(&data, 0)
            .map_err(|e| BcfntError::Font(format!("failed to parse face: {}", e)))?;
        let units_per_em = face.units_per_em();
        let bbox = face.global_bounding_box();

        let font = FontVec::try_from_vec(data)
            .map_err(|e| BcfntError::Font(format!("failed to parse outlines: {}", e)))?;

        let px_per_em = size_pt as f32 * 96.0 / 72.0;
        let scale = font
            .pt_to_px_scale(size_pt as f32)
            .ok_or_else(|| BcfntError::Font("font has no usable em square".into()))?;
        let scaled = font.as_scaled(scale);

        // Walk the BMP for mapped characters; the ordered probe doubles as
        // the max-advance scan.
        let mut code_points = Vec::new();
        let mut max_advance = 0.0f32;
        for code in 0u32..0xFFFF {
            let Some(ch) = char::from_u32(code) else { continue };
            let id = font.glyph_id(ch);
            if id.0 == 0 {
                continue;
            }
            code_points.push(code as u16);
            max_advance = max_advance.max(scaled.h_advance(id));
        }

        let units_to_px = px_per_em / units_per_em as f32;
        let metrics = FaceMetrics {
            line_height: (scaled.height() + scaled.line_gap()).floor() as i32,
            ascent: scaled.ascent().floor() as i32,
            descent: scaled.descent().floor() as i32,
            bbox_height: ((bbox.y_max as f32 - bbox.y_min as f32) * units_to_px).floor() as i32,
            bbox_width: ((bbox.x_max as f32 - bbox.x_min as f32) * units_to_px).floor() as i32,
            max_advance: max_advance.floor() as i32,
        };

        Ok(Self { font, scale, metrics, code_points })
    }

    /// Read a font file and open it at `size_pt` points.
    pub fn open(path: &std::path::Path, size_pt: u32) -> Result<Self, BcfntError> {
        Self::from_data(std::fs::read(path)?, size_pt)
    }
}

impl RasterSource for RasterFont {
    fn metrics(&self) -> FaceMetrics {
        self.metrics
    }

    fn code_points(&self) -> &[u16] {
        &self.code_points
    }

    fn load_glyph(&self, code: u16) -> Result<RasterGlyph, BcfntError> {
        let ch = char::from_u32(code as u32)
            .ok_or_else(|| BcfntError::Font(format!("code point 0x{:04X} is not a character", code)))?;
        let id = self.font.glyph_id(ch);
        if id.0 == 0 {
            return Err(BcfntError::Font(format!("no glyph for code point 0x{:04X}", code)));
        }

        let scaled = self.font.as_scaled(self.scale);
        let advance = scaled.h_advance(id).floor();
        let bearing = scaled.h_side_bearing(id).floor();

        // Positioned at the origin, so px_bounds are baseline-relative.
        let glyph = id.with_scale_and_position(self.scale, point(0.0, 0.0));
        let (bitmap, bitmap_top, width) = match self.font.outline_glyph(glyph) {
            Some(outlined) => {
                let bounds = outlined.px_bounds();
                let w = bounds.width() as u32;
                let h = bounds.height() as u32;
                let mut bitmap = GrayImage::new(w, h);
                outlined.draw(|x, y, coverage| {
                    if x < w && y < h {
                        let alpha = (coverage * 255.0).round().clamp(0.0, 255.0) as u8;
                        bitmap.put_pixel(x, y, Luma([alpha]));
                    }
                });
                (bitmap, (-bounds.min.y).round() as i32, w as u8)
            }
            // Blank glyphs (space and friends) have no outline but still
            // render successfully as an empty bitmap.
            None => (GrayImage::new(0, 0), 0, 0),
        };

        Ok(RasterGlyph {
            bitmap,
            left: bearing as i8,
            width,
            advance: advance as u8,
            bitmap_top,
        })
    }
}
