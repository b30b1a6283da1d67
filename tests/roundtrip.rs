//! Integration tests for the build → serialize → decode pipeline.
//!
//! A synthetic `RasterSource` stands in for a real outline font so the
//! aggregate, sheet packing and container codec are exercised end to end
//! with known bitmaps and metrics.

use bcfnt::cmap::CmapData;
use bcfnt::{Bcfnt, BcfntError, FaceMetrics, RasterGlyph, RasterSource};
use image::{GrayImage, Luma};

// ─── Helpers ────────────────────────────────────────────────────

struct StubGlyph {
    code: u16,
    width: u32,
    height: u32,
    advance: u8,
    bitmap_top: i32,
    fails: bool,
}

struct StubFont {
    metrics: FaceMetrics,
    codes: Vec<u16>,
    glyphs: Vec<StubGlyph>,
}

impl StubFont {
    fn new(metrics: FaceMetrics, mut glyphs: Vec<StubGlyph>) -> Self {
        glyphs.sort_by_key(|g| g.code);
        let codes = glyphs.iter().map(|g| g.code).collect();
        Self { metrics, codes, glyphs }
    }
}

impl RasterSource for StubFont {
    fn metrics(&self) -> FaceMetrics {
        self.metrics
    }

    fn code_points(&self) -> &[u16] {
        &self.codes
    }

    fn load_glyph(&self, code: u16) -> Result<RasterGlyph, BcfntError> {
        let glyph = self
            .glyphs
            .iter()
            .find(|g| g.code == code)
            .ok_or_else(|| BcfntError::Font(format!("no stub glyph for 0x{:04X}", code)))?;
        if glyph.fails {
            return Err(BcfntError::Font(format!("stub failure for 0x{:04X}", code)));
        }

        let mut bitmap = GrayImage::new(glyph.width, glyph.height);
        for pixel in bitmap.pixels_mut() {
            *pixel = Luma([255]);
        }
        Ok(RasterGlyph {
            bitmap,
            left: 1,
            width: glyph.width as u8,
            advance: glyph.advance,
            bitmap_top: glyph.bitmap_top,
        })
    }
}

fn small_metrics() -> FaceMetrics {
    FaceMetrics {
        line_height: 12,
        ascent: 8,
        descent: -2,
        bbox_height: 11,
        bbox_width: 9,
        max_advance: 8,
    }
}

fn small_glyph(code: u16, advance: u8) -> StubGlyph {
    StubGlyph { code, width: 4, height: 6, advance, bitmap_top: 6, fails: false }
}

/// A font of solid 4x6 glyphs at the given codes, advance 5.
fn small_font(codes: &[u16]) -> StubFont {
    StubFont::new(small_metrics(), codes.iter().map(|&c| small_glyph(c, 5)).collect())
}

fn build(codes: &[u16]) -> Bcfnt {
    let mut font = Bcfnt::new();
    font.add_font(&small_font(codes), &[], true);
    font
}

// ─── Scenarios ──────────────────────────────────────────────────

#[test]
fn test_empty_serialize_produces_no_file() {
    let font = Bcfnt::new();
    assert!(matches!(font.serialize(), Err(BcfntError::EmptyFont)));

    let path = std::env::temp_dir().join("bcfnt-empty-test.bcfnt");
    let _ = std::fs::remove_file(&path);
    assert!(font.write_to_file(&path).is_err());
    assert!(!path.exists(), "no file should be produced for an empty font");
}

#[test]
fn test_single_glyph_round_trip() {
    let font = build(&[0x41]);
    assert_eq!(font.glyph_count(), 1);
    assert_eq!(font.glyph(0x41).unwrap().info.char_width, 5);

    let bytes = font.serialize().unwrap();
    let decoded = Bcfnt::decode(&bytes).unwrap();

    assert_eq!(decoded.glyph_count(), 1);
    assert_eq!(decoded.cmaps().len(), 1);
    let cmap = &decoded.cmaps()[0];
    assert_eq!((cmap.code_begin, cmap.code_end), (0x41, 0x41));
    assert_eq!(cmap.data, CmapData::Direct { offset: 0 });
    assert_eq!(decoded.alt_index(), 0);

    let original = font.glyph(0x41).unwrap();
    let restored = decoded.glyph(0x41).unwrap();
    assert_eq!(restored.info, original.info);
    assert_eq!(restored.img, original.img);
}

#[test]
fn test_round_trip_preserves_header_metrics() {
    let font = build(&[0x41, 0x42, 0x43]);
    let bytes = font.serialize().unwrap();
    let decoded = Bcfnt::decode(&bytes).unwrap();

    assert_eq!(decoded.line_feed(), font.line_feed());
    assert_eq!(decoded.ascent(), font.ascent());
    assert_eq!(decoded.height(), font.height());
    assert_eq!(decoded.width(), font.width());
    assert_eq!(decoded.alt_index(), font.alt_index());
}

#[test]
fn test_round_trip_cmap_resolution_agrees() {
    let codes = [0x20, 0x21, 0x41, 0x50, 0x52, 0x60, 0x61, 0x62];
    let font = build(&codes);
    let bytes = font.serialize().unwrap();
    let decoded = Bcfnt::decode(&bytes).unwrap();

    // The cmap list representation may differ; resolution must not.
    for (index, &code) in codes.iter().enumerate() {
        assert_eq!(font.index_from_code(code), index as u16);
        assert_eq!(decoded.index_from_code(code), index as u16, "code 0x{:04X}", code);
        assert_eq!(decoded.code_point_from_index(index as u16), code);
    }
    assert_eq!(decoded.index_from_code(0x51), 0xFFFF);
    assert_eq!(decoded.code_point_from_index(codes.len() as u16), 0xFFFF);
}

#[test]
fn test_reserialize_is_byte_identical() {
    let font = build(&[0x41, 0x42, 0x50, 0x52, 0x100, 0x101]);
    let bytes = font.serialize().unwrap();
    let decoded = Bcfnt::decode(&bytes).unwrap();
    assert_eq!(decoded.serialize().unwrap(), bytes);
}

#[test]
fn test_alt_index_priority() {
    // 0xFFFD outranks '?' and ' ' regardless of insertion order.
    let font = build(&[0x3F, 0xFFFD, 0x20]);
    assert_eq!(font.alt_index(), 2, "0xFFFD sorts last of the three codes");

    let decoded = Bcfnt::decode(&font.serialize().unwrap()).unwrap();
    assert_eq!(decoded.alt_index(), 2);

    let font = build(&[0x3F, 0x20]);
    assert_eq!(font.alt_index(), 1, "'?' comes after ' ' in the store");

    let font = build(&[0x20, 0x41]);
    assert_eq!(font.alt_index(), 0, "' ' is index 0");

    let font = build(&[0x41, 0x42]);
    assert_eq!(font.alt_index(), 0, "no candidate present falls back to 0");
}

#[test]
fn test_coalesce_isolated_codes_into_scan() {
    let font = build(&[0x10, 0x12, 0x14, 0x16]);

    assert_eq!(font.cmaps().len(), 1);
    let cmap = &font.cmaps()[0];
    assert_eq!((cmap.code_begin, cmap.code_end), (0x10, 0x16));
    match &cmap.data {
        CmapData::Scan { entries } => {
            assert_eq!(entries.len(), 4);
            assert_eq!(entries[&0x10], 0);
            assert_eq!(entries[&0x12], 1);
            assert_eq!(entries[&0x14], 2);
            assert_eq!(entries[&0x16], 3);
        }
        other => panic!("expected Scan, got {:?}", other),
    }

    let decoded = Bcfnt::decode(&font.serialize().unwrap()).unwrap();
    for (index, code) in [0x10u16, 0x12, 0x14, 0x16].into_iter().enumerate() {
        assert_eq!(decoded.index_from_code(code), index as u16);
    }
}

#[test]
fn test_blacklist_excludes_members() {
    let source = small_font(&[0x41, 0x42, 0x43, 0x44]);
    let mut font = Bcfnt::new();
    font.add_font(&source, &[0x41, 0x42], true);

    assert_eq!(font.codes().collect::<Vec<_>>(), vec![0x43, 0x44]);
}

#[test]
fn test_whitelist_keeps_only_members() {
    let source = small_font(&[0x41, 0x42, 0x43, 0x44]);
    let mut font = Bcfnt::new();
    font.add_font(&source, &[0x41, 0x42], false);

    assert_eq!(font.codes().collect::<Vec<_>>(), vec![0x41, 0x42]);
}

#[test]
fn test_glyph_load_failure_is_skipped() {
    let mut glyphs = vec![small_glyph(0x41, 5), small_glyph(0x43, 5)];
    glyphs.push(StubGlyph { code: 0x42, width: 4, height: 6, advance: 5, bitmap_top: 6, fails: true });
    let source = StubFont::new(small_metrics(), glyphs);

    let mut font = Bcfnt::new();
    font.add_font(&source, &[], true);

    assert_eq!(font.codes().collect::<Vec<_>>(), vec![0x41, 0x43]);
}

#[test]
fn test_merge_first_font_wins() {
    // Font X maps 0x41 with charWidth 5, font Y with charWidth 7.
    let x = build(&[0x41]);
    let bytes = x.serialize().unwrap();
    let mut merged = Bcfnt::decode(&bytes).unwrap();
    assert_eq!(merged.glyph(0x41).unwrap().info.char_width, 5);

    let mut y_source = StubFont::new(
        small_metrics(),
        vec![
            StubGlyph { code: 0x41, width: 4, height: 6, advance: 7, bitmap_top: 6, fails: false },
            small_glyph(0x42, 7),
        ],
    );
    y_source.metrics.ascent = 9;
    let mut y = Bcfnt::new();
    y.add_font(&y_source, &[], true);
    let y = Bcfnt::decode(&y.serialize().unwrap()).unwrap();

    merged.merge_font(y, &[], true);

    assert_eq!(merged.glyph_count(), 2);
    assert_eq!(merged.glyph(0x41).unwrap().info.char_width, 5, "first font wins the tie");
    assert_eq!(merged.glyph(0x42).unwrap().info.char_width, 7);
    assert_eq!(merged.ascent(), 9, "merge keeps element-wise maxima");

    // The merged aggregate still serializes and round-trips.
    let decoded = Bcfnt::decode(&merged.serialize().unwrap()).unwrap();
    assert_eq!(decoded.glyph(0x41).unwrap().info.char_width, 5);
    assert_eq!(decoded.glyph(0x42).unwrap().info.char_width, 7);
}

#[test]
fn test_merge_filters_incoming_codes() {
    let mut base = Bcfnt::decode(&build(&[0x41]).serialize().unwrap()).unwrap();
    let other = Bcfnt::decode(&build(&[0x50, 0x51, 0x52]).serialize().unwrap()).unwrap();

    base.merge_font(other, &[0x51], true);

    assert_eq!(base.codes().collect::<Vec<_>>(), vec![0x41, 0x50, 0x52]);
}

#[test]
fn test_sheet_boundary_two_sheets() {
    // 30x30 glyphs: cell 31x32, glyph 32x33, so an 8x7 = 56 glyph grid.
    let metrics = FaceMetrics {
        line_height: 40,
        ascent: 30,
        descent: -2,
        bbox_height: 34,
        bbox_width: 32,
        max_advance: 30,
    };
    let codes: Vec<u16> = (0x100..0x100 + 57).collect();
    let glyphs = codes
        .iter()
        .map(|&code| StubGlyph { code, width: 30, height: 30, advance: 30, bitmap_top: 30, fails: false })
        .collect();
    let source = StubFont::new(metrics, glyphs);

    let mut font = Bcfnt::new();
    font.add_font(&source, &[], true);

    assert_eq!(font.glyphs_per_sheet(), 56);
    assert_eq!(font.glyph_count(), 57);
    assert_eq!(font.num_sheets(), 2);

    let bytes = font.serialize().unwrap();
    let decoded = Bcfnt::decode(&bytes).unwrap();

    assert_eq!(decoded.num_sheets(), 2);
    assert_eq!(decoded.glyph_count(), 57);
    for &code in &codes {
        let original = font.glyph(code).unwrap();
        let restored = decoded.glyph(code).unwrap();
        assert_eq!(restored.img, original.img, "glyph 0x{:04X} bitmap", code);
    }
}

#[test]
fn test_block_count_and_file_size_fields() {
    // Codes chosen to leave two cmaps after coalescing: one wide Direct run
    // and one Scan of isolated codes.
    let font = build(&[0x41, 0x42, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48, 0x50, 0x52]);
    assert_eq!(font.cmaps().len(), 2);

    let bytes = font.serialize().unwrap();
    let file_size = u32::from_le_bytes(bytes[0x0C..0x10].try_into().unwrap());
    let num_blocks = u32::from_le_bytes(bytes[0x10..0x14].try_into().unwrap());

    assert_eq!(file_size as usize, bytes.len());
    assert_eq!(num_blocks, 3 + font.cmaps().len() as u32);
}

#[test]
fn test_container_layout_constants() {
    let bytes = build(&[0x41]).serialize().unwrap();

    assert_eq!(&bytes[0..4], b"CFNT");
    assert_eq!(u16::from_le_bytes(bytes[4..6].try_into().unwrap()), 0xFEFF);
    assert_eq!(&bytes[0x14..0x18], b"FINF");
    assert_eq!(&bytes[0x34..0x38], b"TGLP");
    // Sheet data starts at the 0x80 alignment boundary.
    let sheet_offset = u32::from_le_bytes(bytes[0x50..0x54].try_into().unwrap());
    assert_eq!(sheet_offset, 0x80);
    // TGLP format tag is 4-bit alpha.
    let format = u16::from_le_bytes(bytes[0x46..0x48].try_into().unwrap());
    assert_eq!(format, 0x000B);
}
