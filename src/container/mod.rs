//! The font aggregate: ordered glyph store, derived geometry, and the two
//! merge paths.
//!
//! A [`Bcfnt`] starts empty or decoded from a container file, accumulates
//! glyphs through repeated `add_font` / `merge_font` calls, and is frozen at
//! serialize time. It exclusively owns its glyphs and CMAP entries; nothing
//! in the tree points back at the aggregate.
//!
//! Glyph indices are positional: a code point's index is its position in the
//! ascending iteration of the glyph store. Every CMAP variant refers to
//! glyphs by that index, which is why the store is a `BTreeMap`.

pub mod codec;

use std::collections::BTreeMap;

use image::{imageops, GrayImage};

use crate::cmap::{self, Cmap, NO_GLYPH};
use crate::raster::{RasterGlyph, RasterSource};

/// Sheet geometry defaults; decoded containers may carry other values.
pub const SHEET_WIDTH: u16 = 256;
pub const SHEET_HEIGHT: u16 = 256;
pub const SHEET_SIZE: u32 = SHEET_WIDTH as u32 * SHEET_HEIGHT as u32 / 2;

/// Per-glyph horizontal metrics as stored in the CWDH block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CharWidthInfo {
    pub left: i8,
    pub glyph_width: u8,
    pub char_width: u8,
}

/// One glyph cell: alpha bitmap, width metrics, and the aggregate ascent at
/// creation time. Sheet composition uses the recorded ascent to realign
/// glyphs merged from fonts whose ascent differed.
#[derive(Debug, Clone)]
pub struct Glyph {
    pub img: GrayImage,
    pub info: CharWidthInfo,
    pub ascent: u8,
}

/// A BCFNT font under construction or decoded from a container file.
pub struct Bcfnt {
    glyphs: BTreeMap<u16, Glyph>,
    cmaps: Vec<Cmap>,

    line_feed: u8,
    height: u8,
    width: u8,
    max_width: u8,
    ascent: u8,
    alt_index: u16,
    default_width: CharWidthInfo,

    cell_width: u8,
    cell_height: u8,
    glyph_width: u8,
    glyph_height: u8,
    glyphs_per_row: u16,
    glyphs_per_col: u16,
    glyphs_per_sheet: u32,
    num_sheets: u16,

    sheet_width: u16,
    sheet_height: u16,
    sheet_size: u32,
}

/// List filtering: a blacklist excludes its members, a whitelist keeps only
/// its members. `list` must be sorted.
fn allowed(code: u16, list: &[u16], is_blacklist: bool) -> bool {
    list.binary_search(&code).is_ok() != is_blacklist
}

impl Default for Bcfnt {
    fn default() -> Self {
        Self::new()
    }
}

impl Bcfnt {
    /// An empty aggregate with default sheet geometry.
    pub fn new() -> Self {
        Self {
            glyphs: BTreeMap::new(),
            cmaps: Vec::new(),
            line_feed: 0,
            height: 0,
            width: 0,
            max_width: 0,
            ascent: 0,
            alt_index: 0,
            default_width: CharWidthInfo::default(),
            cell_width: 0,
            cell_height: 0,
            glyph_width: 0,
            glyph_height: 0,
            glyphs_per_row: 0,
            glyphs_per_col: 0,
            glyphs_per_sheet: 0,
            num_sheets: 0,
            sheet_width: SHEET_WIDTH,
            sheet_height: SHEET_HEIGHT,
            sheet_size: SHEET_SIZE,
        }
    }

    /// Rasterize every allowed glyph of `source` into the store and rebuild
    /// the derived state.
    ///
    /// Codes already present keep their first-seen glyph; codes the filter
    /// rejects and codes whose rasterization fails are skipped without
    /// aborting the merge.
    pub fn add_font<S: RasterSource>(&mut self, source: &S, list: &[u16], is_blacklist: bool) {
        let metrics = source.metrics();

        self.line_feed = self.line_feed.max(metrics.line_height as u8);
        self.height = self.height.max(metrics.bbox_height as u8);
        self.width = self.width.max(metrics.bbox_width as u8);
        self.max_width = self.max_width.max(metrics.max_advance as u8);
        self.ascent = self.ascent.max(metrics.ascent as u8);
        let mut descent = metrics.descent;

        for &code in source.code_points() {
            if code >= NO_GLYPH || self.glyphs.contains_key(&code) {
                continue;
            }
            if !allowed(code, list, is_blacklist) {
                continue;
            }
            // Load failures are recovered locally: skip the code point.
            let glyph = match source.load_glyph(code) {
                Ok(glyph) => glyph,
                Err(e) => {
                    log::debug!("skipping code point 0x{:04X}: {}", code, e);
                    continue;
                }
            };

            self.ascent = (self.ascent as i32).max(glyph.bitmap_top) as u8;
            descent = descent.min(glyph.bitmap_top - glyph.bitmap.height() as i32);
            self.max_width = self.max_width.max(glyph.bitmap.width() as u8);

            // Cell geometry tracks the running maxima; glyphs composed
            // later get the larger canvas, earlier ones are realigned at
            // sheet time via their recorded ascent.
            self.cell_width = self.max_width + 1;
            self.cell_height = (self.ascent as i32 - descent) as u8;
            self.glyph_width = self.cell_width + 1;
            self.glyph_height = self.cell_height + 1;

            let img = self.compose_cell(&glyph);
            self.glyphs.insert(
                code,
                Glyph {
                    img,
                    info: CharWidthInfo {
                        left: glyph.left,
                        glyph_width: glyph.width,
                        char_width: glyph.advance,
                    },
                    ascent: self.ascent,
                },
            );
        }

        if self.glyphs.is_empty() {
            return;
        }

        self.cell_width = self.max_width + 1;
        self.cell_height = (self.ascent as i32 - descent) as u8;
        self.glyph_width = self.cell_width + 1;
        self.glyph_height = self.cell_height + 1;
        self.refresh_sheet_geometry();

        self.alt_index = self.resolve_alt_index();
        self.cmaps = cmap::rebuild(self.glyphs.keys().copied());
        self.num_sheets = (self.glyphs.len() as u32).div_ceil(self.glyphs_per_sheet) as u16;
        cmap::coalesce(&mut self.cmaps);
    }

    /// Merge glyphs from another decoded container. Present codes win over
    /// incoming ones, so earlier sources take priority.
    pub fn merge_font(&mut self, other: Bcfnt, list: &[u16], is_blacklist: bool) {
        let new_ascent = self.ascent.max(other.ascent);
        let new_cell_height = new_ascent as i32
            + (other.cell_height as i32 - other.ascent as i32)
                .max(self.cell_height as i32 - self.ascent as i32);
        let new_cell_width = self.cell_width.max(other.cell_width);

        let line_feed = other.line_feed;
        let height = other.height;
        let width = other.width;
        for (code, glyph) in other.glyphs {
            if code != NO_GLYPH
                && !self.glyphs.contains_key(&code)
                && allowed(code, list, is_blacklist)
            {
                self.glyphs.insert(code, glyph);
            }
        }

        self.ascent = new_ascent;
        self.cell_height = new_cell_height as u8;
        self.cell_width = new_cell_width;
        self.glyph_height = self.cell_height + 1;
        self.glyph_width = self.cell_width + 1;
        self.refresh_sheet_geometry();
        self.line_feed = self.line_feed.max(line_feed);
        self.height = self.height.max(height);
        self.width = self.width.max(width);
        self.max_width = self.cell_width;
        self.num_sheets = (self.glyphs.len() as u32).div_ceil(self.glyphs_per_sheet) as u16;

        self.alt_index = self.resolve_alt_index();
        self.cmaps = cmap::rebuild(self.glyphs.keys().copied());
        cmap::coalesce(&mut self.cmaps);
    }

    fn refresh_sheet_geometry(&mut self) {
        self.glyphs_per_row = self.sheet_width / self.glyph_width as u16;
        self.glyphs_per_col = self.sheet_height / self.glyph_height as u16;
        self.glyphs_per_sheet = self.glyphs_per_row as u32 * self.glyphs_per_col as u32;
    }

    /// Lay the rendered bitmap into a fresh glyph cell with the one-pixel
    /// top/left margin, clamped to the cell interior.
    fn compose_cell(&self, glyph: &RasterGlyph) -> GrayImage {
        let mut img = GrayImage::new(self.glyph_width as u32, self.glyph_height as u32);
        let y_offset = self.ascent as i32 - glyph.bitmap_top;

        for (x, y, pixel) in glyph.bitmap.enumerate_pixels() {
            let py = y as i32 + y_offset;
            if x >= self.cell_width as u32 || py < 0 || py >= self.cell_height as i32 {
                continue;
            }
            img.put_pixel(x + 1, py as u32 + 1, *pixel);
        }
        img
    }

    /// Fallback glyph: 0xFFFD if present, else '?', else ' ', else index 0.
    fn resolve_alt_index(&self) -> u16 {
        for probe in [0xFFFD, '?' as u16, ' ' as u16] {
            if let Some(pos) = self.glyphs.keys().position(|&code| code == probe) {
                return pos as u16;
            }
        }
        0
    }

    /// Compose the glyph store into full sheet images, in index order.
    pub(crate) fn sheetify(&self) -> Vec<GrayImage> {
        let glyphs: Vec<&Glyph> = self.glyphs.values().collect();
        let mut sheets = Vec::new();

        for chunk in glyphs.chunks(self.glyphs_per_sheet as usize) {
            let mut sheet = GrayImage::new(self.sheet_width as u32, self.sheet_height as u32);
            for (i, glyph) in chunk.iter().enumerate() {
                let x = i as u32 % self.glyphs_per_row as u32;
                let y = i as u32 / self.glyphs_per_row as u32;
                imageops::overlay(
                    &mut sheet,
                    &glyph.img,
                    (x * self.glyph_width as u32 + 1) as i64,
                    (y * self.glyph_height as u32 + 1) as i64 + self.ascent as i64
                        - glyph.ascent as i64,
                );
            }
            sheets.push(sheet);
        }
        sheets
    }

    /// Resolve a code point to its glyph index, or 0xFFFF.
    pub fn index_from_code(&self, code: u16) -> u16 {
        cmap::index_from_code(&self.cmaps, code)
    }

    /// Resolve a glyph index back to its code point, or 0xFFFF.
    pub fn code_point_from_index(&self, index: u16) -> u16 {
        cmap::code_point_from_index(&self.cmaps, index)
    }

    pub fn glyph(&self, code: u16) -> Option<&Glyph> {
        self.glyphs.get(&code)
    }

    pub fn glyph_count(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    /// Stored code points in ascending (glyph index) order.
    pub fn codes(&self) -> impl Iterator<Item = u16> + '_ {
        self.glyphs.keys().copied()
    }

    pub fn cmaps(&self) -> &[Cmap] {
        &self.cmaps
    }

    pub fn alt_index(&self) -> u16 {
        self.alt_index
    }

    pub fn line_feed(&self) -> u8 {
        self.line_feed
    }

    pub fn ascent(&self) -> u8 {
        self.ascent
    }

    pub fn height(&self) -> u8 {
        self.height
    }

    pub fn width(&self) -> u8 {
        self.width
    }

    pub fn glyphs_per_sheet(&self) -> u32 {
        self.glyphs_per_sheet
    }

    pub fn num_sheets(&self) -> u16 {
        self.num_sheets
    }
}
