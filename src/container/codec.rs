//! Container encode/decode.
//!
//! The file is a sequence of magic-prefixed blocks: CFNT header, FINF, TGLP,
//! the 0x80-aligned sheet data, one CWDH, then the CMAP chain. Every block
//! offset stored on the wire points eight bytes past the block start (just
//! after the magic and section size), so readers seek to `offset - 4` to
//! land on the section-size field and writers store `blockStart + 8`.
//!
//! The writer accounts the whole file size up front and asserts each block
//! lands where the accounting said it would; the reader treats all input as
//! untrusted and fails with typed errors instead of panicking.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write as IoWrite;
use std::path::Path;

use image::{imageops, GrayImage};

use crate::cmap::{self, Cmap, CmapData, NO_GLYPH};
use crate::error::BcfntError;
use crate::sheet::{pack_sheet, unpack_sheet};
use crate::stream::{Reader, Writer};

use super::{Bcfnt, CharWidthInfo, Glyph};

/// Sheet data is aligned up to this boundary; the gap is zero-padded.
const SHEET_ALIGN: u32 = 0x80;

impl Bcfnt {
    /// Serialize the aggregate into container bytes.
    ///
    /// Fails with [`BcfntError::EmptyFont`] when the store has no glyphs;
    /// an empty TGLP block is not representable.
    pub fn serialize(&self) -> Result<Vec<u8>, BcfntError> {
        if self.glyphs.is_empty() {
            return Err(BcfntError::EmptyFont);
        }

        let sheets = self.sheetify();
        let cwdh_data_size = (3 * self.glyphs.len() as u32 + 3) & !3;

        // Block offset accounting; every block below asserts against these.
        let mut file_size: u32 = 0x14;
        let finf_offset = file_size;
        file_size += 0x20;
        let tglp_offset = file_size;
        file_size += 0x20;
        let sheet_offset = (file_size + SHEET_ALIGN - 1) & !(SHEET_ALIGN - 1);
        file_size = sheet_offset + sheets.len() as u32 * self.sheet_size;
        let cwdh_offset = file_size;
        file_size += 0x10 + cwdh_data_size;
        let cmap_offset = file_size;
        for cmap in &self.cmaps {
            file_size += cmap.section_size();
        }

        // FINF, TGLP, CWDH, plus one block per CMAP.
        let num_blocks = 3 + self.cmaps.len() as u32;
        log::debug!(
            "serializing {} glyphs, {} sheets, {} cmaps, {} bytes",
            self.glyphs.len(),
            sheets.len(),
            self.cmaps.len(),
            file_size
        );

        let mut out = Writer::new();

        out.write_tag(b"CFNT");
        out.write_u16(0xFEFF); // byte order mark
        out.write_u16(0x14); // header size
        out.write_u8(0);
        out.write_u8(0);
        out.write_u8(0);
        out.write_u8(0x3); // version
        out.write_u32(file_size);
        out.write_u32(num_blocks);

        debug_assert_eq!(out.len() as u32, finf_offset);
        out.write_tag(b"FINF");
        out.write_u32(0x20); // section size
        out.write_u8(0x1); // font type
        out.write_u8(self.line_feed);
        out.write_u16(self.alt_index);
        out.write_i8(self.default_width.left);
        out.write_u8(self.default_width.glyph_width);
        out.write_u8(self.default_width.char_width);
        out.write_u8(0x1); // encoding
        out.write_u32(tglp_offset + 8);
        out.write_u32(cwdh_offset + 8);
        out.write_u32(cmap_offset + 8);
        out.write_u8(self.height);
        out.write_u8(self.width);
        out.write_u8(self.ascent);
        out.write_u8(0); // padding

        debug_assert_eq!(out.len() as u32, tglp_offset);
        out.write_tag(b"TGLP");
        out.write_u32(0x20); // section size
        out.write_u8(self.cell_width);
        out.write_u8(self.cell_height);
        out.write_u8(self.ascent); // cell baseline
        out.write_u8(self.max_width);
        out.write_u32(self.sheet_size);
        out.write_u16(sheets.len() as u16);
        out.write_u16(0xB); // 4-bit alpha format
        out.write_u16(self.glyphs_per_row);
        out.write_u16(self.glyphs_per_col);
        out.write_u16(self.sheet_width);
        out.write_u16(self.sheet_height);
        out.write_u32(sheet_offset);

        out.pad_to(sheet_offset as usize);
        for sheet in &sheets {
            out.write_bytes(&pack_sheet(sheet));
        }

        debug_assert_eq!(out.len() as u32, cwdh_offset);
        out.write_tag(b"CWDH");
        out.write_u32(0x10 + cwdh_data_size);
        out.write_u16(0); // start index
        out.write_u16(self.glyphs.len() as u16); // end index
        out.write_u32(0); // next CWDH offset
        for glyph in self.glyphs.values() {
            out.write_i8(glyph.info.left);
            out.write_u8(glyph.info.glyph_width);
            out.write_u8(glyph.info.char_width);
        }
        out.align4();

        let mut offset = cmap_offset;
        for (i, cmap) in self.cmaps.iter().enumerate() {
            debug_assert_eq!(out.len() as u32, offset);
            let size = cmap.section_size();

            out.write_tag(b"CMAP");
            out.write_u32(size);
            out.write_u16(cmap.code_begin);
            out.write_u16(cmap.code_end);
            out.write_u16(cmap.data.method());
            out.write_u16(0); // reserved
            if i + 1 == self.cmaps.len() {
                out.write_u32(0);
            } else {
                out.write_u32(offset + size + 8);
            }

            match &cmap.data {
                CmapData::Direct { offset } => {
                    out.write_u16(*offset);
                    out.write_u16(0); // alignment
                }
                CmapData::Table { entries } => {
                    for &entry in entries {
                        out.write_u16(entry);
                    }
                    if entries.len() % 2 == 1 {
                        out.write_u16(0); // alignment
                    }
                }
                CmapData::Scan { entries } => {
                    out.write_u16(entries.len() as u16);
                    for (&code, &index) in entries {
                        out.write_u16(code);
                        out.write_u16(index);
                    }
                    out.write_u16(0); // alignment
                }
            }

            offset += size;
        }

        debug_assert_eq!(out.len() as u32, file_size);
        Ok(out.into_inner())
    }

    /// Serialize and write to `path`.
    ///
    /// The buffer is fully assembled first, so a failure never leaves a
    /// half-written header behind a valid magic. Close-time failures are
    /// surfaced even when every byte was accepted.
    pub fn write_to_file(&self, path: &Path) -> Result<(), BcfntError> {
        let data = self.serialize()?;
        let mut file = File::create(path)?;
        file.write_all(&data)?;
        file.sync_all()?;
        Ok(())
    }

    /// Decode a container file into an aggregate.
    pub fn decode(data: &[u8]) -> Result<Bcfnt, BcfntError> {
        let mut font = Bcfnt::new();
        let mut input = Reader::new(data);

        input.expect_tag(b"CFNT")?;
        let bom = input.read_u16()?;
        if bom != 0xFEFF {
            return Err(BcfntError::UnsupportedEndianness(bom));
        }
        input.skip(2)?; // header size
        input.skip(4)?; // version
        let file_size = input.read_u32()?;
        if file_size as usize > data.len() {
            return Err(BcfntError::Truncated { offset: file_size as usize, len: data.len() });
        }
        input.skip(4)?; // number of blocks

        input.expect_tag(b"FINF")?;
        input.skip(4)?; // section size
        input.skip(1)?; // font type
        font.line_feed = input.read_u8()?;
        font.alt_index = input.read_u16()?;
        font.default_width = CharWidthInfo {
            left: input.read_i8()?,
            glyph_width: input.read_u8()?,
            char_width: input.read_u8()?,
        };
        input.skip(1)?; // encoding
        let tglp_offset = input.read_u32()?;
        let cwdh_offset = input.read_u32()?;
        let cmap_offset = input.read_u32()?;
        font.height = input.read_u8()?;
        font.width = input.read_u8()?;
        font.ascent = input.read_u8()?;

        // CMAPs first: mapping sheet cells back to code points needs them.
        // Chain offsets must move forward, so a cyclic chain cannot wedge
        // the decoder.
        let mut next_cmap = cmap_offset;
        while next_cmap != 0 {
            let next = decode_cmap(&mut input, next_cmap, &mut font.cmaps)?;
            if next != 0 && next <= next_cmap {
                return Err(BcfntError::InvalidBlockSize(format!(
                    "CMAP chain goes backwards (0x{:X} after 0x{:X})",
                    next, next_cmap
                )));
            }
            next_cmap = next;
        }

        decode_tglp(&mut input, tglp_offset, &mut font)?;

        let mut next_cwdh = cwdh_offset;
        while next_cwdh != 0 {
            let next = decode_cwdh(&mut input, next_cwdh, &mut font)?;
            if next != 0 && next <= next_cwdh {
                return Err(BcfntError::InvalidBlockSize(format!(
                    "CWDH chain goes backwards (0x{:X} after 0x{:X})",
                    next, next_cwdh
                )));
            }
            next_cwdh = next;
        }

        Ok(font)
    }
}

/// Seek to a stored post-magic block offset, landing on the section size.
fn seek_block(input: &mut Reader, offset: u32) -> Result<(), BcfntError> {
    let pos = (offset as usize).checked_sub(4).ok_or_else(|| {
        BcfntError::InvalidBlockSize(format!("block offset 0x{:X} inside file header", offset))
    })?;
    input.seek(pos)
}

/// Decode one CMAP block; returns the next chain offset (0 ends the chain).
fn decode_cmap(input: &mut Reader, offset: u32, cmaps: &mut Vec<Cmap>) -> Result<u32, BcfntError> {
    seek_block(input, offset)?;

    let size = input.read_u32()?;
    let payload = size.checked_sub(0x14).ok_or_else(|| {
        BcfntError::InvalidBlockSize(format!("CMAP section size 0x{:X} below header size", size))
    })?;
    if payload % 4 != 0 {
        // Seen in the wild for odd Table payloads; tolerated.
        log::warn!("CMAP payload size 0x{:X} is not 32-bit aligned", payload);
    }

    let code_begin = input.read_u16()?;
    let code_end = input.read_u16()?;
    let method = input.read_u16()?;
    input.skip(2)?; // reserved
    let next = input.read_u32()?;

    if code_end < code_begin {
        return Err(BcfntError::InvalidBlockSize(format!(
            "CMAP range 0x{:04X}..0x{:04X} is inverted",
            code_begin, code_end
        )));
    }
    let num_codes = code_end - code_begin + 1;

    let data = match method {
        0 => {
            if payload != 4 {
                return Err(BcfntError::InvalidBlockSize(format!(
                    "direct CMAP payload is 0x{:X} bytes, expected 4",
                    payload
                )));
            }
            CmapData::Direct { offset: input.read_u16()? }
        }
        1 => {
            if payload != (num_codes as u32 + 1) / 2 * 4 {
                return Err(BcfntError::InvalidBlockSize(format!(
                    "table CMAP payload is 0x{:X} bytes for {} codes",
                    payload, num_codes
                )));
            }
            let mut entries = Vec::with_capacity(num_codes as usize);
            for _ in 0..num_codes {
                entries.push(input.read_u16()?);
            }
            CmapData::Table { entries }
        }
        2 => {
            let count = input.read_u16()?;
            if payload != (count as u32 + 1) * 4 {
                return Err(BcfntError::InvalidBlockSize(format!(
                    "scan CMAP payload is 0x{:X} bytes for {} entries",
                    payload, count
                )));
            }
            let mut entries = BTreeMap::new();
            for _ in 0..count {
                let code = input.read_u16()?;
                let index = input.read_u16()?;
                entries.insert(code, index);
            }
            CmapData::Scan { entries }
        }
        method => return Err(BcfntError::UnknownMappingMethod(method)),
    };

    cmaps.push(Cmap { code_begin, code_end, data });
    Ok(next)
}

/// Decode the TGLP block and rebuild per-glyph cell bitmaps from the sheets.
fn decode_tglp(input: &mut Reader, offset: u32, font: &mut Bcfnt) -> Result<(), BcfntError> {
    // The stored offset already points past magic and size, at cellWidth.
    input.seek(offset as usize)?;

    font.cell_width = input.read_u8()?;
    font.cell_height = input.read_u8()?;
    if font.cell_width == u8::MAX || font.cell_height == u8::MAX {
        return Err(BcfntError::InvalidBlockSize(format!(
            "cell {}x{} leaves no room for the glyph margin",
            font.cell_width, font.cell_height
        )));
    }
    font.glyph_width = font.cell_width + 1;
    font.glyph_height = font.cell_height + 1;
    input.skip(1)?; // baseline, same as the FINF ascent
    font.max_width = input.read_u8()?;
    font.sheet_size = input.read_u32()?;
    font.num_sheets = input.read_u16()?;

    let format = input.read_u16()?;
    if format != 0xB {
        return Err(BcfntError::UnsupportedPixelFormat(format));
    }

    font.glyphs_per_row = input.read_u16()?;
    font.glyphs_per_col = input.read_u16()?;
    font.glyphs_per_sheet = font.glyphs_per_row as u32 * font.glyphs_per_col as u32;
    font.sheet_width = input.read_u16()?;
    font.sheet_height = input.read_u16()?;

    if font.sheet_width as u32 * font.sheet_height as u32 / 2 != font.sheet_size {
        return Err(BcfntError::InvalidBlockSize(format!(
            "sheet size 0x{:X} does not match {}x{} 4-bit sheets",
            font.sheet_size, font.sheet_width, font.sheet_height
        )));
    }
    if font.sheet_width / font.glyph_width as u16 != font.glyphs_per_row
        || font.sheet_height / font.glyph_height as u16 != font.glyphs_per_col
    {
        return Err(BcfntError::InvalidBlockSize(format!(
            "glyph grid {}x{} does not match {}x{} cells on a {}x{} sheet",
            font.glyphs_per_row,
            font.glyphs_per_col,
            font.glyph_width,
            font.glyph_height,
            font.sheet_width,
            font.sheet_height
        )));
    }

    let sheet_data_offset = input.read_u32()?;
    input.seek(sheet_data_offset as usize)?;

    for sheet_index in 0..font.num_sheets {
        let bytes = input.read_bytes(font.sheet_size as usize)?;
        let sheet = unpack_sheet(bytes, font.sheet_width as u32, font.sheet_height as u32);

        for y in 0..font.glyphs_per_col as u32 {
            for x in 0..font.glyphs_per_row as u32 {
                let index =
                    sheet_index as u32 * font.glyphs_per_sheet + y * font.glyphs_per_row as u32 + x;
                let code = cmap::code_point_from_index(&font.cmaps, index as u16);
                if code == NO_GLYPH {
                    continue;
                }

                let cell = imageops::crop_imm(
                    &sheet,
                    x * font.glyph_width as u32 + 1,
                    y * font.glyph_height as u32 + 1,
                    font.cell_width as u32,
                    font.cell_height as u32,
                )
                .to_image();
                let mut img =
                    GrayImage::new(font.glyph_width as u32, font.glyph_height as u32);
                imageops::overlay(&mut img, &cell, 0, 0);

                let ascent = font.ascent;
                font.glyphs.entry(code).or_insert_with(|| Glyph {
                    img,
                    info: CharWidthInfo::default(),
                    ascent,
                });
            }
        }
    }

    Ok(())
}

/// Decode one CWDH block; its index range is authoritative. Returns the next
/// chain offset.
fn decode_cwdh(input: &mut Reader, offset: u32, font: &mut Bcfnt) -> Result<u32, BcfntError> {
    seek_block(input, offset)?;

    input.skip(4)?; // section size
    let start_index = input.read_u16()?;
    let end_index = input.read_u16()?;
    let next = input.read_u32()?;

    for index in start_index..end_index {
        let info = CharWidthInfo {
            left: input.read_i8()?,
            glyph_width: input.read_u8()?,
            char_width: input.read_u8()?,
        };
        let code = cmap::code_point_from_index(&font.cmaps, index);
        if code == NO_GLYPH {
            continue;
        }
        if let Some(glyph) = font.glyphs.get_mut(&code) {
            glyph.info = info;
        }
    }

    Ok(next)
}
