//! Code-point → glyph-index mapping (CMAP) model.
//!
//! A font carries a list of CMAP entries, each covering a code range with
//! one of three payload variants. Lookups scan the list in order and return
//! the first non-sentinel hit, so entries behave as a partition hint rather
//! than a strict partition. The serializer always emits disjoint ranges.
//!
//! `0xFFFF` is the reserved "no glyph" sentinel on the wire and in lookup
//! results; it is never a valid code point.

use std::collections::BTreeMap;

/// Sentinel for "no glyph" in lookup results and Table payloads.
pub const NO_GLYPH: u16 = 0xFFFF;

/// Small Direct entries below this span get folded into one Scan entry.
const MIN_CHARS: u16 = 7;

/// Payload of a CMAP entry, tagged by the on-wire mapping method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CmapData {
    /// Code `c` maps to `c - code_begin + offset`.
    Direct { offset: u16 },
    /// One index per code in the range; `NO_GLYPH` marks holes.
    Table { entries: Vec<u16> },
    /// Sparse (code, index) pairs, kept sorted by code for deterministic
    /// serialization.
    Scan { entries: BTreeMap<u16, u16> },
}

impl CmapData {
    /// On-wire mapping method tag.
    pub fn method(&self) -> u16 {
        match self {
            CmapData::Direct { .. } => 0,
            CmapData::Table { .. } => 1,
            CmapData::Scan { .. } => 2,
        }
    }

    /// Serialized payload size in bytes, including alignment padding.
    /// Direct and Scan always carry a trailing pad word; Table pads only
    /// when the entry count is odd.
    pub fn payload_size(&self) -> u32 {
        match self {
            CmapData::Direct { .. } => 4,
            CmapData::Table { entries } => {
                (entries.len() as u32 + entries.len() as u32 % 2) * 2
            }
            CmapData::Scan { entries } => 4 + entries.len() as u32 * 4,
        }
    }
}

/// One CMAP entry: an inclusive code range plus its mapping payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cmap {
    pub code_begin: u16,
    pub code_end: u16,
    pub data: CmapData,
}

impl Cmap {
    /// Full serialized block size: 0x14 header plus payload.
    pub fn section_size(&self) -> u32 {
        0x14 + self.data.payload_size()
    }

    /// Resolve a code point within this entry, or `NO_GLYPH`.
    pub fn index_from_code(&self, code: u16) -> u16 {
        if code < self.code_begin || code > self.code_end {
            return NO_GLYPH;
        }
        match &self.data {
            CmapData::Direct { offset } => code - self.code_begin + offset,
            CmapData::Table { entries } => entries
                .get((code - self.code_begin) as usize)
                .copied()
                .unwrap_or(NO_GLYPH),
            CmapData::Scan { entries } => entries.get(&code).copied().unwrap_or(NO_GLYPH),
        }
    }

    /// Reverse lookup: the code point mapped to `index`, or `NO_GLYPH`.
    pub fn code_point_from_index(&self, index: u16) -> u16 {
        match &self.data {
            CmapData::Direct { offset } => {
                let span = self.code_end - self.code_begin;
                if index < *offset || index > offset + span {
                    return NO_GLYPH;
                }
                self.code_begin + (index - offset)
            }
            CmapData::Table { entries } => match entries.iter().position(|&e| e == index) {
                Some(pos) => self.code_begin + pos as u16,
                None => NO_GLYPH,
            },
            CmapData::Scan { entries } => entries
                .iter()
                .find(|&(_, &i)| i == index)
                .map(|(&code, _)| code)
                .unwrap_or(NO_GLYPH),
        }
    }
}

/// Resolve a code point against a CMAP list: first non-sentinel hit wins.
pub fn index_from_code(cmaps: &[Cmap], code: u16) -> u16 {
    for cmap in cmaps {
        let index = cmap.index_from_code(code);
        if index != NO_GLYPH {
            return index;
        }
    }
    NO_GLYPH
}

/// Reverse-resolve a glyph index against a CMAP list.
pub fn code_point_from_index(cmaps: &[Cmap], index: u16) -> u16 {
    for cmap in cmaps {
        let code = cmap.code_point_from_index(index);
        if code != NO_GLYPH {
            return code;
        }
    }
    NO_GLYPH
}

/// Rebuild the CMAP list from the glyph store's ascending code iteration.
///
/// Each contiguous run of codes becomes one Direct entry whose offset is the
/// running glyph index at the moment the run opened.
pub fn rebuild(codes: impl Iterator<Item = u16>) -> Vec<Cmap> {
    let mut cmaps: Vec<Cmap> = Vec::new();

    for (index, code) in codes.enumerate() {
        match cmaps.last_mut() {
            Some(last) if last.code_end + 1 == code => last.code_end = code,
            _ => cmaps.push(Cmap {
                code_begin: code,
                code_end: code,
                data: CmapData::Direct { offset: index as u16 },
            }),
        }
    }

    cmaps
}

/// Fold Direct entries spanning fewer than `MIN_CHARS` codes into a single
/// Scan entry covering their combined range. Shrinks files full of isolated
/// glyphs without changing what any lookup returns.
///
/// A lone small entry is left alone: replacing one Direct block with a
/// one-entry Scan block costs more bytes than it saves.
pub fn coalesce(cmaps: &mut Vec<Cmap>) {
    let small = |cmap: &Cmap| {
        matches!(cmap.data, CmapData::Direct { .. }) && cmap.code_end - cmap.code_begin < MIN_CHARS - 1
    };
    if cmaps.iter().filter(|c| small(c)).count() < 2 {
        return;
    }

    let mut code_begin = NO_GLYPH;
    let mut code_end = 0;
    let mut entries: BTreeMap<u16, u16> = BTreeMap::new();

    cmaps.retain(|cmap| {
        let offset = match cmap.data {
            CmapData::Direct { offset } if cmap.code_end - cmap.code_begin < MIN_CHARS - 1 => {
                offset
            }
            _ => return true,
        };
        code_begin = code_begin.min(cmap.code_begin);
        code_end = code_end.max(cmap.code_end);
        for code in cmap.code_begin..=cmap.code_end {
            entries.insert(code, code - cmap.code_begin + offset);
        }
        false
    });

    if !entries.is_empty() {
        cmaps.push(Cmap {
            code_begin,
            code_end,
            data: CmapData::Scan { entries },
        });
    }
}
