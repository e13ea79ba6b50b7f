//! `glyf` / `loca` access: per-glyph byte ranges, composite component
//! records, and glyph instruction streams.

use super::bytes::{i16_at, u16_at, u32_at, write_u16};
use super::directory::FontFile;
use crate::error::{Result, SubsetError};

const ARG_1_AND_2_ARE_WORDS: u16 = 0x0001;
const WE_HAVE_A_SCALE: u16 = 0x0008;
const MORE_COMPONENTS: u16 = 0x0020;
const WE_HAVE_AN_X_AND_Y_SCALE: u16 = 0x0040;
const WE_HAVE_A_TWO_BY_TWO: u16 = 0x0080;
const WE_HAVE_INSTRUCTIONS: u16 = 0x0100;

/// Size of the glyph header (numberOfContours + bbox).
const GLYPH_HEADER_LEN: usize = 10;

/// Parsed `loca` offsets alongside the raw `glyf` table.
pub struct GlyphTable<'a> {
    glyf: &'a [u8],
    offsets: Vec<u32>,
    long_format: bool,
}

impl<'a> GlyphTable<'a> {
    pub fn new(font: &FontFile<'a>) -> Result<Self> {
        let glyf = font.glyf()?;
        let loca = font.loca()?;
        let num_glyphs = font.num_glyphs()?;
        let long_format = font.index_to_loc_format()? != 0;
        let offsets = parse_loca(loca, long_format, num_glyphs)?;
        Ok(GlyphTable {
            glyf,
            offsets,
            long_format,
        })
    }

    pub fn num_glyphs(&self) -> u16 {
        (self.offsets.len() - 1) as u16
    }

    pub fn is_long_format(&self) -> bool {
        self.long_format
    }

    /// Raw outline bytes of `gid`. Empty for glyphs without an outline.
    pub fn glyph_data(&self, gid: u16) -> Result<&'a [u8]> {
        let idx = gid as usize;
        if idx + 1 >= self.offsets.len() {
            return Err(SubsetError::Index {
                glyph_id: gid,
                num_glyphs: self.num_glyphs(),
            });
        }
        let start = self.offsets[idx] as usize;
        let end = (self.offsets[idx + 1] as usize).min(self.glyf.len());
        if start >= end {
            return Ok(&[]);
        }
        Ok(&self.glyf[start..end])
    }

    /// Component glyph ids of `gid`; empty for simple and empty glyphs.
    pub fn components(&self, gid: u16) -> Result<Vec<u16>> {
        let data = self.glyph_data(gid)?;
        if !is_composite(data) {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for component in component_records(data)? {
            ids.push(component.glyph_id);
        }
        Ok(ids)
    }
}

fn parse_loca(loca: &[u8], long_format: bool, num_glyphs: u16) -> Result<Vec<u32>> {
    let count = num_glyphs as usize + 1;
    let entry = if long_format { 4 } else { 2 };
    if loca.len() < count * entry {
        return Err(SubsetError::format(format!(
            "'loca' has {} bytes, need {} for {} glyphs",
            loca.len(),
            count * entry,
            num_glyphs
        )));
    }
    let offsets = (0..count)
        .map(|i| {
            if long_format {
                u32_at(loca, i * 4).unwrap_or_default()
            } else {
                u16_at(loca, i * 2).unwrap_or_default() as u32 * 2
            }
        })
        .collect();
    Ok(offsets)
}

/// A glyph with a negative contour count is a composite.
pub fn is_composite(glyph: &[u8]) -> bool {
    matches!(i16_at(glyph, 0), Some(n) if n < 0)
}

/// One component record inside a composite glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Component {
    pub flags: u16,
    pub glyph_id: u16,
    /// Offset of the record's glyphIndex field within the glyph.
    pub glyph_id_offset: usize,
}

/// Walk the component records of a composite glyph.
pub fn component_records(glyph: &[u8]) -> Result<Vec<Component>> {
    let mut pos = GLYPH_HEADER_LEN;
    let mut components = Vec::new();
    loop {
        let flags = u16_at(glyph, pos)
            .ok_or_else(|| SubsetError::format("composite glyph record truncated"))?;
        let glyph_id = u16_at(glyph, pos + 2)
            .ok_or_else(|| SubsetError::format("composite glyph record truncated"))?;
        components.push(Component {
            flags,
            glyph_id,
            glyph_id_offset: pos + 2,
        });
        pos += 4;

        pos += if flags & ARG_1_AND_2_ARE_WORDS != 0 { 4 } else { 2 };
        if flags & WE_HAVE_A_SCALE != 0 {
            pos += 2;
        } else if flags & WE_HAVE_AN_X_AND_Y_SCALE != 0 {
            pos += 4;
        } else if flags & WE_HAVE_A_TWO_BY_TWO != 0 {
            pos += 8;
        }

        if pos > glyph.len() {
            return Err(SubsetError::format("composite glyph arguments truncated"));
        }
        if flags & MORE_COMPONENTS == 0 {
            break;
        }
    }
    Ok(components)
}

/// The TrueType instructions attached to a glyph, or an empty slice.
///
/// Malformed glyph data yields no instructions rather than an error: an
/// outline we can't read has no hinting we could keep alive anyway.
pub fn glyph_instructions(glyph: &[u8]) -> &[u8] {
    let Some(num_contours) = i16_at(glyph, 0) else {
        return &[];
    };
    let len_pos = if num_contours >= 0 {
        GLYPH_HEADER_LEN + num_contours as usize * 2
    } else {
        let Ok(components) = component_records(glyph) else {
            return &[];
        };
        if components.iter().all(|c| c.flags & WE_HAVE_INSTRUCTIONS == 0) {
            return &[];
        }
        match components.last() {
            Some(last) => component_end(last),
            None => return &[],
        }
    };
    let Some(len) = u16_at(glyph, len_pos) else {
        return &[];
    };
    let start = len_pos + 2;
    glyph.get(start..start + len as usize).unwrap_or(&[])
}

fn component_end(component: &Component) -> usize {
    let flags = component.flags;
    let mut pos = component.glyph_id_offset + 2;
    pos += if flags & ARG_1_AND_2_ARE_WORDS != 0 { 4 } else { 2 };
    if flags & WE_HAVE_A_SCALE != 0 {
        pos += 2;
    } else if flags & WE_HAVE_AN_X_AND_Y_SCALE != 0 {
        pos += 4;
    } else if flags & WE_HAVE_A_TWO_BY_TWO != 0 {
        pos += 8;
    }
    pos
}

/// Rewrite component glyph ids in place through `remap`.
pub fn rewrite_components(
    glyph: &mut [u8],
    mut remap: impl FnMut(u16) -> Option<u16>,
) -> Result<()> {
    for component in component_records(glyph)? {
        let new_gid = remap(component.glyph_id).ok_or_else(|| {
            SubsetError::format(format!(
                "component glyph {} missing from glyph map",
                component.glyph_id
            ))
        })?;
        write_u16(glyph, component.glyph_id_offset, new_gid);
    }
    Ok(())
}
