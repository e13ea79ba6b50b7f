//! # Table Rebuilding
//!
//! Per-table rewrites driven by the glyph id map. Tables with per-glyph
//! data (`glyf`, `loca`, `hmtx`) are rebuilt in new-id order; tables that
//! only carry counts or flags (`maxp`, `hhea`, `head`) are copied with
//! those fields patched.

use super::bytes::{u16_at, u32_at, write_u16, write_u32};
use super::closure::GlyphIdMap;
use super::glyf::{is_composite, rewrite_components, GlyphTable};
use crate::error::{Result, SubsetError};

/// Largest `glyf` length a short (`u16 × 2`) loca can address.
pub const SHORT_LOCA_LIMIT: usize = 0x1FFFE;

/// Rebuilt `glyf` + `loca` pair.
pub struct GlyfLoca {
    pub glyf: Vec<u8>,
    pub loca: Vec<u8>,
    pub long_format: bool,
}

/// Copy retained outlines in new-id order, remapping composite components.
pub fn rebuild_glyf_loca(glyphs: &GlyphTable<'_>, map: &GlyphIdMap) -> Result<GlyfLoca> {
    let mut glyf: Vec<u8> = Vec::new();
    let mut offsets: Vec<u32> = Vec::with_capacity(map.len() + 1);

    for &old_gid in map.old_ids() {
        offsets.push(glyf.len() as u32);
        let data = glyphs.glyph_data(old_gid)?;
        if data.is_empty() {
            continue;
        }
        let start = glyf.len();
        glyf.extend_from_slice(data);
        if is_composite(data) {
            rewrite_components(&mut glyf[start..], |old| map.new_id(old))?;
        }
        // Entries must start on even offsets
        if glyf.len() % 2 != 0 {
            glyf.push(0);
        }
    }
    offsets.push(glyf.len() as u32);

    let long_format = needs_long_loca(glyphs.is_long_format(), glyf.len());
    if long_format && !glyphs.is_long_format() {
        log::debug!(
            "glyf grew to {} bytes; switching loca to long format",
            glyf.len()
        );
    }
    let loca = build_loca(&offsets, long_format);
    Ok(GlyfLoca {
        glyf,
        loca,
        long_format,
    })
}

/// A long source stays long; a short one is upgraded once the rebuilt
/// `glyf` outgrows what halved `u16` offsets can reach.
pub fn needs_long_loca(source_long: bool, glyf_len: usize) -> bool {
    source_long || glyf_len > SHORT_LOCA_LIMIT
}

pub fn build_loca(offsets: &[u32], long_format: bool) -> Vec<u8> {
    let mut data = Vec::with_capacity(offsets.len() * if long_format { 4 } else { 2 });
    for &offset in offsets {
        if long_format {
            data.extend_from_slice(&offset.to_be_bytes());
        } else {
            data.extend_from_slice(&((offset / 2) as u16).to_be_bytes());
        }
    }
    data
}

/// Rebuilt `hmtx` with its `numberOfHMetrics`.
pub struct HorizontalMetrics {
    pub hmtx: Vec<u8>,
    pub num_h_metrics: u16,
}

/// `(advanceWidth, lsb)` for one source glyph.
pub fn glyph_metrics(hmtx: &[u8], num_h_metrics: u16, gid: u16) -> Result<(u16, u16)> {
    if num_h_metrics == 0 {
        return Err(SubsetError::format("'hhea.numberOfHMetrics' is zero"));
    }
    let nhm = num_h_metrics as usize;
    let idx = gid as usize;
    let (advance_pos, lsb_pos) = if idx < nhm {
        (idx * 4, idx * 4 + 2)
    } else {
        ((nhm - 1) * 4, nhm * 4 + (idx - nhm) * 2)
    };
    match (u16_at(hmtx, advance_pos), u16_at(hmtx, lsb_pos)) {
        (Some(advance), Some(lsb)) => Ok((advance, lsb)),
        _ => Err(SubsetError::format(format!(
            "'hmtx' too short for glyph {}",
            gid
        ))),
    }
}

/// Emit metrics for retained glyphs, compressing a trailing run of equal
/// advance widths into the lsb-only tail.
pub fn rebuild_hmtx(hmtx: &[u8], num_h_metrics: u16, map: &GlyphIdMap) -> Result<HorizontalMetrics> {
    let metrics = map
        .old_ids()
        .iter()
        .map(|&gid| glyph_metrics(hmtx, num_h_metrics, gid))
        .collect::<Result<Vec<_>>>()?;

    let last_advance = metrics.last().map(|m| m.0).unwrap_or_default();
    let mut long_count = metrics.len();
    while long_count > 1 && metrics[long_count - 2].0 == last_advance {
        long_count -= 1;
    }

    let mut data = Vec::with_capacity(long_count * 4 + (metrics.len() - long_count) * 2);
    for (i, &(advance, lsb)) in metrics.iter().enumerate() {
        if i < long_count {
            data.extend_from_slice(&advance.to_be_bytes());
        }
        data.extend_from_slice(&lsb.to_be_bytes());
    }
    Ok(HorizontalMetrics {
        hmtx: data,
        num_h_metrics: long_count as u16,
    })
}

pub fn rebuild_hhea(hhea: &[u8], num_h_metrics: u16) -> Vec<u8> {
    let mut out = hhea.to_vec();
    write_u16(&mut out, 34, num_h_metrics);
    out
}

pub fn rebuild_maxp(maxp: &[u8], num_glyphs: u16) -> Vec<u8> {
    let mut out = maxp.to_vec();
    write_u16(&mut out, 4, num_glyphs);
    out
}

/// Copy `head`, zeroing `checksumAdjustment` and setting `indexToLocFormat`.
pub fn rebuild_head(head: &[u8], long_loca: bool) -> Vec<u8> {
    let mut out = head.to_vec();
    write_u32(&mut out, 8, 0);
    write_u16(&mut out, 50, long_loca as u16);
    out
}

const POST_V2: u32 = 0x0002_0000;
const POST_V2_5: u32 = 0x0002_5000;
const POST_V3: u32 = 0x0003_0000;
const POST_HEADER_LEN: usize = 32;

/// `post` passes through unless it carries per-glyph names, which are
/// keyed by source ids; those collapse to a version 3.0 header.
pub fn rebuild_post(post: &[u8]) -> Result<Vec<u8>> {
    let version = u32_at(post, 0).ok_or_else(|| SubsetError::truncated("post", 4))?;
    if version != POST_V2 && version != POST_V2_5 {
        return Ok(post.to_vec());
    }
    let header = post
        .get(..POST_HEADER_LEN)
        .ok_or_else(|| SubsetError::truncated("post", POST_HEADER_LEN))?;
    let mut out = header.to_vec();
    write_u32(&mut out, 0, POST_V3);
    Ok(out)
}
