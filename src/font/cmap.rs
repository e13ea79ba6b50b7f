//! # cmap Rebuilding
//!
//! Reads the source font's Unicode and symbol subtables, keeps the code
//! points whose glyphs survived, and writes them back out against the new
//! glyph ids. BMP-only encodings get format 4, full-repertoire encodings
//! and supplementary-plane code points get format 12, symbol fonts keep
//! their (3,0) record.

use std::collections::BTreeMap;

use super::bytes::{u16_at, u32_at};
use super::closure::GlyphIdMap;
use crate::error::{Result, SubsetError};

/// Highest valid Unicode scalar.
const MAX_CODE_POINT: u32 = 0x10_FFFF;

/// Which kind of subtable an encoding record calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Repertoire {
    /// Unicode BMP: format 4.
    Bmp,
    /// Full Unicode: format 12.
    Full,
    /// Windows symbol (3,0): format 4 over the symbol map.
    Symbol,
}

fn classify(platform: u16, encoding: u16) -> Option<Repertoire> {
    match (platform, encoding) {
        (0, 0..=3) | (3, 1) => Some(Repertoire::Bmp),
        (0, 4) | (0, 6) | (3, 10) => Some(Repertoire::Full),
        (3, 0) => Some(Repertoire::Symbol),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy)]
struct EncodingRecord {
    platform: u16,
    encoding: u16,
    offset: usize,
}

fn encoding_records(cmap: &[u8]) -> Result<Vec<EncodingRecord>> {
    let num_tables = u16_at(cmap, 2).ok_or_else(|| SubsetError::truncated("cmap", 4))? as usize;
    let mut records = Vec::with_capacity(num_tables);
    for i in 0..num_tables {
        let pos = 4 + i * 8;
        let (Some(platform), Some(encoding), Some(offset)) =
            (u16_at(cmap, pos), u16_at(cmap, pos + 2), u32_at(cmap, pos + 4))
        else {
            return Err(SubsetError::truncated("cmap", pos + 8));
        };
        records.push(EncodingRecord {
            platform,
            encoding,
            offset: offset as usize,
        });
    }
    Ok(records)
}

/// Call `f(code, glyph)` for every mapping in the subtable at `offset`.
/// Returns `false` when the subtable format isn't one we read.
fn for_each_mapping(
    cmap: &[u8],
    offset: usize,
    mut f: impl FnMut(u32, u16),
) -> Result<bool> {
    let truncated = || SubsetError::format(format!("cmap subtable at {} is truncated", offset));
    let format = u16_at(cmap, offset).ok_or_else(truncated)?;
    match format {
        0 => {
            let glyphs = cmap.get(offset + 6..offset + 6 + 256).ok_or_else(truncated)?;
            for (code, &gid) in glyphs.iter().enumerate() {
                f(code as u32, gid as u16);
            }
        }
        4 => {
            let seg_x2 = u16_at(cmap, offset + 6).ok_or_else(truncated)? as usize;
            let ends = offset + 14;
            let starts = ends + seg_x2 + 2;
            let deltas = starts + seg_x2;
            let range_offsets = deltas + seg_x2;
            if range_offsets + seg_x2 > cmap.len() {
                return Err(truncated());
            }
            for seg in 0..seg_x2 / 2 {
                let end = u16_at(cmap, ends + seg * 2).unwrap_or_default();
                let start = u16_at(cmap, starts + seg * 2).unwrap_or_default();
                let delta = u16_at(cmap, deltas + seg * 2).unwrap_or_default();
                let ro_pos = range_offsets + seg * 2;
                let range_offset = u16_at(cmap, ro_pos).unwrap_or_default() as usize;
                if start > end {
                    continue;
                }
                for code in start..=end {
                    if code == 0xFFFF {
                        break;
                    }
                    let gid = if range_offset == 0 {
                        code.wrapping_add(delta)
                    } else {
                        let addr = ro_pos + range_offset + (code - start) as usize * 2;
                        match u16_at(cmap, addr) {
                            Some(0) | None => 0,
                            Some(g) => g.wrapping_add(delta),
                        }
                    };
                    f(code as u32, gid);
                }
            }
        }
        6 => {
            let first = u16_at(cmap, offset + 6).ok_or_else(truncated)? as u32;
            let count = u16_at(cmap, offset + 8).ok_or_else(truncated)? as usize;
            for i in 0..count {
                let gid = u16_at(cmap, offset + 10 + i * 2).ok_or_else(truncated)?;
                f(first + i as u32, gid);
            }
        }
        12 | 13 => {
            let num_groups = u32_at(cmap, offset + 12).ok_or_else(truncated)? as usize;
            for i in 0..num_groups {
                let pos = offset + 16 + i * 12;
                let (Some(start), Some(end), Some(glyph)) =
                    (u32_at(cmap, pos), u32_at(cmap, pos + 4), u32_at(cmap, pos + 8))
                else {
                    return Err(truncated());
                };
                if start > end || start > MAX_CODE_POINT {
                    continue;
                }
                for code in start..=end.min(MAX_CODE_POINT) {
                    let gid = if format == 12 {
                        glyph.wrapping_add(code - start)
                    } else {
                        glyph
                    };
                    if gid <= u16::MAX as u32 {
                        f(code, gid as u16);
                    }
                }
            }
        }
        _ => return Ok(false),
    }
    Ok(true)
}

/// Rebuild `cmap` for the retained glyphs.
pub fn rebuild_cmap(cmap: &[u8], map: &GlyphIdMap) -> Result<Vec<u8>> {
    let records = encoding_records(cmap)?;

    let mut unicode: BTreeMap<u32, u16> = BTreeMap::new();
    let mut symbol: BTreeMap<u32, u16> = BTreeMap::new();
    let mut surviving: Vec<(u16, u16, Repertoire)> = Vec::new();
    let mut source_has_unicode = false;

    // Full-repertoire records first so they win over BMP duplicates
    let mut ordered: Vec<(Repertoire, EncodingRecord)> = records
        .iter()
        .filter_map(|r| classify(r.platform, r.encoding).map(|rep| (rep, *r)))
        .collect();
    ordered.sort_by_key(|(rep, r)| (*rep != Repertoire::Full, r.platform, r.encoding));

    for (repertoire, record) in ordered {
        if repertoire != Repertoire::Symbol {
            source_has_unicode = true;
        }
        let target = if repertoire == Repertoire::Symbol {
            &mut symbol
        } else {
            &mut unicode
        };
        let mut survived = false;
        let read = for_each_mapping(cmap, record.offset, |code, old_gid| {
            if old_gid == 0 {
                return;
            }
            if let Some(new_gid) = map.new_id(old_gid) {
                if repertoire == Repertoire::Bmp && code > 0xFFFF {
                    return;
                }
                target.entry(code).or_insert(new_gid);
                survived = true;
            }
        })?;
        if !read {
            log::warn!(
                "skipping cmap subtable ({}, {}): unsupported format",
                record.platform,
                record.encoding
            );
            continue;
        }
        if survived {
            surviving.push((record.platform, record.encoding, repertoire));
        }
    }

    let has_bmp = unicode.keys().any(|&c| c <= 0xFFFF);
    let has_supplementary = unicode.keys().any(|&c| c > 0xFFFF);
    if has_supplementary && !surviving.iter().any(|s| s.2 == Repertoire::Full) {
        surviving.push((3, 10, Repertoire::Full));
    }
    if has_bmp && !surviving.iter().any(|s| s.2 == Repertoire::Bmp) {
        surviving.push((3, 1, Repertoire::Bmp));
    }
    if surviving.is_empty() {
        let symbol_only = !source_has_unicode
            && records
                .iter()
                .any(|r| classify(r.platform, r.encoding) == Some(Repertoire::Symbol));
        surviving.push(if symbol_only {
            (3, 0, Repertoire::Symbol)
        } else {
            (3, 1, Repertoire::Bmp)
        });
    }
    surviving.sort_by_key(|&(platform, encoding, _)| (platform, encoding));
    surviving.dedup_by_key(|s| (s.0, s.1));

    log::debug!(
        "cmap: {} unicode + {} symbol mappings survive across {} encoding records",
        unicode.len(),
        symbol.len(),
        surviving.len()
    );

    // One subtable per repertoire, shared between records
    let bmp: Vec<(u16, u16)> = unicode
        .iter()
        .filter(|(&c, _)| c <= 0xFFFF)
        .map(|(&c, &g)| (c as u16, g))
        .collect();
    let symbol_pairs: Vec<(u16, u16)> = symbol
        .iter()
        .filter(|(&c, _)| c <= 0xFFFF)
        .map(|(&c, &g)| (c as u16, g))
        .collect();
    let full: Vec<(u32, u16)> = unicode.iter().map(|(&c, &g)| (c, g)).collect();

    let mut subtables: BTreeMap<Repertoire, Vec<u8>> = BTreeMap::new();
    for &(_, _, repertoire) in &surviving {
        if subtables.contains_key(&repertoire) {
            continue;
        }
        let data = match repertoire {
            Repertoire::Bmp => build_format4(&bmp).unwrap_or_else(|| {
                log::warn!("cmap format 4 subtable would overflow; using format 12 instead");
                build_format12(&full)
            }),
            Repertoire::Symbol => build_format4(&symbol_pairs).unwrap_or_else(|| {
                let wide: Vec<(u32, u16)> = symbol.iter().map(|(&c, &g)| (c, g)).collect();
                build_format12(&wide)
            }),
            Repertoire::Full => build_format12(&full),
        };
        subtables.insert(repertoire, data);
    }

    let header_len = 4 + surviving.len() * 8;
    let mut offsets: BTreeMap<Repertoire, u32> = BTreeMap::new();
    let mut body = Vec::new();
    for (repertoire, data) in &subtables {
        offsets.insert(*repertoire, (header_len + body.len()) as u32);
        body.extend_from_slice(data);
    }

    let mut out = Vec::with_capacity(header_len + body.len());
    out.extend_from_slice(&0u16.to_be_bytes()); // version
    out.extend_from_slice(&(surviving.len() as u16).to_be_bytes());
    for &(platform, encoding, repertoire) in &surviving {
        out.extend_from_slice(&platform.to_be_bytes());
        out.extend_from_slice(&encoding.to_be_bytes());
        out.extend_from_slice(&offsets[&repertoire].to_be_bytes());
    }
    out.extend_from_slice(&body);
    Ok(out)
}

/// Build a format 4 subtable. `None` if it can't fit a 16-bit length.
///
/// Each run of consecutive code points becomes one segment; runs whose
/// glyph ids share a single delta use `idDelta`, the rest index into
/// `glyphIdArray`.
fn build_format4(pairs: &[(u16, u16)]) -> Option<Vec<u8>> {
    // (start, end, glyph ids)
    let mut segments: Vec<(u16, u16, Vec<u16>)> = Vec::new();
    for &(code, gid) in pairs {
        if code == 0xFFFF {
            continue;
        }
        if let Some(last) = segments.last_mut() {
            if code == last.1 + 1 {
                last.1 = code;
                last.2.push(gid);
                continue;
            }
        }
        segments.push((code, code, vec![gid]));
    }
    // Sentinel segment
    segments.push((0xFFFF, 0xFFFF, vec![0]));

    let seg_count = segments.len();
    let mut end_codes = Vec::with_capacity(seg_count);
    let mut start_codes = Vec::with_capacity(seg_count);
    let mut id_deltas = Vec::with_capacity(seg_count);
    let mut id_range_offsets = Vec::with_capacity(seg_count);
    let mut glyph_id_array: Vec<u16> = Vec::new();

    for (i, (start, end, gids)) in segments.iter().enumerate() {
        start_codes.push(*start);
        end_codes.push(*end);
        if *start == 0xFFFF {
            id_deltas.push(1u16);
            id_range_offsets.push(0u16);
            continue;
        }
        let delta = gids[0].wrapping_sub(*start);
        let uniform = gids
            .iter()
            .enumerate()
            .all(|(j, &g)| g == start.wrapping_add(j as u16).wrapping_add(delta));
        if uniform {
            id_deltas.push(delta);
            id_range_offsets.push(0);
        } else {
            // Distance from this idRangeOffset slot to the segment's first glyph
            let words = (seg_count - i) + glyph_id_array.len();
            id_deltas.push(0);
            id_range_offsets.push(u16::try_from(words * 2).ok()?);
            glyph_id_array.extend_from_slice(gids);
        }
    }

    let length = 16 + seg_count * 8 + glyph_id_array.len() * 2;
    let length = u16::try_from(length).ok()?;
    let seg_count_x2 = (seg_count * 2) as u16;
    let entry_selector = (seg_count as u16).ilog2() as u16;
    let search_range = 2 * (1u16 << entry_selector);
    let range_shift = seg_count_x2 - search_range;

    let mut out = Vec::with_capacity(length as usize);
    out.extend_from_slice(&4u16.to_be_bytes());
    out.extend_from_slice(&length.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes()); // language
    out.extend_from_slice(&seg_count_x2.to_be_bytes());
    out.extend_from_slice(&search_range.to_be_bytes());
    out.extend_from_slice(&entry_selector.to_be_bytes());
    out.extend_from_slice(&range_shift.to_be_bytes());
    for v in &end_codes {
        out.extend_from_slice(&v.to_be_bytes());
    }
    out.extend_from_slice(&0u16.to_be_bytes()); // reservedPad
    for v in start_codes.iter().chain(&id_deltas).chain(&id_range_offsets) {
        out.extend_from_slice(&v.to_be_bytes());
    }
    for v in &glyph_id_array {
        out.extend_from_slice(&v.to_be_bytes());
    }
    Some(out)
}

/// Build a format 12 subtable from sorted `(code, glyph)` pairs.
fn build_format12(pairs: &[(u32, u16)]) -> Vec<u8> {
    // (startCharCode, endCharCode, startGlyphID)
    let mut groups: Vec<(u32, u32, u32)> = Vec::new();
    for &(code, gid) in pairs {
        if let Some(last) = groups.last_mut() {
            if code == last.1 + 1 && gid as u32 == last.2 + (code - last.0) {
                last.1 = code;
                continue;
            }
        }
        groups.push((code, code, gid as u32));
    }

    let length = 16 + groups.len() * 12;
    let mut out = Vec::with_capacity(length);
    out.extend_from_slice(&12u16.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes()); // reserved
    out.extend_from_slice(&(length as u32).to_be_bytes());
    out.extend_from_slice(&0u32.to_be_bytes()); // language
    out.extend_from_slice(&(groups.len() as u32).to_be_bytes());
    for (start, end, glyph) in groups {
        out.extend_from_slice(&start.to_be_bytes());
        out.extend_from_slice(&end.to_be_bytes());
        out.extend_from_slice(&glyph.to_be_bytes());
    }
    out
}

/// Every Unicode `(code, glyph)` mapping in a cmap. The first subtable to
/// map a code wins.
pub fn unicode_mappings(cmap: &[u8]) -> Result<BTreeMap<u32, u16>> {
    let mut out = BTreeMap::new();
    for record in encoding_records(cmap)? {
        if matches!(
            classify(record.platform, record.encoding),
            Some(Repertoire::Bmp | Repertoire::Full)
        ) {
            for_each_mapping(cmap, record.offset, |code, gid| {
                if gid != 0 {
                    out.entry(code).or_insert(gid);
                }
            })?;
        }
    }
    Ok(out)
}
