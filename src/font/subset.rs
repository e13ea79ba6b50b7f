//! # Subsetting Pipeline
//!
//! Wires the stages together for one call:
//!
//! ```text
//! FontFile::parse → compute_closure → ControlProgramAnalyzer
//!     → rebuild tables → write_ttf_file
//! ```
//!
//! Nothing here outlives the call except the opcode table the `Subsetter`
//! borrows.

use super::assemble::write_ttf_file;
use super::bytes::Tag;
use super::closure::{compute_closure, GlyphIdMap};
use super::cmap::rebuild_cmap;
use super::directory::FontFile;
use super::glyf::{glyph_instructions, GlyphTable};
use super::hinting::{ControlProgramAnalyzer, ControlProgramUsage};
use super::opcodes::{self, OpcodeTable};
use super::tables::{
    rebuild_glyf_loca, rebuild_head, rebuild_hhea, rebuild_hmtx, rebuild_maxp, rebuild_post,
};
use crate::error::{Result, SubsetError};

/// Offset table size; a face must have at least this much data after it.
const MIN_FACE_LEN: usize = 12;

/// Everything a subsetting call produces.
#[derive(Debug, Clone)]
pub struct SubsetResult {
    /// The standalone subset font.
    pub font_data: Vec<u8>,
    /// Old → new glyph ids. Needed to rewrite glyph references in the
    /// embedding document (e.g. PDF CID widths).
    pub glyph_map: GlyphIdMap,
    /// Hinting analysis, or `None` when no retained glyph carries instructions.
    pub usage: Option<ControlProgramUsage>,
    /// Tags written to the output, in directory order.
    pub tables: Vec<Tag>,
}

/// Runs the subsetting pipeline against one opcode table.
///
/// `Subsetter::new()` uses the process-wide table. Tests can build their
/// own [`OpcodeTable`] and hand it in with [`Subsetter::with_opcodes`].
#[derive(Debug, Clone, Copy)]
pub struct Subsetter<'t> {
    opcodes: &'t OpcodeTable,
}

impl Subsetter<'static> {
    pub fn new() -> Self {
        Subsetter {
            opcodes: opcodes::global(),
        }
    }
}

impl Default for Subsetter<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'t> Subsetter<'t> {
    pub fn with_opcodes(opcodes: &'t OpcodeTable) -> Self {
        Subsetter { opcodes }
    }

    /// Subset the face at `face_offset` down to `glyph_ids` and whatever
    /// those glyphs reference.
    pub fn subset(
        &self,
        font_data: &[u8],
        source_uri: &str,
        face_offset: u32,
        glyph_ids: &[u16],
    ) -> Result<SubsetResult> {
        validate_arguments(font_data, face_offset, glyph_ids)?;

        let font = FontFile::parse(font_data, face_offset)?;
        let glyphs = GlyphTable::new(&font)?;
        let glyph_map = compute_closure(&glyphs, glyph_ids)?;
        log::debug!(
            "{}: {} requested glyphs close over {} of {}",
            source_uri,
            glyph_ids.len(),
            glyph_map.len(),
            glyphs.num_glyphs()
        );

        let mut out: Vec<(Tag, Vec<u8>)> = Vec::with_capacity(13);

        // ── Outlines and metrics ──
        let glyf_loca = rebuild_glyf_loca(&glyphs, &glyph_map)?;
        let metrics = rebuild_hmtx(font.hmtx()?, font.num_h_metrics()?, &glyph_map)?;
        let num_glyphs = glyph_map.len() as u16;

        out.push((Tag::HEAD, rebuild_head(font.head()?, glyf_loca.long_format)));
        out.push((Tag::MAXP, rebuild_maxp(font.maxp()?, num_glyphs)));
        out.push((Tag::HHEA, rebuild_hhea(font.hhea()?, metrics.num_h_metrics)));
        out.push((Tag::HMTX, metrics.hmtx));
        out.push((Tag::LOCA, glyf_loca.loca));
        out.push((Tag::GLYF, glyf_loca.glyf));
        out.push((Tag::CMAP, rebuild_cmap(font.cmap()?, &glyph_map)?));

        // ── Hinting ──
        let usage = self.retain_hinting(&font, &glyphs, &glyph_map, source_uri, &mut out)?;

        // ── Pass-through ──
        for tag in [Tag::NAME, Tag::OS2] {
            if let Some(data) = font.table(tag) {
                out.push((tag, data.to_vec()));
            }
        }
        if let Some(post) = font.table(Tag::POST) {
            out.push((Tag::POST, rebuild_post(post)?));
        }

        let mut tables: Vec<Tag> = out.iter().map(|(tag, _)| *tag).collect();
        tables.sort();
        log::debug!(
            "{}: writing {} tables: {}",
            source_uri,
            tables.len(),
            tables
                .iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let font_data = write_ttf_file(out);
        Ok(SubsetResult {
            font_data,
            glyph_map,
            usage,
            tables,
        })
    }

    /// Decide which of `fpgm`, `prep` and `cvt ` the retained glyphs need,
    /// pushing the kept ones onto `out`.
    fn retain_hinting(
        &self,
        font: &FontFile<'_>,
        glyphs: &GlyphTable<'_>,
        glyph_map: &GlyphIdMap,
        source_uri: &str,
        out: &mut Vec<(Tag, Vec<u8>)>,
    ) -> Result<Option<ControlProgramUsage>> {
        let mut programs: Vec<&[u8]> = Vec::new();
        for &gid in glyph_map.old_ids() {
            let instructions = glyph_instructions(glyphs.glyph_data(gid)?);
            if !instructions.is_empty() {
                programs.push(instructions);
            }
        }

        if programs.is_empty() {
            log::debug!("{}: no retained glyph is hinted; dropping fpgm, prep, cvt", source_uri);
            return Ok(None);
        }

        let fpgm = font.table(Tag::FPGM);
        let prep = font.table(Tag::PREP);
        let cvt = font.table(Tag::CVT);
        let usage = ControlProgramAnalyzer::new(self.opcodes).analyze(fpgm, prep, &programs);
        log::debug!(
            "{}: {} hinted glyphs; functions {:?}{}, cvt {:?}{}",
            source_uri,
            programs.len(),
            usage.functions,
            if usage.all_functions { " (all)" } else { "" },
            usage.cvt,
            if usage.all_cvt { " (all)" } else { "" }
        );

        if let Some(prep) = prep {
            out.push((Tag::PREP, prep.to_vec()));
        }
        if let Some(fpgm) = fpgm.filter(|_| usage.references_functions()) {
            out.push((Tag::FPGM, fpgm.to_vec()));
        }
        if let Some(cvt) = cvt.filter(|_| usage.references_cvt()) {
            out.push((Tag::CVT, cvt.to_vec()));
        }
        Ok(Some(usage))
    }
}

/// Argument checks that run before any table is touched.
fn validate_arguments(font_data: &[u8], face_offset: u32, glyph_ids: &[u16]) -> Result<()> {
    if glyph_ids.is_empty() {
        return Err(SubsetError::argument("glyph id list is empty"));
    }
    let face = face_offset as usize;
    if face.checked_add(MIN_FACE_LEN).map_or(true, |end| end > font_data.len()) {
        return Err(SubsetError::argument(format!(
            "face offset {} out of bounds for {} bytes of font data",
            face_offset,
            font_data.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_glyph_list_rejected() {
        let data = [0u8; 64];
        let err = Subsetter::new().subset(&data, "mem:", 0, &[]).unwrap_err();
        assert!(matches!(err, SubsetError::Argument(_)));
    }

    #[test]
    fn test_face_offset_out_of_bounds() {
        let data = [0u8; 64];
        for offset in [60, 64, 1000, u32::MAX] {
            let err = Subsetter::new().subset(&data, "mem:", offset, &[0]).unwrap_err();
            assert!(matches!(err, SubsetError::Argument(_)), "offset {}", offset);
        }
    }

    #[test]
    fn test_garbage_is_format_error() {
        let data = [0xEEu8; 64];
        let err = Subsetter::new().subset(&data, "mem:", 0, &[0]).unwrap_err();
        assert!(matches!(err, SubsetError::Format(_)));
    }

    #[test]
    fn test_subsetter_debug_summarizes_opcodes() {
        let cell = crate::font::OpcodeTableCell::new();
        let table = cell.get();
        let shown = format!("{:?}", Subsetter::with_opcodes(table));
        assert!(shown.starts_with("Subsetter"));
        assert!(shown.contains(&format!("defined: {}", table.defined_count())));
        // The 256 entries themselves are not dumped
        assert!(!shown.contains("CALL"));
    }
}
