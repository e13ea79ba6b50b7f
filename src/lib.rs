//! # ttf-subset
//!
//! A TrueType font subsetter.
//!
//! A document that uses forty characters of a 3,000-glyph font shouldn't
//! embed 3,000 glyphs. Give this crate the font and the glyph ids the
//! document actually draws, and it hands back a standalone font with just
//! those glyphs, the composite components they're built from, and the
//! hinting state their instructions can reach.
//!
//! ## Architecture
//!
//! ```text
//! Input (font bytes + glyph ids)
//!       ↓
//!   [directory]  Validate the face, index its tables
//!       ↓
//!   [closure]    Follow composite components, number the kept glyphs
//!       ↓
//!   [hinting]    Scan bytecode, decide fpgm / prep / cvt
//!       ↓
//!   [tables]     Rebuild glyf, loca, hmtx, cmap, maxp, hhea, head
//!       ↓
//!   [assemble]   Serialize to sfnt bytes
//! ```
//!
//! The output always keeps glyph 0 as `.notdef`, and new glyph ids are
//! contiguous from 0 in the order the glyphs were first seen.

pub mod config;
pub mod error;
pub mod font;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use config::SubsetRequest;
pub use error::{Result, SubsetError};
pub use font::{SubsetResult, Subsetter};

/// Subset a TrueType font to the given glyphs.
///
/// This is the primary entry point. `font_data[..length]` is the whole file;
/// `face_offset` points at the face's offset table (0 for a bare `.ttf`, or
/// one of [`font::collection_face_offsets`] for a `.ttc`). `source_uri` only
/// shows up in log records.
///
/// Returns the bytes of a standalone font whose glyph 0 is the source's
/// glyph 0, followed by `glyph_ids` and their components in first-seen order.
pub fn compute_subset(
    font_data: &[u8],
    length: usize,
    source_uri: &str,
    face_offset: u32,
    glyph_ids: &[u16],
) -> Result<Vec<u8>> {
    let data = font_data.get(..length).ok_or_else(|| {
        SubsetError::Argument(format!(
            "length {} exceeds buffer of {} bytes",
            length,
            font_data.len()
        ))
    })?;
    Subsetter::new()
        .subset(data, source_uri, face_offset, glyph_ids)
        .map(|result| result.font_data)
}

/// Subset a font according to a JSON [`SubsetRequest`].
pub fn subset_json(request_json: &str, font_data: &[u8]) -> Result<SubsetResult> {
    let request = SubsetRequest::from_json(request_json)?;
    let resolved = request.resolve(font_data)?;
    Subsetter::new().subset(
        font_data,
        &resolved.source_uri,
        resolved.face_offset,
        &resolved.glyph_ids,
    )
}
