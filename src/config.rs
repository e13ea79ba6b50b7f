//! # Subset Requests
//!
//! A JSON description of what to keep, for callers that don't want to work
//! out glyph ids and face offsets themselves:
//!
//! ```json
//! { "glyphIds": [36, 37], "text": "Héllo", "faceIndex": 1, "sourceUri": "fonts/Inter.ttc" }
//! ```
//!
//! `text` is resolved to glyph ids through the face's own cmap.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SubsetError};
use crate::font::directory::{collection_face_offsets, face_offset_for_index};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubsetRequest {
    #[serde(default)]
    pub glyph_ids: Vec<u16>,
    /// Characters whose glyphs should be kept, in addition to `glyph_ids`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Face within a `ttcf` collection. Ignored for a bare sfnt beyond 0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face_index: Option<u32>,
    /// Raw directory offset, for callers that already resolved the face.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face_offset: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
}

/// A request with its face and glyph list pinned down against real font data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRequest {
    pub face_offset: u32,
    pub glyph_ids: Vec<u16>,
    pub source_uri: String,
}

impl SubsetRequest {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Resolve the face offset and turn `text` into glyph ids.
    pub fn resolve(&self, font_data: &[u8]) -> Result<ResolvedRequest> {
        let (face_index, face_offset) = match (self.face_index, self.face_offset) {
            (Some(_), Some(_)) => {
                return Err(SubsetError::argument(
                    "faceIndex and faceOffset are mutually exclusive",
                ))
            }
            (None, Some(offset)) => {
                let index = collection_face_offsets(font_data)?
                    .iter()
                    .position(|&o| o == offset)
                    .ok_or_else(|| {
                        SubsetError::argument(format!("no face starts at offset {}", offset))
                    })?;
                (index as u32, offset)
            }
            (index, None) => {
                let index = index.unwrap_or(0);
                (index, face_offset_for_index(font_data, index)?)
            }
        };

        let mut glyph_ids = self.glyph_ids.clone();
        if let Some(text) = self.text.as_deref().filter(|t| !t.is_empty()) {
            glyph_ids.extend(glyphs_for_text(font_data, face_index, text)?);
        }

        Ok(ResolvedRequest {
            face_offset,
            glyph_ids,
            source_uri: self.source_uri.clone().unwrap_or_default(),
        })
    }
}

/// Look up each character of `text` in the face's cmap.
///
/// Characters the font can't map are skipped; glyph 0 is always kept anyway.
pub fn glyphs_for_text(font_data: &[u8], face_index: u32, text: &str) -> Result<Vec<u16>> {
    let face = ttf_parser::Face::parse(font_data, face_index)
        .map_err(|e| SubsetError::format(format!("cannot read cmap for text lookup: {}", e)))?;
    let mut glyphs = Vec::with_capacity(text.len());
    for ch in text.chars() {
        match face.glyph_index(ch) {
            Some(gid) => glyphs.push(gid.0),
            None => log::warn!("no glyph for U+{:04X}; skipping", ch as u32),
        }
    }
    Ok(glyphs)
}
