//! Structured error types for the subsetter.
//!
//! Every failure is fatal to the single subsetting call. The variants mirror
//! where the fault lies: the font itself, the caller's arguments, a glyph id
//! the font doesn't have, or a malformed JSON request.

use thiserror::Error;

/// The unified error type returned by all public subsetting functions.
#[derive(Debug, Error)]
pub enum SubsetError {
    /// The font is corrupt or uses a format we don't support.
    #[error("Font format error: {0}")]
    Format(String),
    /// The caller passed an invalid argument (face offset, length, empty glyph list).
    #[error("Invalid argument: {0}")]
    Argument(String),
    /// A requested glyph id is outside the font's glyph range.
    #[error("Glyph id {glyph_id} out of range (font has {num_glyphs} glyphs)")]
    Index { glyph_id: u16, num_glyphs: u16 },
    /// A JSON subset request failed to parse.
    #[error("Failed to parse subset request: {source}{}", format_hint(.hint))]
    Config {
        #[source]
        source: serde_json::Error,
        hint: String,
    },
}

pub type Result<T> = std::result::Result<T, SubsetError>;

impl SubsetError {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        SubsetError::Format(msg.into())
    }

    pub(crate) fn argument(msg: impl Into<String>) -> Self {
        SubsetError::Argument(msg.into())
    }

    /// Shorthand for "table `tag` ends before offset `needed`".
    pub(crate) fn truncated(tag: &str, needed: usize) -> Self {
        SubsetError::Format(format!("'{}' table truncated (need {} bytes)", tag, needed))
    }
}

fn format_hint(hint: &str) -> String {
    if hint.is_empty() {
        String::new()
    } else {
        format!("\n  Hint: {}", hint)
    }
}

impl From<serde_json::Error> for SubsetError {
    fn from(e: serde_json::Error) -> Self {
        let hint = match e.classify() {
            serde_json::error::Category::Syntax => {
                "Check for trailing commas, missing quotes, or unescaped characters.".to_string()
            }
            serde_json::error::Category::Data => {
                "The JSON is valid but doesn't match the subset request schema. Expected glyphIds, text, faceIndex or faceOffset.".to_string()
            }
            serde_json::error::Category::Eof => {
                "Unexpected end of input. Is the JSON truncated?".to_string()
            }
            serde_json::error::Category::Io => String::new(),
        };
        SubsetError::Config { source: e, hint }
    }
}
