//! # Font Subsetting
//!
//! Reading a TrueType face, working out which glyphs and hinting state a
//! document needs, and writing a standalone font that holds just those.
//!
//! The modules run leaves-first:
//!
//! - [`directory`] reads the offset table and table records
//! - [`closure`] pulls in composite components and numbers the kept glyphs
//! - [`opcodes`] + [`hinting`] decide which of `fpgm`/`prep`/`cvt ` survive
//! - [`tables`] + [`cmap`] rebuild the per-glyph tables
//! - [`assemble`] lays the result out as an sfnt
//!
//! [`subset`] drives them for one call.

pub mod assemble;
pub mod bytes;
pub mod closure;
pub mod cmap;
pub mod directory;
pub mod glyf;
pub mod hinting;
pub mod opcodes;
pub mod subset;
pub mod tables;

pub use bytes::Tag;
pub use closure::GlyphIdMap;
pub use directory::{collection_face_offsets, face_offset_for_index, FontFile};
pub use hinting::ControlProgramUsage;
pub use opcodes::{OpcodeTable, OpcodeTableCell};
pub use subset::{SubsetResult, Subsetter};
