//! # Sfnt Directory Reader
//!
//! Parses the table directory of a font blob, optionally at a byte offset
//! selecting one face inside a TrueType Collection. Every table record is
//! bounds-checked against the whole blob up front, so later stages can slice
//! tables without re-validating.

use super::bytes::{i16_at, u16_at, u32_at, Tag};
use crate::error::{Result, SubsetError};

/// `0x00010000`: the standard TrueType sfnt version.
pub const SFNT_VERSION_TRUETYPE: u32 = 0x0001_0000;
/// `'true'`: legacy Apple TrueType version tag.
pub const SFNT_VERSION_APPLE: u32 = 0x7472_7565;
/// `'OTTO'`: CFF outlines, which we don't subset.
pub const SFNT_VERSION_CFF: u32 = 0x4F54_544F;
/// `'ttcf'`: collection header.
pub const TTC_TAG: u32 = 0x7474_6366;

const OFFSET_TABLE_LEN: usize = 12;
const TABLE_RECORD_LEN: usize = 16;

/// One entry of the source table directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableRecord {
    pub tag: Tag,
    pub checksum: u32,
    pub offset: u32,
    pub length: u32,
}

impl TableRecord {
    fn range(&self) -> std::ops::Range<usize> {
        self.offset as usize..self.offset as usize + self.length as usize
    }
}

/// An immutable view over one face of a caller-owned font blob.
#[derive(Debug, Clone)]
pub struct FontFile<'a> {
    data: &'a [u8],
    face_offset: u32,
    sfnt_version: u32,
    records: Vec<TableRecord>,
}

impl<'a> FontFile<'a> {
    /// Parse the table directory found at `face_offset`.
    pub fn parse(data: &'a [u8], face_offset: u32) -> Result<Self> {
        let base = face_offset as usize;
        if base.checked_add(OFFSET_TABLE_LEN).map_or(true, |end| end > data.len()) {
            return Err(SubsetError::format(format!(
                "offset table at {} runs past end of font ({} bytes)",
                face_offset,
                data.len()
            )));
        }

        let sfnt_version = u32_at(data, base).unwrap_or_default();
        match sfnt_version {
            SFNT_VERSION_TRUETYPE | SFNT_VERSION_APPLE => {}
            SFNT_VERSION_CFF => {
                return Err(SubsetError::format(
                    "CFF-flavoured OpenType ('OTTO') fonts are not supported",
                ))
            }
            TTC_TAG => {
                return Err(SubsetError::format(
                    "face offset points at a 'ttcf' collection header, not a face directory",
                ))
            }
            other => {
                return Err(SubsetError::format(format!(
                    "unrecognized sfnt version 0x{:08X}",
                    other
                )))
            }
        }

        let num_tables = u16_at(data, base + 4).unwrap_or_default() as usize;
        let dir_end = base + OFFSET_TABLE_LEN + num_tables * TABLE_RECORD_LEN;
        if dir_end > data.len() {
            return Err(SubsetError::format(format!(
                "table directory with {} records is truncated",
                num_tables
            )));
        }

        let mut records = Vec::with_capacity(num_tables);
        for i in 0..num_tables {
            let pos = base + OFFSET_TABLE_LEN + i * TABLE_RECORD_LEN;
            let tag = Tag([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]);
            let record = TableRecord {
                tag,
                checksum: u32_at(data, pos + 4).unwrap_or_default(),
                offset: u32_at(data, pos + 8).unwrap_or_default(),
                length: u32_at(data, pos + 12).unwrap_or_default(),
            };
            let end = record.offset as u64 + record.length as u64;
            if end > data.len() as u64 {
                return Err(SubsetError::format(format!(
                    "table '{}' (offset {}, length {}) extends past end of font ({} bytes)",
                    tag,
                    record.offset,
                    record.length,
                    data.len()
                )));
            }
            records.push(record);
        }

        Ok(FontFile {
            data,
            face_offset,
            sfnt_version,
            records,
        })
    }

    pub fn face_offset(&self) -> u32 {
        self.face_offset
    }

    pub fn sfnt_version(&self) -> u32 {
        self.sfnt_version
    }

    /// Table records in source directory order.
    pub fn records(&self) -> &[TableRecord] {
        &self.records
    }

    pub fn record(&self, tag: Tag) -> Option<&TableRecord> {
        self.records.iter().find(|r| r.tag == tag)
    }

    /// The bytes of `tag`, if the font has that table.
    pub fn table(&self, tag: Tag) -> Option<&'a [u8]> {
        let data: &'a [u8] = self.data;
        self.record(tag).map(|r| &data[r.range()])
    }

    /// The bytes of a table the subsetter cannot work without.
    pub fn required(&self, tag: Tag) -> Result<&'a [u8]> {
        self.table(tag)
            .ok_or_else(|| SubsetError::format(format!("missing required '{}' table", tag)))
    }

    pub fn head(&self) -> Result<&'a [u8]> {
        let head = self.required(Tag::HEAD)?;
        if head.len() < 54 {
            return Err(SubsetError::truncated("head", 54));
        }
        Ok(head)
    }

    pub fn hhea(&self) -> Result<&'a [u8]> {
        let hhea = self.required(Tag::HHEA)?;
        if hhea.len() < 36 {
            return Err(SubsetError::truncated("hhea", 36));
        }
        Ok(hhea)
    }

    pub fn maxp(&self) -> Result<&'a [u8]> {
        let maxp = self.required(Tag::MAXP)?;
        if maxp.len() < 6 {
            return Err(SubsetError::truncated("maxp", 6));
        }
        Ok(maxp)
    }

    pub fn hmtx(&self) -> Result<&'a [u8]> {
        self.required(Tag::HMTX)
    }

    pub fn loca(&self) -> Result<&'a [u8]> {
        self.required(Tag::LOCA)
    }

    pub fn glyf(&self) -> Result<&'a [u8]> {
        self.required(Tag::GLYF)
    }

    pub fn cmap(&self) -> Result<&'a [u8]> {
        self.required(Tag::CMAP)
    }

    pub fn num_glyphs(&self) -> Result<u16> {
        Ok(u16_at(self.maxp()?, 4).unwrap_or_default())
    }

    /// `head.indexToLocFormat`: 0 for short offsets, 1 for long.
    pub fn index_to_loc_format(&self) -> Result<i16> {
        Ok(i16_at(self.head()?, 50).unwrap_or_default())
    }

    /// `hhea.numberOfHMetrics`.
    pub fn num_h_metrics(&self) -> Result<u16> {
        Ok(u16_at(self.hhea()?, 34).unwrap_or_default())
    }
}

/// Resolve the per-face directory offsets of a `ttcf` collection.
///
/// A bare sfnt yields a single offset of `0`, so callers can treat both
/// shapes uniformly.
pub fn collection_face_offsets(data: &[u8]) -> Result<Vec<u32>> {
    let tag = u32_at(data, 0).ok_or_else(|| SubsetError::format("font data is empty"))?;
    if tag != TTC_TAG {
        return Ok(vec![0]);
    }
    let num_fonts = u32_at(data, 8)
        .ok_or_else(|| SubsetError::format("collection header truncated"))?;
    let mut offsets = Vec::new();
    for i in 0..num_fonts as usize {
        let offset = u32_at(data, 12 + i * 4).ok_or_else(|| {
            SubsetError::format(format!("collection offset table truncated at face {}", i))
        })?;
        if offset as usize >= data.len() {
            return Err(SubsetError::format(format!(
                "collection face {} offset {} is past end of file",
                i, offset
            )));
        }
        offsets.push(offset);
    }
    Ok(offsets)
}

/// Resolve a face index to the offset `compute_subset` expects.
pub fn face_offset_for_index(data: &[u8], face_index: u32) -> Result<u32> {
    let offsets = collection_face_offsets(data)?;
    offsets.get(face_index as usize).copied().ok_or_else(|| {
        SubsetError::argument(format!(
            "face index {} out of range ({} faces)",
            face_index,
            offsets.len()
        ))
    })
}
