//! # sfnt Writer
//!
//! Lays out the offset table, the table directory and the table data, then
//! patches `head.checksumAdjustment` once the whole file exists.

use super::bytes::{checksum, write_u32, Tag};

/// `head.checksumAdjustment` is chosen so the whole file sums to this.
const CHECKSUM_MAGIC: u32 = 0xB1B0_AFBA;
const OFFSET_TABLE_LEN: usize = 12;
const TABLE_RECORD_LEN: usize = 16;

/// `(searchRange, entrySelector, rangeShift)` for `num_tables` records.
pub fn search_params(num_tables: u16) -> (u16, u16, u16) {
    if num_tables == 0 {
        return (0, 0, 0);
    }
    let entry_selector = num_tables.ilog2() as u16;
    let search_range = (1u16 << entry_selector) * 16;
    let range_shift = num_tables * 16 - search_range;
    (search_range, entry_selector, range_shift)
}

/// Write a standalone TrueType file from `(tag, data)` pairs.
pub fn write_ttf_file(mut tables: Vec<(Tag, Vec<u8>)>) -> Vec<u8> {
    tables.sort_by_key(|(tag, _)| *tag);

    let num_tables = tables.len() as u16;
    let (search_range, entry_selector, range_shift) = search_params(num_tables);

    let dir_size = OFFSET_TABLE_LEN + tables.len() * TABLE_RECORD_LEN;
    let data_size: usize = tables.iter().map(|(_, d)| padded_len(d.len())).sum();
    let mut output: Vec<u8> = Vec::with_capacity(dir_size + data_size);

    output.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    output.extend_from_slice(&num_tables.to_be_bytes());
    output.extend_from_slice(&search_range.to_be_bytes());
    output.extend_from_slice(&entry_selector.to_be_bytes());
    output.extend_from_slice(&range_shift.to_be_bytes());

    let mut table_offset = dir_size;
    let mut head_offset = None;
    for (tag, data) in &tables {
        if *tag == Tag::HEAD {
            head_offset = Some(table_offset);
        }
        output.extend_from_slice(&tag.0);
        output.extend_from_slice(&checksum(data).to_be_bytes());
        output.extend_from_slice(&(table_offset as u32).to_be_bytes());
        output.extend_from_slice(&(data.len() as u32).to_be_bytes());
        table_offset += padded_len(data.len());
    }

    for (_, data) in &tables {
        output.extend_from_slice(data);
        output.resize(padded_len(output.len()), 0);
    }

    // head was written with checksumAdjustment = 0
    if let Some(offset) = head_offset {
        if offset + 12 <= output.len() {
            let adjustment = CHECKSUM_MAGIC.wrapping_sub(checksum(&output));
            write_u32(&mut output, offset + 8, adjustment);
        }
    }

    output
}

fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}
