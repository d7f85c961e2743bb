//! Font reassembly: table directory, padding and checksums.

use indexmap::IndexMap;
use read_fonts::types::Tag;

use crate::{
    sfnt::{HEAD, checksum},
    writer::Writer,
};

const CHECKSUM_MAGIC: u32 = 0xB1B0_AFBA;

/// `(searchRange, entrySelector, rangeShift)` for `num_tables` entries.
///
/// From 4096 tables on the exact values no longer fit 16 bits; they are
/// clamped to 0xFFFF.
pub fn directory_params(num_tables: u16) -> (u16, u16, u16) {
    let entry_selector = if num_tables == 0 { 0 } else { num_tables.ilog2() };
    let search_range = (1u32 << entry_selector) * 16;
    let range_shift = (num_tables as u32 * 16).saturating_sub(search_range);
    let clamp = |v: u32| v.min(0xFFFF) as u16;
    (clamp(search_range), entry_selector as u16, clamp(range_shift))
}

/// Serialize a complete font from `(tag, data)` pairs.
///
/// Tables are sorted by tag and padded to 4 bytes. The `head`
/// checksumAdjustment is zeroed before checksumming and patched last.
pub fn assemble(sfnt_version: u32, tables: IndexMap<Tag, Vec<u8>>) -> Vec<u8> {
    let mut tables: Vec<(Tag, Vec<u8>)> = tables.into_iter().collect();
    tables.sort_by_key(|(tag, _)| *tag);

    let count = tables.len() as u16;
    let (search_range, entry_selector, range_shift) = directory_params(count);

    let mut w = Writer::with_capacity(
        12 + tables.len() * 16 + tables.iter().map(|(_, d)| d.len() + 3).sum::<usize>(),
    );
    w.write_u32(sfnt_version);
    w.write_u16(count);
    w.write_u16(search_range);
    w.write_u16(entry_selector);
    w.write_u16(range_shift);

    let mut adjustment_at = None;
    let mut offset = 12 + tables.len() * 16;
    for (tag, data) in &mut tables {
        if *tag == HEAD && data.len() >= 12 {
            data[8..12].fill(0);
            adjustment_at = Some(offset + 8);
        }
        w.write_tag(*tag);
        w.write_u32(checksum(data));
        w.write_u32(offset as u32);
        w.write_u32(data.len() as u32);
        offset += data.len().next_multiple_of(4);
    }

    for (_, data) in &tables {
        w.write_bytes(data);
        w.align(4);
    }

    if let Some(at) = adjustment_at {
        let sum = checksum(w.as_slice());
        w.patch_u32(at, CHECKSUM_MAGIC.wrapping_sub(sum));
    }
    w.finish()
}
