//! Coverage tables (formats 1 and 2).

use crate::{
    Result, SubsetError,
    reader::Reader,
    types::{GlyphId, GlyphMap},
    writer::Writer,
};

/// Glyphs in coverage-index order.
pub fn decode_coverage(data: &[u8], offset: usize) -> Result<Vec<GlyphId>> {
    let mut r = Reader::at(data, offset)?;
    match r.read_u16()? {
        1 => {
            let count = r.read_u16()? as usize;
            Ok(r.read_u16_array(count)?.into_iter().map(GlyphId).collect())
        }
        2 => {
            let count = r.read_u16()? as usize;
            let mut glyphs = Vec::new();
            for _ in 0..count {
                let start = r.read_u16()?;
                let end = r.read_u16()?;
                let start_index = r.read_u16()? as usize;
                if end < start || start_index != glyphs.len() {
                    return Err(SubsetError::malformed("Coverage", "inconsistent range record"));
                }
                glyphs.extend((start..=end).map(GlyphId));
            }
            Ok(glyphs)
        }
        format => Err(SubsetError::malformed("Coverage", format!("unknown format {format}"))),
    }
}

/// Encode ascending glyphs in whichever format is smaller (format 1 on ties).
pub fn encode_coverage(glyphs: &[GlyphId]) -> Vec<u8> {
    let ranges = glyph_ranges(glyphs);
    let mut w = Writer::new();
    if 2 * glyphs.len() <= 6 * ranges.len() {
        w.write_u16(1);
        w.write_u16(glyphs.len() as u16);
        for g in glyphs {
            w.write_u16(g.to_u16());
        }
    } else {
        w.write_u16(2);
        w.write_u16(ranges.len() as u16);
        let mut index = 0u16;
        for (start, end) in ranges {
            w.write_u16(start);
            w.write_u16(end);
            w.write_u16(index);
            index += end - start + 1;
        }
    }
    w.finish()
}

fn glyph_ranges(glyphs: &[GlyphId]) -> Vec<(u16, u16)> {
    let mut ranges: Vec<(u16, u16)> = Vec::new();
    for g in glyphs {
        match ranges.last_mut() {
            Some((_, end)) if end.checked_add(1) == Some(g.to_u16()) => *end = g.to_u16(),
            _ => ranges.push((g.to_u16(), g.to_u16())),
        }
    }
    ranges
}

/// Pair each covered glyph with its per-index record, keeping only kept
/// glyphs and renumbering them.
pub fn retain<T>(coverage: &[GlyphId], records: Vec<T>, map: &GlyphMap) -> Vec<(GlyphId, T)> {
    coverage
        .iter()
        .zip(records)
        .filter_map(|(g, record)| map.get(*g).map(|new| (new, record)))
        .collect()
}
