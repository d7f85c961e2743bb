//! charset: glyph ID to SID (or CID in CID-keyed fonts).

use crate::{Result, SubsetError, reader::Reader, writer::Writer};

/// Predefined charset identifiers stored in place of an offset.
const ISO_ADOBE: usize = 0;
const EXPERT: usize = 1;
const EXPERT_SUBSET: usize = 2;

/// Decode the charset at `offset` for `num_glyphs` glyphs. Entry 0 is
/// always `.notdef` (SID/CID 0).
pub fn decode_charset(data: &[u8], offset: usize, num_glyphs: usize) -> Result<Vec<u16>> {
    match offset {
        ISO_ADOBE => return Ok((0..num_glyphs as u16).collect()),
        EXPERT | EXPERT_SUBSET => {
            return Err(SubsetError::UnsupportedFeature(
                "predefined Expert charsets".into(),
            ));
        }
        _ => {}
    }

    let mut r = Reader::at(data, offset)?;
    let format = r.read_u8()?;
    let mut ids = Vec::with_capacity(num_glyphs);
    ids.push(0);
    match format {
        0 => {
            while ids.len() < num_glyphs {
                ids.push(r.read_u16()?);
            }
        }
        1 | 2 => {
            while ids.len() < num_glyphs {
                let first = r.read_u16()?;
                let left = if format == 1 { r.read_u8()? as u16 } else { r.read_u16()? };
                for i in 0..=left {
                    if ids.len() == num_glyphs {
                        break;
                    }
                    ids.push(first.wrapping_add(i));
                }
            }
        }
        _ => return Err(SubsetError::MalformedDict(format!("charset format {format}"))),
    }
    Ok(ids)
}

/// Runs of consecutive ids as `(first, count)`, skipping `.notdef`.
fn ranges(ids: &[u16]) -> Vec<(u16, usize)> {
    let mut out: Vec<(u16, usize)> = Vec::new();
    for &id in ids.iter().skip(1) {
        match out.last_mut() {
            Some((first, count)) if first.wrapping_add(*count as u16) == id => *count += 1,
            _ => out.push((id, 1)),
        }
    }
    out
}

/// Encode a charset in whichever of formats 0, 1 and 2 is smallest.
pub fn encode_charset(ids: &[u16]) -> Vec<u8> {
    let runs = ranges(ids);
    let format0 = 2 * ids.len().saturating_sub(1);
    let format1: usize = runs.iter().map(|(_, n)| n.div_ceil(256) * 3).sum();
    let format2 = runs.len() * 4;

    let mut w = Writer::new();
    if format0 <= format1 && format0 <= format2 {
        w.write_u8(0);
        for &id in ids.iter().skip(1) {
            w.write_u16(id);
        }
    } else if format1 <= format2 {
        w.write_u8(1);
        for &(first, count) in &runs {
            let mut first = first;
            let mut count = count;
            while count > 0 {
                let n = count.min(256);
                w.write_u16(first);
                w.write_u8((n - 1) as u8);
                first = first.wrapping_add(n as u16);
                count -= n;
            }
        }
    } else {
        w.write_u8(2);
        for &(first, count) in &runs {
            w.write_u16(first);
            w.write_u16((count - 1) as u16);
        }
    }
    w.finish()
}
