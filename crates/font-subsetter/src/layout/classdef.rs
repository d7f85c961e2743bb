//! Class definition tables (formats 1 and 2).

use std::collections::BTreeMap;

use crate::{
    Result, SubsetError,
    reader::Reader,
    types::{GlyphId, GlyphMap},
    writer::Writer,
};

/// Non-zero class assignments; unlisted glyphs are class 0.
pub type ClassDef = BTreeMap<GlyphId, u16>;

pub fn decode_class_def(data: &[u8], offset: usize) -> Result<ClassDef> {
    let mut r = Reader::at(data, offset)?;
    let mut classes = ClassDef::new();
    match r.read_u16()? {
        1 => {
            let start = r.read_u16()?;
            let count = r.read_u16()?;
            for i in 0..count {
                let class = r.read_u16()?;
                if class != 0 {
                    classes.insert(GlyphId(start.wrapping_add(i)), class);
                }
            }
        }
        2 => {
            let count = r.read_u16()?;
            for _ in 0..count {
                let start = r.read_u16()?;
                let end = r.read_u16()?;
                let class = r.read_u16()?;
                if end < start {
                    return Err(SubsetError::malformed("ClassDef", "range ends before it starts"));
                }
                if class != 0 {
                    classes.extend((start..=end).map(|g| (GlyphId(g), class)));
                }
            }
        }
        format => {
            return Err(SubsetError::malformed("ClassDef", format!("unknown format {format}")));
        }
    }
    Ok(classes)
}

/// Keep assignments for kept glyphs, renumbered.
pub fn subset_class_def(classes: &ClassDef, map: &GlyphMap) -> ClassDef {
    classes.iter().filter_map(|(g, c)| map.get(*g).map(|new| (new, *c))).collect()
}

pub fn encode_class_def(classes: &ClassDef) -> Vec<u8> {
    let mut ranges: Vec<(u16, u16, u16)> = Vec::new();
    for (g, &class) in classes {
        let g = g.to_u16();
        match ranges.last_mut() {
            Some((_, end, c)) if *c == class && end.checked_add(1) == Some(g) => *end = g,
            _ => ranges.push((g, g, class)),
        }
    }

    let span = match (classes.keys().next(), classes.keys().next_back()) {
        (Some(first), Some(last)) => (last.to_u16() - first.to_u16()) as usize + 1,
        _ => 0,
    };

    let mut w = Writer::new();
    if !classes.is_empty() && 6 + 2 * span < 4 + 6 * ranges.len() {
        let first = classes.keys().next().map_or(0, |g| g.to_u16());
        w.write_u16(1);
        w.write_u16(first);
        w.write_u16(span as u16);
        for i in 0..span as u16 {
            w.write_u16(classes.get(&GlyphId(first + i)).copied().unwrap_or(0));
        }
    } else {
        w.write_u16(2);
        w.write_u16(ranges.len() as u16);
        for (start, end, class) in ranges {
            w.write_u16(start);
            w.write_u16(end);
            w.write_u16(class);
        }
    }
    w.finish()
}
