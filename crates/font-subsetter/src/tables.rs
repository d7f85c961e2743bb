//! Glyph-indexed tables outside the outlines and layout.

use std::collections::{BTreeMap, HashMap};

use log::debug;
use read_fonts::{FontData, FontRead, tables::post::Post, types::Tag};
use write_fonts::{dump_table, tables::cmap::Cmap, types::Version16Dot16};

use crate::{
    Result, SubsetError,
    reader::{Reader, u16_at, u32_at},
    types::{GlyphId, GlyphMap},
    writer::Writer,
};

pub const CMAP: Tag = Tag::new(b"cmap");
pub const MAXP: Tag = Tag::new(b"maxp");
pub const HHEA: Tag = Tag::new(b"hhea");
pub const HMTX: Tag = Tag::new(b"hmtx");
pub const VHEA: Tag = Tag::new(b"vhea");
pub const VMTX: Tag = Tag::new(b"vmtx");
pub const POST: Tag = Tag::new(b"post");
pub const OS2: Tag = Tag::new(b"OS/2");
pub const VORG: Tag = Tag::new(b"VORG");

/// Glyph-indexed tables the engine cannot rewrite.
pub const UNSUBSETTABLE: &[Tag] = &[
    Tag::new(b"hdmx"),
    Tag::new(b"LTSH"),
    Tag::new(b"kern"),
    Tag::new(b"EBDT"),
    Tag::new(b"EBLC"),
    Tag::new(b"EBSC"),
    Tag::new(b"CBDT"),
    Tag::new(b"CBLC"),
    Tag::new(b"sbix"),
    Tag::new(b"COLR"),
    Tag::new(b"CPAL"),
    Tag::new(b"SVG "),
    Tag::new(b"DSIG"),
    Tag::new(b"JSTF"),
    Tag::new(b"MATH"),
    Tag::new(b"morx"),
    Tag::new(b"kerx"),
    Tag::new(b"gvar"),
    Tag::new(b"HVAR"),
    Tag::new(b"VVAR"),
];

/// Variation tables with no per-glyph data; kept unless variation data is
/// explicitly dropped.
pub const VARIATION_TABLES: &[Tag] = &[
    Tag::new(b"fvar"),
    Tag::new(b"avar"),
    Tag::new(b"STAT"),
    Tag::new(b"MVAR"),
    Tag::new(b"cvar"),
];

const NUM_GLYPHS_OFFSET: usize = 4;
const NUM_LONG_METRICS_OFFSET: usize = 34;
const INDEX_TO_LOC_FORMAT_OFFSET: usize = 50;
const FIRST_CHAR_INDEX_OFFSET: usize = 64;
const POST_V2: u32 = 0x0002_0000;
const POST_HEADER_LEN: usize = 32;
const STANDARD_NAMES: u16 = 258;

fn patched_u16(data: &[u8], table: &'static str, offset: usize, value: u16) -> Result<Vec<u8>> {
    if data.len() < offset + 2 {
        return Err(SubsetError::malformed(table, format!("{} bytes is too short", data.len())));
    }
    let mut out = data.to_vec();
    out[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
    Ok(out)
}

pub fn subset_maxp(data: &[u8], map: &GlyphMap) -> Result<Vec<u8>> {
    patched_u16(data, "maxp", NUM_GLYPHS_OFFSET, map.num_glyphs())
}

/// Set indexToLocFormat when the outlines were rebuilt as glyf/loca.
pub fn subset_head(data: &[u8], long_loca: Option<bool>) -> Result<Vec<u8>> {
    match long_loca {
        Some(long) => patched_u16(data, "head", INDEX_TO_LOC_FORMAT_OFFSET, long as u16),
        None => Ok(data.to_vec()),
    }
}

/// A rewritten hhea/hmtx or vhea/vmtx pair.
#[derive(Debug)]
pub struct MetricsSubset {
    pub header: Vec<u8>,
    pub metrics: Vec<u8>,
}

/// Rebuild horizontal or vertical metrics for the output glyph order.
///
/// Holes left by `retain_gids` get zero advance and bearing. A trailing run
/// of equal advances is folded into the bearing-only array.
pub fn subset_metrics(
    table: &'static str,
    header: &[u8],
    metrics: &[u8],
    map: &GlyphMap,
) -> Result<MetricsSubset> {
    let num_long = u16_at(header, NUM_LONG_METRICS_OFFSET)? as usize;
    if num_long == 0 && map.source_glyphs() > 0 {
        return Err(SubsetError::malformed(table, "no long metrics"));
    }
    let metric = |gid: GlyphId| -> Result<(u16, i16)> {
        let gid = gid.to_usize();
        let mut r = Reader::new(metrics);
        if gid < num_long {
            r.seek(gid * 4)?;
            Ok((r.read_u16()?, r.read_i16()?))
        } else {
            r.seek((num_long - 1) * 4)?;
            let advance = r.read_u16()?;
            r.seek(num_long * 4 + (gid - num_long) * 2)?;
            Ok((advance, r.read_i16()?))
        }
    };

    let entries = map
        .iter()
        .map(|(_, old)| old.map_or(Ok((0, 0)), metric))
        .collect::<Result<Vec<_>>>()?;

    let mut long = entries.len();
    while long > 1 && entries[long - 1].0 == entries[long - 2].0 {
        long -= 1;
    }

    let mut w = Writer::with_capacity(long * 4 + (entries.len() - long) * 2);
    for (i, (advance, bearing)) in entries.iter().enumerate() {
        if i < long {
            w.write_u16(*advance);
        }
        w.write_i16(*bearing);
    }
    debug!("{table}: {long} long metrics for {} glyphs", entries.len());

    Ok(MetricsSubset {
        header: patched_u16(header, table, NUM_LONG_METRICS_OFFSET, long as u16)?,
        metrics: w.finish(),
    })
}

/// Keep version 2.0 glyph names when asked and available, otherwise
/// downgrade to version 3.0.
pub fn subset_post(data: &[u8], map: &GlyphMap, retain_names: bool) -> Result<Vec<u8>> {
    let version = u32_at(data, 0)?;
    if retain_names && version == POST_V2 {
        return subset_post_names(data, map);
    }
    let post = Post::read(FontData::new(data))?;
    let mut out = write_fonts::tables::post::Post::new(
        post.italic_angle(),
        post.underline_position(),
        post.underline_thickness(),
        post.is_fixed_pitch(),
        post.min_mem_type42(),
        post.max_mem_type42(),
        post.min_mem_type1(),
        post.max_mem_type1(),
    );
    out.version = Version16Dot16::VERSION_3_0;
    dump_table(&out).map_err(|e| SubsetError::Write(e.to_string()))
}

fn subset_post_names(data: &[u8], map: &GlyphMap) -> Result<Vec<u8>> {
    let mut r = Reader::at(data, POST_HEADER_LEN)?;
    let count = r.read_u16()? as usize;
    let indices = r.read_u16_array(count)?;
    let mut names = Vec::new();
    while !r.is_empty() {
        let len = r.read_u8()? as usize;
        names.push(r.read_bytes(len)?);
    }

    let mut kept: Vec<&[u8]> = Vec::new();
    let mut renumbered: HashMap<&[u8], u16> = HashMap::new();
    let mut new_indices = Vec::with_capacity(map.num_glyphs() as usize);
    for (_, old) in map.iter() {
        let index = old.and_then(|g| indices.get(g.to_usize()).copied()).unwrap_or(0);
        if index < STANDARD_NAMES {
            new_indices.push(index);
            continue;
        }
        let name = names.get((index - STANDARD_NAMES) as usize).copied().ok_or_else(|| {
            SubsetError::malformed("post", format!("name index {index} out of range"))
        })?;
        let new = *renumbered.entry(name).or_insert_with(|| {
            kept.push(name);
            STANDARD_NAMES + kept.len() as u16 - 1
        });
        new_indices.push(new);
    }

    let mut w = Writer::new();
    w.write_bytes(&data[..POST_HEADER_LEN]);
    w.write_u16(new_indices.len() as u16);
    for index in new_indices {
        w.write_u16(index);
    }
    for name in kept {
        w.write_u8(name.len() as u8);
        w.write_bytes(name);
    }
    Ok(w.finish())
}

/// Narrow usFirstCharIndex/usLastCharIndex to the retained code points.
///
/// Both fields are 16-bit: a supplementary code point at either end is
/// written as 0xFFFF, so a subset with no BMP code point gets 0xFFFF twice.
pub fn subset_os2(data: &[u8], codepoints: &BTreeMap<u32, GlyphId>) -> Result<Vec<u8>> {
    let (Some(first), Some(last)) = (codepoints.keys().next(), codepoints.keys().next_back()) else {
        return Ok(data.to_vec());
    };
    let out = patched_u16(data, "OS/2", FIRST_CHAR_INDEX_OFFSET, (*first).min(0xFFFF) as u16)?;
    patched_u16(&out, "OS/2", FIRST_CHAR_INDEX_OFFSET + 2, (*last).min(0xFFFF) as u16)
}

pub fn subset_vorg(data: &[u8], map: &GlyphMap) -> Result<Vec<u8>> {
    let mut r = Reader::new(data);
    let header = r.read_bytes(6)?;
    let count = r.read_u16()?;
    let mut records = Vec::new();
    for _ in 0..count {
        let gid = GlyphId(r.read_u16()?);
        let origin = r.read_i16()?;
        if let Some(new) = map.get(gid) {
            records.push((new, origin));
        }
    }

    let mut w = Writer::with_capacity(8 + records.len() * 4);
    w.write_bytes(header);
    w.write_u16(records.len() as u16);
    for (gid, origin) in records {
        w.write_u16(gid.to_u16());
        w.write_i16(origin);
    }
    Ok(w.finish())
}

/// Build a cmap from code point to output glyph mappings.
pub fn build_cmap(mappings: impl IntoIterator<Item = (u32, GlyphId)>) -> Result<Vec<u8>> {
    let mappings: Vec<(char, write_fonts::types::GlyphId)> = mappings
        .into_iter()
        .filter_map(|(cp, gid)| {
            char::from_u32(cp).map(|c| (c, write_fonts::types::GlyphId::new(gid.to_u16() as u32)))
        })
        .collect();
    let cmap = Cmap::from_mappings(mappings)
        .map_err(|e| SubsetError::Write(format!("conflicting cmap mappings: {e:?}")))?;
    dump_table(&cmap).map_err(|e| SubsetError::Write(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use read_fonts::tables::cmap::Cmap as ReadCmap;

    use super::*;

    fn map(kept: &[u16], total: u16) -> GlyphMap {
        let kept: BTreeSet<GlyphId> = kept.iter().copied().map(GlyphId).collect();
        GlyphMap::compact(&kept, total)
    }

    fn hhea(num_long: u16) -> Vec<u8> {
        let mut data = vec![0u8; 36];
        data[34..36].copy_from_slice(&num_long.to_be_bytes());
        data
    }

    fn hmtx(long: &[(u16, i16)], bearings: &[i16]) -> Vec<u8> {
        let mut w = Writer::new();
        for (a, b) in long {
            w.write_u16(*a);
            w.write_i16(*b);
        }
        for b in bearings {
            w.write_i16(*b);
        }
        w.finish()
    }

    #[test]
    fn test_metrics_compress_trailing_advances() {
        let header = hhea(3);
        let metrics = hmtx(&[(500, 1), (600, 2), (700, 3)], &[4, 5]);
        let out = subset_metrics("hmtx", &header, &metrics, &map(&[0, 3, 4], 5)).unwrap();
        assert_eq!(u16_at(&out.header, 34).unwrap(), 2);
        assert_eq!(out.metrics, hmtx(&[(500, 1), (700, 4)], &[5]));
    }

    #[test]
    fn test_metrics_holes_are_zero() {
        let header = hhea(3);
        let metrics = hmtx(&[(500, 1), (600, 2), (700, 3)], &[]);
        let kept: BTreeSet<GlyphId> = [0, 2].into_iter().map(GlyphId).collect();
        let map = GlyphMap::retain_gids(&kept, 3);
        let out = subset_metrics("hmtx", &header, &metrics, &map).unwrap();
        assert_eq!(out.metrics, hmtx(&[(500, 1), (0, 0), (700, 3)], &[]));
    }

    #[test]
    fn test_maxp_num_glyphs() {
        let maxp = [0, 0, 0x50, 0, 0, 100];
        assert_eq!(subset_maxp(&maxp, &map(&[0, 7], 100)).unwrap(), vec![0, 0, 0x50, 0, 0, 2]);
    }

    #[test]
    fn test_head_loca_format() {
        let head = vec![0u8; 54];
        let out = subset_head(&head, Some(true)).unwrap();
        assert_eq!(u16_at(&out, 50).unwrap(), 1);
        assert!(subset_head(&head[..40], Some(false)).is_err());
    }

    #[test]
    fn test_post_names_renumbered() {
        let mut data = vec![0u8; 32];
        data[..4].copy_from_slice(&POST_V2.to_be_bytes());
        let mut w = Writer::new();
        w.write_bytes(&data);
        w.write_u16(4);
        for index in [0, 258, 3, 259] {
            w.write_u16(index);
        }
        for name in [&b"alpha"[..], b"beta"] {
            w.write_u8(name.len() as u8);
            w.write_bytes(name);
        }
        let data = w.finish();

        let out = subset_post(&data, &map(&[0, 3], 4), true).unwrap();
        let mut r = Reader::at(&out, 32).unwrap();
        assert_eq!(r.read_u16().unwrap(), 2);
        assert_eq!(r.read_u16_array(2).unwrap(), vec![0, 258]);
        assert_eq!(r.read_u8().unwrap(), 4);
        assert_eq!(r.read_bytes(4).unwrap(), b"beta");
        assert!(r.is_empty());
    }

    #[test]
    fn test_post_downgraded_to_v3() {
        let mut data = vec![0u8; 34];
        data[..4].copy_from_slice(&POST_V2.to_be_bytes());
        let out = subset_post(&data, &map(&[0], 1), false).unwrap();
        assert_eq!(out.len(), 32);
        assert_eq!(u32_at(&out, 0).unwrap(), 0x0003_0000);
    }

    #[test]
    fn test_vorg_filters_records() {
        let mut w = Writer::new();
        w.write_u16(1);
        w.write_u16(0);
        w.write_i16(880);
        w.write_u16(2);
        w.write_u16(2);
        w.write_i16(900);
        w.write_u16(5);
        w.write_i16(910);
        let out = subset_vorg(&w.finish(), &map(&[0, 5], 6)).unwrap();
        assert_eq!(&out[6..], &[0, 1, 0, 1, 0x03, 0x8E]);
    }

    #[test]
    fn test_os2_char_range() {
        let os2 = vec![0u8; 78];
        let cps = BTreeMap::from([(0x4E2D, GlyphId(1)), (0x6587, GlyphId(2))]);
        let out = subset_os2(&os2, &cps).unwrap();
        assert_eq!(u16_at(&out, 64).unwrap(), 0x4E2D);
        assert_eq!(u16_at(&out, 66).unwrap(), 0x6587);
    }

    #[test]
    fn test_os2_char_range_with_supplementary_code_points() {
        let os2 = vec![0u8; 78];
        let mixed = BTreeMap::from([(0x4E2D, GlyphId(1)), (0x20000, GlyphId(2))]);
        let out = subset_os2(&os2, &mixed).unwrap();
        assert_eq!(u16_at(&out, 64).unwrap(), 0x4E2D);
        assert_eq!(u16_at(&out, 66).unwrap(), 0xFFFF);

        let supplementary = BTreeMap::from([(0x20000, GlyphId(1)), (0x2A6DF, GlyphId(2))]);
        let out = subset_os2(&os2, &supplementary).unwrap();
        assert_eq!(u16_at(&out, 64).unwrap(), 0xFFFF);
        assert_eq!(u16_at(&out, 66).unwrap(), 0xFFFF);
    }

    #[test]
    fn test_cmap_rebuilt() {
        let data = build_cmap([(0x4E2D, GlyphId(1)), (0x1F600, GlyphId(2))]).unwrap();
        let cmap = ReadCmap::read(FontData::new(&data)).unwrap();
        assert_eq!(cmap.map_codepoint(0x4E2Du32).map(|g| g.to_u32()), Some(1));
        assert_eq!(cmap.map_codepoint(0x1F600u32).map(|g| g.to_u32()), Some(2));
    }
}
