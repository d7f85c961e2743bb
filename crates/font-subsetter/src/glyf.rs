//! glyf/loca: composite closure and outline subsetting.

use std::collections::BTreeSet;

use read_fonts::types::Tag;

use crate::{
    Result, SubsetError,
    reader::{Reader, u16_at},
    sfnt::{HEAD, SfntFile},
    types::{GlyphId, GlyphMap},
    writer::Writer,
};

pub const GLYF: Tag = Tag::new(b"glyf");
pub const LOCA: Tag = Tag::new(b"loca");

const ARG_1_AND_2_ARE_WORDS: u16 = 0x0001;
const WE_HAVE_A_SCALE: u16 = 0x0008;
const MORE_COMPONENTS: u16 = 0x0020;
const WE_HAVE_AN_X_AND_Y_SCALE: u16 = 0x0040;
const WE_HAVE_A_TWO_BY_TWO: u16 = 0x0080;

/// Largest glyf size the short loca format can address.
const SHORT_LOCA_LIMIT: usize = 0x1FFFE;

/// Output of [`GlyfTable::subset`].
#[derive(Debug)]
pub struct GlyfSubset {
    pub glyf: Vec<u8>,
    pub loca: Vec<u8>,
    pub long_loca: bool,
}

#[derive(Debug, Clone)]
pub struct GlyfTable<'a> {
    glyf: &'a [u8],
    loca: &'a [u8],
    long: bool,
    num_glyphs: usize,
}

impl<'a> GlyfTable<'a> {
    pub fn new(sfnt: &SfntFile<'a>, num_glyphs: u16) -> Result<Self> {
        let glyf = sfnt.expect_table(GLYF)?;
        let loca = sfnt.expect_table(LOCA)?;
        let long = u16_at(sfnt.expect_table(HEAD)?, 50)? != 0;
        Ok(Self { glyf, loca, long, num_glyphs: num_glyphs as usize })
    }

    fn loca_offset(&self, index: usize) -> Result<usize> {
        let mut r = Reader::new(self.loca);
        Ok(if self.long {
            r.seek(index * 4)?;
            r.read_u32()? as usize
        } else {
            r.seek(index * 2)?;
            r.read_u16()? as usize * 2
        })
    }

    pub fn glyph_data(&self, gid: GlyphId) -> Result<&'a [u8]> {
        if gid.to_usize() >= self.num_glyphs {
            return Ok(&[]);
        }
        let from = self.loca_offset(gid.to_usize())?;
        let to = self.loca_offset(gid.to_usize() + 1)?;
        if to < from {
            return Err(SubsetError::malformed("loca", format!("decreasing offsets at {gid}")));
        }
        self.glyf.get(from..to).ok_or_else(|| SubsetError::TruncatedData {
            offset: from,
            needed: to - from,
            available: self.glyf.len().saturating_sub(from),
        })
    }

    /// Component glyphs referenced directly by a composite glyph.
    pub fn components(&self, gid: GlyphId) -> Result<Vec<GlyphId>> {
        let data = self.glyph_data(gid)?;
        let mut out = Vec::new();
        walk_components(data, |component| {
            out.push(component);
            Ok(component)
        })?;
        Ok(out)
    }

    /// Add every glyph reachable through composite references.
    pub fn close_over_components(&self, glyphs: &mut BTreeSet<GlyphId>) -> Result<()> {
        let mut work: Vec<GlyphId> = glyphs.iter().copied().collect();
        while let Some(gid) = work.pop() {
            for component in self.components(gid)? {
                if component.to_usize() < self.num_glyphs && glyphs.insert(component) {
                    work.push(component);
                }
            }
        }
        Ok(())
    }

    pub fn subset(&self, map: &GlyphMap) -> Result<GlyfSubset> {
        let mut glyphs = Vec::with_capacity(map.num_glyphs() as usize);
        for (_, old) in map.iter() {
            let data = match old {
                Some(old) => self.glyph_data(old)?,
                None => &[],
            };
            let glyph = if data.len() >= 2 && i16::from_be_bytes([data[0], data[1]]) < 0 {
                remap_components(data, map)?
            } else {
                data.to_vec()
            };
            glyphs.push(glyph);
        }

        let total: usize = glyphs.iter().map(|g| g.len().next_multiple_of(2)).sum();
        let long_loca = total > SHORT_LOCA_LIMIT;

        let mut glyf = Writer::with_capacity(total);
        let mut loca = Writer::new();
        let mut write_offset = |offset: usize| {
            if long_loca {
                loca.write_u32(offset as u32);
            } else {
                loca.write_u16((offset / 2) as u16);
            }
        };
        for glyph in &glyphs {
            write_offset(glyf.len());
            glyf.write_bytes(glyph);
            glyf.align(2);
        }
        write_offset(glyf.len());

        Ok(GlyfSubset { glyf: glyf.finish(), loca: loca.finish(), long_loca })
    }
}

/// Visit each component of a composite glyph; `f` returns the glyph ID to
/// write back. Returns the rewritten glyph.
fn walk_components(
    data: &[u8],
    mut f: impl FnMut(GlyphId) -> Result<GlyphId>,
) -> Result<Vec<u8>> {
    let mut r = Reader::new(data);
    if data.is_empty() || r.read_i16()? >= 0 {
        return Ok(data.to_vec());
    }
    r.skip(8)?;

    let mut out = data.to_vec();
    loop {
        let flags = r.read_u16()?;
        let at = r.position();
        let component = f(GlyphId(r.read_u16()?))?;
        out[at..at + 2].copy_from_slice(&component.to_u16().to_be_bytes());

        r.skip(if flags & ARG_1_AND_2_ARE_WORDS != 0 { 4 } else { 2 })?;
        if flags & WE_HAVE_A_SCALE != 0 {
            r.skip(2)?;
        } else if flags & WE_HAVE_AN_X_AND_Y_SCALE != 0 {
            r.skip(4)?;
        } else if flags & WE_HAVE_A_TWO_BY_TWO != 0 {
            r.skip(8)?;
        }

        if flags & MORE_COMPONENTS == 0 {
            break;
        }
    }
    Ok(out)
}

fn remap_components(data: &[u8], map: &GlyphMap) -> Result<Vec<u8>> {
    walk_components(data, |old| {
        map.get(old)
            .ok_or_else(|| SubsetError::malformed("glyf", format!("component {old} was not kept")))
    })
}
