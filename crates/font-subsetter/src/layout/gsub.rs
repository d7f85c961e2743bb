//! GSUB lookup types 1-4 and the substitution closure.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::{
    Result, SubsetError,
    layout::{
        LayoutSubtable, Lookup, append_children,
        coverage::{decode_coverage, encode_coverage},
    },
    reader::Reader,
    types::{GlyphId, GlyphMap, LookupIndex},
    writer::Writer,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ligature {
    pub glyph: GlyphId,
    /// Components after the first (covered) glyph.
    pub components: Vec<GlyphId>,
}

/// A substitution subtable with glyphs in coverage order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubstSubtable {
    Single(Vec<(GlyphId, GlyphId)>),
    Multiple(Vec<(GlyphId, Vec<GlyphId>)>),
    Alternate(Vec<(GlyphId, Vec<GlyphId>)>),
    Ligature(Vec<(GlyphId, Vec<Ligature>)>),
}

impl SubstSubtable {
    /// Add every glyph this subtable can produce from `glyphs` to `out`.
    pub fn closure(&self, glyphs: &BTreeSet<GlyphId>, out: &mut BTreeSet<GlyphId>) {
        match self {
            Self::Single(pairs) => {
                out.extend(pairs.iter().filter(|(g, _)| glyphs.contains(g)).map(|(_, s)| *s));
            }
            Self::Multiple(entries) | Self::Alternate(entries) => {
                for (g, outputs) in entries {
                    if glyphs.contains(g) {
                        out.extend(outputs.iter().copied());
                    }
                }
            }
            Self::Ligature(sets) => {
                for (first, ligatures) in sets {
                    if !glyphs.contains(first) {
                        continue;
                    }
                    for lig in ligatures {
                        if lig.components.iter().all(|c| glyphs.contains(c)) {
                            out.insert(lig.glyph);
                        }
                    }
                }
            }
        }
    }
}

/// Grow `glyphs` until no lookup in `lookups` produces anything new.
pub fn closure(lookups: &BTreeMap<LookupIndex, Lookup<SubstSubtable>>, glyphs: &mut BTreeSet<GlyphId>) {
    let mut rounds = 0;
    loop {
        let mut added = BTreeSet::new();
        for subtable in lookups.values().flat_map(|l| &l.subtables) {
            subtable.closure(glyphs, &mut added);
        }
        let before = glyphs.len();
        glyphs.extend(added);
        rounds += 1;
        if glyphs.len() == before {
            break;
        }
    }
    debug!("GSUB closure settled after {rounds} rounds at {} glyphs", glyphs.len());
}

fn read_glyph_list(data: &[u8], offset: usize) -> Result<Vec<GlyphId>> {
    let mut r = Reader::at(data, offset)?;
    let count = r.read_u16()? as usize;
    Ok(r.read_u16_array(count)?.into_iter().map(GlyphId).collect())
}

fn check_count(count: usize, coverage: &[GlyphId]) -> Result<()> {
    if count != coverage.len() {
        return Err(SubsetError::malformed(
            "GSUB",
            format!("{count} records for {} covered glyphs", coverage.len()),
        ));
    }
    Ok(())
}

fn parse_ligature_set(data: &[u8], offset: usize) -> Result<Vec<Ligature>> {
    let mut r = Reader::at(data, offset)?;
    let count = r.read_u16()? as usize;
    r.read_u16_array(count)?
        .into_iter()
        .map(|off| {
            let mut l = Reader::at(data, offset + off as usize)?;
            let glyph = GlyphId(l.read_u16()?);
            let comp_count = l.read_u16()? as usize;
            if comp_count == 0 {
                return Err(SubsetError::malformed("GSUB", "ligature with no components"));
            }
            let components = l.read_u16_array(comp_count - 1)?.into_iter().map(GlyphId).collect();
            Ok(Ligature { glyph, components })
        })
        .collect()
}

fn write_glyph_list(glyphs: &[GlyphId]) -> Vec<u8> {
    let mut w = Writer::new();
    w.write_u16(glyphs.len() as u16);
    for g in glyphs {
        w.write_u16(g.to_u16());
    }
    w.finish()
}

fn write_ligature_set(ligatures: &[Ligature]) -> Result<Vec<u8>> {
    let mut w = Writer::new();
    w.write_u16(ligatures.len() as u16);
    let slots: Vec<usize> = ligatures.iter().map(|_| w.reserve_u16()).collect();
    let children: Vec<Vec<u8>> = ligatures
        .iter()
        .map(|lig| {
            let mut l = Writer::new();
            l.write_u16(lig.glyph.to_u16());
            l.write_u16(lig.components.len() as u16 + 1);
            for c in &lig.components {
                l.write_u16(c.to_u16());
            }
            l.finish()
        })
        .collect();
    append_children(&mut w, &slots, &children)?;
    Ok(w.finish())
}

/// Format 1 subtable: coverage plus one offset per covered glyph.
fn write_with_children(covered: &[GlyphId], children: &[Vec<u8>]) -> Result<Vec<u8>> {
    let mut w = Writer::new();
    w.write_u16(1);
    let coverage_slot = w.reserve_u16();
    w.write_u16(children.len() as u16);
    let slots: Vec<usize> = children.iter().map(|_| w.reserve_u16()).collect();
    append_children(&mut w, &slots, children)?;
    append_children(&mut w, &[coverage_slot], &[encode_coverage(covered)])?;
    Ok(w.finish())
}

fn remap_all(glyphs: &[GlyphId], map: &GlyphMap) -> Option<Vec<GlyphId>> {
    glyphs.iter().map(|g| map.get(*g)).collect()
}

fn non_empty<T>(mut entries: Vec<(GlyphId, T)>) -> Option<Vec<(GlyphId, T)>> {
    entries.sort_by_key(|(g, _)| *g);
    (!entries.is_empty()).then_some(entries)
}

impl LayoutSubtable for SubstSubtable {
    const TABLE: &'static str = "GSUB";
    const EXTENSION: u16 = 7;

    fn parse(kind: u16, data: &[u8], offset: usize) -> Result<Self> {
        if !(1..=4).contains(&kind) {
            return Err(SubsetError::UnsupportedFeature(format!("GSUB lookup type {kind}")));
        }
        let mut r = Reader::at(data, offset)?;
        let format = r.read_u16()?;
        let coverage = decode_coverage(data, offset + r.read_u16()? as usize)?;

        Ok(match (kind, format) {
            (1, 1) => {
                let delta = r.read_i16()? as u16;
                Self::Single(coverage.iter().map(|g| (*g, GlyphId(g.to_u16().wrapping_add(delta)))).collect())
            }
            (1, 2) => {
                let count = r.read_u16()? as usize;
                check_count(count, &coverage)?;
                let substitutes = r.read_u16_array(count)?;
                Self::Single(coverage.into_iter().zip(substitutes.into_iter().map(GlyphId)).collect())
            }
            (2 | 3, 1) => {
                let count = r.read_u16()? as usize;
                check_count(count, &coverage)?;
                let lists = r
                    .read_u16_array(count)?
                    .into_iter()
                    .map(|off| read_glyph_list(data, offset + off as usize))
                    .collect::<Result<Vec<_>>>()?;
                let entries = coverage.into_iter().zip(lists).collect();
                if kind == 2 { Self::Multiple(entries) } else { Self::Alternate(entries) }
            }
            (4, 1) => {
                let count = r.read_u16()? as usize;
                check_count(count, &coverage)?;
                let sets = r
                    .read_u16_array(count)?
                    .into_iter()
                    .map(|off| parse_ligature_set(data, offset + off as usize))
                    .collect::<Result<Vec<_>>>()?;
                Self::Ligature(coverage.into_iter().zip(sets).collect())
            }
            _ => {
                return Err(SubsetError::malformed(
                    "GSUB",
                    format!("lookup type {kind} has no format {format}"),
                ));
            }
        })
    }

    fn subset(&self, map: &GlyphMap) -> Option<Self> {
        match self {
            Self::Single(pairs) => non_empty(
                pairs.iter().filter_map(|(g, s)| Some((map.get(*g)?, map.get(*s)?))).collect(),
            )
            .map(Self::Single),
            Self::Multiple(entries) => non_empty(
                entries
                    .iter()
                    .filter_map(|(g, seq)| Some((map.get(*g)?, remap_all(seq, map)?)))
                    .collect(),
            )
            .map(Self::Multiple),
            Self::Alternate(entries) => non_empty(
                entries
                    .iter()
                    .filter_map(|(g, alternates)| {
                        let kept: Vec<GlyphId> = alternates.iter().filter_map(|a| map.get(*a)).collect();
                        (!kept.is_empty()).then_some((map.get(*g)?, kept))
                    })
                    .collect(),
            )
            .map(Self::Alternate),
            Self::Ligature(sets) => non_empty(
                sets.iter()
                    .filter_map(|(first, ligatures)| {
                        let first = map.get(*first)?;
                        let kept: Vec<Ligature> = ligatures
                            .iter()
                            .filter_map(|lig| {
                                Some(Ligature {
                                    glyph: map.get(lig.glyph)?,
                                    components: remap_all(&lig.components, map)?,
                                })
                            })
                            .collect();
                        (!kept.is_empty()).then_some((first, kept))
                    })
                    .collect(),
            )
            .map(Self::Ligature),
        }
    }

    fn write(&self) -> Result<Vec<u8>> {
        match self {
            Self::Single(pairs) => {
                let covered: Vec<GlyphId> = pairs.iter().map(|(g, _)| *g).collect();
                let delta = |(g, s): &(GlyphId, GlyphId)| s.to_u16().wrapping_sub(g.to_u16());
                let first_delta = pairs.first().map(delta);

                let mut w = Writer::new();
                let coverage_slot;
                match first_delta {
                    Some(d) if pairs.iter().all(|p| delta(p) == d) => {
                        w.write_u16(1);
                        coverage_slot = w.reserve_u16();
                        w.write_u16(d);
                    }
                    _ => {
                        w.write_u16(2);
                        coverage_slot = w.reserve_u16();
                        w.write_u16(pairs.len() as u16);
                        for (_, s) in pairs {
                            w.write_u16(s.to_u16());
                        }
                    }
                }
                append_children(&mut w, &[coverage_slot], &[encode_coverage(&covered)])?;
                Ok(w.finish())
            }
            Self::Multiple(entries) | Self::Alternate(entries) => {
                let covered: Vec<GlyphId> = entries.iter().map(|(g, _)| *g).collect();
                let children: Vec<Vec<u8>> = entries.iter().map(|(_, list)| write_glyph_list(list)).collect();
                write_with_children(&covered, &children)
            }
            Self::Ligature(sets) => {
                let covered: Vec<GlyphId> = sets.iter().map(|(g, _)| *g).collect();
                let children =
                    sets.iter().map(|(_, ligs)| write_ligature_set(ligs)).collect::<Result<Vec<_>>>()?;
                write_with_children(&covered, &children)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn g(id: u16) -> GlyphId {
        GlyphId(id)
    }

    fn set(ids: &[u16]) -> BTreeSet<GlyphId> {
        ids.iter().copied().map(GlyphId).collect()
    }

    fn ligatures() -> SubstSubtable {
        // f f -> ff (10), f i -> fi (11), f f i -> ffi (12)
        SubstSubtable::Ligature(vec![(
            g(1),
            vec![
                Ligature { glyph: g(12), components: vec![g(1), g(2)] },
                Ligature { glyph: g(10), components: vec![g(1)] },
                Ligature { glyph: g(11), components: vec![g(2)] },
            ],
        )])
    }

    #[test]
    fn test_single_format1_from_constant_delta() {
        let table = SubstSubtable::Single(vec![(g(3), g(13)), (g(4), g(14))]);
        let bytes = table.write().unwrap();
        assert_eq!(&bytes[..2], &[0, 1]);
        assert_eq!(SubstSubtable::parse(1, &bytes, 0).unwrap(), table);
    }

    #[test]
    fn test_single_format2_otherwise() {
        let table = SubstSubtable::Single(vec![(g(3), g(13)), (g(4), g(40))]);
        let bytes = table.write().unwrap();
        assert_eq!(&bytes[..2], &[0, 2]);
        assert_eq!(SubstSubtable::parse(1, &bytes, 0).unwrap(), table);
    }

    #[test]
    fn test_ligature_parse_write() {
        let bytes = ligatures().write().unwrap();
        assert_eq!(SubstSubtable::parse(4, &bytes, 0).unwrap(), ligatures());
    }

    #[test]
    fn test_ligature_closure_needs_all_components() {
        let mut out = BTreeSet::new();
        ligatures().closure(&set(&[1]), &mut out);
        assert_eq!(out, set(&[10]));

        let mut out = BTreeSet::new();
        ligatures().closure(&set(&[1, 2]), &mut out);
        assert_eq!(out, set(&[10, 11, 12]));

        let mut out = BTreeSet::new();
        ligatures().closure(&set(&[2]), &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_closure_reaches_fixpoint() {
        let chain = Lookup {
            kind: 1,
            flag: 0,
            mark_filtering_set: None,
            subtables: vec![SubstSubtable::Single(vec![(g(1), g(2)), (g(2), g(3)), (g(7), g(8))])],
        };
        let lookups = BTreeMap::from([(LookupIndex(0), chain)]);
        let mut glyphs = set(&[0, 1]);
        closure(&lookups, &mut glyphs);
        assert_eq!(glyphs, set(&[0, 1, 2, 3]));
    }

    #[test]
    fn test_subset_ligature_drops_unreachable() {
        let map = GlyphMap::compact(&set(&[0, 1, 10]), 20);
        let subset = ligatures().subset(&map).unwrap();
        assert_eq!(
            subset,
            SubstSubtable::Ligature(vec![(g(1), vec![Ligature { glyph: g(2), components: vec![g(1)] }])])
        );
    }

    #[test]
    fn test_subset_alternates_filtered() {
        let table = SubstSubtable::Alternate(vec![(g(1), vec![g(5), g(6)]), (g(2), vec![g(7)])]);
        let map = GlyphMap::compact(&set(&[0, 1, 2, 6]), 10);
        assert_eq!(table.subset(&map), Some(SubstSubtable::Alternate(vec![(g(1), vec![g(3)])])));
    }

    #[test]
    fn test_multiple_requires_whole_sequence() {
        let table = SubstSubtable::Multiple(vec![(g(1), vec![g(4), g(5)])]);
        let map = GlyphMap::compact(&set(&[0, 1, 4]), 10);
        assert_eq!(table.subset(&map), None);
    }

    #[test]
    fn test_unsupported_type() {
        let err = SubstSubtable::parse(6, &[0, 1], 0).unwrap_err();
        assert!(matches!(err, SubsetError::UnsupportedFeature(_)));
    }
}
