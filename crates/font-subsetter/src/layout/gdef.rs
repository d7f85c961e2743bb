//! GDEF: glyph classes, mark attachment classes and mark glyph sets.
//!
//! AttachList, LigCaretList and the ItemVariationStore are not carried.

use log::debug;

use crate::{
    Result, SubsetError,
    layout::{
        append_children,
        classdef::{ClassDef, decode_class_def, encode_class_def, subset_class_def},
        coverage::{decode_coverage, encode_coverage},
    },
    reader::Reader,
    types::{GlyphId, GlyphMap},
    writer::Writer,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Gdef {
    pub glyph_classes: Option<ClassDef>,
    pub mark_attach_classes: Option<ClassDef>,
    /// Every set is kept, even when empty, so lookup flags keep their
    /// indices.
    pub mark_glyph_sets: Option<Vec<Vec<GlyphId>>>,
}

impl Gdef {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut r = Reader::new(data);
        let major = r.read_u16()?;
        let minor = r.read_u16()?;
        if major != 1 {
            return Err(SubsetError::UnsupportedFeature(format!("GDEF version {major}.{minor}")));
        }
        let glyph_class_def = r.read_u16()? as usize;
        let attach_list = r.read_u16()?;
        let lig_caret_list = r.read_u16()?;
        let mark_attach_class_def = r.read_u16()? as usize;
        let mark_glyph_sets_def = if minor >= 2 { r.read_u16()? as usize } else { 0 };
        if attach_list != 0 || lig_caret_list != 0 {
            debug!("GDEF: dropping AttachList and LigCaretList");
        }

        let class_def = |offset: usize| match offset {
            0 => Ok(None),
            offset => decode_class_def(data, offset).map(Some),
        };
        let mark_glyph_sets = match mark_glyph_sets_def {
            0 => None,
            offset => {
                let mut m = Reader::at(data, offset)?;
                if m.read_u16()? != 1 {
                    return Err(SubsetError::malformed("GDEF", "unknown MarkGlyphSets format"));
                }
                let count = m.read_u16()?;
                let sets = (0..count)
                    .map(|_| decode_coverage(data, offset + m.read_u32()? as usize))
                    .collect::<Result<Vec<_>>>()?;
                Some(sets)
            }
        };

        Ok(Self {
            glyph_classes: class_def(glyph_class_def)?,
            mark_attach_classes: class_def(mark_attach_class_def)?,
            mark_glyph_sets,
        })
    }

    pub fn subset(&self, map: &GlyphMap) -> Self {
        let class_def = |def: &Option<ClassDef>| {
            def.as_ref().map(|d| subset_class_def(d, map)).filter(|d| !d.is_empty())
        };
        Self {
            glyph_classes: class_def(&self.glyph_classes),
            mark_attach_classes: class_def(&self.mark_attach_classes),
            mark_glyph_sets: self.mark_glyph_sets.as_ref().map(|sets| {
                sets.iter().map(|set| set.iter().filter_map(|g| map.get(*g)).collect()).collect()
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.glyph_classes.is_none()
            && self.mark_attach_classes.is_none()
            && self.mark_glyph_sets.is_none()
    }

    /// Version 1.2 when mark glyph sets are present, 1.0 otherwise.
    pub fn write(&self) -> Result<Vec<u8>> {
        let mut w = Writer::new();
        w.write_u16(1);
        w.write_u16(if self.mark_glyph_sets.is_some() { 2 } else { 0 });
        let glyph_class_slot = w.reserve_u16();
        w.write_u16(0);
        w.write_u16(0);
        let mark_attach_slot = w.reserve_u16();
        let mark_sets_slot = self.mark_glyph_sets.as_ref().map(|_| w.reserve_u16());

        if let Some(def) = &self.glyph_classes {
            append_children(&mut w, &[glyph_class_slot], &[encode_class_def(def)])?;
        }
        if let Some(def) = &self.mark_attach_classes {
            append_children(&mut w, &[mark_attach_slot], &[encode_class_def(def)])?;
        }
        if let (Some(sets), Some(slot)) = (&self.mark_glyph_sets, mark_sets_slot) {
            append_children(&mut w, &[slot], &[write_mark_glyph_sets(sets)])?;
        }
        Ok(w.finish())
    }
}

fn write_mark_glyph_sets(sets: &[Vec<GlyphId>]) -> Vec<u8> {
    let mut w = Writer::new();
    w.write_u16(1);
    w.write_u16(sets.len() as u16);
    let slots: Vec<usize> = sets.iter().map(|_| w.reserve_u32()).collect();
    for (slot, set) in slots.into_iter().zip(sets) {
        let at = w.len();
        w.patch_u32(slot, at as u32);
        w.write_bytes(&encode_coverage(set));
    }
    w.finish()
}

/// Subset a GDEF table; `None` when nothing is left.
pub fn subset_gdef(data: &[u8], map: &GlyphMap) -> Result<Option<Vec<u8>>> {
    let gdef = Gdef::parse(data)?.subset(map);
    if gdef.is_empty() {
        return Ok(None);
    }
    gdef.write().map(Some)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn gids(ids: &[u16]) -> Vec<GlyphId> {
        ids.iter().copied().map(GlyphId).collect()
    }

    fn sample() -> Gdef {
        Gdef {
            glyph_classes: Some(ClassDef::from([(GlyphId(1), 1), (GlyphId(4), 3), (GlyphId(5), 3)])),
            mark_attach_classes: None,
            mark_glyph_sets: Some(vec![gids(&[4]), gids(&[5, 6])]),
        }
    }

    #[test]
    fn test_write_parse() {
        let bytes = sample().write().unwrap();
        assert_eq!(&bytes[..4], &[0, 1, 0, 2]);
        assert_eq!(Gdef::parse(&bytes).unwrap(), sample());
    }

    #[test]
    fn test_subset_keeps_empty_mark_sets() {
        let kept: BTreeSet<GlyphId> = gids(&[0, 1, 5]).into_iter().collect();
        let map = GlyphMap::compact(&kept, 8);
        let subset = sample().subset(&map);
        assert_eq!(
            subset.glyph_classes,
            Some(ClassDef::from([(GlyphId(1), 1), (GlyphId(2), 3)]))
        );
        assert_eq!(subset.mark_glyph_sets, Some(vec![vec![], gids(&[2])]));
    }

    #[test]
    fn test_nothing_left_drops_table() {
        let gdef = Gdef {
            glyph_classes: Some(ClassDef::from([(GlyphId(3), 1)])),
            ..Gdef::default()
        };
        let data = gdef.write().unwrap();
        let map = GlyphMap::compact(&BTreeSet::from([GlyphId(0)]), 4);
        assert_eq!(subset_gdef(&data, &map).unwrap(), None);
    }

    #[test]
    fn test_version_10_without_mark_sets() {
        let gdef = Gdef {
            glyph_classes: Some(ClassDef::from([(GlyphId(3), 1)])),
            ..Gdef::default()
        };
        let bytes = gdef.write().unwrap();
        assert_eq!(&bytes[..4], &[0, 1, 0, 0]);
        assert_eq!(bytes.len(), 12 + 8);
    }
}
