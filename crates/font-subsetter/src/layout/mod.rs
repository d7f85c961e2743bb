//! GSUB/GPOS common structures: ScriptList, FeatureList and LookupList.
//!
//! Both tables share one owned model ([`LayoutTable`]) that is parsed once,
//! narrowed by the feature and script filters, and written back out. Lookup
//! subtables are type-specific and come in through [`LayoutSubtable`].

pub mod classdef;
pub mod coverage;
pub mod gdef;
pub mod gpos;
pub mod gsub;

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};
use read_fonts::types::Tag;

use crate::{
    Result, SubsetError,
    options::TagFilter,
    reader::Reader,
    types::{FeatureIndex, GlyphMap, LookupIndex},
    writer::Writer,
};

pub const GSUB: Tag = Tag::new(b"GSUB");
pub const GPOS: Tag = Tag::new(b"GPOS");
pub const GDEF: Tag = Tag::new(b"GDEF");

const NO_REQUIRED_FEATURE: u16 = 0xFFFF;
const USE_MARK_FILTERING_SET: u16 = 0x0010;

/// A lookup subtable kind of GSUB or GPOS.
pub trait LayoutSubtable: Sized {
    const TABLE: &'static str;
    /// The Extension lookup type of this table.
    const EXTENSION: u16;

    /// Parse the subtable of lookup type `kind` at `offset` in `data`.
    fn parse(kind: u16, data: &[u8], offset: usize) -> Result<Self>;

    /// Restrict to kept glyphs and renumber; `None` when nothing is left.
    fn subset(&self, map: &GlyphMap) -> Option<Self>;

    fn write(&self) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LangSys {
    pub required_feature: Option<FeatureIndex>,
    pub features: Vec<FeatureIndex>,
}

impl LangSys {
    /// Feature indices including the required feature.
    pub fn all_features(&self) -> impl Iterator<Item = FeatureIndex> + '_ {
        self.required_feature.into_iter().chain(self.features.iter().copied())
    }

    fn is_empty(&self) -> bool {
        self.required_feature.is_none() && self.features.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    pub default: Option<LangSys>,
    pub languages: Vec<(Tag, LangSys)>,
}

impl Script {
    pub fn lang_systems(&self) -> impl Iterator<Item = &LangSys> {
        self.default.iter().chain(self.languages.iter().map(|(_, ls)| ls))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRecord {
    pub tag: Tag,
    pub script: Script,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureRecord<'a> {
    pub tag: Tag,
    /// Raw FeatureParams, for the feature tags that define them.
    pub params: Option<&'a [u8]>,
    pub lookups: Vec<LookupIndex>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupHeader {
    pub kind: u16,
    pub flag: u16,
    pub mark_filtering_set: Option<u16>,
    /// Absolute subtable offsets within the table.
    pub subtables: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lookup<T> {
    /// Lookup type after unwrapping extensions.
    pub kind: u16,
    pub flag: u16,
    pub mark_filtering_set: Option<u16>,
    pub subtables: Vec<T>,
}

#[derive(Debug, Clone)]
pub struct LayoutTable<'a> {
    table: &'static str,
    data: &'a [u8],
    pub scripts: Vec<ScriptRecord>,
    pub features: Vec<FeatureRecord<'a>>,
    pub lookups: Vec<LookupHeader>,
}

impl<'a> LayoutTable<'a> {
    pub fn parse(table: &'static str, data: &'a [u8]) -> Result<Self> {
        let mut r = Reader::new(data);
        let major = r.read_u16()?;
        let minor = r.read_u16()?;
        if major != 1 {
            return Err(SubsetError::UnsupportedFeature(format!("{table} version {major}.{minor}")));
        }
        let script_list = r.read_u16()? as usize;
        let feature_list = r.read_u16()? as usize;
        let lookup_list = r.read_u16()? as usize;
        if minor >= 1 && r.read_u32()? != 0 {
            debug!("{table}: dropping FeatureVariations");
        }

        Ok(Self {
            table,
            data,
            scripts: parse_script_list(data, script_list)?,
            features: parse_feature_list(data, feature_list)?,
            lookups: parse_lookup_list(data, lookup_list)?,
        })
    }

    /// Features whose tag passes `features` and that a LangSys of a script
    /// passing `scripts` references.
    pub fn selected_features(
        &self,
        features: &TagFilter,
        scripts: &TagFilter,
    ) -> BTreeSet<FeatureIndex> {
        self.scripts
            .iter()
            .filter(|record| scripts.matches(record.tag))
            .flat_map(|record| record.script.lang_systems())
            .flat_map(LangSys::all_features)
            .filter(|index| {
                self.features.get(index.to_usize()).is_some_and(|f| features.matches(f.tag))
            })
            .collect()
    }

    pub fn lookups_for(&self, features: &BTreeSet<FeatureIndex>) -> BTreeSet<LookupIndex> {
        features
            .iter()
            .filter_map(|index| self.features.get(index.to_usize()))
            .flat_map(|feature| feature.lookups.iter().copied())
            .filter(|index| index.to_usize() < self.lookups.len())
            .collect()
    }

    /// Parse one lookup's subtables, unwrapping Extension subtables.
    pub fn load<T: LayoutSubtable>(&self, index: LookupIndex) -> Result<Lookup<T>> {
        let header = self.lookups.get(index.to_usize()).ok_or_else(|| {
            SubsetError::malformed(self.table, format!("{index} out of range"))
        })?;

        let mut kind = header.kind;
        let mut subtables = Vec::with_capacity(header.subtables.len());
        for &offset in &header.subtables {
            let (sub_kind, sub_offset) = if header.kind == T::EXTENSION {
                let mut r = Reader::at(self.data, offset)?;
                if r.read_u16()? != 1 {
                    return Err(SubsetError::malformed(self.table, "unknown Extension format"));
                }
                let ext_kind = r.read_u16()?;
                (ext_kind, offset + r.read_u32()? as usize)
            } else {
                (header.kind, offset)
            };
            if sub_kind == T::EXTENSION {
                return Err(SubsetError::malformed(self.table, "nested Extension subtable"));
            }
            kind = sub_kind;
            subtables.push(T::parse(sub_kind, self.data, sub_offset)?);
        }
        Ok(Lookup {
            kind,
            flag: header.flag,
            mark_filtering_set: header.mark_filtering_set,
            subtables,
        })
    }

    /// Load `indices`, dropping lookups of types that cannot be subset.
    pub fn load_all<T: LayoutSubtable>(
        &self,
        indices: &BTreeSet<LookupIndex>,
    ) -> Result<BTreeMap<LookupIndex, Lookup<T>>> {
        let mut lookups = BTreeMap::new();
        for &index in indices {
            match self.load::<T>(index) {
                Ok(lookup) => {
                    lookups.insert(index, lookup);
                }
                Err(SubsetError::UnsupportedFeature(reason)) => {
                    warn!("{}: dropping {index}: {reason}", self.table);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(lookups)
    }

    /// True when every lookup referenced by any feature loaded successfully.
    pub fn fully_loaded<T>(&self, loaded: &BTreeMap<LookupIndex, Lookup<T>>) -> bool {
        let all: BTreeSet<FeatureIndex> =
            (0..self.features.len() as u16).map(FeatureIndex).collect();
        self.lookups_for(&all).iter().all(|index| loaded.contains_key(index))
    }
}

/// Subset a parsed table. Returns `None` when no script or feature survives.
///
/// Lookups with no remaining subtables are dropped, then features with no
/// remaining lookups, then LangSys tables with neither features nor a
/// required feature, then scripts with no LangSys left.
pub fn subset_layout<T: LayoutSubtable>(
    layout: &LayoutTable,
    features: &BTreeSet<FeatureIndex>,
    lookups: &BTreeMap<LookupIndex, Lookup<T>>,
    scripts: &TagFilter,
    map: &GlyphMap,
) -> Result<Option<Vec<u8>>> {
    let mut lookup_map = BTreeMap::new();
    let mut new_lookups = Vec::new();
    for (index, lookup) in lookups {
        let subtables: Vec<T> = lookup.subtables.iter().filter_map(|s| s.subset(map)).collect();
        if subtables.is_empty() {
            debug!("{}: {index} is empty after subsetting", T::TABLE);
            continue;
        }
        lookup_map.insert(*index, LookupIndex(new_lookups.len() as u16));
        new_lookups.push(Lookup {
            kind: lookup.kind,
            flag: lookup.flag,
            mark_filtering_set: lookup.mark_filtering_set,
            subtables,
        });
    }

    let mut feature_map = BTreeMap::new();
    let mut new_features = Vec::new();
    for &index in features {
        let Some(record) = layout.features.get(index.to_usize()) else {
            continue;
        };
        let mapped: Vec<LookupIndex> =
            record.lookups.iter().filter_map(|l| lookup_map.get(l).copied()).collect();
        if mapped.is_empty() {
            debug!("{}: dropping feature '{}' with no lookups", T::TABLE, record.tag);
            continue;
        }
        feature_map.insert(index, FeatureIndex(new_features.len() as u16));
        new_features.push(FeatureRecord { tag: record.tag, params: record.params, lookups: mapped });
    }

    let subset_lang_sys = |ls: &LangSys| {
        let subset = LangSys {
            required_feature: ls.required_feature.and_then(|f| feature_map.get(&f).copied()),
            features: ls.features.iter().filter_map(|f| feature_map.get(f).copied()).collect(),
        };
        (!subset.is_empty()).then_some(subset)
    };
    let new_scripts: Vec<ScriptRecord> = layout
        .scripts
        .iter()
        .filter(|record| scripts.matches(record.tag))
        .filter_map(|record| {
            let script = Script {
                default: record.script.default.as_ref().and_then(subset_lang_sys),
                languages: record
                    .script
                    .languages
                    .iter()
                    .filter_map(|(tag, ls)| subset_lang_sys(ls).map(|ls| (*tag, ls)))
                    .collect(),
            };
            if script.default.is_none() && script.languages.is_empty() {
                debug!("{}: dropping script '{}'", T::TABLE, record.tag);
                return None;
            }
            Some(ScriptRecord { tag: record.tag, script })
        })
        .collect();

    if new_scripts.is_empty() || new_features.is_empty() {
        return Ok(None);
    }
    debug!(
        "{}: {} scripts, {} features, {} lookups",
        T::TABLE,
        new_scripts.len(),
        new_features.len(),
        new_lookups.len()
    );
    write_table(&new_scripts, &new_features, &new_lookups).map(Some)
}

/// Serialize a version 1.0 GSUB/GPOS.
pub fn write_table<T: LayoutSubtable>(
    scripts: &[ScriptRecord],
    features: &[FeatureRecord],
    lookups: &[Lookup<T>],
) -> Result<Vec<u8>> {
    let script_list = write_script_list(scripts)?;
    let feature_list = write_feature_list(features)?;
    let lookup_list = write_lookup_list(lookups)?;

    let header_len = 10;
    let feature_offset = header_len + script_list.len();
    let lookup_offset = feature_offset + feature_list.len();

    let mut w = Writer::with_capacity(lookup_offset + lookup_list.len());
    w.write_u16(1);
    w.write_u16(0);
    w.write_u16(offset16(T::TABLE, header_len)?);
    w.write_u16(offset16(T::TABLE, feature_offset)?);
    w.write_u16(offset16(T::TABLE, lookup_offset)?);
    w.write_bytes(&script_list);
    w.write_bytes(&feature_list);
    w.write_bytes(&lookup_list);
    Ok(w.finish())
}

fn offset16(table: &str, offset: usize) -> Result<u16> {
    u16::try_from(offset).map_err(|_| SubsetError::Write(format!("{table} offset {offset} overflows")))
}

/// Append `children` and patch one 16-bit offset slot per child, relative to
/// the start of `w`.
pub(crate) fn append_children(w: &mut Writer, slots: &[usize], children: &[Vec<u8>]) -> Result<()> {
    for (&slot, child) in slots.iter().zip(children) {
        let at = w.len();
        w.patch_offset16(slot, 0, at)?;
        w.write_bytes(child);
    }
    Ok(())
}

fn parse_lang_sys(data: &[u8], offset: usize) -> Result<LangSys> {
    let mut r = Reader::at(data, offset)?;
    r.skip(2)?;
    let required = r.read_u16()?;
    let count = r.read_u16()? as usize;
    Ok(LangSys {
        required_feature: (required != NO_REQUIRED_FEATURE).then_some(FeatureIndex(required)),
        features: r.read_u16_array(count)?.into_iter().map(FeatureIndex).collect(),
    })
}

fn parse_script_list(data: &[u8], offset: usize) -> Result<Vec<ScriptRecord>> {
    if offset == 0 {
        return Ok(Vec::new());
    }
    let mut r = Reader::at(data, offset)?;
    let count = r.read_u16()?;
    let mut scripts = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let tag = r.read_tag()?;
        let script_offset = offset + r.read_u16()? as usize;

        let mut s = Reader::at(data, script_offset)?;
        let default = match s.read_u16()? {
            0 => None,
            off => Some(parse_lang_sys(data, script_offset + off as usize)?),
        };
        let lang_count = s.read_u16()?;
        let mut languages = Vec::with_capacity(lang_count as usize);
        for _ in 0..lang_count {
            let lang = s.read_tag()?;
            let off = s.read_u16()? as usize;
            languages.push((lang, parse_lang_sys(data, script_offset + off)?));
        }
        scripts.push(ScriptRecord { tag, script: Script { default, languages } });
    }
    Ok(scripts)
}

/// Byte length of the FeatureParams for `tag`, if the tag defines any.
fn feature_params_len(tag: Tag, data: &[u8], offset: usize) -> Result<Option<usize>> {
    let raw = tag.to_be_bytes();
    let numbered = |prefix: &[u8], max: u8| {
        raw.starts_with(prefix)
            && raw[2].is_ascii_digit()
            && raw[3].is_ascii_digit()
            && (1..=max).contains(&((raw[2] - b'0') * 10 + raw[3] - b'0'))
    };
    Ok(if &raw == b"size" {
        Some(10)
    } else if numbered(b"ss", 20) {
        Some(4)
    } else if numbered(b"cv", 99) {
        let chars = Reader::at(data, offset + 12)?.read_u16()? as usize;
        Some(14 + 3 * chars)
    } else {
        None
    })
}

fn parse_feature_list(data: &[u8], offset: usize) -> Result<Vec<FeatureRecord<'_>>> {
    if offset == 0 {
        return Ok(Vec::new());
    }
    let mut r = Reader::at(data, offset)?;
    let count = r.read_u16()?;
    let mut features = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let tag = r.read_tag()?;
        let feature_offset = offset + r.read_u16()? as usize;

        let mut f = Reader::at(data, feature_offset)?;
        let params_offset = f.read_u16()? as usize;
        let lookup_count = f.read_u16()? as usize;
        let lookups = f.read_u16_array(lookup_count)?.into_iter().map(LookupIndex).collect();

        let params = if params_offset == 0 {
            None
        } else {
            let at = feature_offset + params_offset;
            match feature_params_len(tag, data, at)? {
                Some(len) => Some(Reader::at(data, at)?.read_bytes(len)?),
                None => {
                    debug!("Dropping FeatureParams of unknown feature '{tag}'");
                    None
                }
            }
        };
        features.push(FeatureRecord { tag, params, lookups });
    }
    Ok(features)
}

fn parse_lookup_list(data: &[u8], offset: usize) -> Result<Vec<LookupHeader>> {
    if offset == 0 {
        return Ok(Vec::new());
    }
    let mut r = Reader::at(data, offset)?;
    let count = r.read_u16()? as usize;
    r.read_u16_array(count)?
        .into_iter()
        .map(|off| {
            let lookup_offset = offset + off as usize;
            let mut l = Reader::at(data, lookup_offset)?;
            let kind = l.read_u16()?;
            let flag = l.read_u16()?;
            let sub_count = l.read_u16()? as usize;
            let subtables =
                l.read_u16_array(sub_count)?.into_iter().map(|o| lookup_offset + o as usize).collect();
            let mark_filtering_set =
                if flag & USE_MARK_FILTERING_SET != 0 { Some(l.read_u16()?) } else { None };
            Ok(LookupHeader { kind, flag, mark_filtering_set, subtables })
        })
        .collect()
}

fn write_lang_sys(lang_sys: &LangSys) -> Vec<u8> {
    let mut w = Writer::new();
    w.write_u16(0);
    w.write_u16(lang_sys.required_feature.map_or(NO_REQUIRED_FEATURE, |f| f.to_u16()));
    w.write_u16(lang_sys.features.len() as u16);
    for f in &lang_sys.features {
        w.write_u16(f.to_u16());
    }
    w.finish()
}

fn write_script(script: &Script) -> Result<Vec<u8>> {
    let mut w = Writer::new();
    let default_slot = w.reserve_u16();
    w.write_u16(script.languages.len() as u16);
    let slots: Vec<usize> = script
        .languages
        .iter()
        .map(|(tag, _)| {
            w.write_tag(*tag);
            w.reserve_u16()
        })
        .collect();
    if let Some(default) = &script.default {
        append_children(&mut w, &[default_slot], &[write_lang_sys(default)])?;
    }
    let children: Vec<Vec<u8>> = script.languages.iter().map(|(_, ls)| write_lang_sys(ls)).collect();
    append_children(&mut w, &slots, &children)?;
    Ok(w.finish())
}

fn write_script_list(scripts: &[ScriptRecord]) -> Result<Vec<u8>> {
    let mut w = Writer::new();
    w.write_u16(scripts.len() as u16);
    let slots: Vec<usize> = scripts
        .iter()
        .map(|record| {
            w.write_tag(record.tag);
            w.reserve_u16()
        })
        .collect();
    let children =
        scripts.iter().map(|record| write_script(&record.script)).collect::<Result<Vec<_>>>()?;
    append_children(&mut w, &slots, &children)?;
    Ok(w.finish())
}

fn write_feature(feature: &FeatureRecord) -> Result<Vec<u8>> {
    let mut w = Writer::new();
    let params_slot = w.reserve_u16();
    w.write_u16(feature.lookups.len() as u16);
    for l in &feature.lookups {
        w.write_u16(l.to_u16());
    }
    if let Some(params) = feature.params {
        append_children(&mut w, &[params_slot], &[params.to_vec()])?;
    }
    Ok(w.finish())
}

fn write_feature_list(features: &[FeatureRecord]) -> Result<Vec<u8>> {
    let mut w = Writer::new();
    w.write_u16(features.len() as u16);
    let slots: Vec<usize> = features
        .iter()
        .map(|record| {
            w.write_tag(record.tag);
            w.reserve_u16()
        })
        .collect();
    let children = features.iter().map(write_feature).collect::<Result<Vec<_>>>()?;
    append_children(&mut w, &slots, &children)?;
    Ok(w.finish())
}

/// Lookup header with placeholder subtable offsets; returns their slots.
fn write_lookup_header(w: &mut Writer, kind: u16, flag: u16, mfs: Option<u16>, n: usize) -> Vec<usize> {
    w.write_u16(kind);
    w.write_u16(flag);
    w.write_u16(n as u16);
    let slots = (0..n).map(|_| w.reserve_u16()).collect();
    if let Some(set) = mfs {
        w.write_u16(set);
    }
    slots
}

/// Write the LookupList, falling back to Extension subtables when plain
/// 16-bit offsets cannot reach every subtable.
fn write_lookup_list<T: LayoutSubtable>(lookups: &[Lookup<T>]) -> Result<Vec<u8>> {
    let encoded = lookups
        .iter()
        .map(|l| l.subtables.iter().map(T::write).collect::<Result<Vec<_>>>())
        .collect::<Result<Vec<_>>>()?;

    match write_lookups_inline(lookups, &encoded) {
        Err(SubsetError::Write(reason)) => {
            debug!("{}: {reason}; promoting to Extension lookups", T::TABLE);
            write_lookups_extended::<T>(lookups, &encoded)
        }
        result => result,
    }
}

fn write_lookups_inline<T>(lookups: &[Lookup<T>], encoded: &[Vec<Vec<u8>>]) -> Result<Vec<u8>> {
    let mut w = Writer::new();
    w.write_u16(lookups.len() as u16);
    let slots: Vec<usize> = lookups.iter().map(|_| w.reserve_u16()).collect();
    for ((lookup, subtables), slot) in lookups.iter().zip(encoded).zip(slots) {
        let start = w.len();
        w.patch_offset16(slot, 0, start)?;
        let sub_slots = write_lookup_header(
            &mut w,
            lookup.kind,
            lookup.flag,
            lookup.mark_filtering_set,
            subtables.len(),
        );
        for (sub_slot, data) in sub_slots.into_iter().zip(subtables) {
            let at = w.len();
            w.patch_offset16(sub_slot, start, at)?;
            w.write_bytes(data);
        }
    }
    Ok(w.finish())
}

fn write_lookups_extended<T: LayoutSubtable>(
    lookups: &[Lookup<T>],
    encoded: &[Vec<Vec<u8>>],
) -> Result<Vec<u8>> {
    let mut w = Writer::new();
    w.write_u16(lookups.len() as u16);
    let slots: Vec<usize> = lookups.iter().map(|_| w.reserve_u16()).collect();

    let mut pending = Vec::new();
    for ((lookup, subtables), slot) in lookups.iter().zip(encoded).zip(slots) {
        let start = w.len();
        w.patch_offset16(slot, 0, start)?;
        let sub_slots = write_lookup_header(
            &mut w,
            T::EXTENSION,
            lookup.flag,
            lookup.mark_filtering_set,
            subtables.len(),
        );
        for (sub_slot, data) in sub_slots.into_iter().zip(subtables) {
            let at = w.len();
            w.patch_offset16(sub_slot, start, at)?;
            w.write_u16(1);
            w.write_u16(lookup.kind);
            pending.push((at, w.reserve_u32(), data));
        }
    }
    for (ext_start, ext_slot, data) in pending {
        let target = w.len();
        let offset = u32::try_from(target - ext_start)
            .map_err(|_| SubsetError::Write(format!("{} exceeds 32-bit offsets", T::TABLE)))?;
        w.patch_u32(ext_slot, offset);
        w.write_bytes(data);
    }
    Ok(w.finish())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::{layout::gsub::SubstSubtable, types::GlyphId};

    fn tag(s: &str) -> Tag {
        Tag::new_checked(s.as_bytes()).unwrap()
    }

    fn lang_sys(features: &[u16]) -> LangSys {
        LangSys { required_feature: None, features: features.iter().copied().map(FeatureIndex).collect() }
    }

    fn single(pairs: &[(u16, u16)]) -> SubstSubtable {
        SubstSubtable::Single(pairs.iter().map(|&(a, b)| (GlyphId(a), GlyphId(b))).collect())
    }

    /// latn (default: liga, smcp; TRK: smcp) and cyrl (default: smcp).
    fn sample_gsub() -> Vec<u8> {
        let scripts = vec![
            ScriptRecord {
                tag: tag("cyrl"),
                script: Script { default: Some(lang_sys(&[1])), languages: vec![] },
            },
            ScriptRecord {
                tag: tag("latn"),
                script: Script {
                    default: Some(lang_sys(&[0, 1])),
                    languages: vec![(tag("TRK "), lang_sys(&[1]))],
                },
            },
        ];
        let features = vec![
            FeatureRecord { tag: tag("liga"), params: None, lookups: vec![LookupIndex(0)] },
            FeatureRecord { tag: tag("smcp"), params: None, lookups: vec![LookupIndex(1)] },
        ];
        let lookups = vec![
            Lookup { kind: 1, flag: 0, mark_filtering_set: None, subtables: vec![single(&[(1, 5)])] },
            Lookup { kind: 1, flag: 0, mark_filtering_set: None, subtables: vec![single(&[(2, 6)])] },
        ];
        write_table(&scripts, &features, &lookups).unwrap()
    }

    fn identity(n: u16) -> GlyphMap {
        GlyphMap::compact(&(0..n).map(GlyphId).collect(), n)
    }

    #[test]
    fn test_parse_written_table() {
        let data = sample_gsub();
        let table = LayoutTable::parse("GSUB", &data).unwrap();
        assert_eq!(table.scripts.len(), 2);
        assert_eq!(table.features[1].tag, tag("smcp"));
        assert_eq!(table.lookups.len(), 2);
        let lookup: Lookup<SubstSubtable> = table.load(LookupIndex(1)).unwrap();
        assert_eq!(lookup.subtables, vec![single(&[(2, 6)])]);
    }

    #[test]
    fn test_feature_selection_respects_scripts() {
        let data = sample_gsub();
        let table = LayoutTable::parse("GSUB", &data).unwrap();
        let liga = TagFilter::parse(["liga"]).unwrap();
        let cyrl = TagFilter::parse(["cyrl"]).unwrap();
        assert!(table.selected_features(&liga, &cyrl).is_empty());
        assert_eq!(
            table.selected_features(&liga, &TagFilter::All),
            BTreeSet::from([FeatureIndex(0)])
        );
    }

    #[test]
    fn test_empty_lang_sys_and_script_are_dropped() {
        let data = sample_gsub();
        let table = LayoutTable::parse("GSUB", &data).unwrap();
        let features = table.selected_features(&TagFilter::All, &TagFilter::All);
        let lookups = table.load_all(&table.lookups_for(&features)).unwrap();

        // Glyph 2 is gone, so smcp loses its only lookup.
        let kept: BTreeSet<GlyphId> = [0, 1, 5, 6].into_iter().map(GlyphId).collect();
        let map = GlyphMap::compact(&kept, 8);
        let out = subset_layout::<SubstSubtable>(&table, &features, &lookups, &TagFilter::All, &map)
            .unwrap()
            .unwrap();

        let subset = LayoutTable::parse("GSUB", &out).unwrap();
        assert_eq!(subset.features.len(), 1);
        assert_eq!(subset.scripts.len(), 1);
        assert_eq!(subset.scripts[0].tag, tag("latn"));
        assert_eq!(subset.scripts[0].script.default, Some(lang_sys(&[0])));
        assert!(subset.scripts[0].script.languages.is_empty());
        let lookup: Lookup<SubstSubtable> = subset.load(LookupIndex(0)).unwrap();
        assert_eq!(lookup.subtables, vec![single(&[(1, 2)])]);
    }

    #[test]
    fn test_required_feature_keeps_lang_sys() {
        let scripts = vec![ScriptRecord {
            tag: tag("latn"),
            script: Script {
                default: Some(LangSys { required_feature: Some(FeatureIndex(0)), features: vec![] }),
                languages: vec![],
            },
        }];
        let features =
            vec![FeatureRecord { tag: tag("rlig"), params: None, lookups: vec![LookupIndex(0)] }];
        let lookups =
            vec![Lookup { kind: 1, flag: 0, mark_filtering_set: None, subtables: vec![single(&[(1, 2)])] }];
        let data = write_table(&scripts, &features, &lookups).unwrap();

        let table = LayoutTable::parse("GSUB", &data).unwrap();
        let selected = table.selected_features(&TagFilter::All, &TagFilter::All);
        let loaded = table.load_all(&table.lookups_for(&selected)).unwrap();
        let out = subset_layout::<SubstSubtable>(&table, &selected, &loaded, &TagFilter::All, &identity(4))
            .unwrap()
            .unwrap();
        let subset = LayoutTable::parse("GSUB", &out).unwrap();
        let default = subset.scripts[0].script.default.as_ref().unwrap();
        assert_eq!(default.required_feature, Some(FeatureIndex(0)));
    }

    #[test]
    fn test_nothing_left_yields_none() {
        let data = sample_gsub();
        let table = LayoutTable::parse("GSUB", &data).unwrap();
        let features = table.selected_features(&TagFilter::All, &TagFilter::All);
        let lookups = table.load_all(&table.lookups_for(&features)).unwrap();
        let map = GlyphMap::compact(&BTreeSet::from([GlyphId(0)]), 8);
        let out =
            subset_layout::<SubstSubtable>(&table, &features, &lookups, &TagFilter::All, &map).unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn test_extension_promotion_round_trips() {
        let lookups = vec![Lookup {
            kind: 1,
            flag: 0,
            mark_filtering_set: None,
            subtables: vec![single(&[(3, 4)])],
        }];
        let encoded = vec![vec![single(&[(3, 4)]).write().unwrap()]];
        let list = write_lookups_extended(&lookups, &encoded).unwrap();

        let mut data = Writer::new();
        data.write_u16(1);
        data.write_u16(0);
        data.write_u16(0);
        data.write_u16(0);
        data.write_u16(10);
        data.write_bytes(&list);
        let data = data.finish();

        let table = LayoutTable::parse("GSUB", &data).unwrap();
        assert_eq!(table.lookups[0].kind, 7);
        let lookup: Lookup<SubstSubtable> = table.load(LookupIndex(0)).unwrap();
        assert_eq!(lookup.kind, 1);
        assert_eq!(lookup.subtables, vec![single(&[(3, 4)])]);
    }

    #[test]
    fn test_feature_params_lengths() {
        let cv = [0u8, 0, 0, 1, 0, 2, 0, 3, 0, 0, 0, 0, 0, 2];
        assert_eq!(feature_params_len(tag("size"), &[], 0).unwrap(), Some(10));
        assert_eq!(feature_params_len(tag("ss03"), &[], 0).unwrap(), Some(4));
        assert_eq!(feature_params_len(tag("cv01"), &cv, 0).unwrap(), Some(20));
        assert_eq!(feature_params_len(tag("liga"), &[], 0).unwrap(), None);
    }
}
