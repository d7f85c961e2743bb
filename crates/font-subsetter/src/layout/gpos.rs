//! GPOS single and pair adjustment (lookup types 1 and 2).
//!
//! Device and VariationIndex offsets are not carried: the value formats are
//! narrowed to their placement and advance fields.

use log::debug;

use crate::{
    Result, SubsetError,
    layout::{
        LayoutSubtable, append_children,
        classdef::{ClassDef, decode_class_def, encode_class_def, subset_class_def},
        coverage::{decode_coverage, encode_coverage, retain},
    },
    reader::Reader,
    types::{GlyphId, GlyphMap},
    writer::Writer,
};

const DEVICE_FIELDS: u16 = 0x00F0;
const VALUE_FIELDS: u16 = 0x000F;

/// The placement and advance fields present in a value format, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueRecord(pub Vec<i16>);

impl ValueRecord {
    fn read(r: &mut Reader, format: u16) -> Result<Self> {
        let mut fields = Vec::new();
        for bit in 0..8 {
            if format & (1 << bit) != 0 {
                let v = r.read_i16()?;
                if bit < 4 {
                    fields.push(v);
                }
            }
        }
        Ok(Self(fields))
    }

    fn write(&self, w: &mut Writer) {
        for v in &self.0 {
            w.write_i16(*v);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairValue {
    pub second: GlyphId,
    pub first_value: ValueRecord,
    pub second_value: ValueRecord,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PosSubtable {
    Single {
        format: u16,
        values: Vec<(GlyphId, ValueRecord)>,
    },
    Pair {
        format1: u16,
        format2: u16,
        sets: Vec<(GlyphId, Vec<PairValue>)>,
    },
    PairClass {
        format1: u16,
        format2: u16,
        coverage: Vec<GlyphId>,
        class1: ClassDef,
        class2: ClassDef,
        class2_count: u16,
        /// `class1_count` rows of `class2_count` value pairs.
        records: Vec<Vec<(ValueRecord, ValueRecord)>>,
    },
}

fn narrow(format: u16) -> u16 {
    if format & DEVICE_FIELDS != 0 {
        debug!("GPOS: dropping device adjustments from value format {format:#06x}");
    }
    format & VALUE_FIELDS
}

fn parse_pair_set(data: &[u8], offset: usize, format1: u16, format2: u16) -> Result<Vec<PairValue>> {
    let mut r = Reader::at(data, offset)?;
    let count = r.read_u16()?;
    (0..count)
        .map(|_| {
            Ok(PairValue {
                second: GlyphId(r.read_u16()?),
                first_value: ValueRecord::read(&mut r, format1)?,
                second_value: ValueRecord::read(&mut r, format2)?,
            })
        })
        .collect()
}

fn write_pair_set(pairs: &[PairValue]) -> Vec<u8> {
    let mut w = Writer::new();
    w.write_u16(pairs.len() as u16);
    for pair in pairs {
        w.write_u16(pair.second.to_u16());
        pair.first_value.write(&mut w);
        pair.second_value.write(&mut w);
    }
    w.finish()
}

impl LayoutSubtable for PosSubtable {
    const TABLE: &'static str = "GPOS";
    const EXTENSION: u16 = 9;

    fn parse(kind: u16, data: &[u8], offset: usize) -> Result<Self> {
        if !(1..=2).contains(&kind) {
            return Err(SubsetError::UnsupportedFeature(format!("GPOS lookup type {kind}")));
        }
        let mut r = Reader::at(data, offset)?;
        let format = r.read_u16()?;
        let coverage = decode_coverage(data, offset + r.read_u16()? as usize)?;

        match (kind, format) {
            (1, 1) => {
                let value_format = r.read_u16()?;
                let value = ValueRecord::read(&mut r, value_format)?;
                Ok(Self::Single {
                    format: narrow(value_format),
                    values: coverage.into_iter().map(|g| (g, value.clone())).collect(),
                })
            }
            (1, 2) => {
                let value_format = r.read_u16()?;
                let count = r.read_u16()? as usize;
                if count != coverage.len() {
                    return Err(SubsetError::malformed("GPOS", "value count differs from coverage"));
                }
                let values = (0..count)
                    .map(|_| ValueRecord::read(&mut r, value_format))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Self::Single {
                    format: narrow(value_format),
                    values: coverage.into_iter().zip(values).collect(),
                })
            }
            (2, 1) => {
                let format1 = r.read_u16()?;
                let format2 = r.read_u16()?;
                let count = r.read_u16()? as usize;
                if count != coverage.len() {
                    return Err(SubsetError::malformed("GPOS", "PairSet count differs from coverage"));
                }
                let sets = r
                    .read_u16_array(count)?
                    .into_iter()
                    .map(|off| parse_pair_set(data, offset + off as usize, format1, format2))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Self::Pair {
                    format1: narrow(format1),
                    format2: narrow(format2),
                    sets: coverage.into_iter().zip(sets).collect(),
                })
            }
            (2, 2) => {
                let format1 = r.read_u16()?;
                let format2 = r.read_u16()?;
                let class1 = decode_class_def(data, offset + r.read_u16()? as usize)?;
                let class2 = decode_class_def(data, offset + r.read_u16()? as usize)?;
                let class1_count = r.read_u16()?;
                let class2_count = r.read_u16()?;
                let records = (0..class1_count)
                    .map(|_| {
                        (0..class2_count)
                            .map(|_| {
                                Ok((
                                    ValueRecord::read(&mut r, format1)?,
                                    ValueRecord::read(&mut r, format2)?,
                                ))
                            })
                            .collect::<Result<Vec<_>>>()
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Self::PairClass {
                    format1: narrow(format1),
                    format2: narrow(format2),
                    coverage,
                    class1,
                    class2,
                    class2_count,
                    records,
                })
            }
            _ => Err(SubsetError::malformed(
                "GPOS",
                format!("lookup type {kind} has no format {format}"),
            )),
        }
    }

    fn subset(&self, map: &GlyphMap) -> Option<Self> {
        match self {
            Self::Single { format, values } => {
                let coverage: Vec<GlyphId> = values.iter().map(|(g, _)| *g).collect();
                let values = retain(&coverage, values.iter().map(|(_, v)| v.clone()).collect(), map);
                (!values.is_empty()).then_some(Self::Single { format: *format, values })
            }
            Self::Pair { format1, format2, sets } => {
                let sets: Vec<(GlyphId, Vec<PairValue>)> = sets
                    .iter()
                    .filter_map(|(first, pairs)| {
                        let first = map.get(*first)?;
                        let pairs: Vec<PairValue> = pairs
                            .iter()
                            .filter_map(|p| {
                                Some(PairValue { second: map.get(p.second)?, ..p.clone() })
                            })
                            .collect();
                        (!pairs.is_empty()).then_some((first, pairs))
                    })
                    .collect();
                (!sets.is_empty()).then_some(Self::Pair { format1: *format1, format2: *format2, sets })
            }
            Self::PairClass { format1, format2, coverage, class1, class2, class2_count, records } => {
                let coverage: Vec<GlyphId> = coverage.iter().filter_map(|g| map.get(*g)).collect();
                (!coverage.is_empty()).then(|| Self::PairClass {
                    format1: *format1,
                    format2: *format2,
                    coverage,
                    class1: subset_class_def(class1, map),
                    class2: subset_class_def(class2, map),
                    class2_count: *class2_count,
                    records: records.clone(),
                })
            }
        }
    }

    fn write(&self) -> Result<Vec<u8>> {
        let mut w = Writer::new();
        match self {
            Self::Single { format, values } => {
                let covered: Vec<GlyphId> = values.iter().map(|(g, _)| *g).collect();
                let shared = values.first().map(|(_, v)| v).filter(|v| values.iter().all(|(_, o)| o == *v));
                match shared {
                    Some(value) => {
                        w.write_u16(1);
                        let coverage_slot = w.reserve_u16();
                        w.write_u16(*format);
                        value.write(&mut w);
                        append_children(&mut w, &[coverage_slot], &[encode_coverage(&covered)])?;
                    }
                    None => {
                        w.write_u16(2);
                        let coverage_slot = w.reserve_u16();
                        w.write_u16(*format);
                        w.write_u16(values.len() as u16);
                        for (_, v) in values {
                            v.write(&mut w);
                        }
                        append_children(&mut w, &[coverage_slot], &[encode_coverage(&covered)])?;
                    }
                }
            }
            Self::Pair { format1, format2, sets } => {
                let covered: Vec<GlyphId> = sets.iter().map(|(g, _)| *g).collect();
                w.write_u16(1);
                let coverage_slot = w.reserve_u16();
                w.write_u16(*format1);
                w.write_u16(*format2);
                w.write_u16(sets.len() as u16);
                let slots: Vec<usize> = sets.iter().map(|_| w.reserve_u16()).collect();
                let children: Vec<Vec<u8>> = sets.iter().map(|(_, pairs)| write_pair_set(pairs)).collect();
                append_children(&mut w, &slots, &children)?;
                append_children(&mut w, &[coverage_slot], &[encode_coverage(&covered)])?;
            }
            Self::PairClass { format1, format2, coverage, class1, class2, class2_count, records } => {
                w.write_u16(2);
                let coverage_slot = w.reserve_u16();
                w.write_u16(*format1);
                w.write_u16(*format2);
                let class1_slot = w.reserve_u16();
                let class2_slot = w.reserve_u16();
                w.write_u16(records.len() as u16);
                w.write_u16(*class2_count);
                for (v1, v2) in records.iter().flatten() {
                    v1.write(&mut w);
                    v2.write(&mut w);
                }
                append_children(
                    &mut w,
                    &[coverage_slot, class1_slot, class2_slot],
                    &[encode_coverage(coverage), encode_class_def(class1), encode_class_def(class2)],
                )?;
            }
        }
        Ok(w.finish())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn g(id: u16) -> GlyphId {
        GlyphId(id)
    }

    fn map(kept: &[u16], total: u16) -> GlyphMap {
        let kept: BTreeSet<GlyphId> = kept.iter().copied().map(GlyphId).collect();
        GlyphMap::compact(&kept, total)
    }

    fn x_advance(v: i16) -> ValueRecord {
        ValueRecord(vec![v])
    }

    #[test]
    fn test_single_shared_value_uses_format1() {
        let table = PosSubtable::Single {
            format: 0x0004,
            values: vec![(g(2), x_advance(-20)), (g(5), x_advance(-20))],
        };
        let bytes = table.write().unwrap();
        assert_eq!(&bytes[..2], &[0, 1]);
        assert_eq!(PosSubtable::parse(1, &bytes, 0).unwrap(), table);
    }

    #[test]
    fn test_device_offsets_are_stripped() {
        // Format 1, coverage at 10, XAdvance + XAdvDevice, coverage [4].
        let bytes = [0, 1, 0, 10, 0, 0x44, 0xFF, 0xF6, 0, 0, 0, 1, 0, 1, 0, 4];
        let table = PosSubtable::parse(1, &bytes, 0).unwrap();
        assert_eq!(table, PosSubtable::Single { format: 0x0004, values: vec![(g(4), x_advance(-10))] });
    }

    #[test]
    fn test_pair_subset_filters_second_glyphs() {
        let table = PosSubtable::Pair {
            format1: 0x0004,
            format2: 0,
            sets: vec![(
                g(1),
                vec![
                    PairValue { second: g(2), first_value: x_advance(-5), second_value: ValueRecord::default() },
                    PairValue { second: g(3), first_value: x_advance(-7), second_value: ValueRecord::default() },
                ],
            )],
        };
        let subset = table.subset(&map(&[0, 1, 3], 4)).unwrap();
        let PosSubtable::Pair { sets, .. } = &subset else { panic!("expected pair") };
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].1.len(), 1);
        assert_eq!(sets[0].1[0].second, g(2));

        let bytes = subset.write().unwrap();
        assert_eq!(PosSubtable::parse(2, &bytes, 0).unwrap(), subset);
    }

    #[test]
    fn test_class_pairs_keep_matrix() {
        let table = PosSubtable::PairClass {
            format1: 0x0004,
            format2: 0,
            coverage: vec![g(1), g(2)],
            class1: ClassDef::from([(g(2), 1)]),
            class2: ClassDef::from([(g(3), 1)]),
            class2_count: 2,
            records: vec![
                vec![(x_advance(0), ValueRecord::default()), (x_advance(-3), ValueRecord::default())],
                vec![(x_advance(0), ValueRecord::default()), (x_advance(-9), ValueRecord::default())],
            ],
        };
        let subset = table.subset(&map(&[0, 2, 3], 4)).unwrap();
        let PosSubtable::PairClass { coverage, class1, class2, records, .. } = &subset else {
            panic!("expected class pairs")
        };
        assert_eq!(coverage, &vec![g(1)]);
        assert_eq!(class1, &ClassDef::from([(g(1), 1)]));
        assert_eq!(class2, &ClassDef::from([(g(2), 1)]));
        assert_eq!(records.len(), 2);

        let bytes = subset.write().unwrap();
        assert_eq!(PosSubtable::parse(2, &bytes, 0).unwrap(), subset);
    }

    #[test]
    fn test_mark_positioning_unsupported() {
        let err = PosSubtable::parse(4, &[0, 1], 0).unwrap_err();
        assert!(matches!(err, SubsetError::UnsupportedFeature(_)));
    }
}
