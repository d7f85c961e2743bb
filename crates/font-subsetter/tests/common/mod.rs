//! Small fonts assembled in code for the end-to-end tests.
//!
//! Glyph order shared by the TrueType and CFF flavours:
//!
//! | gid | glyph | reached by |
//! |---|---|---|
//! | 0 | .notdef | always |
//! | 1 | 中 | U+4E2D |
//! | 2 | 文 | U+6587 |
//! | 3 | A | U+0041 |
//! | 4 | A.smcp | `smcp` on A |
//! | 5 | A_A | `liga` on A A |
//! | 6 | 中.vert | `vert` on 中 |
//! | 7 | À | U+00C0, a composite of A in the TrueType font |

#![allow(dead_code)]

use indexmap::IndexMap;
use read_fonts::types::Tag;

use fontflat_subsetter::{
    FeatureIndex, GlyphId, LookupIndex,
    cff::{
        Cff,
        charset::encode_charset,
        charstring::{CallGraph, collect_calls},
        dict::write_fixed_int,
        fdselect::encode_fd_select,
        index::encode_index,
    },
    layout::{
        FeatureRecord, LangSys, Lookup, Script, ScriptRecord,
        classdef::ClassDef,
        gdef::Gdef,
        gpos::{PairValue, PosSubtable, ValueRecord},
        gsub::{Ligature, SubstSubtable},
        write_table,
    },
    repack::assemble,
    sfnt::{CFF, TRUETYPE},
    tables::build_cmap,
    writer::Writer,
};

pub const NUM_GLYPHS: u16 = 8;

pub const ZHONG: u32 = 0x4E2D;
pub const WEN: u32 = 0x6587;
pub const LATIN_A: u32 = 0x41;
pub const A_GRAVE: u32 = 0xC0;

pub const GID_ZHONG: u16 = 1;
pub const GID_WEN: u16 = 2;
pub const GID_A: u16 = 3;
pub const GID_A_SMCP: u16 = 4;
pub const GID_A_A: u16 = 5;
pub const GID_ZHONG_VERT: u16 = 6;
pub const GID_A_GRAVE: u16 = 7;

const ADVANCES: [u16; NUM_GLYPHS as usize] = [500, 1000, 1000, 600, 550, 1100, 1000, 600];

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn truetype_font() -> Vec<u8> {
    let mut glyphs: Vec<Vec<u8>> = (0..NUM_GLYPHS - 1).map(|gid| simple_glyph(100 + gid as i16)).collect();
    glyphs.push(composite_glyph(GID_A, 120));

    let mut glyf = Writer::new();
    let mut loca = Writer::new();
    for glyph in &glyphs {
        loca.write_u32(glyf.len() as u32);
        glyf.write_bytes(glyph);
        glyf.align(2);
    }
    loca.write_u32(glyf.len() as u32);

    let mut tables = common_tables(true);
    tables.insert(Tag::new(b"glyf"), glyf.finish());
    tables.insert(Tag::new(b"loca"), loca.finish());
    tables.insert(Tag::new(b"maxp"), maxp(true));
    assemble(TRUETYPE, tables)
}

pub fn cff_font() -> Vec<u8> {
    let mut tables = common_tables(false);
    tables.insert(Tag::new(b"CFF "), cff_table());
    tables.insert(Tag::new(b"maxp"), maxp(false));
    assemble(CFF, tables)
}

fn common_tables(truetype: bool) -> IndexMap<Tag, Vec<u8>> {
    let mut cmap = vec![
        (ZHONG, GlyphId(GID_ZHONG)),
        (WEN, GlyphId(GID_WEN)),
        (LATIN_A, GlyphId(GID_A)),
    ];
    if truetype {
        cmap.push((A_GRAVE, GlyphId(GID_A_GRAVE)));
    }

    let mut tables = IndexMap::new();
    tables.insert(Tag::new(b"head"), head(truetype));
    tables.insert(Tag::new(b"hhea"), hhea());
    tables.insert(Tag::new(b"hmtx"), hmtx());
    tables.insert(Tag::new(b"cmap"), build_cmap(cmap).unwrap());
    tables.insert(Tag::new(b"post"), post_v3());
    tables.insert(Tag::new(b"OS/2"), os2());
    tables.insert(Tag::new(b"name"), vec![0, 0, 0, 0, 0, 6]);
    tables.insert(Tag::new(b"GSUB"), gsub());
    tables.insert(Tag::new(b"GPOS"), gpos());
    tables.insert(Tag::new(b"GDEF"), gdef());
    tables.insert(Tag::new(b"DSIG"), vec![0, 0, 0, 1, 0, 0, 0, 0]);
    tables.insert(Tag::new(b"hdmx"), vec![0; 8]);
    tables
}

fn simple_glyph(extent: i16) -> Vec<u8> {
    let mut w = Writer::new();
    w.write_i16(1);
    for v in [0, 0, extent, extent] {
        w.write_i16(v);
    }
    w.write_u16(0);
    w.write_u16(0);
    w.write_u8(0x01);
    w.write_i16(extent);
    w.write_i16(extent);
    w.finish()
}

fn composite_glyph(component: u16, dx: i16) -> Vec<u8> {
    let mut w = Writer::new();
    w.write_i16(-1);
    for v in [0, 0, 200, 200] {
        w.write_i16(v);
    }
    // ARG_1_AND_2_ARE_WORDS | ARGS_ARE_XY_VALUES
    w.write_u16(0x0003);
    w.write_u16(component);
    w.write_i16(dx);
    w.write_i16(0);
    w.finish()
}

fn head(long_loca: bool) -> Vec<u8> {
    let mut w = Writer::new();
    w.write_u32(0x0001_0000);
    w.write_u32(0x0001_0000);
    w.write_u32(0);
    w.write_u32(0x5F0F_3CF5);
    w.write_u16(0x000B);
    w.write_u16(1000);
    w.write_bytes(&[0; 16]);
    for v in [0, -120, 1100, 880] {
        w.write_i16(v);
    }
    w.write_u16(0);
    w.write_u16(8);
    w.write_i16(2);
    w.write_i16(long_loca as i16);
    w.write_i16(0);
    w.finish()
}

fn hhea() -> Vec<u8> {
    let mut w = Writer::new();
    w.write_u32(0x0001_0000);
    w.write_i16(880);
    w.write_i16(-120);
    w.write_i16(0);
    w.write_u16(1100);
    w.write_bytes(&[0; 22]);
    w.write_u16(NUM_GLYPHS);
    w.finish()
}

fn hmtx() -> Vec<u8> {
    let mut w = Writer::new();
    for advance in ADVANCES {
        w.write_u16(advance);
        w.write_i16(10);
    }
    w.finish()
}

fn maxp(truetype: bool) -> Vec<u8> {
    let mut w = Writer::new();
    if truetype {
        w.write_u32(0x0001_0000);
        w.write_u16(NUM_GLYPHS);
        w.write_bytes(&[0; 26]);
    } else {
        w.write_u32(0x0000_5000);
        w.write_u16(NUM_GLYPHS);
    }
    w.finish()
}

fn post_v3() -> Vec<u8> {
    let mut w = Writer::new();
    w.write_u32(0x0003_0000);
    w.write_bytes(&[0; 28]);
    w.finish()
}

fn os2() -> Vec<u8> {
    let mut data = vec![0; 96];
    data[1] = 4;
    data[64..66].copy_from_slice(&0x41u16.to_be_bytes());
    data[66..68].copy_from_slice(&0x6587u16.to_be_bytes());
    data
}

fn gids(ids: &[u16]) -> Vec<GlyphId> {
    ids.iter().copied().map(GlyphId).collect()
}

fn lookup<T>(kind: u16, subtable: T) -> Lookup<T> {
    Lookup { kind, flag: 0, mark_filtering_set: None, subtables: vec![subtable] }
}

fn lang_sys(features: &[u16]) -> LangSys {
    LangSys {
        required_feature: None,
        features: features.iter().copied().map(FeatureIndex).collect(),
    }
}

fn feature(tag: &[u8; 4], lookups: &[u16]) -> FeatureRecord<'static> {
    FeatureRecord {
        tag: Tag::new(tag),
        params: None,
        lookups: lookups.iter().copied().map(LookupIndex).collect(),
    }
}

/// `DFLT` with smcp, liga and vert; `hani` with a `JAN ` LangSys that only
/// has vert.
fn gsub() -> Vec<u8> {
    let scripts = vec![
        ScriptRecord {
            tag: Tag::new(b"DFLT"),
            script: Script { default: Some(lang_sys(&[0, 1, 2])), languages: vec![] },
        },
        ScriptRecord {
            tag: Tag::new(b"hani"),
            script: Script {
                default: Some(lang_sys(&[2])),
                languages: vec![(Tag::new(b"JAN "), lang_sys(&[2]))],
            },
        },
    ];
    let features = vec![feature(b"smcp", &[0]), feature(b"liga", &[1]), feature(b"vert", &[2])];
    let lookups = vec![
        lookup(1, SubstSubtable::Single(vec![(GlyphId(GID_A), GlyphId(GID_A_SMCP))])),
        lookup(
            4,
            SubstSubtable::Ligature(vec![(
                GlyphId(GID_A),
                vec![Ligature { glyph: GlyphId(GID_A_A), components: gids(&[GID_A]) }],
            )]),
        ),
        lookup(1, SubstSubtable::Single(vec![(GlyphId(GID_ZHONG), GlyphId(GID_ZHONG_VERT))])),
    ];
    write_table(&scripts, &features, &lookups).unwrap()
}

/// `kern` pairs 中 文 and A A.
fn gpos() -> Vec<u8> {
    let scripts = vec![ScriptRecord {
        tag: Tag::new(b"DFLT"),
        script: Script { default: Some(lang_sys(&[0])), languages: vec![] },
    }];
    let pair = |second: u16, advance: i16| PairValue {
        second: GlyphId(second),
        first_value: ValueRecord(vec![advance]),
        second_value: ValueRecord(vec![]),
    };
    let kern = PosSubtable::Pair {
        format1: 0x0004,
        format2: 0,
        sets: vec![
            (GlyphId(GID_ZHONG), vec![pair(GID_WEN, -50)]),
            (GlyphId(GID_A), vec![pair(GID_A, -20)]),
        ],
    };
    write_table(&scripts, &[feature(b"kern", &[0])], &[lookup(2, kern)]).unwrap()
}

fn gdef() -> Vec<u8> {
    let classes: ClassDef = (1..NUM_GLYPHS).map(|gid| (GlyphId(gid), 1)).collect();
    Gdef { glyph_classes: Some(classes), ..Gdef::default() }.write().unwrap()
}

/// CFF charstring number in the one-byte range.
fn num(v: i32) -> u8 {
    (v + 139) as u8
}

const RLINETO: u8 = 5;
const HLINETO: u8 = 6;
const CALLSUBR: u8 = 10;
const RETURN: u8 = 11;
const ENDCHAR: u8 = 14;
const RMOVETO: u8 = 21;
const CALLGSUBR: u8 = 29;
const BIAS: i32 = 107;

/// Name-keyed CFF. Glyphs 1 to 3 each call their own global subroutine,
/// and 中 also calls local subroutine 0, which calls global subroutine 3.
pub fn cff_table() -> Vec<u8> {
    let global_subrs: Vec<Vec<u8>> = vec![
        vec![num(10), num(20), RLINETO, RETURN],
        vec![num(20), num(10), RLINETO, RETURN],
        vec![num(30), num(30), RLINETO, RETURN],
        vec![num(-5), HLINETO, RETURN],
    ];
    let local_subrs: Vec<Vec<u8>> =
        vec![vec![num(5), HLINETO, num(3 - BIAS), CALLGSUBR, RETURN]];

    let charstrings: Vec<Vec<u8>> = (0..NUM_GLYPHS as i32)
        .map(|gid| match gid {
            0 => vec![ENDCHAR],
            1 => vec![
                num(1), num(1), RMOVETO,
                num(-BIAS), CALLGSUBR,
                num(-BIAS), CALLSUBR,
                ENDCHAR,
            ],
            2 | 3 => vec![num(gid), num(gid), RMOVETO, num(gid - 1 - BIAS), CALLGSUBR, ENDCHAR],
            _ => vec![num(gid), num(0), RMOVETO, num(50), HLINETO, ENDCHAR],
        })
        .collect();
    let charset: Vec<u16> = (0..NUM_GLYPHS).map(|gid| if gid == 0 { 0 } else { gid + 1 }).collect();

    let name = encode_index(&[b"TestCFF".as_slice()]);
    let strings = encode_index::<&[u8]>(&[]);
    let global_index = encode_index(&global_subrs);
    let charset = encode_charset(&charset);
    let charstring_index = encode_index(&charstrings);

    let mut private = Writer::new();
    write_fixed_int(&mut private, 6);
    private.write_u8(19);
    let private = private.finish();

    // Three offsets of five bytes plus their operators, the Private size
    // operand included.
    let top_len = 5 + 1 + 5 + 1 + 5 + 5 + 1;
    let top_index_len = encode_index(&[vec![0u8; top_len]]).len();
    let charset_at = 4 + name.len() + top_index_len + strings.len() + global_index.len();
    let charstrings_at = charset_at + charset.len();
    let private_at = charstrings_at + charstring_index.len();

    let mut top = Writer::new();
    write_fixed_int(&mut top, charset_at as i32);
    top.write_u8(15);
    write_fixed_int(&mut top, charstrings_at as i32);
    top.write_u8(17);
    write_fixed_int(&mut top, private.len() as i32);
    write_fixed_int(&mut top, private_at as i32);
    top.write_u8(18);
    let top = top.finish();
    assert_eq!(top.len(), top_len);

    let mut w = Writer::new();
    w.write_bytes(&[1, 0, 4, 4]);
    w.write_bytes(&name);
    w.write_bytes(&encode_index(&[top]));
    w.write_bytes(&strings);
    w.write_bytes(&global_index);
    w.write_bytes(&charset);
    w.write_bytes(&charstring_index);
    w.write_bytes(&private);
    w.write_bytes(&encode_index(&local_subrs));
    w.finish()
}

/// Glyph count of [`cid_cff_table`].
pub const CID_GLYPHS: u16 = 4;

/// CID-keyed CFF with two Font DICTs. Glyphs 0 and 1 use FD 0, glyphs 2
/// and 3 use FD 1. Each FD has four local subroutines `k hlineto`, with
/// `k` = 1..=4 in FD 0 and 11..=14 in FD 1.
///
/// Global subroutine 0 calls local subroutine 3 of whichever FD is
/// current. Glyph 1 calls local 0 and global 0, glyph 2 calls global 0.
pub fn cid_cff_table() -> Vec<u8> {
    let global_subrs: Vec<Vec<u8>> = vec![vec![num(3 - BIAS), CALLSUBR, RETURN]];
    let local_subrs = |base: i32| -> Vec<Vec<u8>> {
        (1..=4).map(|k| vec![num(base + k), HLINETO, RETURN]).collect()
    };
    let locals = [local_subrs(0), local_subrs(10)];
    let charstrings: Vec<Vec<u8>> = vec![
        vec![ENDCHAR],
        vec![num(-BIAS), CALLSUBR, num(-BIAS), CALLGSUBR, ENDCHAR],
        vec![num(-BIAS), CALLGSUBR, ENDCHAR],
        vec![num(10), HLINETO, ENDCHAR],
    ];

    let name = encode_index(&[b"TestCID".as_slice()]);
    let strings = encode_index(&[b"Adobe".as_slice(), b"Identity".as_slice()]);
    let global_index = encode_index(&global_subrs);
    let charset = encode_charset(&[0, 1, 2, 3]);
    let fd_select = encode_fd_select(&[0, 0, 1, 1]);
    let charstring_index = encode_index(&charstrings);

    let mut private = Writer::new();
    write_fixed_int(&mut private, 6);
    private.write_u8(19);
    let private = private.finish();
    let private_blocks: Vec<Vec<u8>> =
        locals.iter().map(|subrs| [private.clone(), encode_index(subrs)].concat()).collect();

    // ROS, then charset, CharStrings, FDSelect and FDArray offsets.
    let top_len = 3 * 5 + 2 + 5 + 1 + 5 + 1 + 5 + 2 + 5 + 2;
    let font_dict_len = 5 + 5 + 1;
    let top_index_len = encode_index(&[vec![0u8; top_len]]).len();
    let charset_at = 4 + name.len() + top_index_len + strings.len() + global_index.len();
    let fd_select_at = charset_at + charset.len();
    let charstrings_at = fd_select_at + fd_select.len();
    let fd_array_at = charstrings_at + charstring_index.len();
    let first_private_at =
        fd_array_at + encode_index(&[vec![0u8; font_dict_len], vec![0u8; font_dict_len]]).len();

    let mut private_at = first_private_at;
    let font_dicts: Vec<Vec<u8>> = private_blocks
        .iter()
        .map(|block| {
            let mut w = Writer::new();
            write_fixed_int(&mut w, private.len() as i32);
            write_fixed_int(&mut w, private_at as i32);
            w.write_u8(18);
            private_at += block.len();
            w.finish()
        })
        .collect();

    let mut top = Writer::new();
    write_fixed_int(&mut top, 391);
    write_fixed_int(&mut top, 392);
    write_fixed_int(&mut top, 0);
    top.write_bytes(&[12, 30]);
    write_fixed_int(&mut top, charset_at as i32);
    top.write_u8(15);
    write_fixed_int(&mut top, charstrings_at as i32);
    top.write_u8(17);
    write_fixed_int(&mut top, fd_select_at as i32);
    top.write_bytes(&[12, 37]);
    write_fixed_int(&mut top, fd_array_at as i32);
    top.write_bytes(&[12, 36]);
    let top = top.finish();
    assert_eq!(top.len(), top_len);

    let mut w = Writer::new();
    w.write_bytes(&[1, 0, 4, 4]);
    w.write_bytes(&name);
    w.write_bytes(&encode_index(&[top]));
    w.write_bytes(&strings);
    w.write_bytes(&global_index);
    w.write_bytes(&charset);
    w.write_bytes(&fd_select);
    w.write_bytes(&charstring_index);
    w.write_bytes(&encode_index(&font_dicts));
    assert_eq!(w.len(), first_private_at);
    for block in &private_blocks {
        w.write_bytes(block);
    }
    w.finish()
}

/// Number of call sites reachable from the glyphs of `cff`.
pub fn call_sites(cff: &Cff) -> usize {
    let mut graph = CallGraph::default();
    for gid in 0..cff.num_glyphs() as u16 {
        let code = cff.charstrings.get(gid as usize).unwrap();
        collect_calls(code, gid, cff.subrs_for(gid), &mut graph).unwrap();
    }
    graph.sites.values().map(|sites| sites.len()).sum()
}
