mod common;

use common::*;
use read_fonts::types::Tag;

use std::collections::BTreeSet;

use fontflat_subsetter::{
    GlyphId, GlyphMap, Subsetter, TagFilter,
    cff::{Cff, subset_cff},
    sfnt::{CFF, SfntFile, checksum},
};

fn cff_of(font: &[u8]) -> Vec<u8> {
    SfntFile::parse(font).unwrap().table(Tag::new(b"CFF ")).unwrap().to_vec()
}

fn zhong_only() -> Subsetter {
    Subsetter::new().with_unicodes([ZHONG]).with_layout_features(TagFilter::none())
}

#[test]
fn test_renumbers_reachable_subroutines() {
    init_logger();
    let out = zhong_only().subset(&cff_font()).unwrap();
    assert_eq!(SfntFile::parse(&out).unwrap().sfnt_version(), CFF);

    let data = cff_of(&out);
    let cff = Cff::parse(&data).unwrap();
    assert_eq!(cff.num_glyphs(), 2);
    assert_eq!(cff.font_name().as_deref(), Some("TestCFF"));
    assert_eq!(cff.charset, vec![0, 2]);

    // Global subroutines 0 and 3 survive as 0 and 1; local 0 stays 0.
    assert_eq!(cff.global_subrs.len(), 2);
    assert_eq!(cff.global_subrs.get(0), Some([149u8, 159, 5, 11].as_slice()));
    assert_eq!(cff.global_subrs.get(1), Some([134u8, 6, 11].as_slice()));
    assert_eq!(cff.fonts[0].local_subrs.len(), 1);
    assert_eq!(cff.fonts[0].local_subrs.get(0), Some([144u8, 6, 33, 29, 11].as_slice()));
    assert_eq!(
        cff.charstrings.get(1),
        Some([140u8, 140, 21, 32, 29, 32, 10, 14].as_slice())
    );
}

#[test]
fn test_desubroutinized_has_no_calls() {
    init_logger();
    let out = zhong_only().desubroutinize(true).subset(&cff_font()).unwrap();
    let data = cff_of(&out);
    let cff = Cff::parse(&data).unwrap();

    assert!(cff.global_subrs.is_empty());
    assert!(cff.fonts[0].local_subrs.is_empty());
    assert_eq!(call_sites(&cff), 0);
    for charstring in cff.charstrings.iter() {
        assert_eq!(charstring.last(), Some(&14));
    }
    assert_eq!(
        cff.charstrings.get(1),
        Some([140u8, 140, 21, 149, 159, 5, 144, 6, 134, 6, 14].as_slice())
    );
}

#[test]
fn test_desubroutinize_is_idempotent() {
    let subsetter = Subsetter::new().with_unicodes([ZHONG, WEN, LATIN_A]).desubroutinize(true);
    let once = subsetter.subset(&cff_font()).unwrap();
    let twice = subsetter.subset(&once).unwrap();
    assert_eq!(cff_of(&once), cff_of(&twice));
}

#[test]
fn test_layout_closure_reaches_cff_glyphs() {
    let out = Subsetter::new().with_unicodes([ZHONG]).subset(&cff_font()).unwrap();
    let data = cff_of(&out);
    let cff = Cff::parse(&data).unwrap();
    // 中.vert comes along through `vert`.
    assert_eq!(cff.num_glyphs(), 3);
    assert_eq!(cff.charset, vec![0, 2, 7]);
}

#[test]
fn test_retain_gids_fills_holes_with_endchar() {
    let out = Subsetter::new()
        .with_unicodes([LATIN_A])
        .with_layout_features(TagFilter::none())
        .retain_gids(true)
        .subset(&cff_font())
        .unwrap();
    let data = cff_of(&out);
    let cff = Cff::parse(&data).unwrap();

    assert_eq!(cff.num_glyphs(), 4);
    assert_eq!(cff.charstrings.get(1), Some([14u8].as_slice()));
    assert_eq!(cff.charstrings.get(2), Some([14u8].as_slice()));
    assert_eq!(cff.charset, vec![0, 0, 0, 4]);
    // Only global subroutine 2 is reachable from A.
    assert_eq!(cff.global_subrs.len(), 1);
    assert!(cff.fonts[0].local_subrs.is_empty());
}

#[test]
fn test_cff_font_checksums() {
    let out = zhong_only().subset(&cff_font()).unwrap();
    assert_eq!(checksum(&out), 0xB1B0_AFBA);
    assert!(!SfntFile::parse(&out).unwrap().contains(Tag::new(b"glyf")));
}

fn cid_map(kept: &[u16]) -> GlyphMap {
    let kept: BTreeSet<GlyphId> = kept.iter().copied().map(GlyphId::new).collect();
    GlyphMap::compact(&kept, CID_GLYPHS)
}

#[test]
fn test_cid_global_subr_shared_by_font_dicts_is_inlined() {
    init_logger();
    let source = cid_cff_table();
    assert_eq!(call_sites(&Cff::parse(&source).unwrap()), 4);

    // FD 0 keeps locals 0 and 3, FD 1 keeps only 3: global 0's operand has
    // no single renumbering.
    let data = subset_cff(&source, &cid_map(&[0, 1, 2, 3]), false).unwrap();
    let cff = Cff::parse(&data).unwrap();

    assert!(cff.is_cid());
    assert_eq!(cff.fd_select, Some(vec![0, 0, 1, 1]));
    assert!(cff.global_subrs.is_empty());
    assert!(cff.fonts.iter().all(|font| font.local_subrs.is_empty()));
    assert_eq!(call_sites(&cff), 0);
    assert_eq!(cff.charstrings.get(1), Some([140u8, 6, 143, 6, 14].as_slice()));
    assert_eq!(cff.charstrings.get(2), Some([153u8, 6, 14].as_slice()));
}

#[test]
fn test_cid_global_subr_from_one_font_dict_is_renumbered() {
    init_logger();
    let data = subset_cff(&cid_cff_table(), &cid_map(&[0, 2]), false).unwrap();
    let cff = Cff::parse(&data).unwrap();

    assert_eq!(cff.fd_select, Some(vec![0, 1]));
    assert_eq!(cff.global_subrs.len(), 1);
    assert_eq!(cff.global_subrs.get(0), Some([32u8, 10, 11].as_slice()));
    assert!(cff.fonts[0].local_subrs.is_empty());
    assert_eq!(cff.fonts[1].local_subrs.len(), 1);
    assert_eq!(cff.fonts[1].local_subrs.get(0), Some([153u8, 6, 11].as_slice()));
    assert_eq!(cff.charstrings.get(1), Some([32u8, 29, 14].as_slice()));
    assert_eq!(call_sites(&cff), 2);
}
