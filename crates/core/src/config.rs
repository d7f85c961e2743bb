//! Subsetting presets and command line value parsing.

use std::str::FromStr;

use anyhow::{Context, Result, bail};
use fontflat_subsetter::{Subsetter, TagFilter};
use read_fonts::types::Tag;

/// Blocks kept by [`Preset::Japanese`]: CJK punctuation, kana with the
/// historic kana blocks, fullwidth forms, and unified and compatibility
/// ideographs through Extension I.
pub const JAPANESE_RANGES: &[(u32, u32)] = &[
    (0x3000, 0x303F),
    (0x3041, 0x3096),
    (0x3099, 0x309F),
    (0x30A0, 0x30FF),
    (0x4E00, 0x9FFF),
    (0xFF00, 0xFFEF),
    (0x1B100, 0x1B12F),
    (0x1AFF0, 0x1AFFF),
    (0x1B000, 0x1B0FF),
    (0x1B130, 0x1B16F),
    (0x3400, 0x4DBF),
    (0x20000, 0x2A6DF),
    (0x2A700, 0x2B739),
    (0x2B740, 0x2B81D),
    (0x2B820, 0x2CEA1),
    (0x2CEB0, 0x2EBE0),
    (0x30000, 0x3134A),
    (0x31350, 0x323AF),
    (0x2EBF0, 0x2EE5D),
    (0xF900, 0xFAFF),
    (0x2F800, 0x2FA1F),
];

/// Scripts beyond Japanese that Pan-CJK fonts cover: Hangul and Bopomofo.
pub const CJK_EXTRA_RANGES: &[(u32, u32)] = &[
    (0x1100, 0x11FF),
    (0x3100, 0x312F),
    (0x3130, 0x318F),
    (0x31A0, 0x31BF),
    (0xA960, 0xA97F),
    (0xAC00, 0xD7AF),
    (0xD7B0, 0xD7FF),
];

/// Features the presets keep: vertical forms, width and JIS variants,
/// ligatures, localized forms, kerning and mark positioning. Anything else
/// in GSUB and GPOS is pruned along with the lookups only it uses.
pub const LAYOUT_FEATURES: &[&[u8; 4]] = &[
    b"aalt", b"ccmp", b"dlig", b"fwid", b"hwid", b"jp78", b"jp83", b"jp90", b"liga", b"locl",
    b"nlck", b"pwid", b"vert", b"vjmo", b"vrt2", b"halt", b"vhal", b"kern", b"mark", b"mkmk",
];

/// [`LAYOUT_FEATURES`] as a feature filter.
pub fn layout_features() -> TagFilter {
    TagFilter::Only(LAYOUT_FEATURES.iter().map(|t| Tag::new(t)).collect())
}

/// Named request presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Japanese,
    Cjk,
}

impl Preset {
    pub fn ranges(self) -> Vec<(u32, u32)> {
        match self {
            Preset::Japanese => JAPANESE_RANGES.to_vec(),
            Preset::Cjk => JAPANESE_RANGES.iter().chain(CJK_EXTRA_RANGES).copied().collect(),
        }
    }

    /// A subsetter for the preset ranges that keeps [`LAYOUT_FEATURES`] and
    /// glyph names and drops variation tables.
    pub fn subsetter(self) -> Subsetter {
        Subsetter::new()
            .with_unicode_ranges(self.ranges())
            .with_layout_features(layout_features())
            .drop_vf_tables(true)
            .retain_glyph_names(true)
    }
}

impl FromStr for Preset {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "japanese" | "ja" => Ok(Preset::Japanese),
            "cjk" => Ok(Preset::Cjk),
            _ => bail!("Unknown preset '{s}', expected 'japanese' or 'cjk'"),
        }
    }
}

/// Parse comma-separated code points and ranges such as
/// `U+4E00-9FFF,U+3000,41-5A`.
pub fn parse_ranges(s: &str) -> Result<Vec<(u32, u32)>> {
    s.split(',').map(str::trim).filter(|p| !p.is_empty()).map(parse_range).collect()
}

fn parse_range(s: &str) -> Result<(u32, u32)> {
    let (start, end) = s.split_once('-').unwrap_or((s, s));
    let start = parse_codepoint(start)?;
    let end = parse_codepoint(end)?;
    if end < start {
        bail!("Invalid range '{s}': end is before start");
    }
    Ok((start, end))
}

fn parse_codepoint(s: &str) -> Result<u32> {
    let s = s.trim();
    let hex = s
        .strip_prefix("U+")
        .or_else(|| s.strip_prefix("u+"))
        .or_else(|| s.strip_prefix("0x"))
        .unwrap_or(s);
    let cp = u32::from_str_radix(hex, 16).with_context(|| format!("Invalid code point '{s}'"))?;
    if cp > 0x10FFFF {
        bail!("Code point '{s}' is beyond U+10FFFF");
    }
    Ok(cp)
}

/// Parse a comma-separated feature list. `*` keeps every feature and an
/// empty list keeps none.
pub fn parse_features(s: &str) -> Result<TagFilter> {
    TagFilter::parse(s.split(',')).with_context(|| format!("Invalid feature list '{s}'"))
}
