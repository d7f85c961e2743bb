//! Domain newtypes and the glyph renumbering map.

use std::{collections::BTreeSet, fmt};

use read_fonts::types::Tag;

use crate::{Result, SubsetError};

macro_rules! u16_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u16);

        impl $name {
            pub const fn new(id: u16) -> Self {
                Self(id)
            }

            pub const fn to_u16(self) -> u16 {
                self.0
            }

            pub const fn to_u32(self) -> u32 {
                self.0 as u32
            }

            pub const fn to_usize(self) -> usize {
                self.0 as usize
            }
        }

        impl From<u16> for $name {
            fn from(id: u16) -> Self {
                Self(id)
            }
        }

        impl From<$name> for u16 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $label, self.0)
            }
        }
    };
}

u16_id!(
    /// Glyph index within a font.
    GlyphId,
    "gid"
);
u16_id!(
    /// Index into a GSUB/GPOS LookupList.
    LookupIndex,
    "lookup"
);
u16_id!(
    /// Index into a GSUB/GPOS FeatureList.
    FeatureIndex,
    "feature"
);

impl GlyphId {
    pub const NOTDEF: GlyphId = GlyphId(0);
}

/// Parse a table, script or feature tag, padding short tags with spaces.
pub fn parse_tag(s: &str) -> Result<Tag> {
    if s.is_empty() || s.len() > 4 || !s.is_ascii() {
        return Err(SubsetError::InvalidTag(s.to_string()));
    }
    let mut bytes = [b' '; 4];
    bytes[..s.len()].copy_from_slice(s.as_bytes());
    Tag::new_checked(&bytes).map_err(|_| SubsetError::InvalidTag(s.to_string()))
}

/// Old glyph ID to new glyph ID mapping.
///
/// Built once from the closed keep-set. Compaction preserves relative order,
/// so anything sorted by old glyph ID stays sorted after remapping, and
/// glyph 0 always maps to 0.
#[derive(Debug, Clone)]
pub struct GlyphMap {
    /// Indexed by new glyph ID; `None` marks a hole left by `retain_gids`.
    new_to_old: Vec<Option<GlyphId>>,
    /// Indexed by old glyph ID.
    old_to_new: Vec<Option<GlyphId>>,
    source_glyphs: u16,
}

impl GlyphMap {
    /// Renumber the kept glyphs densely, in ascending old-ID order.
    pub fn compact(kept: &BTreeSet<GlyphId>, source_glyphs: u16) -> Self {
        let mut old_to_new = vec![None; source_glyphs as usize];
        let mut new_to_old = Vec::with_capacity(kept.len());
        for &old in kept.iter().filter(|g| g.0 < source_glyphs) {
            old_to_new[old.to_usize()] = Some(GlyphId(new_to_old.len() as u16));
            new_to_old.push(Some(old));
        }
        Self { new_to_old, old_to_new, source_glyphs }
    }

    /// Keep original glyph IDs; dropped glyphs below the highest kept one
    /// become holes.
    pub fn retain_gids(kept: &BTreeSet<GlyphId>, source_glyphs: u16) -> Self {
        let mut old_to_new = vec![None; source_glyphs as usize];
        let count = kept
            .iter()
            .filter(|g| g.0 < source_glyphs)
            .next_back()
            .map_or(0, |g| g.to_usize() + 1);
        let mut new_to_old = vec![None; count];
        for &old in kept.iter().filter(|g| g.0 < source_glyphs) {
            old_to_new[old.to_usize()] = Some(old);
            new_to_old[old.to_usize()] = Some(old);
        }
        Self { new_to_old, old_to_new, source_glyphs }
    }

    pub fn get(&self, old: GlyphId) -> Option<GlyphId> {
        self.old_to_new.get(old.to_usize()).copied().flatten()
    }

    pub fn contains(&self, old: GlyphId) -> bool {
        self.get(old).is_some()
    }

    /// Number of glyphs in the output font.
    pub fn num_glyphs(&self) -> u16 {
        self.new_to_old.len() as u16
    }

    pub fn source_glyphs(&self) -> u16 {
        self.source_glyphs
    }

    /// Output glyphs in new-ID order with their source glyph, if any.
    pub fn iter(&self) -> impl Iterator<Item = (GlyphId, Option<GlyphId>)> + '_ {
        self.new_to_old.iter().enumerate().map(|(new, old)| (GlyphId(new as u16), *old))
    }

    /// Retained source glyphs in ascending order.
    pub fn kept(&self) -> impl Iterator<Item = GlyphId> + '_ {
        self.new_to_old.iter().flatten().copied()
    }

    /// Every source glyph survives under its original ID.
    pub fn is_full_identity(&self) -> bool {
        self.new_to_old.len() == self.source_glyphs as usize
            && self.new_to_old.iter().enumerate().all(|(i, old)| *old == Some(GlyphId(i as u16)))
    }
}
