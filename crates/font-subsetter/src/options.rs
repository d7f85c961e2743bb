//! Subset request: what to keep and how to rewrite it.

use std::collections::BTreeSet;

use read_fonts::types::Tag;

use crate::{Result, types::{GlyphId, parse_tag}};

/// Tables dropped unless the caller says otherwise.
pub const DEFAULT_DROP_TABLES: &[&[u8; 4]] = &[b"DSIG", b"JSTF", b"LTSH", b"PCLT"];

/// Selects layout features or scripts by tag.
///
/// `All` is spelled `*` on the command line. An empty `Only` set selects
/// nothing, which strips the layout tables entirely when used for features.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TagFilter {
    #[default]
    All,
    Only(BTreeSet<Tag>),
}

pub type FeatureFilter = TagFilter;
pub type ScriptFilter = TagFilter;

impl TagFilter {
    pub fn none() -> Self {
        Self::Only(BTreeSet::new())
    }

    /// Parse a tag list where a lone `*` entry selects everything.
    pub fn parse<S: AsRef<str>>(tags: impl IntoIterator<Item = S>) -> Result<Self> {
        let mut set = BTreeSet::new();
        for tag in tags {
            let tag = tag.as_ref().trim();
            if tag == "*" {
                return Ok(Self::All);
            }
            if !tag.is_empty() {
                set.insert(parse_tag(tag)?);
            }
        }
        Ok(Self::Only(set))
    }

    pub fn matches(&self, tag: Tag) -> bool {
        match self {
            Self::All => true,
            Self::Only(set) => set.contains(&tag),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Only(set) if set.is_empty())
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

/// Everything the engine needs to know about one subsetting run.
#[derive(Debug, Clone)]
pub struct SubsetRequest {
    /// Code points to keep, resolved through the font's cmap.
    pub unicodes: BTreeSet<u32>,
    /// Glyphs to keep regardless of cmap.
    pub glyph_ids: BTreeSet<GlyphId>,
    pub layout_features: FeatureFilter,
    pub layout_scripts: ScriptFilter,
    /// Inline every subroutine call and emit empty subroutine INDEXes.
    pub desubroutinize: bool,
    /// Keep source glyph IDs instead of compacting them.
    pub retain_gids: bool,
    /// Keep a version 2 `post` table instead of downgrading to version 3.
    pub retain_glyph_names: bool,
    pub drop_tables: BTreeSet<Tag>,
    /// Drop a malformed non-outline table instead of failing the whole font.
    pub best_effort: bool,
}

impl Default for SubsetRequest {
    fn default() -> Self {
        Self {
            unicodes: BTreeSet::new(),
            glyph_ids: BTreeSet::new(),
            layout_features: FeatureFilter::All,
            layout_scripts: ScriptFilter::All,
            desubroutinize: false,
            retain_gids: false,
            retain_glyph_names: false,
            drop_tables: DEFAULT_DROP_TABLES.iter().map(|t| Tag::new(t)).collect(),
            best_effort: false,
        }
    }
}

impl SubsetRequest {
    pub fn should_drop(&self, tag: Tag) -> bool {
        self.drop_tables.contains(&tag)
    }

    /// Layout tables are only consulted when at least one feature is wanted.
    pub fn wants_layout(&self) -> bool {
        !self.layout_features.is_empty()
    }
}
