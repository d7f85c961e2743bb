//! Glyph closure: which glyphs survive and where they land.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info, warn};
use read_fonts::{FontRef, TableProvider, types::Tag};

use crate::{
    Result,
    glyf::{GLYF, GlyfTable},
    layout::{
        GPOS, GSUB, LayoutSubtable, LayoutTable, Lookup, gpos::PosSubtable, gsub,
        gsub::SubstSubtable, subset_layout,
    },
    options::{SubsetRequest, TagFilter},
    reader::u16_at,
    sfnt::SfntFile,
    tables::MAXP,
    types::{FeatureIndex, GlyphId, GlyphMap, LookupIndex},
};

/// A parsed GSUB or GPOS narrowed to the requested features.
#[derive(Debug)]
pub struct PreparedLayout<'a, T> {
    pub table: LayoutTable<'a>,
    pub features: BTreeSet<FeatureIndex>,
    pub lookups: BTreeMap<LookupIndex, Lookup<T>>,
}

impl<'a, T: LayoutSubtable> PreparedLayout<'a, T> {
    fn prepare(data: &'a [u8], request: &SubsetRequest) -> Result<Self> {
        let table = LayoutTable::parse(T::TABLE, data)?;
        let features = table.selected_features(&request.layout_features, &request.layout_scripts);
        let lookups = table.load_all(&table.lookups_for(&features))?;
        debug!(
            "{}: {} of {} features and {} of {} lookups selected",
            T::TABLE,
            features.len(),
            table.features.len(),
            lookups.len(),
            table.lookups.len()
        );
        Ok(Self { table, features, lookups })
    }

    /// Every lookup of the table could be parsed.
    pub fn is_complete(&self) -> bool {
        self.table.fully_loaded(&self.lookups)
    }

    pub fn subset(&self, map: &GlyphMap, scripts: &TagFilter) -> Result<Option<Vec<u8>>> {
        subset_layout(&self.table, &self.features, &self.lookups, scripts, map)
    }
}

/// Everything decided before any table is rewritten.
#[derive(Debug)]
pub struct SubsetPlan<'a> {
    pub glyph_map: GlyphMap,
    /// Requested code points the font maps, with their source glyph.
    pub cmap: BTreeMap<u32, GlyphId>,
    pub glyf: Option<GlyfTable<'a>>,
    pub gsub: Option<PreparedLayout<'a, SubstSubtable>>,
    pub gpos: Option<PreparedLayout<'a, PosSubtable>>,
    /// Tables given up on in best-effort mode.
    pub dropped: BTreeSet<Tag>,
}

impl<'a> SubsetPlan<'a> {
    /// Resolve the request to a closed glyph set.
    ///
    /// Order: cmap lookups, glyph 0, explicit glyph IDs, the GSUB closure
    /// over the selected features, then composite glyph components.
    pub fn new(sfnt: &SfntFile<'a>, request: &SubsetRequest) -> Result<Self> {
        let num_glyphs = u16_at(sfnt.expect_table(MAXP)?, 4)?;
        let mut dropped = BTreeSet::new();

        let cmap = resolve_cmap(sfnt, request, num_glyphs)?;
        let mut glyphs: BTreeSet<GlyphId> = BTreeSet::from([GlyphId::NOTDEF]);
        glyphs.extend(cmap.values().copied());
        for &gid in &request.glyph_ids {
            if gid.to_u16() < num_glyphs {
                glyphs.insert(gid);
            } else {
                warn!("Ignoring {gid}: font has {num_glyphs} glyphs");
            }
        }

        let gsub = prepare_layout::<SubstSubtable>(sfnt, GSUB, request, &mut dropped)?;
        if let Some(gsub) = &gsub {
            gsub::closure(&gsub.lookups, &mut glyphs);
        }

        let glyf = if sfnt.contains(GLYF) { Some(GlyfTable::new(sfnt, num_glyphs)?) } else { None };
        if let Some(glyf) = &glyf {
            glyf.close_over_components(&mut glyphs)?;
        }
        let gpos = prepare_layout::<PosSubtable>(sfnt, GPOS, request, &mut dropped)?;

        let glyph_map = if request.retain_gids {
            GlyphMap::retain_gids(&glyphs, num_glyphs)
        } else {
            GlyphMap::compact(&glyphs, num_glyphs)
        };
        info!(
            "Keeping {} of {num_glyphs} glyphs ({} code points mapped)",
            glyphs.len(),
            cmap.len()
        );

        Ok(Self { glyph_map, cmap, glyf, gsub, gpos, dropped })
    }

    /// Retained code points with their output glyph.
    pub fn output_cmap(&self) -> impl Iterator<Item = (u32, GlyphId)> + '_ {
        self.cmap.iter().filter_map(|(cp, old)| self.glyph_map.get(*old).map(|new| (*cp, new)))
    }
}

fn resolve_cmap(
    sfnt: &SfntFile,
    request: &SubsetRequest,
    num_glyphs: u16,
) -> Result<BTreeMap<u32, GlyphId>> {
    if request.unicodes.is_empty() {
        return Ok(BTreeMap::new());
    }
    let font = FontRef::new(sfnt.data())?;
    let cmap = match font.cmap() {
        Ok(cmap) => cmap,
        Err(e) => {
            warn!("No usable cmap ({e}); no code points can be mapped");
            return Ok(BTreeMap::new());
        }
    };

    let mut mapped = BTreeMap::new();
    for &cp in &request.unicodes {
        let gid = cmap
            .map_codepoint(cp)
            .and_then(|g| u16::try_from(g.to_u32()).ok())
            .filter(|g| *g != 0 && *g < num_glyphs);
        match gid {
            Some(gid) => {
                mapped.insert(cp, GlyphId(gid));
            }
            None => debug!("U+{cp:04X} is not mapped"),
        }
    }
    Ok(mapped)
}

fn prepare_layout<'a, T: LayoutSubtable>(
    sfnt: &SfntFile<'a>,
    tag: Tag,
    request: &SubsetRequest,
    dropped: &mut BTreeSet<Tag>,
) -> Result<Option<PreparedLayout<'a, T>>> {
    let Some(data) = sfnt.table(tag) else {
        return Ok(None);
    };
    if !request.wants_layout() || request.should_drop(tag) {
        return Ok(None);
    }
    match PreparedLayout::prepare(data, request) {
        Ok(prepared) => Ok(Some(prepared)),
        Err(e) if request.best_effort && e.is_recoverable() => {
            warn!("Dropping '{tag}': {e}");
            dropped.insert(tag);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
