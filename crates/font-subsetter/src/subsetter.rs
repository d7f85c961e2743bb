//! The subsetting pipeline and its builder front end.

use indexmap::IndexMap;
use log::{debug, info, warn};
use read_fonts::types::Tag;

use crate::{
    Result, SubsetError,
    cff::subset_cff,
    glyf::{GLYF, GlyfSubset, LOCA},
    layout::{GDEF, GPOS, GSUB, LayoutSubtable, gdef::subset_gdef},
    options::{SubsetRequest, TagFilter},
    plan::{PreparedLayout, SubsetPlan},
    repack::assemble,
    sfnt::{HEAD, SfntFile},
    tables::{
        CMAP, HHEA, HMTX, MAXP, MetricsSubset, OS2, POST, UNSUBSETTABLE, VARIATION_TABLES, VHEA,
        VMTX, VORG, build_cmap, subset_head, subset_maxp, subset_metrics, subset_os2, subset_post,
        subset_vorg,
    },
    types::{GlyphId, parse_tag},
};

const CFF: Tag = Tag::new(b"CFF ");
const CFF2: Tag = Tag::new(b"CFF2");

/// Tables whose failure is always fatal, even in best-effort mode.
const OUTLINE_TABLES: &[Tag] = &[GLYF, LOCA, CFF, HEAD, MAXP, HHEA, HMTX];

/// Font subsetter with builder pattern.
///
/// Collects a [`SubsetRequest`] and runs the engine over raw font bytes.
///
/// ```no_run
/// use fontflat_subsetter::Subsetter;
///
/// let font_data: &[u8] = &[];
/// let subset = Subsetter::new()
///     .with_text("中文")
///     .with_unicode_ranges([(0x3000, 0x303F)])
///     .desubroutinize(true)
///     .subset(font_data);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Subsetter {
    request: SubsetRequest,
    drop_vf_tables: bool,
}

impl Subsetter {
    /// Keep only glyph 0 and every layout feature until told otherwise.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_request(request: SubsetRequest) -> Self {
        Self { request, drop_vf_tables: false }
    }

    pub fn with_unicodes(mut self, unicodes: impl IntoIterator<Item = u32>) -> Self {
        self.request.unicodes.extend(unicodes);
        self
    }

    /// Adds inclusive (start, end) code point ranges.
    pub fn with_unicode_ranges(mut self, ranges: impl IntoIterator<Item = (u32, u32)>) -> Self {
        for (start, end) in ranges {
            self.request.unicodes.extend(start..=end);
        }
        self
    }

    /// Adds every character of `text`.
    pub fn with_text(mut self, text: &str) -> Self {
        self.request.unicodes.extend(text.chars().map(u32::from));
        self
    }

    pub fn with_glyph_ids(mut self, gids: impl IntoIterator<Item = u16>) -> Self {
        self.request.glyph_ids.extend(gids.into_iter().map(GlyphId));
        self
    }

    /// Replaces the layout feature filter. [`TagFilter::none`] strips
    /// GSUB, GPOS and GDEF.
    pub fn with_layout_features(mut self, features: TagFilter) -> Self {
        self.request.layout_features = features;
        self
    }

    pub fn with_layout_scripts(mut self, scripts: TagFilter) -> Self {
        self.request.layout_scripts = scripts;
        self
    }

    pub fn desubroutinize(mut self, flatten: bool) -> Self {
        self.request.desubroutinize = flatten;
        self
    }

    pub fn retain_gids(mut self, retain: bool) -> Self {
        self.request.retain_gids = retain;
        self
    }

    pub fn retain_glyph_names(mut self, retain: bool) -> Self {
        self.request.retain_glyph_names = retain;
        self
    }

    /// Sets whether to drop the variation tables that carry no per-glyph
    /// data (`fvar`, `avar`, `STAT`, `MVAR`, `cvar`). Per-glyph variation
    /// data is always dropped.
    pub fn drop_vf_tables(mut self, drop: bool) -> Self {
        self.drop_vf_tables = drop;
        self
    }

    /// Adds tables to drop, by tag string.
    pub fn drop_tables<S: AsRef<str>>(mut self, tags: impl IntoIterator<Item = S>) -> Result<Self> {
        for tag in tags {
            self.request.drop_tables.insert(parse_tag(tag.as_ref())?);
        }
        Ok(self)
    }

    pub fn best_effort(mut self, best_effort: bool) -> Self {
        self.request.best_effort = best_effort;
        self
    }

    /// The request this builder will run.
    pub fn request(&self) -> SubsetRequest {
        let mut request = self.request.clone();
        if self.drop_vf_tables {
            request.drop_tables.extend(VARIATION_TABLES.iter().copied());
        }
        request
    }

    /// Subsets the font data and returns the new font file.
    pub fn subset(&self, data: &[u8]) -> Result<Vec<u8>> {
        subset_font(data, &self.request())
    }
}

/// Subset one font.
pub fn subset_font(data: &[u8], request: &SubsetRequest) -> Result<Vec<u8>> {
    let sfnt = SfntFile::parse(data)?;
    if sfnt.contains(CFF2) {
        return Err(SubsetError::UnsupportedFeature("CFF2 outlines".into()));
    }

    let plan = SubsetPlan::new(&sfnt, request)?;
    let tables = TableSubsetter::new(&sfnt, &plan, request)?;

    let mut out = IndexMap::new();
    for tag in sfnt.tags() {
        if request.should_drop(tag) || plan.dropped.contains(&tag) {
            debug!("Dropping '{tag}' on request");
            continue;
        }
        if UNSUBSETTABLE.contains(&tag) {
            info!("Dropping '{tag}': glyph data cannot be subset");
            continue;
        }
        match tables.subset(tag) {
            Ok(Some(bytes)) => {
                debug!("'{tag}': {} bytes", bytes.len());
                out.insert(tag, bytes);
            }
            Ok(None) => debug!("Dropping '{tag}': nothing left after subsetting"),
            Err(e) if request.best_effort && e.is_recoverable() && !OUTLINE_TABLES.contains(&tag) => {
                warn!("Dropping '{tag}': {e}");
            }
            Err(e) => return Err(e),
        }
    }

    let font = assemble(sfnt.sfnt_version(), out);
    info!(
        "Subset {} -> {} bytes, {} glyphs",
        data.len(),
        font.len(),
        plan.glyph_map.num_glyphs()
    );
    Ok(font)
}

/// Rewrites individual tables against a finished plan.
struct TableSubsetter<'p, 'a> {
    sfnt: &'p SfntFile<'a>,
    plan: &'p SubsetPlan<'a>,
    request: &'p SubsetRequest,
    glyf: Option<GlyfSubset>,
    hmetrics: Option<MetricsSubset>,
    vmetrics: Option<MetricsSubset>,
}

impl<'p, 'a> TableSubsetter<'p, 'a> {
    fn new(sfnt: &'p SfntFile<'a>, plan: &'p SubsetPlan<'a>, request: &'p SubsetRequest) -> Result<Self> {
        let map = &plan.glyph_map;
        let glyf = plan.glyf.as_ref().map(|glyf| glyf.subset(map)).transpose()?;
        let metrics = |header: Tag, table: Tag, name: &'static str| -> Result<Option<MetricsSubset>> {
            match (sfnt.table(header), sfnt.table(table)) {
                (Some(header), Some(metrics)) => subset_metrics(name, header, metrics, map).map(Some),
                _ => Ok(None),
            }
        };
        Ok(Self {
            sfnt,
            plan,
            request,
            glyf,
            hmetrics: metrics(HHEA, HMTX, "hmtx")?,
            vmetrics: metrics(VHEA, VMTX, "vmtx")?,
        })
    }

    fn subset(&self, tag: Tag) -> Result<Option<Vec<u8>>> {
        let map = &self.plan.glyph_map;
        let data = self.sfnt.expect_table(tag)?;
        let metrics = |m: &Option<MetricsSubset>, header: bool| {
            m.as_ref().map(|m| if header { m.header.clone() } else { m.metrics.clone() })
        };

        Ok(match tag {
            GLYF => self.glyf.as_ref().map(|g| g.glyf.clone()),
            LOCA => self.glyf.as_ref().map(|g| g.loca.clone()),
            CFF => Some(subset_cff(data, map, self.request.desubroutinize)?),
            HEAD => Some(subset_head(data, self.glyf.as_ref().map(|g| g.long_loca))?),
            MAXP => Some(subset_maxp(data, map)?),
            HHEA => metrics(&self.hmetrics, true),
            HMTX => metrics(&self.hmetrics, false),
            VHEA => metrics(&self.vmetrics, true),
            VMTX => metrics(&self.vmetrics, false),
            CMAP => Some(build_cmap(self.plan.output_cmap())?),
            POST => Some(subset_post(data, map, self.request.retain_glyph_names)?),
            OS2 => Some(subset_os2(data, &self.plan.cmap)?),
            VORG => Some(subset_vorg(data, map)?),
            GSUB => self.layout(self.plan.gsub.as_ref(), data)?,
            GPOS => self.layout(self.plan.gpos.as_ref(), data)?,
            GDEF if self.request.wants_layout() => subset_gdef(data, map)?,
            GDEF => None,
            _ => Some(data.to_vec()),
        })
    }

    /// Whole glyph set with every feature and script: a layout table with
    /// lookups the engine cannot parse is kept as it is.
    fn keeps_layout_verbatim(&self) -> bool {
        self.plan.glyph_map.is_full_identity()
            && self.request.layout_features.is_all()
            && self.request.layout_scripts.is_all()
    }

    fn layout<T: LayoutSubtable>(
        &self,
        prepared: Option<&PreparedLayout<T>>,
        data: &[u8],
    ) -> Result<Option<Vec<u8>>> {
        let Some(prepared) = prepared else {
            return Ok(None);
        };
        if !prepared.is_complete() && self.keeps_layout_verbatim() {
            info!("Keeping {} verbatim: it has lookups that cannot be subset", T::TABLE);
            return Ok(Some(data.to_vec()));
        }
        prepared.subset(&self.plan.glyph_map, &self.request.layout_scripts)
    }
}
