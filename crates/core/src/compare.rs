//! Differential comparison against the reference subsetter.
//!
//! Both subsetters run on the same input and request; the report lists
//! per-table byte sizes side by side plus the Script, Feature and Lookup
//! counts of GSUB and GPOS.

use std::{collections::BTreeSet, fmt};

use anyhow::{Context, Result};
use fontflat_subsetter::{SubsetRequest, subset_font};
use read_fonts::{FontRef, TableProvider, types::Tag};

use crate::reference::subset_with_harfbuzz;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayoutCounts {
    pub scripts: usize,
    pub features: usize,
    pub lookups: usize,
}

impl fmt::Display for LayoutCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.scripts, self.features, self.lookups)
    }
}

/// What one subsetter produced.
#[derive(Debug, Clone, Default)]
pub struct FontSummary {
    pub size: usize,
    pub num_glyphs: u16,
    pub tables: Vec<(Tag, u32)>,
    pub gsub: Option<LayoutCounts>,
    pub gpos: Option<LayoutCounts>,
}

impl FontSummary {
    pub fn from_font(data: &[u8]) -> Result<Self> {
        let font = FontRef::new(data).context("Failed to parse subset font")?;
        let tables = font
            .table_directory
            .table_records()
            .iter()
            .map(|record| (record.tag(), record.length()))
            .collect();
        let gsub = font.gsub().ok().map(|gsub| -> Result<LayoutCounts> {
            Ok(LayoutCounts {
                scripts: gsub.script_list()?.script_records().len(),
                features: gsub.feature_list()?.feature_records().len(),
                lookups: gsub.lookup_list()?.lookup_count() as usize,
            })
        });
        let gpos = font.gpos().ok().map(|gpos| -> Result<LayoutCounts> {
            Ok(LayoutCounts {
                scripts: gpos.script_list()?.script_records().len(),
                features: gpos.feature_list()?.feature_records().len(),
                lookups: gpos.lookup_list()?.lookup_count() as usize,
            })
        });
        Ok(Self {
            size: data.len(),
            num_glyphs: font.maxp().map(|m| m.num_glyphs()).unwrap_or_default(),
            tables,
            gsub: gsub.transpose()?,
            gpos: gpos.transpose()?,
        })
    }

    pub fn table_size(&self, tag: Tag) -> Option<u32> {
        self.tables.iter().find(|(t, _)| *t == tag).map(|(_, len)| *len)
    }
}

#[derive(Debug, Clone)]
pub struct Comparison {
    pub ours: FontSummary,
    pub reference: FontSummary,
}

impl Comparison {
    /// Every table tag present in either output, sorted.
    pub fn tags(&self) -> BTreeSet<Tag> {
        self.ours.tables.iter().chain(&self.reference.tables).map(|(tag, _)| *tag).collect()
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cell = |v: Option<u32>| v.map_or_else(|| "-".to_string(), |v| v.to_string());
        writeln!(f, "{:<6} {:>10} {:>10} {:>10}", "table", "fontflat", "hb-subset", "delta")?;
        for tag in self.tags() {
            let ours = self.ours.table_size(tag);
            let reference = self.reference.table_size(tag);
            let delta = match (ours, reference) {
                (Some(a), Some(b)) => format!("{:+}", a as i64 - b as i64),
                _ => String::new(),
            };
            writeln!(f, "{:<6} {:>10} {:>10} {:>10}", tag.to_string(), cell(ours), cell(reference), delta)?;
        }
        writeln!(
            f,
            "{:<6} {:>10} {:>10} {:>10}",
            "total",
            self.ours.size,
            self.reference.size,
            format!("{:+}", self.ours.size as i64 - self.reference.size as i64)
        )?;
        writeln!(f, "glyphs: {} vs {}", self.ours.num_glyphs, self.reference.num_glyphs)?;
        let counts = |c: Option<LayoutCounts>| c.map_or_else(|| "absent".to_string(), |c| c.to_string());
        writeln!(
            f,
            "GSUB scripts/features/lookups: {} vs {}",
            counts(self.ours.gsub),
            counts(self.reference.gsub)
        )?;
        write!(
            f,
            "GPOS scripts/features/lookups: {} vs {}",
            counts(self.ours.gpos),
            counts(self.reference.gpos)
        )
    }
}

/// Subset `data` with both engines and summarize the results.
pub fn compare(data: &[u8], request: &SubsetRequest) -> Result<Comparison> {
    let ours = subset_font(data, request).context("fontflat failed to subset")?;
    let reference = subset_with_harfbuzz(data, request).context("hb-subset failed to subset")?;
    Ok(Comparison {
        ours: FontSummary::from_font(&ours)?,
        reference: FontSummary::from_font(&reference)?,
    })
}
