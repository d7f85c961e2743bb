//! Table directory and CFF structure dumps.

use std::fmt;

use anyhow::{Context, Result};
use fontflat_subsetter::{
    cff::Cff,
    sfnt::{SfntFile, TableRecord},
};
use read_fonts::types::Tag;

/// CFF INDEX counts and sizes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CffSummary {
    pub name: Option<String>,
    pub major: u8,
    pub minor: u8,
    pub off_size: u8,
    pub is_cid: bool,
    pub glyphs: usize,
    pub charstring_bytes: usize,
    pub global_subrs: usize,
    pub local_subrs: usize,
    pub font_dicts: usize,
}

impl CffSummary {
    pub fn from_table(data: &[u8]) -> Result<Self> {
        let cff = Cff::parse(data)?;
        Ok(Self {
            name: cff.font_name(),
            major: cff.header.major,
            minor: cff.header.minor,
            off_size: cff.header.off_size,
            is_cid: cff.is_cid(),
            glyphs: cff.num_glyphs(),
            charstring_bytes: cff.charstrings.data_len(),
            global_subrs: cff.global_subrs.len(),
            local_subrs: cff.fonts.iter().map(|f| f.local_subrs.len()).sum(),
            font_dicts: cff.fonts.len(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct FontReport {
    pub sfnt_version: u32,
    pub size: usize,
    pub tables: Vec<TableRecord>,
    pub cff: Option<CffSummary>,
}

impl FontReport {
    pub fn from_font(data: &[u8]) -> Result<Self> {
        let sfnt = SfntFile::parse(data).context("Failed to parse font")?;
        let cff = sfnt
            .table(Tag::new(b"CFF "))
            .map(CffSummary::from_table)
            .transpose()
            .context("Failed to parse CFF table")?;
        Ok(Self {
            sfnt_version: sfnt.sfnt_version(),
            size: data.len(),
            tables: sfnt.records().to_vec(),
            cff,
        })
    }
}

impl fmt::Display for FontReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "sfnt version {:#010x}, {} tables, {} bytes", self.sfnt_version, self.tables.len(), self.size)?;
        writeln!(f, "{:<6} {:>10} {:>10} {:>10}", "tag", "checksum", "offset", "length")?;
        for record in &self.tables {
            writeln!(
                f,
                "{:<6} {:>#10x} {:>10} {:>10}",
                record.tag.to_string(),
                record.checksum,
                record.offset,
                record.length
            )?;
        }
        if let Some(cff) = &self.cff {
            writeln!(f)?;
            writeln!(
                f,
                "CFF {}.{} '{}' offSize {}{}",
                cff.major,
                cff.minor,
                cff.name.as_deref().unwrap_or(""),
                cff.off_size,
                if cff.is_cid { ", CID-keyed" } else { "" }
            )?;
            writeln!(f, "  CharStrings: {} glyphs, {} bytes", cff.glyphs, cff.charstring_bytes)?;
            writeln!(f, "  Global Subrs: {}", cff.global_subrs)?;
            write!(f, "  Local Subrs: {} across {} Font DICTs", cff.local_subrs, cff.font_dicts)?;
        }
        Ok(())
    }
}
