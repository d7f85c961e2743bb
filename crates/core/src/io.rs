//! Font file reading, writing and discovery.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use fontflat_subsetter::sfnt;
use glob::glob;

/// The container flavor named by the first four bytes of a font file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SfntFlavor {
    TrueType,
    Cff,
    Collection,
}

impl SfntFlavor {
    pub fn sniff(data: &[u8]) -> Option<Self> {
        let magic = u32::from_be_bytes(data.get(..4)?.try_into().ok()?);
        match magic {
            sfnt::TRUETYPE | sfnt::APPLE_TRUETYPE => Some(Self::TrueType),
            sfnt::CFF => Some(Self::Cff),
            sfnt::COLLECTION => Some(Self::Collection),
            _ => None,
        }
    }
}

/// A font on disk.
#[derive(Debug, Clone)]
pub struct FontFile {
    path: PathBuf,
}

impl FontFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file, failing early when it is not an SFNT container.
    pub fn read(&self) -> Result<Vec<u8>> {
        let data = fs::read(&self.path)
            .with_context(|| format!("Failed to read font: {}", self.path.display()))?;
        if SfntFlavor::sniff(&data).is_none() {
            bail!("{} is not an OpenType font", self.path.display());
        }
        Ok(data)
    }

    /// Write `data`, creating missing parent directories.
    pub fn write(&self, data: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        fs::write(&self.path, data)
            .with_context(|| format!("Failed to write font: {}", self.path.display()))
    }
}

/// Files in `dir` matching `pattern`, sorted so batch logs are stable.
pub fn glob_fonts(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let pattern = dir.join(pattern);
    let pattern = pattern.to_str().context("Invalid pattern path")?;
    let mut fonts: Vec<PathBuf> = glob(pattern)
        .with_context(|| format!("Failed to glob pattern: {pattern}"))?
        .filter_map(Result::ok)
        .filter(|path| path.is_file())
        .collect();
    fonts.sort();
    Ok(fonts)
}

pub fn read_font(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    FontFile::new(path.as_ref()).read()
}

pub fn write_font(path: impl AsRef<Path>, data: &[u8]) -> Result<()> {
    FontFile::new(path.as_ref()).write(data)
}
