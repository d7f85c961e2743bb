//! SFNT container: offset table and table directory.

use read_fonts::types::Tag;

use crate::{Result, SubsetError, reader::Reader};

pub const TRUETYPE: u32 = 0x0001_0000;
pub const CFF: u32 = u32::from_be_bytes(*b"OTTO");
pub const APPLE_TRUETYPE: u32 = u32::from_be_bytes(*b"true");
pub const COLLECTION: u32 = u32::from_be_bytes(*b"ttcf");

pub const HEAD: Tag = Tag::new(b"head");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableRecord {
    pub tag: Tag,
    pub checksum: u32,
    pub offset: u32,
    pub length: u32,
}

/// A parsed font file borrowing its input buffer.
#[derive(Debug, Clone)]
pub struct SfntFile<'a> {
    data: &'a [u8],
    sfnt_version: u32,
    records: Vec<TableRecord>,
}

impl<'a> SfntFile<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let mut r = Reader::new(data);
        let sfnt_version = r.read_u32()?;
        match sfnt_version {
            TRUETYPE | CFF | APPLE_TRUETYPE => {}
            COLLECTION => {
                return Err(SubsetError::UnsupportedFeature(
                    "font collections must be split before subsetting".into(),
                ));
            }
            other => {
                return Err(SubsetError::malformed(
                    "sfnt",
                    format!("unknown sfnt version {other:#010x}"),
                ));
            }
        }

        let num_tables = r.read_u16()?;
        r.skip(6)?;

        let mut records = Vec::with_capacity(num_tables as usize);
        for _ in 0..num_tables {
            let record = TableRecord {
                tag: r.read_tag()?,
                checksum: r.read_u32()?,
                offset: r.read_u32()?,
                length: r.read_u32()?,
            };
            let end = record.offset as usize + record.length as usize;
            if end > data.len() {
                return Err(SubsetError::TruncatedData {
                    offset: record.offset as usize,
                    needed: record.length as usize,
                    available: data.len().saturating_sub(record.offset as usize),
                });
            }
            records.push(record);
        }

        Ok(Self { data, sfnt_version, records })
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn sfnt_version(&self) -> u32 {
        self.sfnt_version
    }

    /// Directory entries in file order.
    pub fn records(&self) -> &[TableRecord] {
        &self.records
    }

    pub fn tags(&self) -> impl Iterator<Item = Tag> + '_ {
        self.records.iter().map(|r| r.tag)
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.records.iter().any(|r| r.tag == tag)
    }

    pub fn table(&self, tag: Tag) -> Option<&'a [u8]> {
        let record = self.records.iter().find(|r| r.tag == tag)?;
        let start = record.offset as usize;
        self.data.get(start..start + record.length as usize)
    }

    pub fn expect_table(&self, tag: Tag) -> Result<&'a [u8]> {
        self.table(tag).ok_or(SubsetError::MissingTable(tag))
    }
}

/// Wrapping sum of big-endian u32 words, zero-padding the tail.
pub fn checksum(data: &[u8]) -> u32 {
    data.chunks(4).fold(0u32, |sum, chunk| {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        sum.wrapping_add(u32::from_be_bytes(word))
    })
}
