//! CFF (version 1) outlines: parsing and subsetting.
//!
//! Both name-keyed and CID-keyed fonts are handled. For a CID-keyed font
//! every glyph resolves to a Font DICT through FDSelect, and each Font DICT
//! carries its own Private DICT and local subroutines.

pub mod charset;
pub mod charstring;
pub mod dict;
pub mod fdselect;
pub mod index;
mod subset;

pub use subset::subset_cff;

use crate::{
    Result, SubsetError,
    cff::{
        charset::decode_charset,
        charstring::SubrSet,
        dict::{Dict, Operator},
        fdselect::decode_fd_select,
        index::Index,
    },
    reader::Reader,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub major: u8,
    pub minor: u8,
    pub hdr_size: u8,
    pub off_size: u8,
}

/// A Private DICT with its local subroutines, plus the Font DICT that
/// points at it in CID-keyed fonts.
#[derive(Debug, Clone, Default)]
pub struct PrivateFont<'a> {
    pub font_dict: Option<Dict<'a>>,
    pub private: Option<Dict<'a>>,
    pub local_subrs: Index<'a>,
}

#[derive(Debug, Clone)]
pub struct Cff<'a> {
    pub header: Header,
    pub names: Index<'a>,
    pub top_dicts: Index<'a>,
    pub strings: Index<'a>,
    pub global_subrs: Index<'a>,
    pub top: Dict<'a>,
    pub charstrings: Index<'a>,
    /// SID (or CID) per glyph.
    pub charset: Vec<u16>,
    /// Font DICT index per glyph; `None` for name-keyed fonts.
    pub fd_select: Option<Vec<u8>>,
    /// One entry for name-keyed fonts, one per FDArray entry otherwise.
    pub fonts: Vec<PrivateFont<'a>>,
}

impl<'a> Cff<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let mut r = Reader::new(data);
        let header = Header {
            major: r.read_u8()?,
            minor: r.read_u8()?,
            hdr_size: r.read_u8()?,
            off_size: r.read_u8()?,
        };
        if header.major != 1 {
            return Err(SubsetError::UnsupportedFeature(format!(
                "CFF major version {}",
                header.major
            )));
        }

        let (names, pos) = Index::decode(data, header.hdr_size as usize)?;
        let (top_dicts, pos) = Index::decode(data, pos)?;
        let (strings, pos) = Index::decode(data, pos)?;
        let (global_subrs, _) = Index::decode(data, pos)?;

        let top_data = top_dicts
            .get(0)
            .ok_or_else(|| SubsetError::MalformedDict("empty Top DICT INDEX".into()))?;
        let top = Dict::decode(top_data)?;

        let charstrings_offset = top
            .offset(Operator::CHAR_STRINGS)
            .ok_or_else(|| SubsetError::MalformedDict("Top DICT has no CharStrings".into()))?;
        let (charstrings, _) = Index::decode(data, charstrings_offset)?;
        let num_glyphs = charstrings.len();

        let charset = decode_charset(data, top.offset(Operator::CHARSET).unwrap_or(0), num_glyphs)?;

        let (fd_select, fonts) = if top.is_cid() {
            let fd_array_offset = top
                .offset(Operator::FD_ARRAY)
                .ok_or_else(|| SubsetError::MalformedDict("CID font without FDArray".into()))?;
            let fd_select_offset = top
                .offset(Operator::FD_SELECT)
                .ok_or_else(|| SubsetError::MalformedDict("CID font without FDSelect".into()))?;

            let (fd_array, _) = Index::decode(data, fd_array_offset)?;
            let fonts = fd_array
                .iter()
                .map(|font_dict| {
                    let font_dict = Dict::decode(font_dict)?;
                    let mut font = parse_private(data, &font_dict)?;
                    font.font_dict = Some(font_dict);
                    Ok(font)
                })
                .collect::<Result<Vec<_>>>()?;

            let fd_select = decode_fd_select(data, fd_select_offset, num_glyphs)?;
            if let Some(bad) = fd_select.iter().find(|fd| **fd as usize >= fonts.len()) {
                return Err(SubsetError::MalformedDict(format!(
                    "FDSelect references Font DICT {bad} of {}",
                    fonts.len()
                )));
            }
            (Some(fd_select), fonts)
        } else {
            (None, vec![parse_private(data, &top)?])
        };

        Ok(Self {
            header,
            names,
            top_dicts,
            strings,
            global_subrs,
            top,
            charstrings,
            charset,
            fd_select,
            fonts,
        })
    }

    pub fn is_cid(&self) -> bool {
        self.fd_select.is_some()
    }

    pub fn num_glyphs(&self) -> usize {
        self.charstrings.len()
    }

    pub fn fd_for(&self, gid: u16) -> usize {
        self.fd_select
            .as_ref()
            .and_then(|fds| fds.get(gid as usize))
            .map_or(0, |fd| *fd as usize)
    }

    pub fn subrs_for(&self, gid: u16) -> SubrSet<'a, '_> {
        let fd = self.fd_for(gid);
        SubrSet { global: &self.global_subrs, local: &self.fonts[fd].local_subrs, fd }
    }

    /// The first font name, lossily decoded.
    pub fn font_name(&self) -> Option<String> {
        self.names.get(0).map(|n| String::from_utf8_lossy(n).into_owned())
    }
}

fn parse_private<'a>(data: &'a [u8], parent: &Dict<'a>) -> Result<PrivateFont<'a>> {
    let Some((size, offset)) = parent.private() else {
        return Ok(PrivateFont::default());
    };
    let bytes = data.get(offset..offset + size).ok_or(SubsetError::TruncatedData {
        offset,
        needed: size,
        available: data.len().saturating_sub(offset),
    })?;
    let private = Dict::decode(bytes)?;
    let local_subrs = match private.offset(Operator::SUBRS) {
        Some(subrs) => Index::decode(data, offset + subrs)?.0,
        None => Index::default(),
    };
    Ok(PrivateFont { font_dict: None, private: Some(private), local_subrs })
}
