use std::result;

use read_fonts::{ReadError, types::Tag};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SubsetError {
    #[error("truncated data at offset {offset}: needed {needed} bytes, {available} available")]
    TruncatedData { offset: usize, needed: usize, available: usize },

    #[error("malformed INDEX at offset {offset}: {reason}")]
    MalformedIndex { offset: usize, reason: &'static str },

    #[error("malformed DICT: {0}")]
    MalformedDict(String),

    #[error("unknown DICT operator {0}")]
    UnknownOperator(u16),

    #[error("subroutine nesting deeper than {limit} levels in glyph {glyph}")]
    SubroutineCycle { glyph: u16, limit: usize },

    #[error("unsupported: {0}")]
    UnsupportedFeature(String),

    #[error("malformed '{table}' table: {reason}")]
    MalformedTable { table: &'static str, reason: String },

    #[error("invalid charstring for glyph {glyph}: {reason}")]
    InvalidCharString { glyph: u16, reason: String },

    #[error("required table '{0}' not found")]
    MissingTable(Tag),

    #[error("invalid tag '{0}'")]
    InvalidTag(String),

    #[error("failed to read font: {0}")]
    Read(#[from] ReadError),

    #[error("failed to write table: {0}")]
    Write(String),
}

impl SubsetError {
    pub(crate) fn malformed(table: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedTable { table, reason: reason.into() }
    }

    /// Whether best-effort mode may drop the offending table and carry on.
    ///
    /// Truncation and runaway subroutine nesting are never recoverable: both
    /// mean the outlines themselves cannot be trusted.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MalformedIndex { .. }
                | Self::MalformedDict(_)
                | Self::MalformedTable { .. }
                | Self::UnsupportedFeature(_)
        )
    }
}

pub type Result<T> = result::Result<T, SubsetError>;
