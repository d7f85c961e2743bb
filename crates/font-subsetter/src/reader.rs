//! Bounds-checked big-endian cursor over a byte slice.

use read_fonts::types::Tag;

use crate::{Result, SubsetError};

/// Every read either advances the cursor or fails with `TruncatedData`
/// and leaves it where it was.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Create a reader positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Create a reader positioned at `pos`.
    pub fn at(data: &'a [u8], pos: usize) -> Result<Self> {
        let mut r = Self::new(data);
        r.seek(pos)?;
        Ok(r)
    }

    /// The whole underlying buffer, independent of the cursor.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Cursor offset from the start of the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left after the cursor.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// True once the cursor has reached the end.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Move the cursor; seeking to the very end is allowed.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(SubsetError::TruncatedData {
                offset: pos,
                needed: 0,
                available: 0,
            });
        }
        self.pos = pos;
        Ok(())
    }

    /// Advance past `n` bytes.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.read_bytes(n).map(|_| ())
    }

    /// Borrow the next `n` bytes from the buffer.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|end| *end <= self.data.len()).ok_or(
            SubsetError::TruncatedData {
                offset: self.pos,
                needed: n,
                available: self.remaining(),
            },
        )?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// The next byte without advancing, `None` at the end.
    pub fn peek_u8(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    /// Read one byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Read a big-endian u16.
    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    /// Read a big-endian i16, e.g. an FWORD.
    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_be_bytes(self.read_array()?))
    }

    /// Read a big-endian 24-bit value into the low bytes of a u32.
    pub fn read_u24(&mut self) -> Result<u32> {
        let [a, b, c] = self.read_array()?;
        Ok(u32::from_be_bytes([0, a, b, c]))
    }

    /// Read a big-endian u32.
    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    /// Read a big-endian i32.
    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.read_array()?))
    }

    /// Read an unsigned offset of 1 to 4 bytes.
    pub fn read_offset(&mut self, width: u8) -> Result<u32> {
        match width {
            1 => self.read_u8().map(u32::from),
            2 => self.read_u16().map(u32::from),
            3 => self.read_u24(),
            4 => self.read_u32(),
            _ => Err(SubsetError::MalformedIndex {
                offset: self.pos,
                reason: "offset size must be between 1 and 4",
            }),
        }
    }

    /// Read a four-byte table or layout tag.
    pub fn read_tag(&mut self) -> Result<Tag> {
        Ok(Tag::new(&self.read_array()?))
    }

    /// Read `count` big-endian u16 values.
    pub fn read_u16_array(&mut self, count: usize) -> Result<Vec<u16>> {
        (0..count).map(|_| self.read_u16()).collect()
    }
}

/// The big-endian u16 at `offset` in `data`.
pub fn u16_at(data: &[u8], offset: usize) -> Result<u16> {
    Reader::at(data, offset)?.read_u16()
}

/// The big-endian u32 at `offset` in `data`.
pub fn u32_at(data: &[u8], offset: usize) -> Result<u32> {
    Reader::at(data, offset)?.read_u32()
}
