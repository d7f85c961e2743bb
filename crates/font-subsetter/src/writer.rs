//! Growable big-endian byte sink with placeholder patching.
//!
//! Offsets that point forward are written in two passes: [`Writer::reserve_u16`]
//! (or `_u32`) records where the value goes, and the matching `patch_*` call
//! fills it in once the target position is known.

use read_fonts::types::Tag;

use crate::{Result, SubsetError};

#[derive(Debug, Default, Clone)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty writer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { buf: Vec::with_capacity(capacity) }
    }

    /// Bytes written so far, which is also the position of the next write.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Append one byte.
    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    /// Append a big-endian u16.
    pub fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Append a big-endian i16.
    pub fn write_i16(&mut self, v: i16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Append the low three bytes of `v`, big-endian.
    pub fn write_u24(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes()[1..]);
    }

    /// Append a big-endian u32.
    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Write the low `width` bytes of `v`.
    pub fn write_offset(&mut self, v: u32, width: u8) {
        let bytes = v.to_be_bytes();
        self.buf.extend_from_slice(&bytes[4 - width as usize..]);
    }

    /// Append raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Append a four-byte tag.
    pub fn write_tag(&mut self, tag: Tag) {
        self.buf.extend_from_slice(&tag.to_be_bytes());
    }

    /// Write a zero u16 placeholder and return its position for
    /// [`Writer::patch_u16`].
    pub fn reserve_u16(&mut self) -> usize {
        let at = self.buf.len();
        self.write_u16(0);
        at
    }

    /// Write a zero u32 placeholder and return its position for
    /// [`Writer::patch_u32`].
    pub fn reserve_u32(&mut self) -> usize {
        let at = self.buf.len();
        self.write_u32(0);
        at
    }

    /// Overwrite the u16 at `at`, which must already have been written.
    pub fn patch_u16(&mut self, at: usize, v: u16) {
        self.buf[at..at + 2].copy_from_slice(&v.to_be_bytes());
    }

    /// Overwrite the u32 at `at`, which must already have been written.
    pub fn patch_u32(&mut self, at: usize, v: u32) {
        self.buf[at..at + 4].copy_from_slice(&v.to_be_bytes());
    }

    /// Patch a 16-bit offset placeholder with `target - base`.
    ///
    /// Fails when the target lies before `base` or more than 0xFFFF bytes
    /// after it.
    pub fn patch_offset16(&mut self, at: usize, base: usize, target: usize) -> Result<()> {
        let offset = target
            .checked_sub(base)
            .and_then(|delta| u16::try_from(delta).ok())
            .ok_or_else(|| {
                SubsetError::Write(format!("offset from {base} to {target} does not fit 16 bits"))
            })?;
        self.patch_u16(at, offset);
        Ok(())
    }

    /// Pad with zeros to a multiple of `n`.
    pub fn align(&mut self, n: usize) {
        while self.buf.len() % n != 0 {
            self.buf.push(0);
        }
    }

    /// Everything written so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the writer and return its bytes.
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}
