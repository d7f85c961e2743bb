//! CFF INDEX: count, offSize, 1-based offset array, concatenated data.

use crate::{Result, SubsetError, reader::Reader, writer::Writer};

/// A decoded INDEX borrowing its items from the source buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Index<'a> {
    items: Vec<&'a [u8]>,
}

impl<'a> Index<'a> {
    /// Decode the INDEX at `pos`, returning it with the position just past it.
    pub fn decode(data: &'a [u8], pos: usize) -> Result<(Self, usize)> {
        let mut r = Reader::at(data, pos)?;
        let count = r.read_u16()? as usize;
        if count == 0 {
            return Ok((Self::default(), pos + 2));
        }

        let off_size = r.read_u8()?;
        if !(1..=4).contains(&off_size) {
            return Err(SubsetError::MalformedIndex {
                offset: pos,
                reason: "offSize must be between 1 and 4",
            });
        }

        let offsets = (0..=count)
            .map(|_| r.read_offset(off_size).map(|o| o as usize))
            .collect::<Result<Vec<_>>>()?;
        if offsets[0] < 1 {
            return Err(SubsetError::MalformedIndex { offset: pos, reason: "offset below 1" });
        }
        if offsets.windows(2).any(|w| w[1] < w[0]) {
            return Err(SubsetError::MalformedIndex { offset: pos, reason: "decreasing offsets" });
        }

        let data_start = pos + 3 + (count + 1) * off_size as usize;
        let end = data_start + offsets[count] - 1;
        if end > data.len() {
            return Err(SubsetError::TruncatedData {
                offset: data_start,
                needed: offsets[count] - 1,
                available: data.len().saturating_sub(data_start),
            });
        }

        let items = offsets
            .windows(2)
            .map(|w| &data[data_start + w[0] - 1..data_start + w[1] - 1])
            .collect();
        Ok((Self { items }, end))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&'a [u8]> {
        self.items.get(index).copied()
    }

    pub fn items(&self) -> &[&'a [u8]] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a [u8]> + '_ {
        self.items.iter().copied()
    }

    /// Total payload size, excluding the INDEX header and offsets.
    pub fn data_len(&self) -> usize {
        self.items.iter().map(|i| i.len()).sum()
    }
}

/// Decode an INDEX into owned-by-reference items; see [`Index::decode`].
pub fn decode_index(data: &[u8], pos: usize) -> Result<(Vec<&[u8]>, usize)> {
    let (index, end) = Index::decode(data, pos)?;
    Ok((index.items, end))
}

/// Smallest offset width able to hold `max_offset`.
pub fn off_size_for(max_offset: usize) -> u8 {
    match max_offset {
        0..=0xFF => 1,
        0x100..=0xFFFF => 2,
        0x1_0000..=0xFF_FFFF => 3,
        _ => 4,
    }
}

/// Size in bytes of the encoded INDEX for items of the given lengths.
pub fn index_size(lengths: impl IntoIterator<Item = usize>) -> usize {
    let mut count = 0;
    let mut data = 0;
    for len in lengths {
        count += 1;
        data += len;
    }
    if count == 0 {
        return 2;
    }
    3 + (count + 1) * off_size_for(data + 1) as usize + data
}

pub fn write_index<T: AsRef<[u8]>>(w: &mut Writer, items: &[T]) {
    w.write_u16(items.len() as u16);
    if items.is_empty() {
        return;
    }
    let data_len: usize = items.iter().map(|i| i.as_ref().len()).sum();
    let off_size = off_size_for(data_len + 1);
    w.write_u8(off_size);

    let mut offset = 1u32;
    w.write_offset(offset, off_size);
    for item in items {
        offset += item.as_ref().len() as u32;
        w.write_offset(offset, off_size);
    }
    for item in items {
        w.write_bytes(item.as_ref());
    }
}

pub fn encode_index<T: AsRef<[u8]>>(items: &[T]) -> Vec<u8> {
    let mut w = Writer::new();
    write_index(&mut w, items);
    w.finish()
}
