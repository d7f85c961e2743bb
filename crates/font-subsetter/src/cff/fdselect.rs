//! FDSelect: glyph ID to Font DICT index in CID-keyed fonts.

use crate::{Result, SubsetError, reader::Reader, writer::Writer};

pub fn decode_fd_select(data: &[u8], offset: usize, num_glyphs: usize) -> Result<Vec<u8>> {
    let mut r = Reader::at(data, offset)?;
    match r.read_u8()? {
        0 => Ok(r.read_bytes(num_glyphs)?.to_vec()),
        3 => {
            let num_ranges = r.read_u16()? as usize;
            let mut ranges = Vec::with_capacity(num_ranges);
            for _ in 0..num_ranges {
                ranges.push((r.read_u16()? as usize, r.read_u8()?));
            }
            let sentinel = r.read_u16()? as usize;

            let mut fds = vec![0u8; num_glyphs];
            for (i, &(first, fd)) in ranges.iter().enumerate() {
                let end = ranges.get(i + 1).map_or(sentinel, |(next, _)| *next);
                if end < first {
                    return Err(SubsetError::MalformedDict("FDSelect ranges out of order".into()));
                }
                for slot in fds.iter_mut().take(end).skip(first) {
                    *slot = fd;
                }
            }
            Ok(fds)
        }
        format => Err(SubsetError::UnsupportedFeature(format!("FDSelect format {format}"))),
    }
}

/// Encode in format 0 or 3, whichever is smaller.
pub fn encode_fd_select(fds: &[u8]) -> Vec<u8> {
    let mut runs: Vec<(u16, u8)> = Vec::new();
    for (gid, &fd) in fds.iter().enumerate() {
        if runs.last().is_none_or(|(_, last)| *last != fd) {
            runs.push((gid as u16, fd));
        }
    }

    let mut w = Writer::new();
    if fds.len() <= 4 + runs.len() * 3 {
        w.write_u8(0);
        w.write_bytes(fds);
    } else {
        w.write_u8(3);
        w.write_u16(runs.len() as u16);
        for (first, fd) in runs {
            w.write_u16(first);
            w.write_u8(fd);
        }
        w.write_u16(fds.len() as u16);
    }
    w.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format3_round_trip() {
        let fds: Vec<u8> = [vec![0u8; 40], vec![2u8; 30], vec![1u8; 10]].concat();
        let encoded = encode_fd_select(&fds);
        assert_eq!(encoded[0], 3);
        assert_eq!(decode_fd_select(&encoded, 0, fds.len()).unwrap(), fds);
    }

    #[test]
    fn test_format0_for_fragmented() {
        let fds = [0u8, 1, 0, 1, 0];
        let encoded = encode_fd_select(&fds);
        assert_eq!(encoded[0], 0);
        assert_eq!(decode_fd_select(&encoded, 0, fds.len()).unwrap(), fds);
    }

    #[test]
    fn test_unknown_format() {
        assert!(decode_fd_select(&[4, 0], 0, 1).is_err());
    }
}
