//! CFF DICT decoding and encoding.
//!
//! Entries are grouped by operand schema: structural offsets (which the
//! subsetter rewrites), the Private DICT pointer, ROS, plain values copied
//! verbatim, and operators outside the known set, kept as raw bytes.

use std::fmt;

use log::debug;

use crate::{Result, SubsetError, reader::Reader, writer::Writer};

/// A DICT operator; escaped operators are stored as `0x0C00 | second byte`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Operator(pub u16);

impl Operator {
    pub const CHARSET: Operator = Operator(15);
    pub const ENCODING: Operator = Operator(16);
    pub const CHAR_STRINGS: Operator = Operator(17);
    pub const PRIVATE: Operator = Operator(18);
    pub const SUBRS: Operator = Operator(19);
    pub const DEFAULT_WIDTH_X: Operator = Operator(20);
    pub const NOMINAL_WIDTH_X: Operator = Operator(21);
    pub const ROS: Operator = Operator::escaped(30);
    pub const CID_COUNT: Operator = Operator::escaped(34);
    pub const FD_ARRAY: Operator = Operator::escaped(36);
    pub const FD_SELECT: Operator = Operator::escaped(37);

    pub const fn escaped(b1: u8) -> Self {
        Operator(0x0C00 | b1 as u16)
    }

    pub fn is_escaped(self) -> bool {
        self.0 & 0xFF00 == 0x0C00
    }

    /// Operators defined for Top, Font and Private DICTs.
    pub fn check_known(self) -> Result<Self> {
        let known = if self.is_escaped() {
            matches!(self.0 & 0xFF, 0..=14 | 17..=23 | 30..=38)
        } else {
            matches!(self.0, 0..=11 | 13..=21)
        };
        if known { Ok(self) } else { Err(SubsetError::UnknownOperator(self.0)) }
    }

    fn write(self, w: &mut Writer) {
        if self.is_escaped() {
            w.write_u8(12);
        }
        w.write_u8(self.0 as u8);
    }

    fn is_offset(self) -> bool {
        matches!(
            self,
            Operator::CHARSET
                | Operator::ENCODING
                | Operator::CHAR_STRINGS
                | Operator::SUBRS
                | Operator::FD_ARRAY
                | Operator::FD_SELECT
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_escaped() { write!(f, "12 {}", self.0 & 0xFF) } else { write!(f, "{}", self.0) }
    }
}

/// A DICT operand. Reals keep their nibble bytes for lossless re-encoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operand<'a> {
    Int(i32),
    Real(&'a [u8]),
}

impl Operand<'_> {
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Operand::Int(v) => Some(*v),
            Operand::Real(_) => None,
        }
    }

    fn write(&self, w: &mut Writer) {
        match self {
            Operand::Int(v) => write_int(w, *v),
            Operand::Real(nibbles) => {
                w.write_u8(30);
                w.write_bytes(nibbles);
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Entry<'a> {
    /// Structural pointer: charset, custom Encoding, CharStrings, Subrs,
    /// FDArray or FDSelect.
    Offset { op: Operator, offset: usize },
    Private { size: usize, offset: usize },
    Ros { registry: i32, ordering: i32, supplement: Operand<'a> },
    Value { op: Operator, operands: Vec<Operand<'a>> },
    Unknown { op: Operator, raw: &'a [u8] },
}

impl Entry<'_> {
    pub fn operator(&self) -> Operator {
        match self {
            Entry::Offset { op, .. } | Entry::Value { op, .. } | Entry::Unknown { op, .. } => *op,
            Entry::Private { .. } => Operator::PRIVATE,
            Entry::Ros { .. } => Operator::ROS,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Dict<'a> {
    entries: Vec<Entry<'a>>,
}

impl<'a> Dict<'a> {
    pub fn decode(data: &'a [u8]) -> Result<Self> {
        let mut r = Reader::new(data);
        let mut entries = Vec::new();
        let mut operands = Vec::new();
        let mut entry_start = 0;

        while !r.is_empty() {
            let b0 = r.read_u8()?;
            let op = match b0 {
                0..=11 | 13..=27 | 31 => Operator(b0 as u16),
                12 => Operator::escaped(r.read_u8()?),
                255 => {
                    return Err(SubsetError::MalformedDict(format!("reserved byte {b0}")));
                }
                28 => {
                    operands.push(Operand::Int(r.read_i16()? as i32));
                    continue;
                }
                29 => {
                    operands.push(Operand::Int(r.read_i32()?));
                    continue;
                }
                30 => {
                    operands.push(Operand::Real(read_real(&mut r)?));
                    continue;
                }
                32..=246 => {
                    operands.push(Operand::Int(b0 as i32 - 139));
                    continue;
                }
                247..=250 => {
                    let b1 = r.read_u8()? as i32;
                    operands.push(Operand::Int((b0 as i32 - 247) * 256 + b1 + 108));
                    continue;
                }
                251..=254 => {
                    let b1 = r.read_u8()? as i32;
                    operands.push(Operand::Int(-(b0 as i32 - 251) * 256 - b1 - 108));
                    continue;
                }
            };

            let raw = &data[entry_start..r.position()];
            entry_start = r.position();
            let entry = match op.check_known() {
                Ok(op) => Self::typed_entry(op, std::mem::take(&mut operands))?,
                Err(err) => {
                    debug!("Keeping {err} as raw bytes");
                    operands.clear();
                    Entry::Unknown { op, raw }
                }
            };
            entries.push(entry);
        }

        if !operands.is_empty() {
            return Err(SubsetError::MalformedDict("operands without an operator".into()));
        }
        Ok(Self { entries })
    }

    fn typed_entry(op: Operator, operands: Vec<Operand<'a>>) -> Result<Entry<'a>> {
        let int = |operand: &Operand| {
            operand.as_int().ok_or_else(|| {
                SubsetError::MalformedDict(format!("operator {op} expects integer operands"))
            })
        };
        let offset = |operand: &Operand| {
            let v = int(operand)?;
            usize::try_from(v)
                .map_err(|_| SubsetError::MalformedDict(format!("negative offset for {op}")))
        };
        let arity = |n: usize| {
            if operands.len() == n {
                Ok(())
            } else {
                Err(SubsetError::MalformedDict(format!(
                    "operator {op} takes {n} operands, found {}",
                    operands.len()
                )))
            }
        };

        Ok(match op {
            Operator::PRIVATE => {
                arity(2)?;
                Entry::Private { size: offset(&operands[0])?, offset: offset(&operands[1])? }
            }
            Operator::ROS => {
                arity(3)?;
                Entry::Ros {
                    registry: int(&operands[0])?,
                    ordering: int(&operands[1])?,
                    supplement: operands[2].clone(),
                }
            }
            // Encoding 0 and 1 name predefined encodings, not offsets.
            Operator::ENCODING if matches!(operands.as_slice(), [Operand::Int(0 | 1)]) => {
                Entry::Value { op, operands }
            }
            op if op.is_offset() => {
                arity(1)?;
                Entry::Offset { op, offset: offset(&operands[0])? }
            }
            op => Entry::Value { op, operands },
        })
    }

    pub fn entries(&self) -> &[Entry<'a>] {
        &self.entries
    }

    pub fn get(&self, op: Operator) -> Option<&Entry<'a>> {
        self.entries.iter().find(|e| e.operator() == op)
    }

    pub fn offset(&self, op: Operator) -> Option<usize> {
        match self.get(op)? {
            Entry::Offset { offset, .. } => Some(*offset),
            _ => None,
        }
    }

    pub fn private(&self) -> Option<(usize, usize)> {
        match self.get(Operator::PRIVATE)? {
            Entry::Private { size, offset } => Some((*size, *offset)),
            _ => None,
        }
    }

    pub fn is_cid(&self) -> bool {
        self.get(Operator::ROS).is_some()
    }

    pub fn remove(&mut self, op: Operator) {
        self.entries.retain(|e| e.operator() != op);
    }

    /// Set a structural offset, appending the entry if it is missing.
    pub fn set_offset(&mut self, op: Operator, value: usize) {
        match self.entries.iter_mut().find(|e| e.operator() == op) {
            Some(Entry::Offset { offset, .. }) => *offset = value,
            Some(other) => *other = Entry::Offset { op, offset: value },
            None => self.entries.push(Entry::Offset { op, offset: value }),
        }
    }

    pub fn set_private(&mut self, size: usize, offset: usize) {
        let entry = Entry::Private { size, offset };
        match self.entries.iter_mut().find(|e| e.operator() == Operator::PRIVATE) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn set_value(&mut self, op: Operator, operands: Vec<Operand<'a>>) {
        let entry = Entry::Value { op, operands };
        match self.entries.iter_mut().find(|e| e.operator() == op) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// Encode the DICT. Offsets always use the 5-byte integer form, so the
    /// encoded size does not depend on their values.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        // ROS must come first in a CID-keyed Top DICT.
        let ros = self.entries.iter().filter(|e| matches!(e, Entry::Ros { .. }));
        let rest = self.entries.iter().filter(|e| !matches!(e, Entry::Ros { .. }));
        for entry in ros.chain(rest) {
            match entry {
                Entry::Offset { op, offset } => {
                    write_fixed_int(&mut w, *offset as i32);
                    op.write(&mut w);
                }
                Entry::Private { size, offset } => {
                    write_fixed_int(&mut w, *size as i32);
                    write_fixed_int(&mut w, *offset as i32);
                    Operator::PRIVATE.write(&mut w);
                }
                Entry::Ros { registry, ordering, supplement } => {
                    write_int(&mut w, *registry);
                    write_int(&mut w, *ordering);
                    supplement.write(&mut w);
                    Operator::ROS.write(&mut w);
                }
                Entry::Value { op, operands } => {
                    for operand in operands {
                        operand.write(&mut w);
                    }
                    op.write(&mut w);
                }
                Entry::Unknown { raw, .. } => w.write_bytes(raw),
            }
        }
        w.finish()
    }
}

fn read_real<'a>(r: &mut Reader<'a>) -> Result<&'a [u8]> {
    let start = r.position();
    loop {
        let b = r.read_u8()?;
        if b & 0x0F == 0x0F || b & 0xF0 == 0xF0 {
            break;
        }
    }
    let end = r.position();
    Ok(&r.data()[start..end])
}

/// Shortest DICT integer encoding.
pub fn write_int(w: &mut Writer, v: i32) {
    match v {
        -107..=107 => w.write_u8((v + 139) as u8),
        108..=1131 => {
            let v = v - 108;
            w.write_u8((v >> 8) as u8 + 247);
            w.write_u8(v as u8);
        }
        -1131..=-108 => {
            let v = -v - 108;
            w.write_u8((v >> 8) as u8 + 251);
            w.write_u8(v as u8);
        }
        -32768..=32767 => {
            w.write_u8(28);
            w.write_i16(v as i16);
        }
        _ => write_fixed_int(w, v),
    }
}

pub fn write_fixed_int(w: &mut Writer, v: i32) {
    w.write_u8(29);
    w.write_u32(v as u32);
}
