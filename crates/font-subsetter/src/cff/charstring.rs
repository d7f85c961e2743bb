//! Type 2 charstring walking.
//!
//! One interpreter serves three passes over a glyph program:
//!
//! 1. [`collect_calls`] records every subroutine a glyph reaches and where
//!    each call's index operand sits, so kept subroutines can be renumbered.
//! 2. [`renumber_calls`] rewrites those operands against a new subroutine
//!    numbering and bias.
//! 3. [`desubroutinize`] inlines every call, producing a program with no
//!    `callsubr`/`callgsubr` left in it.
//!
//! Only the operand stack shape is tracked, never coordinates. That is
//! enough to count stem hints (which fixes the length of `hintmask` data)
//! and to find the literal that supplies each subroutine index, even when a
//! subroutine pushed it and returned. An index produced by arithmetic
//! operators has no literal and is rejected as `InvalidCharString`.

use std::collections::{BTreeMap, BTreeSet};

use crate::{Result, SubsetError, cff::index::Index, reader::Reader, writer::Writer};

/// Type 2 nesting limit for subroutine calls.
pub const MAX_SUBR_DEPTH: usize = 10;

/// Upper bound on interpreted tokens per glyph, inlined calls included.
const MAX_STEPS: usize = 1 << 20;

const HSTEM: u8 = 1;
const VSTEM: u8 = 3;
const CALLSUBR: u8 = 10;
const RETURN: u8 = 11;
const ESCAPE: u8 = 12;
const ENDCHAR: u8 = 14;
const HSTEMHM: u8 = 18;
const HINTMASK: u8 = 19;
const CNTRMASK: u8 = 20;
const VSTEMHM: u8 = 23;
const SHORTINT: u8 = 28;
const CALLGSUBR: u8 = 29;
const FIXED: u8 = 255;

/// Bias added to a call operand to get the subroutine index.
pub fn subr_bias(count: usize) -> i32 {
    if count < 1240 {
        107
    } else if count < 33900 {
        1131
    } else {
        32768
    }
}

/// A charstring program: a glyph or a subroutine.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Program {
    Glyph(u16),
    Global(usize),
    Local { fd: usize, index: usize },
}

/// A subroutine reachable from some glyph. Local subroutines are qualified
/// by the Font DICT whose Private DICT owns them.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubrRef {
    Global(usize),
    Local { fd: usize, index: usize },
}

impl From<SubrRef> for Program {
    fn from(subr: SubrRef) -> Self {
        match subr {
            SubrRef::Global(index) => Program::Global(index),
            SubrRef::Local { fd, index } => Program::Local { fd, index },
        }
    }
}

/// Subroutines visible to a glyph.
#[derive(Debug, Clone, Copy)]
pub struct SubrSet<'a, 'b> {
    pub global: &'b Index<'a>,
    pub local: &'b Index<'a>,
    pub fd: usize,
}

/// The literal index operand of one call, located in the program that
/// pushed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    pub end: usize,
    /// A global subroutine calling `callsubr` reaches a different local
    /// subroutine for each Font DICT it is used from.
    pub callees: BTreeSet<SubrRef>,
    /// False once the literal fed a call made from another program.
    pub in_caller: bool,
}

#[derive(Debug, Default, Clone)]
pub struct CallGraph {
    pub used: BTreeSet<SubrRef>,
    /// Call sites per program, keyed by operand start offset.
    pub sites: BTreeMap<Program, BTreeMap<usize, CallSite>>,
}

impl CallGraph {
    pub fn used_global(&self) -> impl Iterator<Item = usize> + '_ {
        self.used.iter().filter_map(|s| match s {
            SubrRef::Global(i) => Some(*i),
            SubrRef::Local { .. } => None,
        })
    }

    pub fn used_local(&self, fd: usize) -> impl Iterator<Item = usize> + '_ {
        self.used.iter().filter_map(move |s| match s {
            SubrRef::Local { fd: f, index } if *f == fd => Some(*index),
            _ => None,
        })
    }

    /// Whether every call operand can be rewritten in place under
    /// `operand_for`.
    ///
    /// Fails when one literal must name callees that renumber differently,
    /// or when a subroutine leaves the index for its caller to use: that
    /// literal may serve as a plain number elsewhere.
    pub fn can_renumber(&self, operand_for: impl Fn(SubrRef) -> Option<i32>) -> bool {
        self.sites.values().flat_map(BTreeMap::values).all(|site| {
            let mut operands = site.callees.iter().map(|c| operand_for(*c));
            let first = operands.next().flatten();
            site.in_caller && operands.all(|other| other == first)
        })
    }
}

#[derive(Copy, Clone, Debug)]
struct Literal {
    program: Program,
    start: usize,
    end: usize,
    out_pos: usize,
}

#[derive(Copy, Clone, Debug)]
struct StackItem {
    value: Option<i32>,
    literal: Option<Literal>,
}

impl StackItem {
    const COMPUTED: StackItem = StackItem { value: None, literal: None };
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Return,
    EndChar,
}

struct Walker<'a, 'b, 'g> {
    subrs: SubrSet<'a, 'b>,
    glyph: u16,
    stack: Vec<StackItem>,
    stems: usize,
    steps: usize,
    graph: Option<&'g mut CallGraph>,
    out: Option<Vec<u8>>,
}

impl<'a> Walker<'a, '_, '_> {
    fn invalid(&self, reason: impl Into<String>) -> SubsetError {
        SubsetError::InvalidCharString { glyph: self.glyph, reason: reason.into() }
    }

    fn emit(&mut self, bytes: &[u8]) {
        if let Some(out) = self.out.as_mut() {
            out.extend_from_slice(bytes);
        }
    }

    fn push_literal(&mut self, value: i32, program: Program, bytes: &[u8], start: usize) {
        let out_pos = self.out.as_ref().map_or(0, Vec::len);
        self.stack.push(StackItem {
            value: Some(value),
            literal: Some(Literal { program, start, end: start + bytes.len(), out_pos }),
        });
        self.emit(bytes);
    }

    fn run(&mut self, code: &'a [u8], program: Program, depth: usize) -> Result<Flow> {
        let mut r = Reader::new(code);
        while !r.is_empty() {
            self.steps += 1;
            if self.steps > MAX_STEPS {
                return Err(self.invalid("charstring expands beyond the interpreter budget"));
            }

            let start = r.position();
            let b0 = r.read_u8()?;
            match b0 {
                SHORTINT => {
                    let v = r.read_i16()? as i32;
                    self.push_literal(v, program, &code[start..r.position()], start);
                }
                32..=246 => {
                    self.push_literal(b0 as i32 - 139, program, &code[start..r.position()], start);
                }
                247..=250 => {
                    let v = (b0 as i32 - 247) * 256 + r.read_u8()? as i32 + 108;
                    self.push_literal(v, program, &code[start..r.position()], start);
                }
                251..=254 => {
                    let v = -(b0 as i32 - 251) * 256 - r.read_u8()? as i32 - 108;
                    self.push_literal(v, program, &code[start..r.position()], start);
                }
                FIXED => {
                    r.skip(4)?;
                    self.stack.push(StackItem::COMPUTED);
                    self.emit(&code[start..r.position()]);
                }
                CALLSUBR | CALLGSUBR => {
                    if self.call(b0 == CALLGSUBR, program, depth)? == Flow::EndChar {
                        return Ok(Flow::EndChar);
                    }
                }
                RETURN => return Ok(Flow::Return),
                ENDCHAR => {
                    self.stack.clear();
                    self.emit(&code[start..r.position()]);
                    return Ok(Flow::EndChar);
                }
                HSTEM | VSTEM | HSTEMHM | VSTEMHM => {
                    self.stems += self.stack.len() / 2;
                    self.stack.clear();
                    self.emit(&code[start..r.position()]);
                }
                HINTMASK | CNTRMASK => {
                    // Operands left before the first mask are an implicit vstem.
                    self.stems += self.stack.len() / 2;
                    self.stack.clear();
                    r.skip(self.stems.div_ceil(8))?;
                    self.emit(&code[start..r.position()]);
                }
                ESCAPE => {
                    let b1 = r.read_u8()?;
                    self.escape(b1)?;
                    self.emit(&code[start..r.position()]);
                }
                _ => {
                    self.stack.clear();
                    self.emit(&code[start..r.position()]);
                }
            }
        }
        Ok(Flow::Return)
    }

    fn call(&mut self, global: bool, caller: Program, depth: usize) -> Result<Flow> {
        let item = self.stack.pop().ok_or_else(|| self.invalid("subroutine call on empty stack"))?;
        let value = item.value.ok_or_else(|| self.invalid("computed subroutine index"))?;
        let literal = item.literal.ok_or_else(|| self.invalid("computed subroutine index"))?;

        let subrs = if global { self.subrs.global } else { self.subrs.local };
        let index = usize::try_from(value + subr_bias(subrs.len()))
            .ok()
            .filter(|i| *i < subrs.len())
            .ok_or_else(|| self.invalid(format!("subroutine operand {value} out of range")))?;
        if depth + 1 > MAX_SUBR_DEPTH {
            return Err(SubsetError::SubroutineCycle { glyph: self.glyph, limit: MAX_SUBR_DEPTH });
        }

        let callee = if global {
            SubrRef::Global(index)
        } else {
            SubrRef::Local { fd: self.subrs.fd, index }
        };
        if let Some(graph) = self.graph.as_deref_mut() {
            graph.used.insert(callee);
            let site = graph
                .sites
                .entry(literal.program)
                .or_default()
                .entry(literal.start)
                .or_insert_with(|| CallSite {
                    end: literal.end,
                    callees: BTreeSet::new(),
                    in_caller: true,
                });
            site.callees.insert(callee);
            site.in_caller &= literal.program == caller;
        }
        if let Some(out) = self.out.as_mut() {
            out.drain(literal.out_pos..literal.out_pos + (literal.end - literal.start));
        }

        let code = subrs.get(index).ok_or_else(|| self.invalid("missing subroutine"))?;
        self.run(code, callee.into(), depth + 1)
    }

    fn escape(&mut self, b1: u8) -> Result<()> {
        let (pops, pushes) = match b1 {
            // and or add sub div eq mul
            3 | 4 | 10 | 11 | 12 | 15 | 24 => (2, 1),
            // not abs neg get sqrt
            5 | 9 | 14 | 21 | 26 => (1, 1),
            18 => (1, 0),
            20 => (2, 0),
            22 => (4, 1),
            23 => (0, 1),
            27 => (1, 2),
            28 => (2, 2),
            29 | 30 => return Err(self.invalid(format!("unsupported operator 12 {b1}"))),
            _ => {
                self.stack.clear();
                return Ok(());
            }
        };
        let len = self.stack.len();
        if len < pops {
            return Err(self.invalid(format!("stack underflow at operator 12 {b1}")));
        }
        self.stack.truncate(len - pops);
        self.stack.extend(std::iter::repeat_n(StackItem::COMPUTED, pushes));
        Ok(())
    }
}

/// Walk one glyph, adding the subroutines it uses and their call sites to
/// `graph`.
pub fn collect_calls(
    charstring: &[u8],
    glyph: u16,
    subrs: SubrSet<'_, '_>,
    graph: &mut CallGraph,
) -> Result<()> {
    let mut walker = Walker {
        subrs,
        glyph,
        stack: Vec::new(),
        stems: 0,
        steps: 0,
        graph: Some(graph),
        out: None,
    };
    walker.run(charstring, Program::Glyph(glyph), 0).map(|_| ())
}

/// Inline every subroutine call of one glyph.
///
/// Each call operand and its `callsubr`/`callgsubr` are replaced by the
/// callee's body without its trailing `return`. The result is
/// byte-identical when run again with no subroutines available.
pub fn desubroutinize(charstring: &[u8], glyph: u16, subrs: SubrSet<'_, '_>) -> Result<Vec<u8>> {
    let mut walker = Walker {
        subrs,
        glyph,
        stack: Vec::new(),
        stems: 0,
        steps: 0,
        graph: None,
        out: Some(Vec::with_capacity(charstring.len() * 2)),
    };
    walker.run(charstring, Program::Glyph(glyph), 0)?;
    Ok(walker.out.unwrap_or_default())
}

/// Rewrite the call operands of one program.
///
/// `operand_for` maps a callee to its new biased operand, or `None` if the
/// callee was not kept.
pub fn renumber_calls(
    code: &[u8],
    sites: Option<&BTreeMap<usize, CallSite>>,
    operand_for: impl Fn(SubrRef) -> Option<i32>,
) -> Result<Vec<u8>> {
    let Some(sites) = sites else {
        return Ok(code.to_vec());
    };

    let mut w = Writer::with_capacity(code.len());
    let mut copied = 0;
    for (&start, site) in sites {
        let mut operands = site.callees.iter().map(|c| {
            operand_for(*c).ok_or_else(|| {
                SubsetError::UnsupportedFeature(format!("call to dropped subroutine {c:?}"))
            })
        });
        let operand = operands.next().transpose()?.unwrap_or_default();
        for other in operands {
            if other? != operand {
                return Err(SubsetError::UnsupportedFeature(
                    "call operand names subroutines that renumber differently".into(),
                ));
            }
        }
        w.write_bytes(&code[copied..start]);
        write_number(&mut w, operand);
        copied = site.end;
    }
    w.write_bytes(&code[copied..]);
    Ok(w.finish())
}

/// Shortest Type 2 integer encoding for values in i16 range.
pub fn write_number(w: &mut Writer, v: i32) {
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
        _ => {
            w.write_u8(SHORTINT);
            w.write_i16(v as i16);
        }
    }
}
