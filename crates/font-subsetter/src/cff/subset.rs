use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info, warn};

use crate::{
    Result, SubsetError,
    cff::{
        Cff,
        charset::encode_charset,
        charstring::{
            CallGraph, Program, SubrRef, collect_calls, desubroutinize, renumber_calls, subr_bias,
        },
        dict::{Dict, Entry, Operator},
        fdselect::encode_fd_select,
        index::{encode_index, index_size},
    },
    types::GlyphMap,
    writer::Writer,
};

const ENDCHAR: &[u8] = &[14];

/// Per output Font DICT: the source font index and its kept local subrs.
struct OutFont<'a> {
    source: usize,
    local_subrs: Vec<Vec<u8>>,
    private: Option<Dict<'a>>,
    font_dict: Option<Dict<'a>>,
}

/// Subset a `CFF ` table to the glyphs in `map`.
///
/// Layout of the result: header, Name, Top DICT, String and Global Subr
/// INDEXes, charset, FDSelect, CharStrings, FDArray, then each Private DICT
/// immediately followed by its local Subrs INDEX.
pub fn subset_cff(data: &[u8], map: &GlyphMap, flatten: bool) -> Result<Vec<u8>> {
    let cff = Cff::parse(data)?;
    if cff.num_glyphs() < map.source_glyphs() as usize {
        return Err(SubsetError::malformed(
            "CFF ",
            format!("{} charstrings for {} glyphs", cff.num_glyphs(), map.source_glyphs()),
        ));
    }

    let used_fds: BTreeSet<usize> = map.kept().map(|g| cff.fd_for(g.to_u16())).collect();
    let fd_map: BTreeMap<usize, usize> =
        used_fds.iter().enumerate().map(|(new, old)| (*old, new)).collect();
    let new_fd = |gid: Option<u16>| gid.map_or(0, |g| fd_map[&cff.fd_for(g)]);

    let mut fonts: Vec<OutFont> = used_fds
        .iter()
        .map(|&fd| OutFont {
            source: fd,
            local_subrs: Vec::new(),
            private: cff.fonts[fd].private.clone(),
            font_dict: cff.fonts[fd].font_dict.clone(),
        })
        .collect();
    if fonts.is_empty() {
        fonts.push(OutFont {
            source: 0,
            local_subrs: Vec::new(),
            private: cff.fonts.first().and_then(|f| f.private.clone()),
            font_dict: cff.fonts.first().and_then(|f| f.font_dict.clone()),
        });
    }

    let renumbered = if flatten { None } else { renumber(&cff, map, &fd_map, &mut fonts)? };
    let desubroutinized = renumbered.is_none();
    let (charstrings, global_subrs) = match renumbered {
        Some(subset) => subset,
        None => {
            if !flatten {
                warn!("CFF: subroutine calls cannot be renumbered in place, desubroutinizing");
            }
            (inline_all(&cff, map)?, Vec::new())
        }
    };

    let charset: Vec<u16> = map
        .iter()
        .map(|(_, old)| old.map_or(0, |g| cff.charset.get(g.to_usize()).copied().unwrap_or(0)))
        .collect();
    let fd_select: Option<Vec<u8>> = cff
        .is_cid()
        .then(|| map.iter().map(|(_, old)| new_fd(old.map(|g| g.to_u16())) as u8).collect());

    info!(
        "CFF: {} glyphs, {} global subrs, {} Font DICTs{}",
        charstrings.len(),
        global_subrs.len(),
        fonts.len(),
        if desubroutinized { " (desubroutinized)" } else { "" }
    );

    serialize(&cff, charstrings, global_subrs, charset, fd_select, fonts)
}

fn inline_all(cff: &Cff, map: &GlyphMap) -> Result<Vec<Vec<u8>>> {
    map.iter()
        .map(|(_, old)| match old {
            Some(old) => {
                let gid = old.to_u16();
                let code = cff.charstrings.get(gid as usize).unwrap_or(ENDCHAR);
                desubroutinize(code, gid, cff.subrs_for(gid))
            }
            None => Ok(ENDCHAR.to_vec()),
        })
        .collect()
}

/// Keep only reachable subroutines and rewrite every call operand.
///
/// `None` when some call operand has no single rewrite, for instance a
/// global subroutine calling local subroutines of Font DICTs that
/// renumber them differently.
fn renumber<'a>(
    cff: &Cff<'a>,
    map: &GlyphMap,
    fd_map: &BTreeMap<usize, usize>,
    fonts: &mut [OutFont<'a>],
) -> Result<Option<(Vec<Vec<u8>>, Vec<Vec<u8>>)>> {
    let mut graph = CallGraph::default();
    for old in map.kept() {
        let gid = old.to_u16();
        if let Some(code) = cff.charstrings.get(gid as usize) {
            collect_calls(code, gid, cff.subrs_for(gid), &mut graph)?;
        }
    }

    let globals: Vec<usize> = graph.used_global().collect();
    let global_new: BTreeMap<usize, i32> = globals
        .iter()
        .enumerate()
        .map(|(new, old)| (*old, new as i32 - subr_bias(globals.len())))
        .collect();

    let mut local_new: BTreeMap<(usize, usize), i32> = BTreeMap::new();
    let mut locals: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for &fd in fd_map.keys() {
        let kept: Vec<usize> = graph.used_local(fd).collect();
        let bias = subr_bias(kept.len());
        for (new, old) in kept.iter().enumerate() {
            local_new.insert((fd, *old), new as i32 - bias);
        }
        locals.insert(fd, kept);
    }

    let operand_for = |callee: SubrRef| match callee {
        SubrRef::Global(index) => global_new.get(&index).copied(),
        SubrRef::Local { fd, index } => local_new.get(&(fd, index)).copied(),
    };
    if !graph.can_renumber(operand_for) {
        return Ok(None);
    }

    let charstrings = map
        .iter()
        .map(|(_, old)| match old {
            Some(old) => {
                let code = cff.charstrings.get(old.to_usize()).unwrap_or(ENDCHAR);
                renumber_calls(code, graph.sites.get(&Program::Glyph(old.to_u16())), operand_for)
            }
            None => Ok(ENDCHAR.to_vec()),
        })
        .collect::<Result<Vec<_>>>()?;

    let global_subrs = globals
        .iter()
        .map(|&index| {
            let code = cff.global_subrs.get(index).unwrap_or_default();
            renumber_calls(code, graph.sites.get(&Program::Global(index)), operand_for)
        })
        .collect::<Result<Vec<_>>>()?;

    for font in fonts.iter_mut() {
        let source = &cff.fonts[font.source];
        font.local_subrs = locals
            .get(&font.source)
            .into_iter()
            .flatten()
            .map(|&index| {
                let code = source.local_subrs.get(index).unwrap_or_default();
                let program = Program::Local { fd: font.source, index };
                renumber_calls(code, graph.sites.get(&program), operand_for)
            })
            .collect::<Result<Vec<_>>>()?;
    }

    debug!(
        "Kept {} of {} global subrs and {} local subrs",
        global_subrs.len(),
        cff.global_subrs.len(),
        fonts.iter().map(|f| f.local_subrs.len()).sum::<usize>()
    );
    Ok(Some((charstrings, global_subrs)))
}

/// A Private DICT plus Subrs ready to place; `Subrs` points just past the
/// DICT itself.
fn private_blob(private: Option<&Dict>, local_subrs: &[Vec<u8>]) -> Vec<u8> {
    let Some(private) = private else {
        return Vec::new();
    };
    let mut private = private.clone();
    if local_subrs.is_empty() {
        private.remove(Operator::SUBRS);
        return private.encode();
    }
    private.set_offset(Operator::SUBRS, 0);
    let len = private.encode().len();
    private.set_offset(Operator::SUBRS, len);

    let mut blob = private.encode();
    blob.extend(encode_index(local_subrs));
    blob
}

fn private_dict_len(blob: &[u8], local_subrs: &[Vec<u8>]) -> usize {
    if local_subrs.is_empty() {
        blob.len()
    } else {
        blob.len() - index_size(local_subrs.iter().map(Vec::len))
    }
}

fn serialize(
    cff: &Cff,
    charstrings: Vec<Vec<u8>>,
    global_subrs: Vec<Vec<u8>>,
    charset: Vec<u16>,
    fd_select: Option<Vec<u8>>,
    fonts: Vec<OutFont>,
) -> Result<Vec<u8>> {
    let name = cff.names.get(0).unwrap_or_default();
    let names = encode_index(&[name]);
    let strings = encode_index(cff.strings.items());
    let global_subrs = encode_index(&global_subrs);
    let charset = encode_charset(&charset);
    let fd_select = fd_select.map(|fds| encode_fd_select(&fds)).unwrap_or_default();
    let charstrings = encode_index(&charstrings);
    let privates: Vec<Vec<u8>> =
        fonts.iter().map(|f| private_blob(f.private.as_ref(), &f.local_subrs)).collect();

    let mut top = cff.top.clone();
    if matches!(top.get(Operator::ENCODING), Some(Entry::Offset { .. })) {
        debug!("Dropping custom CFF Encoding");
        top.remove(Operator::ENCODING);
    }

    // First pass with zero offsets fixes every DICT size.
    let mut font_dicts: Vec<Dict> = fonts.iter().filter_map(|f| f.font_dict.clone()).collect();
    let mut layout = Layout { private: vec![0; privates.len()], ..Layout::default() };
    fill_offsets(&mut top, &mut font_dicts, cff.is_cid(), &privates, &fonts, &layout);
    let top_size = index_size([top.encode().len()]);
    let fd_array_size = if cff.is_cid() {
        index_size(font_dicts.iter().map(|d| d.encode().len()))
    } else {
        0
    };

    let header_size = 4;
    layout.charset = header_size + names.len() + top_size + strings.len() + global_subrs.len();
    layout.fd_select = layout.charset + charset.len();
    layout.charstrings = layout.fd_select + fd_select.len();
    layout.fd_array = layout.charstrings + charstrings.len();
    let mut pos = layout.fd_array + fd_array_size;
    for (slot, blob) in layout.private.iter_mut().zip(&privates) {
        *slot = pos;
        pos += blob.len();
    }

    fill_offsets(&mut top, &mut font_dicts, cff.is_cid(), &privates, &fonts, &layout);
    let top = top.encode();
    let fd_array: Vec<Vec<u8>> = font_dicts.iter().map(Dict::encode).collect();

    let mut w = Writer::with_capacity(pos);
    w.write_u8(1);
    w.write_u8(0);
    w.write_u8(header_size as u8);
    w.write_u8(4);
    w.write_bytes(&names);
    w.write_bytes(&encode_index(&[top]));
    w.write_bytes(&strings);
    w.write_bytes(&global_subrs);
    debug_assert_eq!(w.len(), layout.charset);
    w.write_bytes(&charset);
    w.write_bytes(&fd_select);
    w.write_bytes(&charstrings);
    if cff.is_cid() {
        w.write_bytes(&encode_index(&fd_array));
    }
    debug_assert_eq!(w.len(), layout.fd_array + fd_array_size);
    for blob in &privates {
        w.write_bytes(blob);
    }
    Ok(w.finish())
}

/// Absolute positions of the structures the Top and Font DICTs point at.
#[derive(Debug, Default)]
struct Layout {
    charset: usize,
    fd_select: usize,
    charstrings: usize,
    fd_array: usize,
    private: Vec<usize>,
}

fn fill_offsets(
    top: &mut Dict,
    font_dicts: &mut [Dict],
    is_cid: bool,
    privates: &[Vec<u8>],
    fonts: &[OutFont],
    layout: &Layout,
) {
    top.set_offset(Operator::CHARSET, layout.charset);
    top.set_offset(Operator::CHAR_STRINGS, layout.charstrings);
    if is_cid {
        top.set_offset(Operator::FD_SELECT, layout.fd_select);
        top.set_offset(Operator::FD_ARRAY, layout.fd_array);
        top.remove(Operator::PRIVATE);
        for (i, font_dict) in font_dicts.iter_mut().enumerate() {
            let blob = &privates[i];
            if blob.is_empty() {
                font_dict.remove(Operator::PRIVATE);
            } else {
                font_dict.set_private(private_dict_len(blob, &fonts[i].local_subrs), layout.private[i]);
            }
        }
    } else if let Some(blob) = privates.first().filter(|b| !b.is_empty()) {
        top.set_private(private_dict_len(blob, &fonts[0].local_subrs), layout.private[0]);
    } else {
        top.remove(Operator::PRIVATE);
    }
}
