//! The HarfBuzz subsetter, used as a reference for differential comparison.

use anyhow::Result;
use fontflat_subsetter::{SubsetRequest, TagFilter};
use hb_subset::{Blob, FontFace, SubsetInput, Tag as HbTag};
use log::debug;
use read_fonts::{FontRef, TableProvider, types::Tag};

/// Subset `data` with hb-subset, translating the request as closely as
/// HarfBuzz allows. Explicit glyph IDs are not forwarded.
pub fn subset_with_harfbuzz(data: &[u8], request: &SubsetRequest) -> Result<Vec<u8>> {
    let mut input = SubsetInput::new()?;

    if request.retain_glyph_names {
        input.flags().retain_glyph_names();
    }
    if request.retain_gids {
        input.flags().retain_gids();
    }
    if request.desubroutinize {
        input.flags().desubroutinize();
    }
    if !request.glyph_ids.is_empty() {
        debug!("Reference subset ignores {} explicit glyph IDs", request.glyph_ids.len());
    }

    {
        let mut feature_set = input.layout_feature_tag_set();
        for tag in feature_tags(data, &request.layout_features)? {
            feature_set.insert(HbTag::new(&tag.into_bytes()));
        }
    }

    {
        let mut unicode_set = input.unicode_set();
        for c in request.unicodes.iter().filter_map(|cp| char::from_u32(*cp)) {
            unicode_set.insert(c);
        }
    }

    {
        let mut drop_tables = input.drop_table_tag_set();
        for tag in &request.drop_tables {
            drop_tables.insert(HbTag::new(&tag.into_bytes()));
        }
    }

    let font = FontFace::new(Blob::from_bytes(data)?)?;
    let subset_font = input.subset_font(&font)?;
    Ok(subset_font.underlying_blob().to_vec())
}

/// The feature tags a filter selects in this font. `All` expands to every
/// tag in GSUB and GPOS.
fn feature_tags(data: &[u8], filter: &TagFilter) -> Result<Vec<Tag>> {
    match filter {
        TagFilter::Only(tags) => Ok(tags.iter().copied().collect()),
        TagFilter::All => {
            let font = FontRef::new(data)?;
            let mut tags = Vec::new();
            if let Ok(gsub) = font.gsub() {
                tags.extend(gsub.feature_list()?.feature_records().iter().map(|r| r.feature_tag()));
            }
            if let Ok(gpos) = font.gpos() {
                tags.extend(gpos.feature_list()?.feature_records().iter().map(|r| r.feature_tag()));
            }
            tags.sort();
            tags.dedup();
            Ok(tags)
        }
    }
}
