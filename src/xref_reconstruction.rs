//! Cross-reference reconstruction for damaged files.
//!
//! When no usable cross-reference section can be read, the object table is
//! rebuilt by scanning the whole file for `N G obj` headers. Later headers
//! win, as they would after an incremental update. Members of object streams
//! found during the scan are added as compressed entries, and the trailer is
//! taken from the last `trailer` dictionary, the last xref stream, or
//! synthesized around the first catalog found.
//!
//! Only used when [`ParseOptions::recover_xref`] is set.

use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::objstm::parse_object_stream;
use crate::parser::{parse_indirect_object_at, parse_object_with, ParseContext};
use crate::parser_config::ParseOptions;
use crate::xref::{CrossRefTable, XRefEntry};
use lazy_static::lazy_static;
use regex::bytes::Regex;

lazy_static! {
    static ref RE_OBJ_HEADER: Regex =
        Regex::new(r"(\d+)[ \t\r\n\x0C\x00]+(\d+)[ \t\r\n\x0C\x00]+obj").expect("static regex");
    static ref RE_TRAILER: Regex = Regex::new(r"trailer[ \t\r\n\x0C\x00]*<<").expect("static regex");
}

/// Rebuild a cross-reference table by scanning `data`.
pub fn reconstruct_xref(data: &[u8], options: &ParseOptions) -> Result<CrossRefTable> {
    log::info!("Reconstructing cross-reference table by scanning {} bytes", data.len());

    let mut table = CrossRefTable::new();
    for caps in RE_OBJ_HEADER.captures_iter(data) {
        let (Some(whole), Some(num), Some(gen)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        // A digit run glued to a previous digit is not a header start
        if whole.start() > 0 && data[whole.start() - 1].is_ascii_digit() {
            continue;
        }
        let number = std::str::from_utf8(num.as_bytes()).ok().and_then(|s| s.parse::<u32>().ok());
        let generation = std::str::from_utf8(gen.as_bytes()).ok().and_then(|s| s.parse::<u16>().ok());
        if let (Some(number), Some(generation)) = (number, generation) {
            table.add_entry(
                number,
                XRefEntry::InUse {
                    offset: whole.start(),
                    generation,
                },
            );
        }
    }

    if table.is_empty() {
        return Err(Error::InvalidPdf("no objects found while reconstructing xref".to_string()));
    }

    let ctx = ParseContext::from_options(options);
    let mut xref_stream_trailer: Option<Dictionary> = None;
    let mut catalog: Option<ObjectRef> = None;
    let mut compressed = Vec::new();

    let located: Vec<(u32, usize)> = table
        .entries()
        .filter_map(|(n, e)| match e {
            XRefEntry::InUse { offset, .. } => Some((n, *offset)),
            _ => None,
        })
        .collect();

    for (number, offset) in located {
        let Ok((r, object)) = parse_indirect_object_at(data, offset, &ctx) else {
            continue;
        };
        match object.dict_type() {
            Some("Catalog") if catalog.is_none() => catalog = Some(r),
            Some("XRef") => xref_stream_trailer = object.as_dict().cloned(),
            Some("ObjStm") => match parse_object_stream(&object, options) {
                Ok(members) => {
                    for (index, (member, _)) in members.iter().enumerate() {
                        compressed.push((*member, number, index as u32));
                    }
                },
                Err(e) => log::debug!("Object stream {} unreadable during recovery: {}", number, e),
            },
            _ => {},
        }
    }

    for (member, stream, index) in compressed {
        if table.get(member).is_none() {
            table.add_entry(member, XRefEntry::Compressed { stream, index });
        }
    }

    let trailer = last_trailer(data, &ctx)
        .or(xref_stream_trailer)
        .filter(|t| t.contains_key("Root"))
        .or_else(|| {
            catalog.map(|root| {
                let mut t = Dictionary::new();
                t.insert("Root".to_string(), Object::Reference(root));
                t
            })
        })
        .ok_or_else(|| Error::InvalidPdf("no trailer or catalog found while reconstructing xref".to_string()))?;
    table.set_trailer(trailer);

    log::info!("Reconstructed cross-reference table with {} entries", table.len());
    Ok(table)
}

fn last_trailer(data: &[u8], ctx: &ParseContext<'_>) -> Option<Dictionary> {
    let found = RE_TRAILER.find_iter(data).last()?;
    let dict_start = found.end() - 2;
    match parse_object_with(&data[dict_start..], ctx) {
        Ok((_, Object::Dictionary(dict))) => Some(dict),
        _ => None,
    }
}
