//! Cross-reference parsing.
//!
//! Maps object numbers to where the object lives: a byte offset for plain
//! objects, or an (object stream, index) pair for compressed ones. Handles
//! classic `xref` tables, cross-reference streams (PDF 1.5+), `/Prev` chains
//! of incremental updates and hybrid files whose trailer carries `/XRefStm`.

use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::{Dictionary, Object};
use crate::parser::{nom_to_error, parse_indirect_object_at, parse_object_with, ParseContext};
use crate::parser_config::ParseOptions;
use std::collections::{BTreeMap, HashSet};

/// Largest subsection a classic table may declare.
const MAX_SUBSECTION_ENTRIES: i64 = 1_000_000;

/// How far from the end of the file `startxref` is searched for first.
const STARTXREF_TAIL: usize = 2048;

/// Location of one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Deleted or never used
    Free {
        /// Generation to use if the number is reused
        generation: u16,
    },
    /// Stored uncompressed at a byte offset
    InUse {
        /// Byte offset of `N G obj`
        offset: usize,
        /// Generation number
        generation: u16,
    },
    /// Stored inside an object stream
    Compressed {
        /// Object number of the `/Type /ObjStm` stream
        stream: u32,
        /// Index of the object within that stream
        index: u32,
    },
}

impl XRefEntry {
    /// Whether the entry designates an existing object.
    pub fn in_use(&self) -> bool {
        !matches!(self, XRefEntry::Free { .. })
    }
}

/// Object number to location, plus the trailer of the newest section.
#[derive(Debug, Clone, Default)]
pub struct CrossRefTable {
    entries: BTreeMap<u32, XRefEntry>,
    trailer: Dictionary,
}

impl CrossRefTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the trailer dictionary.
    pub fn set_trailer(&mut self, trailer: Dictionary) {
        self.trailer = trailer;
    }

    /// Trailer dictionary (for xref streams, the stream dictionary).
    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    /// Insert or replace an entry.
    pub fn add_entry(&mut self, object_number: u32, entry: XRefEntry) {
        self.entries.insert(object_number, entry);
    }

    /// Look up an entry.
    pub fn get(&self, object_number: u32) -> Option<&XRefEntry> {
        self.entries.get(&object_number)
    }

    /// Entries in ascending object-number order.
    pub fn entries(&self) -> impl Iterator<Item = (u32, &XRefEntry)> + '_ {
        self.entries.iter().map(|(n, e)| (*n, e))
    }

    /// Number of entries, free ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fold in an older section: its entries fill gaps only, and its trailer
    /// contributes keys the newer trailer lacks.
    pub fn merge_older(&mut self, older: CrossRefTable) {
        for (number, entry) in older.entries {
            self.entries.entry(number).or_insert(entry);
        }
        for (key, value) in older.trailer {
            if key != "Prev" && key != "XRefStm" {
                self.trailer.entry(key).or_insert(value);
            }
        }
    }
}

/// Find the offset recorded after the last `startxref` keyword.
pub fn find_startxref(data: &[u8]) -> Result<usize> {
    let tail_start = data.len().saturating_sub(STARTXREF_TAIL);
    let keyword_pos = rfind(&data[tail_start..], b"startxref")
        .map(|p| p + tail_start)
        .or_else(|| rfind(data, b"startxref"))
        .ok_or_else(|| Error::InvalidPdf("startxref not found".to_string()))?;

    match token(&data[keyword_pos + b"startxref".len()..]) {
        Ok((_, Token::Integer(offset))) if offset >= 0 && (offset as usize) < data.len() => {
            Ok(offset as usize)
        },
        _ => Err(Error::InvalidPdf(format!(
            "startxref at byte {} is not followed by a valid offset",
            keyword_pos
        ))),
    }
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

/// Read the cross-reference section at `start` and every older section
/// reachable through `/Prev`. Newer entries win.
pub fn read_xref_chain(data: &[u8], start: usize, options: &ParseOptions) -> Result<CrossRefTable> {
    let mut visited = HashSet::new();
    let mut merged: Option<CrossRefTable> = None;
    let mut next = Some(start);

    while let Some(offset) = next.take() {
        if !visited.insert(offset) {
            log::warn!("Cross-reference /Prev loop at byte {}, stopping", offset);
            break;
        }
        if visited.len() as u32 > options.max_xref_chain {
            log::warn!(
                "Cross-reference chain longer than {} sections, ignoring older ones",
                options.max_xref_chain
            );
            break;
        }

        let section = read_section(data, offset, options)?;
        next = section
            .trailer()
            .get("Prev")
            .and_then(|o| o.as_integer())
            .and_then(|p| usize::try_from(p).ok());
        log::debug!("Read xref section at {} with {} entries", offset, section.len());

        match merged.as_mut() {
            None => merged = Some(section),
            Some(newer) => newer.merge_older(section),
        }
    }

    merged.ok_or(Error::InvalidXref)
}

/// One section: a classic table (plus its hybrid `/XRefStm`, if any) or a
/// cross-reference stream.
fn read_section(data: &[u8], offset: usize, options: &ParseOptions) -> Result<CrossRefTable> {
    let input = data.get(offset..).ok_or(Error::InvalidXref)?;
    match token(input) {
        Ok((rest, Token::Keyword(b"xref"))) => {
            let body_offset = data.len() - rest.len();
            let mut table = parse_classic_table(data, body_offset, options)?;

            let stm = table
                .trailer()
                .get("XRefStm")
                .and_then(|o| o.as_integer())
                .and_then(|p| usize::try_from(p).ok());
            if let Some(stm_offset) = stm {
                match parse_xref_stream(data, stm_offset, options) {
                    Ok(stream) => {
                        for (number, entry) in stream.entries {
                            // Compressed objects appear as free in the table part
                            let shadowed = matches!(table.get(number), Some(e) if e.in_use());
                            if !shadowed {
                                table.add_entry(number, entry);
                            }
                        }
                    },
                    Err(e) => log::warn!("Ignoring unreadable /XRefStm at {}: {}", stm_offset, e),
                }
            }
            Ok(table)
        },
        _ => parse_xref_stream(data, offset, options),
    }
}

/// Parse the subsections and trailer of a classic table. `offset` points just
/// past the `xref` keyword.
fn parse_classic_table(data: &[u8], offset: usize, options: &ParseOptions) -> Result<CrossRefTable> {
    let mut table = CrossRefTable::new();
    let mut input = &data[offset..];

    loop {
        let (rest, first) = token(input).map_err(|e| nom_to_error(data, e))?;
        let start = match first {
            Token::Keyword(b"trailer") => {
                input = rest;
                break;
            },
            Token::Integer(start) => start,
            _ => return Err(Error::InvalidXref),
        };
        let (rest, count) = match token(rest).map_err(|e| nom_to_error(data, e))? {
            (rest, Token::Integer(count)) => (rest, count),
            _ => return Err(Error::InvalidXref),
        };
        if start < 0 || !(0..=MAX_SUBSECTION_ENTRIES).contains(&count) {
            return Err(Error::InvalidPdf(format!(
                "xref subsection {} {} out of range",
                start, count
            )));
        }

        input = rest;
        for i in 0..count {
            let (rest, entry) = parse_table_entry(input).ok_or_else(|| {
                Error::InvalidPdf(format!("malformed xref entry {} of subsection {}", i, start))
            })?;
            input = rest;
            let number = u32::try_from(start + i).map_err(|_| Error::InvalidXref)?;
            // First occurrence wins within a section
            table.entries.entry(number).or_insert(entry);
        }
    }

    let ctx = ParseContext::from_options(options);
    let (_, trailer) = parse_object_with(input, &ctx).map_err(|e| nom_to_error(data, e))?;
    match trailer {
        Object::Dictionary(dict) => table.set_trailer(dict),
        other => {
            return Err(Error::InvalidObjectType {
                expected: "Dictionary".to_string(),
                found: other.type_name().to_string(),
            })
        },
    }

    Ok(table)
}

/// `nnnnnnnnnn ggggg n|f`, tolerant of irregular spacing.
fn parse_table_entry(input: &[u8]) -> Option<(&[u8], XRefEntry)> {
    let (rest, offset) = match token(input).ok()? {
        (rest, Token::Integer(v)) => (rest, v),
        _ => return None,
    };
    let (rest, generation) = match token(rest).ok()? {
        (rest, Token::Integer(v)) => (rest, u16::try_from(v).ok()?),
        _ => return None,
    };
    let (rest, kind) = match token(rest).ok()? {
        (rest, Token::Keyword(kind)) => (rest, kind),
        _ => return None,
    };
    let entry = match kind {
        b"n" => XRefEntry::InUse {
            offset: usize::try_from(offset).ok()?,
            generation,
        },
        b"f" => XRefEntry::Free { generation },
        _ => return None,
    };
    Some((rest, entry))
}

/// Parse a `/Type /XRef` stream object at `offset`.
fn parse_xref_stream(data: &[u8], offset: usize, options: &ParseOptions) -> Result<CrossRefTable> {
    let ctx = ParseContext::from_options(options);
    let (_, object) = parse_indirect_object_at(data, offset, &ctx)?;

    let dict = match &object {
        Object::Stream { dict, .. } => dict,
        other => {
            return Err(Error::InvalidObjectType {
                expected: "Stream".to_string(),
                found: other.type_name().to_string(),
            })
        },
    };
    if let Some(kind) = object.dict_type() {
        if kind != "XRef" {
            return Err(Error::InvalidPdf(format!("expected /Type /XRef, got /{}", kind)));
        }
    }

    let widths: Vec<usize> = dict
        .get("W")
        .and_then(|o| o.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|w| w.as_integer())
                .filter_map(|w| usize::try_from(w).ok())
                .collect()
        })
        .unwrap_or_default();
    if widths.len() != 3 || widths.iter().any(|w| *w > 8) {
        return Err(Error::InvalidPdf("xref stream has an invalid /W array".to_string()));
    }
    let (w1, w2, w3) = (widths[0], widths[1], widths[2]);
    let row = w1 + w2 + w3;
    if row == 0 {
        return Err(Error::InvalidPdf("xref stream /W sums to zero".to_string()));
    }

    let size = dict
        .get("Size")
        .and_then(|o| o.as_integer())
        .ok_or_else(|| Error::InvalidPdf("xref stream has no /Size".to_string()))?;
    let ranges: Vec<(i64, i64)> = match dict.get("Index").and_then(|o| o.as_array()) {
        Some(index) => index
            .chunks_exact(2)
            .filter_map(|pair| Some((pair[0].as_integer()?, pair[1].as_integer()?)))
            .collect(),
        None => vec![(0, size)],
    };

    let decoded = object.decode_stream_data_with_options(options)?;
    let mut rows = decoded.chunks_exact(row);
    let mut table = CrossRefTable::new();

    'ranges: for (start, count) in ranges {
        if start < 0 || !(0..=MAX_SUBSECTION_ENTRIES).contains(&count) {
            return Err(Error::InvalidXref);
        }
        for i in 0..count {
            let Some(fields) = rows.next() else {
                log::warn!("xref stream at {} ends before its /Index ranges do", offset);
                break 'ranges;
            };
            let kind = if w1 == 0 { 1 } else { read_int(&fields[..w1]) };
            let second = read_int(&fields[w1..w1 + w2]);
            let third = read_int(&fields[w1 + w2..]);
            let number = u32::try_from(start + i).map_err(|_| Error::InvalidXref)?;

            let entry = match kind {
                0 => XRefEntry::Free {
                    generation: third as u16,
                },
                1 => XRefEntry::InUse {
                    offset: second as usize,
                    generation: third as u16,
                },
                2 => XRefEntry::Compressed {
                    stream: second as u32,
                    index: third as u32,
                },
                // Unknown types are references to the null object
                _ => continue,
            };
            table.add_entry(number, entry);
        }
    }

    table.set_trailer(dict.clone());
    Ok(table)
}

/// Big-endian unsigned integer of up to 8 bytes.
fn read_int(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    const CLASSIC: &[u8] = b"%PDF-1.4\n\
1 0 obj\n<< /Type /Catalog >>\nendobj\n\
xref\n\
0 2\n\
0000000000 65535 f \n\
0000000009 00000 n \n\
trailer\n<< /Size 2 /Root 1 0 R >>\n\
startxref\n45\n%%EOF\n";

    #[test]
    fn test_find_startxref() {
        assert_eq!(find_startxref(CLASSIC).unwrap(), 45);
        assert!(find_startxref(b"%PDF-1.4 no trailer").is_err());
        assert!(find_startxref(b"startxref\n999999\n%%EOF").is_err());
    }

    #[test]
    fn test_classic_table_and_trailer() {
        let table = read_xref_chain(CLASSIC, 45, &ParseOptions::default()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0), Some(&XRefEntry::Free { generation: 65535 }));
        assert_eq!(
            table.get(1),
            Some(&XRefEntry::InUse {
                offset: 9,
                generation: 0
            })
        );
        assert_eq!(table.trailer().get("Size").and_then(|o| o.as_integer()), Some(2));
    }

    #[test]
    fn test_table_entries_with_irregular_spacing() {
        let data = b"xref\r0 1\r0000000017 00000 n\rtrailer<</Size 1>>";
        let table = read_xref_chain(data, 0, &ParseOptions::default()).unwrap();
        assert_eq!(
            table.get(0),
            Some(&XRefEntry::InUse {
                offset: 17,
                generation: 0
            })
        );
    }

    #[test]
    fn test_prev_chain_newer_entries_win() {
        let mut data = Vec::new();
        let old = data.len();
        data.extend_from_slice(
            b"xref\n0 2\n0000000000 65535 f \n0000000100 00000 n \ntrailer\n<< /Size 2 /Root 1 0 R >>\n",
        );
        let new = data.len();
        data.extend_from_slice(
            format!("xref\n1 1\n0000000200 00000 n \ntrailer\n<< /Size 2 /Prev {} >>\n", old).as_bytes(),
        );

        let table = read_xref_chain(&data, new, &ParseOptions::default()).unwrap();
        assert_eq!(
            table.get(1),
            Some(&XRefEntry::InUse {
                offset: 200,
                generation: 0
            })
        );
        assert!(table.get(0).is_some());
        // Root only appears in the older trailer
        assert!(table.trailer().get("Root").is_some());
        assert!(table.trailer().get("Prev").is_some());
    }

    #[test]
    fn test_prev_loop_terminates() {
        let data = b"xref\n0 1\n0000000000 65535 f \ntrailer\n<< /Size 1 /Prev 0 >>\n";
        let table = read_xref_chain(data, 0, &ParseOptions::default()).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_oversized_subsection_rejected() {
        let data = b"xref\n0 2000000\n";
        assert!(read_xref_chain(data, 0, &ParseOptions::default()).is_err());
    }

    fn xref_stream(rows: &[[u8; 4]], index: &str) -> Vec<u8> {
        let raw: Vec<u8> = rows.iter().flatten().copied().collect();
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut data = format!(
            "5 0 obj\n<< /Type /XRef /Size 6 /W [1 2 1] {} /Filter /FlateDecode /Length {} >>\nstream\n",
            index,
            compressed.len()
        )
        .into_bytes();
        data.extend_from_slice(&compressed);
        data.extend_from_slice(b"\nendstream\nendobj\n");
        data
    }

    #[test]
    fn test_xref_stream_entry_types() {
        let data = xref_stream(
            &[[0, 0, 0, 255], [1, 0, 15, 0], [2, 0, 4, 3], [9, 0, 0, 0]],
            "/Index [0 1 3 3]",
        );
        let table = read_xref_chain(&data, 0, &ParseOptions::default()).unwrap();
        assert_eq!(table.get(0), Some(&XRefEntry::Free { generation: 255 }));
        assert_eq!(
            table.get(3),
            Some(&XRefEntry::InUse {
                offset: 15,
                generation: 0
            })
        );
        assert_eq!(table.get(4), Some(&XRefEntry::Compressed { stream: 4, index: 3 }));
        // Unknown type 9 is skipped
        assert!(table.get(5).is_none());
        assert_eq!(table.trailer().get("Size").and_then(|o| o.as_integer()), Some(6));
    }

    #[test]
    fn test_xref_stream_wrong_type_rejected() {
        let data = b"1 0 obj\n<< /Type /ObjStm /W [1 1 1] /Size 1 /Length 0 >>\nstream\n\nendstream\nendobj";
        assert!(read_xref_chain(data, 0, &ParseOptions::default()).is_err());
    }
}
