//! Object stream extraction (PDF 1.5+).
//!
//! A `/Type /ObjStm` stream packs `/N` objects after a header of `/N`
//! integer pairs `(object number, offset)`, offsets being relative to
//! `/First`:
//!
//! ```text
//! << /Type /ObjStm /N 2 /First 9 /Filter /FlateDecode >>
//! stream
//! 10 0 11 15 << /Type /Font >> [1 2 3]
//! endstream
//! ```

use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::Object;
use crate::parser::{parse_object_with, ParseContext};
use crate::parser_config::ParseOptions;

/// Upper bound on `/N`, far above anything a real producer writes.
const MAX_OBJECTS_PER_STREAM: i64 = 1_000_000;

/// Decode an object stream and parse every object in it.
///
/// The result is indexed by position in the stream, matching the index
/// stored in compressed cross-reference entries. An entry that fails to
/// parse is logged and kept as `Null` so later indices stay aligned.
pub fn parse_object_stream(stream: &Object, options: &ParseOptions) -> Result<Vec<(u32, Object)>> {
    let dict = match stream {
        Object::Stream { dict, .. } => dict,
        other => {
            return Err(Error::InvalidObjectType {
                expected: "Stream".to_string(),
                found: other.type_name().to_string(),
            })
        },
    };
    if let Some(kind) = stream.dict_type() {
        if kind != "ObjStm" {
            return Err(Error::InvalidPdf(format!("expected /Type /ObjStm, got /{}", kind)));
        }
    }

    let count = dict
        .get("N")
        .and_then(|o| o.as_integer())
        .ok_or_else(|| Error::InvalidPdf("object stream missing /N".to_string()))?;
    let first = dict
        .get("First")
        .and_then(|o| o.as_integer())
        .ok_or_else(|| Error::InvalidPdf("object stream missing /First".to_string()))?;
    if !(0..=MAX_OBJECTS_PER_STREAM).contains(&count) || first < 0 {
        return Err(Error::InvalidPdf(format!(
            "object stream has invalid /N {} or /First {}",
            count, first
        )));
    }

    let data = stream.decode_stream_data_with_options(options)?;
    let first = first as usize;
    if first > data.len() {
        return Err(Error::InvalidPdf(format!(
            "object stream /First {} beyond decoded length {}",
            first,
            data.len()
        )));
    }

    let header = read_header(&data[..first], count as usize)?;
    let body = &data[first..];
    let ctx = ParseContext::from_options(options);

    let mut objects = Vec::with_capacity(header.len());
    for (i, &(number, offset)) in header.iter().enumerate() {
        let end = header
            .get(i + 1)
            .map(|&(_, next)| next)
            .unwrap_or(body.len())
            .min(body.len());
        let object = match body.get(offset..end.max(offset)) {
            Some(slice) => match parse_object_with(slice, &ctx) {
                Ok((_, obj)) => obj,
                Err(e) => {
                    log::warn!("Skipping object {} in object stream: {:?}", number, e);
                    Object::Null
                },
            },
            None => {
                log::warn!("Object {} in object stream has offset {} past the end", number, offset);
                Object::Null
            },
        };
        objects.push((number, object));
    }

    log::debug!("Extracted {} objects from object stream", objects.len());
    Ok(objects)
}

/// Read `count` `(number, offset)` pairs.
fn read_header(mut input: &[u8], count: usize) -> Result<Vec<(u32, usize)>> {
    let mut pairs = Vec::with_capacity(count.min(4096));

    for i in 0..count {
        let number = next_int(&mut input).and_then(|v| u32::try_from(v).ok());
        let offset = next_int(&mut input).and_then(|v| usize::try_from(v).ok());
        match (number, offset) {
            (Some(number), Some(offset)) => pairs.push((number, offset)),
            _ => {
                return Err(Error::ParseError {
                    offset: 0,
                    reason: format!("object stream header pair {} is malformed", i),
                })
            },
        }
    }

    Ok(pairs)
}

fn next_int<'a>(input: &mut &'a [u8]) -> Option<i64> {
    match token(*input) {
        Ok((rest, Token::Integer(v))) => {
            *input = rest;
            Some(v)
        },
        _ => None,
    }
}
