//! PDF object parser.
//!
//! Recursive descent over lexer tokens: read a token, decide what kind of
//! object starts there, and recurse for arrays and dictionaries. A dictionary
//! followed by the `stream` keyword becomes a stream whose payload is copied
//! out of the input, so parsed objects never borrow the source buffer.
//!
//! Stream lengths are often indirect (`/Length 12 0 R`). Callers that can
//! look objects up pass a length resolver through [`ParseContext`]; without
//! one, or when the declared length is wrong, the parser scans for
//! `endstream` instead (lenient mode only).

use crate::error::{Error, Result};
use crate::lexer::{is_whitespace, skip_ws, token, Token};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::parser_config::ParseOptions;
use nom::IResult;

/// Resolves an indirect `/Length` reference to the integer it points to.
pub type LengthResolver<'r> = &'r dyn Fn(ObjectRef) -> Option<usize>;

/// Settings threaded through one parse.
#[derive(Clone, Copy)]
pub struct ParseContext<'r> {
    /// Maximum array/dictionary nesting
    pub max_nesting: usize,
    /// Reject wrong stream lengths and missing `endobj`
    pub strict: bool,
    /// Lookup for indirect stream lengths
    pub length_resolver: Option<LengthResolver<'r>>,
}

impl Default for ParseContext<'_> {
    fn default() -> Self {
        Self::from_options(&ParseOptions::default())
    }
}

impl<'r> ParseContext<'r> {
    /// Build a context from parse options, without a length resolver.
    pub fn from_options(options: &ParseOptions) -> Self {
        Self {
            max_nesting: options.max_nesting,
            strict: options.strict,
            length_resolver: None,
        }
    }

    /// Attach a resolver for indirect `/Length` values.
    pub fn with_length_resolver(mut self, resolver: LengthResolver<'r>) -> Self {
        self.length_resolver = Some(resolver);
        self
    }
}

fn fail<T>(input: &[u8], kind: nom::error::ErrorKind) -> IResult<&[u8], T> {
    Err(nom::Err::Error(nom::error::Error::new(input, kind)))
}

/// Decode escape sequences in a literal string body.
///
/// Handles `\n \r \t \b \f \( \) \\`, octal `\ddd` (1-3 digits), and line
/// continuations (`\` before an end-of-line). An unknown escape drops the
/// backslash. A bare CR or CRLF inside the string reads as LF.
///
/// ```
/// # use pdf_splice::parser::decode_literal_string;
/// assert_eq!(decode_literal_string(b"Section \\247 1"), b"Section \xa7 1");
/// assert_eq!(decode_literal_string(b"a\\\nb"), b"ab");
/// ```
pub fn decode_literal_string(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        let c = raw[i];
        if c == b'\r' {
            out.push(b'\n');
            i += if raw.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
            continue;
        }
        if c != b'\\' || i + 1 >= raw.len() {
            out.push(c);
            i += 1;
            continue;
        }

        let esc = raw[i + 1];
        i += 2;
        match esc {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0C),
            b'(' | b')' | b'\\' => out.push(esc),
            b'\n' => {},
            b'\r' => {
                if raw.get(i) == Some(&b'\n') {
                    i += 1;
                }
            },
            b'0'..=b'7' => {
                let mut code = (esc - b'0') as u32;
                let mut digits = 1;
                while digits < 3 && i < raw.len() && (b'0'..=b'7').contains(&raw[i]) {
                    code = code * 8 + (raw[i] - b'0') as u32;
                    i += 1;
                    digits += 1;
                }
                out.push((code & 0xFF) as u8);
            },
            other => out.push(other),
        }
    }

    out
}

/// Decode a hex string body. Whitespace is ignored; an odd final digit is
/// padded with 0.
///
/// ```
/// # use pdf_splice::parser::decode_hex;
/// assert_eq!(decode_hex(b"48 65 6C 6C 6F").unwrap(), b"Hello");
/// assert_eq!(decode_hex(b"414").unwrap(), vec![0x41, 0x40]);
/// ```
pub fn decode_hex(hex: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(hex.len() / 2 + 1);
    let mut high: Option<u8> = None;

    for &c in hex.iter().filter(|c| !is_whitespace(**c)) {
        let nibble = (c as char).to_digit(16).ok_or_else(|| Error::ParseError {
            offset: 0,
            reason: format!("invalid hex digit '{}'", c as char),
        })? as u8;
        match high.take() {
            Some(h) => out.push((h << 4) | nibble),
            None => high = Some(nibble),
        }
    }
    if let Some(h) = high {
        out.push(h << 4);
    }

    Ok(out)
}

/// Parse one PDF object with default settings.
///
/// ```
/// use pdf_splice::parser::parse_object;
///
/// let (_, obj) = parse_object(b"[ 1 2 0 R /Name (str) ]").unwrap();
/// assert_eq!(obj.as_array().map(|a| a.len()), Some(3));
/// ```
pub fn parse_object(input: &[u8]) -> IResult<&[u8], Object> {
    parse_object_with(input, &ParseContext::default())
}

/// Parse one PDF object using the given context.
pub fn parse_object_with<'a>(input: &'a [u8], ctx: &ParseContext<'_>) -> IResult<&'a [u8], Object> {
    parse_value(input, ctx, 0)
}

fn parse_value<'a>(
    input: &'a [u8],
    ctx: &ParseContext<'_>,
    depth: usize,
) -> IResult<&'a [u8], Object> {
    let (rest, tok) = token(input)?;

    match tok {
        Token::Null => Ok((rest, Object::Null)),
        Token::True => Ok((rest, Object::Boolean(true))),
        Token::False => Ok((rest, Object::Boolean(false))),
        Token::Real(r) => Ok((rest, Object::Real(r))),
        Token::Name(name) => Ok((rest, Object::Name(name))),
        Token::LiteralString(raw) => Ok((rest, Object::String(decode_literal_string(raw)))),
        Token::HexString(raw) => match decode_hex(raw) {
            Ok(bytes) => Ok((rest, Object::String(bytes))),
            Err(_) => fail(input, nom::error::ErrorKind::HexDigit),
        },
        Token::Integer(i) => {
            // `id gen R`
            if let Ok((after_gen, Token::Integer(gen))) = token(rest) {
                if let Ok((after_r, Token::R)) = token(after_gen) {
                    if let (Ok(id), Ok(gen)) = (u32::try_from(i), u16::try_from(gen)) {
                        return Ok((after_r, Object::Reference(ObjectRef::new(id, gen))));
                    }
                }
            }
            Ok((rest, Object::Integer(i)))
        },
        Token::ArrayStart => {
            if depth >= ctx.max_nesting {
                return fail(input, nom::error::ErrorKind::TooLarge);
            }
            parse_array(rest, ctx, depth + 1)
        },
        Token::DictStart => {
            if depth >= ctx.max_nesting {
                return fail(input, nom::error::ErrorKind::TooLarge);
            }
            let (after_dict, dict) = parse_dict(rest, ctx, depth + 1)?;
            match token(after_dict) {
                Ok((after_kw, Token::StreamStart)) => {
                    let (after_stream, data) = parse_stream_data(after_kw, &dict, ctx)?;
                    Ok((
                        after_stream,
                        Object::Stream {
                            dict,
                            data: bytes::Bytes::copy_from_slice(data),
                        },
                    ))
                },
                _ => Ok((after_dict, Object::Dictionary(dict))),
            }
        },
        _ => fail(input, nom::error::ErrorKind::Tag),
    }
}

/// Array body after `[`. An array cut off by end of input is returned as is.
fn parse_array<'a>(
    mut input: &'a [u8],
    ctx: &ParseContext<'_>,
    depth: usize,
) -> IResult<&'a [u8], Object> {
    let mut items = Vec::new();
    loop {
        match token(input) {
            Ok((rest, Token::ArrayEnd)) => return Ok((rest, Object::Array(items))),
            Err(_) if skip_ws(input).map(|(r, _)| r.is_empty()).unwrap_or(false) => {
                log::warn!("Unterminated array at end of input");
                return Ok((&input[input.len()..], Object::Array(items)));
            },
            _ => {
                let (rest, item) = parse_value(input, ctx, depth)?;
                items.push(item);
                input = rest;
            },
        }
    }
}

/// Dictionary body after `<<`. Keys must be names; a later duplicate key
/// replaces the earlier value but keeps its position.
fn parse_dict<'a>(
    mut input: &'a [u8],
    ctx: &ParseContext<'_>,
    depth: usize,
) -> IResult<&'a [u8], Dictionary> {
    let mut dict = Dictionary::new();
    loop {
        match token(input) {
            Ok((rest, Token::DictEnd)) => return Ok((rest, dict)),
            Ok((rest, Token::Name(key))) => {
                let (rest, value) = parse_value(rest, ctx, depth)?;
                dict.insert(key, value);
                input = rest;
            },
            Err(_) if skip_ws(input).map(|(r, _)| r.is_empty()).unwrap_or(false) => {
                log::warn!("Unterminated dictionary at end of input");
                return Ok((&input[input.len()..], dict));
            },
            _ => return fail(input, nom::error::ErrorKind::Tag),
        }
    }
}

/// Read the payload following the `stream` keyword and consume `endstream`.
fn parse_stream_data<'a>(
    input: &'a [u8],
    dict: &Dictionary,
    ctx: &ParseContext<'_>,
) -> IResult<&'a [u8], &'a [u8]> {
    // `stream` must be followed by CRLF or LF; a lone CR is tolerated
    let input = if input.starts_with(b"\r\n") {
        &input[2..]
    } else if input.starts_with(b"\n") || input.starts_with(b"\r") {
        &input[1..]
    } else {
        input
    };

    let declared = match dict.get("Length") {
        Some(Object::Integer(n)) => usize::try_from(*n).ok(),
        Some(Object::Reference(r)) => ctx.length_resolver.and_then(|resolve| resolve(*r)),
        _ => None,
    };

    if let Some(len) = declared {
        if len <= input.len() {
            if let Ok((rest, Token::StreamEnd)) = token(&input[len..]) {
                return Ok((rest, &input[..len]));
            }
        }
        if ctx.strict {
            return fail(input, nom::error::ErrorKind::LengthValue);
        }
        log::debug!("Stream /Length {} does not land on endstream, scanning", len);
    } else if ctx.strict {
        return fail(input, nom::error::ErrorKind::LengthValue);
    }

    let end = match find_keyword(input, b"endstream") {
        Some(pos) => pos,
        None => return fail(input, nom::error::ErrorKind::Eof),
    };
    let mut data = &input[..end];
    // The EOL before endstream is not part of the data
    if data.ends_with(b"\r\n") {
        data = &data[..data.len() - 2];
    } else if data.ends_with(b"\n") || data.ends_with(b"\r") {
        data = &data[..data.len() - 1];
    }
    Ok((&input[end + b"endstream".len()..], data))
}

pub(crate) fn find_keyword(haystack: &[u8], keyword: &[u8]) -> Option<usize> {
    haystack.windows(keyword.len()).position(|w| w == keyword)
}

/// Parse an indirect object `id gen obj ... endobj`.
///
/// In lenient mode a missing `endobj` is accepted.
pub fn parse_indirect_object<'a>(
    input: &'a [u8],
    ctx: &ParseContext<'_>,
) -> IResult<&'a [u8], (ObjectRef, Object)> {
    let (rest, id) = match token(input)? {
        (rest, Token::Integer(id)) => (rest, id),
        _ => return fail(input, nom::error::ErrorKind::Digit),
    };
    let (rest, gen) = match token(rest)? {
        (rest, Token::Integer(gen)) => (rest, gen),
        _ => return fail(input, nom::error::ErrorKind::Digit),
    };
    let rest = match token(rest)? {
        (rest, Token::ObjStart) => rest,
        _ => return fail(input, nom::error::ErrorKind::Tag),
    };
    let (id, gen) = match (u32::try_from(id), u16::try_from(gen)) {
        (Ok(id), Ok(gen)) => (id, gen),
        _ => return fail(input, nom::error::ErrorKind::TooLarge),
    };

    let (rest, object) = parse_value(rest, ctx, 0)?;

    match token(rest) {
        Ok((after, Token::ObjEnd)) => Ok((after, (ObjectRef::new(id, gen), object))),
        _ if !ctx.strict => {
            log::debug!("Object {} {} has no endobj", id, gen);
            Ok((rest, (ObjectRef::new(id, gen), object)))
        },
        _ => fail(rest, nom::error::ErrorKind::Tag),
    }
}

/// Parse the indirect object starting at `offset` in `data`, converting nom
/// failures into [`Error::ParseError`] carrying the absolute offset.
pub fn parse_indirect_object_at(
    data: &[u8],
    offset: usize,
    ctx: &ParseContext<'_>,
) -> Result<(ObjectRef, Object)> {
    let input = data.get(offset..).ok_or_else(|| Error::ParseError {
        offset,
        reason: format!("offset beyond end of file ({} bytes)", data.len()),
    })?;
    parse_indirect_object(input, ctx)
        .map(|(_, parsed)| parsed)
        .map_err(|e| nom_to_error(data, e))
}

/// Convert a nom error into [`Error::ParseError`] with an offset relative to
/// `whole`.
pub(crate) fn nom_to_error(whole: &[u8], err: nom::Err<nom::error::Error<&[u8]>>) -> Error {
    match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => Error::ParseError {
            offset: whole.len().saturating_sub(e.input.len()),
            reason: format!("{:?}", e.code),
        },
        nom::Err::Incomplete(_) => Error::ParseError {
            offset: whole.len(),
            reason: "unexpected end of input".to_string(),
        },
    }
}
