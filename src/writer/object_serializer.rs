//! PDF object serialization.
//!
//! Serializes [`Object`] values to their byte representation. Dictionaries
//! are written in insertion order, so a deterministic object table yields
//! byte-identical output.

use crate::lexer::is_regular;
use crate::object::{Dictionary, Object, ObjectRef};
use std::io::{self, Write};

/// Serializer for PDF objects.
#[derive(Debug, Clone, Default)]
pub struct ObjectSerializer {
    /// Put each dictionary entry on its own line
    pretty: bool,
}

impl ObjectSerializer {
    /// Create a compact serializer (single-line dictionaries).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a serializer that writes one dictionary entry per line.
    pub fn pretty() -> Self {
        Self { pretty: true }
    }

    /// Serialize an object to bytes.
    pub fn serialize(&self, obj: &Object) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write_object(&mut buf, obj)?;
        Ok(buf)
    }

    /// Serialize an object to a string (for debugging).
    pub fn serialize_to_string(&self, obj: &Object) -> io::Result<String> {
        Ok(String::from_utf8_lossy(&self.serialize(obj)?).into_owned())
    }

    /// Write an indirect object definition: `{id} {gen} obj\n{object}\nendobj\n`.
    pub fn write_indirect<W: Write>(&self, w: &mut W, r: ObjectRef, obj: &Object) -> io::Result<()> {
        writeln!(w, "{} {} obj", r.id, r.gen)?;
        self.write_object(w, obj)?;
        w.write_all(b"\nendobj\n")
    }

    /// Write a direct object.
    pub fn write_object<W: Write>(&self, w: &mut W, obj: &Object) -> io::Result<()> {
        match obj {
            Object::Null => w.write_all(b"null"),
            Object::Boolean(b) => w.write_all(if *b { b"true" } else { b"false" }),
            Object::Integer(i) => write!(w, "{}", i),
            Object::Real(r) => write_real(w, *r),
            Object::String(s) => write_string(w, s),
            Object::Name(n) => write_name(w, n),
            Object::Array(arr) => self.write_array(w, arr),
            Object::Dictionary(dict) => self.write_dictionary(w, dict),
            Object::Stream { dict, data } => self.write_stream(w, dict, data),
            Object::Reference(r) => write!(w, "{} {} R", r.id, r.gen),
        }
    }

    fn write_array<W: Write>(&self, w: &mut W, arr: &[Object]) -> io::Result<()> {
        w.write_all(b"[")?;
        for (i, obj) in arr.iter().enumerate() {
            if i > 0 {
                w.write_all(b" ")?;
            }
            self.write_object(w, obj)?;
        }
        w.write_all(b"]")
    }

    fn write_dictionary<W: Write>(&self, w: &mut W, dict: &Dictionary) -> io::Result<()> {
        w.write_all(b"<<")?;
        for (key, value) in dict {
            w.write_all(if self.pretty { b"\n  " } else { b" " })?;
            write_name(w, key)?;
            w.write_all(b" ")?;
            self.write_object(w, value)?;
        }
        w.write_all(if self.pretty && !dict.is_empty() { b"\n>>" } else { b" >>" })
    }

    /// `/Length` always reflects the payload being written.
    fn write_stream<W: Write>(&self, w: &mut W, dict: &Dictionary, data: &[u8]) -> io::Result<()> {
        let mut dict = dict.clone();
        dict.insert("Length".to_string(), Object::Integer(data.len() as i64));
        self.write_dictionary(w, &dict)?;
        w.write_all(b"\nstream\n")?;
        w.write_all(data)?;
        w.write_all(b"\nendstream")
    }
}

/// Integral values print without a fraction. Others use the shortest
/// plain decimal that reads back as the same `f64` (`Display` for floats
/// never switches to exponent notation, which PDF does not allow).
fn write_real<W: Write>(w: &mut W, value: f64) -> io::Result<()> {
    if !value.is_finite() {
        return w.write_all(b"0");
    }
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        return write!(w, "{}", value as i64);
    }
    write!(w, "{}", value)
}

/// Literal syntax for printable text, hex syntax for anything else.
fn write_string<W: Write>(w: &mut W, data: &[u8]) -> io::Result<()> {
    let printable = data
        .iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b'\t' || (0x20..=0x7E).contains(&b));

    if !printable {
        w.write_all(b"<")?;
        for byte in data {
            write!(w, "{:02X}", byte)?;
        }
        return w.write_all(b">");
    }

    w.write_all(b"(")?;
    for &byte in data {
        match byte {
            b'(' => w.write_all(b"\\(")?,
            b')' => w.write_all(b"\\)")?,
            b'\\' => w.write_all(b"\\\\")?,
            b'\n' => w.write_all(b"\\n")?,
            b'\r' => w.write_all(b"\\r")?,
            b'\t' => w.write_all(b"\\t")?,
            _ => w.write_all(&[byte])?,
        }
    }
    w.write_all(b")")
}

/// Names hold one char per source byte; chars above U+00FF are written as
/// escaped UTF-8.
fn write_name<W: Write>(w: &mut W, name: &str) -> io::Result<()> {
    w.write_all(b"/")?;
    let mut utf8 = [0u8; 4];
    for ch in name.chars() {
        let code = ch as u32;
        let bytes: &[u8] = if code <= 0xFF {
            utf8[0] = code as u8;
            &utf8[..1]
        } else {
            ch.encode_utf8(&mut utf8).as_bytes()
        };
        for &byte in bytes {
            if is_regular(byte) && byte != b'#' && (0x21..=0x7E).contains(&byte) {
                w.write_all(&[byte])?;
            } else {
                write!(w, "#{:02X}", byte)?;
            }
        }
    }
    Ok(())
}

/// Helper functions for building PDF objects.
impl ObjectSerializer {
    /// Create a Name object.
    pub fn name(s: &str) -> Object {
        Object::Name(s.to_string())
    }

    /// Create a String object from a Rust string.
    pub fn string(s: &str) -> Object {
        Object::String(s.as_bytes().to_vec())
    }

    /// Create an Integer object.
    pub fn integer(i: i64) -> Object {
        Object::Integer(i)
    }

    /// Create a Dictionary object, keeping entry order.
    pub fn dict(entries: Vec<(&str, Object)>) -> Object {
        Object::Dictionary(entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    /// Create a Reference object.
    pub fn reference(r: ObjectRef) -> Object {
        Object::Reference(r)
    }
}
