//! The PDF object model shared by the parser, the copier and the writer.
//!
//! Dictionaries keep their keys in insertion order ([`IndexMap`]), so a
//! dictionary parsed from a source file is written back with the same key
//! order and the merged output is reproducible.

use crate::decoders::DecodeParams;
use crate::error::{Error, Result};
use crate::parser_config::ParseOptions;
use indexmap::IndexMap;

/// A PDF dictionary: name keys (without the leading `/`) to objects.
pub type Dictionary = IndexMap<String, Object>;

/// A direct PDF object. Indirect objects appear as [`Object::Reference`].
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// `null`
    Null,
    /// `true` / `false`
    Boolean(bool),
    /// Whole number
    Integer(i64),
    /// Number written with a decimal point
    Real(f64),
    /// Literal or hex string, already unescaped
    String(Vec<u8>),
    /// Name without the leading `/`; each char is one byte of the original
    Name(String),
    /// `[ ... ]`
    Array(Vec<Object>),
    /// `<< ... >>`
    Dictionary(Dictionary),
    /// Stream (dictionary + raw, still-encoded data)
    Stream {
        /// Entries before `stream`
        dict: Dictionary,
        /// Stream data exactly as stored in the file
        data: bytes::Bytes,
    },
    /// `N G R`
    Reference(ObjectRef),
}

/// Number and generation of an indirect object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    /// Object number, the key of the object table
    pub id: u32,
    /// Generation; parsed and written but never used for lookup
    pub gen: u16,
}

impl ObjectRef {
    /// `id gen R`
    pub fn new(id: u32, gen: u16) -> Self {
        Self { id, gen }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} R", self.id, self.gen)
    }
}

impl Object {
    /// Variant name, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "Null",
            Object::Boolean(_) => "Boolean",
            Object::Integer(_) => "Integer",
            Object::Real(_) => "Real",
            Object::String(_) => "String",
            Object::Name(_) => "Name",
            Object::Array(_) => "Array",
            Object::Dictionary(_) => "Dictionary",
            Object::Stream { .. } => "Stream",
            Object::Reference(_) => "Reference",
        }
    }

    /// The value of an `Integer`.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to read a number, accepting both integers and reals.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// The text of a `Name`.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(s) => Some(s),
            _ => None,
        }
    }

    /// The dictionary of a dictionary or a stream.
    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    /// Items of an `Array`.
    pub fn as_array(&self) -> Option<&Vec<Object>> {
        match self {
            Object::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// The target of a `Reference`.
    pub fn as_reference(&self) -> Option<ObjectRef> {
        match self {
            Object::Reference(r) => Some(*r),
            _ => None,
        }
    }

    /// The value of a `Boolean`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Object::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// The value of a `Real` (integers are not converted).
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Object::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Bytes of a `String`.
    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this is `null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    /// The `/Type` name of a dictionary or stream, if any.
    pub fn dict_type(&self) -> Option<&str> {
        self.as_dict()?.get("Type")?.as_name()
    }

    /// Decode stream data using the filters named in the stream dictionary,
    /// with the default decompression limits.
    pub fn decode_stream_data(&self) -> Result<Vec<u8>> {
        self.decode_stream_data_with_options(&ParseOptions::default())
    }

    /// Decode stream data, enforcing the decompression limits in `options`.
    ///
    /// Only the filters needed to read cross-reference and object streams are
    /// supported; image codecs are never decoded because stream payloads are
    /// copied verbatim.
    pub fn decode_stream_data_with_options(&self, options: &ParseOptions) -> Result<Vec<u8>> {
        match self {
            Object::Stream { dict, data } => {
                let filters = dict
                    .get("Filter")
                    .map(extract_filter_names)
                    .unwrap_or_default();

                if filters.is_empty() {
                    return Ok(data.to_vec());
                }

                let decode_params = extract_decode_params(dict.get("DecodeParms"));
                crate::decoders::decode_stream_with_options(
                    data,
                    &filters,
                    decode_params.as_ref(),
                    Some(options),
                )
            },
            _ => Err(Error::InvalidObjectType {
                expected: "Stream".to_string(),
                found: self.type_name().to_string(),
            }),
        }
    }
}

/// `/Filter` as a list, whether it was one name or an array of names.
pub(crate) fn extract_filter_names(filter_obj: &Object) -> Vec<String> {
    match filter_obj {
        Object::Name(name) => vec![name.clone()],
        Object::Array(arr) => arr
            .iter()
            .filter_map(|obj| obj.as_name().map(|s| s.to_string()))
            .collect(),
        _ => vec![],
    }
}

/// Extract predictor parameters from a DecodeParms object.
///
/// DecodeParms is a dictionary, an array of dictionaries (one per filter),
/// or absent. For arrays the first dictionary is used.
pub(crate) fn extract_decode_params(params_obj: Option<&Object>) -> Option<DecodeParams> {
    let dict = match params_obj? {
        Object::Dictionary(d) => d,
        Object::Array(arr) => arr.iter().find_map(|obj| obj.as_dict())?,
        _ => return None,
    };

    let int_or = |key: &str, default: i64| {
        dict.get(key)
            .and_then(|obj| obj.as_integer())
            .unwrap_or(default)
    };

    Some(DecodeParams {
        predictor: int_or("Predictor", 1),
        columns: int_or("Columns", 1).max(1) as usize,
        colors: int_or("Colors", 1).max(1) as usize,
        bits_per_component: int_or("BitsPerComponent", 8).max(1) as usize,
    })
}
