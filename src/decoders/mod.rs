//! Stream decoders for the filters found on structural streams.
//!
//! The merge engine never decodes page content or images; their bytes are
//! copied verbatim. Decoding is only needed to read cross-reference streams
//! and object streams, which in practice use:
//! - FlateDecode (zlib/deflate), usually with a PNG predictor
//! - ASCIIHexDecode (rare, but cheap to support)

use crate::error::{Error, Result};
use crate::parser_config::ParseOptions;

mod ascii_hex;
mod flate;
mod predictor;

pub use ascii_hex::AsciiHexDecoder;
pub use flate::FlateDecoder;
pub use predictor::{decode_predictor, DecodeParams};

/// Trait for PDF stream decoders.
///
/// Each decoder implements one PDF filter algorithm.
pub trait StreamDecoder {
    /// Decode the input data.
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Get the name of this decoder (e.g., "FlateDecode").
    fn name(&self) -> &str;
}

/// Look up the decoder for a filter name.
///
/// Abbreviated names (`/Fl`, `/AHx`) are accepted as well.
fn decoder_for(filter_name: &str) -> Result<Box<dyn StreamDecoder>> {
    match filter_name {
        "FlateDecode" | "Fl" => Ok(Box::new(FlateDecoder)),
        "ASCIIHexDecode" | "AHx" => Ok(Box::new(AsciiHexDecoder)),
        _ => Err(Error::UnsupportedFilter(filter_name.to_string())),
    }
}

/// Decode stream data using a filter pipeline.
///
/// # Examples
///
/// ```
/// use pdf_splice::decoders::decode_stream;
///
/// let decoded = decode_stream(b"48656C6C6F>", &["ASCIIHexDecode".to_string()]).unwrap();
/// assert_eq!(decoded, b"Hello");
/// ```
pub fn decode_stream(data: &[u8], filters: &[String]) -> Result<Vec<u8>> {
    decode_stream_with_options(data, filters, None, None)
}

/// Decode stream data with predictor parameters and decompression limits.
///
/// Filters are applied in order; the predictor (if any) is reversed after the
/// last filter. The decompression ratio and output size are checked after
/// every filter using the limits in `options` (or the lenient defaults).
pub fn decode_stream_with_options(
    data: &[u8],
    filters: &[String],
    params: Option<&DecodeParams>,
    options: Option<&ParseOptions>,
) -> Result<Vec<u8>> {
    let defaults = ParseOptions::default();
    let options = options.unwrap_or(&defaults);
    let max_ratio = options.max_decompression_ratio as u64;
    let max_size = options.max_decompressed_size;

    let compressed_size = data.len().max(1) as u64;
    let mut current = data.to_vec();

    for filter_name in filters {
        let decoder = decoder_for(filter_name)?;
        current = decoder.decode(&current)?;

        if max_ratio > 0 && current.len() as u64 / compressed_size > max_ratio {
            return Err(Error::Decode(format!(
                "decompression ratio exceeds {}:1 ({} bytes -> {} bytes)",
                max_ratio,
                data.len(),
                current.len()
            )));
        }

        if max_size > 0 && current.len() > max_size {
            return Err(Error::Decode(format!(
                "decompressed size {} bytes exceeds limit {} bytes",
                current.len(),
                max_size
            )));
        }
    }

    if let Some(params) = params {
        if params.predictor > 1 {
            current = decode_predictor(&current, params)?;
        }
    }

    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_decode_stream_no_filters() {
        let data = b"Hello, World!";
        assert_eq!(decode_stream(data, &[]).unwrap(), data);
    }

    #[test]
    fn test_decode_stream_unsupported_filter() {
        let result = decode_stream(b"test", &["DCTDecode".to_string()]);
        match result {
            Err(Error::UnsupportedFilter(name)) => assert_eq!(name, "DCTDecode"),
            other => panic!("Expected UnsupportedFilter error, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_stream_chain() {
        // ASCIIHex wrapping a zlib stream
        let compressed = zlib(b"chained filters");
        let hex: String = compressed.iter().map(|b| format!("{:02X}", b)).collect();
        let filters = vec!["ASCIIHexDecode".to_string(), "FlateDecode".to_string()];
        let decoded = decode_stream(hex.as_bytes(), &filters).unwrap();
        assert_eq!(decoded, b"chained filters");
    }

    #[test]
    fn test_abbreviated_filter_names() {
        let compressed = zlib(b"short name");
        let decoded = decode_stream(&compressed, &["Fl".to_string()]).unwrap();
        assert_eq!(decoded, b"short name");
    }

    #[test]
    fn test_decompression_ratio_limit() {
        let compressed = zlib(&vec![0u8; 200_000]);
        let options = ParseOptions {
            max_decompression_ratio: 10,
            ..ParseOptions::default()
        };
        let result = decode_stream_with_options(
            &compressed,
            &["FlateDecode".to_string()],
            None,
            Some(&options),
        );
        assert!(matches!(result, Err(Error::Decode(_))));
    }

    #[test]
    fn test_decompressed_size_limit() {
        let compressed = zlib(&vec![7u8; 4096]);
        let options = ParseOptions {
            max_decompression_ratio: 0,
            max_decompressed_size: 1024,
            ..ParseOptions::default()
        };
        let result = decode_stream_with_options(
            &compressed,
            &["FlateDecode".to_string()],
            None,
            Some(&options),
        );
        assert!(matches!(result, Err(Error::Decode(_))));
    }

    #[test]
    fn test_predictor_applied_after_filters() {
        // Two PNG "Up" rows of three bytes
        let raw = [2u8, 1, 2, 3, 2, 1, 1, 1];
        let params = DecodeParams {
            predictor: 12,
            columns: 3,
            ..DecodeParams::default()
        };
        let decoded = decode_stream_with_options(
            &zlib(&raw),
            &["FlateDecode".to_string()],
            Some(&params),
            None,
        )
        .unwrap();
        assert_eq!(decoded, vec![1, 2, 3, 2, 3, 4]);
    }
}
