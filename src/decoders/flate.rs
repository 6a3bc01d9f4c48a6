//! FlateDecode (zlib/deflate) implementation.
//!
//! Uses the flate2 crate. Object and cross-reference streams written by
//! sloppy producers occasionally carry a broken zlib wrapper or a truncated
//! checksum, so decoding falls back to raw deflate and accepts output that was
//! produced before the error.

use crate::decoders::StreamDecoder;
use crate::error::{Error, Result};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use std::io::Read;

/// FlateDecode filter implementation.
pub struct FlateDecoder;

impl StreamDecoder for FlateDecoder {
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        let zlib_err = match ZlibDecoder::new(input).read_to_end(&mut output) {
            Ok(_) => return Ok(output),
            Err(e) => e,
        };

        // Typically a bad Adler-32 trailer after a complete deflate body
        if !output.is_empty() {
            log::warn!(
                "FlateDecode partial recovery: kept {} bytes before error: {}",
                output.len(),
                zlib_err
            );
            return Ok(output);
        }

        log::debug!("Zlib decode failed ({}), trying raw deflate", zlib_err);
        for skip in [0usize, 2] {
            if skip >= input.len() {
                break;
            }
            output.clear();
            match DeflateDecoder::new(&input[skip..]).read_to_end(&mut output) {
                Ok(_) if !output.is_empty() => {
                    log::debug!("Raw deflate (skip {}) recovered {} bytes", skip, output.len());
                    return Ok(output);
                },
                Err(_) if !output.is_empty() => {
                    log::warn!(
                        "Raw deflate (skip {}) partial recovery: {} bytes",
                        skip,
                        output.len()
                    );
                    return Ok(output);
                },
                _ => continue,
            }
        }

        Err(Error::Decode(format!(
            "FlateDecode decompression failed ({} compressed bytes): {}",
            input.len(),
            zlib_err
        )))
    }

    fn name(&self) -> &str {
        "FlateDecode"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::{DeflateEncoder, ZlibEncoder};
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_flate_decode_simple() {
        let original = b"Hello, FlateDecode!";
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(original).unwrap();
        let compressed = encoder.finish().unwrap();

        assert_eq!(FlateDecoder.decode(&compressed).unwrap(), original);
    }

    #[test]
    fn test_flate_decode_large_data() {
        let original = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ".repeat(1000);
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&original).unwrap();
        let compressed = encoder.finish().unwrap();

        assert_eq!(FlateDecoder.decode(&compressed).unwrap(), original);
    }

    #[test]
    fn test_flate_decode_raw_deflate_fallback() {
        let original = b"raw deflate without a zlib wrapper";
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(original).unwrap();
        let compressed = encoder.finish().unwrap();

        assert_eq!(FlateDecoder.decode(&compressed).unwrap(), original);
    }

    #[test]
    fn test_flate_decode_invalid_data() {
        // Reserved block type in every interpretation
        let invalid = [0xFFu8; 16];
        let result = FlateDecoder.decode(&invalid);
        match result {
            Err(Error::Decode(msg)) => assert!(msg.contains("FlateDecode decompression failed")),
            other => panic!("Expected Decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_flate_decoder_name() {
        assert_eq!(FlateDecoder.name(), "FlateDecode");
    }
}
