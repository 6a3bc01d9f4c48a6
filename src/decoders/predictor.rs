//! Predictor reversal for Flate-encoded structural streams.
//!
//! Cross-reference streams are almost always written with a PNG "Up"
//! predictor (`/Predictor 12`) over rows of `/Columns` bytes. TIFF predictor 2
//! and the other PNG row filters are handled for completeness.

use crate::error::{Error, Result};

/// Predictor parameters from a stream's `/DecodeParms`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeParams {
    /// Predictor algorithm (1 = none, 2 = TIFF, 10-15 = PNG)
    pub predictor: i64,
    /// Samples per row
    pub columns: usize,
    /// Color components per sample
    pub colors: usize,
    /// Bits per component
    pub bits_per_component: usize,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            columns: 1,
            colors: 1,
            bits_per_component: 8,
        }
    }
}

impl DecodeParams {
    /// Bytes of sample data in one row, excluding any PNG tag byte.
    pub fn row_len(&self) -> usize {
        (self.columns * self.colors * self.bits_per_component).div_ceil(8)
    }

    /// Bytes per complete sample, used as the "left" distance (at least 1).
    fn sample_len(&self) -> usize {
        (self.colors * self.bits_per_component).div_ceil(8).max(1)
    }
}

/// Reverse the predictor described by `params`.
pub fn decode_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        2 => Ok(undo_tiff(data, params)),
        10..=15 => undo_png(data, params),
        other => Err(Error::Decode(format!("Unsupported predictor: {}", other))),
    }
}

fn undo_tiff(data: &[u8], params: &DecodeParams) -> Vec<u8> {
    let row_len = params.row_len().max(1);
    let step = params.sample_len();
    let mut out = data.to_vec();
    for row in out.chunks_mut(row_len) {
        for i in step..row.len() {
            row[i] = row[i].wrapping_add(row[i - step]);
        }
    }
    out
}

fn undo_png(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let row_len = params.row_len();
    let stride = row_len + 1;
    let step = params.sample_len();

    let rows = data.len() / stride;
    if data.len() % stride != 0 {
        log::warn!(
            "Predictor input of {} bytes is not a whole number of {}-byte rows; dropping {} bytes",
            data.len(),
            stride,
            data.len() % stride
        );
    }

    let mut out = Vec::with_capacity(rows * row_len);
    let mut prev = vec![0u8; row_len];

    for encoded in data.chunks_exact(stride) {
        let tag = encoded[0];
        let src = &encoded[1..];
        let mut row = vec![0u8; row_len];

        for i in 0..row_len {
            let left = if i >= step { row[i - step] } else { 0 };
            let up = prev[i];
            let up_left = if i >= step { prev[i - step] } else { 0 };
            let predicted = match tag {
                0 => 0,
                1 => left,
                2 => up,
                3 => ((left as u16 + up as u16) / 2) as u8,
                4 => paeth(left, up, up_left),
                _ => return Err(Error::Decode(format!("Invalid PNG predictor tag: {}", tag))),
            };
            row[i] = src[i].wrapping_add(predicted);
        }

        out.extend_from_slice(&row);
        prev = row;
    }

    Ok(out)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}
