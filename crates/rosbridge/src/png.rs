// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! PNG-compressed envelopes.
//!
//! With `compression: "png"` the bridge sends `{"op":"png","data":...}` where
//! `data` is a base64 PNG whose pixel bytes, read row by row in channel order,
//! spell out the JSON text of the real envelope. Unused pixels at the end are
//! padded with `\n`; fully-opaque alpha bytes (`0xFF`) are not part of the
//! text.

use crate::error::DecodeError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::io::Cursor;

/// Byte value that never belongs to the embedded text.
const SENTINEL: u8 = 0xFF;

/// Padding used to fill the last row.
const PADDING: u8 = b'\n';

/// Recover the JSON text carried by a `png` envelope's `data` field.
pub fn decode_text(data: &str) -> Result<String, DecodeError> {
    let bytes = BASE64
        .decode(data.trim())
        .map_err(|e| DecodeError::Png(format!("invalid base64: {}", e)))?;

    let mut decoder = png::Decoder::new(Cursor::new(bytes));
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder
        .read_info()
        .map_err(|e| DecodeError::Png(format!("invalid image: {}", e)))?;

    let mut pixels = vec![0; reader.output_buffer_size()];
    let frame = reader
        .next_frame(&mut pixels)
        .map_err(|e| DecodeError::Png(format!("invalid image data: {}", e)))?;
    pixels.truncate(frame.buffer_size());

    let text: String = pixels
        .chunks_exact(frame.line_size.max(1))
        .flat_map(|row| row.iter().copied().filter(|&b| b != SENTINEL))
        .map(char::from)
        .collect();

    if text.trim().is_empty() {
        return Err(DecodeError::Png("image carries no text".into()));
    }
    Ok(text)
}

/// Embed `text` in a square RGB PNG and base64 it, the way the bridge does.
pub fn encode_text(text: &str) -> Result<String, png::EncodingError> {
    let pixels_needed = text.len().div_ceil(3).max(1);
    let mut width = (pixels_needed as f64).sqrt() as usize;
    while width * width < pixels_needed {
        width += 1;
    }

    let mut data = text.as_bytes().to_vec();
    data.resize(width * width * 3, PADDING);

    let side = u32::try_from(width).unwrap_or(u32::MAX);

    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, side, side);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&data)?;
    }
    Ok(BASE64.encode(out))
}
