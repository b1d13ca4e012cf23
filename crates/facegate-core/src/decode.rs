//! Image payload decoding and boundary validation.
//!
//! Payloads arrive as base64 data URIs. Decoding is a pure transformation:
//! the size gate runs before any parse work, and nothing of the input is
//! retained once the pixel buffer exists.

use base64::{engine::general_purpose, Engine as _};
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("image exceeds the configured size limit ({size} > {limit} bytes)")]
    PayloadTooLarge { size: usize, limit: usize },
    #[error("invalid or unsupported image data")]
    InvalidImage,
    #[error("invalid base64 image payload")]
    InvalidBase64,
}

/// Raw encoded image bytes plus the media type the sender declared.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    bytes: Vec<u8>,
    media_type: Option<String>,
}

impl ImagePayload {
    pub fn new(bytes: Vec<u8>, media_type: Option<String>) -> Self {
        Self { bytes, media_type }
    }

    /// Parse a base64 payload, with or without a `data:<mime>;base64,` prefix.
    pub fn from_data_uri(input: &str) -> Result<Self, DecodeError> {
        let (media_type, encoded) = match input.split_once(',') {
            Some((header, rest)) if header.starts_with("data:") => {
                let mime = header
                    .trim_start_matches("data:")
                    .split(';')
                    .next()
                    .filter(|m| !m.is_empty())
                    .map(str::to_string);
                (mime, rest)
            }
            _ => (None, input),
        };

        let bytes = general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|_| DecodeError::InvalidBase64)?;

        Ok(Self { bytes, media_type })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn media_type(&self) -> Option<&str> {
        self.media_type.as_deref()
    }
}

/// Decode a payload into an RGB pixel buffer.
///
/// Rejects payloads over `max_content_length` before touching the decoder,
/// and anything the raster decoder does not accept (JPEG, PNG, BMP).
pub fn decode_image(payload: &ImagePayload, max_content_length: usize) -> Result<RgbImage, DecodeError> {
    if payload.bytes.len() > max_content_length {
        return Err(DecodeError::PayloadTooLarge {
            size: payload.bytes.len(),
            limit: max_content_length,
        });
    }

    let decoded = image::load_from_memory(&payload.bytes).map_err(|err| {
        tracing::debug!(error = %err, declared = ?payload.media_type, "image decode failed");
        DecodeError::InvalidImage
    })?;

    Ok(decoded.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([120, 80, 40]));
        let mut cursor = Cursor::new(Vec::new());
        img.write_to(&mut cursor, ImageFormat::Png).unwrap();
        cursor.into_inner()
    }

    #[test]
    fn decodes_png_payload() {
        let payload = ImagePayload::new(png_bytes(6, 4), None);
        let pixels = decode_image(&payload, 1 << 20).unwrap();
        assert_eq!(pixels.dimensions(), (6, 4));
        assert_eq!(pixels.get_pixel(0, 0).0, [120, 80, 40]);
    }

    #[test]
    fn decodes_jpeg_payload() {
        let img = RgbImage::from_pixel(8, 8, Rgb([200, 200, 200]));
        let mut cursor = Cursor::new(Vec::new());
        img.write_to(&mut cursor, ImageFormat::Jpeg).unwrap();
        let payload = ImagePayload::new(cursor.into_inner(), Some("image/jpeg".into()));
        let pixels = decode_image(&payload, 1 << 20).unwrap();
        assert_eq!(pixels.dimensions(), (8, 8));
    }

    #[test]
    fn rejects_oversized_payload_before_parsing() {
        // Not even valid image bytes — the size gate must fire first.
        let payload = ImagePayload::new(vec![0u8; 64], None);
        match decode_image(&payload, 32) {
            Err(DecodeError::PayloadTooLarge { size: 64, limit: 32 }) => {}
            other => panic!("expected PayloadTooLarge, got {other:?}"),
        }
    }

    #[test]
    fn rejects_undecodable_bytes() {
        let payload = ImagePayload::new(b"definitely not an image".to_vec(), None);
        assert!(matches!(decode_image(&payload, 1 << 20), Err(DecodeError::InvalidImage)));
    }

    #[test]
    fn parses_data_uri_prefix() {
        let encoded = general_purpose::STANDARD.encode(png_bytes(2, 2));
        let payload =
            ImagePayload::from_data_uri(&format!("data:image/png;base64,{encoded}")).unwrap();
        assert_eq!(payload.media_type(), Some("image/png"));
        assert!(decode_image(&payload, 1 << 20).is_ok());
    }

    #[test]
    fn parses_bare_base64() {
        let encoded = general_purpose::STANDARD.encode(png_bytes(2, 2));
        let payload = ImagePayload::from_data_uri(&encoded).unwrap();
        assert_eq!(payload.media_type(), None);
        assert!(decode_image(&payload, 1 << 20).is_ok());
    }

    #[test]
    fn rejects_malformed_base64() {
        assert!(matches!(
            ImagePayload::from_data_uri("data:image/png;base64,@@not-base64@@"),
            Err(DecodeError::InvalidBase64)
        ));
    }
}
