//! Pure Rust image processing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG) | `image::ImageReader` with a guessed format |
//! | EXIF orientation | `ImageDecoder::orientation` + `DynamicImage::apply_orientation` |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` filter |
//! | Watermark | `image::imageops::overlay` (alpha-blended, clipped) |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` (quality 90, RGB8) |
//! | Encode → PNG | `image::codecs::png::PngEncoder` |
//!
//! Re-encoding never writes EXIF, so the orientation tag is dropped once the
//! pixels have been rotated into place.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::{calculate_anchor_offset, calculate_bounded_dimensions};
use super::params::{NormalizeParams, RasterFormat, Watermark};
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader};
use std::io::Cursor;

/// JPEG re-encoding quality.
const JPEG_QUALITY: u8 = 90;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode an in-memory image, returning the pixels and the orientation the
/// container declares.
fn decode(bytes: &[u8]) -> Result<(DynamicImage, Orientation), BackendError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| BackendError::Decode(e.to_string()))?;
    let mut decoder = reader
        .into_decoder()
        .map_err(|e| BackendError::Decode(e.to_string()))?;
    // Malformed EXIF is not a reason to reject otherwise valid pixels.
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let img = DynamicImage::from_decoder(decoder).map_err(|e| BackendError::Decode(e.to_string()))?;
    if img.width() == 0 || img.height() == 0 {
        return Err(BackendError::Decode("image has no pixels".into()));
    }
    Ok((img, orientation))
}

fn apply_watermark(img: DynamicImage, watermark: &Watermark) -> Result<DynamicImage, BackendError> {
    let overlay = image::load_from_memory(&watermark.bytes)
        .map_err(|e| BackendError::Watermark(e.to_string()))?
        .to_rgba8();
    let mut canvas = img.to_rgba8();
    let (x, y) = calculate_anchor_offset(
        watermark.position,
        canvas.dimensions(),
        overlay.dimensions(),
    );
    image::imageops::overlay(&mut canvas, &overlay, x, y);
    Ok(DynamicImage::ImageRgba8(canvas))
}

fn encode(img: &DynamicImage, format: RasterFormat) -> Result<Vec<u8>, BackendError> {
    let mut out = Vec::new();
    let result = match format {
        RasterFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            let encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
            rgb.write_with_encoder(encoder)
        }
        RasterFormat::Png => {
            let encoder = image::codecs::png::PngEncoder::new(&mut out);
            img.write_with_encoder(encoder)
        }
    };
    result.map_err(|e| BackendError::Encode(e.to_string()))?;
    Ok(out)
}

impl ImageBackend for RustBackend {
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, BackendError> {
        let (img, _) = decode(bytes)?;
        Ok(Dimensions {
            width: img.width(),
            height: img.height(),
        })
    }

    fn normalize(&self, bytes: &[u8], params: &NormalizeParams) -> Result<Vec<u8>, BackendError> {
        let (mut img, orientation) = decode(bytes)?;

        if let Some(max_size) = params.max_size {
            let (w, h) = calculate_bounded_dimensions((img.width(), img.height()), max_size);
            if (w, h) != (img.width(), img.height()) {
                img = img.resize_exact(w, h, FilterType::Lanczos3);
            }
        }

        if let Some(watermark) = &params.watermark {
            img = apply_watermark(img, watermark)?;
        }

        img.apply_orientation(orientation);

        encode(&img, params.format)
    }
}
