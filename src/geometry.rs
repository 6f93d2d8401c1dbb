//! Pixel-buffer geometry: canvas allocation, bounded resize, encode/decode
//!
//! Consolidates the pure image operations the pipeline needs so the
//! orchestrator and the bounds detector never talk to the codec layer
//! directly.

use crate::error::{CutoutError, Result};
use crate::types::{BoundingBox, EncodedImage, ImageMime};
use image::{imageops, DynamicImage, RgbaImage};
use std::io::Cursor;
use tracing::debug;

/// Allocate a transparent RGBA canvas
///
/// # Errors
/// - Either dimension is zero
pub fn create_canvas(width: u32, height: u32) -> Result<RgbaImage> {
    if width == 0 || height == 0 {
        return Err(CutoutError::processing_fatal(format!(
            "Invalid canvas dimensions: {width}x{height} (both must be positive)"
        )));
    }
    Ok(RgbaImage::new(width, height))
}

/// Compute output dimensions that fit `(width, height)` inside
/// `(max_width, max_height)` without upscaling and preserving aspect ratio
///
/// Two-pass: scale by width first; if the resulting height still exceeds the
/// bound, re-scale by height recomputing width. Both constraints hold
/// simultaneously without iterative search.
#[must_use]
pub fn fit_dimensions(
    width: u32,
    height: u32,
    max_width: u32,
    max_height: u32,
) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }

    let aspect = f64::from(width) / f64::from(height);

    let mut new_width = max_width;
    let mut new_height = (f64::from(max_width) / aspect).round() as u32;

    if new_height > max_height {
        new_height = max_height;
        new_width = (f64::from(max_height) * aspect).round() as u32;
    }

    (new_width.max(1), new_height.max(1))
}

/// Scale an image down to fit within `(max_width, max_height)`
///
/// Never upscales; an image already within bounds is returned as an
/// unscaled RGBA copy. Aspect ratio is preserved to within rounding error.
#[must_use]
pub fn resize_to_fit(image: &DynamicImage, max_width: u32, max_height: u32) -> RgbaImage {
    let (width, height) = (image.width(), image.height());
    let (new_width, new_height) = fit_dimensions(width, height, max_width, max_height);

    if (new_width, new_height) == (width, height) {
        return image.to_rgba8();
    }

    debug!(
        "Resizing {}x{} -> {}x{} (bounds {}x{})",
        width, height, new_width, new_height, max_width, max_height
    );
    imageops::resize(
        &image.to_rgba8(),
        new_width,
        new_height,
        imageops::FilterType::Triangle,
    )
}

/// Encode a pixel buffer into the requested container at the given quality
///
/// Quality is a `0.0..=1.0` fraction. PNG and WebP (lossless) ignore it;
/// JPEG maps it onto the codec's 0-100 scale.
///
/// # Errors
/// - `quality` outside `0.0..=1.0`
/// - Codec failure while writing the container
pub fn encode(image: &DynamicImage, mime: ImageMime, quality: f32) -> Result<EncodedImage> {
    if !(0.0..=1.0).contains(&quality) || !quality.is_finite() {
        return Err(CutoutError::processing_fatal(format!(
            "Invalid encode quality: {quality} (valid range: 0.0-1.0)"
        )));
    }

    let mut buffer = Vec::new();
    match mime {
        ImageMime::Png => {
            image
                .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
                .map_err(|e| CutoutError::processing(format!("Failed to encode PNG: {e}")))?;
        },
        ImageMime::Jpeg => {
            // JPEG has no alpha channel; flatten before encoding
            let rgb = image.to_rgb8();
            let jpeg_quality = (quality * 100.0).round() as u8;
            let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(
                Cursor::new(&mut buffer),
                jpeg_quality,
            );
            encoder
                .encode_image(&rgb)
                .map_err(|e| CutoutError::processing(format!("Failed to encode JPEG: {e}")))?;
        },
        #[cfg(feature = "webp-support")]
        ImageMime::WebP => {
            image
                .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::WebP)
                .map_err(|e| CutoutError::processing(format!("Failed to encode WebP: {e}")))?;
        },
        #[cfg(not(feature = "webp-support"))]
        ImageMime::WebP => {
            return Err(CutoutError::processing_fatal(
                "WebP output requires the `webp-support` feature",
            ));
        },
    }

    Ok(EncodedImage::new(buffer, mime))
}

/// Decode an encoded byte buffer into a pixel grid
///
/// # Errors
/// - Empty input
/// - Malformed or unsupported container
pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
    if bytes.is_empty() {
        return Err(CutoutError::processing_fatal(
            "Cannot decode an empty image buffer",
        ));
    }
    image::load_from_memory(bytes)
        .map_err(|e| CutoutError::processing(format!("Failed to decode image from bytes: {e}")))
}

/// Crop a pixel buffer to a bounding box
///
/// # Errors
/// - The box does not lie within the image
pub fn crop(image: &RgbaImage, bounds: &BoundingBox) -> Result<RgbaImage> {
    let (width, height) = image.dimensions();
    if !bounds.fits_within(width, height) {
        return Err(CutoutError::processing_fatal(format!(
            "Crop bounds {}x{}+{}+{} exceed image extents {width}x{height}",
            bounds.width(),
            bounds.height(),
            bounds.left,
            bounds.top
        )));
    }
    Ok(imageops::crop_imm(
        image,
        bounds.left,
        bounds.top,
        bounds.width(),
        bounds.height(),
    )
    .to_image())
}
