//! Core types for the extraction pipeline

use crate::error::{CutoutError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// MIME type tag carried alongside encoded image bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageMime {
    /// `image/png` — alpha channel transparency
    Png,
    /// `image/jpeg` — no transparency
    Jpeg,
    /// `image/webp` — alpha channel transparency
    WebP,
}

impl ImageMime {
    /// The canonical MIME string for this tag
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// Parse a MIME string into a tag
    ///
    /// # Errors
    /// - The string is not one of the supported image MIME types
    pub fn parse(mime: &str) -> Result<Self> {
        match mime {
            "image/png" => Ok(Self::Png),
            "image/jpeg" | "image/jpg" => Ok(Self::Jpeg),
            "image/webp" => Ok(Self::WebP),
            other => Err(CutoutError::processing_fatal(format!(
                "Unsupported image MIME type: {other}. Supported: image/png, image/jpeg, image/webp"
            ))),
        }
    }

    /// Infer the tag from a file extension, defaulting to PNG
    #[must_use]
    pub fn from_extension(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|s| s.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("jpg" | "jpeg") => Self::Jpeg,
            Some("webp") => Self::WebP,
            _ => Self::Png,
        }
    }
}

impl std::fmt::Display for ImageMime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An opaque encoded byte sequence plus its MIME type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// Encoded bytes (PNG/JPEG/WebP container)
    pub bytes: Vec<u8>,
    /// MIME type tag
    pub mime: ImageMime,
}

impl EncodedImage {
    /// Wrap encoded bytes with their MIME tag
    #[must_use]
    pub fn new(bytes: Vec<u8>, mime: ImageMime) -> Self {
        Self { bytes, mime }
    }

    /// Byte length of the encoded payload
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the payload is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A detected content rectangle within an image
///
/// Invariant: `left < right <= width` and `top < bottom <= height` of the
/// image it was detected in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Inclusive left edge
    pub left: u32,
    /// Inclusive top edge
    pub top: u32,
    /// Exclusive right edge
    pub right: u32,
    /// Exclusive bottom edge
    pub bottom: u32,
}

impl BoundingBox {
    /// Construct a box, validating the edge ordering invariant
    ///
    /// # Errors
    /// - `left >= right` or `top >= bottom`
    pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> Result<Self> {
        if left >= right || top >= bottom {
            return Err(CutoutError::processing_fatal(format!(
                "Degenerate bounding box: left={left} top={top} right={right} bottom={bottom}"
            )));
        }
        Ok(Self {
            left,
            top,
            right,
            bottom,
        })
    }

    /// Bounds covering the whole image
    #[must_use]
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            left: 0,
            top: 0,
            right: width,
            bottom: height,
        }
    }

    /// Box width in pixels
    #[must_use]
    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    /// Box height in pixels
    #[must_use]
    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }

    /// Expand symmetrically by `padding`, clamped to `[0, width] x [0, height]`
    #[must_use]
    pub fn pad(&self, padding: u32, width: u32, height: u32) -> Self {
        Self {
            left: self.left.saturating_sub(padding),
            top: self.top.saturating_sub(padding),
            right: (self.right + padding).min(width),
            bottom: (self.bottom + padding).min(height),
        }
    }

    /// Whether this box lies fully within an image of the given size
    #[must_use]
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.left < self.right
            && self.top < self.bottom
            && self.right <= width
            && self.bottom <= height
    }
}

/// An uploaded image: identity attributes plus content bytes
#[derive(Debug, Clone)]
pub struct ImageInput {
    /// Original file name as supplied by the uploader
    pub name: String,
    /// Raw encoded content
    pub bytes: Vec<u8>,
    /// Declared MIME type
    pub mime: ImageMime,
    /// Modification time reported by the uploader, milliseconds since epoch
    pub modified_at: Option<u64>,
}

impl ImageInput {
    /// Build an input from a name and encoded bytes, inferring the MIME type
    /// from the file extension
    #[must_use]
    pub fn new<S: Into<String>>(name: S, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let mime = ImageMime::from_extension(Path::new(&name));
        Self {
            name,
            bytes,
            mime,
            modified_at: None,
        }
    }

    /// Attach a declared MIME type
    #[must_use]
    pub fn with_mime(mut self, mime: ImageMime) -> Self {
        self.mime = mime;
        self
    }

    /// Attach a modification timestamp (milliseconds since epoch)
    #[must_use]
    pub fn with_modified_at(mut self, modified_at: u64) -> Self {
        self.modified_at = Some(modified_at);
        self
    }
}

/// Result of a full extraction run, handed to the caller by value
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    /// The bytes that were uploaded (original, or pre-compressed copy)
    pub original: EncodedImage,
    /// The extracted, transparent artwork
    pub extracted: EncodedImage,
    /// Final width of the extracted image
    pub width: u32,
    /// Final height of the extracted image
    pub height: u32,
    /// Wall-clock duration of the producing call, milliseconds
    pub processing_time_ms: u64,
    /// Whether this result was served from the cache
    pub from_cache: bool,
}
