#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

//! # Cutout
//!
//! Background removal and artwork cropping pipeline backed by a remote
//! recognition service.
//!
//! An uploaded product photo goes through a fixed sequence: validate, check
//! the result cache, downscale when the photo exceeds the upload bound,
//! upload to the recognition service, decode the returned transparent image,
//! optionally crop it locally, cache and return it. Failures anywhere in the
//! pipeline surface as classified errors carrying a `retryable` flag, so
//! callers never re-derive failure semantics from messages or status codes.
//!
//! ## Features
//!
//! - **Bounded uploads**: photos above a configurable dimension are
//!   downscaled before upload, capping cost independent of source resolution
//! - **Classified failures**: upload, processing, API, and network errors,
//!   each with a stable code and retryability flag
//! - **Bounded retry**: exponential backoff applied only to retryable
//!   service failures
//! - **Result cache**: content-hash keyed, capacity-bounded (FIFO), and
//!   age-expired
//! - **Local crop fallback**: two content-bounds detection strategies
//!   (color-distance and opacity-density) for when service-side cropping is
//!   disabled
//! - **CLI Integration**: optional command-line interface (enable with the
//!   `cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cutout::{ImagePipeline, PipelineConfig};
//!
//! # async fn example() -> cutout::Result<()> {
//! let config = PipelineConfig::builder()
//!     .api_key("your-api-key")
//!     .build()?;
//! let pipeline = ImagePipeline::new(config)?;
//!
//! let result = cutout::process_image_from_path("product.jpg", &pipeline).await?;
//! tokio::fs::write("extracted.png", &result.extracted.bytes).await?;
//! println!(
//!     "{}x{} in {}ms (cached: {})",
//!     result.width, result.height, result.processing_time_ms, result.from_cache
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Injecting a service implementation
//!
//! The pipeline talks to the network through the [`RecognitionService`]
//! trait; tests and alternative backends inject their own implementation:
//!
//! ```rust,no_run
//! use cutout::{ImagePipeline, MockRecognitionService, PipelineConfig};
//! use cutout::{EncodedImage, ImageMime};
//! use std::sync::Arc;
//!
//! # fn example() -> cutout::Result<()> {
//! let service = Arc::new(MockRecognitionService::succeeding(EncodedImage::new(
//!     vec![/* png bytes */],
//!     ImageMime::Png,
//! )));
//! let pipeline = ImagePipeline::with_service(PipelineConfig::default(), service)?;
//! # let _ = pipeline;
//! # Ok(())
//! # }
//! ```

pub mod bounds;
pub mod cache;
pub mod client;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod geometry;
pub mod processor;
pub mod retry;
pub mod types;

// Public API exports
pub use bounds::{
    detect_artwork_bounds, BoundsStrategy, ColorDistanceStrategy, DensityStrategy,
};
pub use cache::{CacheStats, ResultCache};
pub use client::{
    HttpRecognitionClient, MockRecognitionService, MockResponse, RecognitionService,
    RemovalOptions,
};
pub use config::{CacheConfig, PipelineConfig, PipelineConfigBuilder, RetryConfig};
pub use error::{CutoutError, ErrorCategory, ErrorInfo, Result};
pub use processor::ImagePipeline;
pub use retry::{retry_with_backoff, CleanupRegistry};
pub use types::{BoundingBox, EncodedImage, ImageInput, ImageMime, ProcessingResult};

use std::path::Path;

/// Process an image already held in memory
///
/// Builds an [`ImageInput`] from the name and bytes (MIME inferred from the
/// extension) and runs the given pipeline. Reusing one pipeline across calls
/// shares its result cache.
///
/// # Errors
/// - Any classified pipeline failure
pub async fn process_image_from_bytes(
    name: &str,
    bytes: Vec<u8>,
    pipeline: &ImagePipeline,
) -> Result<ProcessingResult> {
    let input = ImageInput::new(name, bytes);
    pipeline.process(&input).await
}

/// Process an image file from disk
///
/// Reads the file asynchronously, carries its modification time into the
/// input identity, and runs the given pipeline.
///
/// # Errors
/// - File I/O failures reading the input
/// - Any classified pipeline failure
pub async fn process_image_from_path<P: AsRef<Path>>(
    path: P,
    pipeline: &ImagePipeline,
) -> Result<ProcessingResult> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await?;

    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .ok_or_else(|| CutoutError::upload(format!("Invalid input path: {}", path.display())))?;

    let mut input = ImageInput::new(name, bytes);
    if let Ok(metadata) = std::fs::metadata(path) {
        if let Ok(modified) = metadata.modified() {
            if let Ok(elapsed) = modified.duration_since(std::time::UNIX_EPOCH) {
                input = input.with_modified_at(elapsed.as_millis() as u64);
            }
        }
    }

    pipeline.process(&input).await
}

/// Process an image from an async reader stream
///
/// Reads the stream to the end and hands the buffered bytes to the
/// pipeline. Suitable for network streams and other async data sources.
///
/// # Errors
/// - Stream reading failures
/// - Any classified pipeline failure
pub async fn process_image_from_reader<R: tokio::io::AsyncRead + Unpin>(
    name: &str,
    mut reader: R,
    pipeline: &ImagePipeline,
) -> Result<ProcessingResult> {
    let mut buffer = Vec::new();
    tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut buffer)
        .await
        .map_err(|e| CutoutError::processing(format!("Failed to read from stream: {e}")))?;
    process_image_from_bytes(name, buffer, pipeline).await
}
