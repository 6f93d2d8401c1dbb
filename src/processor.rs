//! Pipeline orchestrator: validate, compress, call the service, crop, cache
//!
//! One [`ImagePipeline`] instance owns the configuration, the recognition
//! service handle, and the result cache. Each `process` call runs the steps
//! strictly in sequence; the cache is the only state shared across calls.

use crate::bounds::detect_artwork_bounds;
use crate::cache::{CacheStats, ResultCache};
use crate::client::{HttpRecognitionClient, RecognitionService, RemovalOptions};
use crate::config::PipelineConfig;
use crate::error::{CutoutError, Result};
use crate::geometry;
use crate::types::{EncodedImage, ImageInput, ImageMime, ProcessingResult};
use image::DynamicImage;
use instant::Instant;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// End-to-end extraction pipeline
pub struct ImagePipeline {
    config: PipelineConfig,
    service: Arc<dyn RecognitionService>,
    cache: ResultCache,
}

impl ImagePipeline {
    /// Create a pipeline backed by the HTTP recognition client
    ///
    /// # Errors
    /// - Invalid configuration
    /// - Missing API key
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let service = Arc::new(HttpRecognitionClient::new(&config)?);
        Self::with_service(config, service)
    }

    /// Create a pipeline with an injected service implementation
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn with_service(
        config: PipelineConfig,
        service: Arc<dyn RecognitionService>,
    ) -> Result<Self> {
        config.validate()?;
        let cache = ResultCache::new(config.cache.clone());
        Ok(Self {
            config,
            service,
            cache,
        })
    }

    /// Run the full extraction pipeline for one uploaded image
    ///
    /// Steps: validate, cache lookup, conditional pre-upload compression,
    /// service invocation, result decode (and local crop when service-side
    /// cropping is disabled), cache write.
    ///
    /// # Errors
    /// - Terminal `Upload` errors for empty input
    /// - Classified processing/API/network failures from any later step
    #[instrument(skip(self, input), fields(name = %input.name, bytes = input.bytes.len()))]
    pub async fn process(&self, input: &ImageInput) -> Result<ProcessingResult> {
        let start = Instant::now();
        Self::validate_input(input)?;

        let key = ResultCache::key_for(input);
        if let Some(mut result) = self.cache.get(&key) {
            result.from_cache = true;
            // Elapsed time of *this* call, not the original one
            result.processing_time_ms = start.elapsed().as_millis() as u64;
            return Ok(result);
        }

        let original_image = geometry::decode(&input.bytes)?;
        let upload = self.compress_image(input, &original_image)?;

        let options = RemovalOptions::from_config(&self.config);
        let extracted = self.service.remove_background(&upload, &options).await?;

        // The service may have changed dimensions via cropping; decode to
        // learn the final geometry
        let decoded = geometry::decode(&extracted.bytes)?;
        let (extracted, width, height) = if self.config.service_crop {
            (extracted, decoded.width(), decoded.height())
        } else {
            self.crop_locally(&decoded)?
        };

        let result = ProcessingResult {
            original: upload,
            extracted,
            width,
            height,
            processing_time_ms: start.elapsed().as_millis() as u64,
            from_cache: false,
        };
        self.cache.insert(key, result.clone());

        info!(
            "Processed {} -> {}x{} in {}ms",
            input.name, result.width, result.height, result.processing_time_ms
        );
        Ok(result)
    }

    /// Detect artwork bounds locally and crop the service result
    fn crop_locally(&self, decoded: &DynamicImage) -> Result<(EncodedImage, u32, u32)> {
        let rgba = decoded.to_rgba8();
        let bounds =
            detect_artwork_bounds(&rgba, self.config.crop_margin, self.config.density_threshold);
        debug!(
            "Local crop to {}x{}+{}+{}",
            bounds.width(),
            bounds.height(),
            bounds.left,
            bounds.top
        );
        let cropped = geometry::crop(&rgba, &bounds)?;
        let encoded = geometry::encode(
            &DynamicImage::ImageRgba8(cropped),
            ImageMime::Png,
            1.0,
        )?;
        Ok((encoded, bounds.width(), bounds.height()))
    }

    /// Downscale and re-encode an input when it exceeds the upload bound
    ///
    /// Images already within bounds are handed to the service byte-for-byte.
    /// Oversized JPEG sources re-encode as JPEG at the configured quality;
    /// anything that may carry alpha re-encodes as PNG.
    ///
    /// # Errors
    /// - Encode failures while re-compressing
    pub fn compress_image(
        &self,
        input: &ImageInput,
        decoded: &DynamicImage,
    ) -> Result<EncodedImage> {
        let limit = self.config.max_upload_dimension;
        if decoded.width() <= limit && decoded.height() <= limit {
            return Ok(EncodedImage::new(input.bytes.clone(), input.mime));
        }

        let resized = geometry::resize_to_fit(decoded, limit, limit);
        let resized = DynamicImage::ImageRgba8(resized);
        let compressed = match input.mime {
            ImageMime::Jpeg => {
                geometry::encode(&resized, ImageMime::Jpeg, self.config.upload_quality)?
            },
            _ => geometry::encode(&resized, ImageMime::Png, 1.0)?,
        };

        info!(
            "Pre-compressed {} from {} to {} bytes ({}x{} -> {}x{})",
            input.name,
            input.bytes.len(),
            compressed.len(),
            decoded.width(),
            decoded.height(),
            resized.width(),
            resized.height()
        );
        Ok(compressed)
    }

    fn validate_input(input: &ImageInput) -> Result<()> {
        if input.name.trim().is_empty() {
            return Err(CutoutError::upload("Input file has no name"));
        }
        if input.bytes.is_empty() {
            return Err(CutoutError::upload(format!(
                "Input file '{}' is empty",
                input.name
            )));
        }
        Ok(())
    }

    /// Whether the recognition service is reachable with valid credentials
    ///
    /// # Errors
    /// - Transport-level failures reaching the service
    pub async fn check_service(&self) -> Result<bool> {
        self.service.check_status().await
    }

    /// Drop all cached results
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Snapshot of cache occupancy and traffic
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// The pipeline's configuration
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

impl std::fmt::Debug for ImagePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagePipeline")
            .field("endpoint", &self.config.endpoint)
            .field("service_crop", &self.config.service_crop)
            .field("cache", &self.cache)
            .finish()
    }
}
