//! Configuration types for the extraction pipeline

use crate::error::{CutoutError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default endpoint of the remote recognition service
pub const DEFAULT_ENDPOINT: &str = "https://api.remove.bg/v1.0";

/// Retry behavior for retryable failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first (default: 3)
    pub max_attempts: u32,
    /// Delay before the first re-attempt (default: 1s)
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt (default: 2.0)
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1000),
            backoff_multiplier: 2.0,
        }
    }
}

/// Result cache sizing and expiry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of resident entries (default: 10)
    pub capacity: usize,
    /// Age after which an entry is treated as a miss and deleted (default: 1h)
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            ttl: Duration::from_secs(3600),
        }
    }
}

/// Configuration for the extraction pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// API key for the recognition service
    pub api_key: String,

    /// Base URL of the recognition service
    pub endpoint: String,

    /// Request timeout for service calls (default: 30s)
    pub timeout: Duration,

    /// Images with either dimension above this are downscaled before upload
    /// (default: 2000px) — bounds upload size and cost
    pub max_upload_dimension: u32,

    /// Encoding quality for pre-compressed uploads, `0.0..=1.0` (default: 0.92)
    pub upload_quality: f32,

    /// Retry behavior for retryable service failures
    pub retry: RetryConfig,

    /// Result cache sizing and expiry
    pub cache: CacheConfig,

    /// Padding added around detected or service-cropped content (default: 20px)
    pub crop_margin: u32,

    /// Ask the service to crop server-side; when disabled the local bounds
    /// detector runs instead (default: true)
    pub service_crop: bool,

    /// Row/column opacity-density threshold for the density strategy
    /// (default: 0.05)
    pub density_threshold: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(30),
            max_upload_dimension: 2000,
            upload_quality: 0.92,
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
            crop_margin: 20,
            service_crop: true,
            density_threshold: 0.05,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder for fluent construction
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Empty endpoint URL
    /// - `upload_quality` outside `0.0..=1.0`
    /// - `max_attempts` of zero
    /// - `backoff_multiplier` below 1.0
    /// - Cache capacity of zero
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.is_empty() {
            return Err(CutoutError::invalid_config("Endpoint URL cannot be empty"));
        }
        if !(0.0..=1.0).contains(&self.upload_quality) {
            return Err(CutoutError::invalid_config(format!(
                "Invalid upload quality: {} (valid range: 0.0-1.0)",
                self.upload_quality
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(CutoutError::invalid_config(
                "Retry attempts must be at least 1",
            ));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(CutoutError::invalid_config(format!(
                "Invalid backoff multiplier: {} (must be >= 1.0)",
                self.retry.backoff_multiplier
            )));
        }
        if self.cache.capacity == 0 {
            return Err(CutoutError::invalid_config(
                "Cache capacity must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Builder for `PipelineConfig`
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Set the service API key
    #[must_use]
    pub fn api_key<S: Into<String>>(mut self, key: S) -> Self {
        self.config.api_key = key.into();
        self
    }

    /// Set the service base URL
    #[must_use]
    pub fn endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    /// Set the request timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the pre-upload downscale threshold
    #[must_use]
    pub fn max_upload_dimension(mut self, dimension: u32) -> Self {
        self.config.max_upload_dimension = dimension;
        self
    }

    /// Set the pre-compressed upload quality (clamped to `0.0..=1.0`)
    #[must_use]
    pub fn upload_quality(mut self, quality: f32) -> Self {
        self.config.upload_quality = quality.clamp(0.0, 1.0);
        self
    }

    /// Set the retry behavior
    #[must_use]
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Set the cache sizing and expiry
    #[must_use]
    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.config.cache = cache;
        self
    }

    /// Set the crop padding margin
    #[must_use]
    pub fn crop_margin(mut self, margin: u32) -> Self {
        self.config.crop_margin = margin;
        self
    }

    /// Enable or disable service-side cropping
    #[must_use]
    pub fn service_crop(mut self, enabled: bool) -> Self {
        self.config.service_crop = enabled;
        self
    }

    /// Set the opacity-density threshold for the density strategy
    #[must_use]
    pub fn density_threshold(mut self, threshold: f32) -> Self {
        self.config.density_threshold = threshold;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// - Any `PipelineConfig::validate` failure
    pub fn build(self) -> Result<PipelineConfig> {
        let config = self.config;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_upload_dimension, 2000);
        assert_eq!(config.crop_margin, 20);
        assert!(config.service_crop);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.initial_delay, Duration::from_millis(1000));
        assert_eq!(config.cache.capacity, 10);
        assert_eq!(config.cache.ttl, Duration::from_secs(3600));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder_chaining() {
        let config = PipelineConfig::builder()
            .api_key("secret")
            .endpoint("https://recognition.internal/v1")
            .timeout(Duration::from_secs(5))
            .max_upload_dimension(1024)
            .crop_margin(8)
            .service_crop(false)
            .build()
            .unwrap();

        assert_eq!(config.api_key, "secret");
        assert_eq!(config.endpoint, "https://recognition.internal/v1");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.max_upload_dimension, 1024);
        assert_eq!(config.crop_margin, 8);
        assert!(!config.service_crop);
    }

    #[test]
    fn test_quality_clamping() {
        let config = PipelineConfig::builder()
            .upload_quality(7.0)
            .build()
            .unwrap();
        assert_eq!(config.upload_quality, 1.0);

        let config = PipelineConfig::builder()
            .upload_quality(-0.5)
            .build()
            .unwrap();
        assert_eq!(config.upload_quality, 0.0);
    }

    #[test]
    fn test_validation_failures() {
        let mut config = PipelineConfig::default();
        config.endpoint = String::new();
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.retry.backoff_multiplier = 0.5;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.cache.capacity = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.upload_quality = 1.5;
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("upload quality"));
    }

    #[test]
    fn test_config_serde_round_trip() {
        let config = PipelineConfig::builder()
            .api_key("k")
            .crop_margin(12)
            .build()
            .unwrap();
        let json = serde_json::to_string(&config).unwrap();
        let back: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
