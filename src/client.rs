//! Client for the remote background-recognition service
//!
//! The service consumes a multipart upload and returns the encoded,
//! background-stripped image bytes. Failures are classified into the crate
//! error taxonomy here, so callers never inspect HTTP statuses themselves.

use crate::config::{PipelineConfig, RetryConfig};
use crate::error::{CutoutError, Result};
use crate::retry::retry_with_backoff;
use crate::types::{EncodedImage, ImageMime};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Options forwarded to the recognition service with each removal call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalOptions {
    /// Requested output resolution class (`auto` lets the service decide)
    pub size: String,
    /// Subject type hint (`auto`, `product`, `person`, ...)
    pub subject_type: String,
    /// Requested output container
    pub format: ImageMime,
    /// Ask the service to crop to the subject server-side
    pub crop: bool,
    /// Margin in pixels around the server-side crop
    pub crop_margin: u32,
    /// Optional subject position hint
    pub position: Option<String>,
    /// Optional region of interest (`x1 y1 x2 y2`)
    pub roi: Option<String>,
}

impl Default for RemovalOptions {
    fn default() -> Self {
        Self {
            size: "auto".to_string(),
            subject_type: "auto".to_string(),
            format: ImageMime::Png,
            crop: true,
            crop_margin: 20,
            position: None,
            roi: None,
        }
    }
}

impl RemovalOptions {
    /// Derive the shipped options from a pipeline configuration
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            crop: config.service_crop,
            crop_margin: config.crop_margin,
            ..Self::default()
        }
    }
}

/// A background-recognition service
///
/// Implementations classify every failure before surfacing it; callers rely
/// on [`CutoutError::retryable`] without re-deriving the classification.
#[async_trait]
pub trait RecognitionService: Send + Sync {
    /// Remove the background from an encoded image
    ///
    /// # Errors
    /// - Empty input (terminal)
    /// - Classified API/network failures after the retry budget is spent
    async fn remove_background(
        &self,
        image: &EncodedImage,
        options: &RemovalOptions,
    ) -> Result<EncodedImage>;

    /// Whether the service is reachable and the credentials are valid
    ///
    /// # Errors
    /// - Transport-level failures reaching the service
    async fn check_status(&self) -> Result<bool>;
}

/// HTTP client for the recognition service
#[derive(Debug)]
pub struct HttpRecognitionClient {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    retry: RetryConfig,
}

impl HttpRecognitionClient {
    /// Create a client from the pipeline configuration
    ///
    /// # Errors
    /// - Missing API key
    /// - Failed to construct the underlying HTTP client
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(CutoutError::invalid_config(
                "Recognition service API key is not configured",
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CutoutError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            retry: config.retry.clone(),
        })
    }

    fn removal_url(&self) -> String {
        format!("{}/removebg", self.endpoint)
    }

    fn status_url(&self) -> String {
        format!("{}/account", self.endpoint)
    }

    /// One removal attempt, no retry
    async fn attempt_removal(
        &self,
        image: &EncodedImage,
        options: &RemovalOptions,
    ) -> Result<EncodedImage> {
        let part = reqwest::multipart::Part::bytes(image.bytes.clone())
            .file_name("upload")
            .mime_str(image.mime.as_str())
            .map_err(|e| CutoutError::processing_fatal(format!("Invalid upload MIME: {e}")))?;

        let mut form = reqwest::multipart::Form::new()
            .part("image_file", part)
            .text("size", options.size.clone())
            .text("type", options.subject_type.clone())
            .text("format", wire_format(options.format));

        if options.crop {
            form = form
                .text("crop", "true")
                .text("crop_margin", options.crop_margin.to_string());
        }
        if let Some(position) = &options.position {
            form = form.text("position", position.clone());
        }
        if let Some(roi) = &options.roi {
            form = form.text("roi", roi.clone());
        }

        debug!(
            "Uploading {} bytes ({}) for background removal",
            image.len(),
            image.mime
        );

        let response = self
            .client
            .post(self.removal_url())
            .header("X-Api-Key", &self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| CutoutError::from_request("background removal request", &e))?;

        let status = response.status();
        if status.is_success() {
            let bytes = response
                .bytes()
                .await
                .map_err(|e| CutoutError::from_request("background removal response", &e))?;
            if bytes.is_empty() {
                return Err(CutoutError::processing(
                    "Recognition service returned an empty body",
                ));
            }
            info!("Background removal succeeded ({} bytes)", bytes.len());
            return Ok(EncodedImage::new(bytes.to_vec(), options.format));
        }

        let body = response.text().await.unwrap_or_default();
        Err(CutoutError::from_status(
            status.as_u16(),
            extract_error_message(&body, status.as_u16()),
        ))
    }
}

#[async_trait]
impl RecognitionService for HttpRecognitionClient {
    async fn remove_background(
        &self,
        image: &EncodedImage,
        options: &RemovalOptions,
    ) -> Result<EncodedImage> {
        // Fail fast before any network traffic
        if image.is_empty() {
            return Err(CutoutError::processing_fatal(
                "Cannot upload an empty image buffer",
            ));
        }

        retry_with_backoff(
            || self.attempt_removal(image, options),
            &self.retry,
            "background removal",
        )
        .await
    }

    async fn check_status(&self) -> Result<bool> {
        let response = self
            .client
            .get(self.status_url())
            .header("X-Api-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| CutoutError::from_request("service status check", &e))?;
        Ok(response.status().is_success())
    }
}

/// The service's wire name for an output format
fn wire_format(mime: ImageMime) -> &'static str {
    match mime {
        ImageMime::Png => "png",
        ImageMime::Jpeg => "jpg",
        ImageMime::WebP => "webp",
    }
}

/// Extract a human-readable message from a service error body
///
/// The service replies with `{"errors":[{"title": ...}]}` on structured
/// failures and plain text otherwise.
fn extract_error_message(body: &str, status: u16) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(title) = value
            .get("errors")
            .and_then(|errors| errors.get(0))
            .and_then(|first| first.get("title"))
            .and_then(|title| title.as_str())
        {
            return title.to_string();
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {status} with empty body")
    } else {
        trimmed.to_string()
    }
}

/// Scripted responses for [`MockRecognitionService`]
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Succeed with this payload
    Success(EncodedImage),
    /// Fail with this HTTP status, classified like a real response
    Failure(u16),
    /// Fail with a connection-level error
    NetworkFailure,
}

/// In-memory stand-in for the recognition service
///
/// Plays back a script of responses and then repeats its fallback, counting
/// every invocation. Used by the pipeline tests in place of the network.
pub struct MockRecognitionService {
    script: std::sync::Mutex<std::collections::VecDeque<MockResponse>>,
    fallback: MockResponse,
    calls: std::sync::atomic::AtomicU32,
    status_ok: bool,
}

impl MockRecognitionService {
    /// A service that always succeeds with `result`
    #[must_use]
    pub fn succeeding(result: EncodedImage) -> Self {
        Self {
            script: std::sync::Mutex::new(std::collections::VecDeque::new()),
            fallback: MockResponse::Success(result),
            calls: std::sync::atomic::AtomicU32::new(0),
            status_ok: true,
        }
    }

    /// A service that always fails with `status`
    #[must_use]
    pub fn always_failing(status: u16) -> Self {
        Self {
            script: std::sync::Mutex::new(std::collections::VecDeque::new()),
            fallback: MockResponse::Failure(status),
            calls: std::sync::atomic::AtomicU32::new(0),
            status_ok: false,
        }
    }

    /// Prepend a script of responses played before the fallback repeats
    #[must_use]
    pub fn with_script(self, script: Vec<MockResponse>) -> Self {
        *self.script.lock().expect("mock script mutex poisoned") = script.into();
        self
    }

    /// Number of `remove_background` invocations so far
    #[must_use]
    pub fn invocations(&self) -> u32 {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl RecognitionService for MockRecognitionService {
    async fn remove_background(
        &self,
        image: &EncodedImage,
        _options: &RemovalOptions,
    ) -> Result<EncodedImage> {
        if image.is_empty() {
            return Err(CutoutError::processing_fatal(
                "Cannot upload an empty image buffer",
            ));
        }
        self.calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);

        let next = self
            .script
            .lock()
            .expect("mock script mutex poisoned")
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match next {
            MockResponse::Success(result) => Ok(result),
            MockResponse::Failure(status) => {
                Err(CutoutError::from_status(status, "scripted failure"))
            },
            MockResponse::NetworkFailure => {
                Err(CutoutError::network("scripted connection failure"))
            },
        }
    }

    async fn check_status(&self) -> Result<bool> {
        Ok(self.status_ok)
    }
}
