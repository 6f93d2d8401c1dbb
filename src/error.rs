//! Error types for the extraction pipeline

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, CutoutError>;

/// Coarse error categories exposed across the API boundary
///
/// Callers (including the UI layer) rely on the category plus the
/// `retryable` flag to decide whether to offer a retry action, without
/// re-deriving the classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Bad input file — never retryable
    Upload,
    /// Local decode/encode/canvas failures
    Processing,
    /// The remote service rejected the request
    Api,
    /// No response received from the remote service
    Network,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Upload => write!(f, "upload"),
            Self::Processing => write!(f, "processing"),
            Self::Api => write!(f, "api"),
            Self::Network => write!(f, "network"),
        }
    }
}

/// Flattened, serializable error value passed across the API boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Error category
    pub category: ErrorCategory,
    /// Stable machine-readable code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Whether an automatic or caller-driven re-attempt makes sense
    pub retryable: bool,
}

/// Comprehensive error type for extraction pipeline operations
#[derive(Error, Debug)]
pub enum CutoutError {
    /// Invalid input file (empty upload, missing name, unsupported type)
    #[error("Upload error: {0}")]
    Upload(String),

    /// Local image decode/encode/canvas failures
    #[error("Processing error: {message}")]
    Processing {
        /// What went wrong
        message: String,
        /// Transient failures (memory pressure) are retryable; validation
        /// failures are not
        retryable: bool,
    },

    /// The remote recognition service rejected the request
    #[error("API error (HTTP {status}): {message}")]
    Api {
        /// HTTP status returned by the service
        status: u16,
        /// Error detail extracted from the response body
        message: String,
    },

    /// Connection-level or timeout failure — no response received
    #[error("Network error: {0}")]
    Network(String),

    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image format or codec errors from the underlying decoder
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CutoutError {
    /// Create a new upload error (never retryable)
    pub fn upload<S: Into<String>>(msg: S) -> Self {
        Self::Upload(msg.into())
    }

    /// Create a new processing error (retryable, possibly transient)
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing {
            message: msg.into(),
            retryable: true,
        }
    }

    /// Create a new processing error that must fail fast (bad parameters,
    /// not transient conditions)
    pub fn processing_fatal<S: Into<String>>(msg: S) -> Self {
        Self::Processing {
            message: msg.into(),
            retryable: false,
        }
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(msg: S) -> Self {
        Self::Network(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Classify an HTTP failure status from the recognition service
    ///
    /// Classification rules: 400 is terminal bad input, 401/403 are terminal
    /// credential failures, 402/429 are terminal quota/payment failures, and
    /// 5xx is a retryable service outage.
    pub fn from_status<S: Into<String>>(status: u16, message: S) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Wrap a transport-level `reqwest` failure
    ///
    /// Timeouts and connection failures never carry an HTTP status; they are
    /// always classified as retryable network errors.
    pub fn from_request(context: &str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Network(format!("{context}: request timed out"))
        } else {
            Self::Network(format!("{context}: {err}"))
        }
    }

    /// The category this error belongs to
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Upload(_) => ErrorCategory::Upload,
            Self::Processing { .. } | Self::Io(_) | Self::Image(_) | Self::InvalidConfig(_) => {
                ErrorCategory::Processing
            },
            Self::Api { .. } => ErrorCategory::Api,
            Self::Network(_) => ErrorCategory::Network,
        }
    }

    /// Stable machine-readable code for this error
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Upload(_) => "invalid_file",
            Self::Processing { .. } => "processing_failed",
            Self::Io(_) => "io",
            Self::Image(_) => "image_codec",
            Self::InvalidConfig(_) => "invalid_config",
            Self::Network(_) => "network",
            Self::Api { status, .. } => match status {
                400 => "bad_request",
                401 | 403 => "bad_credentials",
                402 => "payment_required",
                429 => "rate_limited",
                500..=599 => "service_unavailable",
                _ => "api_error",
            },
        }
    }

    /// Whether this failure is eligible for automatic re-attempt under backoff
    #[must_use]
    pub fn retryable(&self) -> bool {
        match self {
            Self::Upload(_) | Self::InvalidConfig(_) => false,
            Self::Processing { retryable, .. } => *retryable,
            // Local IO and codec failures may be transient (memory pressure,
            // contended file handles)
            Self::Io(_) | Self::Image(_) => true,
            Self::Api { status, .. } => (500..=599).contains(status),
            Self::Network(_) => true,
        }
    }

    /// Flatten into the serializable boundary value
    #[must_use]
    pub fn info(&self) -> ErrorInfo {
        ErrorInfo {
            category: self.category(),
            code: self.code().to_string(),
            message: self.to_string(),
            retryable: self.retryable(),
        }
    }
}
