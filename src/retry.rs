//! Shared retry loop and resource-cleanup registry
//!
//! The retry loop is used by the recognition client for its service calls
//! and is available to callers implementing a user-facing retry action.
//! Classification lives on [`CutoutError::retryable`]; the loop never
//! re-derives it.

use crate::config::RetryConfig;
use crate::error::Result;
use std::future::Future;
use tracing::{debug, warn};

/// Run `operation` with bounded exponential backoff
///
/// Only errors whose `retryable()` flag is set consume retry budget;
/// terminal failures propagate immediately. After `max_attempts` failed
/// attempts the final error is returned unchanged. Each failed attempt is
/// logged.
///
/// # Errors
/// - The final error of the last attempt, once the budget is exhausted
/// - The first non-retryable error encountered
pub async fn retry_with_backoff<T, F, Fut>(
    mut operation: F,
    config: &RetryConfig,
    label: &str,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = config.initial_delay;
    let mut attempt: u32 = 1;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("{label} succeeded on attempt {attempt}");
                }
                return Ok(value);
            },
            Err(err) if err.retryable() && attempt < config.max_attempts => {
                warn!(
                    "{label} attempt {attempt}/{} failed: {err}; retrying in {}ms",
                    config.max_attempts,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                delay = delay.mul_f64(config.backoff_multiplier);
                attempt += 1;
            },
            Err(err) => {
                warn!(
                    "{label} failed on attempt {attempt}/{} ({}): {err}",
                    config.max_attempts,
                    if err.retryable() {
                        "budget exhausted"
                    } else {
                        "not retryable"
                    }
                );
                return Err(err);
            },
        }
    }
}

/// Registry of transient resources to release on error paths
///
/// Pipeline steps register a cleanup closure when they create something that
/// outlives the step (a temporary file, a partially-written output). On
/// failure the owner calls [`CleanupRegistry::cleanup`]; on success it calls
/// [`CleanupRegistry::dismiss`]. Anything still registered runs on drop, so
/// resources are released no matter where the failure occurred.
#[derive(Default)]
pub struct CleanupRegistry {
    tasks: Vec<(String, Box<dyn FnOnce() + Send>)>,
}

impl CleanupRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a cleanup task under a label (used for logging)
    pub fn register<S, F>(&mut self, label: S, task: F)
    where
        S: Into<String>,
        F: FnOnce() + Send + 'static,
    {
        self.tasks.push((label.into(), Box::new(task)));
    }

    /// Run and drain all registered tasks, most recent first
    pub fn cleanup(&mut self) {
        while let Some((label, task)) = self.tasks.pop() {
            debug!("Releasing resource: {label}");
            task();
        }
    }

    /// Drop all registered tasks without running them (success path)
    pub fn dismiss(&mut self) {
        self.tasks.clear();
    }

    /// Number of pending cleanup tasks
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether no tasks are pending
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl Drop for CleanupRegistry {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl std::fmt::Debug for CleanupRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanupRegistry")
            .field("pending", &self.tasks.len())
            .finish()
    }
}
