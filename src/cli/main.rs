//! Cutout CLI Tool
//!
//! Command-line interface for the extraction pipeline: one input photo in,
//! one transparent cropped PNG out.

use crate::{
    process_image_from_path, CleanupRegistry, ImagePipeline, PipelineConfig, RetryConfig,
};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Artwork extraction CLI tool
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "cutout")]
pub struct Cli {
    /// Input image file
    #[arg(value_name = "INPUT", required_unless_present = "check_service")]
    pub input: Option<PathBuf>,

    /// Output file [default: <input>.cutout.png]
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Recognition service API key
    #[arg(long, env = "CUTOUT_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Recognition service base URL
    #[arg(long, default_value = crate::config::DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Downscale inputs above this dimension before upload
    #[arg(long, default_value_t = 2000)]
    pub max_dimension: u32,

    /// Crop padding margin in pixels
    #[arg(long, default_value_t = 20)]
    pub crop_margin: u32,

    /// Disable service-side cropping and crop locally instead
    #[arg(long)]
    pub no_service_crop: bool,

    /// Maximum attempts for retryable service failures
    #[arg(long, default_value_t = 3)]
    pub retry_attempts: u32,

    /// Check service reachability and credentials, then exit
    #[arg(long)]
    pub check_service: bool,

    /// Enable verbose logging (-v: INFO, -vv: DEBUG, -vvv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    fn pipeline_config(&self) -> crate::Result<PipelineConfig> {
        PipelineConfig::builder()
            .api_key(self.api_key.clone())
            .endpoint(self.endpoint.clone())
            .timeout(Duration::from_secs(self.timeout))
            .max_upload_dimension(self.max_dimension)
            .crop_margin(self.crop_margin)
            .service_crop(!self.no_service_crop)
            .retry(RetryConfig {
                max_attempts: self.retry_attempts,
                ..RetryConfig::default()
            })
            .build()
    }

    fn output_path(&self, input: &Path) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            let stem = input
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("output");
            input.with_file_name(format!("{stem}.cutout.png"))
        })
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "cutout=warn",
        1 => "cutout=info",
        2 => "cutout=debug",
        _ => "trace",
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

/// CLI entry point
///
/// # Errors
/// - Invalid arguments or configuration
/// - Any classified pipeline failure (rendered with its category and code)
pub async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli.pipeline_config().context("Invalid configuration")?;
    let pipeline = ImagePipeline::new(config).context("Failed to create pipeline")?;

    if cli.check_service {
        let reachable = pipeline
            .check_service()
            .await
            .context("Service status check failed")?;
        if reachable {
            println!("Service reachable, credentials accepted");
            return Ok(());
        }
        anyhow::bail!("Service rejected the credentials");
    }

    let input = cli
        .input
        .as_deref()
        .context("An input image is required")?;
    let output = cli.output_path(input);

    info!("Processing {} -> {}", input.display(), output.display());
    let result = match process_image_from_path(input, &pipeline).await {
        Ok(result) => result,
        Err(err) => {
            let info = err.info();
            anyhow::bail!(
                "{} [{}/{}{}]",
                info.message,
                info.category,
                info.code,
                if info.retryable { ", retryable" } else { "" }
            );
        },
    };

    // Remove a partially-written output if anything below fails
    let mut cleanup = CleanupRegistry::new();
    let output_for_cleanup = output.clone();
    cleanup.register("partial output file", move || {
        let _ = std::fs::remove_file(&output_for_cleanup);
    });

    tokio::fs::write(&output, &result.extracted.bytes)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;
    cleanup.dismiss();

    debug!("Cache stats: {:?}", pipeline.cache_stats());
    println!(
        "Extracted {}x{} artwork to {} in {}ms{}",
        result.width,
        result.height,
        output.display(),
        result.processing_time_ms,
        if result.from_cache { " (cached)" } else { "" }
    );
    Ok(())
}
