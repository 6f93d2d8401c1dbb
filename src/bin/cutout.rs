//! Cutout CLI Tool
//!
//! Command-line interface for extracting transparent artwork from product
//! photos via the cutout pipeline.

#[cfg(feature = "cli")]
use cutout::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
