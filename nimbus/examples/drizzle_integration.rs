//! Example: Drizzle-integrate registered frames described by a configuration file
//!
//! The configuration is a YAML or JSON `DrizzleIntegrationConfig` listing the
//! drizzle data files to integrate. The integrated image, the normalized
//! weight map and a JSON report are written to the output directory.
//!
//! # Usage
//!
//! ```bash
//! cargo run --release --example drizzle_integration -- drizzle.yaml test_output/drizzle
//! ```
//!
//! Output structure:
//! ```text
//! <output_dir>/
//!   drizzle_integration.tiff
//!   drizzle_weights.tiff
//!   drizzle_report.json
//! ```

use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, bail};
use nimbus::{
    DrizzleIntegrationConfig, DrizzleIntegrationEngine, IntegrationProgress, ProgressCallback,
    save_tiff,
};

fn main() -> anyhow::Result<()> {
    common::log_setup::setup_logging("info", &PathBuf::from("logs"), "drizzle_integration");

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("Usage: {} <config.yaml> [output_dir]", args[0]);
    }
    let config_path = PathBuf::from(&args[1]);
    let output_dir = args
        .get(2)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("test_output/drizzle"));

    let config = DrizzleIntegrationConfig::load(&config_path)
        .with_context(|| format!("Loading {}", config_path.display()))?;
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("Creating {}", output_dir.display()))?;

    tracing::info!(
        config = %config_path.display(),
        files = config.input_data.len(),
        scale = config.scale,
        drop_shrink = config.drop_shrink,
        "Drizzle integration"
    );

    let progress = ProgressCallback::new(std::sync::Arc::new(|p: IntegrationProgress| {
        tracing::debug!(current = p.current, total = p.total, stage = ?p.stage, "Progress");
    }));

    let start = Instant::now();
    let output = DrizzleIntegrationEngine::new(config)
        .with_progress(progress)
        .perform()?;
    let elapsed = start.elapsed();

    let report = &output.report;
    tracing::info!(
        succeeded = report.succeeded,
        failed = report.failed,
        skipped = report.skipped,
        width = report.output_width,
        height = report.output_height,
        range_low = report.output_range_low,
        range_high = report.output_range_high,
        elapsed_ms = elapsed.as_millis() as u64,
        "Integration complete"
    );
    for failure in &report.failures {
        tracing::warn!(file = %failure.path.display(), "{}", failure.message);
    }

    let image_path = output_dir.join("drizzle_integration.tiff");
    save_tiff(&output.image, &image_path)?;
    let weights_path = output_dir.join("drizzle_weights.tiff");
    save_tiff(&output.weights, &weights_path)?;
    let report_path = output_dir.join("drizzle_report.json");
    common::file_format::save_file(report, &report_path)
        .with_context(|| format!("Writing {}", report_path.display()))?;

    tracing::info!(path = %output_dir.display(), "Saved integration outputs");
    Ok(())
}
