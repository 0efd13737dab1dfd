//! Integration results reported alongside the output images.

use std::path::PathBuf;

use serde::Serialize;

use super::canvas::{OutputRange, RangeOperation};
use super::config::{DrizzleIntegrationConfig, Roi};
use crate::kernel::KernelFunction;
use crate::normalization::NormalizationKind;

/// Per-file integration summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageReport {
    pub path: PathBuf,
    pub source_path: PathBuf,
    /// Weights stored in the drizzle data, 1 for channels without one.
    pub weight: Vec<f64>,
    pub location: Vec<f64>,
    pub reference_location: Vec<f64>,
    pub scale: Vec<f64>,
    pub rejected_low: Vec<u64>,
    pub rejected_high: Vec<u64>,
    /// Contributing drop area per output pixel, in output pixel units.
    pub output_data: f64,
    /// Fraction of the source drop area that reached the output.
    pub input_data: f64,
    pub normalization: NormalizationKind,
    /// Free-text metadata block carried by the drizzle data file.
    pub metadata: Option<String>,
}

/// An input file that could not be integrated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileFailure {
    pub index: usize,
    pub path: PathBuf,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrizzleIntegrationReport {
    pub images: Vec<ImageReport>,
    pub failures: Vec<FileFailure>,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub num_channels: usize,
    pub reference_width: usize,
    pub reference_height: usize,
    pub output_width: usize,
    pub output_height: usize,
    pub roi: Roi,
    pub output_range_low: f64,
    pub output_range_high: f64,
    pub range_operation: RangeOperation,
    pub total_rejected_low: Vec<u64>,
    pub total_rejected_high: Vec<u64>,
    pub integrated_pixels: u64,
    pub output_pixels: u64,
    pub total_output_data: f64,
    pub total_input_data: f64,
    pub history: Vec<String>,
}

impl DrizzleIntegrationReport {
    pub(crate) fn set_output_range(&mut self, range: OutputRange) {
        self.output_range_low = range.low;
        self.output_range_high = range.high;
        self.range_operation = range.operation;
    }

    pub(crate) fn add_image(&mut self, image: ImageReport) {
        accumulate_counts(&mut self.total_rejected_low, &image.rejected_low);
        accumulate_counts(&mut self.total_rejected_high, &image.rejected_high);
        self.total_output_data += image.output_data;
        self.total_input_data += image.input_data;
        self.images.push(image);
    }
}

fn accumulate_counts(total: &mut Vec<u64>, counts: &[u64]) {
    if total.len() < counts.len() {
        total.resize(counts.len(), 0);
    }
    for (t, &n) in total.iter_mut().zip(counts) {
        *t += n;
    }
}

/// Processing history lines describing the run.
pub(crate) fn history_lines(
    config: &DrizzleIntegrationConfig,
    report: &DrizzleIntegrationReport,
) -> Vec<String> {
    let mut lines = vec![
        format!("DrizzleIntegration.scale: {:.2}", config.scale),
        format!("DrizzleIntegration.dropShrink: {:.2}", config.drop_shrink),
        format!("DrizzleIntegration.kernelFunction: {}", config.kernel_function),
    ];
    if KernelFunction::from(config.kernel_function).is_integrated() {
        lines.push(format!(
            "DrizzleIntegration.kernelGridSize: {}",
            config.kernel_grid_size
        ));
    }
    if config.enable_cfa {
        lines.push(format!("DrizzleIntegration.cfaPattern: {}", config.cfa_pattern));
    }
    lines.extend([
        format!("DrizzleIntegration.numberOfImages: {}", report.succeeded),
        format!(
            "DrizzleIntegration.referenceGeometry: {} x {}",
            report.reference_width, report.reference_height
        ),
        format!(
            "DrizzleIntegration.drizzleGeometry: {} x {}",
            report.output_width, report.output_height
        ),
        format!(
            "DrizzleIntegration.regionOfInterest: {},{},{},{}",
            report.roi.x0, report.roi.y0, report.roi.x1, report.roi.y1
        ),
        format!(
            "DrizzleIntegration.outputRange: [{:.8e}, {:.8e}]",
            report.output_range_low, report.output_range_high
        ),
    ]);
    lines
}
