//! Drizzle integration of registered frames.
//!
//! Input files are integrated strictly one after another. For each file the
//! output canvas is split into disjoint row bands that are accumulated in
//! parallel, so no output cell is ever written by two tasks. After the last
//! file, accumulated flux is divided by the accumulated weight and the
//! result is brought back into [0, 1] when needed.

mod canvas;
pub mod config;
mod error;
mod progress;
mod report;
mod worker;

use std::path::PathBuf;
use std::sync::Arc;

use glam::DVec2;
use tracing::{error, info, warn};

use crate::alignment::{Alignment, AlignmentMapping};
use crate::cfa::CfaIndex;
use crate::common::parallel::{available_threads, memory_limited_threads, optimal_thread_loads};
use crate::drizzle_data::{DrizzleData, RejectionMap};
use crate::geometry::DRect;
use crate::image::{FrameLoader, PlanarImage, TiffFrameLoader};
use crate::kernel::{DropKernel, KernelFunction};
use crate::normalization::{
    AdaptiveNormalizationInterpolation, LocalNormalizationData, Normalization,
};

pub use canvas::{OutputCanvas, OutputRange, RangeOperation, RowBand};
pub use config::{ConfigError, DrizzleIntegrationConfig, InputItem, OnError, Roi};
pub use error::{Error, FileError};
pub use progress::{
    AbortFlag, IntegrationProgress, IntegrationStage, ProgressCallback, report_progress,
};
pub use report::{DrizzleIntegrationReport, FileFailure, ImageReport};

use worker::{FileContext, integrate_bands};

/// Margin added around mapped quads and reference coordinates.
pub const BOUNDS_TOLERANCE: f64 = 1e-5;
/// Smallest drop corner offset within a source pixel.
pub const DROP_TOLERANCE: f64 = 1e-8;
/// Minimum number of enabled input items.
pub const MIN_ENABLED_ITEMS: usize = 3;

/// Answer to a failed file under [`OnError::AskUser`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDecision {
    Continue,
    Abort,
}

/// Callback consulted under [`OnError::AskUser`]. Without one the run aborts.
pub type ErrorDecider = common::SharedFn<dyn Fn(&FileFailure) -> ErrorDecision + Send + Sync>;

/// Integrated image, normalized weight map and run report.
#[derive(Debug)]
pub struct DrizzleIntegrationOutput {
    pub image: PlanarImage,
    pub weights: PlanarImage,
    pub report: DrizzleIntegrationReport,
}

/// Geometry fixed by the first integrated file.
struct RunState {
    reference_width: usize,
    reference_height: usize,
    num_channels: usize,
    roi: Roi,
    origin: DVec2,
    canvas: OutputCanvas,
}

/// One file ready to be accumulated.
struct PreparedFile {
    source_path: PathBuf,
    image: PlanarImage,
    alignment: Alignment,
    normalization: Normalization,
    rejection: Option<RejectionMap>,
    cfa: Option<CfaIndex>,
    weights: Vec<f64>,
}

pub struct DrizzleIntegrationEngine {
    config: DrizzleIntegrationConfig,
    loader: Arc<dyn FrameLoader>,
    progress: ProgressCallback,
    error_decider: ErrorDecider,
    abort: AbortFlag,
}

impl DrizzleIntegrationEngine {
    /// Engine reading source frames as TIFF files.
    pub fn new(config: DrizzleIntegrationConfig) -> Self {
        Self {
            config,
            loader: Arc::new(TiffFrameLoader),
            progress: ProgressCallback::default(),
            error_decider: ErrorDecider::default(),
            abort: AbortFlag::new(),
        }
    }

    pub fn with_loader(mut self, loader: Arc<dyn FrameLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_error_decider(mut self, decider: ErrorDecider) -> Self {
        self.error_decider = decider;
        self
    }

    pub fn with_abort_flag(mut self, abort: AbortFlag) -> Self {
        self.abort = abort;
        self
    }

    pub fn config(&self) -> &DrizzleIntegrationConfig {
        &self.config
    }

    /// Handle that cancels a running [`Self::perform`].
    pub fn abort_flag(&self) -> AbortFlag {
        self.abort.clone()
    }

    /// Integrates every enabled input item.
    pub fn perform(&self) -> Result<DrizzleIntegrationOutput, Error> {
        let config = &self.config;
        config.validate()?;

        let items = &config.input_data;
        if items.is_empty() {
            return Err(Error::NoInputItems);
        }
        let enabled = items.iter().filter(|item| item.enabled).count();
        if enabled < MIN_ENABLED_ITEMS {
            return Err(Error::TooFewInputItems { enabled });
        }

        let (d0, _) = config.drop_deltas();
        let kernel_function = KernelFunction::from(config.kernel_function);
        let kernel = kernel_function.is_integrated().then(|| {
            DropKernel::new(kernel_function, 1.0 - 2.0 * d0, config.kernel_grid_size)
        });

        info!(
            files = items.len(),
            enabled,
            scale = config.scale,
            drop_shrink = config.drop_shrink,
            kernel = %config.kernel_function,
            "Starting drizzle integration"
        );

        let total = items.len();
        let mut state: Option<RunState> = None;
        let mut images = Vec::new();
        let mut failures = Vec::new();
        let mut skipped = 0;

        for (index, item) in items.iter().enumerate() {
            if self.abort.is_aborted() {
                return Err(Error::Aborted);
            }
            if !item.enabled {
                info!(file = %item.path.display(), "Skipping disabled input item");
                skipped += 1;
                continue;
            }

            report_progress(&self.progress, index, total, IntegrationStage::Loading);
            info!(file = %item.path.display(), index = index + 1, total, "Integrating");

            match self.integrate_file(index, item, &mut state, kernel.as_ref()) {
                Ok(image) => images.push(image),
                Err(Error::File { path, source }) => {
                    error!(file = %path.display(), error = %source, "Failed to integrate file");
                    let failure = FileFailure {
                        index,
                        path: path.clone(),
                        message: source.to_string(),
                    };
                    failures.push(failure.clone());
                    if index + 1 < total && !self.should_continue(&failure) {
                        return Err(Error::AbortedOnError {
                            path,
                            source: Box::new(source),
                        });
                    }
                }
                Err(e) => return Err(e),
            }
        }

        let succeeded = images.len();
        let failed = failures.len();
        let Some(mut state) = state.filter(|_| succeeded > 0) else {
            return Err(Error::NoImageIntegrated { failed });
        };

        report_progress(&self.progress, total, total, IntegrationStage::Finalizing);
        let range = state
            .canvas
            .finalize(config.drop_shrink, config.truncate_on_out_of_range);
        match range.operation {
            RangeOperation::None => {}
            op => info!(
                operation = %op,
                low = range.low,
                high = range.high,
                "Output range out of [0, 1], correcting output image"
            ),
        }

        let output_width = state.canvas.width();
        let output_height = state.canvas.height();
        let mut report = DrizzleIntegrationReport {
            images: Vec::with_capacity(succeeded),
            failures,
            succeeded,
            failed,
            skipped,
            num_channels: state.num_channels,
            reference_width: state.reference_width,
            reference_height: state.reference_height,
            output_width,
            output_height,
            roi: state.roi,
            output_range_low: 0.0,
            output_range_high: 0.0,
            range_operation: RangeOperation::None,
            total_rejected_low: Vec::new(),
            total_rejected_high: Vec::new(),
            integrated_pixels: (succeeded * state.reference_width * state.reference_height) as u64,
            output_pixels: (output_width * output_height) as u64,
            total_output_data: 0.0,
            total_input_data: 0.0,
            history: Vec::new(),
        };
        report.set_output_range(range);
        for image in images {
            report.add_image(image);
        }
        report.history = report::history_lines(config, &report);

        info!(succeeded, failed, skipped, "Drizzle integration finished");

        let (image, weights) = state.canvas.into_images();
        Ok(DrizzleIntegrationOutput {
            image,
            weights,
            report,
        })
    }

    fn should_continue(&self, failure: &FileFailure) -> bool {
        match self.config.on_error {
            OnError::Continue => true,
            OnError::Abort => false,
            OnError::AskUser => self
                .error_decider
                .as_ref()
                .is_some_and(|decide| decide(failure) == ErrorDecision::Continue),
        }
    }

    fn integrate_file(
        &self,
        index: usize,
        item: &InputItem,
        state: &mut Option<RunState>,
        kernel: Option<&DropKernel>,
    ) -> Result<ImageReport, Error> {
        let file_error = |source: FileError| Error::File {
            path: item.path.clone(),
            source,
        };

        let data = self.load_drizzle_data(item).map_err(file_error)?;
        let state = self.resolve_geometry(&data, state).map_err(|e| match e {
            GeometryError::InvalidRoi => Error::InvalidRoi,
            GeometryError::Inconsistent => file_error(FileError::InconsistentGeometry),
        })?;
        let prepared = self.prepare_file(item, &data, state).map_err(file_error)?;

        report_progress(
            &self.progress,
            index,
            self.config.input_data.len(),
            IntegrationStage::Integrating,
        );

        let total_drop_area = self.accumulate(&prepared, state, kernel)?;

        let config = &self.config;
        let pixel_size = 1.0 / config.scale;
        let roi_area = (state.roi.width() * state.roi.height()) as f64;
        let coverage = total_drop_area / roi_area;
        let input_data = coverage / (config.drop_shrink * config.drop_shrink);
        let output_data = coverage * pixel_size * pixel_size;
        info!(
            file = %item.path.display(),
            normalization = %prepared.normalization.kind(),
            output_data,
            input_data,
            "File integrated"
        );

        let channels = state.num_channels;
        let rejection = data.rejection.as_ref();
        let integration = data.integration.clone().unwrap_or_default();
        Ok(ImageReport {
            path: item.path.clone(),
            source_path: prepared.source_path,
            weight: (0..channels).map(|c| data.channel_weight(c, true)).collect(),
            location: integration.location,
            reference_location: integration.reference_location,
            scale: integration.scale,
            rejected_low: (0..channels)
                .map(|c| rejection.map_or(0, |r| r.low(c)))
                .collect(),
            rejected_high: (0..channels)
                .map(|c| rejection.map_or(0, |r| r.high(c)))
                .collect(),
            output_data,
            input_data,
            normalization: prepared.normalization.kind(),
            metadata: data.metadata.clone(),
        })
    }

    fn load_drizzle_data(&self, item: &InputItem) -> Result<DrizzleData, FileError> {
        let config = &self.config;
        if !item.path.is_file() {
            return Err(FileError::NotFound {
                path: item.path.clone(),
            });
        }
        let data = DrizzleData::load(&item.path)?;

        if !data.has_alignment_matrix()
            && !(config.enable_surface_splines && data.has_alignment_splines())
        {
            return Err(FileError::MissingAlignment);
        }
        if !data.has_integration_data() {
            return Err(FileError::MissingIntegrationData);
        }
        if config.enable_rejection && !data.has_rejection_data() {
            warn!(file = %item.path.display(), "The drizzle data file contains no pixel rejection data.");
        }
        if config.enable_image_weighting && !data.has_image_weights() {
            warn!(
                file = %item.path.display(),
                "The drizzle data file contains no image weights data (weight=1 will be assumed)."
            );
        }
        Ok(data)
    }

    fn resolve_geometry<'s>(
        &self,
        data: &DrizzleData,
        state: &'s mut Option<RunState>,
    ) -> Result<&'s mut RunState, GeometryError> {
        match state {
            Some(state) => {
                if state.reference_width != data.reference_width
                    || state.reference_height != data.reference_height
                    || state.num_channels != data.num_channels()
                {
                    return Err(GeometryError::Inconsistent);
                }
                Ok(state)
            }
            None => Ok(state.insert(self.new_run_state(data)?)),
        }
    }

    /// Output geometry derived from the first integrated file.
    fn new_run_state(&self, data: &DrizzleData) -> Result<RunState, GeometryError> {
        let scale = self.config.scale;
        let (width, height) = (data.reference_width, data.reference_height);
        let roi = self
            .config
            .roi
            .unwrap_or(Roi::new(0, 0, width as i64, height as i64))
            .clipped(width, height);
        if !roi.is_rect() {
            return Err(GeometryError::InvalidRoi);
        }

        let origin = DVec2::new(
            (roi.x0 as f64 * scale).round(),
            (roi.y0 as f64 * scale).round(),
        );
        let output_width = (roi.width() as f64 * scale).round() as usize;
        let output_height = (roi.height() as f64 * scale).round() as usize;
        info!(
            reference_width = width,
            reference_height = height,
            output_width,
            output_height,
            channels = data.num_channels(),
            "Drizzle geometry"
        );

        Ok(RunState {
            reference_width: width,
            reference_height: height,
            num_channels: data.num_channels(),
            roi,
            origin,
            canvas: OutputCanvas::new(output_width, output_height, data.num_channels()),
        })
    }

    fn prepare_file(
        &self,
        item: &InputItem,
        data: &DrizzleData,
        state: &RunState,
    ) -> Result<PreparedFile, FileError> {
        let config = &self.config;
        let channels = state.num_channels;
        let (width, height) = (state.reference_width, state.reference_height);

        let normalization = if config.enable_normalization {
            let local = self.load_local_normalization(item, state)?;
            let adaptive = match local {
                Some(_) => None,
                None if config.enable_adaptive_normalization => {
                    match data
                        .adaptive_normalization
                        .as_ref()
                        .filter(|_| data.has_adaptive_normalization_data())
                    {
                        Some(table) => {
                            table.check_channels(channels)?;
                            Some(Arc::new(AdaptiveNormalizationInterpolation::new(
                                width, height, table,
                            )?))
                        }
                        None => {
                            warn!(file = %item.path.display(), "Adaptive normalization data not available.");
                            None
                        }
                    }
                }
                None => None,
            };
            Normalization::select(true, local, adaptive, data.scale_and_zero_offset())
        } else {
            Normalization::None
        };

        let (cfa, source_path) = if config.enable_cfa {
            let path = data
                .cfa_source_file_path
                .clone()
                .filter(|p| !p.as_os_str().is_empty())
                .ok_or(FileError::MissingCfaSourcePath)?;
            let pattern = self.resolve_cfa_pattern(item, data)?;
            if channels < 3 {
                return Err(FileError::CfaMonochrome);
            }
            if channels > 3 {
                return Err(FileError::CfaExtraChannels);
            }
            (Some(CfaIndex::new(&pattern)?), path)
        } else {
            let path = data
                .source_file_path
                .clone()
                .filter(|p| !p.as_os_str().is_empty())
                .ok_or(FileError::MissingSourcePath)?;
            (None, path)
        };

        let source_path = match (&config.input_directory, source_path.file_name()) {
            (Some(dir), Some(name)) => dir.join(name),
            _ => source_path,
        };

        info!(source = %source_path.display(), "Loading source image");
        let mut image = self.loader.load(&source_path)?;
        let required = if cfa.is_some() { 1 } else { channels };
        if image.num_channels() < required {
            return Err(FileError::ChannelCountMismatch {
                expected: required,
                found: image.num_channels(),
            });
        }
        if data.pedestal > 0.0 {
            image.subtract(data.pedestal as f32);
        }

        let use_splines = config.enable_surface_splines && data.has_alignment_splines();
        let mut mapping = match &data.alignment_splines {
            Some(splines) if use_splines => AlignmentMapping::from_splines(
                splines,
                DRect::new(0.0, 0.0, width as f64, height as f64),
            )?,
            _ => AlignmentMapping::Homography(data.homography()),
        };
        if use_splines
            && config.enable_local_distortion
            && let Some(model) = data
                .local_distortion
                .as_ref()
                .filter(|_| data.has_local_distortion_model())
        {
            mapping.apply_local_distortion(model)?;
        }

        let rejection = data
            .rejection
            .as_ref()
            .filter(|_| config.enable_rejection)
            .map(|r| RejectionMap::new(r, width, height, channels));

        Ok(PreparedFile {
            source_path,
            image,
            alignment: Alignment {
                origin: data.alignment_origin,
                mapping,
            },
            normalization,
            rejection,
            cfa,
            weights: (0..channels)
                .map(|c| data.channel_weight(c, config.enable_image_weighting))
                .collect(),
        })
    }

    fn load_local_normalization(
        &self,
        item: &InputItem,
        state: &RunState,
    ) -> Result<Option<Arc<LocalNormalizationData>>, FileError> {
        if !self.config.enable_local_normalization {
            return Ok(None);
        }
        let Some(path) = item
            .local_normalization_path
            .as_ref()
            .filter(|p| !p.as_os_str().is_empty())
        else {
            warn!(file = %item.path.display(), "Local normalization data not available.");
            return Ok(None);
        };
        if !path.is_file() {
            return Err(FileError::NotFound { path: path.clone() });
        }

        let data = LocalNormalizationData::load(path)?;
        if data.reference_width() != state.reference_width
            || data.reference_height() != state.reference_height
            || data.num_channels() != state.num_channels
        {
            return Err(FileError::LocalNormalizationGeometry { path: path.clone() });
        }
        Ok(Some(Arc::new(data)))
    }

    fn resolve_cfa_pattern(&self, item: &InputItem, data: &DrizzleData) -> Result<String, FileError> {
        let file_pattern = data
            .cfa_source_pattern
            .as_deref()
            .filter(|p| !p.is_empty());
        let pattern = &self.config.cfa_pattern;
        if pattern.is_empty() {
            return file_pattern
                .map(str::to_string)
                .ok_or(FileError::MissingCfaPattern);
        }
        if let Some(file_pattern) = file_pattern
            && file_pattern != pattern
        {
            warn!(
                file = %item.path.display(),
                file_pattern,
                pattern = %pattern,
                "CFA pattern mismatch, using the configured pattern"
            );
        }
        Ok(pattern.clone())
    }

    fn accumulate(
        &self,
        prepared: &PreparedFile,
        state: &mut RunState,
        kernel: Option<&DropKernel>,
    ) -> Result<f64, Error> {
        let config = &self.config;
        let canvas = &mut state.canvas;
        let width = canvas.width().max(1);

        let overhead_limit = (4096 / width).max(1);
        let kernel_bytes = kernel.map_or(0, |k| {
            k.grid_size() * k.grid_size() * 3 * std::mem::size_of::<f64>()
        });
        let bytes_per_band =
            2 * canvas.num_channels() * width * overhead_limit * std::mem::size_of::<f32>()
                + kernel_bytes;
        let threads = memory_limited_threads(
            available_threads(config.max_threads),
            bytes_per_band,
            config.memory_budget_mb * 1024 * 1024,
        );
        let loads = optimal_thread_loads(canvas.height(), overhead_limit, threads);

        let ctx = FileContext {
            source: &prepared.image,
            alignment: &prepared.alignment,
            normalization: &prepared.normalization,
            rejection: prepared.rejection.as_ref(),
            cfa: prepared.cfa.as_ref(),
            kernel,
            circular: KernelFunction::from(config.kernel_function).is_circular(),
            weights: &prepared.weights,
            origin: state.origin,
            pixel_size: 1.0 / config.scale,
            drop_deltas: config.drop_deltas(),
            abort: &self.abort,
        };
        integrate_bands(&ctx, canvas, &loads)
    }
}

enum GeometryError {
    InvalidRoi,
    Inconsistent,
}
