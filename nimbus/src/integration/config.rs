use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};
use thiserror::Error;

use crate::kernel::KernelFunctionKind;

pub const MIN_SCALE: f64 = 1.0;
pub const MAX_SCALE: f64 = 10.0;
pub const MIN_KERNEL_GRID_SIZE: usize = 8;
pub const MAX_KERNEL_GRID_SIZE: usize = 64;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: common::SerdeFormatError,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// What to do when one input file cannot be integrated.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumIter, Serialize, Deserialize,
)]
pub enum OnError {
    #[default]
    Continue,
    Abort,
    AskUser,
}

/// One drizzle data file and its optional local normalization file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputItem {
    pub enabled: bool,
    pub path: PathBuf,
    pub local_normalization_path: Option<PathBuf>,
}

impl Default for InputItem {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::new(),
            local_normalization_path: None,
        }
    }
}

impl InputItem {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_local_normalization(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_normalization_path = Some(path.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Region of interest in reference frame pixels, `x1`/`y1` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub x0: i64,
    pub y0: i64,
    pub x1: i64,
    pub y1: i64,
}

impl Roi {
    pub fn new(x0: i64, y0: i64, x1: i64, y1: i64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Corners ordered so that `x0 <= x1` and `y0 <= y1`.
    pub fn ordered(self) -> Self {
        Self {
            x0: self.x0.min(self.x1),
            y0: self.y0.min(self.y1),
            x1: self.x0.max(self.x1),
            y1: self.y0.max(self.y1),
        }
    }

    pub fn width(&self) -> i64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> i64 {
        self.y1 - self.y0
    }

    pub fn is_rect(&self) -> bool {
        self.x0 < self.x1 && self.y0 < self.y1
    }

    /// Intersection with the `width × height` reference frame.
    pub fn clipped(self, width: usize, height: usize) -> Self {
        let r = self.ordered();
        Self {
            x0: r.x0.max(0),
            y0: r.y0.max(0),
            x1: r.x1.min(width as i64),
            y1: r.y1.min(height as i64),
        }
    }
}

/// Drizzle integration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrizzleIntegrationConfig {
    pub input_data: Vec<InputItem>,
    /// Source images are looked up here by file name when set.
    pub input_directory: Option<PathBuf>,
    /// Output pixels per reference pixel.
    pub scale: f64,
    /// Drop size relative to a source pixel, in (0, 1].
    pub drop_shrink: f64,
    pub kernel_function: KernelFunctionKind,
    /// Lookup table side for integrated kernels.
    pub kernel_grid_size: usize,
    pub enable_cfa: bool,
    /// Empty: use the pattern stored with each frame.
    pub cfa_pattern: String,
    pub enable_rejection: bool,
    pub enable_image_weighting: bool,
    pub enable_surface_splines: bool,
    pub enable_local_distortion: bool,
    pub enable_local_normalization: bool,
    pub enable_adaptive_normalization: bool,
    /// False integrates raw samples.
    pub enable_normalization: bool,
    pub roi: Option<Roi>,
    pub truncate_on_out_of_range: bool,
    pub on_error: OnError,
    /// Zero: the rayon pool size.
    pub max_threads: usize,
    /// Zero: unlimited.
    pub memory_budget_mb: usize,
}

impl Default for DrizzleIntegrationConfig {
    fn default() -> Self {
        Self {
            input_data: Vec::new(),
            input_directory: None,
            scale: 2.0,
            drop_shrink: 0.9,
            kernel_function: KernelFunctionKind::Square,
            kernel_grid_size: 16,
            enable_cfa: false,
            cfa_pattern: String::new(),
            enable_rejection: true,
            enable_image_weighting: true,
            enable_surface_splines: true,
            enable_local_distortion: true,
            enable_local_normalization: false,
            enable_adaptive_normalization: false,
            enable_normalization: true,
            roi: None,
            truncate_on_out_of_range: false,
            on_error: OnError::Continue,
            max_threads: 0,
            memory_budget_mb: 0,
        }
    }
}

impl DrizzleIntegrationConfig {
    pub fn new(input_data: Vec<InputItem>) -> Self {
        Self {
            input_data,
            ..Default::default()
        }
    }

    /// Loads a YAML or JSON configuration and validates it.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config: Self =
            common::file_format::load_file(path).map_err(|source| ConfigError::Load {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_SCALE..=MAX_SCALE).contains(&self.scale) {
            return Err(ConfigError::Invalid(format!(
                "scale must be between {MIN_SCALE} and {MAX_SCALE}, got {}",
                self.scale
            )));
        }
        if !(self.drop_shrink > 0.0 && self.drop_shrink <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "drop_shrink must be in (0, 1], got {}",
                self.drop_shrink
            )));
        }
        if !(MIN_KERNEL_GRID_SIZE..=MAX_KERNEL_GRID_SIZE).contains(&self.kernel_grid_size) {
            return Err(ConfigError::Invalid(format!(
                "kernel_grid_size must be between {MIN_KERNEL_GRID_SIZE} and {MAX_KERNEL_GRID_SIZE}, got {}",
                self.kernel_grid_size
            )));
        }
        if let Some(roi) = self.roi
            && !roi.ordered().is_rect()
        {
            return Err(ConfigError::Invalid("Empty ROI defined".to_string()));
        }
        Ok(())
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        assert!(
            (MIN_SCALE..=MAX_SCALE).contains(&scale),
            "scale must be between {MIN_SCALE} and {MAX_SCALE}"
        );
        self.scale = scale;
        self
    }

    pub fn with_drop_shrink(mut self, drop_shrink: f64) -> Self {
        assert!(
            drop_shrink > 0.0 && drop_shrink <= 1.0,
            "drop_shrink must be in (0, 1]"
        );
        self.drop_shrink = drop_shrink;
        self
    }

    pub fn with_kernel(mut self, kernel_function: KernelFunctionKind) -> Self {
        self.kernel_function = kernel_function;
        self
    }

    pub fn with_kernel_grid_size(mut self, kernel_grid_size: usize) -> Self {
        assert!(
            (MIN_KERNEL_GRID_SIZE..=MAX_KERNEL_GRID_SIZE).contains(&kernel_grid_size),
            "kernel_grid_size must be between {MIN_KERNEL_GRID_SIZE} and {MAX_KERNEL_GRID_SIZE}"
        );
        self.kernel_grid_size = kernel_grid_size;
        self
    }

    pub fn with_cfa(mut self, pattern: impl Into<String>) -> Self {
        self.enable_cfa = true;
        self.cfa_pattern = pattern.into();
        self
    }

    pub fn with_rejection(mut self, enable: bool) -> Self {
        self.enable_rejection = enable;
        self
    }

    pub fn with_image_weighting(mut self, enable: bool) -> Self {
        self.enable_image_weighting = enable;
        self
    }

    pub fn with_surface_splines(mut self, enable: bool) -> Self {
        self.enable_surface_splines = enable;
        self
    }

    pub fn with_local_distortion(mut self, enable: bool) -> Self {
        self.enable_local_distortion = enable;
        self
    }

    pub fn with_local_normalization(mut self, enable: bool) -> Self {
        self.enable_local_normalization = enable;
        self
    }

    pub fn with_adaptive_normalization(mut self, enable: bool) -> Self {
        self.enable_adaptive_normalization = enable;
        self
    }

    pub fn with_normalization(mut self, enable: bool) -> Self {
        self.enable_normalization = enable;
        self
    }

    pub fn with_roi(mut self, roi: Roi) -> Self {
        assert!(roi.ordered().is_rect(), "Empty ROI defined");
        self.roi = Some(roi.ordered());
        self
    }

    pub fn with_truncate_on_out_of_range(mut self, truncate: bool) -> Self {
        self.truncate_on_out_of_range = truncate;
        self
    }

    pub fn with_on_error(mut self, on_error: OnError) -> Self {
        self.on_error = on_error;
        self
    }

    pub fn with_input_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.input_directory = Some(dir.into());
        self
    }

    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    pub fn with_memory_budget_mb(mut self, memory_budget_mb: usize) -> Self {
        self.memory_budget_mb = memory_budget_mb;
        self
    }

    /// Drop corner offsets `(δ0, δ1)` within a source pixel.
    pub fn drop_deltas(&self) -> (f64, f64) {
        let d0 = super::DROP_TOLERANCE.max((1.0 - self.drop_shrink) / 2.0);
        (d0, 1.0 - d0)
    }
}
