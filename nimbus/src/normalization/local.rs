//! Local normalization data produced by a separate normalization pass.
//!
//! Each channel carries two coefficient matrices covering the reference
//! frame at a reduced resolution: a scale `A1` and an offset `A0`. A sample
//! `z` at reference pixel `(x, y)` normalizes to `A0 + A1·z`, optionally
//! followed by a global recentering `(v − Tc)·S + Rc`.

use std::path::{Path, PathBuf};

use glam::DVec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::common::Buffer2;
use crate::spline::GridInterpolation;

pub const CURRENT_VERSION: u32 = 2;
pub const MIN_SUPPORTED_VERSION: u32 = 2;

#[derive(Debug, Error)]
pub enum LocalNormalizationError {
    #[error("Failed to read local normalization data {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: common::SerdeFormatError,
    },

    #[error("Unsupported local normalization data version {version} (minimum {MIN_SUPPORTED_VERSION})")]
    UnsupportedVersion { version: u32 },

    #[error("Local normalization data is tagged as invalid")]
    TaggedInvalid,

    #[error("Invalid local normalization matrix for channel {channel}")]
    InvalidMatrix { channel: usize },

    #[error("Inconsistent local normalization channel count")]
    InconsistentChannels,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalNormalization {
    pub reference_center: Vec<f64>,
    pub target_center: Vec<f64>,
    pub scale: Vec<f64>,
}

/// On-disk form of local normalization data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalNormalizationFile {
    pub version: u32,
    pub reference_file_path: Option<PathBuf>,
    pub target_file_path: Option<PathBuf>,
    pub normalization_scale: u32,
    pub reference_width: usize,
    pub reference_height: usize,
    pub invalid: bool,
    pub matrix_width: usize,
    pub matrix_height: usize,
    /// Per channel, row-major `matrix_width × matrix_height`.
    pub scale: Vec<Vec<f32>>,
    pub offset: Vec<Vec<f32>>,
    pub relative_scale_factors: Vec<f64>,
    pub global: Option<GlobalNormalization>,
}

impl Default for LocalNormalizationFile {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            reference_file_path: None,
            target_file_path: None,
            normalization_scale: 1024,
            reference_width: 0,
            reference_height: 0,
            invalid: false,
            matrix_width: 0,
            matrix_height: 0,
            scale: Vec::new(),
            offset: Vec::new(),
            relative_scale_factors: Vec::new(),
            global: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocalNormalizationData {
    reference_width: usize,
    reference_height: usize,
    scale: Vec<GridInterpolation<f64>>,
    offset: Vec<GridInterpolation<f64>>,
    global: Option<GlobalNormalization>,
    relative_scale_factors: Vec<f64>,
}

impl LocalNormalizationData {
    pub fn load(path: &Path) -> Result<Self, LocalNormalizationError> {
        let file: LocalNormalizationFile =
            common::file_format::load_file(path).map_err(|source| LocalNormalizationError::Load {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_file(file)
    }

    pub fn from_file(file: LocalNormalizationFile) -> Result<Self, LocalNormalizationError> {
        if file.version < MIN_SUPPORTED_VERSION {
            return Err(LocalNormalizationError::UnsupportedVersion {
                version: file.version,
            });
        }
        if file.invalid {
            return Err(LocalNormalizationError::TaggedInvalid);
        }
        let channels = file.scale.len();
        if file.offset.len() != channels {
            return Err(LocalNormalizationError::InconsistentChannels);
        }
        if let Some(g) = &file.global {
            if g.reference_center.len() != channels
                || g.target_center.len() != channels
                || g.scale.len() != channels
            {
                return Err(LocalNormalizationError::InconsistentChannels);
            }
        }

        let (mw, mh) = (file.matrix_width, file.matrix_height);
        // Matrix node i sits at reference coordinate i / (mw / width).
        let delta = DVec2::new(
            file.reference_width as f64 / mw.max(1) as f64,
            file.reference_height as f64 / mh.max(1) as f64,
        );
        let grid = |values: &[f32], channel: usize| {
            if mw == 0 || mh == 0 || values.len() != mw * mh || !(delta.x > 0.0 && delta.y > 0.0) {
                return Err(LocalNormalizationError::InvalidMatrix { channel });
            }
            let nodes = Buffer2::new(mw, mh, values.iter().map(|&v| v as f64).collect());
            Ok(GridInterpolation::from_nodes(DVec2::ZERO, delta, nodes))
        };

        let scale = file
            .scale
            .iter()
            .enumerate()
            .map(|(c, v)| grid(v, c))
            .collect::<Result<Vec<_>, _>>()?;
        let offset = file
            .offset
            .iter()
            .enumerate()
            .map(|(c, v)| grid(v, c))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            reference_width: file.reference_width,
            reference_height: file.reference_height,
            scale,
            offset,
            global: file.global,
            relative_scale_factors: file.relative_scale_factors,
        })
    }

    pub fn reference_width(&self) -> usize {
        self.reference_width
    }

    pub fn reference_height(&self) -> usize {
        self.reference_height
    }

    pub fn num_channels(&self) -> usize {
        self.scale.len()
    }

    pub fn has_interpolations(&self) -> bool {
        !self.scale.is_empty()
    }

    pub fn relative_scale_factors(&self) -> &[f64] {
        &self.relative_scale_factors
    }

    #[inline]
    pub fn apply(&self, z: f64, x: usize, y: usize, c: usize) -> f64 {
        let p = DVec2::new(x as f64, y as f64);
        let v = self.offset[c].value(p) + self.scale[c].value(p) * z;
        match &self.global {
            Some(g) => (v - g.target_center[c]) * g.scale[c] + g.reference_center[c],
            None => v,
        }
    }
}
