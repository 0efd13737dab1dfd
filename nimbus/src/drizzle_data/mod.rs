//! Per-frame drizzle metadata written by the registration and integration
//! passes, read back here as YAML or JSON.

mod rejection;

use std::path::{Path, PathBuf};

use glam::DVec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::alignment::{AlignmentSplines, Homography, LocalDistortionModel};
use crate::normalization::{AdaptiveNormalizationTable, ScaleAndZeroOffset};

pub use rejection::{RejectionData, RejectionMap};

#[derive(Debug, Error)]
pub enum DrizzleDataError {
    #[error("Failed to read drizzle data {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: common::SerdeFormatError,
    },

    #[error("Invalid reference dimensions {width}x{height}")]
    InvalidReferenceGeometry { width: usize, height: usize },

    #[error("Inconsistent image integration data vectors")]
    InconsistentIntegrationData,

    #[error("Expected {expected} image weights, found {found}")]
    InvalidWeights { expected: usize, found: usize },

    #[error("Expected {expected} rejection counters per side, found {low} low and {high} high")]
    InvalidRejectionCounts {
        expected: usize,
        low: usize,
        high: usize,
    },

    #[error("Rejected pixel ({x}, {y}, c={channel}) lies outside the reference frame")]
    RejectionPixelOutOfRange { x: usize, y: usize, channel: usize },
}

/// Per-channel statistics of the frame as measured by image integration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationData {
    pub location: Vec<f64>,
    pub reference_location: Vec<f64>,
    pub scale: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrizzleData {
    pub source_file_path: Option<PathBuf>,
    pub cfa_source_file_path: Option<PathBuf>,
    pub cfa_source_pattern: Option<String>,
    pub reference_width: usize,
    pub reference_height: usize,
    pub alignment_origin: DVec2,
    /// Row-major homography without the trailing `1`.
    pub alignment_matrix: Option<[f64; 8]>,
    pub alignment_splines: Option<AlignmentSplines>,
    pub local_distortion: Option<LocalDistortionModel>,
    pub integration: Option<IntegrationData>,
    pub weight: Vec<f64>,
    pub rejection: Option<RejectionData>,
    pub adaptive_normalization: Option<AdaptiveNormalizationTable>,
    /// Subtracted from every source sample, in normalized [0,1] units.
    pub pedestal: f64,
    pub metadata: Option<String>,
}

impl DrizzleData {
    pub fn load(path: &Path) -> Result<Self, DrizzleDataError> {
        let data: Self =
            common::file_format::load_file(path).map_err(|source| DrizzleDataError::Load {
                path: path.to_path_buf(),
                source,
            })?;
        data.validate()?;
        Ok(data)
    }

    pub fn validate(&self) -> Result<(), DrizzleDataError> {
        if self.reference_width == 0 || self.reference_height == 0 {
            return Err(DrizzleDataError::InvalidReferenceGeometry {
                width: self.reference_width,
                height: self.reference_height,
            });
        }
        let channels = self.num_channels();
        if let Some(d) = &self.integration {
            if d.reference_location.len() != channels || d.scale.len() != channels {
                return Err(DrizzleDataError::InconsistentIntegrationData);
            }
        }
        if !self.weight.is_empty() && self.weight.len() != channels {
            return Err(DrizzleDataError::InvalidWeights {
                expected: channels,
                found: self.weight.len(),
            });
        }
        if let Some(r) = &self.rejection {
            r.validate(self.reference_width, self.reference_height, channels)?;
        }
        Ok(())
    }

    pub fn num_channels(&self) -> usize {
        self.integration.as_ref().map_or(0, |d| d.location.len())
    }

    pub fn has_alignment_matrix(&self) -> bool {
        self.alignment_matrix.is_some()
    }

    pub fn has_alignment_splines(&self) -> bool {
        self.alignment_splines
            .as_ref()
            .is_some_and(|s| !s.reference_points.is_empty())
    }

    pub fn has_local_distortion_model(&self) -> bool {
        self.local_distortion.as_ref().is_some_and(|m| !m.is_empty())
    }

    pub fn has_integration_data(&self) -> bool {
        self.num_channels() > 0
    }

    pub fn has_rejection_data(&self) -> bool {
        self.rejection.is_some()
    }

    pub fn has_image_weights(&self) -> bool {
        !self.weight.is_empty()
    }

    pub fn has_adaptive_normalization_data(&self) -> bool {
        self.adaptive_normalization
            .as_ref()
            .is_some_and(|t| !t.coordinates.is_empty())
    }

    pub fn homography(&self) -> Homography {
        self.alignment_matrix
            .map_or(Homography::IDENTITY, Homography::from_params)
    }

    /// Channel weight, 1 when absent or not requested.
    pub fn channel_weight(&self, c: usize, image_weighting: bool) -> f64 {
        if image_weighting {
            self.weight.get(c).copied().unwrap_or(1.0)
        } else {
            1.0
        }
    }

    pub fn scale_and_zero_offset(&self) -> ScaleAndZeroOffset {
        let d = self.integration.clone().unwrap_or_default();
        ScaleAndZeroOffset {
            location: d.location,
            scale: d.scale,
            reference_location: d.reference_location,
        }
    }
}

#[cfg(test)]
mod tests;
