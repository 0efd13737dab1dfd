//! Error types for drizzle integration.

use std::path::PathBuf;

use thiserror::Error;

use super::config::ConfigError;
use crate::cfa::CfaError;
use crate::drizzle_data::DrizzleDataError;
use crate::image::ImageError;
use crate::normalization::{AdaptiveNormalizationError, LocalNormalizationError};
use crate::spline::SplineError;

/// Errors that end an integration run.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("No input images have been specified")]
    NoInputItems,

    #[error("At least 3 enabled input images are required, found {enabled}")]
    TooFewInputItems { enabled: usize },

    #[error("Empty or invalid ROI defined.")]
    InvalidRoi,

    #[error("Process aborted")]
    Aborted,

    #[error("Process aborted after an error integrating '{path}': {source}")]
    AbortedOnError {
        path: PathBuf,
        #[source]
        source: Box<FileError>,
    },

    #[error("{}", no_image_integrated_message(*failed))]
    NoImageIntegrated { failed: usize },

    /// One input file could not be integrated. Handled by the error policy.
    #[error("{path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: FileError,
    },
}

fn no_image_integrated_message(failed: usize) -> &'static str {
    if failed == 0 {
        "No images were integrated: Empty input list, or no enabled input items?"
    } else {
        "No image could be integrated."
    }
}

/// Errors that prevent integrating one input file.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("No such file: {path}")]
    NotFound { path: PathBuf },

    #[error(transparent)]
    DrizzleData(#[from] DrizzleDataError),

    #[error("Missing alignment matrix definition.")]
    MissingAlignment,

    #[error("Missing image integration data.")]
    MissingIntegrationData,

    #[error("Inconsistent image geometry.")]
    InconsistentGeometry,

    #[error(transparent)]
    LocalNormalization(#[from] LocalNormalizationError),

    #[error("Inconsistent image geometry: {path}")]
    LocalNormalizationGeometry { path: PathBuf },

    #[error(transparent)]
    AdaptiveNormalization(#[from] AdaptiveNormalizationError),

    #[error("Failed to build the alignment surface: {0}")]
    Alignment(#[from] SplineError),

    #[error("Missing CFA source file path.")]
    MissingCfaSourcePath,

    #[error("Missing CFA pattern information.")]
    MissingCfaPattern,

    #[error(transparent)]
    InvalidCfaPattern(#[from] CfaError),

    #[error(
        "CFA mosaiced frames imply integration of an RGB color image, but this file corresponds to a monochrome image."
    )]
    CfaMonochrome,

    #[error(
        "The drizzle data file defines additional channels that cannot be retrieved from a CFA."
    )]
    CfaExtraChannels,

    #[error("Missing source file path.")]
    MissingSourcePath,

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error("Source image has {found} channel(s), at least {expected} required")]
    ChannelCountMismatch { expected: usize, found: usize },
}
