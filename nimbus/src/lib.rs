//! Nimbus - Drizzle integration of registered astronomical frames.
//!
//! Each input frame comes with drizzle metadata describing how it maps onto
//! a common reference frame. The engine throws every source pixel, shrunk
//! into a drop, onto a finer output grid and accumulates the exact overlap
//! areas, optionally weighted by a drop kernel.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use nimbus::{DrizzleIntegrationConfig, DrizzleIntegrationEngine, InputItem};
//!
//! let config = DrizzleIntegrationConfig::new(vec![
//!     InputItem::new("light_001.xdrz.yaml"),
//!     InputItem::new("light_002.xdrz.yaml"),
//!     InputItem::new("light_003.xdrz.yaml"),
//! ])
//! .with_scale(2.0)
//! .with_drop_shrink(0.9);
//!
//! let output = DrizzleIntegrationEngine::new(config).perform()?;
//! println!("Integrated {} images", output.report.succeeded);
//! ```

pub mod alignment;
pub mod cfa;
pub mod common;
pub mod drizzle_data;
pub mod geometry;
pub mod image;
pub mod integration;
pub mod kernel;
pub(crate) mod math;
pub mod normalization;
pub mod spline;

// ============================================================================
// Integration
// ============================================================================

pub use integration::{
    AbortFlag, DrizzleIntegrationConfig, DrizzleIntegrationEngine, DrizzleIntegrationOutput,
    DrizzleIntegrationReport, ErrorDecider, ErrorDecision, Error, FileError, FileFailure,
    ImageReport, InputItem, IntegrationProgress, IntegrationStage, OnError, OutputRange,
    ProgressCallback, RangeOperation, Roi,
};

// ============================================================================
// Data model
// ============================================================================

pub use alignment::{Alignment, AlignmentMapping, Homography, LocalDistortionModel};
pub use cfa::CfaIndex;
pub use crate::common::Buffer2;
pub use drizzle_data::{DrizzleData, DrizzleDataError, RejectionData};
pub use image::{FrameLoader, ImageError, PlanarImage, TiffFrameLoader, load_tiff, save_tiff};
pub use kernel::{DropKernel, KernelFunction, KernelFunctionKind};
pub use math::statistics::ScaleEstimator;
pub use normalization::{
    AdaptiveNormalizationData, LocalNormalizationData, Normalization, NormalizationKind,
};
