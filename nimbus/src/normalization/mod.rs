//! Pixel value normalization strategies.
//!
//! One strategy is bound per input file before its rows are integrated.
//! Priority: local normalization, then adaptive normalization, then the
//! global scale and zero offset from the drizzle metadata.

pub mod adaptive;
pub mod local;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

pub use adaptive::{
    AdaptiveNormalizationData, AdaptiveNormalizationError, AdaptiveNormalizationInterpolation,
    AdaptiveNormalizationTable, grid_elements,
};
pub use local::{LocalNormalizationData, LocalNormalizationError, LocalNormalizationFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, Serialize, Deserialize)]
pub enum NormalizationKind {
    None,
    ScaleAndZeroOffset,
    Local,
    Adaptive,
}

/// Per-channel `(z − location)·scale + reference_location`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScaleAndZeroOffset {
    pub location: Vec<f64>,
    pub scale: Vec<f64>,
    pub reference_location: Vec<f64>,
}

#[derive(Debug, Clone)]
pub enum Normalization {
    None,
    ScaleAndZeroOffset(ScaleAndZeroOffset),
    Local(Arc<LocalNormalizationData>),
    Adaptive(Arc<AdaptiveNormalizationInterpolation>),
}

impl Normalization {
    /// Highest priority strategy among those available.
    pub fn select(
        enabled: bool,
        local: Option<Arc<LocalNormalizationData>>,
        adaptive: Option<Arc<AdaptiveNormalizationInterpolation>>,
        global: ScaleAndZeroOffset,
    ) -> Self {
        if !enabled {
            return Self::None;
        }
        match (local, adaptive) {
            (Some(l), _) => Self::Local(l),
            (None, Some(a)) => Self::Adaptive(a),
            (None, None) => Self::ScaleAndZeroOffset(global),
        }
    }

    pub fn kind(&self) -> NormalizationKind {
        match self {
            Self::None => NormalizationKind::None,
            Self::ScaleAndZeroOffset(_) => NormalizationKind::ScaleAndZeroOffset,
            Self::Local(_) => NormalizationKind::Local,
            Self::Adaptive(_) => NormalizationKind::Adaptive,
        }
    }

    /// Normalizes sample `z` of channel `c` measured at reference pixel `(x, y)`.
    #[inline]
    pub fn apply(&self, z: f64, x: usize, y: usize, c: usize) -> f64 {
        match self {
            Self::None => z,
            Self::ScaleAndZeroOffset(g) => (z - g.location[c]) * g.scale[c] + g.reference_location[c],
            Self::Local(l) => l.apply(z, x, y, c),
            Self::Adaptive(a) => a.apply(z, x, y, c),
        }
    }
}

#[cfg(test)]
mod tests;
