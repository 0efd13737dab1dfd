use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::geometry::DRect;
use crate::spline::{PointSurfaceSpline, SplineConfig, SplineError};

/// Residual distortion measured at matched star positions.
///
/// `displacements[i]` is the correction observed at `reference_points[i]`.
/// Without extrapolation the correction vanishes outside the bounding box
/// of the points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalDistortionModel {
    pub reference_points: Vec<DVec2>,
    pub displacements: Vec<DVec2>,
    pub weights: Vec<f64>,
    /// Only order 2 (`r² ln r`) surfaces are fitted; other values are kept
    /// for round-tripping metadata.
    pub order: u32,
    pub regularization: f64,
    pub extrapolation: bool,
}

impl Default for LocalDistortionModel {
    fn default() -> Self {
        Self {
            reference_points: Vec::new(),
            displacements: Vec::new(),
            weights: Vec::new(),
            order: 2,
            regularization: 0.01,
            extrapolation: true,
        }
    }
}

pub(crate) struct DisplacementSurface {
    spline: PointSurfaceSpline,
    bounds: Option<DRect>,
}

impl DisplacementSurface {
    #[inline]
    pub(crate) fn displacement(&self, p: DVec2) -> DVec2 {
        match self.bounds {
            Some(b) if !b.contains(p) => DVec2::ZERO,
            _ => self.spline.apply(p),
        }
    }
}

impl LocalDistortionModel {
    pub fn is_empty(&self) -> bool {
        self.reference_points.is_empty()
    }

    pub(crate) fn fit(&self) -> Result<DisplacementSurface, SplineError> {
        let weights = (!self.weights.is_empty()).then_some(self.weights.as_slice());
        let spline = PointSurfaceSpline::fit(
            &self.reference_points,
            &self.displacements,
            weights,
            SplineConfig {
                regularization: self.regularization,
            },
        )?;
        let bounds = (!self.extrapolation).then(|| DRect::bounding(&self.reference_points, 0.0));
        Ok(DisplacementSurface { spline, bounds })
    }
}
