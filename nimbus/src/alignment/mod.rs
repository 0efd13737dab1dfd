//! Reference → source coordinate mapping for drizzle drops.
//!
//! A file is aligned either by a projective homography or by thin-plate
//! splines discretized onto an 8-pixel grid. Both operate on coordinates
//! relative to the file's alignment origin.

mod local_distortion;

use glam::{DMat3, DVec2, DVec3};
use serde::{Deserialize, Serialize};

use crate::geometry::{DRect, Quad};
use crate::spline::{PointGridInterpolation, PointSurfaceSpline, SplineConfig, SplineError};

pub use local_distortion::LocalDistortionModel;

/// Node spacing of the discretized alignment splines, in reference pixels.
pub const ALIGNMENT_GRID_DELTA: f64 = 8.0;

/// 8-parameter projective transform, `h33 = 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    matrix: DMat3,
}

impl Default for Homography {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Homography {
    pub const IDENTITY: Self = Self {
        matrix: DMat3::IDENTITY,
    };

    /// Row-major `[h11, h12, h13, h21, h22, h23, h31, h32]`.
    pub fn from_params(h: [f64; 8]) -> Self {
        let rows = DMat3::from_cols_array(&[h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0]);
        Self {
            matrix: rows.transpose(),
        }
    }

    pub fn params(&self) -> [f64; 8] {
        let r = self.matrix.transpose().to_cols_array();
        [r[0], r[1], r[2], r[3], r[4], r[5], r[6], r[7]]
    }

    pub fn translation(offset: DVec2) -> Self {
        Self::from_params([1.0, 0.0, offset.x, 0.0, 1.0, offset.y, 0.0, 0.0])
    }

    #[inline]
    pub fn apply(&self, p: DVec2) -> DVec2 {
        let v = self.matrix * DVec3::new(p.x, p.y, 1.0);
        if v.z == 0.0 {
            return DVec2::new(v.x, v.y);
        }
        DVec2::new(v.x / v.z, v.y / v.z)
    }
}

/// Alignment splines as stored in drizzle metadata: reference-frame nodes
/// and their matched source-frame positions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentSplines {
    pub reference_points: Vec<DVec2>,
    pub source_points: Vec<DVec2>,
    pub weights: Option<Vec<f64>>,
    pub regularization: f64,
}

impl AlignmentSplines {
    pub fn fit(&self) -> Result<PointSurfaceSpline, SplineError> {
        PointSurfaceSpline::fit(
            &self.reference_points,
            &self.source_points,
            self.weights.as_deref(),
            SplineConfig {
                regularization: self.regularization,
            },
        )
    }
}

#[derive(Debug, Clone)]
pub enum AlignmentMapping {
    Homography(Homography),
    Grid(PointGridInterpolation),
}

impl AlignmentMapping {
    /// Discretizes `splines` over `reference` every [`ALIGNMENT_GRID_DELTA`] pixels.
    pub fn from_splines(splines: &AlignmentSplines, reference: DRect) -> Result<Self, SplineError> {
        let spline = splines.fit()?;
        Ok(Self::Grid(PointGridInterpolation::from_fn(
            reference,
            ALIGNMENT_GRID_DELTA,
            |p| spline.apply(p),
        )))
    }

    pub fn is_spline(&self) -> bool {
        matches!(self, Self::Grid(_))
    }

    /// Adds the model's displacements to the spline grid nodes. Homographies
    /// are left untouched and `Ok(false)` is returned.
    pub fn apply_local_distortion(&mut self, model: &LocalDistortionModel) -> Result<bool, SplineError> {
        let Self::Grid(grid) = self else {
            return Ok(false);
        };
        let displacement = model.fit()?;
        grid.update_nodes(|p, node| *node += displacement.displacement(p));
        Ok(true)
    }

    #[inline]
    pub fn map(&self, p: DVec2) -> DVec2 {
        match self {
            Self::Homography(h) => h.apply(p),
            Self::Grid(g) => g.value(p),
        }
    }
}

/// Per-file alignment: mapping plus the registration origin.
#[derive(Debug, Clone)]
pub struct Alignment {
    pub origin: DVec2,
    pub mapping: AlignmentMapping,
}

impl Alignment {
    /// Source-frame quad of a reference-frame rectangle, corners ordered
    /// `(x0,y1) (x0,y0) (x1,y0) (x1,y1)`.
    #[inline]
    pub fn source_quad(&self, r: &DRect) -> Quad {
        let o = self.origin;
        [
            self.mapping.map(DVec2::new(r.x0, r.y1) - o) + o,
            self.mapping.map(DVec2::new(r.x0, r.y0) - o) + o,
            self.mapping.map(DVec2::new(r.x1, r.y0) - o) + o,
            self.mapping.map(DVec2::new(r.x1, r.y1) - o) + o,
        ]
    }
}
