//! Adaptive normalization: spatially varying two-sided scale/offset surfaces.
//!
//! A frame is tiled on a coarse grid; each tile yields a robust location `m`
//! and a two-sided scale `(s0, s1)` per channel. Comparing a target frame
//! with the reference gives, per tile, two linear models `s·z + z0` (below
//! the local median) and `s1·z + z1` (above it). The drizzle engine fits
//! surface splines through the tile centers and discretizes them on 64-pixel
//! grids for constant-time lookup.

use glam::DVec2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::DRect;
use crate::image::PlanarImage;
use crate::math::statistics::{ScaleEstimator, TwoSidedEstimate, median_mut};
use crate::spline::{GridInterpolation, SplineConfig, SplineError, SurfaceSpline};

/// Samples outside this open interval are ignored when measuring tiles.
const CLIPPING_LOW: f64 = 1.0 / 65535.0;
const CLIPPING_HIGH: f64 = 1.0 - 1.0 / 65535.0;

pub const MIN_GRID_SIZE: usize = 2;
pub const MAX_GRID_SIZE: usize = 50;

/// Node spacing of the discretized normalization surfaces, in pixels.
pub const SURFACE_GRID_DELTA: f64 = 64.0;

#[derive(Debug, Error)]
pub enum AdaptiveNormalizationError {
    #[error("Zero or insignificant signal detected (x0={x0} y0={y0} x1={x1} y1={y1} c={channel})")]
    InsignificantSignal {
        x0: usize,
        y0: usize,
        x1: usize,
        y1: usize,
        channel: usize,
    },

    #[error("Invalid coordinate vectors: {count} nodes (at least 4 required)")]
    InvalidCoordinates { count: usize },

    #[error("Invalid sample vectors")]
    InvalidSampleVectors,

    #[error("Incompatible adaptive normalization grids")]
    IncompatibleGrids,

    #[error("Adaptive normalization data has {found} channel(s), expected {expected}")]
    ChannelCountMismatch { expected: usize, found: usize },

    #[error("Failed to fit adaptive normalization surface")]
    Spline(#[from] SplineError),
}

/// Tile size and tile counts `(delta, nx, ny)` for a `width × height` frame
/// split along its longest side into `grid_size` tiles.
pub fn grid_elements(width: usize, height: usize, grid_size: usize) -> (usize, usize, usize) {
    assert!(
        (MIN_GRID_SIZE..=MAX_GRID_SIZE).contains(&grid_size),
        "Grid size must be in [{MIN_GRID_SIZE}, {MAX_GRID_SIZE}], got {grid_size}"
    );
    let delta = (width.max(height) / grid_size).max(1);
    let nx = width / delta + usize::from(width % delta > 0);
    let ny = height / delta + usize::from(height % delta > 0);
    (delta, nx, ny)
}

/// Per-tile location and two-sided scale of one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveNormalizationData {
    coordinates: Vec<DVec2>,
    location: Vec<Vec<f64>>,
    scale_low: Vec<Vec<f64>>,
    scale_high: Vec<Vec<f64>>,
}

impl AdaptiveNormalizationData {
    /// Measures every tile of every channel. The first tile without a
    /// significant two-sided scale aborts construction.
    pub fn from_image(
        image: &PlanarImage,
        grid_size: usize,
        estimator: ScaleEstimator,
    ) -> Result<Self, AdaptiveNormalizationError> {
        let (w, h) = (image.width(), image.height());
        let (delta, nx, ny) = grid_elements(w, h, grid_size);

        let tiles: Vec<(usize, usize, usize, usize)> = (0..ny)
            .flat_map(|i| {
                (0..nx).map(move |j| {
                    let x0 = j * delta;
                    let y0 = i * delta;
                    (x0, y0, (x0 + delta).min(w), (y0 + delta).min(h))
                })
            })
            .collect();

        let coordinates = tiles
            .iter()
            .map(|&(x0, y0, x1, y1)| DVec2::new((x0 + x1) as f64 / 2.0, (y0 + y1) as f64 / 2.0))
            .collect();

        let mut location = Vec::with_capacity(image.num_channels());
        let mut scale_low = Vec::with_capacity(image.num_channels());
        let mut scale_high = Vec::with_capacity(image.num_channels());

        for c in 0..image.num_channels() {
            let plane = image.channel(c);
            let estimates: Vec<(f64, TwoSidedEstimate)> = tiles
                .par_iter()
                .map(|&(x0, y0, x1, y1)| {
                    let mut samples: Vec<f64> = (y0..y1)
                        .flat_map(|y| plane.row(y)[x0..x1].iter())
                        .map(|&v| v as f64)
                        .filter(|&v| v > CLIPPING_LOW && v < CLIPPING_HIGH)
                        .collect();
                    let m = median_mut(&mut samples);
                    (m, estimator.two_sided(&samples, m))
                })
                .collect();

            if let Some(k) = estimates.iter().position(|(_, s)| !s.is_valid()) {
                let (x0, y0, x1, y1) = tiles[k];
                return Err(AdaptiveNormalizationError::InsignificantSignal {
                    x0,
                    y0,
                    x1,
                    y1,
                    channel: c,
                });
            }

            location.push(estimates.iter().map(|(m, _)| *m).collect());
            scale_low.push(estimates.iter().map(|(_, s)| s.low).collect());
            scale_high.push(estimates.iter().map(|(_, s)| s.high).collect());
        }

        Ok(Self {
            coordinates,
            location,
            scale_low,
            scale_high,
        })
    }

    pub fn from_vectors(
        coordinates: Vec<DVec2>,
        location: Vec<Vec<f64>>,
        scale_low: Vec<Vec<f64>>,
        scale_high: Vec<Vec<f64>>,
    ) -> Result<Self, AdaptiveNormalizationError> {
        if coordinates.len() < 4 {
            return Err(AdaptiveNormalizationError::InvalidCoordinates {
                count: coordinates.len(),
            });
        }
        let n = coordinates.len();
        if location.is_empty()
            || location.len() != scale_low.len()
            || location.len() != scale_high.len()
            || location
                .iter()
                .chain(&scale_low)
                .chain(&scale_high)
                .any(|v| v.len() != n)
        {
            return Err(AdaptiveNormalizationError::InvalidSampleVectors);
        }
        Ok(Self {
            coordinates,
            location,
            scale_low,
            scale_high,
        })
    }

    pub fn coordinates(&self) -> &[DVec2] {
        &self.coordinates
    }

    pub fn num_channels(&self) -> usize {
        self.location.len()
    }

    pub fn location(&self, c: usize) -> &[f64] {
        &self.location[c]
    }

    pub fn scale_low(&self, c: usize) -> &[f64] {
        &self.scale_low[c]
    }

    pub fn scale_high(&self, c: usize) -> &[f64] {
        &self.scale_high[c]
    }

    /// Per-tile linear models mapping this frame onto `reference`.
    pub fn normalization_table(
        &self,
        reference: &Self,
    ) -> Result<AdaptiveNormalizationTable, AdaptiveNormalizationError> {
        if self.coordinates != reference.coordinates || self.num_channels() != reference.num_channels() {
            return Err(AdaptiveNormalizationError::IncompatibleGrids);
        }

        let mut table = AdaptiveNormalizationTable {
            coordinates: self.coordinates.clone(),
            ..Default::default()
        };
        for c in 0..self.num_channels() {
            let ratio = |r: &[f64], t: &[f64]| -> Vec<f64> {
                r.iter().zip(t).map(|(r, t)| r / t).collect()
            };
            let offset = |s: &[f64]| -> Vec<f64> {
                s.iter()
                    .zip(&reference.location[c])
                    .zip(&self.location[c])
                    .map(|((s, rm), tm)| rm - s * tm)
                    .collect()
            };
            let s0 = ratio(&reference.scale_low[c], &self.scale_low[c]);
            let s1 = ratio(&reference.scale_high[c], &self.scale_high[c]);
            table.zero_offset_low.push(offset(&s0));
            table.zero_offset_high.push(offset(&s1));
            table.location.push(self.location[c].clone());
            table.scale_low.push(s0);
            table.scale_high.push(s1);
        }
        Ok(table)
    }
}

/// Adaptive normalization table as stored in drizzle metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveNormalizationTable {
    pub coordinates: Vec<DVec2>,
    pub location: Vec<Vec<f64>>,
    pub scale_low: Vec<Vec<f64>>,
    pub scale_high: Vec<Vec<f64>>,
    pub zero_offset_low: Vec<Vec<f64>>,
    pub zero_offset_high: Vec<Vec<f64>>,
}

impl AdaptiveNormalizationTable {
    pub fn num_channels(&self) -> usize {
        self.location.len()
    }

    pub fn check_channels(&self, expected: usize) -> Result<(), AdaptiveNormalizationError> {
        match self.num_channels() {
            found if found == expected => Ok(()),
            found => Err(AdaptiveNormalizationError::ChannelCountMismatch { expected, found }),
        }
    }

    fn validate(&self) -> Result<(), AdaptiveNormalizationError> {
        let n = self.coordinates.len();
        if n < 4 {
            return Err(AdaptiveNormalizationError::InvalidCoordinates { count: n });
        }
        let channels = self.location.len();
        let sets = [
            &self.scale_low,
            &self.scale_high,
            &self.zero_offset_low,
            &self.zero_offset_high,
        ];
        if channels == 0 || sets.iter().any(|s| s.len() != channels) {
            return Err(AdaptiveNormalizationError::InvalidSampleVectors);
        }
        if std::iter::once(&self.location)
            .chain(sets)
            .flatten()
            .any(|v| v.len() != n)
        {
            return Err(AdaptiveNormalizationError::InvalidSampleVectors);
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct ChannelSurfaces {
    m: GridInterpolation<f64>,
    s0: GridInterpolation<f64>,
    s1: GridInterpolation<f64>,
    z0: GridInterpolation<f64>,
    z1: GridInterpolation<f64>,
}

/// Discretized adaptive normalization surfaces over the reference frame.
#[derive(Debug, Clone)]
pub struct AdaptiveNormalizationInterpolation {
    channels: Vec<ChannelSurfaces>,
}

impl AdaptiveNormalizationInterpolation {
    pub fn new(
        width: usize,
        height: usize,
        table: &AdaptiveNormalizationTable,
    ) -> Result<Self, AdaptiveNormalizationError> {
        table.validate()?;
        let rect = DRect::new(0.0, 0.0, width as f64, height as f64);

        let channels = (0..table.num_channels())
            .map(|c| -> Result<ChannelSurfaces, AdaptiveNormalizationError> {
                let values: [&[f64]; 5] = [
                    &table.location[c],
                    &table.scale_low[c],
                    &table.scale_high[c],
                    &table.zero_offset_low[c],
                    &table.zero_offset_high[c],
                ];
                let splines = SurfaceSpline::fit_many(
                    &table.coordinates,
                    &values,
                    None,
                    SplineConfig::default(),
                )?;
                let mut grids = splines
                    .iter()
                    .map(|s| GridInterpolation::from_fn(rect, SURFACE_GRID_DELTA, |p| s.value(p)));
                let mut next = || grids.next().ok_or(AdaptiveNormalizationError::InvalidSampleVectors);
                Ok(ChannelSurfaces {
                    m: next()?,
                    s0: next()?,
                    s1: next()?,
                    z0: next()?,
                    z1: next()?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { channels })
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    pub fn apply(&self, z: f64, x: usize, y: usize, c: usize) -> f64 {
        let s = &self.channels[c];
        let p = DVec2::new(x as f64, y as f64);
        if z <= s.m.value(p) {
            s.s0.value(p) * z + s.z0.value(p)
        } else {
            s.s1.value(p) * z + s.z1.value(p)
        }
    }
}
