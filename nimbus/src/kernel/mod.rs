//! Drop kernel functions.
//!
//! Square and circular drops contribute their exact overlap area. The
//! integrated kernels (Gaussian and variable shape) weight the overlap by a
//! radially symmetric function, integrated numerically over a lookup table
//! of `n × n` micro-drops covering the drop rectangle.

use std::sync::Arc;

use glam::DVec2;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

/// Kernel function value at the drop border, relative to its peak.
pub const KERNEL_EPSILON: f64 = 0.025;

/// Kernel selection as it appears in configuration files.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumIter, Serialize, Deserialize,
)]
pub enum KernelFunctionKind {
    #[default]
    Square,
    Circular,
    Gaussian,
    VariableShape10,
    VariableShape15,
    VariableShape30,
    VariableShape40,
    VariableShape50,
    VariableShape60,
}

impl From<KernelFunctionKind> for KernelFunction {
    fn from(kind: KernelFunctionKind) -> Self {
        match kind {
            KernelFunctionKind::Square => Self::Square,
            KernelFunctionKind::Circular => Self::Circular,
            KernelFunctionKind::Gaussian => Self::Gaussian,
            KernelFunctionKind::VariableShape10 => Self::VariableShape(1.0),
            KernelFunctionKind::VariableShape15 => Self::VariableShape(1.5),
            KernelFunctionKind::VariableShape30 => Self::VariableShape(3.0),
            KernelFunctionKind::VariableShape40 => Self::VariableShape(4.0),
            KernelFunctionKind::VariableShape50 => Self::VariableShape(5.0),
            KernelFunctionKind::VariableShape60 => Self::VariableShape(6.0),
        }
    }
}

/// Drop kernel function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KernelFunction {
    /// Unweighted square drop.
    Square,
    /// Unweighted disc inscribed in the drop square.
    Circular,
    /// `exp(-r²/2σ²)`.
    Gaussian,
    /// `exp(-rᵏ/(kσᵏ))` for shape `k > 0`.
    VariableShape(f64),
}

impl KernelFunction {
    /// True for kernels integrated through a lookup table.
    pub fn is_integrated(&self) -> bool {
        matches!(self, Self::Gaussian | Self::VariableShape(_))
    }

    pub fn is_circular(&self) -> bool {
        matches!(self, Self::Circular)
    }

    /// Function parameters for a drop of the given size. σ is chosen so the
    /// function falls to [`KERNEL_EPSILON`] at the drop radius.
    fn parameters(&self, drop_size: f64) -> KernelParameters {
        let ln_eps = KERNEL_EPSILON.ln();
        match *self {
            Self::Square | Self::Circular => KernelParameters::Flat,
            Self::Gaussian => {
                let sigma = drop_size / 2.0 / (-2.0 * ln_eps).sqrt();
                KernelParameters::Gaussian {
                    two_sigma2: 2.0 * sigma * sigma,
                }
            }
            Self::VariableShape(shape) => {
                assert!(shape > 0.0, "kernel shape must be positive");
                let sigma = drop_size / 2.0 / (-shape * ln_eps).powf(1.0 / shape);
                KernelParameters::VariableShape {
                    shape,
                    rk: shape * sigma.powf(shape),
                }
            }
        }
    }

    /// Function value at offset `(dx, dy)` from the center of a drop of size `drop_size`.
    pub fn value(&self, dx: f64, dy: f64, drop_size: f64) -> f64 {
        self.parameters(drop_size).value(dx, dy)
    }
}

#[derive(Debug, Clone, Copy)]
enum KernelParameters {
    Flat,
    Gaussian { two_sigma2: f64 },
    VariableShape { shape: f64, rk: f64 },
}

impl KernelParameters {
    #[inline]
    fn value(&self, dx: f64, dy: f64) -> f64 {
        let r2 = dx * dx + dy * dy;
        match *self {
            Self::Flat => 1.0,
            Self::Gaussian { two_sigma2 } => (-r2 / two_sigma2).exp(),
            Self::VariableShape { shape, rk } => (-r2.sqrt().powf(shape) / rk).exp(),
        }
    }
}

#[derive(Debug)]
struct KernelLut {
    offsets: Vec<DVec2>,
    values: Vec<f64>,
    grid_size: usize,
}

/// Kernel lookup table positioned at one drop.
///
/// The table is shared; only the position is per instance, so each worker
/// clones its own kernel before calling [`DropKernel::move_to`].
#[derive(Debug, Clone)]
pub struct DropKernel {
    lut: Arc<KernelLut>,
    position: DVec2,
}

impl DropKernel {
    /// Samples `function` on an `n × n` grid over a drop of size `drop_size`.
    ///
    /// Sample `k` sits at the center of micro-drop `(i, j)` and holds
    /// `value / (n² · value(0,0))`, so a fully covered drop integrates to at
    /// most one.
    pub fn new(function: KernelFunction, drop_size: f64, grid_size: usize) -> Self {
        assert!(drop_size > 0.0, "drop size must be positive");
        assert!(grid_size > 0, "kernel grid size must be positive");

        let params = function.parameters(drop_size);
        let n = grid_size;
        let r = drop_size / 2.0;
        let d = drop_size / n as f64;
        let norm = (n * n) as f64 * params.value(0.0, 0.0);

        let mut offsets = Vec::with_capacity(n * n);
        let mut values = Vec::with_capacity(n * n);
        for i in 0..n {
            let x = i as f64 * d + d / 2.0;
            for j in 0..n {
                let y = j as f64 * d + d / 2.0;
                offsets.push(DVec2::new(x, y));
                values.push(params.value(x - r, y - r) / norm);
            }
        }

        Self {
            lut: Arc::new(KernelLut {
                offsets,
                values,
                grid_size: n,
            }),
            position: DVec2::ZERO,
        }
    }

    /// Sets the top-left corner of the current drop.
    #[inline]
    pub fn move_to(&mut self, x: f64, y: f64) {
        self.position = DVec2::new(x, y);
    }

    #[inline]
    pub fn position(&self) -> DVec2 {
        self.position
    }

    pub fn grid_size(&self) -> usize {
        self.lut.grid_size
    }

    /// Normalized table values, row of `i` (x) major.
    pub fn values(&self) -> &[f64] {
        &self.lut.values
    }

    /// Micro-drop centers at the current position, with their weights.
    #[inline]
    pub fn samples(&self) -> impl Iterator<Item = (DVec2, f64)> + '_ {
        let origin = self.position;
        self.lut
            .offsets
            .iter()
            .zip(&self.lut.values)
            .map(move |(&offset, &z)| (origin + offset, z))
    }
}
