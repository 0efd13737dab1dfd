//! Thin-plate surface splines.
//!
//! ```text
//! f(x,y) = a₀ + a₁x + a₂y + Σᵢ wᵢ U(||(x,y) - (xᵢ,yᵢ)||),   U(r) = r² ln r
//! ```
//!
//! Node coordinates are centered and scaled to unit extent before fitting;
//! the interpolant is invariant under that change of variables, the linear
//! system is far better conditioned.

mod grid;

use glam::DVec2;
use thiserror::Error;

pub use grid::{GridInterpolation, PointGridInterpolation};

#[derive(Debug, Error, PartialEq)]
pub enum SplineError {
    #[error("At least 3 nodes are required to fit a surface spline, got {count}")]
    TooFewNodes { count: usize },

    #[error("Node count {nodes} does not match value count {values}")]
    LengthMismatch { nodes: usize, values: usize },

    #[error("Node weight {index} is not positive: {weight}")]
    InvalidWeight { index: usize, weight: f64 },

    #[error("Singular surface spline system (duplicate or collinear nodes?)")]
    Singular,
}

/// Surface spline fitting parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct SplineConfig {
    /// Smoothing factor. Zero interpolates every node exactly; larger values
    /// trade fidelity for smoothness. Node weights divide it per node.
    pub regularization: f64,
}

/// TPS radial basis function, `U(0) = 0`.
#[inline]
pub(crate) fn tps_kernel(r: f64) -> f64 {
    if r < 1e-10 { 0.0 } else { r * r * r.ln() }
}

/// Scalar thin-plate spline `f: R² → R`.
#[derive(Debug, Clone)]
pub struct SurfaceSpline {
    nodes: Vec<DVec2>,
    center: DVec2,
    scale: f64,
    weights: Vec<f64>,
    affine: [f64; 3],
}

impl SurfaceSpline {
    pub fn fit(
        nodes: &[DVec2],
        values: &[f64],
        node_weights: Option<&[f64]>,
        config: SplineConfig,
    ) -> Result<Self, SplineError> {
        let mut fitted = Self::fit_many(nodes, &[values], node_weights, config)?;
        Ok(fitted.remove(0))
    }

    /// Fits one spline per value set, factorizing the shared system once.
    pub fn fit_many(
        nodes: &[DVec2],
        value_sets: &[&[f64]],
        node_weights: Option<&[f64]>,
        config: SplineConfig,
    ) -> Result<Vec<Self>, SplineError> {
        let n = nodes.len();
        if n < 3 {
            return Err(SplineError::TooFewNodes { count: n });
        }
        for values in value_sets {
            if values.len() != n {
                return Err(SplineError::LengthMismatch {
                    nodes: n,
                    values: values.len(),
                });
            }
        }
        if let Some(w) = node_weights {
            if w.len() != n {
                return Err(SplineError::LengthMismatch {
                    nodes: n,
                    values: w.len(),
                });
            }
            if let Some((index, &weight)) = w.iter().enumerate().find(|&(_, &w)| !(w > 0.0)) {
                return Err(SplineError::InvalidWeight { index, weight });
            }
        }

        let center = nodes.iter().copied().sum::<DVec2>() / n as f64;
        let extent = nodes
            .iter()
            .map(|p| p.distance(center))
            .fold(0.0f64, f64::max);
        let scale = if extent > 0.0 { 1.0 / extent } else { 1.0 };
        let normalized: Vec<DVec2> = nodes.iter().map(|&p| (p - center) * scale).collect();

        // [K + λW⁻¹  P] [w]   [v]
        // [Pᵀ        0] [a] = [0]
        let size = n + 3;
        let mut matrix = vec![vec![0.0; size]; size];
        for i in 0..n {
            for j in 0..n {
                matrix[i][j] = if i == j {
                    let w = node_weights.map_or(1.0, |w| w[i]);
                    config.regularization / w
                } else {
                    tps_kernel(normalized[i].distance(normalized[j]))
                };
            }
            let p = normalized[i];
            matrix[i][n] = 1.0;
            matrix[i][n + 1] = p.x;
            matrix[i][n + 2] = p.y;
            matrix[n][i] = 1.0;
            matrix[n + 1][i] = p.x;
            matrix[n + 2][i] = p.y;
        }

        let lu = LuDecomposition::new(matrix).ok_or(SplineError::Singular)?;

        Ok(value_sets
            .iter()
            .map(|values| {
                let mut rhs = vec![0.0; size];
                rhs[..n].copy_from_slice(values);
                let solution = lu.solve(&rhs);
                Self {
                    nodes: normalized.clone(),
                    center,
                    scale,
                    weights: solution[..n].to_vec(),
                    affine: [solution[n], solution[n + 1], solution[n + 2]],
                }
            })
            .collect())
    }

    pub fn value(&self, p: DVec2) -> f64 {
        let q = (p - self.center) * self.scale;
        let mut z = self.affine[0] + self.affine[1] * q.x + self.affine[2] * q.y;
        for (node, &w) in self.nodes.iter().zip(&self.weights) {
            z += w * tps_kernel(q.distance(*node));
        }
        z
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }
}

/// Vector thin-plate spline `f: R² → R²`, one surface per coordinate.
#[derive(Debug, Clone)]
pub struct PointSurfaceSpline {
    x: SurfaceSpline,
    y: SurfaceSpline,
}

impl PointSurfaceSpline {
    /// Fits `from[i] → to[i]`.
    pub fn fit(
        from: &[DVec2],
        to: &[DVec2],
        node_weights: Option<&[f64]>,
        config: SplineConfig,
    ) -> Result<Self, SplineError> {
        if from.len() != to.len() {
            return Err(SplineError::LengthMismatch {
                nodes: from.len(),
                values: to.len(),
            });
        }
        let xs: Vec<f64> = to.iter().map(|p| p.x).collect();
        let ys: Vec<f64> = to.iter().map(|p| p.y).collect();
        let mut fitted = SurfaceSpline::fit_many(from, &[&xs, &ys], node_weights, config)?;
        let y = fitted.pop().ok_or(SplineError::Singular)?;
        let x = fitted.pop().ok_or(SplineError::Singular)?;
        Ok(Self { x, y })
    }

    #[inline]
    pub fn apply(&self, p: DVec2) -> DVec2 {
        DVec2::new(self.x.value(p), self.y.value(p))
    }
}

/// LU factorization with partial pivoting.
struct LuDecomposition {
    lu: Vec<Vec<f64>>,
    permutation: Vec<usize>,
}

impl LuDecomposition {
    #[allow(clippy::needless_range_loop)]
    fn new(mut a: Vec<Vec<f64>>) -> Option<Self> {
        let n = a.len();
        let mut permutation: Vec<usize> = (0..n).collect();

        for col in 0..n {
            let mut max_row = col;
            let mut max_val = a[col][col].abs();
            for row in (col + 1)..n {
                let val = a[row][col].abs();
                if val > max_val {
                    max_val = val;
                    max_row = row;
                }
            }
            if max_val < 1e-12 {
                return None;
            }
            if max_row != col {
                a.swap(col, max_row);
                permutation.swap(col, max_row);
            }

            for row in (col + 1)..n {
                let factor = a[row][col] / a[col][col];
                a[row][col] = factor;
                for j in (col + 1)..n {
                    a[row][j] -= factor * a[col][j];
                }
            }
        }

        Some(Self { lu: a, permutation })
    }

    #[allow(clippy::needless_range_loop)]
    fn solve(&self, b: &[f64]) -> Vec<f64> {
        let n = self.lu.len();
        let mut x: Vec<f64> = self.permutation.iter().map(|&i| b[i]).collect();

        for i in 0..n {
            for j in 0..i {
                x[i] -= self.lu[i][j] * x[j];
            }
        }
        for i in (0..n).rev() {
            for j in (i + 1)..n {
                x[i] -= self.lu[i][j] * x[j];
            }
            x[i] /= self.lu[i][i];
        }
        x
    }
}
