use std::ops::{Add, Mul};

use glam::DVec2;
use rayon::prelude::*;

use crate::common::Buffer2;
use crate::geometry::DRect;

/// Regular grid of sampled values with bilinear interpolation between nodes.
///
/// Nodes sit at `origin + (i·delta.x, j·delta.y)`. Grids sampled from a
/// function cover the rectangle with one extra row and column so the far
/// edges are interpolated too. Lookups outside the grid are clamped to the
/// nearest edge.
#[derive(Debug, Clone)]
pub struct GridInterpolation<T> {
    origin: DVec2,
    delta: DVec2,
    nodes: Buffer2<T>,
}

pub type PointGridInterpolation = GridInterpolation<DVec2>;

impl<T> GridInterpolation<T>
where
    T: Copy + Default + Send + Sync + Add<Output = T> + Mul<f64, Output = T>,
{
    /// Samples `f` over `rect` every `delta` units, rows evaluated in parallel.
    pub fn from_fn<F>(rect: DRect, delta: f64, f: F) -> Self
    where
        F: Fn(DVec2) -> T + Sync,
    {
        assert!(delta > 0.0, "Grid delta must be positive, got {delta}");
        let width = (rect.width() / delta).ceil() as usize + 1;
        let height = (rect.height() / delta).ceil() as usize + 1;
        let origin = rect.top_left();

        let mut pixels = vec![T::default(); width * height];
        pixels
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(j, row)| {
                let y = origin.y + j as f64 * delta;
                for (i, node) in row.iter_mut().enumerate() {
                    *node = f(DVec2::new(origin.x + i as f64 * delta, y));
                }
            });

        Self {
            origin,
            delta: DVec2::splat(delta),
            nodes: Buffer2::new(width, height, pixels),
        }
    }

    /// Wraps precomputed nodes.
    pub fn from_nodes(origin: DVec2, delta: DVec2, nodes: Buffer2<T>) -> Self {
        assert!(
            delta.x > 0.0 && delta.y > 0.0,
            "Grid delta must be positive, got {delta}"
        );
        assert!(!nodes.is_empty(), "Grid must have at least one node");
        Self {
            origin,
            delta,
            nodes,
        }
    }

    pub fn delta(&self) -> DVec2 {
        self.delta
    }

    pub fn nodes(&self) -> &Buffer2<T> {
        &self.nodes
    }

    pub fn value(&self, p: DVec2) -> T {
        let w = self.nodes.width();
        let h = self.nodes.height();
        let g = (p - self.origin) / self.delta;
        let gx = g.x.clamp(0.0, (w - 1) as f64);
        let gy = g.y.clamp(0.0, (h - 1) as f64);

        let i0 = (gx as usize).min(w.saturating_sub(2));
        let j0 = (gy as usize).min(h.saturating_sub(2));
        let i1 = (i0 + 1).min(w - 1);
        let j1 = (j0 + 1).min(h - 1);
        let fx = gx - i0 as f64;
        let fy = gy - j0 as f64;

        let top = self.nodes[(i0, j0)] * (1.0 - fx) + self.nodes[(i1, j0)] * fx;
        let bottom = self.nodes[(i0, j1)] * (1.0 - fx) + self.nodes[(i1, j1)] * fx;
        top * (1.0 - fy) + bottom * fy
    }
}

impl<T> GridInterpolation<T>
where
    T: Copy + Send + Sync,
{
    /// Rewrites every node in place, `f` receives the node position.
    pub fn update_nodes<F>(&mut self, f: F)
    where
        F: Fn(DVec2, &mut T) + Sync,
    {
        let width = self.nodes.width();
        let origin = self.origin;
        let delta = self.delta;
        self.nodes
            .pixels_mut()
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(j, row)| {
                let y = origin.y + j as f64 * delta.y;
                for (i, node) in row.iter_mut().enumerate() {
                    f(DVec2::new(origin.x + i as f64 * delta.x, y), node);
                }
            });
    }
}
