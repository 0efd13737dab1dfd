//! Row band accumulation of one input file.

use glam::DVec2;
use rayon::prelude::*;

use super::canvas::{OutputCanvas, RowBand};
use super::error::Error;
use super::progress::AbortFlag;
use super::BOUNDS_TOLERANCE;
use crate::alignment::Alignment;
use crate::cfa::CfaIndex;
use crate::drizzle_data::RejectionMap;
use crate::geometry::{self, DRect};
use crate::image::PlanarImage;
use crate::kernel::DropKernel;
use crate::normalization::Normalization;

/// Everything the workers read while integrating one file.
pub(crate) struct FileContext<'a> {
    pub source: &'a PlanarImage,
    pub alignment: &'a Alignment,
    pub normalization: &'a Normalization,
    pub rejection: Option<&'a RejectionMap>,
    pub cfa: Option<&'a CfaIndex>,
    /// Integrated kernel template, cloned by every band.
    pub kernel: Option<&'a DropKernel>,
    pub circular: bool,
    /// Per output channel.
    pub weights: &'a [f64],
    /// Output pixel coordinates of the canvas origin.
    pub origin: DVec2,
    /// Reference pixels per output pixel.
    pub pixel_size: f64,
    pub drop_deltas: (f64, f64),
    pub abort: &'a AbortFlag,
}

/// Integrates one file into `canvas`, one parallel task per row band of
/// `loads[i]` rows. Returns the total contributing drop area.
pub(crate) fn integrate_bands(
    ctx: &FileContext<'_>,
    canvas: &mut OutputCanvas,
    loads: &[usize],
) -> Result<f64, Error> {
    canvas
        .bands(loads)
        .into_par_iter()
        .map(|band| integrate_band(ctx, band))
        .collect::<Vec<_>>()
        .into_iter()
        .sum()
}

/// Accumulates every drop overlapping the band's output pixels.
///
/// Returns the sum of contributing drop areas, or [`Error::Aborted`] when
/// the abort flag is raised before a row starts.
pub(crate) fn integrate_band(ctx: &FileContext<'_>, mut band: RowBand<'_>) -> Result<f64, Error> {
    let mut kernel = ctx.kernel.cloned();
    let channels = band.result.len();
    let source_width = ctx.source.width() as i64;
    let source_height = ctx.source.height() as i64;
    let (d0, d1) = ctx.drop_deltas;
    let ps = ctx.pixel_size;
    let mut total_drop_area = 0.0;

    for row in 0..band.rows {
        if ctx.abort.is_aborted() {
            return Err(Error::Aborted);
        }
        let y = (band.y0 + row) as f64 + ctx.origin.y;

        for x in 0..band.width {
            let rx = (x as f64 + ctx.origin.x) * ps;
            let ry = y * ps;
            let reference = DRect::new(rx, ry, rx + ps, ry + ps);
            let q = reference.top_left() + BOUNDS_TOLERANCE;
            let (qx, qy) = (q.x as usize, q.y as usize);

            let mut first_channel = 0;
            if ctx.rejection.is_some_and(|r| r.is_rejected(qx, qy, 0)) {
                if channels == 1 {
                    continue;
                }
                first_channel = 1;
            }

            let quad = ctx.alignment.source_quad(&reference);
            let bounds = DRect::bounding(&quad, BOUNDS_TOLERANCE);
            let sx0 = (bounds.x0.trunc() as i64).max(0);
            let sy0 = (bounds.y0.trunc() as i64).max(0);
            let sx1 = (bounds.x1.trunc() as i64).min(source_width - 1);
            let sy1 = (bounds.y1.trunc() as i64).min(source_height - 1);

            for sy in sy0..=sy1 {
                for sx in sx0..=sx1 {
                    let (fx, fy) = (sx as f64, sy as f64);
                    let drop = DRect::new(fx + d0, fy + d0, fx + d1, fy + d1);
                    if !drop.can_intersect(&bounds) {
                        continue;
                    }

                    let area = if ctx.circular {
                        geometry::area_of_intersection_of_quad_and_circle(
                            drop.center(),
                            drop.width() / 2.0,
                            &quad,
                        )
                    } else {
                        if let Some(k) = kernel.as_mut() {
                            k.move_to(drop.x0, drop.y0);
                        }
                        geometry::area_of_intersection_of_quad_and_rect(&drop, &quad, kernel.as_ref())
                    };
                    let Some(area) = area else {
                        continue;
                    };

                    let (px, py) = (sx as usize, sy as usize);
                    for c in first_channel..channels {
                        if ctx.cfa.is_some_and(|cfa| !cfa.contains(px, py, c)) {
                            continue;
                        }
                        if ctx.rejection.is_some_and(|r| r.is_rejected(qx, qy, c)) {
                            continue;
                        }
                        let source_channel = if ctx.cfa.is_some() { 0 } else { c };
                        let v = ctx.source.sample(px, py, source_channel) as f64;
                        if v.abs() > f64::EPSILON {
                            let w = area * ctx.weights[c];
                            let z = ctx.normalization.apply(v, qx, qy, c);
                            band.accumulate(x, row, c, w * z, w);
                        }
                    }
                    total_drop_area += area;
                }
            }
        }
    }

    Ok(total_drop_area)
}
