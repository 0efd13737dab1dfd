//! Output accumulation buffers.

use rayon::prelude::*;
use serde::Serialize;
use strum_macros::Display;

use crate::common::Buffer2;
use crate::image::PlanarImage;

/// How the final pass brought the output back into [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, Serialize)]
pub enum RangeOperation {
    #[default]
    None,
    Truncate,
    Rescale,
    Normalize,
}

/// Output value range observed before any range correction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputRange {
    pub low: f64,
    pub high: f64,
    pub operation: RangeOperation,
}

/// Accumulated flux and weight, one pair of planes per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputCanvas {
    width: usize,
    height: usize,
    result: Vec<Buffer2<f32>>,
    weight: Vec<Buffer2<f32>>,
}

/// Disjoint band of output rows, mutable in every channel.
#[derive(Debug)]
pub struct RowBand<'a> {
    pub y0: usize,
    pub rows: usize,
    pub width: usize,
    pub result: Vec<&'a mut [f32]>,
    pub weight: Vec<&'a mut [f32]>,
}

impl RowBand<'_> {
    /// Adds a weighted sample to band-local pixel `(x, row)`.
    #[inline]
    pub fn accumulate(&mut self, x: usize, row: usize, c: usize, value: f64, weight: f64) {
        let i = row * self.width + x;
        self.result[c][i] += value as f32;
        self.weight[c][i] += weight as f32;
    }
}

impl OutputCanvas {
    pub fn new(width: usize, height: usize, num_channels: usize) -> Self {
        Self {
            width,
            height,
            result: vec![Buffer2::new_default(width, height); num_channels],
            weight: vec![Buffer2::new_default(width, height); num_channels],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn num_channels(&self) -> usize {
        self.result.len()
    }

    pub fn result(&self, c: usize) -> &Buffer2<f32> {
        &self.result[c]
    }

    pub fn weight(&self, c: usize) -> &Buffer2<f32> {
        &self.weight[c]
    }

    /// Splits the canvas into consecutive row bands of `loads[i]` rows.
    pub fn bands(&mut self, loads: &[usize]) -> Vec<RowBand<'_>> {
        let Self {
            width,
            result,
            weight,
            ..
        } = self;
        let width = *width;

        let mut y0 = 0;
        let mut bands: Vec<RowBand<'_>> = loads
            .iter()
            .map(|&rows| {
                let band = RowBand {
                    y0,
                    rows,
                    width,
                    result: Vec::with_capacity(result.len()),
                    weight: Vec::with_capacity(weight.len()),
                };
                y0 += rows;
                band
            })
            .collect();

        for buffer in result.iter_mut() {
            for (band, rows) in bands.iter_mut().zip(buffer.split_rows_mut(loads)) {
                band.result.push(rows);
            }
        }
        for buffer in weight.iter_mut() {
            for (band, rows) in bands.iter_mut().zip(buffer.split_rows_mut(loads)) {
                band.weight.push(rows);
            }
        }
        bands
    }

    /// Divides accumulated flux by `weight / drop_shrink²`, then truncates
    /// or rescales when the result leaves [0, 1]. Weights are normalized to
    /// their maximum.
    pub fn finalize(&mut self, drop_shrink: f64, truncate: bool) -> OutputRange {
        let s2 = drop_shrink * drop_shrink;

        let (low, high) = self
            .result
            .par_iter_mut()
            .zip(self.weight.par_iter())
            .map(|(r, w)| {
                r.pixels_mut()
                    .par_iter_mut()
                    .zip(w.pixels().par_iter())
                    .filter_map(|(r, &w)| {
                        let ws = w as f64 / s2;
                        if 1.0 + ws != 1.0 {
                            let v = *r as f64 / ws;
                            *r = v as f32;
                            Some((v, v))
                        } else {
                            None
                        }
                    })
                    .reduce_with(|a, b| (a.0.min(b.0), a.1.max(b.1)))
            })
            .flatten()
            .reduce_with(|a, b| (a.0.min(b.0), a.1.max(b.1)))
            .unwrap_or((0.0, 0.0));

        let operation = if low < 0.0 || high > 1.0 {
            let op = if truncate {
                RangeOperation::Truncate
            } else if low < 0.0 {
                RangeOperation::Rescale
            } else {
                RangeOperation::Normalize
            };
            self.correct_range(op, low, high);
            op
        } else {
            RangeOperation::None
        };

        let wm = self
            .weight
            .par_iter()
            .flat_map(|w| w.pixels().par_iter().copied())
            .reduce(|| 0.0f32, f32::max);
        if wm > 0.0 {
            self.weight
                .par_iter_mut()
                .flat_map(|w| w.pixels_mut().par_iter_mut())
                .for_each(|w| *w /= wm);
        }

        OutputRange {
            low,
            high,
            operation,
        }
    }

    fn correct_range(&mut self, operation: RangeOperation, low: f64, high: f64) {
        let apply: Box<dyn Fn(f64) -> f64 + Send + Sync> = match operation {
            RangeOperation::None => return,
            RangeOperation::Truncate => Box::new(|v| v.clamp(0.0, 1.0)),
            RangeOperation::Rescale => {
                let range = high - low;
                Box::new(move |v| if range > 0.0 { (v - low) / range } else { 0.0 })
            }
            RangeOperation::Normalize => Box::new(move |v| v / high),
        };
        self.result
            .par_iter_mut()
            .flat_map(|r| r.pixels_mut().par_iter_mut())
            .for_each(|v| *v = apply(*v as f64) as f32);
    }

    /// Consumes the canvas into `(result, weight)` images.
    pub fn into_images(self) -> (PlanarImage, PlanarImage) {
        (
            PlanarImage::from_channels(self.result),
            PlanarImage::from_channels(self.weight),
        )
    }
}
