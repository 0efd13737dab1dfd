//! Robust location and scale estimators used to build normalization tables.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

/// Median in-place (partial sort via quickselect). Empty input yields 0.
pub fn median_mut(data: &mut [f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let len = data.len();
    let (left, right_median, _) = data.select_nth_unstable_by(len / 2, f64::total_cmp);
    let right = *right_median;
    if len & 1 == 1 {
        right
    } else {
        let left = left.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        (left + right) * 0.5
    }
}

/// Median absolute deviation from `center`.
pub fn mad(values: &[f64], center: f64) -> f64 {
    let mut deviations: Vec<f64> = values.iter().map(|&v| (v - center).abs()).collect();
    median_mut(&mut deviations)
}

/// Mean absolute deviation from `center`.
pub fn average_deviation(values: &[f64], center: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|&v| (v - center).abs()).sum::<f64>() / values.len() as f64
}

/// Biweight midvariance about `center`, tuning constant 9 MAD units.
/// Returns the square root (a scale, not a variance).
pub fn biweight_midvariance(values: &[f64], center: f64) -> f64 {
    let scale = mad(values, center);
    if 1.0 + scale == 1.0 {
        return 0.0;
    }
    let k = 9.0 * scale;
    let mut num = 0.0;
    let mut den = 0.0;
    for &v in values {
        let d = v - center;
        let u = d / k;
        let u2 = u * u;
        if u2 < 1.0 {
            let y = 1.0 - u2;
            num += d * d * y * y * y * y;
            den += y * (1.0 - 5.0 * u2);
        }
    }
    if den == 0.0 {
        return 0.0;
    }
    ((values.len() as f64 * num).sqrt() / den.abs()).abs()
}

/// Pair of estimates computed separately below and above a center value.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TwoSidedEstimate {
    pub low: f64,
    pub high: f64,
}

impl TwoSidedEstimate {
    /// Both sides are significant at machine precision.
    pub fn is_valid(&self) -> bool {
        self.low.is_finite() && self.high.is_finite() && 1.0 + self.low != 1.0 && 1.0 + self.high != 1.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumIter, Serialize, Deserialize)]
pub enum ScaleEstimator {
    AverageDeviation,
    #[default]
    Mad,
    BiweightMidvariance,
}

impl ScaleEstimator {
    pub fn estimate(self, values: &[f64], center: f64) -> f64 {
        match self {
            Self::AverageDeviation => average_deviation(values, center),
            Self::Mad => mad(values, center),
            Self::BiweightMidvariance => biweight_midvariance(values, center),
        }
    }

    /// Scale of samples `<= center` and `> center`, estimated independently.
    pub fn two_sided(self, values: &[f64], center: f64) -> TwoSidedEstimate {
        let (low, high): (Vec<f64>, Vec<f64>) = values.iter().partition(|&&v| v <= center);
        TwoSidedEstimate {
            low: self.estimate(&low, center),
            high: self.estimate(&high, center),
        }
    }
}
