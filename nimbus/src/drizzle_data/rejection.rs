use serde::{Deserialize, Serialize};

use super::DrizzleDataError;
use crate::common::BitBuffer2;

/// Pixel rejection results in reference frame coordinates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RejectionData {
    pub low_count: Vec<u64>,
    pub high_count: Vec<u64>,
    /// Rejected `[x, y, channel]` triples.
    pub pixels: Vec<[usize; 3]>,
}

impl RejectionData {
    pub(super) fn validate(
        &self,
        width: usize,
        height: usize,
        channels: usize,
    ) -> Result<(), DrizzleDataError> {
        let counts_ok = |v: &[u64]| v.is_empty() || v.len() == channels;
        if !counts_ok(&self.low_count) || !counts_ok(&self.high_count) {
            return Err(DrizzleDataError::InvalidRejectionCounts {
                expected: channels,
                low: self.low_count.len(),
                high: self.high_count.len(),
            });
        }
        if let Some(&[x, y, channel]) = self
            .pixels
            .iter()
            .find(|&&[x, y, c]| x >= width || y >= height || c >= channels)
        {
            return Err(DrizzleDataError::RejectionPixelOutOfRange { x, y, channel });
        }
        Ok(())
    }

    pub fn low(&self, c: usize) -> u64 {
        self.low_count.get(c).copied().unwrap_or(0)
    }

    pub fn high(&self, c: usize) -> u64 {
        self.high_count.get(c).copied().unwrap_or(0)
    }
}

/// One bit per reference pixel and channel.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectionMap {
    channels: Vec<BitBuffer2>,
}

impl RejectionMap {
    /// Pixels must already be validated against the geometry.
    pub fn new(data: &RejectionData, width: usize, height: usize, channels: usize) -> Self {
        let mut maps = vec![BitBuffer2::new_default(width, height); channels];
        for &[x, y, c] in &data.pixels {
            maps[c].set(x, y, true);
        }
        Self { channels: maps }
    }

    #[inline]
    pub fn is_rejected(&self, x: usize, y: usize, c: usize) -> bool {
        self.channels.get(c).is_some_and(|m| m.get(x, y))
    }

    pub fn rejected_count(&self, c: usize) -> usize {
        self.channels.get(c).map_or(0, BitBuffer2::count_ones)
    }
}
