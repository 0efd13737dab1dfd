//! Color filter array pixel selection.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CfaError {
    #[error("Empty CFA pattern")]
    Empty,

    #[error("Invalid CFA pattern '{0}'")]
    Invalid(String),

    #[error("Non-square CFA patterns are not supported: '{0}'")]
    NonSquare(String),
}

/// Per-channel RGB membership of a square mosaic tile, e.g. `RGGB`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfaIndex {
    pattern: String,
    size: usize,
    /// `size × size` cells, row-major, holding the channel index 0..3 or
    /// `None` for letters outside `RGB`.
    cells: Vec<Option<u8>>,
}

impl CfaIndex {
    pub fn new(pattern: &str) -> Result<Self, CfaError> {
        if pattern.is_empty() {
            return Err(CfaError::Empty);
        }
        let len = pattern.chars().count();
        let size = (len as f64).sqrt() as usize;
        if size < 2 {
            return Err(CfaError::Invalid(pattern.to_string()));
        }
        if size * size != len {
            return Err(CfaError::NonSquare(pattern.to_string()));
        }
        let cells = pattern
            .chars()
            .map(|ch| "RGB".find(ch).map(|c| c as u8))
            .collect();
        Ok(Self {
            pattern: pattern.to_string(),
            size,
            cells,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// True if source pixel `(x, y)` carries channel `c`.
    #[inline]
    pub fn contains(&self, x: usize, y: usize, c: usize) -> bool {
        self.cells[(y % self.size) * self.size + x % self.size] == Some(c as u8)
    }
}
