//! Bit-packed 2D mask.

const BITS_PER_WORD: usize = 64;

/// A 2D boolean mask storing one bit per element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitBuffer2 {
    words: Vec<u64>,
    width: usize,
    height: usize,
}

impl BitBuffer2 {
    pub fn new_default(width: usize, height: usize) -> Self {
        Self {
            words: vec![0; (width * height).div_ceil(BITS_PER_WORD)],
            width,
            height,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Bit at `(x, y)`; coordinates outside the mask read as false.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let i = y * self.width + x;
        self.words[i / BITS_PER_WORD] & (1u64 << (i % BITS_PER_WORD)) != 0
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: bool) {
        assert!(
            x < self.width && y < self.height,
            "({x}, {y}) outside {}x{} mask",
            self.width,
            self.height
        );
        let i = y * self.width + x;
        let mask = 1u64 << (i % BITS_PER_WORD);
        if value {
            self.words[i / BITS_PER_WORD] |= mask;
        } else {
            self.words[i / BITS_PER_WORD] &= !mask;
        }
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }
}
