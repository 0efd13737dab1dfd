use std::ops::{Index, IndexMut};

/// Row-major 2D buffer, one image plane.
#[derive(Debug, Clone, PartialEq)]
pub struct Buffer2<T> {
    pixels: Vec<T>,
    width: usize,
    height: usize,
}

impl<T> Buffer2<T> {
    pub fn new(width: usize, height: usize, pixels: Vec<T>) -> Self {
        assert_eq!(
            pixels.len(),
            width * height,
            "pixels length must equal width * height"
        );
        Self {
            pixels,
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

    #[inline]
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    #[inline]
    pub fn pixels(&self) -> &[T] {
        &self.pixels
    }

    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [T] {
        &mut self.pixels
    }

    #[inline]
    pub fn into_pixels(self) -> Vec<T> {
        self.pixels
    }

    #[inline]
    pub fn row(&self, y: usize) -> &[T] {
        let start = y * self.width;
        &self.pixels[start..start + self.width]
    }

    /// Splits the buffer into consecutive mutable bands of `rows[i]` rows each.
    ///
    /// The row counts must add up to the buffer height.
    pub fn split_rows_mut(&mut self, rows: &[usize]) -> Vec<&mut [T]> {
        assert_eq!(
            rows.iter().sum::<usize>(),
            self.height,
            "row bands must cover the whole buffer"
        );
        let mut rest: &mut [T] = &mut self.pixels;
        let mut bands = Vec::with_capacity(rows.len());
        for &count in rows {
            let (band, tail) = std::mem::take(&mut rest).split_at_mut(count * self.width);
            bands.push(band);
            rest = tail;
        }
        bands
    }
}

impl<T: Default + Clone> Buffer2<T> {
    pub fn new_default(width: usize, height: usize) -> Self {
        Self::new_filled(width, height, T::default())
    }
}

impl<T: Clone> Buffer2<T> {
    pub fn new_filled(width: usize, height: usize, value: T) -> Self {
        Self {
            pixels: vec![value; width * height],
            width,
            height,
        }
    }
}

impl<T> Index<(usize, usize)> for Buffer2<T> {
    type Output = T;

    #[inline]
    fn index(&self, (x, y): (usize, usize)) -> &Self::Output {
        debug_assert!(x < self.width && y < self.height);
        &self.pixels[y * self.width + x]
    }
}

impl<T> IndexMut<(usize, usize)> for Buffer2<T> {
    #[inline]
    fn index_mut(&mut self, (x, y): (usize, usize)) -> &mut Self::Output {
        debug_assert!(x < self.width && y < self.height);
        &mut self.pixels[y * self.width + x]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_is_row_major() {
        let buffer = Buffer2::new(3, 2, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(buffer[(2, 0)], 2);
        assert_eq!(buffer[(0, 1)], 3);
        assert_eq!(buffer.row(1), &[3, 4, 5]);
    }

    #[test]
    fn test_split_rows_mut_disjoint_bands() {
        let mut buffer = Buffer2::new_default(2, 5);
        {
            let bands = buffer.split_rows_mut(&[2, 0, 3]);
            assert_eq!(bands.len(), 3);
            assert_eq!(bands[0].len(), 4);
            assert!(bands[1].is_empty());
            assert_eq!(bands[2].len(), 6);
            for (i, band) in bands.into_iter().enumerate() {
                band.fill(i as i32 + 1);
            }
        }
        assert_eq!(buffer.pixels(), &[1, 1, 1, 1, 3, 3, 3, 3, 3, 3]);
    }

    #[test]
    #[should_panic(expected = "row bands must cover the whole buffer")]
    fn test_split_rows_mut_requires_full_cover() {
        let mut buffer: Buffer2<f32> = Buffer2::new_default(2, 5);
        buffer.split_rows_mut(&[2, 2]);
    }
}
