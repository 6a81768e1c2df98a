//! Row-major 2D sample grid shared by the image, weight and context arrays.

use std::fmt;
use std::ops::{Deref, DerefMut, Index, IndexMut};
use std::slice;

/// Width and height of a 2D grid, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Dimensions {
    pub width: usize,
    pub height: usize,
}

impl Dimensions {
    pub const fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    #[inline]
    pub const fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether `(x, y)` addresses a pixel of this grid.
    #[inline]
    pub fn contains(&self, x: isize, y: isize) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Sample vector length does not match the requested dimensions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("buffer of {len} samples cannot hold a {dims} grid")]
pub struct DimensionError {
    pub dims: Dimensions,
    pub len: usize,
}

/// Dense row-major grid addressed by `(x, y)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Buffer2<T> {
    pixels: Vec<T>,
    dims: Dimensions,
}

impl<T> Buffer2<T> {
    /// Wrap `pixels` as a `width x height` grid.
    ///
    /// Panics if the length does not match; use [`Buffer2::try_new`] for
    /// externally supplied buffers.
    pub fn new(width: usize, height: usize, pixels: Vec<T>) -> Self {
        match Self::try_new(width, height, pixels) {
            Ok(buffer) => buffer,
            Err(e) => panic!("{e}"),
        }
    }

    pub fn try_new(width: usize, height: usize, pixels: Vec<T>) -> Result<Self, DimensionError> {
        let dims = Dimensions::new(width, height);
        if pixels.len() != dims.pixel_count() {
            return Err(DimensionError {
                dims,
                len: pixels.len(),
            });
        }
        Ok(Self { pixels, dims })
    }

    /// Build a grid by evaluating `f(x, y)` for every pixel in row-major order.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut pixels = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Self {
            pixels,
            dims: Dimensions::new(width, height),
        }
    }

    #[inline]
    pub fn dimensions(&self) -> Dimensions {
        self.dims
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.dims.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.dims.height
    }

    #[inline]
    pub fn same_dimensions<U>(&self, other: &Buffer2<U>) -> bool {
        self.dims == other.dims
    }

    /// Linear index of `(x, y)`.
    #[inline]
    pub fn offset(&self, x: usize, y: usize) -> usize {
        debug_assert!(x < self.dims.width && y < self.dims.height);
        y * self.dims.width + x
    }

    /// Sample at `(x, y)`, or `None` outside the grid.
    #[inline]
    pub fn get(&self, x: isize, y: isize) -> Option<&T> {
        if self.dims.contains(x, y) {
            Some(&self.pixels[y as usize * self.dims.width + x as usize])
        } else {
            None
        }
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
    pub fn row(&self, y: usize) -> &[T] {
        let start = y * self.dims.width;
        &self.pixels[start..start + self.dims.width]
    }

    /// Iterate over rows, top to bottom.
    pub fn rows(&self) -> slice::Chunks<'_, T> {
        // chunks(0) panics, an empty grid has no rows anyway
        self.pixels.chunks(self.dims.width.max(1))
    }

    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> Buffer2<U> {
        Buffer2 {
            pixels: self.pixels.iter().map(f).collect(),
            dims: self.dims,
        }
    }

    #[inline]
    pub fn into_vec(self) -> Vec<T> {
        self.pixels
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
            dims: Dimensions::new(width, height),
        }
    }
}

impl<T> Index<(usize, usize)> for Buffer2<T> {
    type Output = T;

    #[inline]
    fn index(&self, (x, y): (usize, usize)) -> &Self::Output {
        &self.pixels[y * self.dims.width + x]
    }
}

impl<T> IndexMut<(usize, usize)> for Buffer2<T> {
    #[inline]
    fn index_mut(&mut self, (x, y): (usize, usize)) -> &mut Self::Output {
        &mut self.pixels[y * self.dims.width + x]
    }
}

impl<T> Deref for Buffer2<T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.pixels
    }
}

impl<T> DerefMut for Buffer2<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.pixels
    }
}

impl<'a, T> IntoIterator for &'a Buffer2<T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.pixels.iter()
    }
}

impl<T> From<Buffer2<T>> for Vec<T> {
    #[inline]
    fn from(buffer: Buffer2<T>) -> Self {
        buffer.pixels
    }
}
