//! Provenance bit planes.
//!
//! Every accepted input image gets a context ID. Bit `id % 32` of plane
//! `id / 32` is set on each output pixel the image contributed to. Planes are
//! appended on demand and never removed.

use common::{Buffer2, Dimensions};

use crate::error::{Error, Result};


/// Context IDs stored per plane.
pub const BITS_PER_PLANE: u32 = u32::BITS;

#[derive(Debug, Clone, PartialEq)]
pub struct ContextPlanes {
    dims: Dimensions,
    planes: Vec<Buffer2<u32>>,
}

impl ContextPlanes {
    /// No planes yet.
    pub fn empty(dims: Dimensions) -> Self {
        Self {
            dims,
            planes: Vec::new(),
        }
    }

    /// Adopt an existing context array.
    ///
    /// `shape` is `[height, width]` for a single plane or
    /// `[planes, height, width]`; `data` is row-major.
    pub fn from_array(shape: &[usize], data: Vec<u32>) -> Result<Self> {
        let (count, height, width) = match *shape {
            [height, width] => (1, height, width),
            [count, height, width] => (count, height, width),
            _ => return Err(Error::InvalidContextShape { rank: shape.len() }),
        };
        let dims = Dimensions::new(width, height);
        let plane_len = dims.pixel_count();
        if data.len() != count * plane_len {
            return Err(Error::ShapeMismatch {
                what: "out_ctx",
                detail: format!("{} values cannot fill shape {shape:?}", data.len()),
            });
        }

        let planes = if plane_len == 0 {
            (0..count).map(|_| Buffer2::new(width, height, Vec::new())).collect()
        } else {
            data.chunks_exact(plane_len)
                .map(|chunk| Buffer2::new(width, height, chunk.to_vec()))
                .collect()
        };
        Ok(Self { dims, planes })
    }

    /// `(plane index, bit index)` of a context ID.
    #[inline]
    pub const fn location(id: u32) -> (usize, u32) {
        ((id / BITS_PER_PLANE) as usize, id % BITS_PER_PLANE)
    }

    #[inline]
    pub fn dimensions(&self) -> Dimensions {
        self.dims
    }

    #[inline]
    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }

    pub fn planes(&self) -> &[Buffer2<u32>] {
        &self.planes
    }

    /// Append zero planes until `id` has a bit to live in.
    pub fn ensure_id(&mut self, id: u32) {
        let (plane, _) = Self::location(id);
        while self.planes.len() <= plane {
            self.planes
                .push(Buffer2::new_default(self.dims.width, self.dims.height));
        }
    }

    /// Mark pixel `(x, y)` as touched by `id`.
    #[inline]
    pub fn set(&mut self, id: u32, x: usize, y: usize) {
        self.ensure_id(id);
        let (plane, bit) = Self::location(id);
        self.planes[plane][(x, y)] |= 1 << bit;
    }

    /// Forget every contributor of `(x, y)`.
    pub fn clear(&mut self, x: usize, y: usize) {
        for plane in &mut self.planes {
            plane[(x, y)] = 0;
        }
    }

    pub fn is_set(&self, id: u32, x: usize, y: usize) -> bool {
        let (plane, bit) = Self::location(id);
        self.planes
            .get(plane)
            .is_some_and(|p| p[(x, y)] & (1 << bit) != 0)
    }

    /// Whether any image contributed to `(x, y)`.
    pub fn any_at(&self, x: usize, y: usize) -> bool {
        self.planes.iter().any(|p| p[(x, y)] != 0)
    }

    /// Whether any bit is set anywhere.
    pub fn has_data(&self) -> bool {
        self.planes.iter().any(|p| p.iter().any(|&v| v != 0))
    }

    /// IDs of the images that contributed to `(x, y)`, ascending.
    pub fn contributors(&self, x: usize, y: usize) -> Vec<u32> {
        let mut ids = Vec::new();
        for (index, plane) in self.planes.iter().enumerate() {
            let mut bits = plane[(x, y)];
            while bits != 0 {
                let bit = bits.trailing_zeros();
                ids.push(index as u32 * BITS_PER_PLANE + bit);
                bits &= bits - 1;
            }
        }
        ids
    }

    /// Contributors for each of `pixels`.
    pub fn decode(&self, pixels: &[(usize, usize)]) -> Vec<Vec<u32>> {
        pixels
            .iter()
            .map(|&(x, y)| self.contributors(x, y))
            .collect()
    }

    /// `([planes, height, width], row-major data)`.
    pub fn to_array(&self) -> (Vec<usize>, Vec<u32>) {
        let shape = vec![self.planes.len(), self.dims.height, self.dims.width];
        let data = self
            .planes
            .iter()
            .flat_map(|p| p.pixels().iter().copied())
            .collect();
        (shape, data)
    }
}
