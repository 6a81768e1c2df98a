//! Input-to-output coordinate mapping.
//!
//! A [`PixelMap`] stores, for every input pixel centre, the `(x, y)` position of
//! that centre on the output grid. Pixels are centred on integer coordinates,
//! so input pixel `(i, j)` spans `[i - 0.5, i + 0.5] x [j - 0.5, j + 0.5]`.
//! Non-finite entries mark pixels without a mapping.

use common::{Buffer2, Dimensions};
use glam::DVec2;

use crate::config::InputRegion;
use crate::error::{Error, Result};


/// Largest residual, in input pixels, accepted by [`PixelMap::invert`].
const MAX_INVERSION_ERROR: f64 = 0.03;
const MAX_INVERSION_ITERATIONS: usize = 50;
/// Largest output grid, in pixels, inferred from a pixel map.
pub const MAX_INFERRED_PIXELS: usize = 1 << 30;
/// (sqrt(5) - 1) / 2
const GOLDEN_RATIO: f64 = 0.618_033_988_749_894_8;

#[derive(Debug, Clone, PartialEq)]
pub struct PixelMap {
    coords: Buffer2<DVec2>,
}

impl PixelMap {
    pub fn new(coords: Buffer2<DVec2>) -> Self {
        Self { coords }
    }

    /// Build from an interleaved `(height, width, 2)` buffer of `x, y` pairs.
    pub fn from_interleaved(width: usize, height: usize, data: &[f64]) -> Result<Self> {
        let dims = Dimensions::new(width, height);
        if data.len() != dims.pixel_count() * 2 {
            return Err(Error::ShapeMismatch {
                what: "pixmap",
                detail: format!(
                    "{} values cannot hold a {dims} map of (x, y) pairs",
                    data.len()
                ),
            });
        }
        let pixels = data
            .chunks_exact(2)
            .map(|pair| DVec2::new(pair[0], pair[1]))
            .collect();
        Ok(Self {
            coords: Buffer2::new(width, height, pixels),
        })
    }

    pub fn from_fn(width: usize, height: usize, f: impl FnMut(usize, usize) -> DVec2) -> Self {
        Self {
            coords: Buffer2::from_fn(width, height, f),
        }
    }

    /// Every input pixel maps onto the output pixel with the same index.
    pub fn identity(width: usize, height: usize) -> Self {
        Self::from_fn(width, height, |x, y| DVec2::new(x as f64, y as f64))
    }

    #[inline]
    pub fn dimensions(&self) -> Dimensions {
        self.coords.dimensions()
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.coords.width()
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.coords.height()
    }

    pub fn coords(&self) -> &Buffer2<DVec2> {
        &self.coords
    }

    /// Output position of input pixel `(x, y)`, `None` when unmapped or outside the map.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<DVec2> {
        self.coords
            .get(x as isize, y as isize)
            .copied()
            .filter(|p| p.is_finite())
    }

    /// Output position of an arbitrary input point.
    ///
    /// Bilinear between the four surrounding pixel centres. Points beyond the
    /// outer centres are extrapolated from the closest cell. Along an axis with
    /// a single pixel the map is extended with unit slope.
    pub fn interpolate(&self, p: DVec2) -> Option<DVec2> {
        let dims = self.dimensions();
        if dims.is_empty() || !p.is_finite() {
            return None;
        }
        let (i0, i1, fx) = interpolation_cell(p.x, dims.width);
        let (j0, j1, fy) = interpolation_cell(p.y, dims.height);

        let f00 = self.coords[(i0, j0)];
        let f10 = self.coords[(i1, j0)];
        let f01 = self.coords[(i0, j1)];
        let f11 = self.coords[(i1, j1)];

        let mut out = f00 * ((1.0 - fx) * (1.0 - fy))
            + f10 * (fx * (1.0 - fy))
            + f01 * ((1.0 - fx) * fy)
            + f11 * (fx * fy);
        if dims.width < 2 {
            out.x += fx;
        }
        if dims.height < 2 {
            out.y += fy;
        }

        out.is_finite().then_some(out)
    }

    /// Absolute area magnification of the map at input pixel `(x, y)`.
    ///
    /// Central differences in the interior, one-sided at the borders. An axis
    /// that cannot be differenced (single pixel or unmapped neighbours) uses
    /// unit slope.
    pub fn local_jacobian(&self, x: usize, y: usize) -> f64 {
        let dx = self.derivative(x, y, true).unwrap_or(DVec2::X);
        let dy = self.derivative(x, y, false).unwrap_or(DVec2::Y);
        (dx.x * dy.y - dx.y * dy.x).abs()
    }

    fn derivative(&self, x: usize, y: usize, along_x: bool) -> Option<DVec2> {
        let (pos, len) = if along_x {
            (x, self.width())
        } else {
            (y, self.height())
        };
        if len < 2 {
            return None;
        }
        let at = |k: usize| {
            if along_x {
                self.get(k, y)
            } else {
                self.get(x, k)
            }
        };
        let lo = pos.saturating_sub(1);
        let hi = (pos + 1).min(len - 1);
        let span = (hi - lo) as f64;
        let d = (at(hi)? - at(lo)?) / span;
        d.is_finite().then_some(d)
    }

    /// Smallest rectangle inside `region` holding every mapped pixel.
    ///
    /// `None` when no pixel in the region has a mapping.
    pub fn mapped_bounds(&self, region: InputRegion) -> Option<InputRegion> {
        let mut bounds: Option<InputRegion> = None;
        for y in region.ymin..=region.ymax {
            for x in region.xmin..=region.xmax {
                if self.get(x, y).is_none() {
                    continue;
                }
                bounds = Some(match bounds {
                    None => InputRegion::new(x, x, y, y),
                    Some(b) => InputRegion::new(b.xmin.min(x), b.xmax.max(x), b.ymin, y),
                });
            }
        }
        bounds
    }

    /// Output grid just large enough to hold every mapped pixel centre.
    ///
    /// Fails when nothing is mapped or the grid would exceed
    /// [`MAX_INFERRED_PIXELS`].
    pub fn output_extent(&self) -> Result<Dimensions> {
        let unmapped = || Error::ShapeMismatch {
            what: "pixmap",
            detail: "no finite mapping to infer the output shape from".to_string(),
        };
        let max = self
            .coords
            .pixels()
            .iter()
            .filter(|p| p.is_finite())
            .fold(None, |acc: Option<DVec2>, p| Some(acc.map_or(*p, |m| m.max(*p))))
            .ok_or_else(unmapped)?;
        let width = (max.x + 0.5).ceil();
        let height = (max.y + 0.5).ceil();
        if width < 1.0 || height < 1.0 {
            return Err(unmapped());
        }
        if width * height > MAX_INFERRED_PIXELS as f64 {
            return Err(Error::ShapeMismatch {
                what: "pixmap",
                detail: format!(
                    "inferred output of {width}x{height} pixels exceeds {MAX_INFERRED_PIXELS}, \
                     supply the output shape explicitly"
                ),
            });
        }
        Ok(Dimensions::new(width as usize, height as usize))
    }

    /// Input position whose mapped location is closest to `target`.
    ///
    /// Golden-section search over `region` (grown by half a pixel). Gives up
    /// with `None` if the search leaves the mapped area or does not narrow down
    /// to the required precision.
    pub fn invert(&self, target: DVec2, region: InputRegion) -> Option<DVec2> {
        let mut min = DVec2::new(region.xmin as f64 - 0.5, region.ymin as f64 - 0.5);
        let mut max = DVec2::new(region.xmax as f64 + 0.5, region.ymax as f64 + 0.5);
        let mut span = max - min;

        let dist2 = |x: f64, y: f64| {
            self.interpolate(DVec2::new(x, y))
                .map(|p| p.distance_squared(target))
        };

        let mut iterations = 0;
        while span.max_element() > MAX_INVERSION_ERROR {
            if iterations == MAX_INVERSION_ITERATIONS {
                return None;
            }
            iterations += 1;

            let lo = max - span * GOLDEN_RATIO;
            let hi = min + span * GOLDEN_RATIO;

            let d11 = dist2(lo.x, lo.y)?;
            let d12 = dist2(lo.x, hi.y)?;
            let d21 = dist2(hi.x, lo.y)?;
            let d22 = dist2(hi.x, hi.y)?;

            if d11 < d12 && d11 < d21 && d11 < d22 {
                max = hi;
            } else if d12 < d11 && d12 < d21 && d12 < d22 {
                max.x = hi.x;
                min.y = lo.y;
            } else if d21 < d11 && d21 < d12 && d21 < d22 {
                min.x = lo.x;
                max.y = hi.y;
            } else {
                min = lo;
            }
            span = max - min;
        }

        Some((min + max) * 0.5)
    }
}

/// Lower and upper sample index plus the fractional offset from the lower one.
#[inline]
fn interpolation_cell(pos: f64, len: usize) -> (usize, usize, f64) {
    if len < 2 {
        return (0, 0, pos);
    }
    let i0 = (pos.floor().max(0.0) as usize).min(len - 2);
    (i0, i0 + 1, pos - i0 as f64)
}
