//! Drop kernels.
//!
//! A kernel decides how the flux of one input pixel (its "drop") is spread over
//! the output grid. Output pixel `(ox, oy)` spans `[ox - 0.5, ox + 0.5] x
//! [oy - 0.5, oy + 0.5]`.
//!
//! - **square**: the pixfrac-shrunken input pixel is mapped corner by corner
//!   through the interpolated [`PixelMap`]; the overlap of the resulting
//!   quadrilateral with each output pixel is computed exactly (Green's theorem).
//! - **turbo**: an axis-aligned square drop centred on the mapped centre,
//!   sized from the local Jacobian. Cheaper, exact only without rotation.
//! - **point**: the whole drop lands on the nearest output pixel.
//! - **gaussian**, **lanczos2**, **lanczos3**: sampled radial profiles. They
//!   do not conserve flux. Lanczos fractions can be negative; a pixel whose
//!   accumulated weight cancels to zero is treated as empty again.
//!
//! # References
//!
//! - Fruchter & Hook (2002): "Drizzle: A Method for the Linear Reconstruction
//!   of Undersampled Images"

use std::f64::consts::PI;

use common::Dimensions;
use glam::DVec2;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::error::{Error, Result};
use crate::pixmap::PixelMap;

#[cfg(test)]
mod tests;

/// FWHM to sigma: 2 * sqrt(2 * ln 2).
const FWHM_PER_SIGMA: f64 = 2.3548;
/// Gaussian drops are truncated at this many sigma.
const GAUSSIAN_CUTOFF_SIGMA: f64 = 2.5;
/// Quadrilaterals or squares with a smaller area are treated as degenerate.
const MIN_DROP_AREA: f64 = 1e-30;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Kernel {
    /// Exact quadrilateral overlap. Reference: STScI cdrizzlebox.c `do_kernel_square`.
    #[default]
    Square,
    /// Axis-aligned square drop.
    Turbo,
    /// Nearest output pixel of the mapped centre.
    Point,
    /// Gaussian with FWHM equal to the drop size.
    Gaussian,
    /// Lanczos, a = 2.
    Lanczos2,
    /// Lanczos, a = 3.
    Lanczos3,
}

/// Fate of one input pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropOutcome {
    /// No usable mapping for the pixel or one of its drop corners.
    Unmapped,
    /// Mapped, but no output pixel received a contribution.
    OffGrid,
    /// At least one output pixel received a contribution.
    Landed,
}

impl Kernel {
    /// Parse a kernel name such as `"square"` or `"lanczos3"`.
    pub fn from_name(name: &str) -> Result<Self> {
        name.parse()
            .map_err(|_| Error::InvalidKernel(name.to_string()))
    }

    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Whether the fractions of a drop that lands inside the output sum to one.
    pub fn is_flux_conserving(self) -> bool {
        matches!(self, Kernel::Square | Kernel::Turbo | Kernel::Point)
    }

    /// Spread input pixel `(x, y)` over an `out`-sized grid.
    ///
    /// `sink(ox, oy, fraction)` is called once per output pixel with a
    /// non-zero fraction. Fractions of flux-conserving kernels are overlap
    /// areas divided by the drop area.
    pub fn apply_drop(
        self,
        pixmap: &PixelMap,
        pixfrac: f64,
        out: Dimensions,
        x: usize,
        y: usize,
        mut sink: impl FnMut(usize, usize, f64),
    ) -> DropOutcome {
        let mut landed = false;
        let mut emit = |ox: usize, oy: usize, fraction: f64| {
            if fraction != 0.0 {
                landed = true;
                sink(ox, oy, fraction);
            }
        };

        let mapped = match self {
            Kernel::Square => drop_square(pixmap, pixfrac, out, x, y, &mut emit),
            Kernel::Turbo => drop_turbo(pixmap, pixfrac, out, x, y, &mut emit),
            Kernel::Point => drop_point(pixmap, out, x, y, &mut emit),
            Kernel::Gaussian => drop_gaussian(pixmap, pixfrac, out, x, y, &mut emit),
            Kernel::Lanczos2 => drop_lanczos(pixmap, pixfrac, out, x, y, 2.0, &mut emit),
            Kernel::Lanczos3 => drop_lanczos(pixmap, pixfrac, out, x, y, 3.0, &mut emit),
        };

        match (mapped, landed) {
            (false, _) => DropOutcome::Unmapped,
            (true, false) => DropOutcome::OffGrid,
            (true, true) => DropOutcome::Landed,
        }
    }
}

/// Inclusive index range of output pixels whose centres lie in `[lo, hi]`,
/// clipped to `len`. `None` when empty.
#[inline]
fn centre_range(lo: f64, hi: f64, len: usize) -> Option<(usize, usize)> {
    let first = lo.ceil().max(0.0);
    let last = hi.floor().min(len as f64 - 1.0);
    (first <= last).then(|| (first as usize, last as usize))
}

fn drop_square(
    pixmap: &PixelMap,
    pixfrac: f64,
    out: Dimensions,
    x: usize,
    y: usize,
    emit: &mut impl FnMut(usize, usize, f64),
) -> bool {
    let h = 0.5 * pixfrac;
    let (cx, cy) = (x as f64, y as f64);
    // counterclockwise in input space
    let corners = [
        DVec2::new(cx - h, cy - h),
        DVec2::new(cx + h, cy - h),
        DVec2::new(cx + h, cy + h),
        DVec2::new(cx - h, cy + h),
    ];

    let mut xout = [0.0f64; 4];
    let mut yout = [0.0f64; 4];
    for (k, corner) in corners.iter().enumerate() {
        let Some(p) = pixmap.interpolate(*corner) else {
            return false;
        };
        xout[k] = p.x;
        yout[k] = p.y;
    }

    let jaco = 0.5
        * ((xout[1] - xout[3]) * (yout[0] - yout[2]) - (xout[0] - xout[2]) * (yout[1] - yout[3]));
    let abs_jaco = jaco.abs();
    if abs_jaco < MIN_DROP_AREA {
        return true;
    }

    let xmin = xout.iter().copied().fold(f64::INFINITY, f64::min);
    let xmax = xout.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let ymin = yout.iter().copied().fold(f64::INFINITY, f64::min);
    let ymax = yout.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let (Some((ox0, ox1)), Some((oy0, oy1))) = (
        pixel_span(xmin, xmax, out.width),
        pixel_span(ymin, ymax, out.height),
    ) else {
        return true;
    };

    for oy in oy0..=oy1 {
        for ox in ox0..=ox1 {
            let overlap = boxer(ox as f64, oy as f64, &xout, &yout);
            if overlap > 0.0 {
                emit(ox, oy, overlap / abs_jaco);
            }
        }
    }
    true
}

fn drop_turbo(
    pixmap: &PixelMap,
    pixfrac: f64,
    out: Dimensions,
    x: usize,
    y: usize,
    emit: &mut impl FnMut(usize, usize, f64),
) -> bool {
    let Some(centre) = pixmap.get(x, y) else {
        return false;
    };
    let side = pixfrac * pixmap.local_jacobian(x, y).sqrt();
    let area = side * side;
    if area < MIN_DROP_AREA {
        return true;
    }
    let half = 0.5 * side;
    let lo = centre - half;
    let hi = centre + half;

    let (Some((ox0, ox1)), Some((oy0, oy1))) = (
        pixel_span(lo.x, hi.x, out.width),
        pixel_span(lo.y, hi.y, out.height),
    ) else {
        return true;
    };

    for oy in oy0..=oy1 {
        let dy = interval_overlap(lo.y, hi.y, oy as f64 - 0.5, oy as f64 + 0.5);
        if dy <= 0.0 {
            continue;
        }
        for ox in ox0..=ox1 {
            let dx = interval_overlap(lo.x, hi.x, ox as f64 - 0.5, ox as f64 + 0.5);
            if dx > 0.0 {
                emit(ox, oy, dx * dy / area);
            }
        }
    }
    true
}

fn drop_point(
    pixmap: &PixelMap,
    out: Dimensions,
    x: usize,
    y: usize,
    emit: &mut impl FnMut(usize, usize, f64),
) -> bool {
    let Some(centre) = pixmap.get(x, y) else {
        return false;
    };
    // ties round away from zero, so a centre on -0.5 falls off the grid
    let ox = centre.x.round();
    let oy = centre.y.round();
    if ox >= 0.0 && oy >= 0.0 && ox < out.width as f64 && oy < out.height as f64 {
        emit(ox as usize, oy as usize, 1.0);
    }
    true
}

fn drop_gaussian(
    pixmap: &PixelMap,
    pixfrac: f64,
    out: Dimensions,
    x: usize,
    y: usize,
    emit: &mut impl FnMut(usize, usize, f64),
) -> bool {
    let Some(centre) = pixmap.get(x, y) else {
        return false;
    };
    let fwhm = pixfrac * pixmap.local_jacobian(x, y).sqrt();
    let sigma = fwhm / FWHM_PER_SIGMA;
    if sigma * sigma < MIN_DROP_AREA {
        return true;
    }
    let radius = GAUSSIAN_CUTOFF_SIGMA * sigma;
    let radius2 = radius * radius;
    let inv_2sigma2 = 1.0 / (2.0 * sigma * sigma);
    let amplitude = inv_2sigma2 / PI;

    let (Some((ox0, ox1)), Some((oy0, oy1))) = (
        centre_range(centre.x - radius, centre.x + radius, out.width),
        centre_range(centre.y - radius, centre.y + radius, out.height),
    ) else {
        return true;
    };

    for oy in oy0..=oy1 {
        let dy = oy as f64 - centre.y;
        for ox in ox0..=ox1 {
            let dx = ox as f64 - centre.x;
            let r2 = dx * dx + dy * dy;
            if r2 <= radius2 {
                emit(ox, oy, amplitude * (-r2 * inv_2sigma2).exp());
            }
        }
    }
    true
}

fn drop_lanczos(
    pixmap: &PixelMap,
    pixfrac: f64,
    out: Dimensions,
    x: usize,
    y: usize,
    a: f64,
    emit: &mut impl FnMut(usize, usize, f64),
) -> bool {
    let Some(centre) = pixmap.get(x, y) else {
        return false;
    };
    let s = pixfrac * pixmap.local_jacobian(x, y).sqrt();
    let s2 = s * s;
    if s2 < MIN_DROP_AREA {
        return true;
    }
    let support = a * s;

    let (Some((ox0, ox1)), Some((oy0, oy1))) = (
        centre_range(centre.x - support, centre.x + support, out.width),
        centre_range(centre.y - support, centre.y + support, out.height),
    ) else {
        return true;
    };

    for oy in oy0..=oy1 {
        let ly = lanczos((oy as f64 - centre.y) / s, a);
        if ly == 0.0 {
            continue;
        }
        for ox in ox0..=ox1 {
            let lx = lanczos((ox as f64 - centre.x) / s, a);
            emit(ox, oy, lx * ly / s2);
        }
    }
    true
}

/// Inclusive range of output pixels whose extent `[o - 0.5, o + 0.5]`
/// intersects `[lo, hi]`.
#[inline]
fn pixel_span(lo: f64, hi: f64, len: usize) -> Option<(usize, usize)> {
    let first = (lo + 0.5).floor().max(0.0);
    let last = (hi + 0.5).floor().min(len as f64 - 1.0);
    (first <= last).then(|| (first as usize, last as usize))
}

#[inline]
fn interval_overlap(a0: f64, a1: f64, b0: f64, b1: f64) -> f64 {
    (a1.min(b1) - a0.max(b0)).max(0.0)
}

/// Lanczos window `sinc(x) * sinc(x / a)` on `|x| < a`.
#[inline]
pub(crate) fn lanczos(x: f64, a: f64) -> f64 {
    if x.abs() < 1e-12 {
        return 1.0;
    }
    if x.abs() >= a {
        return 0.0;
    }
    let pi_x = PI * x;
    let pi_x_a = pi_x / a;
    (pi_x.sin() / pi_x) * (pi_x_a.sin() / pi_x_a)
}

/// Signed area between a segment and the x-axis, clipped to the unit square
/// `[0, 1] x [0, 1]`. Port of STScI `sgarea()` from cdrizzlebox.c.
///
/// Summed over the edges of a counterclockwise convex polygon this gives the
/// polygon's overlap with the unit square; clockwise winding flips the sign.
#[inline]
fn sgarea(x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    let dx = x2 - x1;
    let dy = y2 - y1;

    // near-vertical edges enclose no area
    if dx.abs() < 1e-14 {
        return 0.0;
    }

    // traversal direction, endpoints sorted by x
    let (sgn_dx, xlo, xhi) = if dx < 0.0 {
        (-1.0, x2, x1)
    } else {
        (1.0, x1, x2)
    };

    // left or right of the unit square
    if xlo >= 1.0 || xhi <= 0.0 {
        return 0.0;
    }

    let xlo = xlo.max(0.0);
    let xhi = xhi.min(1.0);

    // y at the clipped x endpoints
    let slope = dy / dx;
    let ylo = y1 + slope * (xlo - x1);
    let yhi = y1 + slope * (xhi - x1);

    // below the x-axis
    if ylo <= 0.0 && yhi <= 0.0 {
        return 0.0;
    }

    // above y = 1: the full strip counts
    if ylo >= 1.0 && yhi >= 1.0 {
        return sgn_dx * (xhi - xlo);
    }

    // shared by the y = 0 and y = 1 intercepts
    let det = x1 * y2 - y1 * x2;

    // clip to y >= 0 at the x-axis crossing
    let (xlo, ylo) = if ylo < 0.0 {
        (det / dy, 0.0)
    } else {
        (xlo, ylo)
    };
    let (xhi, yhi) = if yhi < 0.0 {
        (det / dy, 0.0)
    } else {
        (xhi, yhi)
    };

    if ylo <= 1.0 {
        if yhi <= 1.0 {
            // both ends inside: trapezoid
            return sgn_dx * 0.5 * (xhi - xlo) * (yhi + ylo);
        }
        // leaves through y = 1 at xtop
        let xtop = (dx + det) / dy;
        return sgn_dx * (0.5 * (xtop - xlo) * (1.0 + ylo) + xhi - xtop);
    }

    // enters above y = 1, leaves inside
    let xtop = (dx + det) / dy;
    sgn_dx * (0.5 * (xhi - xtop) * (1.0 + yhi) + xtop - xlo)
}

/// Overlap area between a convex quadrilateral and output pixel `(ox, oy)`.
///
/// The pixel spans `[ox - 0.5, ox + 0.5]`, so the quadrilateral is shifted by
/// `ox - 0.5` to bring the pixel onto the unit square.
#[inline]
fn boxer(ox: f64, oy: f64, x: &[f64; 4], y: &[f64; 4]) -> f64 {
    let x0 = ox - 0.5;
    let y0 = oy - 0.5;
    let px = x.map(|v| v - x0);
    let py = y.map(|v| v - y0);

    let mut sum = 0.0;
    for i in 0..4 {
        let j = (i + 1) & 3;
        sum += sgarea(px[i], py[i], px[j], py[j]);
    }
    sum.abs()
}
