//! Inverse resampling ("blot").
//!
//! Samples an output-space image back onto the input grid described by a
//! [`PixelMap`]: every input pixel takes the interpolated value of `data` at its
//! mapped output position. Nothing is accumulated and no context is tracked.
//!
//! # Interpolation Methods
//!
//! - **nearest**: value of the pixel containing the point.
//! - **linear**: bilinear between the four surrounding centres.
//! - **poly3**: separable cubic Lagrange through a 4x4 neighbourhood.
//! - **lan3**, **lan5**: separable Lanczos of order 3 and 5, normalised so the
//!   weights sum to one.
//!
//! Neighbours beyond the edge of `data` repeat the border pixel.

use common::{Buffer2, Dimensions};
use glam::DVec2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::config::BlotOptions;
use crate::error::{Error, Result};
use crate::kernel::lanczos;
use crate::pixmap::PixelMap;


/// Widest separable footprint, `2 * 5` taps for lan5.
const MAX_TAPS: usize = 10;

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
pub enum Interpolation {
    Nearest,
    #[default]
    Linear,
    Poly3,
    Lan3,
    Lan5,
}

impl Interpolation {
    /// Parse a mode name such as `"linear"` or `"lan3"`.
    pub fn from_name(name: &str) -> Result<Self> {
        name.parse()
            .map_err(|_| Error::InvalidInterpolation(name.to_string()))
    }

    pub fn name(self) -> &'static str {
        self.into()
    }
}

/// Interpolation weights along one axis.
#[derive(Debug, Clone, Copy)]
struct Taps {
    /// Sample index of the first weight.
    first: isize,
    weights: [f64; MAX_TAPS],
    len: usize,
}

impl Taps {
    fn linear(t: f64) -> Self {
        let base = t.floor();
        let f = t - base;
        let mut weights = [0.0; MAX_TAPS];
        weights[0] = 1.0 - f;
        weights[1] = f;
        Self {
            first: base as isize,
            weights,
            len: 2,
        }
    }

    /// Cubic Lagrange polynomial through samples `base - 1 ..= base + 2`.
    fn poly3(t: f64) -> Self {
        let base = t.floor();
        let f = t - base;
        let mut weights = [0.0; MAX_TAPS];
        weights[0] = -f * (f - 1.0) * (f - 2.0) / 6.0;
        weights[1] = (f + 1.0) * (f - 1.0) * (f - 2.0) / 2.0;
        weights[2] = -(f + 1.0) * f * (f - 2.0) / 2.0;
        weights[3] = (f + 1.0) * f * (f - 1.0) / 6.0;
        Self {
            first: base as isize - 1,
            weights,
            len: 4,
        }
    }

    fn lanczos(t: f64, order: usize) -> Self {
        let base = t.floor() as isize;
        let first = base - order as isize + 1;
        let len = 2 * order;
        let mut weights = [0.0; MAX_TAPS];
        let mut sum = 0.0;
        for (k, w) in weights.iter_mut().take(len).enumerate() {
            *w = lanczos(t - (first + k as isize) as f64, order as f64);
            sum += *w;
        }
        if sum != 0.0 {
            weights.iter_mut().take(len).for_each(|w| *w /= sum);
        }
        Self {
            first,
            weights,
            len,
        }
    }

    fn for_mode(mode: Interpolation, t: f64) -> Self {
        match mode {
            // nearest is sampled directly
            Interpolation::Nearest | Interpolation::Linear => Self::linear(t),
            Interpolation::Poly3 => Self::poly3(t),
            Interpolation::Lan3 => Self::lanczos(t, 3),
            Interpolation::Lan5 => Self::lanczos(t, 5),
        }
    }

    fn iter(&self) -> impl Iterator<Item = (isize, f64)> + '_ {
        self.weights[..self.len]
            .iter()
            .enumerate()
            .map(|(k, &w)| (self.first + k as isize, w))
    }
}

#[inline]
fn clamp_index(i: isize, len: usize) -> usize {
    i.clamp(0, len as isize - 1) as usize
}

/// Whether `p` lies on `dims`, pixel edges included on the low side only.
#[inline]
fn in_bounds(p: DVec2, dims: Dimensions) -> bool {
    p.x >= -0.5
        && p.y >= -0.5
        && p.x < dims.width as f64 - 0.5
        && p.y < dims.height as f64 - 0.5
}

/// Interpolated value of `data` at `p`, `None` outside the image.
fn sample(data: &Buffer2<f32>, p: DVec2, mode: Interpolation) -> Option<f64> {
    let dims = data.dimensions();
    if !p.is_finite() || !in_bounds(p, dims) {
        return None;
    }

    if mode == Interpolation::Nearest {
        let ix = clamp_index((p.x + 0.5).floor() as isize, dims.width);
        let iy = clamp_index((p.y + 0.5).floor() as isize, dims.height);
        return Some(data[(ix, iy)] as f64);
    }

    let tx = Taps::for_mode(mode, p.x);
    let ty = Taps::for_mode(mode, p.y);
    let mut value = 0.0;
    for (j, wy) in ty.iter() {
        let row = data.row(clamp_index(j, dims.height));
        let mut acc = 0.0;
        for (i, wx) in tx.iter() {
            acc += wx * row[clamp_index(i, dims.width)] as f64;
        }
        value += wy * acc;
    }
    Some(value)
}

/// Resample `data` onto the input grid of `pixmap`.
///
/// Each result pixel is the interpolated value at its mapped position times
/// `exptime / pix_ratio²`. Positions that are unmapped or fall outside
/// `[-0.5, W - 0.5) x [-0.5, H - 0.5)` get `fill_value`.
pub fn blot_image(
    data: &Buffer2<f32>,
    pixmap: &PixelMap,
    options: &BlotOptions,
) -> Result<Buffer2<f32>> {
    if data.dimensions().is_empty() {
        return Err(Error::ShapeMismatch {
            what: "data",
            detail: format!("cannot interpolate an empty {} image", data.dimensions()),
        });
    }
    let out_dims = pixmap.dimensions();
    if out_dims.is_empty() {
        return Err(Error::ShapeMismatch {
            what: "pixmap",
            detail: format!("cannot blot onto an empty {out_dims} grid"),
        });
    }
    if !(options.pix_ratio.is_finite() && options.pix_ratio > 0.0) {
        return Err(Error::InvalidScale {
            name: "pix_ratio",
            value: options.pix_ratio,
            constraint: "positive",
        });
    }

    let scale = options.exptime / (options.pix_ratio * options.pix_ratio);
    let mode = options.interp;
    let fill = options.fill_value;

    let mut out = Buffer2::new_filled(out_dims.width, out_dims.height, fill);
    out.par_chunks_mut(out_dims.width)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, value) in row.iter_mut().enumerate() {
                if let Some(p) = pixmap.get(x, y)
                    && let Some(v) = sample(data, p, mode)
                {
                    *value = (v * scale) as f32;
                }
            }
        });

    tracing::debug!(
        interp = %mode,
        source = %data.dimensions(),
        target = %out_dims,
        scale,
        "Image blotted"
    );

    Ok(out)
}
