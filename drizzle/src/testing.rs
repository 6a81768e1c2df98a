//! Synthetic images and pixel maps shared by the unit tests.

use common::Buffer2;
use glam::DVec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::pixmap::PixelMap;

/// Gaussian star normalised to unit total flux.
pub fn gaussian_star(width: usize, height: usize, x0: f64, y0: f64, fwhm: f64) -> Buffer2<f32> {
    let sigma = fwhm / 2.3548;
    let inv_2s2 = 0.5 / (sigma * sigma);
    let raw = Buffer2::from_fn(width, height, |x, y| {
        let dx = x as f64 - x0;
        let dy = y as f64 - y0;
        (-(dx * dx + dy * dy) * inv_2s2).exp()
    });
    let total: f64 = raw.iter().sum();
    raw.map(|v| (v / total) as f32)
}

/// Uniform noise in `[lo, hi)`, reproducible from `seed`.
pub fn noise_image(width: usize, height: usize, lo: f32, hi: f32, seed: u64) -> Buffer2<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    Buffer2::from_fn(width, height, |_, _| rng.random_range(lo..hi))
}

pub fn constant_image(width: usize, height: usize, value: f32) -> Buffer2<f32> {
    Buffer2::new_filled(width, height, value)
}

pub fn shifted_pixmap(width: usize, height: usize, dx: f64, dy: f64) -> PixelMap {
    PixelMap::from_fn(width, height, |x, y| {
        DVec2::new(x as f64 + dx, y as f64 + dy)
    })
}

/// Shift plus a mild quadratic distortion, away from negative output coordinates.
pub fn distorted_pixmap(width: usize, height: usize) -> PixelMap {
    PixelMap::from_fn(width, height, |x, y| {
        let (x, y) = (x as f64, y as f64);
        DVec2::new(
            x + 0.5 + 1e-4 * x * x + 1e-5 * x * y,
            y + 0.2 + 1e-3 * y * y - 2e-5 * x * y,
        )
    })
}

/// `sum(img * wht)` over the output, which equals the accumulated flux.
pub fn weighted_flux(img: &Buffer2<f32>, wht: &Buffer2<f32>) -> f64 {
    img.iter()
        .zip(wht.iter())
        .filter(|(_, w)| **w != 0.0)
        .map(|(&v, &w)| v as f64 * w as f64)
        .sum()
}
