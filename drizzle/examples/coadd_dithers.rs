//! Co-add four dithered exposures of a synthetic star field onto a grid with
//! half-size pixels, then blot the result back onto the first exposure.
//!
//! Run with `cargo run -p drizzle --example coadd_dithers`.
//! Set `RUST_LOG=drizzle=debug` for per-image details.

use anyhow::{Context, Result};
use common::log_setup::{LogConfig, setup_logging};
use glam::DVec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use drizzle::{
    AddImageOptions, BlotOptions, Buffer2, Drizzle, DrizzleConfig, InputRegion, Kernel,
    OutputState, PixelMap, blot_image,
};

const SIZE: usize = 64;
/// Output pixels per input pixel along each axis.
const OVERSAMPLE: f64 = 2.0;
const DITHERS: [(f64, f64); 4] = [(0.0, 0.0), (0.5, 0.0), (0.0, 0.5), (0.5, 0.5)];
const STARS: [(f64, f64, f32); 3] = [(20.3, 17.8, 900.0), (41.6, 30.2, 400.0), (12.9, 50.4, 650.0)];

/// One exposure of the sky, offset by `(dx, dy)` input pixels.
fn exposure(dx: f64, dy: f64, rng: &mut StdRng) -> Buffer2<f32> {
    let sigma = 0.9;
    Buffer2::from_fn(SIZE, SIZE, |x, y| {
        let sky: f32 = 10.0 + rng.random_range(-1.0..1.0);
        let stars: f32 = STARS
            .iter()
            .map(|&(sx, sy, flux)| {
                let rx = x as f64 + dx - sx;
                let ry = y as f64 + dy - sy;
                let r2 = (rx * rx + ry * ry) / (2.0 * sigma * sigma);
                flux * (-r2).exp() as f32
            })
            .sum();
        sky + stars
    })
}

fn dither_map(dx: f64, dy: f64) -> PixelMap {
    PixelMap::from_fn(SIZE, SIZE, |x, y| {
        DVec2::new(
            (x as f64 + dx) * OVERSAMPLE + 1.0,
            (y as f64 + dy) * OVERSAMPLE + 1.0,
        )
    })
}

fn main() -> Result<()> {
    setup_logging(&LogConfig::default()).context("failed to set up logging")?;

    let mut rng = StdRng::seed_from_u64(7);
    let weights = Buffer2::new_filled(SIZE, SIZE, 1.0f32);
    // output pixels are a quarter of the input area
    let options = AddImageOptions::default().with_scale(1.0 / OVERSAMPLE);

    let mut state = OutputState::new();
    let config = DrizzleConfig::default()
        .with_kernel(Kernel::Square)
        .with_pixfrac(0.7)
        .with_fill_value(0.0f32);
    let mut driz = Drizzle::new(&mut state, config)?;

    let mut first_map = None;
    for &(dx, dy) in &DITHERS {
        let data = exposure(dx, dy, &mut rng);
        let pixmap = dither_map(dx, dy);
        let summary = driz.add_image(&data, Some(&weights), &pixmap, 100.0, &options)?;
        tracing::info!(
            dx,
            dy,
            ctx_id = ?summary.ctx_id,
            mapped = summary.mapped,
            missed = summary.missed,
            "Exposure added"
        );
        first_map.get_or_insert(pixmap);
    }
    let first_map = first_map.context("no exposures")?;

    let out_img = driz.out_img().context("output was never allocated")?.clone();
    let out_wht = driz.out_wht().context("output was never allocated")?;
    let covered = out_wht.iter().filter(|&&w| w > 0.0).count();
    tracing::info!(
        shape = %out_img.dimensions(),
        covered,
        total_exptime = driz.total_exptime(),
        "Co-add finished"
    );

    let (sx, sy, _) = STARS[0];
    let star_out = DVec2::new(sx * OVERSAMPLE + 1.0, sy * OVERSAMPLE + 1.0);
    let full = InputRegion::full(first_map.dimensions()).context("empty pixel map")?;
    match first_map.invert(star_out, full) {
        Some(p) => tracing::info!(x = p.x, y = p.y, "Brightest star in the first exposure"),
        None => tracing::warn!("Could not invert the first pixel map"),
    }

    let blot = blot_image(
        &out_img,
        &first_map,
        &BlotOptions::default().with_pix_ratio(1.0 / OVERSAMPLE),
    )?;
    let reference = exposure(0.0, 0.0, &mut StdRng::seed_from_u64(99));
    let residual = blot
        .iter()
        .zip(reference.iter())
        .map(|(a, b)| (a - b).abs() as f64)
        .sum::<f64>()
        / blot.len() as f64;
    tracing::info!(residual, "Mean absolute blot residual against a fresh exposure");

    Ok(())
}
