use strum::IntoEnumIterator;

use super::*;

fn collect(
    kernel: Kernel,
    pixmap: &PixelMap,
    pixfrac: f64,
    out: Dimensions,
    x: usize,
    y: usize,
) -> (DropOutcome, Vec<(usize, usize, f64)>) {
    let mut hits = Vec::new();
    let outcome = kernel.apply_drop(pixmap, pixfrac, out, x, y, |ox, oy, f| {
        hits.push((ox, oy, f))
    });
    (outcome, hits)
}

fn total(hits: &[(usize, usize, f64)]) -> f64 {
    hits.iter().map(|h| h.2).sum()
}

fn shifted(width: usize, height: usize, dx: f64, dy: f64) -> PixelMap {
    PixelMap::from_fn(width, height, |x, y| {
        DVec2::new(x as f64 + dx, y as f64 + dy)
    })
}

#[test]
fn test_kernel_names() {
    let names: Vec<&str> = Kernel::iter().map(Kernel::name).collect();
    assert_eq!(
        names,
        ["square", "turbo", "point", "gaussian", "lanczos2", "lanczos3"]
    );
    for kernel in Kernel::iter() {
        assert_eq!(Kernel::from_name(kernel.name()).unwrap(), kernel);
    }
}

#[test]
fn test_unknown_kernel_is_rejected() {
    let err = Kernel::from_name("magic_image_improver").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Kernel 'magic_image_improver' is not supported"
    );
}

#[test]
fn test_flux_conserving_flags() {
    let conserving: Vec<Kernel> = Kernel::iter().filter(|k| k.is_flux_conserving()).collect();
    assert_eq!(conserving, [Kernel::Square, Kernel::Turbo, Kernel::Point]);
}

#[test]
fn test_sgarea_unit_square_edges() {
    // bottom edge along the x-axis contributes nothing
    assert_eq!(sgarea(0.0, 0.0, 1.0, 0.0), 0.0);
    // a segment above the square covers its full width
    assert!((sgarea(1.0, 2.0, 0.0, 2.0) + 1.0).abs() < 1e-15);
    // vertical segments contribute nothing
    assert_eq!(sgarea(0.5, 0.0, 0.5, 1.0), 0.0);
    // diagonal through the square: triangle of area 0.5
    assert!((sgarea(0.0, 0.0, 1.0, 1.0) - 0.5).abs() < 1e-15);
}

#[test]
fn test_boxer_aligned_pixel() {
    // quadrilateral exactly covering output pixel (3, 4)
    let x = [2.5, 3.5, 3.5, 2.5];
    let y = [3.5, 3.5, 4.5, 4.5];
    assert!((boxer(3.0, 4.0, &x, &y) - 1.0).abs() < 1e-15);
    assert_eq!(boxer(4.0, 4.0, &x, &y), 0.0);
    assert_eq!(boxer(3.0, 5.0, &x, &y), 0.0);
}

#[test]
fn test_boxer_half_shifted() {
    let x = [3.0, 4.0, 4.0, 3.0];
    let y = [3.75, 3.75, 4.75, 4.75];
    assert!((boxer(3.0, 4.0, &x, &y) - 0.5 * 0.75).abs() < 1e-12);
    assert!((boxer(4.0, 4.0, &x, &y) - 0.5 * 0.75).abs() < 1e-12);
    assert!((boxer(3.0, 5.0, &x, &y) - 0.5 * 0.25).abs() < 1e-12);
    assert!((boxer(4.0, 5.0, &x, &y) - 0.5 * 0.25).abs() < 1e-12);
}

#[test]
fn test_boxer_rotated_diamond() {
    // diamond of area 0.5 centred on pixel (0, 0), entirely inside it
    let x = [0.0, 0.5, 0.0, -0.5];
    let y = [-0.5, 0.0, 0.5, 0.0];
    assert!((boxer(0.0, 0.0, &x, &y) - 0.5).abs() < 1e-12);
    assert_eq!(boxer(1.0, 0.0, &x, &y), 0.0);
}

#[test]
fn test_square_identity_lands_on_one_pixel() {
    let map = PixelMap::identity(8, 8);
    let (outcome, hits) = collect(Kernel::Square, &map, 1.0, Dimensions::new(8, 8), 3, 5);
    assert_eq!(outcome, DropOutcome::Landed);
    assert_eq!(hits.len(), 1);
    assert_eq!((hits[0].0, hits[0].1), (3, 5));
    assert!((hits[0].2 - 1.0).abs() < 1e-12);
}

#[test]
fn test_square_shifted_splits_over_four_pixels() {
    let map = shifted(8, 8, 0.5, 0.25);
    let (_, hits) = collect(Kernel::Square, &map, 1.0, Dimensions::new(10, 10), 3, 3);
    assert_eq!(hits.len(), 4);
    assert!((total(&hits) - 1.0).abs() < 1e-12);
    let at = |ox, oy| {
        hits.iter()
            .find(|h| h.0 == ox && h.1 == oy)
            .map(|h| h.2)
            .unwrap()
    };
    assert!((at(3, 3) - 0.375).abs() < 1e-12);
    assert!((at(4, 4) - 0.125).abs() < 1e-12);
}

#[test]
fn test_square_pixfrac_shrinks_drop() {
    let map = PixelMap::identity(8, 8);
    let (_, hits) = collect(Kernel::Square, &map, 0.5, Dimensions::new(8, 8), 4, 4);
    assert_eq!(hits.len(), 1);
    assert!((hits[0].2 - 1.0).abs() < 1e-12);
}

#[test]
fn test_square_with_magnification_conserves_fraction() {
    let map = PixelMap::from_fn(10, 10, |x, y| {
        DVec2::new(2.0 * x as f64 + 1.3, 2.0 * y as f64 + 0.6)
    });
    let (_, hits) = collect(Kernel::Square, &map, 0.8, Dimensions::new(30, 30), 4, 6);
    assert!(hits.len() >= 4);
    assert!((total(&hits) - 1.0).abs() < 1e-12);
}

#[test]
fn test_square_with_rotation_conserves_fraction() {
    let (s, c) = 0.4f64.sin_cos();
    let map = PixelMap::from_fn(12, 12, |x, y| {
        let (x, y) = (x as f64, y as f64);
        DVec2::new(c * x - s * y + 8.0, s * x + c * y + 2.0)
    });
    let (_, hits) = collect(Kernel::Square, &map, 1.0, Dimensions::new(30, 30), 5, 7);
    assert!((total(&hits) - 1.0).abs() < 1e-12);
}

#[test]
fn test_turbo_shifted_fractions() {
    let map = shifted(8, 8, 0.5, 0.25);
    let (_, hits) = collect(Kernel::Turbo, &map, 1.0, Dimensions::new(10, 10), 3, 3);
    assert_eq!(hits.len(), 4);
    assert!((total(&hits) - 1.0).abs() < 1e-12);
}

#[test]
fn test_turbo_drop_scales_with_jacobian() {
    let map = PixelMap::from_fn(10, 10, |x, y| DVec2::new(3.0 * x as f64, 3.0 * y as f64));
    let (_, hits) = collect(Kernel::Turbo, &map, 1.0, Dimensions::new(30, 30), 4, 4);
    // side 3 centred on (12, 12) covers pixels 11..=13 exactly
    assert_eq!(hits.len(), 9);
    for (_, _, f) in &hits {
        assert!((f - 1.0 / 9.0).abs() < 1e-12);
    }
}

#[test]
fn test_point_rounds_to_nearest() {
    let map = shifted(8, 8, 0.4, 0.6);
    let (outcome, hits) = collect(Kernel::Point, &map, 1.0, Dimensions::new(10, 10), 2, 2);
    assert_eq!(outcome, DropOutcome::Landed);
    assert_eq!(hits, vec![(2, 3, 1.0)]);
}

#[test]
fn test_point_ties_round_away_from_zero() {
    let map = PixelMap::from_fn(3, 1, |x, _| match x {
        0 => DVec2::new(-0.5, 0.0),
        1 => DVec2::new(1.5, 0.0),
        _ => DVec2::new(2.5, -0.5),
    });
    let out = Dimensions::new(4, 2);

    let (outcome, hits) = collect(Kernel::Point, &map, 1.0, out, 0, 0);
    assert_eq!(outcome, DropOutcome::OffGrid);
    assert!(hits.is_empty());

    let (_, hits) = collect(Kernel::Point, &map, 1.0, out, 1, 0);
    assert_eq!(hits, vec![(2, 0, 1.0)]);

    let (outcome, _) = collect(Kernel::Point, &map, 1.0, out, 2, 0);
    assert_eq!(outcome, DropOutcome::OffGrid);
}

#[test]
fn test_drop_off_grid() {
    let map = shifted(4, 4, 100.0, 100.0);
    for kernel in Kernel::iter() {
        let (outcome, hits) = collect(kernel, &map, 1.0, Dimensions::new(10, 10), 1, 1);
        assert_eq!(outcome, DropOutcome::OffGrid, "{kernel}");
        assert!(hits.is_empty());
    }
}

#[test]
fn test_unmapped_pixel() {
    let map = PixelMap::from_fn(4, 4, |x, y| {
        if x == 2 && y == 2 {
            DVec2::NAN
        } else {
            DVec2::new(x as f64, y as f64)
        }
    });
    for kernel in Kernel::iter() {
        let (outcome, hits) = collect(kernel, &map, 1.0, Dimensions::new(4, 4), 2, 2);
        assert_eq!(outcome, DropOutcome::Unmapped, "{kernel}");
        assert!(hits.is_empty());
    }
}

#[test]
fn test_edge_drop_is_clipped() {
    let map = shifted(4, 4, -0.5, 0.0);
    let (outcome, hits) = collect(Kernel::Square, &map, 1.0, Dimensions::new(4, 4), 0, 1);
    assert_eq!(outcome, DropOutcome::Landed);
    assert_eq!(hits.len(), 1);
    assert!((hits[0].2 - 0.5).abs() < 1e-12);
}

#[test]
fn test_gaussian_profile() {
    let map = PixelMap::identity(16, 16);
    let (_, hits) = collect(Kernel::Gaussian, &map, 1.0, Dimensions::new(16, 16), 8, 8);
    let sigma = 1.0 / FWHM_PER_SIGMA;
    let peak = hits.iter().find(|h| h.0 == 8 && h.1 == 8).unwrap().2;
    assert!((peak - 1.0 / (2.0 * PI * sigma * sigma)).abs() < 1e-12);
    // radius 2.5 sigma ~ 1.06 px: centre plus the four direct neighbours
    assert_eq!(hits.len(), 5);
    let side = hits.iter().find(|h| h.0 == 9 && h.1 == 8).unwrap().2;
    assert!(side < peak && side > 0.0);
}

#[test]
fn test_lanczos_profile() {
    let significant = |hits: Vec<(usize, usize, f64)>| -> Vec<(usize, usize, f64)> {
        hits.into_iter().filter(|h| h.2.abs() > 1e-12).collect()
    };

    let map = PixelMap::identity(16, 16);
    let (_, hits) = collect(Kernel::Lanczos3, &map, 1.0, Dimensions::new(16, 16), 8, 8);
    // integer offsets sit on zeros of the window except the centre
    assert_eq!(significant(hits), vec![(8, 8, 1.0)]);

    let map = shifted(16, 16, 0.5, 0.0);
    let (_, hits) = collect(Kernel::Lanczos2, &map, 1.0, Dimensions::new(16, 16), 8, 8);
    let hits = significant(hits);
    assert!(hits.iter().all(|h| h.1 == 8));
    assert_eq!(hits.len(), 4);
    assert!(hits.iter().any(|h| h.2 < 0.0));
}

#[test]
fn test_lanczos_window() {
    assert_eq!(lanczos(0.0, 3.0), 1.0);
    assert_eq!(lanczos(3.0, 3.0), 0.0);
    assert!(lanczos(1.0, 3.0).abs() < 1e-12);
    assert!((lanczos(0.5, 2.0) - lanczos(-0.5, 2.0)).abs() < 1e-15);
}
