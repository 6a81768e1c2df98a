//! Weighted accumulation of input images onto a shared output grid.
//!
//! A [`Drizzle`] borrows an [`OutputState`] exclusively and merges one input
//! image per [`Drizzle::add_image`] call. Each contribution updates the output
//! pixel as a running weighted mean:
//!
//! ```text
//! wht_new = wht + dow
//! img     = d                                if wht == 0
//!         = (img * wht + d * dow) / wht_new  otherwise
//! ```
//!
//! where `d` is the (unit- and scale-corrected) input value and `dow` the kernel
//! fraction times the input weight. Output pixels that never received weight
//! report the configured fill value.
//!
//! The state satisfies, before and after every call:
//! - image, weight and context planes share one shape,
//! - a pixel has zero weight exactly when none of its context bits is set,
//! - the total exposure time is zero only while nothing has been accumulated.

use common::{Buffer2, Dimensions};

use crate::config::{AddImageOptions, DrizzleConfig, InputRegion, InputUnits};
use crate::context::ContextPlanes;
use crate::error::{DrizzleWarning, Error, Result};
use crate::kernel::{DropOutcome, Kernel};
use crate::pixmap::PixelMap;


/// Output arrays shared by every `add_image` call.
///
/// Arrays left as `None` are allocated zero-filled once the output shape is
/// known.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputState {
    /// Requested shape when no array is supplied.
    pub out_shape: Option<Dimensions>,
    pub out_img: Option<Buffer2<f32>>,
    pub out_wht: Option<Buffer2<f32>>,
    pub out_ctx: Option<ContextPlanes>,
    /// Sum of the exposure times of all accumulated images.
    pub total_exptime: f64,
}

impl OutputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shape(shape: Dimensions) -> Self {
        Self {
            out_shape: Some(shape),
            ..Self::default()
        }
    }

    pub fn with_img(mut self, img: Buffer2<f32>) -> Self {
        self.out_img = Some(img);
        self
    }

    pub fn with_wht(mut self, wht: Buffer2<f32>) -> Self {
        self.out_wht = Some(wht);
        self
    }

    pub fn with_ctx(mut self, ctx: ContextPlanes) -> Self {
        self.out_ctx = Some(ctx);
        self
    }

    pub fn with_total_exptime(mut self, total_exptime: f64) -> Self {
        self.total_exptime = total_exptime;
        self
    }

    /// Shape shared by the supplied arrays and the requested shape.
    fn known_shape(&self, use_ctx: bool) -> Result<Option<Dimensions>> {
        let ctx = self.out_ctx.as_ref().filter(|_| use_ctx);
        let candidates = [
            ("out_shape", self.out_shape),
            ("out_img", self.out_img.as_ref().map(Buffer2::dimensions)),
            ("out_wht", self.out_wht.as_ref().map(Buffer2::dimensions)),
            ("out_ctx", ctx.map(ContextPlanes::dimensions)),
        ];
        let supplied: Vec<(&str, Dimensions)> = candidates
            .iter()
            .filter_map(|(name, dims)| dims.map(|d| (*name, d)))
            .collect();

        let Some(&(_, first)) = supplied.first() else {
            return Ok(None);
        };
        if supplied.iter().any(|(_, d)| *d != first) {
            let listing = supplied
                .iter()
                .map(|(name, d)| format!("{name}={d}"))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(Error::InconsistentState {
                reason: format!("Inconsistent data shapes specified: {listing}"),
            });
        }
        Ok(Some(first))
    }
}

/// Counters of one `add_image` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddImageSummary {
    /// Context ID assigned to the image, `None` without context tracking.
    pub ctx_id: Option<u64>,
    /// Input pixels that contributed to at least one output pixel.
    pub mapped: usize,
    /// Input pixels without a mapping or whose drop fell off the output grid.
    pub missed: usize,
    /// Input pixels with zero weight.
    pub skipped: usize,
    pub warnings: Vec<DrizzleWarning>,
}

/// Accumulator bound to one output state.
#[derive(Debug)]
pub struct Drizzle<'a> {
    state: &'a mut OutputState,
    kernel: Kernel,
    pixfrac: f64,
    fill_value: f32,
    warnings_as_errors: bool,
    /// Next context ID, `None` when tracking is disabled.
    ctx_id: Option<u64>,
    max_ctx_id: u64,
}

impl<'a> Drizzle<'a> {
    /// Validate `state` against `config` and bind to it.
    ///
    /// Missing arrays are allocated once the output shape is known, either
    /// here or from the first pixel map.
    pub fn new(state: &'a mut OutputState, config: DrizzleConfig) -> Result<Self> {
        if !(config.pixfrac > 0.0 && config.pixfrac <= 1.0) {
            return Err(Error::InvalidPixfrac {
                pixfrac: config.pixfrac,
            });
        }

        let use_ctx = !config.disable_ctx;
        let (ctx_id, max_ctx_id) = if use_ctx {
            let (begin, max) = validate_ctx_range(config.begin_ctx_id, config.max_ctx_id)?;
            (Some(begin), max)
        } else {
            (None, u64::from(u32::MAX))
        };

        if !state.total_exptime.is_finite() || state.total_exptime < 0.0 {
            return Err(Error::InvalidExposureTime {
                exptime: state.total_exptime,
                reason: "Exposure time must be non-negative",
            });
        }

        let shape = state.known_shape(use_ctx)?;
        let ctx = state.out_ctx.as_ref().filter(|_| use_ctx);

        if let (Some(wht), Some(ctx)) = (&state.out_wht, ctx) {
            check_weight_context_agree(wht, ctx)?;
        }

        let has_arrays = state.out_img.is_some() || state.out_wht.is_some() || ctx.is_some();
        let has_data = state
            .out_wht
            .as_ref()
            .is_some_and(|w| w.iter().any(|&v| v != 0.0))
            || ctx.is_some_and(ContextPlanes::has_data);
        if has_data && state.total_exptime == 0.0 {
            return Err(Error::InconsistentExposureTime {
                total_exptime: state.total_exptime,
                reason: "exposure time is 0 but the output already holds data",
            });
        }
        if !has_arrays && state.total_exptime > 0.0 {
            return Err(Error::InconsistentExposureTime {
                total_exptime: state.total_exptime,
                reason: "Exposure time must be 0.0 for the first resampling",
            });
        }

        let fill_value = config.fill_value.as_f32();
        if let Some(shape) = shape {
            allocate(state, shape, use_ctx, fill_value);
        }

        tracing::info!(
            kernel = %config.kernel,
            pixfrac = config.pixfrac,
            fill_value = %config.fill_value,
            ctx_id = ?ctx_id,
            shape = ?shape,
            total_exptime = state.total_exptime,
            "Drizzle accumulator ready"
        );

        Ok(Self {
            state,
            kernel: config.kernel,
            pixfrac: config.pixfrac,
            fill_value,
            warnings_as_errors: config.warnings_as_errors,
            ctx_id,
            max_ctx_id,
        })
    }

    pub fn kernel(&self) -> Kernel {
        self.kernel
    }

    pub fn pixfrac(&self) -> f64 {
        self.pixfrac
    }

    pub fn fill_value(&self) -> f32 {
        self.fill_value
    }

    /// Context ID the next image will receive.
    pub fn ctx_id(&self) -> Option<u64> {
        self.ctx_id
    }

    pub fn total_exptime(&self) -> f64 {
        self.state.total_exptime
    }

    pub fn out_shape(&self) -> Option<Dimensions> {
        self.state.out_img.as_ref().map(Buffer2::dimensions)
    }

    pub fn out_img(&self) -> Option<&Buffer2<f32>> {
        self.state.out_img.as_ref()
    }

    pub fn out_wht(&self) -> Option<&Buffer2<f32>> {
        self.state.out_wht.as_ref()
    }

    /// Context planes, `None` when tracking is disabled.
    pub fn out_ctx(&self) -> Option<&ContextPlanes> {
        self.ctx_id.and(self.state.out_ctx.as_ref())
    }

    /// Contributing context IDs of each pixel in `pixels`.
    pub fn decode_context(&self, pixels: &[(usize, usize)]) -> Option<Vec<Vec<u32>>> {
        self.out_ctx().map(|ctx| ctx.decode(pixels))
    }

    /// Resample one input image onto the output.
    ///
    /// `pixmap` gives the output position of every `data` pixel centre and
    /// must have the same shape as `data`, as must `weight_map`. Nothing is
    /// modified when an error is returned.
    pub fn add_image(
        &mut self,
        data: &Buffer2<f32>,
        weight_map: Option<&Buffer2<f32>>,
        pixmap: &PixelMap,
        exptime: f64,
        options: &AddImageOptions,
    ) -> Result<AddImageSummary> {
        let in_dims = data.dimensions();
        if pixmap.dimensions() != in_dims {
            return Err(Error::shape_mismatch("pixmap", in_dims, pixmap.dimensions()));
        }
        if let Some(w) = weight_map
            && w.dimensions() != in_dims
        {
            return Err(Error::shape_mismatch("weight_map", in_dims, w.dimensions()));
        }
        if !(exptime.is_finite() && exptime > 0.0) {
            return Err(Error::InvalidExposureTime {
                exptime,
                reason: "'exptime' *must* be a strictly positive number",
            });
        }
        if !(options.scale.is_finite() && options.scale > 0.0) {
            return Err(Error::InvalidScale {
                name: "scale",
                value: options.scale,
                constraint: "positive",
            });
        }
        if !(options.weight_scale.is_finite() && options.weight_scale >= 0.0) {
            return Err(Error::InvalidScale {
                name: "weight_scale",
                value: options.weight_scale,
                constraint: "non-negative",
            });
        }
        let region = match options.region {
            Some(region) if !region.fits_in(in_dims) => {
                return Err(Error::InvalidRegion {
                    region,
                    dims: in_dims,
                });
            }
            Some(region) => Some(region),
            None => InputRegion::full(in_dims),
        };

        let ctx_id = match self.ctx_id {
            Some(id) if id > self.max_ctx_id => {
                return Err(Error::ContextExhausted {
                    ctx_id: id,
                    max_ctx_id: self.max_ctx_id,
                });
            }
            // the range check keeps ids within u32
            Some(id) => Some(id as u32),
            None => None,
        };

        let mut warnings = Vec::new();
        if !self.kernel.is_flux_conserving() {
            if self.warnings_as_errors {
                return Err(Error::NonConservingKernel {
                    kernel: self.kernel,
                });
            }
            let warning = DrizzleWarning::NonConservingKernel {
                kernel: self.kernel,
            };
            tracing::warn!(kernel = %self.kernel, "{warning}");
            warnings.push(warning);
        }

        let out_dims = match self.out_shape() {
            Some(dims) => dims,
            None => pixmap.output_extent()?,
        };

        // validation done, mutation starts
        allocate(self.state, out_dims, ctx_id.is_some(), self.fill_value);
        // the plane for this id exists even if no pixel lands
        if let (Some(id), Some(planes)) = (ctx_id, self.state.out_ctx.as_mut()) {
            planes.ensure_id(id);
        }

        let unit_scale = match options.in_units {
            InputUnits::Cps => 1.0,
            InputUnits::Counts => 1.0 / exptime,
        };
        let value_scale = unit_scale * options.scale * options.scale;

        let mut summary = AddImageSummary {
            ctx_id: ctx_id.map(u64::from),
            warnings,
            ..AddImageSummary::default()
        };

        if let Some(region) = region {
            let bounds = pixmap.mapped_bounds(region);
            let visited = bounds.map_or(0, |b| b.pixel_count());
            summary.missed += region.pixel_count() - visited;
            if let Some(bounds) = bounds {
                self.resample_region(
                    data,
                    weight_map,
                    pixmap,
                    bounds,
                    value_scale,
                    options.weight_scale,
                    ctx_id,
                    &mut summary,
                );
            }
        }

        let state = &mut *self.state;
        if let (Some(img), Some(wht)) = (state.out_img.as_mut(), state.out_wht.as_ref()) {
            apply_fill(img, wht, self.fill_value);
        }
        state.total_exptime += exptime;
        if let Some(id) = self.ctx_id.as_mut() {
            *id += 1;
        }

        tracing::debug!(
            ctx_id = ?summary.ctx_id,
            mapped = summary.mapped,
            missed = summary.missed,
            skipped = summary.skipped,
            exptime,
            total_exptime = state.total_exptime,
            "Image resampled"
        );

        Ok(summary)
    }

    #[allow(clippy::too_many_arguments)]
    fn resample_region(
        &mut self,
        data: &Buffer2<f32>,
        weight_map: Option<&Buffer2<f32>>,
        pixmap: &PixelMap,
        bounds: InputRegion,
        value_scale: f64,
        weight_scale: f64,
        ctx_id: Option<u32>,
        summary: &mut AddImageSummary,
    ) {
        let kernel = self.kernel;
        let pixfrac = self.pixfrac;
        let state = &mut *self.state;
        let (Some(img), Some(wht)) = (state.out_img.as_mut(), state.out_wht.as_mut()) else {
            return;
        };
        let out_dims = img.dimensions();
        let mut ctx = match ctx_id {
            Some(id) => state.out_ctx.as_mut().map(|c| (id, c)),
            None => None,
        };

        for y in bounds.ymin..=bounds.ymax {
            for x in bounds.xmin..=bounds.xmax {
                let weight = weight_map.map_or(1.0, |w| w[(x, y)] as f64) * weight_scale;
                if weight == 0.0 {
                    summary.skipped += 1;
                    continue;
                }
                let d = data[(x, y)] as f64 * value_scale;

                let outcome = kernel.apply_drop(pixmap, pixfrac, out_dims, x, y, |ox, oy, f| {
                    let dow = f * weight;
                    let merged = merge(&mut img[(ox, oy)], &mut wht[(ox, oy)], d, dow);
                    let Some((id, planes)) = ctx.as_mut() else {
                        return;
                    };
                    match merged {
                        Merged::Ignored => {}
                        Merged::Weighted => planes.set(*id, ox, oy),
                        Merged::Cancelled => planes.clear(ox, oy),
                    }
                });
                match outcome {
                    DropOutcome::Landed => summary.mapped += 1,
                    DropOutcome::OffGrid | DropOutcome::Unmapped => summary.missed += 1,
                }
            }
        }
    }
}

/// Effect of one contribution on an output pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Merged {
    /// Too small to register in single precision.
    Ignored,
    Weighted,
    /// Signed contributions summed the weight to zero; the pixel is empty again.
    Cancelled,
}

/// Merge one contribution into an output pixel.
#[inline]
fn merge(img: &mut f32, wht: &mut f32, d: f64, dow: f64) -> Merged {
    // contributions that vanish in single precision would leave weight and context out of step
    if dow as f32 == 0.0 {
        return Merged::Ignored;
    }
    let vc = *wht as f64;
    let new_wht = vc + dow;
    if new_wht as f32 == 0.0 {
        *wht = 0.0;
        return Merged::Cancelled;
    }
    *img = if vc == 0.0 {
        d as f32
    } else {
        ((*img as f64 * vc + d * dow) / new_wht) as f32
    };
    *wht = new_wht as f32;
    Merged::Weighted
}

fn apply_fill(img: &mut Buffer2<f32>, wht: &Buffer2<f32>, fill_value: f32) {
    for (v, &w) in img.iter_mut().zip(wht.iter()) {
        if w == 0.0 {
            *v = fill_value;
        }
    }
}

fn allocate(state: &mut OutputState, shape: Dimensions, use_ctx: bool, fill_value: f32) {
    state.out_shape.get_or_insert(shape);
    state
        .out_img
        .get_or_insert_with(|| Buffer2::new_filled(shape.width, shape.height, fill_value));
    state
        .out_wht
        .get_or_insert_with(|| Buffer2::new_default(shape.width, shape.height));
    if use_ctx {
        state
            .out_ctx
            .get_or_insert_with(|| ContextPlanes::empty(shape));
    }
}

/// Checked `(begin, max)` context IDs.
fn validate_ctx_range(begin: i64, max: Option<i64>) -> Result<(u64, u64)> {
    let err = |reason| Error::InvalidContextRange { begin, max, reason };
    let begin_id = u32::try_from(begin).map_err(|_| err("Invalid context image ID"))?;
    let max_id = match max {
        Some(m) if m < begin => {
            return Err(err("'max_ctx_id' cannot be smaller than 'begin_ctx_id'"));
        }
        Some(m) => m.min(i64::from(u32::MAX)) as u64,
        None => u64::from(u32::MAX),
    };
    Ok((u64::from(begin_id), max_id))
}

fn check_weight_context_agree(wht: &Buffer2<f32>, ctx: &ContextPlanes) -> Result<()> {
    let dims = wht.dimensions();
    for y in 0..dims.height {
        for x in 0..dims.width {
            let weighted = wht[(x, y)] != 0.0;
            if weighted != ctx.any_at(x, y) {
                return Err(Error::InconsistentState {
                    reason: format!(
                        "Inconsistent values of supplied 'out_wht' and 'out_ctx' at pixel ({x}, {y})"
                    ),
                });
            }
        }
    }
    Ok(())
}
