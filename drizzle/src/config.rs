//! Accumulator, per-image and blot options.

use std::fmt;
use std::str::FromStr;

use common::Dimensions;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::blot::Interpolation;
use crate::error::{Error, Result};
use crate::kernel::Kernel;

/// Value reported by output pixels that never received weight.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FillValue {
    /// Report NaN.
    #[default]
    Indef,
    Value(f32),
}

impl FillValue {
    #[inline]
    pub fn as_f32(self) -> f32 {
        match self {
            FillValue::Indef => f32::NAN,
            FillValue::Value(v) => v,
        }
    }
}

impl FromStr for FillValue {
    type Err = Error;

    /// `"indef"` (any case) and the empty string mean NaN, anything else must parse as a float.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("indef") {
            return Ok(FillValue::Indef);
        }
        trimmed
            .parse::<f32>()
            .map(FillValue::Value)
            .map_err(|_| Error::FillValueParse {
                value: s.to_string(),
            })
    }
}

impl fmt::Display for FillValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FillValue::Indef => f.write_str("INDEF"),
            FillValue::Value(v) => write!(f, "{v}"),
        }
    }
}

impl TryFrom<String> for FillValue {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<FillValue> for String {
    fn from(value: FillValue) -> Self {
        value.to_string()
    }
}

impl From<f32> for FillValue {
    fn from(value: f32) -> Self {
        FillValue::Value(value)
    }
}

/// Units of the input samples.
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
pub enum InputUnits {
    /// Counts per second, used as is.
    #[default]
    Cps,
    /// Total counts, divided by the exposure time before resampling.
    Counts,
}

impl InputUnits {
    pub fn from_name(name: &str) -> Result<Self> {
        name.parse()
            .map_err(|_| Error::InvalidUnits(name.to_string()))
    }
}

/// Inclusive pixel range of an input image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRegion {
    pub xmin: usize,
    pub xmax: usize,
    pub ymin: usize,
    pub ymax: usize,
}

impl InputRegion {
    pub fn new(xmin: usize, xmax: usize, ymin: usize, ymax: usize) -> Self {
        Self {
            xmin,
            xmax,
            ymin,
            ymax,
        }
    }

    /// The whole of a `dims` image. `None` for an empty image.
    pub fn full(dims: Dimensions) -> Option<Self> {
        if dims.is_empty() {
            return None;
        }
        Some(Self::new(0, dims.width - 1, 0, dims.height - 1))
    }

    pub fn width(&self) -> usize {
        self.xmax - self.xmin + 1
    }

    pub fn height(&self) -> usize {
        self.ymax - self.ymin + 1
    }

    pub fn pixel_count(&self) -> usize {
        self.width() * self.height()
    }

    pub fn fits_in(&self, dims: Dimensions) -> bool {
        self.xmin <= self.xmax
            && self.ymin <= self.ymax
            && self.xmax < dims.width
            && self.ymax < dims.height
    }
}

impl fmt::Display for InputRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}..={}, {}..={}]",
            self.xmin, self.xmax, self.ymin, self.ymax
        )
    }
}

/// Accumulator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrizzleConfig {
    pub kernel: Kernel,
    /// Drop size as a fraction of the input pixel, in `(0, 1]`.
    pub pixfrac: f64,
    pub fill_value: FillValue,
    /// First context ID handed out. Signed so that negative requests can be rejected.
    pub begin_ctx_id: i64,
    /// Largest context ID that may be used. Unbounded when `None`.
    pub max_ctx_id: Option<i64>,
    /// Skip provenance tracking entirely.
    pub disable_ctx: bool,
    /// Turn `DrizzleWarning`s into errors.
    pub warnings_as_errors: bool,
}

impl Default for DrizzleConfig {
    fn default() -> Self {
        Self {
            kernel: Kernel::Square,
            pixfrac: 1.0,
            fill_value: FillValue::Indef,
            begin_ctx_id: 0,
            max_ctx_id: None,
            disable_ctx: false,
            warnings_as_errors: false,
        }
    }
}

impl DrizzleConfig {
    pub fn with_kernel(mut self, kernel: Kernel) -> Self {
        self.kernel = kernel;
        self
    }

    /// Set pixel fraction. Range is checked when the accumulator is created.
    pub fn with_pixfrac(mut self, pixfrac: f64) -> Self {
        self.pixfrac = pixfrac;
        self
    }

    pub fn with_fill_value(mut self, fill_value: impl Into<FillValue>) -> Self {
        self.fill_value = fill_value.into();
        self
    }

    pub fn with_begin_ctx_id(mut self, begin_ctx_id: i64) -> Self {
        self.begin_ctx_id = begin_ctx_id;
        self
    }

    pub fn with_max_ctx_id(mut self, max_ctx_id: i64) -> Self {
        self.max_ctx_id = Some(max_ctx_id);
        self
    }

    pub fn with_disable_ctx(mut self, disable_ctx: bool) -> Self {
        self.disable_ctx = disable_ctx;
        self
    }

    pub fn with_warnings_as_errors(mut self, warnings_as_errors: bool) -> Self {
        self.warnings_as_errors = warnings_as_errors;
        self
    }
}

/// Per-image options of `Drizzle::add_image`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddImageOptions {
    /// Input to output pixel scale ratio. Samples are multiplied by `scale²`.
    pub scale: f64,
    pub in_units: InputUnits,
    /// Multiplier applied to the weight map.
    pub weight_scale: f64,
    /// Restrict resampling to part of the input. Whole image when `None`.
    pub region: Option<InputRegion>,
}

impl Default for AddImageOptions {
    fn default() -> Self {
        Self {
            scale: 1.0,
            in_units: InputUnits::Cps,
            weight_scale: 1.0,
            region: None,
        }
    }
}

impl AddImageOptions {
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_in_units(mut self, in_units: InputUnits) -> Self {
        self.in_units = in_units;
        self
    }

    pub fn with_weight_scale(mut self, weight_scale: f64) -> Self {
        self.weight_scale = weight_scale;
        self
    }

    pub fn with_region(mut self, region: InputRegion) -> Self {
        self.region = Some(region);
        self
    }
}

/// Options of `blot_image`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlotOptions {
    /// Ratio of output to input pixel size. Values are divided by `pix_ratio²`.
    pub pix_ratio: f64,
    /// Values are multiplied by the exposure time.
    pub exptime: f64,
    pub interp: Interpolation,
    /// Value of pixels that map outside the source image.
    pub fill_value: f32,
}

impl Default for BlotOptions {
    fn default() -> Self {
        Self {
            pix_ratio: 1.0,
            exptime: 1.0,
            interp: Interpolation::Linear,
            fill_value: 0.0,
        }
    }
}

impl BlotOptions {
    pub fn with_pix_ratio(mut self, pix_ratio: f64) -> Self {
        self.pix_ratio = pix_ratio;
        self
    }

    pub fn with_exptime(mut self, exptime: f64) -> Self {
        self.exptime = exptime;
        self
    }

    pub fn with_interp(mut self, interp: Interpolation) -> Self {
        self.interp = interp;
        self
    }

    pub fn with_fill_value(mut self, fill_value: f32) -> Self {
        self.fill_value = fill_value;
        self
    }
}
