//! Drizzle - flux-conserving resampling of dithered images.
//!
//! Input images are mapped pixel by pixel onto a common output grid through a
//! [`PixelMap`]. Each input pixel is shrunk by `pixfrac`, dropped onto the
//! output and its flux shared between the output pixels it overlaps. The
//! accumulator keeps a running weighted mean, the summed weight and one
//! provenance bit per image and pixel, so images can be added one at a time.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use drizzle::{AddImageOptions, Drizzle, DrizzleConfig, Kernel, OutputState, PixelMap};
//!
//! let mut state = OutputState::new();
//! let mut driz = Drizzle::new(&mut state, DrizzleConfig::default().with_kernel(Kernel::Square))?;
//! for (data, weights, pixmap, exptime) in exposures {
//!     driz.add_image(&data, Some(&weights), &pixmap, exptime, &AddImageOptions::default())?;
//! }
//! let image = driz.out_img();
//! ```

pub mod blot;
pub mod config;
pub mod context;
pub mod error;
pub mod kernel;
pub mod pixmap;
pub mod resample;

#[cfg(test)]
mod testing;

// ============================================================================
// Accumulation
// ============================================================================

pub use config::{AddImageOptions, DrizzleConfig, FillValue, InputRegion, InputUnits};
pub use context::ContextPlanes;
pub use kernel::{DropOutcome, Kernel};
pub use pixmap::PixelMap;
pub use resample::{AddImageSummary, Drizzle, OutputState};

// ============================================================================
// Blot
// ============================================================================

pub use blot::{Interpolation, blot_image};
pub use config::BlotOptions;

// ============================================================================
// Errors and shared types
// ============================================================================

pub use common::{Buffer2, Dimensions};
pub use error::{DrizzleWarning, Error, Result};
