// Copyright 2025 the Upscale Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fixed-ratio image upscaling, specialized to one source/destination size pair.
//!
//! The engine only upsamples. Given a source buffer and a target size at least
//! as large on both axes, it fills a destination buffer using one of two
//! interchangeable strategies:
//!
//! - **Interpreted** (the default): per-axis blend weights are precomputed
//!   once, and a border-decomposed bilinear sampler walks the output with
//!   incrementally advancing source cursors. With the `multithreading`
//!   feature, the image interior is tiled row-wise across a worker pool.
//! - **Runtime-compiled** (feature `jit`): C source for a nearest-neighbor
//!   kernel hard-coded to the exact size pair is generated and compiled in
//!   memory with TinyCC, and the resolved entry point is invoked directly.
//!
//! Both strategies read the same source buffer and fill the same destination
//! layout; they are alternatives, not a pipeline.
//!
//! ```
//! use upscale::{Pixmap, ScaleSpec, Scaler};
//!
//! let spec = ScaleSpec::new(2, 2, 8, 8, 4)?;
//! let scaler = Scaler::new(spec)?;
//! let src = Pixmap::new(2, 2, 4);
//! let out = scaler.scale(&src)?;
//! assert_eq!((out.width(), out.height()), (8, 8));
//! # Ok::<(), upscale::Error>(())
//! ```

#[cfg(any(feature = "jit", test))]
mod codegen;
mod gamma;
#[cfg(feature = "jit")]
mod jit;
mod pixmap;
mod region;
mod sampler;
mod scaler;
mod weights;

pub use pixmap::Pixmap;
pub use scaler::{upscale, Blending, Engine, Filter, ScaleOptions, ScaleSpec, Scaler};
pub use weights::Curve;

#[cfg(feature = "jit")]
pub use jit::JitPaths;

use std::collections::TryReserveError;
use thiserror::Error;

/// Errors reported by the scaling engine.
#[derive(Error, Debug)]
pub enum Error {
    /// The target size is smaller than the source on at least one axis, or a
    /// dimension is zero. Checked before any sampling begins and never
    /// silently clamped.
    #[error("cannot scale {src_width}x{src_height} to {dst_width}x{dst_height}; only upsampling is supported")]
    InvalidDimensions {
        /// Source width in pixels.
        src_width: u16,
        /// Source height in pixels.
        src_height: u16,
        /// Requested target width in pixels.
        dst_width: u16,
        /// Requested target height in pixels.
        dst_height: u16,
    },
    /// The generated kernel source failed to compile. Carries the compiler's
    /// diagnostic text. Fatal to the runtime-compiled engine for this spec;
    /// the caller may fall back to an interpreted [`Scaler`].
    #[error("runtime compilation failed: {0}")]
    Compile(String),
    /// Compilation reported success but the kernel entry point could not be
    /// resolved. Treated like [`Error::Compile`] for fallback purposes, but
    /// logged distinctly since it points at a generator/compiler mismatch
    /// rather than a source defect.
    #[error("compiled kernel does not export `{0}`")]
    MissingSymbol(String),
    /// The destination buffer could not be allocated. Fatal to the call.
    #[error("could not allocate the destination buffer")]
    Allocation(#[from] TryReserveError),
    /// The requested option combination is not supported by the engine.
    #[error("unsupported configuration: {0}")]
    Unsupported(&'static str),
}
