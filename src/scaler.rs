// Copyright 2025 the Upscale Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The public scaling API: specs, options and strategy dispatch.
//!
//! A [`Scaler`] is specialized to one [`ScaleSpec`] at construction time.
//! All per-spec work happens there: weight tables for the interpreted
//! engine, or source generation and compilation for the runtime-compiled
//! one. Scaling itself is then a read-only operation that can be repeated
//! for any number of matching buffers.

use crate::pixmap::Pixmap;
use crate::region;
use crate::sampler;
use crate::weights::{self, Curve, Fixed, LinearLight, Weight};
use crate::Error;

#[cfg(feature = "jit")]
use crate::jit::{CompiledKernel, JitPaths};

/// The source and destination sizes one [`Scaler`] is specialized to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScaleSpec {
    pub(crate) src_width: u16,
    pub(crate) src_height: u16,
    pub(crate) dst_width: u16,
    pub(crate) dst_height: u16,
    pub(crate) channels: u8,
}

impl ScaleSpec {
    /// Describe scaling a `src_width x src_height` image with the given
    /// channel count to `dst_width x dst_height`.
    ///
    /// The engine only upsamples: both destination dimensions must be at
    /// least as large as the source ones, and no dimension may be zero.
    /// Anything else is [`Error::InvalidDimensions`], reported before any
    /// work begins and never silently clamped.
    ///
    /// # Panics
    ///
    /// Panics if `channels` is 0 or greater than 4.
    pub fn new(
        src_width: u16,
        src_height: u16,
        dst_width: u16,
        dst_height: u16,
        channels: u8,
    ) -> Result<Self, Error> {
        assert!(
            (1..=4).contains(&channels),
            "channel count must be between 1 and 4"
        );
        if src_width == 0 || src_height == 0 || dst_width < src_width || dst_height < src_height {
            return Err(Error::InvalidDimensions {
                src_width,
                src_height,
                dst_width,
                dst_height,
            });
        }
        Ok(Self {
            src_width,
            src_height,
            dst_width,
            dst_height,
            channels,
        })
    }

    /// Source width in pixels.
    pub fn src_width(&self) -> u16 {
        self.src_width
    }

    /// Source height in pixels.
    pub fn src_height(&self) -> u16 {
        self.src_height
    }

    /// Destination width in pixels.
    pub fn dst_width(&self) -> u16 {
        self.dst_width
    }

    /// Destination height in pixels.
    pub fn dst_height(&self) -> u16 {
        self.dst_height
    }

    /// Interleaved channels per pixel.
    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// The output columns/rows on each side whose sampling window never
    /// crosses a source edge.
    ///
    /// An output column samples only the first source column while its
    /// continuous position is left of the first pixel transition, which
    /// solves to `x < dst/src - 1`; likewise on the right and vertically.
    /// Clamped so the two sides never overlap on very narrow sources.
    pub(crate) fn borders(&self) -> Borders {
        Borders {
            x: (self.dst_width / self.src_width - 1).min(self.dst_width / 2),
            y: (self.dst_height / self.src_height - 1).min(self.dst_height / 2),
        }
    }
}

/// Counts of leading/trailing output columns and rows, per side, that
/// always sample the clamped edge of the source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Borders {
    pub(crate) x: u16,
    pub(crate) y: u16,
}

/// The resampling filter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Filter {
    /// Border-decomposed bilinear interpolation with eased blend weights.
    #[default]
    Bilinear,
    /// Nearest-neighbor copy, the filter the runtime-compiled kernels
    /// implement.
    Nearest,
}

/// How blend arithmetic is carried out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Blending {
    /// Floating point weights applied to the encoded channel values.
    #[default]
    Float,
    /// Signed 8.8 fixed point. Stays within 1 LSB per channel of [`Float`].
    ///
    /// [`Float`]: Blending::Float
    Fixed,
    /// Floating point weights applied in linear light (gamma 2.2).
    LinearLight,
}

/// Which implementation strategy fills the destination.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Engine {
    /// The interpreted sampler.
    #[default]
    Interpreted,
    /// Generate C source specialized to the spec and compile it in memory
    /// with TinyCC. Carries the search paths TCC needs to locate its own
    /// runtime.
    #[cfg(feature = "jit")]
    Jit(JitPaths),
}

/// Configuration consumed by [`Scaler::with_options`].
#[derive(Clone, Debug, PartialEq)]
pub struct ScaleOptions {
    /// The resampling filter.
    pub filter: Filter,
    /// The implementation strategy.
    pub engine: Engine,
    /// The blend arithmetic used by the bilinear filter.
    pub blending: Blending,
    /// The easing curve shaping the blend weights.
    pub curve: Curve,
    /// Worker threads for sampling the image interior. 0 means available
    /// hardware concurrency; 1 keeps everything on the calling thread.
    pub workers: u16,
}

impl Default for ScaleOptions {
    fn default() -> Self {
        Self {
            filter: Filter::default(),
            engine: Engine::default(),
            blending: Blending::default(),
            curve: Curve::default(),
            workers: 0,
        }
    }
}

/// Per-axis weight tables for one blend representation.
#[derive(Debug)]
struct Tables<W> {
    x: Vec<W>,
    y: Vec<W>,
}

impl<W: Weight> Tables<W> {
    fn build(spec: &ScaleSpec, curve: Curve) -> Self {
        Self {
            x: weights::build(spec.src_width, spec.dst_width, curve),
            y: weights::build(spec.src_height, spec.dst_height, curve),
        }
    }
}

#[derive(Debug)]
enum Plan {
    Nearest,
    Float(Tables<f32>),
    Fixed(Tables<Fixed>),
    Linear(Tables<LinearLight>),
    #[cfg(feature = "jit")]
    Compiled(CompiledKernel),
}

/// A scaling engine specialized to one [`ScaleSpec`].
#[derive(Debug)]
pub struct Scaler {
    spec: ScaleSpec,
    workers: u16,
    plan: Plan,
}

impl Scaler {
    /// Create a scaler with default options: interpreted bilinear filtering
    /// with float weights and the interior tiled across all hardware
    /// threads.
    pub fn new(spec: ScaleSpec) -> Result<Self, Error> {
        Self::with_options(spec, ScaleOptions::default())
    }

    /// Create a scaler with explicit options.
    ///
    /// Fails with [`Error::Unsupported`] for option combinations the engine
    /// cannot honor, and with [`Error::Compile`] or
    /// [`Error::MissingSymbol`] when a runtime-compiled kernel cannot be
    /// built. Those leave the interpreted engine available as a fallback
    /// for the same spec.
    pub fn with_options(spec: ScaleSpec, options: ScaleOptions) -> Result<Self, Error> {
        let plan = match options.engine {
            #[cfg(feature = "jit")]
            Engine::Jit(ref paths) => {
                if options.filter != Filter::Nearest {
                    return Err(Error::Unsupported(
                        "the runtime-compiled engine only implements the nearest filter",
                    ));
                }
                Plan::Compiled(CompiledKernel::build(spec, paths)?)
            }
            Engine::Interpreted => match options.filter {
                Filter::Nearest => Plan::Nearest,
                Filter::Bilinear => match options.blending {
                    Blending::Float => Plan::Float(Tables::build(&spec, options.curve)),
                    Blending::Fixed => Plan::Fixed(Tables::build(&spec, options.curve)),
                    Blending::LinearLight => Plan::Linear(Tables::build(&spec, options.curve)),
                },
            },
        };
        Ok(Self {
            spec,
            workers: options.workers,
            plan,
        })
    }

    /// The spec this scaler is specialized to.
    pub fn spec(&self) -> ScaleSpec {
        self.spec
    }

    /// Scale `src` into a newly allocated destination pixmap.
    ///
    /// # Panics
    ///
    /// Panics if `src` does not match the spec's source side.
    pub fn scale(&self, src: &Pixmap) -> Result<Pixmap, Error> {
        let mut dst = Pixmap::try_new(self.spec.dst_width, self.spec.dst_height, self.spec.channels)?;
        self.scale_into(src, &mut dst)?;
        Ok(dst)
    }

    /// Scale `src` into an existing destination pixmap.
    ///
    /// # Panics
    ///
    /// Panics if either buffer does not match the spec the scaler was built
    /// for. One scaler serves exactly one size pair.
    pub fn scale_into(&self, src: &Pixmap, dst: &mut Pixmap) -> Result<(), Error> {
        assert!(
            src.width() == self.spec.src_width
                && src.height() == self.spec.src_height
                && src.channels() == self.spec.channels,
            "source pixmap does not match the scaler's spec"
        );
        assert!(
            dst.width() == self.spec.dst_width
                && dst.height() == self.spec.dst_height
                && dst.channels() == self.spec.channels,
            "destination pixmap does not match the scaler's spec"
        );
        match &self.plan {
            Plan::Nearest => sampler::nearest(src, dst),
            Plan::Float(tables) => self.bilinear(src, dst, tables),
            Plan::Fixed(tables) => self.bilinear(src, dst, tables),
            Plan::Linear(tables) => self.bilinear(src, dst, tables),
            #[cfg(feature = "jit")]
            Plan::Compiled(kernel) => kernel.invoke(src, dst),
        }
        Ok(())
    }

    fn bilinear<W: Weight>(&self, src: &Pixmap, dst: &mut Pixmap, tables: &Tables<W>) {
        match self.spec.channels {
            1 => self.bilinear_n::<W, 1>(src, dst, tables),
            2 => self.bilinear_n::<W, 2>(src, dst, tables),
            3 => self.bilinear_n::<W, 3>(src, dst, tables),
            _ => self.bilinear_n::<W, 4>(src, dst, tables),
        }
    }

    fn bilinear_n<W: Weight, const N: usize>(
        &self,
        src: &Pixmap,
        dst: &mut Pixmap,
        tables: &Tables<W>,
    ) {
        let spec = &self.spec;
        let borders = spec.borders();
        let stride = dst.stride();
        let by = usize::from(borders.y);
        let interior_rows = usize::from(spec.dst_height) - 2 * by;
        let start_y = borders.y;
        let end_y = spec.dst_height - borders.y;

        let (top, interior, bottom) = region::split_rows(dst.data_mut(), stride, by, interior_rows);
        if by > 0 {
            sampler::bar::<W, N>(src.row(0), top, stride, spec, &tables.x, borders);
            sampler::bar::<W, N>(
                src.row(spec.src_height - 1),
                bottom,
                stride,
                spec,
                &tables.x,
                borders,
            );
        }

        #[cfg(feature = "multithreading")]
        {
            let workers = self.worker_count();
            if workers > 1 && interior_rows > 1 {
                self.interior_parallel::<W, N>(
                    src, interior, stride, start_y, end_y, tables, borders, workers,
                );
                return;
            }
        }

        sampler::interior::<W, N>(
            src, interior, stride, start_y, end_y, spec, &tables.x, &tables.y, borders,
        );
    }

    #[cfg(feature = "multithreading")]
    fn worker_count(&self) -> usize {
        if self.workers == 0 {
            std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
        } else {
            usize::from(self.workers)
        }
    }

    /// Tile the interior rows across a worker pool built for this call.
    ///
    /// Every worker writes a disjoint destination slice and reads only the
    /// shared source and weight tables, so the parallel section needs no
    /// synchronization; the pool is joined before returning.
    #[cfg(feature = "multithreading")]
    fn interior_parallel<W: Weight, const N: usize>(
        &self,
        src: &Pixmap,
        interior: &mut [u8],
        stride: usize,
        start_y: u16,
        end_y: u16,
        tables: &Tables<W>,
        borders: Borders,
        workers: usize,
    ) {
        let spec = &self.spec;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .unwrap();
        let slices = region::split_interior(interior, stride, start_y, end_y, workers);
        pool.scope(|scope| {
            for (slice_start, slice_end, rows) in slices {
                let (weights_x, weights_y) = (&tables.x, &tables.y);
                scope.spawn(move |_| {
                    sampler::interior::<W, N>(
                        src, rows, stride, slice_start, slice_end, spec, weights_x, weights_y,
                        borders,
                    );
                });
            }
        });
    }
}

/// Scale `src` to `dst_width x dst_height` with default options.
///
/// Convenience wrapper building a one-shot [`Scaler`].
pub fn upscale(src: &Pixmap, dst_width: u16, dst_height: u16) -> Result<Pixmap, Error> {
    let spec = ScaleSpec::new(
        src.width(),
        src.height(),
        dst_width,
        dst_height,
        src.channels(),
    )?;
    Scaler::new(spec)?.scale(src)
}
