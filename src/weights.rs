// Copyright 2025 the Upscale Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-axis blend weight tables.
//!
//! For every output coordinate along one axis, the table stores the fraction
//! of the "next" source sample to mix into the "current" one. The fractional
//! source position is tracked with an integer error accumulator instead of a
//! per-coordinate division, and the resulting phase is shaped by an easing
//! curve whose transition width equals the source/destination size ratio.
//! This is what keeps pixel edges crisp at large ratios while still blending
//! across the one output pixel that straddles a source pixel boundary.

use crate::gamma;

/// The easing curve applied to the fractional sample position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Curve {
    /// The classic Hermite `smoothstep`.
    Smoothstep,
    /// A sharpened step with the given slope at the midpoint. A slope of
    /// 1.0 degrades to a linear ramp; higher values narrow the transition.
    Slopestep(f32),
}

impl Default for Curve {
    fn default() -> Self {
        Self::Smoothstep
    }
}

fn sign(value: f32) -> f32 {
    if value < 0.0 {
        -1.0
    } else if value > 0.0 {
        1.0
    } else {
        0.0
    }
}

pub(crate) fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

pub(crate) fn slopestep(edge0: f32, edge1: f32, x: f32, slope: f32) -> f32 {
    let x = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    let s = sign(x - 0.5);
    let o = (1.0 + s) * 0.5;
    o - 0.5 * s * (2.0 * (o - s * x)).powf(slope)
}

impl Curve {
    fn apply(self, edge0: f32, edge1: f32, x: f32) -> f32 {
        match self {
            Self::Smoothstep => smoothstep(edge0, edge1, x),
            Self::Slopestep(slope) => slopestep(edge0, edge1, x, slope),
        }
    }
}

/// One representation of a blend weight in `[0, 1]`, together with the
/// channel arithmetic that goes with it.
///
/// Blends are evaluated in two stages (horizontal, then vertical) on the
/// accumulator type and quantized back to 8 bits once, at the end.
///
/// The endpoint tolerances obey one rule: a weight counts as 0 or 1 exactly
/// when the skipped blend cannot move the quantized output by a single step,
/// so the branch-reduced sampler stays bit-identical to the uniform two-stage
/// formula.
pub(crate) trait Weight: Copy + Send + Sync + 'static {
    /// Channel value carried between the two blend stages.
    type Acc: Copy;

    fn from_unit(weight: f32) -> Self;
    fn lift(channel: u8) -> Self::Acc;
    fn quantize(acc: Self::Acc) -> u8;
    /// `a + weight * (b - a)` in the accumulator domain.
    fn mix(self, a: Self::Acc, b: Self::Acc) -> Self::Acc;
    /// The weight is close enough to 0 that blending is a no-op.
    fn nearly_zero(self) -> bool;
    /// The weight is close enough to 1 that only the next sample matters.
    fn nearly_one(self) -> bool;
}

/// A weight below this tolerance shifts a channel by at most
/// `255 * 1e-4 < 0.5`, which disappears when rounding to 8 bits.
const FLOAT_TOLERANCE: f32 = 1.0e-4;

impl Weight for f32 {
    type Acc = f32;

    #[inline(always)]
    fn from_unit(weight: f32) -> Self {
        weight
    }

    #[inline(always)]
    fn lift(channel: u8) -> f32 {
        f32::from(channel)
    }

    #[inline(always)]
    fn quantize(acc: f32) -> u8 {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "mixing keeps the accumulator within 0..=255"
        )]
        let quantized = (acc + 0.5) as u8;
        quantized
    }

    #[inline(always)]
    fn mix(self, a: f32, b: f32) -> f32 {
        a + self * (b - a)
    }

    #[inline(always)]
    fn nearly_zero(self) -> bool {
        self < FLOAT_TOLERANCE
    }

    #[inline(always)]
    fn nearly_one(self) -> bool {
        self > 1.0 - FLOAT_TOLERANCE
    }
}

const FIXED_BITS: u32 = 8;
const FIXED_ONE: i32 = 1 << FIXED_BITS;

/// A blend weight in signed 8.8 fixed point.
///
/// `i16` holds the weight itself; the accumulator widens to `i32`, which is
/// more than 8 bits beyond `FIXED_BITS` and so fits a channel value times a
/// weight without overflow. The type must stay signed because mixing
/// multiplies the weight by a difference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Fixed(i16);

impl Weight for Fixed {
    /// A channel value scaled by `FIXED_ONE`.
    type Acc = i32;

    #[inline(always)]
    fn from_unit(weight: f32) -> Self {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "weights are within [0, 1], so the scaled value fits i16"
        )]
        let fixed = (weight * FIXED_ONE as f32 + 0.5) as i16;
        Self(fixed)
    }

    #[inline(always)]
    fn lift(channel: u8) -> i32 {
        i32::from(channel) << FIXED_BITS
    }

    #[inline(always)]
    fn quantize(acc: i32) -> u8 {
        #[expect(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            reason = "mixing keeps the accumulator within the channel range"
        )]
        let quantized = ((acc + FIXED_ONE / 2) >> FIXED_BITS) as u8;
        quantized
    }

    #[inline(always)]
    fn mix(self, a: i32, b: i32) -> i32 {
        a + ((i32::from(self.0) * (b - a)) >> FIXED_BITS)
    }

    #[inline(always)]
    fn nearly_zero(self) -> bool {
        // One fixed-point unit; a zero weight is exact.
        self.0 < 1
    }

    #[inline(always)]
    fn nearly_one(self) -> bool {
        self.0 > (FIXED_ONE - 1) as i16
    }
}

/// Floating point weights applied in linear light.
///
/// Channel values pass through the gamma transfer before mixing and are
/// re-encoded afterwards. The tolerance is tighter than the plain float one
/// because the encoding slope near black amplifies small linear differences.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct LinearLight(f32);

const LINEAR_TOLERANCE: f32 = 1.0e-6;

impl Weight for LinearLight {
    /// A channel value in linear light, in `[0, 1]`.
    type Acc = f32;

    #[inline(always)]
    fn from_unit(weight: f32) -> Self {
        Self(weight)
    }

    #[inline(always)]
    fn lift(channel: u8) -> f32 {
        gamma::decode(channel)
    }

    #[inline(always)]
    fn quantize(acc: f32) -> u8 {
        gamma::encode(acc)
    }

    #[inline(always)]
    fn mix(self, a: f32, b: f32) -> f32 {
        a + self.0 * (b - a)
    }

    #[inline(always)]
    fn nearly_zero(self) -> bool {
        self.0 < LINEAR_TOLERANCE
    }

    #[inline(always)]
    fn nearly_one(self) -> bool {
        self.0 > 1.0 - LINEAR_TOLERANCE
    }
}

/// Build the weight table for one axis.
///
/// The fractional source position for output coordinate `o` is
/// `(o + 0.5) * src / dst - 0.5`; its fractional part is recovered from a
/// running error term that gains `src` per output step and sheds `dst`
/// whenever it becomes non-negative, so the loop divides once per coordinate
/// and never recomputes the position from scratch.
///
/// Equal sizes short-circuit to an all-zero table: every output coordinate
/// copies its source sample and no ratio is ever formed.
pub(crate) fn build<W: Weight>(src: u16, dst: u16, curve: Curve) -> Vec<W> {
    let len = usize::from(dst);
    if src == dst {
        return vec![W::from_unit(0.0); len];
    }

    let src = i64::from(src);
    let dst = i64::from(dst);
    let step = src as f32 / dst as f32;
    let edge0 = 0.5 - step * 0.5;
    let edge1 = 0.5 + step * 0.5;

    let mut weights = Vec::with_capacity(len);
    let mut error = src / 2 - dst / 2 - dst;
    for _ in 0..dst {
        if error >= 0 {
            error -= dst;
        }
        let phase = (error + dst) as f32 / dst as f32;
        weights.push(W::from_unit(curve.apply(edge0, edge1, phase)));
        error += src;
    }
    weights
}
