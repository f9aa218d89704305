// Copyright 2025 the Upscale Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The interpreted samplers.
//!
//! The bilinear sampler decomposes the output into border strips and an
//! interior. Border columns and rows always sample the clamped edge pixel of
//! the source, which is what lets the interior loop drop per-pixel bounds
//! checks: by the time it runs, the 2x2 source neighborhood is known to be
//! inside the image (up to edge clamping of the trailing cell at small
//! ratios). Source positions are tracked with integer error accumulators
//! rather than recomputed per pixel.

use crate::pixmap::Pixmap;
use crate::scaler::{Borders, ScaleSpec};
use crate::weights::Weight;

/// Integer state machine tracking which source cell a walk over output
/// coordinates is in.
///
/// The error term gains `src` per output step; whenever it becomes
/// non-negative it sheds `dst` and the source index advances by one. This
/// reproduces the fractional position `(o + 0.5) * src / dst - 0.5` without
/// per-step division and stays aligned with the phases baked into the weight
/// tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Cursor {
    pub(crate) index: usize,
    pub(crate) error: i64,
    src: i64,
    dst: i64,
}

impl Cursor {
    /// Cursor over source columns, entering a row at the first interior
    /// output column (`border_x`), where the source index is still 0.
    pub(crate) fn columns(spec: &ScaleSpec, border_x: u16) -> Self {
        let src = i64::from(spec.src_width);
        let dst = i64::from(spec.dst_width);
        Self {
            index: 0,
            error: src / 2 - dst / 2 - dst + src * i64::from(border_x),
            src,
            dst,
        }
    }

    /// Cursor over source rows, entering the image at output row `start_y`.
    ///
    /// The entry state is derived arithmetically so that a walk starting at
    /// any row observes the same index/error sequence as a walk from the top;
    /// workers rely on this to start mid-image. The leading output rows
    /// sample ahead of the image, so the entry index clamps at row 0, which
    /// anchors the whole walk.
    pub(crate) fn rows(spec: &ScaleSpec, start_y: u16) -> Self {
        let src = i64::from(spec.src_height);
        let dst = i64::from(spec.dst_height);
        let start = i64::from(start_y);
        let error = (src / 2 - dst / 2 - dst + start * src + dst) % dst - dst;
        let centered = start * src + src / 2;
        let index = (centered / dst - i64::from(centered % dst < dst / 2)).max(0);
        Self {
            index: index as usize,
            error,
            src,
            dst,
        }
    }

    /// Advance to the next source cell if the accumulated error crossed zero.
    /// Called once per output coordinate, before sampling.
    #[inline(always)]
    pub(crate) fn step(&mut self) {
        if self.error >= 0 {
            self.error -= self.dst;
            self.index += 1;
        }
    }

    /// Account for one output step. Called after sampling.
    #[inline(always)]
    pub(crate) fn bump(&mut self) {
        self.error += self.src;
    }
}

#[inline(always)]
fn pixel<const N: usize>(row: &[u8], col: usize) -> [u8; N] {
    let base = col * N;
    core::array::from_fn(|c| row[base + c])
}

#[inline(always)]
fn mix2<W: Weight, const N: usize>(ra: &[u8], ca: usize, rb: &[u8], cb: usize, w: W) -> [u8; N] {
    let a = ca * N;
    let b = cb * N;
    core::array::from_fn(|c| W::quantize(w.mix(W::lift(ra[a + c]), W::lift(rb[b + c]))))
}

#[inline(always)]
fn mix4<W: Weight, const N: usize>(
    r0: &[u8],
    r1: &[u8],
    c0: usize,
    c1: usize,
    wx: W,
    wy: W,
) -> [u8; N] {
    let a = c0 * N;
    let b = c1 * N;
    core::array::from_fn(|c| {
        let top = wx.mix(W::lift(r0[a + c]), W::lift(r0[b + c]));
        let bottom = wx.mix(W::lift(r1[a + c]), W::lift(r1[b + c]));
        W::quantize(wy.mix(top, bottom))
    })
}

/// Blend one column of the two source rows, skipping pinned weights.
#[inline(always)]
fn sample_column<W: Weight, const N: usize>(r0: &[u8], r1: &[u8], col: usize, wy: W) -> [u8; N] {
    if wy.nearly_zero() {
        pixel(r0, col)
    } else if wy.nearly_one() {
        pixel(r1, col)
    } else {
        mix2(r0, col, r1, col, wy)
    }
}

/// Blend two adjacent columns of one source row, skipping pinned weights.
#[inline(always)]
fn sample_row<W: Weight, const N: usize>(row: &[u8], c0: usize, c1: usize, wx: W) -> [u8; N] {
    if wx.nearly_zero() {
        pixel(row, c0)
    } else if wx.nearly_one() {
        pixel(row, c1)
    } else {
        mix2(row, c0, row, c1, wx)
    }
}

/// Fill a horizontal border bar from a single clamped source row.
///
/// Corner cells copy the row's first/last pixel; the middle of the bar
/// blends along x only, with two column samples advanced lazily.
pub(crate) fn bar<W: Weight, const N: usize>(
    src_row: &[u8],
    rows: &mut [u8],
    stride: usize,
    spec: &ScaleSpec,
    weights_x: &[W],
    borders: Borders,
) {
    let dst_w = usize::from(spec.dst_width);
    let bx = usize::from(borders.x);
    let last_col = usize::from(spec.src_width) - 1;
    let first: [u8; N] = pixel(src_row, 0);
    let last: [u8; N] = pixel(src_row, last_col);

    for out_row in rows.chunks_exact_mut(stride) {
        for x in 0..bx {
            out_row[x * N..x * N + N].copy_from_slice(&first);
        }

        let mut cx = Cursor::columns(spec, borders.x);
        for x in bx..dst_w - bx {
            cx.step();
            let c0 = cx.index.min(last_col);
            let c1 = (cx.index + 1).min(last_col);
            let px = sample_row::<W, N>(src_row, c0, c1, weights_x[x]);
            out_row[x * N..x * N + N].copy_from_slice(&px);
            cx.bump();
        }

        for x in dst_w - bx..dst_w {
            out_row[x * N..x * N + N].copy_from_slice(&last);
        }
    }
}

/// Sample the interior output rows `start_y..end_y` into `rows`.
///
/// The 2x2 source neighborhood is tracked per row through the column cursor
/// and the row pair, and each output pixel branches on whether either weight
/// is pinned to an endpoint: copy, x-blend only, y-blend only, or the full
/// four-tap blend. By the weight tolerance rule the branches are
/// bit-identical to applying the two-stage formula uniformly.
pub(crate) fn interior<W: Weight, const N: usize>(
    src: &Pixmap,
    rows: &mut [u8],
    stride: usize,
    start_y: u16,
    end_y: u16,
    spec: &ScaleSpec,
    weights_x: &[W],
    weights_y: &[W],
    borders: Borders,
) {
    let dst_w = usize::from(spec.dst_width);
    let bx = usize::from(borders.x);
    let last_col = usize::from(spec.src_width) - 1;
    let last_row = usize::from(spec.src_height) - 1;

    let mut cy = Cursor::rows(spec, start_y);
    for (y, out_row) in (start_y..end_y).zip(rows.chunks_exact_mut(stride)) {
        cy.step();
        let wy = weights_y[usize::from(y)];
        let r0 = src.row(cy.index.min(last_row) as u16);
        let r1 = src.row((cy.index + 1).min(last_row) as u16);

        if bx > 0 {
            let left = sample_column::<W, N>(r0, r1, 0, wy);
            for x in 0..bx {
                out_row[x * N..x * N + N].copy_from_slice(&left);
            }
            let right = sample_column::<W, N>(r0, r1, last_col, wy);
            for x in dst_w - bx..dst_w {
                out_row[x * N..x * N + N].copy_from_slice(&right);
            }
        }

        let mut cx = Cursor::columns(spec, borders.x);
        for x in bx..dst_w - bx {
            cx.step();
            let c0 = cx.index.min(last_col);
            let c1 = (cx.index + 1).min(last_col);
            let wx = weights_x[x];
            let px: [u8; N] = if wy.nearly_zero() {
                sample_row::<W, N>(r0, c0, c1, wx)
            } else if wy.nearly_one() {
                sample_row::<W, N>(r1, c0, c1, wx)
            } else if wx.nearly_zero() {
                mix2(r0, c0, r1, c0, wy)
            } else if wx.nearly_one() {
                mix2(r0, c1, r1, c1, wy)
            } else {
                mix4(r0, r1, c0, c1, wx, wy)
            };
            out_row[x * N..x * N + N].copy_from_slice(&px);
            cx.bump();
        }
        cy.bump();
    }
}

/// Nearest-neighbor copy using the `o * src / dst` index mapping, the same
/// mapping the generated kernels bake in. Column indices are precomputed
/// once per call.
pub(crate) fn nearest(src: &Pixmap, dst: &mut Pixmap) {
    let src_w = usize::from(src.width());
    let src_h = usize::from(src.height());
    let dst_w = usize::from(dst.width());
    let dst_h = usize::from(dst.height());
    let n = usize::from(src.channels());

    let col_map: Vec<usize> = (0..dst_w).map(|x| x * src_w / dst_w).collect();

    if src.channels() == 4 && src.is_packed() && dst.is_packed() {
        // Packed RGBA rows copy whole 32-bit pixels.
        let src_px = src.pixels_u32().expect("checked packed 4-channel");
        let dst_px = dst.pixels_u32_mut().expect("checked packed 4-channel");
        for y in 0..dst_h {
            let sy = y * src_h / dst_h;
            let src_row = &src_px[sy * src_w..sy * src_w + src_w];
            let dst_row = &mut dst_px[y * dst_w..(y + 1) * dst_w];
            for (out, &sx) in dst_row.iter_mut().zip(&col_map) {
                *out = src_row[sx];
            }
        }
        return;
    }

    for y in 0..dst_h {
        let sy = y * src_h / dst_h;
        let src_row = src.row(sy as u16);
        let dst_row = dst.row_mut(y as u16);
        for (x, &sx) in col_map.iter().enumerate() {
            dst_row[x * n..x * n + n].copy_from_slice(&src_row[sx * n..sx * n + n]);
        }
    }
}
