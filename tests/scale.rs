// Copyright 2025 the Upscale Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! End-to-end behavior of the interpreted scaling engine.

use upscale::{
    upscale, Blending, Curve, Error, Filter, Pixmap, ScaleOptions, ScaleSpec, Scaler,
};

/// A pixmap whose rows carry distinct solid colors.
fn row_colored(width: u16, height: u16) -> Pixmap {
    let mut pixmap = Pixmap::new(width, height, 4);
    for y in 0..height {
        let base = 40 * y as u8;
        let color = [10 + base, 20 + base, 30 + base, 255];
        for px in pixmap.row_mut(y).chunks_exact_mut(4) {
            px.copy_from_slice(&color);
        }
    }
    pixmap
}

/// A deterministic pattern with per-pixel variation.
fn patterned(width: u16, height: u16, channels: u8) -> Pixmap {
    let mut pixmap = Pixmap::new(width, height, channels);
    let n = usize::from(channels);
    for y in 0..height {
        let row = pixmap.row_mut(y);
        for x in 0..usize::from(width) {
            for c in 0..n {
                row[x * n + c] = (x * 31 + usize::from(y) * 17 + c * 7) as u8;
            }
        }
    }
    pixmap
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn mixf(a: f32, b: f32, weight: f32) -> f32 {
    a + weight * (b - a)
}

/// Per-axis blend weights and source indices computed the straightforward
/// way, for checking the branch-reduced sampler against the uniform
/// four-tap formula.
fn axis_tables(src: u16, dst: u16) -> (Vec<f32>, Vec<usize>) {
    let src = i64::from(src);
    let dst = i64::from(dst);
    let step = src as f32 / dst as f32;
    let (edge0, edge1) = (0.5 - step * 0.5, 0.5 + step * 0.5);
    let mut weights = Vec::new();
    let mut indices = Vec::new();
    let mut index = 0_usize;
    let mut error = src / 2 - dst / 2 - dst;
    for _ in 0..dst {
        if error >= 0 {
            error -= dst;
            index += 1;
        }
        let phase = (error + dst) as f32 / dst as f32;
        weights.push(smoothstep(edge0, edge1, phase));
        indices.push(index);
        error += src;
    }
    (weights, indices)
}

/// The uniform two-stage four-tap blend, applied to every output pixel
/// without any of the engine's region or weight shortcuts.
fn reference_bilinear(src: &Pixmap, dst_width: u16, dst_height: u16) -> Pixmap {
    let n = usize::from(src.channels());
    let (weights_x, cols) = axis_tables(src.width(), dst_width);
    let (weights_y, rows) = axis_tables(src.height(), dst_height);
    let last_col = usize::from(src.width()) - 1;
    let last_row = usize::from(src.height()) - 1;
    let mut out = Pixmap::new(dst_width, dst_height, src.channels());
    for y in 0..usize::from(dst_height) {
        let r0 = src.row(rows[y].min(last_row) as u16);
        let r1 = src.row((rows[y] + 1).min(last_row) as u16);
        let out_row = out.row_mut(y as u16);
        for x in 0..usize::from(dst_width) {
            let c0 = cols[x].min(last_col) * n;
            let c1 = (cols[x] + 1).min(last_col) * n;
            for c in 0..n {
                let top = mixf(f32::from(r0[c0 + c]), f32::from(r0[c1 + c]), weights_x[x]);
                let bottom = mixf(f32::from(r1[c0 + c]), f32::from(r1[c1 + c]), weights_x[x]);
                out_row[x * n + c] = (mixf(top, bottom, weights_y[y]) + 0.5) as u8;
            }
        }
    }
    out
}

#[test]
fn ratio_two_snaps_every_row_to_a_source_row() {
    let src = row_colored(4, 4);
    let out = upscale(&src, 8, 8).unwrap();
    // Rows 0-1 are the top border and its zero-weight neighbor, rows 6-7
    // the bottom counterparts; the eased weights snap the rows in between
    // to one of their two sources at this ratio.
    let expected = [0, 0, 1, 1, 2, 2, 3, 3];
    for (y, &sy) in expected.iter().enumerate() {
        let color = &src.row(sy)[..4];
        for (x, px) in out.row(y as u16).chunks_exact(4).enumerate() {
            assert_eq!(px, color, "pixel ({x}, {y}) should come from source row {sy}");
        }
    }
}

#[test]
fn midpoint_row_blends_its_two_sources_evenly() {
    let src = row_colored(4, 4);
    let out = upscale(&src, 6, 6).unwrap();
    // Output row 1 sits exactly between source rows 0 and 1.
    let mid: Vec<u8> = src.row(0)[..4]
        .iter()
        .zip(&src.row(1)[..4])
        .map(|(&a, &b)| ((u16::from(a) + u16::from(b)) / 2) as u8)
        .collect();
    for px in out.row(1).chunks_exact(4) {
        assert_eq!(px, &mid[..]);
    }
}

#[test]
fn equal_sizes_reduce_to_a_copy() {
    let src = patterned(5, 3, 3);
    let out = upscale(&src, 5, 3).unwrap();
    assert_eq!(out.data(), src.data());
}

#[test]
fn an_unchanged_axis_is_copied_exactly() {
    let src = patterned(4, 4, 4);
    let out = upscale(&src, 4, 8).unwrap();
    let expected = [0, 0, 1, 1, 2, 2, 3, 3];
    for (y, &sy) in expected.iter().enumerate() {
        assert_eq!(out.row(y as u16), src.row(sy), "row {y}");
    }
}

#[test]
fn downscaling_is_rejected_before_any_work() {
    let src = patterned(10, 10, 4);
    assert!(matches!(
        upscale(&src, 5, 5),
        Err(Error::InvalidDimensions { .. })
    ));
    assert!(matches!(
        upscale(&src, 5, 20),
        Err(Error::InvalidDimensions { .. })
    ));
    assert!(matches!(
        upscale(&src, 20, 5),
        Err(Error::InvalidDimensions { .. })
    ));
}

#[test]
fn branch_reduced_sampling_matches_the_uniform_formula() {
    for (sw, sh, dw, dh) in [
        (4, 4, 6, 6),
        (4, 4, 8, 8),
        (3, 5, 7, 9),
        (8, 8, 20, 20),
        (5, 3, 9, 7),
        (1, 1, 5, 5),
    ] {
        let src = patterned(sw, sh, 3);
        let spec = ScaleSpec::new(sw, sh, dw, dh, 3).unwrap();
        let scaler = Scaler::with_options(
            spec,
            ScaleOptions {
                workers: 1,
                ..Default::default()
            },
        )
        .unwrap();
        let out = scaler.scale(&src).unwrap();
        let reference = reference_bilinear(&src, dw, dh);
        assert_eq!(out.data(), reference.data(), "{sw}x{sh} -> {dw}x{dh}");
    }
}

#[cfg(feature = "multithreading")]
#[test]
fn worker_count_does_not_change_the_output() {
    let src = patterned(16, 16, 4);
    let spec = ScaleSpec::new(16, 16, 64, 64, 4).unwrap();
    let single = Scaler::with_options(
        spec,
        ScaleOptions {
            workers: 1,
            ..Default::default()
        },
    )
    .unwrap();
    let expected = single.scale(&src).unwrap();
    for workers in [0, 2, 3, 4, 16] {
        let scaler = Scaler::with_options(
            spec,
            ScaleOptions {
                workers,
                ..Default::default()
            },
        )
        .unwrap();
        let out = scaler.scale(&src).unwrap();
        assert_eq!(out.data(), expected.data(), "{workers} workers");
    }
}

#[test]
fn fixed_point_stays_within_one_lsb_of_float() {
    for (sw, sh, dw, dh) in [(4, 4, 6, 6), (8, 8, 20, 20)] {
        let src = patterned(sw, sh, 4);
        let spec = ScaleSpec::new(sw, sh, dw, dh, 4).unwrap();
        let float = Scaler::new(spec).unwrap().scale(&src).unwrap();
        let fixed = Scaler::with_options(
            spec,
            ScaleOptions {
                blending: Blending::Fixed,
                ..Default::default()
            },
        )
        .unwrap()
        .scale(&src)
        .unwrap();
        for (i, (a, b)) in float.data().iter().zip(fixed.data()).enumerate() {
            assert!(
                a.abs_diff(*b) <= 1,
                "{sw}x{sh} -> {dw}x{dh}: byte {i} is {a} float vs {b} fixed"
            );
        }
    }
}

#[test]
fn solid_sources_stay_solid_under_every_blending_mode() {
    for blending in [Blending::Float, Blending::Fixed, Blending::LinearLight] {
        let mut src = Pixmap::new(7, 5, 3);
        for px in src.data_mut().chunks_exact_mut(3) {
            px.copy_from_slice(&[120, 7, 200]);
        }
        let spec = ScaleSpec::new(7, 5, 21, 18, 3).unwrap();
        let scaler = Scaler::with_options(
            spec,
            ScaleOptions {
                blending,
                ..Default::default()
            },
        )
        .unwrap();
        let out = scaler.scale(&src).unwrap();
        for px in out.data().chunks_exact(3) {
            assert_eq!(px, &[120, 7, 200], "{blending:?}");
        }
    }
}

#[test]
fn linear_light_blending_brightens_dark_transitions() {
    // A hard black-to-white edge: a mid blend in linear light must land
    // brighter than the same blend of the encoded values.
    let mut src = Pixmap::new(2, 1, 1);
    src.data_mut().copy_from_slice(&[0, 255]);
    let spec = ScaleSpec::new(2, 1, 3, 1, 1).unwrap();
    let float = Scaler::new(spec).unwrap().scale(&src).unwrap();
    let linear = Scaler::with_options(
        spec,
        ScaleOptions {
            blending: Blending::LinearLight,
            ..Default::default()
        },
    )
    .unwrap()
    .scale(&src)
    .unwrap();
    assert!(
        linear.data()[1] > float.data()[1],
        "{} encoded vs {} linear",
        float.data()[1],
        linear.data()[1]
    );
}

#[test]
fn easing_curve_is_configurable() {
    let src = patterned(4, 4, 4);
    let spec = ScaleSpec::new(4, 4, 12, 12, 4).unwrap();
    let smooth = Scaler::new(spec).unwrap().scale(&src).unwrap();
    let sharp = Scaler::with_options(
        spec,
        ScaleOptions {
            curve: Curve::Slopestep(3.0),
            ..Default::default()
        },
    )
    .unwrap()
    .scale(&src)
    .unwrap();
    assert_ne!(smooth.data(), sharp.data());
}

#[test]
fn nearest_uses_the_floor_index_mapping() {
    for channels in [1_u8, 3, 4] {
        let src = patterned(5, 4, channels);
        let spec = ScaleSpec::new(5, 4, 13, 9, channels).unwrap();
        let scaler = Scaler::with_options(
            spec,
            ScaleOptions {
                filter: Filter::Nearest,
                ..Default::default()
            },
        )
        .unwrap();
        let out = scaler.scale(&src).unwrap();
        let n = usize::from(channels);
        for y in 0..9_usize {
            let sy = y * 4 / 9;
            for x in 0..13_usize {
                let sx = x * 5 / 13;
                assert_eq!(
                    &out.row(y as u16)[x * n..(x + 1) * n],
                    &src.row(sy as u16)[sx * n..(sx + 1) * n],
                    "{channels} channels, pixel ({x}, {y})"
                );
            }
        }
    }
}

#[test]
fn scale_into_reuses_the_destination() {
    let src = patterned(4, 4, 2);
    let spec = ScaleSpec::new(4, 4, 9, 9, 2).unwrap();
    let scaler = Scaler::new(spec).unwrap();
    let mut dst = Pixmap::new(9, 9, 2);
    scaler.scale_into(&src, &mut dst).unwrap();
    assert_eq!(dst.data(), scaler.scale(&src).unwrap().data());
}

#[test]
#[should_panic(expected = "does not match")]
fn scale_into_rejects_mismatched_buffers() {
    let src = patterned(4, 4, 2);
    let scaler = Scaler::new(ScaleSpec::new(4, 4, 9, 9, 2).unwrap()).unwrap();
    let mut dst = Pixmap::new(8, 9, 2);
    let _ = scaler.scale_into(&src, &mut dst);
}
