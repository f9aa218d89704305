// Copyright 2025 the Upscale Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! C source synthesis for the runtime-compiled nearest-neighbor kernel.
//!
//! The generated routine is specialized to one source/destination size pair.
//! Per axis, the pattern of which source index feeds which output index
//! repeats every `dst / gcd(dst, src)` output steps; one such cycle is
//! unrolled literally into the source text and wrapped in a loop over the
//! remaining repetitions, so the compiled code advances pointers instead of
//! recomputing an index per element. Axes whose cycle exceeds [`CYCLE_LIMIT`]
//! fall back to a plain parametrized loop instead.

use core::fmt::Write;

use log::debug;

use crate::scaler::ScaleSpec;

/// The entry point exported by every generated kernel.
pub(crate) const KERNEL_SYMBOL: &str = "scale_kernel";

/// Longest per-axis cycle that still gets unrolled.
///
/// Near-coprime size pairs have cycles on the order of the output size
/// itself; past this limit the unrolled text (and the time the compiler
/// spends chewing through it) grows faster than the loop overhead it saves.
pub(crate) const CYCLE_LIMIT: u64 = 64;

pub(crate) fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// The number of output steps after which the source-index pattern repeats.
pub(crate) fn cycle_length(src: u16, dst: u16) -> u64 {
    let dst = u64::from(dst);
    dst / gcd(dst, u64::from(src))
}

/// Emit the self-contained C source of a nearest-neighbor kernel bound to
/// `spec`.
///
/// The kernel has the signature
/// `void scale_kernel(const unsigned char *in, unsigned char *out)` and
/// expects both buffers packed (no row padding). Packed 4-channel pixels
/// move as whole 32-bit words, other channel counts byte-wise.
pub(crate) fn nearest_kernel_source(spec: &ScaleSpec) -> String {
    let src_w = u64::from(spec.src_width);
    let src_h = u64::from(spec.src_height);
    let dst_w = u64::from(spec.dst_width);
    let dst_h = u64::from(spec.dst_height);
    let packed = spec.channels == 4;
    // How many elements of the kernel's pointer type one pixel occupies.
    let pixel_units = if packed { 1 } else { u64::from(spec.channels) };
    let row_units = src_w * pixel_units;

    let cycle_x = cycle_length(spec.src_width, spec.dst_width);
    let cycle_y = cycle_length(spec.src_height, spec.dst_height);

    let mut source = String::new();
    source.push_str("#include <stdint.h>\n\n");

    // `fill_row` consumes one source row and emits one output row, leaving
    // `in` at the start of the next source row.
    source.push_str("#define fill_row(in, out) \\\n");
    if cycle_x <= CYCLE_LIMIT {
        let reps = dst_w / cycle_x;
        let _ = writeln!(source, "    for (int i = {reps}; i > 0; --i) {{ \\");
        for k in 0..cycle_x {
            // Upsampling advances the source by at most one pixel per step.
            let advance = (k + 1) * src_w / dst_w - k * src_w / dst_w;
            debug_assert!(advance <= 1);
            if packed {
                if advance > 0 {
                    source.push_str("        *(out)++ = *(in)++; \\\n");
                } else {
                    source.push_str("        *(out)++ = *(in); \\\n");
                }
            } else {
                for c in 0..pixel_units {
                    let _ = writeln!(source, "        *(out)++ = (in)[{c}]; \\");
                }
                if advance > 0 {
                    let _ = writeln!(source, "        (in) += {pixel_units}; \\");
                }
            }
        }
        source.push_str("    }\n");
    } else {
        let _ = writeln!(source, "    for (int x = 0; x < {dst_w}; ++x) {{ \\");
        if packed {
            let _ = writeln!(
                source,
                "        *(out)++ = (in)[(long long)x * {src_w} / {dst_w}]; \\"
            );
        } else {
            let _ = writeln!(
                source,
                "        const unsigned char* px = (in) + (long long)x * {src_w} / {dst_w} * {pixel_units}; \\"
            );
            for c in 0..pixel_units {
                let _ = writeln!(source, "        *(out)++ = px[{c}]; \\");
            }
        }
        source.push_str("    } \\\n");
        let _ = writeln!(source, "    (in) += {row_units};");
    }
    source.push('\n');

    let _ = writeln!(
        source,
        "void {KERNEL_SYMBOL}(const unsigned char* restrict in_bytes, unsigned char* restrict out_bytes) {{"
    );
    if packed {
        source.push_str("    const uint32_t* restrict in = (const uint32_t*)in_bytes;\n");
        source.push_str("    uint32_t* restrict out = (uint32_t*)out_bytes;\n");
    } else {
        source.push_str("    const unsigned char* restrict in = in_bytes;\n");
        source.push_str("    unsigned char* restrict out = out_bytes;\n");
    }
    if cycle_y <= CYCLE_LIMIT {
        let reps = dst_h / cycle_y;
        let _ = writeln!(source, "    for (int y = {reps}; y > 0; --y) {{");
        for j in 0..cycle_y {
            source.push_str("        fill_row(in, out);\n");
            let advance = (j + 1) * src_h / dst_h - j * src_h / dst_h;
            debug_assert!(advance <= 1);
            if advance == 0 {
                // The next output row repeats this source row.
                let _ = writeln!(source, "        in -= {row_units};");
            }
        }
        source.push_str("    }\n");
    } else {
        let row_type = if packed {
            "const uint32_t*"
        } else {
            "const unsigned char*"
        };
        let _ = writeln!(source, "    for (int y = 0; y < {dst_h}; ++y) {{");
        let _ = writeln!(
            source,
            "        {row_type} row = in + (long long)y * {src_h} / {dst_h} * {row_units};"
        );
        source.push_str("        fill_row(row, out);\n");
        source.push_str("    }\n");
    }
    source.push_str("}\n");

    debug!(
        "nearest kernel {src_w}x{src_h} -> {dst_w}x{dst_h}: cycles {cycle_x}x{cycle_y}, {} bytes of source",
        source.len()
    );
    source
}

#[cfg(test)]
mod tests {
    use super::{cycle_length, gcd, nearest_kernel_source, CYCLE_LIMIT};
    use crate::scaler::ScaleSpec;

    #[test]
    fn cycle_lengths() {
        assert_eq!(gcd(640, 256), 128);
        assert_eq!(cycle_length(256, 640), 5);
        assert_eq!(cycle_length(4, 8), 2);
        assert_eq!(cycle_length(7, 7), 1);
        // Coprime sizes never repeat before the end of the axis.
        assert_eq!(cycle_length(97, 193), 193);
    }

    #[test]
    fn small_cycles_unroll_one_repetition() {
        let spec = ScaleSpec::new(4, 4, 8, 8, 4).unwrap();
        let source = nearest_kernel_source(&spec);
        // One x-cycle is two word copies, wrapped in a loop over the
        // remaining dst_width / cycle repetitions.
        assert!(source.contains("for (int i = 4; i > 0; --i)"));
        assert_eq!(source.matches("*(out)++").count(), 2);
        assert!(source.contains("void scale_kernel"));
    }

    #[test]
    fn repeated_rows_rewind_the_source() {
        let spec = ScaleSpec::new(4, 4, 8, 8, 4).unwrap();
        let source = nearest_kernel_source(&spec);
        // Ratio 2 emits every source row twice per y-cycle.
        assert!(source.contains("for (int y = 4; y > 0; --y)"));
        assert_eq!(source.matches("in -= 4;").count(), 1);
    }

    #[test]
    fn long_cycles_fall_back_to_parametrized_loops() {
        assert!(cycle_length(97, 193) > CYCLE_LIMIT);
        let spec = ScaleSpec::new(97, 97, 193, 193, 4).unwrap();
        let source = nearest_kernel_source(&spec);
        assert!(source.contains("for (int x = 0; x < 193; ++x)"));
        assert!(source.contains("for (int y = 0; y < 193; ++y)"));
        assert!(!source.contains("for (int i = "));
    }

    #[test]
    fn three_channel_kernels_move_bytes() {
        let spec = ScaleSpec::new(2, 2, 4, 4, 3).unwrap();
        let source = nearest_kernel_source(&spec);
        assert!(!source.contains("uint32_t* restrict out"));
        // One x-cycle of two pixels, three byte copies each.
        assert_eq!(source.matches("*(out)++").count(), 6);
        assert_eq!(source.matches("(in) += 3;").count(), 1);
    }

    #[test]
    fn equal_sizes_degrade_to_a_straight_copy() {
        let spec = ScaleSpec::new(8, 8, 8, 8, 4).unwrap();
        let source = nearest_kernel_source(&spec);
        assert!(source.contains("for (int i = 8; i > 0; --i)"));
        assert!(source.contains("*(out)++ = *(in)++;"));
        assert!(!source.contains("in -= "));
    }
}
