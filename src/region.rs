// Copyright 2025 the Upscale Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Splitting the destination buffer into row ranges that can be written
//! concurrently.

/// Split the destination bytes into the top bar, the interior, and the
/// bottom bar.
pub(crate) fn split_rows(
    buf: &mut [u8],
    stride: usize,
    top_rows: usize,
    interior_rows: usize,
) -> (&mut [u8], &mut [u8], &mut [u8]) {
    let (top, rest) = buf.split_at_mut(top_rows * stride);
    let (interior, bottom) = rest.split_at_mut(interior_rows * stride);
    (top, interior, bottom)
}

/// Partition the interior rows into contiguous per-worker slices, as evenly
/// as integer division allows.
///
/// Returns `(start_y, end_y, rows)` triples with absolute output row
/// numbers. The slices are disjoint and cover `start_y..end_y` exactly, so
/// no destination row is written by more than one worker.
#[cfg(feature = "multithreading")]
pub(crate) fn split_interior(
    buf: &mut [u8],
    stride: usize,
    start_y: u16,
    end_y: u16,
    workers: usize,
) -> Vec<(u16, u16, &mut [u8])> {
    let range = usize::from(end_y - start_y);
    let workers = workers.clamp(1, range.max(1));
    let mut slices = Vec::with_capacity(workers);
    let mut rest = buf;
    let mut prev = 0;
    for i in 1..=workers {
        let end = range * i / workers;
        let (head, tail) = rest.split_at_mut((end - prev) * stride);
        rest = tail;
        slices.push((start_y + prev as u16, start_y + end as u16, head));
        prev = end;
    }
    slices
}

#[cfg(test)]
mod tests {
    #[cfg(feature = "multithreading")]
    use super::split_interior;
    use super::split_rows;

    #[test]
    fn rows_split_into_three_disjoint_bands() {
        let mut buf = vec![0_u8; 10 * 4];
        let (top, interior, bottom) = split_rows(&mut buf, 4, 2, 6);
        assert_eq!((top.len(), interior.len(), bottom.len()), (8, 24, 8));
    }

    #[cfg(feature = "multithreading")]
    #[test]
    fn interior_partition_covers_every_row_once() {
        let stride = 4;
        let mut buf = vec![0_u8; 8 * stride];
        let slices = split_interior(&mut buf, stride, 2, 10, 3);

        assert_eq!(slices.len(), 3);
        let mut expected_start = 2;
        let mut total = 0;
        for (start, end, rows) in &slices {
            assert_eq!(*start, expected_start);
            assert_eq!(rows.len(), usize::from(end - start) * stride);
            expected_start = *end;
            total += usize::from(end - start);
        }
        assert_eq!(expected_start, 10);
        assert_eq!(total, 8);
    }

    #[cfg(feature = "multithreading")]
    #[test]
    fn more_workers_than_rows_degrades_gracefully() {
        let stride = 2;
        let mut buf = vec![0_u8; 3 * stride];
        let slices = split_interior(&mut buf, stride, 0, 3, 16);
        assert_eq!(slices.len(), 3);
        assert!(slices.iter().all(|(start, end, _)| end - start == 1));
    }
}
