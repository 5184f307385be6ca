/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Deterministic row-stripe partitioning for parallel kernels.
//!
//! Every parallel kernel in the workspace derives its work decomposition
//! from [`stripe_height`], so for a fixed parallelism degree `k` the stripe
//! boundaries (and therefore the floating point reduction order) are
//! identical from run to run.

use std::ops::Range;

/// The number of rows per stripe when `nrows` rows are split into (up to)
/// `k` stripes.
///
/// A `k` of zero is treated as one. Every stripe except possibly the last
/// has exactly this height.
pub fn stripe_height(nrows: usize, k: usize) -> usize {
    nrows.div_ceil(k.max(1)).max(1)
}

/// Iterate the row ranges covering `0..nrows` in stripes of
/// [`stripe_height`] rows.
pub fn row_stripes(nrows: usize, k: usize) -> impl Iterator<Item = Range<usize>> {
    let height = stripe_height(nrows, k);
    (0..nrows.div_ceil(height).max(if nrows == 0 { 0 } else { 1 }))
        .map(move |i| i * height..((i + 1) * height).min(nrows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stripes_cover_all_rows_exactly_once() {
        for nrows in [1usize, 2, 7, 16, 100, 101] {
            for k in [1usize, 2, 3, 8, 200] {
                let mut covered = vec![0u32; nrows];
                for range in row_stripes(nrows, k) {
                    for r in range {
                        covered[r] += 1;
                    }
                }
                assert!(
                    covered.iter().all(|&c| c == 1),
                    "nrows={nrows} k={k}: {covered:?}"
                );
            }
        }
    }

    #[test]
    fn stripe_count_bounded_by_k() {
        for nrows in [1usize, 7, 64, 1000] {
            for k in [1usize, 2, 5, 8] {
                assert!(row_stripes(nrows, k).count() <= k, "nrows={nrows} k={k}");
            }
        }
    }

    #[test]
    fn empty_input_yields_no_stripes() {
        assert_eq!(row_stripes(0, 4).count(), 0);
    }

    #[test]
    fn zero_k_is_serial() {
        let stripes: Vec<_> = row_stripes(10, 0).collect();
        assert_eq!(stripes, vec![0..10]);
    }
}
