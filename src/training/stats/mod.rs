//! Statistics policies for split evaluation.
//!
//! The tree builder is generic over a [`GradStats`] policy that owns the
//! per-node accumulator: how gradient/hessian/weight triples are summed, how
//! the regularized leaf criterion is computed, and how leaf values are
//! emitted. Two policies are provided:
//!
//! - [`ScalarStats`]: scalar gradients and hessians (single-output
//!   regression, the common case)
//! - [`VectorStats`]: per-output gradient/hessian vectors (multi-output
//!   regression with one shared tree structure)
//!
//! Gradients and hessians are passed as flat row-major slices with stride
//! `value_size`; weights carry one entry per row.

mod multi;
mod single;

pub use multi::VectorStats;
pub use single::ScalarStats;

/// Soft thresholding for the L1 penalty.
///
/// Returns `g - l1` if `g > l1`, `g + l1` if `g < -l1`, and `0` otherwise.
#[inline]
pub(crate) fn soft_threshold(g: f64, l1: f64) -> f64 {
    if g > l1 {
        g - l1
    } else if g < -l1 {
        g + l1
    } else {
        0.0
    }
}

/// Per-node accumulator of gradient/hessian/weight statistics.
///
/// All operations are commutative-associative sums, so accumulators can be
/// built per worker thread and reduced in a fixed order, and a sibling's
/// statistics can be derived by subtraction from the parent.
pub trait GradStats: Clone + Send + Sync {
    /// Create a zeroed accumulator for the given prediction dimensionality.
    fn with_size(value_size: usize) -> Self;

    /// Prediction dimensionality of this accumulator.
    fn value_size(&self) -> usize;

    /// Reset to zero.
    fn erase(&mut self);

    /// Accumulate one training row.
    ///
    /// `gradients` and `hessians` are row-major with stride `value_size`;
    /// `weights` has one entry per row.
    fn add_sample(&mut self, gradients: &[f64], hessians: &[f64], weights: &[f64], row: usize);

    /// Accumulate another accumulator over disjoint rows.
    fn add(&mut self, other: &Self);

    /// Remove another accumulator over a subset of this one's rows.
    fn sub(&mut self, other: &Self);

    /// Total hessian mass, summed over outputs.
    fn total_hessian(&self) -> f64;

    /// Total row weight.
    fn total_weight(&self) -> f64;

    /// Regularized objective value of treating this set as a leaf.
    fn calc_criterion(&self, l1: f64, l2: f64) -> f64;

    /// Emit the leaf prediction, one value per output.
    ///
    /// `out.len()` must equal [`value_size`](Self::value_size).
    fn leaf_value(&self, out: &mut [f64]);

    /// Fold a saved split candidate into this realized child.
    ///
    /// Outputs frozen in `saved` (those that failed the split guards when the
    /// parent's split was scored) are copied over so that descendants keep
    /// predicting the value the output settled at. A no-op for scalar stats.
    fn nullify_settled(&mut self, saved: &Self);

    /// Score a candidate split.
    ///
    /// Returns `false` when the candidate violates the minimum-hessian or
    /// minimum-weight guards; otherwise writes the absolute post-split
    /// objective (not the improvement over the parent) into `criterion`.
    /// `left` and `right` may be adjusted in place to record outputs that
    /// settle at this split.
    #[allow(clippy::too_many_arguments)]
    fn split_criterion(
        criterion: &mut f64,
        left: &mut Self,
        right: &mut Self,
        parent: &Self,
        l1: f64,
        l2: f64,
        min_hessian: f64,
        min_weight: f64,
        dense_boost: f64,
    ) -> bool;
}
