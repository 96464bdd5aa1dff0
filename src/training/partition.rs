//! In-place partition of a node's vector set.
//!
//! Applying a split reorders the node's contiguous slice of the vector-set
//! permutation so the left child's rows come first. Side decisions are
//! computed in parallel into a reusable mark buffer (one flag per position),
//! then a sequential two-pointer sweep compacts left-bound rows to the front,
//! swapping rows and marks together on each inversion.

use rayon::prelude::*;

use super::problem::BinnedProblem;

/// Decide the side of one row for the split at `split_id`.
///
/// The row's effective bin id for the split feature is the largest listed id
/// below the feature's range end, or the feature's null id when the row does
/// not list the feature; ids at or below the split id go left.
#[inline]
fn goes_left(problem: &BinnedProblem, row: usize, split_id: usize, lower: usize, upper: usize, null_id: usize) -> bool {
    let ids = problem.vector_ids(row);
    let p = ids.partition_point(|&id| id < upper);
    let effective = if p == 0 || ids[p - 1] < lower {
        null_id
    } else {
        ids[p - 1]
    };
    effective <= split_id
}

/// Partition `rows` in place around `split_id`; returns the left-side count.
///
/// `marks` is a caller-owned scratch buffer reused across splits.
pub(crate) fn partition_rows(
    problem: &BinnedProblem,
    rows: &mut [u32],
    split_id: usize,
    marks: &mut Vec<bool>,
) -> usize {
    let feature = problem.feature_of(split_id);
    let lower = problem.feature_pos()[feature];
    let upper = problem.feature_pos()[feature + 1];
    let null_id = problem.null_id(feature);

    marks.clear();
    marks.resize(rows.len(), false);
    marks
        .par_iter_mut()
        .zip(rows.par_iter())
        .for_each(|(mark, &row)| {
            *mark = goes_left(problem, row as usize, split_id, lower, upper, null_id);
        });

    let mut left = 0;
    let mut right = rows.len();
    while left < right {
        if marks[left] {
            left += 1;
        } else if !marks[right - 1] {
            right -= 1;
        } else {
            rows.swap(left, right - 1);
            marks.swap(left, right - 1);
            left += 1;
            right -= 1;
        }
    }
    left
}
