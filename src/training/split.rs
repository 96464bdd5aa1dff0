//! Best-split search over a node's histogram.
//!
//! Every (feature, cut) candidate is scored under the regularized criterion
//! of the statistics policy. Features are dealt round-robin to
//! `thread_count` scan tasks; each task walks its features' bins in
//! ascending cut order, maintaining a running left accumulator and deriving
//! the right side as the complement of the node's totals. A candidate is
//! kept only when its criterion *strictly* exceeds the task's current best,
//! and the cross-task reduction breaks exact ties towards the smallest bin
//! id — together this makes the selected split independent of worker count
//! and scheduling.
//!
//! The gamma cost of adding a node is deliberately absent here; it is
//! accounted for by the pruning threshold instead.

use rayon::prelude::*;

use super::params::TreeBuilderParams;
use super::problem::BinnedProblem;
use super::stats::GradStats;

/// Best candidate found by one scan task.
#[derive(Debug, Clone)]
pub(crate) struct ThreadCandidate<S> {
    gain: f64,
    id: Option<usize>,
    left: S,
    right: S,
}

/// The split selected for a node.
#[derive(Debug, Clone)]
pub(crate) struct BestSplit<S> {
    /// Winning bin id; encodes both the feature and the cut.
    pub id: usize,
    /// Prospective left child statistics, saved at evaluation time.
    pub left: S,
    /// Prospective right child statistics, saved at evaluation time.
    pub right: S,
}

/// Scan all candidates and return the best admissible split, or `None` when
/// nothing strictly improves on keeping the node a leaf.
///
/// `hist` is the node's active-layout histogram slot; `candidates` is a
/// caller-owned buffer reused across invocations.
#[allow(clippy::too_many_arguments)]
pub(crate) fn find_best_split<S: GradStats>(
    problem: &BinnedProblem,
    id_pos: &[usize],
    hist: &[S],
    stats: &S,
    params: &TreeBuilderParams,
    value_size: usize,
    candidates: &mut Vec<ThreadCandidate<S>>,
) -> Option<BestSplit<S>> {
    let parent_criterion = stats.calc_criterion(params.l1_reg, params.l2_reg);
    let used = problem.used_features();
    let pos = problem.feature_pos();
    let threads = params.thread_count;

    (0..threads)
        .into_par_iter()
        .map(|task| {
            let mut best = ThreadCandidate {
                gain: parent_criterion,
                id: None,
                left: S::with_size(value_size),
                right: S::with_size(value_size),
            };
            let mut left = S::with_size(value_size);
            let mut right = S::with_size(value_size);
            let mut left_candidate = S::with_size(value_size);
            let mut right_candidate = S::with_size(value_size);

            let mut i = task;
            while i < used.len() {
                let feature = used[i];
                left.erase();
                for id in pos[feature]..pos[feature + 1] {
                    left.add(&hist[id_pos[id]]);
                    right.clone_from(stats);
                    right.sub(&left);
                    // The policy may adjust the candidates in place, so the
                    // running accumulators stay untouched.
                    left_candidate.clone_from(&left);
                    right_candidate.clone_from(&right);

                    let mut criterion = 0.0;
                    if !S::split_criterion(
                        &mut criterion,
                        &mut left_candidate,
                        &mut right_candidate,
                        stats,
                        params.l1_reg,
                        params.l2_reg,
                        params.min_subset_hessian,
                        params.min_subset_weight,
                        params.dense_boost,
                    ) {
                        continue;
                    }

                    if criterion > best.gain {
                        best.gain = criterion;
                        best.id = Some(id);
                        best.left.clone_from(&left_candidate);
                        best.right.clone_from(&right_candidate);
                    }
                }
                i += threads;
            }
            best
        })
        .collect_into_vec(candidates);

    // Thread-order reduction; equal gains resolve to the smallest bin id.
    let mut best_gain = parent_criterion;
    let mut best_index: Option<usize> = None;
    for i in 0..candidates.len() {
        let Some(id) = candidates[i].id else { continue };
        let better = match best_index {
            None => candidates[i].gain > best_gain,
            Some(b) => {
                candidates[i].gain > best_gain
                    || (candidates[i].gain == best_gain
                        && candidates[b].id.is_some_and(|current| id < current))
            }
        };
        if better {
            best_gain = candidates[i].gain;
            best_index = Some(i);
        }
    }

    best_index.map(|i| {
        let winner = &candidates[i];
        BestSplit {
            id: winner.id.unwrap(),
            left: winner.left.clone(),
            right: winner.right.clone(),
        }
    })
}
