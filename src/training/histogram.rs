//! Histogram construction kernels.
//!
//! A node's histogram is one accumulator per active bin id, filled from the
//! node's rows. Two code paths share the same result:
//!
//! - **Sequential**: small nodes are accumulated on the calling thread.
//! - **Strided parallel**: `thread_count` workers each own a private
//!   histogram and a private totals accumulator (cached across builds in
//!   [`HistogramScratch`]); worker `t` processes rows `t, t + T, t + 2T, …`.
//!   After the fork-join region, totals reduce in thread-id order and bins
//!   reduce thread-ordered in parallel across bins, so the result is
//!   identical for any scheduling of the workers.
//!
//! After accumulation, a fold-in pass accounts for rows that did not list a
//! feature at all: for each used feature, `total − Σ bins(feature)` is added
//! to the feature's null bin. The pass runs in parallel across features,
//! each feature owning a disjoint contiguous range of the histogram.
//!
//! Deriving a sibling histogram by subtraction (`parent − built child`)
//! lives here as well.

use rayon::prelude::*;

use super::problem::BinnedProblem;
use super::stats::GradStats;
use super::NO_SLOT;

/// Cached per-thread accumulation buffers for the parallel build path.
#[derive(Debug)]
pub(crate) struct HistogramScratch<S> {
    /// Private histograms, flattened `[thread][hist_size]`.
    hists: Vec<S>,
    /// Private totals, one per thread.
    totals: Vec<S>,
    hist_size: usize,
}

impl<S: GradStats> HistogramScratch<S> {
    pub(crate) fn new() -> Self {
        Self {
            hists: Vec::new(),
            totals: Vec::new(),
            hist_size: 0,
        }
    }

    /// Make sure the buffers match the requested shape, reusing the
    /// allocation when they already do.
    fn ensure(&mut self, thread_count: usize, hist_size: usize, value_size: usize) {
        let shape_matches = self.hist_size == hist_size
            && self.totals.len() == thread_count
            && self
                .totals
                .first()
                .map_or(thread_count == 0, |s| s.value_size() == value_size);
        if shape_matches {
            self.hists.iter_mut().for_each(S::erase);
            self.totals.iter_mut().for_each(S::erase);
        } else {
            self.hists = vec![S::with_size(value_size); thread_count * hist_size];
            self.totals = vec![S::with_size(value_size); thread_count];
            self.hist_size = hist_size;
        }
    }
}

/// Accumulate one row's sparse bin list into a histogram.
///
/// Bin ids that are not mapped into the active layout (constant features)
/// are skipped.
#[inline]
fn add_vector<S: GradStats>(
    ids: &[usize],
    id_pos: &[usize],
    gradients: &[f64],
    hessians: &[f64],
    weights: &[f64],
    row: usize,
    hist: &mut [S],
) {
    for &id in ids {
        let slot = id_pos[id];
        if slot != NO_SLOT {
            hist[slot].add_sample(gradients, hessians, weights, row);
        }
    }
}

/// Fill `hist` and `total` from the given rows.
///
/// `hist` must be an active-layout slot of `id_pos`-mapped bins; both it and
/// `total` are zeroed first. `rows` is the node's slice of the vector-set
/// permutation.
#[allow(clippy::too_many_arguments)]
pub(crate) fn build_histogram<S: GradStats>(
    problem: &BinnedProblem,
    id_pos: &[usize],
    rows: &[u32],
    gradients: &[f64],
    hessians: &[f64],
    weights: &[f64],
    value_size: usize,
    thread_count: usize,
    scratch: &mut HistogramScratch<S>,
    hist: &mut [S],
    total: &mut S,
) {
    hist.iter_mut().for_each(S::erase);
    total.erase();
    let hist_size = hist.len();

    let parallel = rows.len() > 4 * thread_count && hist_size > 0 && thread_count > 1;
    if parallel {
        scratch.ensure(thread_count, hist_size, value_size);

        rayon::scope(|scope| {
            for (t, (thread_hist, thread_total)) in scratch
                .hists
                .chunks_mut(hist_size)
                .zip(scratch.totals.iter_mut())
                .enumerate()
            {
                scope.spawn(move |_| {
                    let mut i = t;
                    while i < rows.len() {
                        let row = rows[i] as usize;
                        add_vector(
                            problem.vector_ids(row),
                            id_pos,
                            gradients,
                            hessians,
                            weights,
                            row,
                            thread_hist,
                        );
                        thread_total.add_sample(gradients, hessians, weights, row);
                        i += thread_count;
                    }
                });
            }
        });

        // Reduction order is fixed (thread 0, 1, …) so the result does not
        // depend on worker scheduling.
        for thread_total in &scratch.totals {
            total.add(thread_total);
        }
        let thread_hists = &scratch.hists;
        hist.par_iter_mut().enumerate().for_each(|(bin, target)| {
            for t in 0..thread_count {
                target.add(&thread_hists[t * hist_size + bin]);
            }
        });
    } else {
        for &row in rows {
            let row = row as usize;
            add_vector(
                problem.vector_ids(row),
                id_pos,
                gradients,
                hessians,
                weights,
                row,
                hist,
            );
            total.add_sample(gradients, hessians, weights, row);
        }
    }

    fold_in_null_values(problem, hist, total);
}

/// Add the implied contribution of absent values to each feature's null bin.
///
/// Rows that list no bin of a feature still belong to one of its buckets:
/// `total − Σ bins(feature)` is exactly their aggregate. Runs after the
/// inter-thread reduction; features own disjoint contiguous histogram
/// ranges, so the pass parallelizes across features.
fn fold_in_null_values<S: GradStats>(problem: &BinnedProblem, hist: &mut [S], total: &S) {
    let pos = problem.feature_pos();

    let mut chunks = Vec::with_capacity(problem.used_features().len());
    let mut rest = hist;
    for &feature in problem.used_features() {
        let span = pos[feature + 1] - pos[feature];
        let (bins, tail) = rest.split_at_mut(span);
        let null_slot = problem.null_id(feature) - pos[feature];
        chunks.push((bins, null_slot));
        rest = tail;
    }
    debug_assert!(rest.is_empty());

    chunks.into_par_iter().for_each(|(bins, null_slot)| {
        let mut null_stats = total.clone();
        for bin in bins.iter() {
            null_stats.sub(bin);
        }
        bins[null_slot].add(&null_stats);
    });
}

/// Subtract a built child's histogram from its parent's slot, turning the
/// parent slot into the sibling's histogram.
pub(crate) fn subtract_histogram<S: GradStats>(parent: &mut [S], child: &[S]) {
    debug_assert_eq!(parent.len(), child.len());
    for (p, c) in parent.iter_mut().zip(child) {
        p.sub(c);
    }
}
