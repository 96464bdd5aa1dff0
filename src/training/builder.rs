//! Depth-first tree driver.
//!
//! [`TreeBuilder`] owns the node array, the vector-set permutation, the DFS
//! stack and the histogram arena, and orchestrates the build: seed the root,
//! evaluate a split for the node on top of the stack, partition its rows in
//! place, build the smaller child's histogram and derive the sibling by
//! subtraction into the parent's slot. Depth-first order bounds live
//! histograms to one per level plus the current frontier pair, which is why
//! an arena of `max_tree_depth + 1` slots suffices.
//!
//! After expansion an optional bottom-up pruning pass collapses parents
//! whose two leaf children do not justify their combined criterion, and a
//! final recursive pass emits the output [`RegressionTree`].

use std::io::Write;

use super::arena::HistogramArena;
use super::histogram::{self, HistogramScratch};
use super::logger::SplitLogger;
use super::params::{ParamsError, TreeBuilderParams};
use super::partition::partition_rows;
use super::problem::BinnedProblem;
use super::split::{self, BestSplit, ThreadCandidate};
use super::stats::GradStats;
use super::NO_SLOT;
use crate::trees::{RegressionTree, TreeNode};

/// A node of the tree under construction.
#[derive(Debug, Clone)]
pub(crate) struct BuildNode<S> {
    /// Depth of the node; the root is level 0.
    pub level: usize,
    /// Start of the node's slice of the vector-set permutation.
    pub vec_ptr: usize,
    /// Length of the node's slice.
    pub vec_size: usize,
    /// Arena offset of the node's histogram, while one is attached.
    pub hist: Option<usize>,
    /// Aggregated statistics over the node's rows.
    pub stats: S,
    /// Bin id this node splits on; `None` for leaves.
    pub split_id: Option<usize>,
    pub left: Option<usize>,
    pub right: Option<usize>,
    /// Prospective child statistics saved when the split was scored; used
    /// for leaf values when descendants are pruned or fail to split.
    pub left_stats: S,
    pub right_stats: S,
}

impl<S: GradStats> BuildNode<S> {
    fn new(level: usize, vec_ptr: usize, vec_size: usize, value_size: usize) -> Self {
        Self {
            level,
            vec_ptr,
            vec_size,
            hist: None,
            stats: S::with_size(value_size),
            split_id: None,
            left: None,
            right: None,
            left_stats: S::with_size(value_size),
            right_stats: S::with_size(value_size),
        }
    }
}

/// Histogram-based regression tree builder, generic over the statistics
/// policy.
///
/// A builder instance is reusable: scratch buffers survive across
/// [`build`](Self::build) calls.
pub struct TreeBuilder<S: GradStats> {
    params: TreeBuilderParams,
    logger: SplitLogger,
    prediction_size: usize,

    nodes: Vec<BuildNode<S>>,
    stack: Vec<usize>,
    vector_set: Vec<u32>,
    arena: HistogramArena<S>,
    /// Local histogram slot per global bin id, `NO_SLOT` for inactive bins.
    id_pos: Vec<usize>,
    hist_size: usize,

    // Cached kernel scratch, reused across builds.
    scratch: HistogramScratch<S>,
    candidates: Vec<ThreadCandidate<S>>,
    marks: Vec<bool>,
}

impl<S: GradStats> TreeBuilder<S> {
    /// Create a builder.
    ///
    /// `log_sink` enables verbose per-split logging when present;
    /// `prediction_size` is the leaf value dimensionality (1 for
    /// [`ScalarStats`](super::ScalarStats)).
    pub fn new(
        params: TreeBuilderParams,
        log_sink: Option<Box<dyn Write>>,
        prediction_size: usize,
    ) -> Result<Self, ParamsError> {
        params.validate()?;
        assert!(prediction_size > 0);
        Ok(Self {
            params,
            logger: SplitLogger::new(log_sink),
            prediction_size,
            nodes: Vec::new(),
            stack: Vec::new(),
            vector_set: Vec::new(),
            arena: HistogramArena::new(0, 0, prediction_size),
            id_pos: Vec::new(),
            hist_size: 0,
            scratch: HistogramScratch::new(),
            candidates: Vec::new(),
            marks: Vec::new(),
        })
    }

    /// The builder's configuration.
    pub fn params(&self) -> &TreeBuilderParams {
        &self.params
    }

    /// The histogram arena; exposed so callers can account for histogram
    /// memory (`capacity * hist_size` accumulators, all slots free between
    /// builds).
    pub fn arena(&self) -> &HistogramArena<S> {
        &self.arena
    }

    /// The vector-set permutation as left by the last build.
    pub fn row_permutation(&self) -> &[u32] {
        &self.vector_set
    }

    /// Build one regression tree.
    ///
    /// `gradients` and `hessians` are row-major with stride
    /// `prediction_size`; `weights` carries one entry per row. The tree may
    /// degenerate to a single leaf when no split is beneficial at the root.
    pub fn build(
        &mut self,
        problem: &BinnedProblem,
        gradients: &[f64],
        hessians: &[f64],
        weights: &[f64],
    ) -> RegressionTree {
        let rows = problem.vector_count();
        assert_eq!(gradients.len(), hessians.len());
        assert_eq!(gradients.len(), rows * self.prediction_size);
        assert_eq!(weights.len(), rows);
        assert!(rows > 0, "cannot build a tree over zero rows");

        self.logger.start();
        self.init_vector_set(rows);
        self.init_hist_layout(problem);

        // Seed the root with every row and a fresh histogram.
        let mut root = BuildNode::new(0, 0, rows, self.prediction_size);
        root.hist = Some(self.arena.alloc());
        self.nodes.clear();
        self.nodes.push(root);
        self.build_node_histogram(problem, 0, gradients, hessians, weights);

        self.stack.clear();
        self.stack.push(0);
        while let Some(node) = self.stack.pop() {
            let criterion = self.nodes[node]
                .stats
                .calc_criterion(self.params.l1_reg, self.params.l2_reg);
            match self.evaluate_split(problem, node) {
                Some(best) => {
                    self.logger.split(
                        problem.feature_index(best.id),
                        problem.cut(best.id),
                        criterion,
                    );
                    self.nodes[node].split_id = Some(best.id);
                    self.nodes[node].left_stats = best.left;
                    self.nodes[node].right_stats = best.right;

                    let (left, right) = self.apply_split(problem, node);
                    self.nodes[node].left = Some(left);
                    self.stack.push(left);
                    self.nodes[node].right = Some(right);
                    self.stack.push(right);

                    self.build_child_histograms(
                        problem, node, left, right, gradients, hessians, weights,
                    );
                }
                None => {
                    self.logger.const_node(criterion);
                    if let Some(offset) = self.nodes[node].hist.take() {
                        self.arena.release(offset);
                    }
                    self.nodes[node].split_id = None;
                }
            }
        }
        self.logger.finish();

        if self.params.prune_criterion != 0.0 {
            self.prune(0);
        }

        let mut out = Vec::with_capacity(self.nodes.len());
        self.emit(0, problem, &mut out);
        RegressionTree::from_nodes(out)
    }

    /// All rows start out assigned to the root.
    fn init_vector_set(&mut self, rows: usize) {
        self.vector_set.clear();
        self.vector_set.extend(0..rows as u32);
    }

    /// Lay out the active histogram: one slot per bin of every used feature,
    /// assigned contiguously in used-feature order. Bins of constant
    /// features stay unmapped and are ignored wherever rows list them.
    fn init_hist_layout(&mut self, problem: &BinnedProblem) {
        self.id_pos.clear();
        self.id_pos.resize(problem.bin_count(), NO_SLOT);
        let mut size = 0;
        for &feature in problem.used_features() {
            for id in problem.feature_pos()[feature]..problem.feature_pos()[feature + 1] {
                self.id_pos[id] = size;
                size += 1;
            }
        }
        self.hist_size = size;
        // Depth-first expansion holds at most one histogram per level plus
        // the frontier pair, so depth + 1 slots always suffice.
        self.arena = HistogramArena::new(
            self.params.max_tree_depth + 1,
            size,
            self.prediction_size,
        );
    }

    /// Fill the node's histogram and aggregate its statistics.
    fn build_node_histogram(
        &mut self,
        problem: &BinnedProblem,
        node: usize,
        gradients: &[f64],
        hessians: &[f64],
        weights: &[f64],
    ) {
        let (offset, vec_ptr, vec_size) = {
            let n = &self.nodes[node];
            (n.hist.expect("node has no histogram"), n.vec_ptr, n.vec_size)
        };
        let mut total = S::with_size(self.prediction_size);
        {
            let rows = &self.vector_set[vec_ptr..vec_ptr + vec_size];
            let hist = self.arena.slot_mut(offset);
            histogram::build_histogram(
                problem,
                &self.id_pos,
                rows,
                gradients,
                hessians,
                weights,
                self.prediction_size,
                self.params.thread_count,
                &mut self.scratch,
                hist,
                &mut total,
            );
        }
        self.nodes[node].stats = total;
    }

    /// Score a split for the node, or `None` when it must stay a leaf.
    fn evaluate_split(&mut self, problem: &BinnedProblem, node: usize) -> Option<BestSplit<S>> {
        if self.nodes[node].level >= self.params.max_tree_depth {
            return None;
        }
        if let Some(limit) = self.params.max_nodes_count {
            if self.nodes.len() + 2 > limit {
                return None;
            }
        }
        let n = &self.nodes[node];
        let hist = self.arena.slot(n.hist.expect("node has no histogram"));
        split::find_best_split(
            problem,
            &self.id_pos,
            hist,
            &n.stats,
            &self.params,
            self.prediction_size,
            &mut self.candidates,
        )
    }

    /// Partition the node's rows in place and append the two children.
    fn apply_split(&mut self, problem: &BinnedProblem, node: usize) -> (usize, usize) {
        let (vec_ptr, vec_size, level, split_id) = {
            let n = &self.nodes[node];
            (n.vec_ptr, n.vec_size, n.level, n.split_id.expect("no split chosen"))
        };

        let rows = &mut self.vector_set[vec_ptr..vec_ptr + vec_size];
        let left_count = partition_rows(problem, rows, split_id, &mut self.marks);
        // An admitted split always separates rows, so neither side is empty.
        assert!(left_count > 0 && left_count < vec_size);

        let left = BuildNode::new(level + 1, vec_ptr, left_count, self.prediction_size);
        self.nodes.push(left);
        let left_index = self.nodes.len() - 1;
        let right = BuildNode::new(
            level + 1,
            vec_ptr + left_count,
            vec_size - left_count,
            self.prediction_size,
        );
        self.nodes.push(right);
        (left_index, left_index + 1)
    }

    /// Build the smaller child's histogram and derive the sibling by
    /// subtraction, reusing the parent's arena slot for the sibling.
    #[allow(clippy::too_many_arguments)]
    fn build_child_histograms(
        &mut self,
        problem: &BinnedProblem,
        node: usize,
        left: usize,
        right: usize,
        gradients: &[f64],
        hessians: &[f64],
        weights: &[f64],
    ) {
        let (small, large) = if self.nodes[left].vec_size < self.nodes[right].vec_size {
            (left, right)
        } else {
            (right, left)
        };

        let small_offset = self.arena.alloc();
        self.nodes[small].hist = Some(small_offset);
        self.build_node_histogram(problem, small, gradients, hessians, weights);

        let parent_offset = self.nodes[node].hist.take().expect("parent lost histogram");
        {
            let (parent_slot, small_slot) = self.arena.slot_pair_mut(parent_offset, small_offset);
            histogram::subtract_histogram(parent_slot, small_slot);
        }
        self.nodes[large].hist = Some(parent_offset);
        let mut large_stats = self.nodes[node].stats.clone();
        large_stats.sub(&self.nodes[small].stats);
        self.nodes[large].stats = large_stats;

        // Fold the saved candidates into the realized children so outputs
        // frozen at this split keep their settled values downstream.
        let left_saved = self.nodes[node].left_stats.clone();
        self.nodes[left].stats.nullify_settled(&left_saved);
        let right_saved = self.nodes[node].right_stats.clone();
        self.nodes[right].stats.nullify_settled(&right_saved);
    }

    /// Bottom-up pruning. Returns true when the node is (or became) a leaf.
    ///
    /// Only parents whose both children collapsed are candidates; a subtree
    /// that kept one side intact is never re-examined.
    fn prune(&mut self, node: usize) -> bool {
        let Some(left) = self.nodes[node].left else {
            debug_assert!(self.nodes[node].right.is_none());
            return true;
        };
        let right = self.nodes[node].right.expect("internal node lost a child");

        if !self.prune(left) || !self.prune(right) {
            return false;
        }

        let (l1, l2) = (self.params.l1_reg, self.params.l2_reg);
        let one_node = self.nodes[node].stats.calc_criterion(l1, l2);
        let split = self.nodes[left].stats.calc_criterion(l1, l2)
            + self.nodes[right].stats.calc_criterion(l1, l2);
        if split - one_node < self.params.prune_criterion {
            self.nodes[node].left = None;
            self.nodes[node].right = None;
            self.nodes[node].split_id = None;
            return true;
        }
        false
    }

    /// Emit the output tree, root first.
    fn emit(&self, node: usize, problem: &BinnedProblem, out: &mut Vec<TreeNode>) -> u32 {
        let index = out.len() as u32;
        match self.nodes[node].split_id {
            None => {
                let mut value = vec![0.0; self.prediction_size];
                self.nodes[node].stats.leaf_value(&mut value);
                out.push(TreeNode::Leaf(value.into_boxed_slice()));
            }
            Some(split_id) => {
                out.push(TreeNode::Leaf(Box::new([]))); // patched below
                let left = self.emit(self.nodes[node].left.unwrap(), problem, out);
                let right = self.emit(self.nodes[node].right.unwrap(), problem, out);
                out[index as usize] = TreeNode::Split {
                    feature: problem.feature_index(split_id),
                    threshold: problem.cut(split_id),
                    left,
                    right,
                };
            }
        }
        index
    }

    #[cfg(test)]
    pub(crate) fn nodes(&self) -> &[BuildNode<S>] {
        &self.nodes
    }
}

impl<S: GradStats> std::fmt::Debug for TreeBuilder<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeBuilder")
            .field("params", &self.params)
            .field("prediction_size", &self.prediction_size)
            .field("hist_size", &self.hist_size)
            .field("nodes", &self.nodes.len())
            .finish()
    }
}
