//! Tree builder configuration.

use thiserror::Error;

/// Invalid tree builder configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ParamsError {
    #[error("max_tree_depth must be positive")]
    ZeroDepth,
    #[error("max_nodes_count must be positive when set")]
    ZeroNodeLimit,
    #[error("thread_count must be positive")]
    ZeroThreads,
    #[error("max_bins must be greater than 1, got {0}")]
    TooFewBins(usize),
    #[error("min_subset_hessian must be positive, got {0}")]
    NonPositiveHessian(f64),
    #[error("{name} must be non-negative, got {value}")]
    Negative { name: &'static str, value: f64 },
}

/// Parameters controlling a single tree build.
#[derive(Debug, Clone)]
pub struct TreeBuilderParams {
    /// L1 regularization factor applied to gradient sums in the criterion.
    pub l1_reg: f64,
    /// L2 regularization factor applied to hessian sums in the criterion.
    pub l2_reg: f64,
    /// Minimum hessian mass required in each child of an admissible split.
    pub min_subset_hessian: f64,
    /// Minimum total row weight required in each child of an admissible split.
    pub min_subset_weight: f64,
    /// Number of workers used by the parallel kernels.
    pub thread_count: usize,
    /// Hard depth limit; also sizes the histogram arena.
    pub max_tree_depth: usize,
    /// Hard node-count limit, `None` for unlimited.
    pub max_nodes_count: Option<usize>,
    /// Maximum histogram width per feature; enforced when the binned
    /// problem is assembled.
    pub max_bins: usize,
    /// Pruning threshold; `0.0` disables pruning entirely.
    pub prune_criterion: f64,
    /// Reward factor for splits that improve many outputs at once
    /// (multi-output policy only).
    pub dense_boost: f64,
}

impl Default for TreeBuilderParams {
    fn default() -> Self {
        Self {
            l1_reg: 0.0,
            l2_reg: 1.0,
            min_subset_hessian: 1e-3,
            min_subset_weight: 0.0,
            thread_count: rayon::current_num_threads(),
            max_tree_depth: 6,
            max_nodes_count: None,
            max_bins: 256,
            prune_criterion: 0.0,
            dense_boost: 0.0,
        }
    }
}

impl TreeBuilderParams {
    /// Check the configuration invariants.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.max_tree_depth == 0 {
            return Err(ParamsError::ZeroDepth);
        }
        if self.max_nodes_count == Some(0) {
            return Err(ParamsError::ZeroNodeLimit);
        }
        if self.thread_count == 0 {
            return Err(ParamsError::ZeroThreads);
        }
        if self.max_bins <= 1 {
            return Err(ParamsError::TooFewBins(self.max_bins));
        }
        if !(self.min_subset_hessian > 0.0) {
            return Err(ParamsError::NonPositiveHessian(self.min_subset_hessian));
        }
        for (name, value) in [
            ("l1_reg", self.l1_reg),
            ("l2_reg", self.l2_reg),
            ("min_subset_weight", self.min_subset_weight),
            ("prune_criterion", self.prune_criterion),
        ] {
            if !(value >= 0.0) {
                return Err(ParamsError::Negative { name, value });
            }
        }
        Ok(())
    }
}
