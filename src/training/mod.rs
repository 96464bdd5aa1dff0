//! Tree building infrastructure.
//!
//! This module provides everything needed to grow a single regression tree
//! from precomputed gradient/hessian statistics over a binned dataset:
//!
//! - [`BinnedProblem`], [`ProblemBuilder`]: read-only view of the binned
//!   dataset (sparse per-row bin-id lists, per-feature bin layout)
//! - [`GradStats`], [`ScalarStats`], [`VectorStats`]: the statistics policy
//!   the builder is generic over (single- and multi-output regression)
//! - [`HistogramArena`]: fixed pool of per-node histograms
//! - [`TreeBuilder`], [`TreeBuilderParams`]: the depth-first tree driver
//! - [`SplitLogger`]: optional per-split decision log
//!
//! # Workflow
//!
//! ```ignore
//! let problem = /* ProblemBuilder::new(..) + features + rows */;
//! let mut builder = TreeBuilder::<ScalarStats>::new(params, None, 1)?;
//! let tree = builder.build(&problem, &gradients, &hessians, &weights);
//! ```

mod arena;
mod builder;
mod histogram;
mod logger;
mod params;
mod partition;
mod problem;
mod split;
pub mod stats;

pub use arena::HistogramArena;
pub use builder::TreeBuilder;
pub use logger::SplitLogger;
pub use params::{ParamsError, TreeBuilderParams};
pub use problem::{BinnedProblem, ProblemBuilder};
pub use stats::{GradStats, ScalarStats, VectorStats};

/// Sentinel for bin ids that are not mapped into the active histogram layout.
///
/// Bin ids belonging to features with a single bin (constant features) stay
/// unmapped; their occurrences in row data are skipped during accumulation.
pub(crate) const NO_SLOT: usize = usize::MAX;
