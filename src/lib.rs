//! histree: histogram-based regression tree building for gradient boosting.
//!
//! This crate implements the core of a gradient boosted decision tree
//! trainer: given per-row gradient/hessian statistics over an already-binned
//! dataset, it grows a single regression tree by recursive best-split search
//! over per-node histograms.
//!
//! The surrounding framework (feature binning, the boosting schedule, model
//! persistence, inference) is expected to live upstream and downstream of
//! this crate; the hand-off points are [`training::BinnedProblem`] on the way
//! in and [`trees::RegressionTree`] on the way out.

pub mod testing;
pub mod training;
pub mod trees;
