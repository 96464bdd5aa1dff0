//! Tree data structures.

pub mod node;

pub use node::{RegressionTree, TreeNode};
