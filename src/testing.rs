//! Testing utilities for histree.
//!
//! Assertion helpers shared by unit tests and the integration suite. The
//! module is compiled into the library so integration tests under `tests/`
//! can use it too.

use fixedbitset::FixedBitSet;

use crate::trees::{RegressionTree, TreeNode};

/// Default tolerance for floating point comparisons on leaf values.
pub const DEFAULT_TOLERANCE: f64 = 1e-9;

/// Assert that `indices` covers `0..len` exactly once each.
///
/// Used to check that a vector-set permutation is still a permutation and
/// that leaf row ranges partition the training set.
pub fn assert_exact_cover(indices: impl IntoIterator<Item = usize>, len: usize) {
    let mut seen = FixedBitSet::with_capacity(len);
    let mut count = 0usize;
    for index in indices {
        assert!(index < len, "index {index} out of range 0..{len}");
        assert!(!seen.contains(index), "index {index} appears twice");
        seen.insert(index);
        count += 1;
    }
    assert_eq!(count, len, "only {count} of {len} indices covered");
}

/// Assert that two trees have identical structure and near-identical leaf
/// values.
pub fn assert_trees_equivalent(a: &RegressionTree, b: &RegressionTree, tolerance: f64) {
    assert_eq!(a.node_count(), b.node_count(), "node counts differ");
    for index in 0..a.node_count() as u32 {
        match (a.node(index), b.node(index)) {
            (
                TreeNode::Split {
                    feature: fa,
                    threshold: ta,
                    left: la,
                    right: ra,
                },
                TreeNode::Split {
                    feature: fb,
                    threshold: tb,
                    left: lb,
                    right: rb,
                },
            ) => {
                assert_eq!(fa, fb, "node {index}: split feature differs");
                assert_eq!(ta, tb, "node {index}: threshold differs");
                assert_eq!((la, ra), (lb, rb), "node {index}: children differ");
            }
            (TreeNode::Leaf(va), TreeNode::Leaf(vb)) => {
                assert_eq!(va.len(), vb.len(), "node {index}: leaf arity differs");
                for (x, y) in va.iter().zip(vb.iter()) {
                    assert!(
                        (x - y).abs() <= tolerance,
                        "node {index}: leaf values {x} vs {y}"
                    );
                }
            }
            _ => panic!("node {index}: leaf/split mismatch"),
        }
    }
}
