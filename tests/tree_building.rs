//! End-to-end tree building scenarios.

use std::sync::{Arc, Mutex};

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use histree::testing::{assert_exact_cover, assert_trees_equivalent, DEFAULT_TOLERANCE};
use histree::training::{
    BinnedProblem, ProblemBuilder, ScalarStats, TreeBuilder, TreeBuilderParams, VectorStats,
};
use histree::trees::{RegressionTree, TreeNode};

// ============================================================================
// Helpers
// ============================================================================

/// Bucket a raw value: the first cut at or above the value wins.
fn bin_value(cuts: &[f32], value: f32) -> usize {
    let bin = cuts.partition_point(|&c| c < value);
    assert!(bin < cuts.len(), "value {value} above the last cut");
    bin
}

/// Assemble a problem from dense columns, omitting null bins per contract.
fn make_problem(columns: &[Vec<f32>], cuts: &[Vec<f32>]) -> BinnedProblem {
    let rows = columns[0].len();
    let mut builder = ProblemBuilder::new(256);
    let null_bins: Vec<usize> = cuts.iter().map(|c| bin_value(c, 0.0)).collect();
    for (feature, feature_cuts) in cuts.iter().enumerate() {
        builder.add_feature(feature as u32, feature_cuts, null_bins[feature]);
    }
    for row in 0..rows {
        let mut bins = Vec::new();
        for (feature, column) in columns.iter().enumerate() {
            let bin = bin_value(&cuts[feature], column[row]);
            if bin != null_bins[feature] {
                bins.push((feature, bin));
            }
        }
        builder.add_row(&bins);
    }
    builder.finish()
}

fn base_params(thread_count: usize) -> TreeBuilderParams {
    TreeBuilderParams {
        l1_reg: 0.0,
        l2_reg: 0.0,
        min_subset_hessian: 1e-6,
        min_subset_weight: 0.0,
        thread_count,
        max_tree_depth: 6,
        ..Default::default()
    }
}

fn build_scalar(
    params: TreeBuilderParams,
    problem: &BinnedProblem,
    gradients: &[f64],
) -> RegressionTree {
    let hessians = vec![1.0; gradients.len()];
    let weights = vec![1.0; gradients.len()];
    let mut builder = TreeBuilder::<ScalarStats>::new(params, None, 1).unwrap();
    builder.build(problem, gradients, &hessians, &weights)
}

/// 100 rows over 4 uniform features; the label is the sign of feature 3.
fn sign_dataset(seed: u64) -> (BinnedProblem, Vec<f64>) {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut columns = vec![Vec::with_capacity(100); 4];
    for column in columns.iter_mut() {
        for _ in 0..100 {
            column.push(rng.gen_range(-1.0f32..1.0));
        }
    }
    let grid: Vec<f32> = vec![-0.75, -0.5, -0.25, 0.0, 0.25, 0.5, 0.75, 1.0];
    let cuts = vec![grid.clone(); 4];
    let gradients: Vec<f64> = columns[3]
        .iter()
        .map(|&x| if x >= 0.0 { -1.0 } else { 1.0 })
        .collect();
    let problem = make_problem(&columns, &cuts);
    (problem, gradients)
}

/// Collects everything the builder logs.
#[derive(Clone, Default)]
struct SharedSink(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

// ============================================================================
// End-to-end scenarios
// ============================================================================

#[test]
fn binary_feature_splits_into_signed_leaves() {
    let columns = vec![vec![-1.0, -1.0, 1.0, 1.0]];
    let cuts = vec![vec![-1.0, 1.0]];
    let problem = make_problem(&columns, &cuts);

    let params = TreeBuilderParams {
        max_tree_depth: 1,
        ..base_params(1)
    };
    let tree = build_scalar(params, &problem, &[-1.0, -1.0, 1.0, 1.0]);

    assert_eq!(tree.leaf_count(), 2);
    match tree.root() {
        TreeNode::Split {
            feature, threshold, ..
        } => {
            assert_eq!(*feature, 0);
            assert_eq!(*threshold, -1.0);
        }
        TreeNode::Leaf(_) => panic!("root must split"),
    }
    assert_eq!(tree.predict(&[-1.0]), &[1.0]);
    assert_eq!(tree.predict(&[1.0]), &[-1.0]);
}

#[test]
fn constant_gradients_build_a_single_leaf() {
    let columns = vec![vec![-1.0, 1.0, -1.0, 1.0], vec![0.5, 0.5, 1.5, 1.5]];
    let cuts = vec![vec![-1.0, 1.0], vec![0.5, 1.5]];
    let problem = make_problem(&columns, &cuts);

    let tree = build_scalar(base_params(2), &problem, &[0.0; 4]);
    assert_eq!(tree.node_count(), 1);
    assert_eq!(tree.predict(&[1.0, 0.5]), &[0.0]);
}

#[test]
fn thread_counts_build_identical_trees() {
    let (problem, gradients) = sign_dataset(7);

    let params = TreeBuilderParams {
        max_tree_depth: 3,
        ..base_params(1)
    };
    let single = build_scalar(params.clone(), &problem, &gradients);
    let quad = build_scalar(
        TreeBuilderParams {
            thread_count: 4,
            ..params
        },
        &problem,
        &gradients,
    );

    assert_trees_equivalent(&single, &quad, 0.0);
    // The separating feature is recovered exactly.
    match single.root() {
        TreeNode::Split {
            feature, threshold, ..
        } => {
            assert_eq!(*feature, 3);
            assert_eq!(*threshold, 0.0);
        }
        TreeNode::Leaf(_) => panic!("root must split"),
    }
}

#[test]
fn repeated_builds_are_deterministic() {
    let (problem, gradients) = sign_dataset(21);
    let first = build_scalar(base_params(4), &problem, &gradients);
    let second = build_scalar(base_params(4), &problem, &gradients);
    assert_eq!(first, second);
}

#[test]
fn infinite_prune_threshold_collapses_everything() {
    let (problem, gradients) = sign_dataset(3);
    let params = TreeBuilderParams {
        prune_criterion: f64::INFINITY,
        ..base_params(2)
    };
    let tree = build_scalar(params, &problem, &gradients);
    assert_eq!(tree.node_count(), 1);
}

#[test]
fn prune_disabled_equals_negligible_threshold() {
    // Every realized split strictly improves the criterion, so the smallest
    // positive threshold prunes nothing; with 0.0 the pass is skipped.
    let (problem, gradients) = sign_dataset(11);
    let disabled = build_scalar(base_params(1), &problem, &gradients);
    let negligible = build_scalar(
        TreeBuilderParams {
            prune_criterion: f64::MIN_POSITIVE,
            ..base_params(1)
        },
        &problem,
        &gradients,
    );
    assert_eq!(disabled, negligible);
    assert!(disabled.leaf_count() > 1);
}

#[test]
fn pruning_is_monotonic_in_the_threshold() {
    let (problem, gradients) = sign_dataset(13);
    let mut previous = usize::MAX;
    for threshold in [0.0, 1.0, 10.0, 100.0, f64::INFINITY] {
        let tree = build_scalar(
            TreeBuilderParams {
                prune_criterion: threshold,
                ..base_params(2)
            },
            &problem,
            &gradients,
        );
        assert!(
            tree.node_count() <= previous,
            "threshold {threshold} grew the tree"
        );
        previous = tree.node_count();
    }
}

#[test]
fn absent_feature_is_never_chosen() {
    // Feature 1 is omitted by every row; its null bin absorbs everything,
    // so no cut of it can separate rows.
    let columns = vec![
        vec![-1.0, -1.0, -1.0, 1.0, 1.0, 1.0],
        vec![0.0; 6],
    ];
    let cuts = vec![vec![-1.0, 1.0], vec![0.0, 1.0]];
    let problem = make_problem(&columns, &cuts);

    let gradients = [-1.0, -1.0, 1.0, 1.0, -1.0, 1.0];
    let tree = build_scalar(base_params(1), &problem, &gradients);
    for index in 0..tree.node_count() as u32 {
        if let TreeNode::Split { feature, .. } = tree.node(index) {
            assert_ne!(*feature, 1, "absent feature chosen for a split");
        }
    }
}

#[test]
fn hessian_guard_rejects_every_split() {
    let columns = vec![vec![1.0, 1.0]];
    let cuts = vec![vec![0.0, 1.0]];
    let problem = make_problem(&columns, &cuts);

    let params = TreeBuilderParams {
        min_subset_hessian: 1.5,
        ..base_params(1)
    };
    let tree = build_scalar(params, &problem, &[1.0, -1.0]);
    assert_eq!(tree.node_count(), 1);
    assert_eq!(tree.predict(&[1.0]), &[0.0]);
}

// ============================================================================
// Structural properties
// ============================================================================

#[test]
fn depth_and_node_count_limits_hold() {
    let (problem, gradients) = sign_dataset(17);
    // Noisy gradients force deep trees when allowed.
    let noisy: Vec<f64> = gradients
        .iter()
        .enumerate()
        .map(|(i, g)| g + ((i % 3) as f64 - 1.0))
        .collect();
    let hessians = vec![1.0; 100];
    let weights = vec![1.0; 100];

    for depth in [1, 2, 4] {
        let params = TreeBuilderParams {
            max_tree_depth: depth,
            ..base_params(2)
        };
        let mut builder = TreeBuilder::<ScalarStats>::new(params, None, 1).unwrap();
        let tree = builder.build(&problem, &noisy, &hessians, &weights);
        assert!(tree.depth() <= depth, "depth {} > {depth}", tree.depth());
    }

    let params = TreeBuilderParams {
        max_nodes_count: Some(7),
        ..base_params(2)
    };
    let mut builder = TreeBuilder::<ScalarStats>::new(params, None, 1).unwrap();
    let tree = builder.build(&problem, &noisy, &hessians, &weights);
    assert!(tree.node_count() <= 7);
}

#[test]
fn permutation_and_arena_survive_a_build() {
    let (problem, gradients) = sign_dataset(29);
    let hessians = vec![1.0; 100];
    let weights = vec![1.0; 100];
    let mut builder = TreeBuilder::<ScalarStats>::new(base_params(4), None, 1).unwrap();
    let _ = builder.build(&problem, &gradients, &hessians, &weights);

    // Every training index still appears exactly once.
    assert_exact_cover(builder.row_permutation().iter().map(|&r| r as usize), 100);

    // The arena free list is restored to its full initial set of offsets.
    let arena = builder.arena();
    let mut offsets = arena.free_offsets().to_vec();
    offsets.sort_unstable();
    let expected: Vec<usize> = (0..arena.capacity())
        .map(|slot| slot * arena.hist_size())
        .collect();
    assert_eq!(offsets, expected);
}

#[test]
fn verbose_build_logs_every_decision() {
    let columns = vec![vec![-1.0, -1.0, 1.0, 1.0]];
    let cuts = vec![vec![-1.0, 1.0]];
    let problem = make_problem(&columns, &cuts);

    let sink = SharedSink::default();
    let params = TreeBuilderParams {
        max_tree_depth: 1,
        ..base_params(1)
    };
    let mut builder =
        TreeBuilder::<ScalarStats>::new(params, Some(Box::new(sink.clone())), 1).unwrap();
    let hessians = vec![1.0; 4];
    let weights = vec![1.0; 4];
    let _ = builder.build(&problem, &[-1.0, -1.0, 1.0, 1.0], &hessians, &weights);

    let text = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
    assert!(text.contains("Split result: index = 0 threshold = -1"));
    // Both children bottom out as const nodes.
    assert_eq!(
        text.matches("Split result: created const node.").count(),
        2
    );
}

// ============================================================================
// Multi-output policy
// ============================================================================

#[test]
fn multi_output_leaves_carry_one_value_per_output() {
    let columns = vec![vec![-1.0, -1.0, -1.0, -1.0, 1.0, 1.0, 1.0, 1.0]];
    let cuts = vec![vec![-1.0, 1.0]];
    let problem = make_problem(&columns, &cuts);

    // Output 0 follows the feature; output 1 has no signal at all.
    let mut gradients = Vec::new();
    let mut hessians = Vec::new();
    for row in 0..8 {
        gradients.push(if row < 4 { -1.0 } else { 1.0 });
        gradients.push(0.0);
        hessians.push(1.0);
        hessians.push(1.0);
    }
    let weights = vec![1.0; 8];

    let mut builder = TreeBuilder::<VectorStats>::new(base_params(1), None, 2).unwrap();
    let tree = builder.build(&problem, &gradients, &hessians, &weights);

    assert_eq!(tree.leaf_count(), 2);
    let left = tree.predict(&[-1.0]);
    let right = tree.predict(&[1.0]);
    assert!((left[0] - 1.0).abs() < DEFAULT_TOLERANCE);
    assert!((right[0] + 1.0).abs() < DEFAULT_TOLERANCE);
    assert!(left[1].abs() < DEFAULT_TOLERANCE);
    assert!(right[1].abs() < DEFAULT_TOLERANCE);
}

#[test]
fn multi_output_thread_invariance() {
    let (problem, base) = sign_dataset(5);
    // Two outputs: the sign label and its negation.
    let mut gradients = Vec::with_capacity(200);
    let mut hessians = Vec::with_capacity(200);
    for g in &base {
        gradients.push(*g);
        gradients.push(-*g);
        hessians.push(1.0);
        hessians.push(1.0);
    }
    let weights = vec![1.0; 100];

    let params = TreeBuilderParams {
        max_tree_depth: 3,
        ..base_params(1)
    };
    let mut single = TreeBuilder::<VectorStats>::new(params.clone(), None, 2).unwrap();
    let tree_single = single.build(&problem, &gradients, &hessians, &weights);

    let mut quad = TreeBuilder::<VectorStats>::new(
        TreeBuilderParams {
            thread_count: 4,
            ..params
        },
        None,
        2,
    )
    .unwrap();
    let tree_quad = quad.build(&problem, &gradients, &hessians, &weights);

    assert_trees_equivalent(&tree_single, &tree_quad, DEFAULT_TOLERANCE);
}
