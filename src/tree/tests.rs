use ndarray::{array, Array2};
use rand::{rngs::StdRng, SeedableRng};

use super::*;
use crate::{
    test_data::gaussian_blob,
    tree::{
        builder::{build_tree, max_depth_for},
        path::path_length,
        sampler::{draw_sample, Sample},
    },
};

fn full_sample(x: &Array2<f64>) -> Sample {
    Sample {
        rows: (0..x.nrows()).collect(),
        features: (0..x.ncols()).collect(),
    }
}

fn subtree_rows(tree: &IsolationTree, x: &Array2<f64>, rows: &[usize]) -> Vec<Vec<usize>> {
    // rows reaching each node, indexed by node id
    let mut reached = vec![Vec::new(); tree.node_count()];
    for &row in rows {
        let mut id = 0;
        reached[id].push(row);
        while let Node::Internal {
            feature,
            split,
            left,
            right,
            ..
        } = tree.node(id)
        {
            id = if x[[row, *feature]] < *split {
                *left
            } else {
                *right
            };
            reached[id].push(row);
        }
    }
    reached
}

#[test]
fn test_tree_depth_bounded_by_log2_sample_size() {
    let x = gaussian_blob(1000, 3, 5);
    for (seed, psi) in [(1, 2), (2, 3), (3, 17), (4, 64), (5, 256), (6, 1000)] {
        let mut rng = StdRng::seed_from_u64(seed);
        let sample = draw_sample(x.nrows(), x.ncols(), psi, 3, false, &mut rng).unwrap();
        let tree = build_tree(x.view(), &sample, &mut rng);

        assert_eq!(tree.max_depth(), max_depth_for(psi));
        assert!(
            tree.depth() <= max_depth_for(psi),
            "depth {} exceeds limit {} for psi={psi}",
            tree.depth(),
            max_depth_for(psi)
        );
    }
}

#[test]
fn test_leaf_sizes_account_for_every_sampled_row() {
    let x = gaussian_blob(300, 2, 9);
    let mut rng = StdRng::seed_from_u64(9);
    let sample = draw_sample(x.nrows(), x.ncols(), 128, 2, false, &mut rng).unwrap();
    let tree = build_tree(x.view(), &sample, &mut rng);

    assert_eq!(tree.sample_size(), 128);

    let reached = subtree_rows(&tree, &x, &sample.rows);
    for (id, node) in tree.nodes().iter().enumerate() {
        match node {
            Node::External { size } => {
                assert!(*size >= 1);
                assert_eq!(*size, reached[id].len());
            }
            Node::Internal {
                feature,
                split,
                left,
                right,
                ..
            } => {
                assert_eq!(reached[*left].len() + reached[*right].len(), reached[id].len());
                let values: Vec<f64> = reached[id].iter().map(|&r| x[[r, *feature]]).collect();
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                assert!(min < *split && *split < max);
            }
        }
    }
}

#[test]
fn test_bootstrap_leaf_sizes_count_duplicates() {
    let x = gaussian_blob(20, 2, 1);
    let mut rng = StdRng::seed_from_u64(1);
    let sample = draw_sample(x.nrows(), x.ncols(), 64, 2, true, &mut rng).unwrap();
    let tree = build_tree(x.view(), &sample, &mut rng);
    assert_eq!(tree.sample_size(), 64);
}

#[test]
fn test_identical_points_give_single_leaf() {
    let x = Array2::from_elem((16, 3), 4.2);
    let mut rng = StdRng::seed_from_u64(0);
    let tree = build_tree(x.view(), &full_sample(&x), &mut rng);

    assert_eq!(tree.nodes(), &[Node::External { size: 16 }]);
    assert_eq!(tree.depth(), 0);
}

#[test]
fn test_constant_features_are_never_split_on() {
    let x = array![
        [1.0, 0.0, 7.0],
        [1.0, 1.0, 7.0],
        [1.0, 2.0, 7.0],
        [1.0, 3.0, 7.0],
        [1.0, 4.0, 7.0],
        [1.0, 5.0, 7.0],
        [1.0, 6.0, 7.0],
        [1.0, 7.0, 7.0],
    ];
    for seed in 0..20 {
        let mut rng = StdRng::seed_from_u64(seed);
        let tree = build_tree(x.view(), &full_sample(&x), &mut rng);
        assert!(!tree.root().is_leaf());
        for node in tree.nodes() {
            if let Node::Internal { feature, .. } = node {
                assert_eq!(*feature, 1);
            }
        }
    }
}

#[test]
fn test_splits_only_use_sampled_features() {
    let x = gaussian_blob(200, 6, 2);
    let sample = Sample {
        rows: (0..64).collect(),
        features: vec![1, 4],
    };
    let mut rng = StdRng::seed_from_u64(2);
    let tree = build_tree(x.view(), &sample, &mut rng);
    for node in tree.nodes() {
        if let Node::Internal { feature, .. } = node {
            assert!(*feature == 1 || *feature == 4);
        }
    }
}

#[test]
fn test_two_point_tree() {
    let x = array![[0.0], [1.0]];
    let mut rng = StdRng::seed_from_u64(4);
    let tree = build_tree(x.view(), &full_sample(&x), &mut rng);

    assert_eq!(tree.max_depth(), 1);
    assert_eq!(tree.node_count(), 3);
    assert_eq!(path_length(&tree, array![0.0].view()), 1.0);
    assert_eq!(path_length(&tree, array![1.0].view()), 1.0);
}

#[test]
fn test_same_seed_same_tree() {
    let x = gaussian_blob(400, 4, 8);
    let grow = |seed| {
        let mut rng = StdRng::seed_from_u64(seed);
        let sample = draw_sample(x.nrows(), x.ncols(), 100, 2, false, &mut rng).unwrap();
        build_tree(x.view(), &sample, &mut rng)
    };
    assert_eq!(grow(21), grow(21));
    assert_ne!(grow(21), grow(22));
}

#[test]
fn test_predict_returns_path_lengths() {
    let x = gaussian_blob(100, 2, 6);
    let mut rng = StdRng::seed_from_u64(6);
    let sample = draw_sample(x.nrows(), x.ncols(), 32, 2, false, &mut rng).unwrap();
    let tree = build_tree(x.view(), &sample, &mut rng);

    let lengths = tree.predict(x.view()).unwrap();
    assert_eq!(lengths.len(), 100);
    for (row, &length) in x.rows().into_iter().zip(lengths.iter()) {
        assert_eq!(length, path_length(&tree, row));
        assert!(length >= 0.0);
    }

    let narrow = Array2::<f64>::zeros((3, 1));
    if tree.required_width() > 1 {
        assert!(matches!(
            tree.predict(narrow.view()),
            Err(IsolationForestError::DimensionMismatch { .. })
        ));
    }
}
