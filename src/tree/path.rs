use ndarray::ArrayView1;

use super::{IsolationTree, Node};

const EULER_GAMMA: f64 = 0.5772156649;

/// `H(i) ≈ ln(i) + γ`, with `H(0) = 0`.
pub fn harmonic_number(i: usize) -> f64 {
    if i == 0 {
        0.0
    } else {
        (i as f64).ln() + EULER_GAMMA
    }
}

/// Average path length of an unsuccessful search in a binary search tree of `n` nodes, `c(n)`.
pub fn average_path_length(n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    let n_f = n as f64;
    2.0 * harmonic_number(n - 1) - 2.0 * (n_f - 1.0) / n_f
}

/// Edges traversed from the root to the leaf reached by `row`, plus `c(size)` of that leaf.
pub fn path_length(tree: &IsolationTree, row: ArrayView1<f64>) -> f64 {
    let mut id = 0;
    let mut edges = 0usize;
    loop {
        match tree.node(id) {
            Node::Internal {
                feature,
                split,
                left,
                right,
                ..
            } => {
                id = if row[*feature] < *split { *left } else { *right };
                edges += 1;
            }
            Node::External { size } => return edges as f64 + average_path_length(*size),
        }
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn test_harmonic_number() {
        assert_eq!(harmonic_number(0), 0.0);
        assert_eq!(harmonic_number(1), EULER_GAMMA);
        assert!((harmonic_number(10) - (10f64.ln() + EULER_GAMMA)).abs() < 1e-15);
    }

    #[test]
    fn test_average_path_length_small_sizes() {
        assert_eq!(average_path_length(0), 0.0);
        assert_eq!(average_path_length(1), 0.0);
        assert!((average_path_length(2) - 0.15443132979999996).abs() < 1e-12);
        assert!((average_path_length(3) - 1.207392357586557).abs() < 1e-12);
    }

    #[test]
    fn test_average_path_length_default_sample_size() {
        assert!((average_path_length(256) - 10.244770920116851).abs() < 1e-12);
    }

    #[test]
    fn test_average_path_length_is_increasing() {
        let values: Vec<f64> = (1..512).map(average_path_length).collect();
        assert!(values.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_path_length_follows_splits() {
        // root splits on feature 1 at 0.5; its right child splits on feature 0 at 2.0
        let tree = IsolationTree::from_nodes(
            vec![
                Node::Internal {
                    feature: 1,
                    split: 0.5,
                    left: 1,
                    right: 2,
                    depth: 0,
                },
                Node::External { size: 3 },
                Node::Internal {
                    feature: 0,
                    split: 2.0,
                    left: 3,
                    right: 4,
                    depth: 1,
                },
                Node::External { size: 1 },
                Node::External { size: 2 },
            ],
            3,
        );

        let left = path_length(&tree, array![10.0, 0.1].view());
        assert_eq!(left, 1.0 + average_path_length(3));

        let right_left = path_length(&tree, array![1.0, 0.5].view());
        assert_eq!(right_left, 2.0);

        let right_right = path_length(&tree, array![2.0, 0.9].view());
        assert_eq!(right_right, 2.0 + average_path_length(2));
    }

    #[test]
    fn test_path_length_single_leaf_tree() {
        let tree = IsolationTree::from_nodes(vec![Node::External { size: 4 }], 2);
        assert_eq!(
            path_length(&tree, array![0.0].view()),
            average_path_length(4)
        );
    }
}
