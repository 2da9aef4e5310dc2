use itertools::{Itertools, MinMaxResult};
use ndarray::ArrayView2;
use rand::Rng;

use super::{sampler::Sample, IsolationTree, Node};

const SPLIT_DRAWS: usize = 8;

/// `⌈log2(ψ)⌉`, computed on integers so powers of two are exact.
pub const fn max_depth_for(sample_size: usize) -> usize {
    if sample_size <= 1 {
        0
    } else {
        (usize::BITS - (sample_size - 1).leading_zeros()) as usize
    }
}

/// Grows one isolation tree over the rows and features of `sample`.
pub fn build_tree<R: Rng + ?Sized>(
    x: ArrayView2<f64>,
    sample: &Sample,
    rng: &mut R,
) -> IsolationTree {
    let max_depth = max_depth_for(sample.rows.len());
    let mut builder = TreeBuilder {
        x,
        features: &sample.features,
        max_depth,
        nodes: Vec::with_capacity(2 * sample.rows.len()),
    };
    let mut rows = sample.rows.clone();
    builder.grow(&mut rows, 0, rng);

    IsolationTree::from_nodes(builder.nodes, max_depth)
}

struct TreeBuilder<'a, 's> {
    x: ArrayView2<'a, f64>,
    features: &'s [usize],
    max_depth: usize,
    nodes: Vec<Node>,
}

impl TreeBuilder<'_, '_> {
    /// Appends the subtree for `rows` in pre-order and returns the id of its root.
    fn grow<R: Rng + ?Sized>(&mut self, rows: &mut [usize], depth: usize, rng: &mut R) -> usize {
        let id = self.nodes.len();
        if rows.len() <= 1 || depth >= self.max_depth {
            self.nodes.push(Node::External { size: rows.len() });
            return id;
        }

        let Some((feature, split)) = self.pick_split(rows, rng) else {
            self.nodes.push(Node::External { size: rows.len() });
            return id;
        };

        let x = self.x;
        let mid = itertools::partition(rows.iter_mut(), |&row| x[[row, feature]] < split);

        self.nodes.push(Node::Internal {
            feature,
            split,
            left: id,
            right: id,
            depth,
        });
        let (left_rows, right_rows) = rows.split_at_mut(mid);
        let left_id = self.grow(left_rows, depth + 1, rng);
        let right_id = self.grow(right_rows, depth + 1, rng);

        if let Node::Internal { left, right, .. } = &mut self.nodes[id] {
            *left = left_id;
            *right = right_id;
        }
        id
    }

    /// Picks a random feature and a split strictly inside its range over `rows`. Features
    /// with no room for such a split are skipped.
    fn pick_split<R: Rng + ?Sized>(&self, rows: &[usize], rng: &mut R) -> Option<(usize, f64)> {
        let mut candidates = self.features.to_vec();
        while !candidates.is_empty() {
            let feature = candidates.swap_remove(rng.gen_range(0..candidates.len()));
            if let MinMaxResult::MinMax(min, max) =
                rows.iter().map(|&row| self.x[[row, feature]]).minmax()
            {
                if min < max {
                    if let Some(split) = draw_split(min, max, rng) {
                        return Some((feature, split));
                    }
                }
            }
        }
        None
    }
}

/// Uniform draw in the open interval `(min, max)`. `None` when no representable value lies
/// strictly between them, as with adjacent floats.
fn draw_split<R: Rng + ?Sized>(min: f64, max: f64, rng: &mut R) -> Option<f64> {
    (0..SPLIT_DRAWS)
        .map(|_| {
            let t: f64 = rng.gen();
            min * (1.0 - t) + max * t
        })
        .find(|&split| min < split && split < max)
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn test_max_depth_for() {
        assert_eq!(max_depth_for(1), 0);
        assert_eq!(max_depth_for(2), 1);
        assert_eq!(max_depth_for(3), 2);
        assert_eq!(max_depth_for(4), 2);
        assert_eq!(max_depth_for(5), 3);
        assert_eq!(max_depth_for(256), 8);
        assert_eq!(max_depth_for(257), 9);
    }

    #[test]
    fn test_draw_split_is_inside_range() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..1000 {
            let split = draw_split(-1.5, 2.5, &mut rng).unwrap();
            assert!(-1.5 < split && split < 2.5);
        }
    }

    #[test]
    fn test_draw_split_adjacent_floats() {
        let mut rng = StdRng::seed_from_u64(3);
        let min: f64 = 1.0;
        let max = f64::from_bits(min.to_bits() + 1);
        assert_eq!(draw_split(min, max, &mut rng), None);
    }

    #[test]
    fn test_adjacent_float_feature_is_skipped() {
        // feature 0 has no value strictly between its min and max
        let low: f64 = 1.0;
        let high = f64::from_bits(low.to_bits() + 1);
        let x = ndarray::array![[low, 0.0], [high, 1.0], [low, 2.0], [high, 3.0]];
        let sample = Sample {
            rows: vec![0, 1, 2, 3],
            features: vec![0, 1],
        };
        for seed in 0..20 {
            let tree = build_tree(x.view(), &sample, &mut StdRng::seed_from_u64(seed));
            for node in tree.nodes() {
                if let Node::Internal { feature, split, .. } = *node {
                    assert_eq!(feature, 1);
                    assert!(0.0 < split && split < 3.0);
                }
            }
        }
    }

    #[test]
    fn test_only_adjacent_float_features_give_a_leaf() {
        let low: f64 = -2.0;
        let high = f64::from_bits(low.to_bits() - 1);
        let x = ndarray::array![[low], [high], [low]];
        let sample = Sample {
            rows: vec![0, 1, 2],
            features: vec![0],
        };
        let tree = build_tree(x.view(), &sample, &mut StdRng::seed_from_u64(5));
        assert_eq!(tree.node_count(), 1);
        assert!(matches!(tree.root(), Node::External { size: 3 }));
    }

    #[test]
    fn test_draw_split_extreme_range_is_finite() {
        let mut rng = StdRng::seed_from_u64(3);
        let split = draw_split(-f64::MAX, f64::MAX, &mut rng).unwrap();
        assert!(split.is_finite());
    }
}
