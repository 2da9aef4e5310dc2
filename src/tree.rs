use ndarray::{Array1, ArrayView2, Axis};

use crate::{FittedModel, IsolationForestError, Result};

pub mod builder;
pub mod path;
pub mod sampler;

#[cfg(test)]
mod tests;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Internal {
        feature: usize,
        split: f64,
        left: usize,
        right: usize,
        depth: usize,
    },
    External {
        size: usize,
    },
}

impl Node {
    pub const fn is_leaf(&self) -> bool {
        matches!(self, Node::External { .. })
    }
}

/// Binary isolation tree stored as an arena of nodes. The root is node 0 and every
/// `Internal` node refers to its children by index into the arena.
#[derive(Debug, Clone, PartialEq)]
pub struct IsolationTree {
    nodes: Vec<Node>,
    max_depth: usize,
}

impl IsolationTree {
    /// Callers guarantee `nodes` is a well-formed strict binary tree rooted at 0.
    pub(crate) fn from_nodes(nodes: Vec<Node>, max_depth: usize) -> Self {
        Self { nodes, max_depth }
    }

    pub fn root(&self) -> &Node {
        &self.nodes[0]
    }

    pub fn node(&self, id: usize) -> &Node {
        &self.nodes[id]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Depth limit used while growing the tree, `⌈log2(ψ)⌉`.
    pub const fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Number of edges on the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        self.nodes
            .iter()
            .filter_map(|node| match node {
                Node::Internal { depth, .. } => Some(depth + 1),
                Node::External { .. } => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Number of training rows the tree was grown on (sum of leaf sizes).
    pub fn sample_size(&self) -> usize {
        self.nodes
            .iter()
            .map(|node| match node {
                Node::External { size } => *size,
                Node::Internal { .. } => 0,
            })
            .sum()
    }

    /// Smallest row width this tree can be evaluated on.
    pub fn required_width(&self) -> usize {
        self.nodes
            .iter()
            .filter_map(|node| match node {
                Node::Internal { feature, .. } => Some(feature + 1),
                Node::External { .. } => None,
            })
            .max()
            .unwrap_or(0)
    }
}

impl FittedModel for IsolationTree {
    /// Path length (edges plus leaf correction) of every row.
    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        let required = self.required_width();
        if x.ncols() < required {
            return Err(IsolationForestError::DimensionMismatch {
                expected: required,
                actual: x.ncols(),
            });
        }
        Ok(x
            .axis_iter(Axis(0))
            .map(|row| path::path_length(self, row))
            .collect())
    }
}
