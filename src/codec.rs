//! Persisted form of a trained forest.
//!
//! A model is one metadata record plus one node table per tree. Node ids are positions in the
//! tree's arena, so the root is always node 0. Encoding is JSON; split values and the threshold
//! survive a round trip bit-for-bit.
use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use itertools::Itertools;
use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    forest::{ForestMetadata, IsolationForest},
    tree::{builder::max_depth_for, IsolationTree, Node},
    IsolationForestError, Result,
};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRecord {
    pub num_estimators: usize,
    pub max_samples: usize,
    pub max_features: usize,
    pub bootstrap: bool,
    pub random_seed: u64,
    pub contamination: f64,
    pub threshold: f64,
    pub num_features: usize,
}

/// One row of a tree table. Fields that do not apply to the node kind are unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRow {
    pub node_id: usize,
    pub is_leaf: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_child_id: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_child_id: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leaf_size: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedModel {
    pub format_version: u32,
    pub metadata: MetadataRecord,
    pub trees: Vec<Vec<NodeRow>>,
}

pub fn encode(forest: &IsolationForest) -> PersistedModel {
    let meta = forest.metadata();
    PersistedModel {
        format_version: FORMAT_VERSION,
        metadata: MetadataRecord {
            num_estimators: meta.num_estimators,
            max_samples: meta.max_samples,
            max_features: meta.max_features,
            bootstrap: meta.bootstrap,
            random_seed: meta.random_seed,
            contamination: meta.contamination,
            threshold: meta.threshold,
            num_features: meta.num_features,
        },
        trees: forest.trees().iter().map(encode_tree).collect(),
    }
}

fn encode_tree(tree: &IsolationTree) -> Vec<NodeRow> {
    tree.nodes()
        .iter()
        .enumerate()
        .map(|(node_id, node)| match *node {
            Node::Internal {
                feature,
                split,
                left,
                right,
                ..
            } => NodeRow {
                node_id,
                is_leaf: false,
                feature_index: Some(feature),
                split_value: Some(split),
                left_child_id: Some(left),
                right_child_id: Some(right),
                leaf_size: None,
            },
            Node::External { size } => NodeRow {
                node_id,
                is_leaf: true,
                feature_index: None,
                split_value: None,
                left_child_id: None,
                right_child_id: None,
                leaf_size: Some(size),
            },
        })
        .collect()
}

/// Rebuilds a forest, rejecting any layout that is not a set of well-formed trees.
pub fn decode(model: &PersistedModel) -> Result<IsolationForest> {
    if model.format_version != FORMAT_VERSION {
        return Err(IsolationForestError::corrupt(format!(
            "unsupported format version {}",
            model.format_version
        )));
    }
    let meta = &model.metadata;
    check_metadata(meta, model.trees.len())?;

    let max_depth = max_depth_for(meta.max_samples);
    let trees = model
        .trees
        .iter()
        .enumerate()
        .map(|(t, rows)| {
            decode_tree(rows, meta, max_depth)
                .map_err(|msg| IsolationForestError::corrupt(format!("tree {t}: {msg}")))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(IsolationForest::new(
        trees,
        ForestMetadata {
            num_estimators: meta.num_estimators,
            max_samples: meta.max_samples,
            max_features: meta.max_features,
            bootstrap: meta.bootstrap,
            random_seed: meta.random_seed,
            contamination: meta.contamination,
            threshold: meta.threshold,
            num_features: meta.num_features,
        },
    ))
}

fn check_metadata(meta: &MetadataRecord, n_trees: usize) -> Result<()> {
    if meta.num_estimators == 0 || meta.num_estimators != n_trees {
        return Err(IsolationForestError::corrupt(format!(
            "metadata declares {} estimators but {n_trees} trees are stored",
            meta.num_estimators
        )));
    }
    if meta.max_samples < 2 {
        return Err(IsolationForestError::corrupt(format!(
            "max_samples {} is below 2",
            meta.max_samples
        )));
    }
    if meta.max_features < 1 || meta.max_features > meta.num_features {
        return Err(IsolationForestError::corrupt(format!(
            "max_features {} outside [1, {}]",
            meta.max_features, meta.num_features
        )));
    }
    if !(0.0..1.0).contains(&meta.contamination) {
        return Err(IsolationForestError::corrupt(format!(
            "contamination {} outside [0, 1)",
            meta.contamination
        )));
    }
    if meta.threshold.is_nan() {
        return Err(IsolationForestError::corrupt("threshold is NaN"));
    }
    Ok(())
}

fn decode_tree(
    rows: &[NodeRow],
    meta: &MetadataRecord,
    max_depth: usize,
) -> std::result::Result<IsolationTree, String> {
    if rows.is_empty() {
        return Err("empty node table".to_string());
    }
    let n = rows.len();
    let rows: Vec<&NodeRow> = rows.iter().sorted_by_key(|row| row.node_id).collect();
    if let Some((expected, row)) = rows
        .iter()
        .enumerate()
        .find(|(expected, row)| row.node_id != *expected)
    {
        return Err(format!(
            "node ids must be unique and cover 0..{n}; found {} where {expected} was expected",
            row.node_id
        ));
    }

    let mut nodes = Vec::with_capacity(n);
    let mut has_parent = vec![false; n];
    for row in &rows {
        let id = row.node_id;
        let node = if row.is_leaf {
            if row.feature_index.is_some()
                || row.split_value.is_some()
                || row.left_child_id.is_some()
                || row.right_child_id.is_some()
            {
                return Err(format!("leaf {id} carries internal-node fields"));
            }
            match row.leaf_size {
                Some(size) if size >= 1 => Node::External { size },
                _ => return Err(format!("leaf {id} has no positive size")),
            }
        } else {
            let (Some(feature), Some(split), Some(left), Some(right), None) = (
                row.feature_index,
                row.split_value,
                row.left_child_id,
                row.right_child_id,
                row.leaf_size,
            ) else {
                return Err(format!("internal node {id} has missing or extra fields"));
            };
            if feature >= meta.num_features {
                return Err(format!(
                    "node {id} splits on feature {feature} of {}",
                    meta.num_features
                ));
            }
            if !split.is_finite() {
                return Err(format!("node {id} has non-finite split value"));
            }
            for child in [left, right] {
                if child >= n {
                    return Err(format!("node {id} points at missing node {child}"));
                }
                if child == 0 {
                    return Err(format!("node {id} points back at the root"));
                }
                if has_parent[child] {
                    return Err(format!("node {child} has more than one parent"));
                }
                has_parent[child] = true;
            }
            Node::Internal {
                feature,
                split,
                left,
                right,
                depth: 0,
            }
        };
        nodes.push(node);
    }
    if let Some(orphan) = (1..n).find(|&id| !has_parent[id]) {
        return Err(format!("node {orphan} is not reachable from the root"));
    }

    // Every non-root node has exactly one parent, so a walk from the root visits each node
    // at most once; nodes it misses sit on a cycle.
    let mut visited = 0;
    let mut stack = vec![(0usize, 0usize)];
    while let Some((id, node_depth)) = stack.pop() {
        visited += 1;
        if node_depth > max_depth {
            return Err(format!(
                "node {id} at depth {node_depth} exceeds the depth limit {max_depth}"
            ));
        }
        if let Node::Internal {
            left, right, depth, ..
        } = &mut nodes[id]
        {
            *depth = node_depth;
            stack.push((*right, node_depth + 1));
            stack.push((*left, node_depth + 1));
        }
    }
    if visited != n {
        return Err(format!(
            "{} nodes form a cycle detached from the root",
            n - visited
        ));
    }

    let tree = IsolationTree::from_nodes(nodes, max_depth);
    if tree.sample_size() != meta.max_samples {
        return Err(format!(
            "leaf sizes sum to {} but max_samples is {}",
            tree.sample_size(),
            meta.max_samples
        ));
    }
    Ok(tree)
}

pub fn to_bytes(forest: &IsolationForest) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(&encode(forest))?)
}

pub fn from_bytes(bytes: &[u8]) -> Result<IsolationForest> {
    let model: PersistedModel = serde_json::from_slice(bytes)
        .map_err(|e| IsolationForestError::corrupt(format!("unreadable model: {e}")))?;
    decode(&model)
}

fn temp_path(path: &Path) -> Result<PathBuf> {
    let mut name = path
        .file_name()
        .ok_or_else(|| {
            IsolationForestError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} does not name a file", path.display()),
            ))
        })?
        .to_os_string();
    name.push(".tmp");
    Ok(path.with_file_name(name))
}

/// Writes the model next to `path` and renames it into place, so `path` only ever holds a
/// complete model.
pub fn save(forest: &IsolationForest, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let bytes = to_bytes(forest)?;
    let tmp = temp_path(path)?;

    let written = File::create(&tmp).and_then(|mut file| {
        file.write_all(&bytes)?;
        file.sync_all()
    });
    if let Err(e) = written.and_then(|_| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }

    info!(
        "Saved isolation forest ({} trees, {} bytes) to {}",
        forest.trees().len(),
        bytes.len(),
        path.display()
    );
    Ok(())
}

pub fn load(path: impl AsRef<Path>) -> Result<IsolationForest> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    let forest = from_bytes(&bytes)?;
    info!(
        "Loaded isolation forest ({} trees) from {}",
        forest.trees().len(),
        path.display()
    );
    Ok(forest)
}
