//! SoA decision tree storage and traversal.

use serde::{Deserialize, Serialize};

/// Index of a node within a tree.
pub type NodeId = u32;

/// A single regression tree in structure-of-arrays layout.
///
/// Nodes are stored in parallel vectors indexed by [`NodeId`]; node 0 is the
/// root. Splits are numeric only: a sample goes left when
/// `value < threshold`, and NaN values follow the node's default direction,
/// chosen during training by which side yielded the better gain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    split_index: Vec<u32>,
    split_threshold: Vec<f32>,
    left_child: Vec<NodeId>,
    right_child: Vec<NodeId>,
    default_left: Vec<bool>,
    leaf_value: Vec<f32>,
    is_leaf: Vec<bool>,
}

impl Tree {
    /// Create a tree consisting of a single leaf.
    pub fn new_leaf(value: f32) -> Self {
        Self {
            split_index: vec![0],
            split_threshold: vec![0.0],
            left_child: vec![0],
            right_child: vec![0],
            default_left: vec![false],
            leaf_value: vec![value],
            is_leaf: vec![true],
        }
    }

    /// Number of nodes.
    pub fn n_nodes(&self) -> usize {
        self.is_leaf.len()
    }

    /// Number of leaf nodes.
    pub fn n_leaves(&self) -> usize {
        self.is_leaf.iter().filter(|&&l| l).count()
    }

    /// Check if a node is a leaf.
    pub fn is_leaf(&self, node: NodeId) -> bool {
        self.is_leaf[node as usize]
    }

    /// Leaf value at a node (meaningful only for leaves).
    pub fn leaf_value(&self, node: NodeId) -> f32 {
        self.leaf_value[node as usize]
    }

    /// Feature index used by a split node.
    pub fn split_index(&self, node: NodeId) -> u32 {
        self.split_index[node as usize]
    }

    /// Threshold of a numeric split.
    pub fn split_threshold(&self, node: NodeId) -> f32 {
        self.split_threshold[node as usize]
    }

    /// Default direction for missing values at a split node.
    pub fn default_left(&self, node: NodeId) -> bool {
        self.default_left[node as usize]
    }

    /// Convert a leaf into a split node with two fresh leaf children.
    ///
    /// Returns the `(left, right)` child ids. Used by the trainer while
    /// growing; panics in debug builds if `node` is not a leaf.
    pub fn split_leaf(
        &mut self,
        node: NodeId,
        feature: u32,
        threshold: f32,
        default_left: bool,
        left_value: f32,
        right_value: f32,
    ) -> (NodeId, NodeId) {
        debug_assert!(self.is_leaf(node), "can only split a leaf node");

        let left = self.push_leaf(left_value);
        let right = self.push_leaf(right_value);

        let n = node as usize;
        self.split_index[n] = feature;
        self.split_threshold[n] = threshold;
        self.left_child[n] = left;
        self.right_child[n] = right;
        self.default_left[n] = default_left;
        self.is_leaf[n] = false;

        (left, right)
    }

    fn push_leaf(&mut self, value: f32) -> NodeId {
        let id = self.n_nodes() as NodeId;
        self.split_index.push(0);
        self.split_threshold.push(0.0);
        self.left_child.push(0);
        self.right_child.push(0);
        self.default_left.push(false);
        self.leaf_value.push(value);
        self.is_leaf.push(true);
        id
    }

    /// Traverse from the root to a leaf for one sample.
    #[inline]
    pub fn traverse_to_leaf(&self, features: &[f32]) -> NodeId {
        let mut node = 0 as NodeId;
        while !self.is_leaf(node) {
            let n = node as usize;
            let value = features[self.split_index[n] as usize];
            let go_left = if value.is_nan() {
                self.default_left[n]
            } else {
                value < self.split_threshold[n]
            };
            node = if go_left {
                self.left_child[n]
            } else {
                self.right_child[n]
            };
        }
        node
    }

    /// Predict the tree output for one sample.
    #[inline]
    pub fn predict_row(&self, features: &[f32]) -> f32 {
        self.leaf_value(self.traverse_to_leaf(features))
    }
}
