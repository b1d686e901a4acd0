//! Forest ensemble: base score plus additive tree outputs.

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use super::tree::Tree;

/// An additive ensemble of regression trees.
///
/// Prediction is `base_score + Σ tree(x)`. The forest is immutable once
/// training finishes; all prediction paths take `&self`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forest {
    base_score: f32,
    trees: Vec<Tree>,
}

impl Forest {
    /// Create an empty forest with the given base score.
    pub fn new(base_score: f32) -> Self {
        Self {
            base_score,
            trees: Vec::new(),
        }
    }

    /// The base score (prior prediction before any trees).
    pub fn base_score(&self) -> f32 {
        self.base_score
    }

    /// Number of trees.
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Iterate over trees.
    pub fn trees(&self) -> impl Iterator<Item = &Tree> {
        self.trees.iter()
    }

    /// Append a trained tree.
    pub fn push(&mut self, tree: Tree) {
        self.trees.push(tree);
    }

    /// Keep only the first `n_trees` trees (early-stopping truncation).
    pub fn truncate(&mut self, n_trees: usize) {
        self.trees.truncate(n_trees);
    }

    /// Predict one sample.
    #[inline]
    pub fn predict_row(&self, features: &[f32]) -> f32 {
        let mut score = self.base_score;
        for tree in &self.trees {
            score += tree.predict_row(features);
        }
        score
    }

    /// Predict a batch of samples (`[n_rows, n_features]`, sample-major).
    pub fn predict(&self, features: ArrayView2<'_, f32>) -> Vec<f32> {
        let mut buffer = Vec::with_capacity(features.ncols());
        features
            .rows()
            .into_iter()
            .map(|row| match row.as_slice() {
                Some(slice) => self.predict_row(slice),
                // Non-contiguous view: copy the row out first.
                None => {
                    buffer.clear();
                    buffer.extend(row.iter().copied());
                    self.predict_row(&buffer)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn empty_forest_predicts_base_score() {
        let forest = Forest::new(2.5);
        assert_eq!(forest.predict_row(&[1.0]), 2.5);
    }

    #[test]
    fn trees_are_additive() {
        let mut forest = Forest::new(1.0);
        forest.push(Tree::new_leaf(0.5));
        forest.push(Tree::new_leaf(0.25));
        assert_eq!(forest.predict_row(&[0.0]), 1.75);
    }

    #[test]
    fn truncate_drops_later_trees() {
        let mut forest = Forest::new(0.0);
        forest.push(Tree::new_leaf(1.0));
        forest.push(Tree::new_leaf(10.0));
        forest.truncate(1);
        assert_eq!(forest.n_trees(), 1);
        assert_eq!(forest.predict_row(&[0.0]), 1.0);
    }

    #[test]
    fn batch_prediction_matches_row_prediction() {
        let mut forest = Forest::new(0.0);
        let mut tree = Tree::new_leaf(0.0);
        tree.split_leaf(0, 0, 1.5, false, -1.0, 1.0);
        forest.push(tree);

        let features = array![[1.0, 0.0], [2.0, 0.0]];
        let preds = forest.predict(features.view());
        assert_eq!(preds, vec![-1.0, 1.0]);
        assert_eq!(preds[0], forest.predict_row(&[1.0, 0.0]));
    }
}
