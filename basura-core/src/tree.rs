//! Decision tree classifier over a single numeric feature.
//!
//! Nodes live in one flat vector and refer to their children by index, so a fitted tree
//! serializes as plain data. Growth is unconstrained CART with gini impurity: a node splits
//! until it is pure or its samples share one value. Split thresholds sit halfway between
//! adjacent distinct values, and `value <= threshold` goes left.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::model::Label;
use crate::ports::CoreError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A node of a fitted tree.
pub enum TreeNode {
    /// Terminal node with per-class sample counts, indexed like [`DecisionTree::classes`].
    Leaf {
        /// Training samples per class that reached this leaf.
        counts: Vec<usize>,
    },
    /// Internal node.
    Split {
        /// Values at or below this go to `left`.
        threshold: f64,
        /// Index of the left child.
        left: usize,
        /// Index of the right child.
        right: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// Classifier output for one sample.
pub struct Prediction {
    /// Predicted level.
    pub label: Label,
    /// Posterior probability of `label`, when the classifier exposes one.
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A fitted decision tree.
pub struct DecisionTree {
    classes: Vec<Label>,
    nodes: Vec<TreeNode>,
}

#[expect(
    clippy::cast_precision_loss,
    reason = "sample counts stay far below 2^52"
)]
fn gini(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    1.0 - counts
        .iter()
        .map(|&count| {
            let share = count as f64 / total;
            share * share
        })
        .sum::<f64>()
}

impl DecisionTree {
    /// Fit a tree to `(value, label)` samples.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Training`] when there are no samples or a sample is not finite or
    /// carries [`Label::Unknown`].
    pub fn fit(samples: &[(f64, Label)]) -> Result<Self, CoreError> {
        if samples.is_empty() {
            return Err(CoreError::Training("no training samples".into()));
        }
        if samples
            .iter()
            .any(|(value, label)| !value.is_finite() || *label == Label::Unknown)
        {
            return Err(CoreError::Training(
                "training samples must be finite and labelled".into(),
            ));
        }

        let classes: Vec<Label> = Label::LEVELS
            .into_iter()
            .filter(|level| samples.iter().any(|(_, label)| label == level))
            .collect();

        let mut encoded: Vec<(f64, usize)> = samples
            .iter()
            .filter_map(|(value, label)| {
                classes
                    .iter()
                    .position(|class| class == label)
                    .map(|index| (*value, index))
            })
            .collect();
        encoded.sort_by(|left, right| left.0.total_cmp(&right.0));

        let mut tree = Self {
            classes,
            nodes: Vec::new(),
        };
        tree.grow(&encoded);
        Ok(tree)
    }

    /// Grow a subtree from samples sorted by value, returning its root index.
    fn grow(&mut self, samples: &[(f64, usize)]) -> usize {
        let class_count = self.classes.len();
        let mut counts = vec![0_usize; class_count];
        for (_, class) in samples {
            if let Some(count) = counts.get_mut(*class) {
                *count += 1;
            }
        }

        let index = self.nodes.len();
        self.nodes.push(TreeNode::Leaf {
            counts: counts.clone(),
        });

        let is_pure = counts.iter().filter(|&&count| count > 0).count() <= 1;
        let Some(split_at) = (!is_pure)
            .then(|| Self::best_split(samples, &counts))
            .flatten()
        else {
            return index;
        };

        let (left_samples, right_samples) = samples.split_at(split_at);
        let (Some(&(below, _)), Some(&(above, _))) = (left_samples.last(), right_samples.first())
        else {
            return index;
        };
        let mut threshold = below + (above - below) / 2.0;
        if threshold >= above {
            threshold = below;
        }

        let left = self.grow(left_samples);
        let right = self.grow(right_samples);
        if let Some(node) = self.nodes.get_mut(index) {
            *node = TreeNode::Split {
                threshold,
                left,
                right,
            };
        }
        index
    }

    /// Position that minimizes the weighted gini impurity of the two halves.
    fn best_split(samples: &[(f64, usize)], counts: &[usize]) -> Option<usize> {
        let total = samples.len();
        let mut left_counts = vec![0_usize; counts.len()];
        let mut best: Option<(usize, f64)> = None;

        for (position, window) in samples.windows(2).enumerate() {
            let [(value, class), (next_value, _)] = window else {
                continue;
            };
            if let Some(count) = left_counts.get_mut(*class) {
                *count += 1;
            }
            if value.total_cmp(next_value) != Ordering::Less {
                continue;
            }

            let left_total = position + 1;
            let right_total = total - left_total;
            let right_counts: Vec<usize> = counts
                .iter()
                .zip(&left_counts)
                .map(|(all, left)| all - left)
                .collect();
            #[expect(
                clippy::cast_precision_loss,
                reason = "sample counts stay far below 2^52"
            )]
            let impurity = (left_total as f64 * gini(&left_counts, left_total)
                + right_total as f64 * gini(&right_counts, right_total))
                / total as f64;

            if best.is_none_or(|(_, best_impurity)| impurity < best_impurity) {
                best = Some((left_total, impurity));
            }
        }

        best.map(|(split_at, _)| split_at)
    }

    /// Classes the tree can predict, in severity order.
    #[must_use]
    pub fn classes(&self) -> &[Label] {
        &self.classes
    }

    /// Class probabilities for a value, aligned with [`DecisionTree::classes`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Artifact`] when the tree structure is broken, which can only
    /// happen for a tampered artifact.
    #[expect(
        clippy::cast_precision_loss,
        reason = "leaf counts stay far below 2^52"
    )]
    pub fn predict_proba(&self, value: f64) -> Result<Vec<f64>, CoreError> {
        let counts = self.leaf_counts(value)?;
        let total: usize = counts.iter().sum();
        if total == 0 {
            return Err(CoreError::Artifact("tree has an empty leaf".into()));
        }
        Ok(counts
            .iter()
            .map(|&count| count as f64 / total as f64)
            .collect())
    }

    /// Most probable class for a value with its posterior probability.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Artifact`] when the tree structure is broken.
    pub fn predict(&self, value: f64) -> Result<Prediction, CoreError> {
        let probabilities = self.predict_proba(value)?;
        let best = probabilities
            .iter()
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (index, &probability)| {
                match best {
                    Some((_, best_probability)) if best_probability >= probability => best,
                    _ => Some((index, probability)),
                }
            });
        let (index, probability) =
            best.ok_or_else(|| CoreError::Artifact("tree has no classes".into()))?;
        let label = *self
            .classes
            .get(index)
            .ok_or_else(|| CoreError::Artifact("leaf class out of range".into()))?;
        Ok(Prediction {
            label,
            confidence: Some(probability),
        })
    }

    fn leaf_counts(&self, value: f64) -> Result<&[usize], CoreError> {
        let mut index = 0;
        // A valid tree reaches a leaf in fewer steps than it has nodes.
        for _ in 0..=self.nodes.len() {
            match self.nodes.get(index) {
                Some(TreeNode::Leaf { counts }) => return Ok(counts),
                Some(TreeNode::Split {
                    threshold,
                    left,
                    right,
                }) => index = if value <= *threshold { *left } else { *right },
                None => break,
            }
        }
        Err(CoreError::Artifact("tree node index out of range".into()))
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of leaves.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| matches!(node, TreeNode::Leaf { .. }))
            .count()
    }

    /// Longest root-to-leaf path.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(0_usize, 0_usize)];
        while let Some((index, depth)) = pending.pop() {
            match self.nodes.get(index) {
                Some(TreeNode::Split { left, right, .. }) if depth < self.nodes.len() => {
                    pending.push((*left, depth + 1));
                    pending.push((*right, depth + 1));
                }
                Some(_) => deepest = deepest.max(depth),
                None => {}
            }
        }
        deepest
    }
}
