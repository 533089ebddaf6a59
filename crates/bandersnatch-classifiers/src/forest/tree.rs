//! CART classification tree with Gini splits and per-split feature sampling.

use ndarray::ArrayView2;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use serde::{Deserialize, Serialize};

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Candidate features drawn at every split.
    pub max_features: usize,
}

/// A node in the flat node array. Children are indices into the same array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Split {
        feature: usize,
        /// Go left if `value <= threshold`.
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Class counts of the training samples (with bootstrap multiplicity)
    /// that reached this leaf.
    Leaf { counts: Vec<u32> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    n_features: usize,
    n_classes: usize,
}

impl DecisionTree {
    /// Grow a tree on the rows of `x` listed in `samples` (duplicates allowed).
    pub fn fit(
        x: ArrayView2<'_, f64>,
        y: &[usize],
        samples: Vec<usize>,
        n_classes: usize,
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> Self {
        let mut builder = Builder {
            x,
            y,
            n_classes,
            params,
            rng,
            nodes: Vec::new(),
        };
        builder.grow(samples, 0);
        DecisionTree {
            nodes: builder.nodes,
            n_features: x.ncols(),
            n_classes,
        }
    }

    fn leaf_counts(&self, features: &[f64]) -> &[u32] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                Node::Leaf { counts } => return counts,
            }
        }
    }

    /// Class distribution of the leaf `features` falls into.
    pub fn predict_proba(&self, features: &[f64]) -> Vec<f64> {
        let counts = self.leaf_counts(features);
        let total: u64 = counts.iter().map(|&c| c as u64).sum();
        if total == 0 {
            return vec![0.0; self.n_classes];
        }
        counts.iter().map(|&c| c as f64 / total as f64).collect()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
                Node::Leaf { .. } => 0,
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }

    /// Structural check used after deserialization: every child index points
    /// forward inside the node array, every split feature exists and every
    /// leaf carries one count per class.
    pub fn check(&self) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= self.n_features {
                        return Err(format!("node {} splits on unknown feature {}", i, feature));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {} has a non-finite threshold", i));
                    }
                    for &child in [left, right] {
                        if child <= i || child >= self.nodes.len() {
                            return Err(format!("node {} has invalid child {}", i, child));
                        }
                    }
                }
                Node::Leaf { counts } => {
                    if counts.len() != self.n_classes {
                        return Err(format!(
                            "leaf {} has {} class counts, expected {}",
                            i,
                            counts.len(),
                            self.n_classes
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

struct Builder<'a, 'x> {
    x: ArrayView2<'x, f64>,
    y: &'a [usize],
    n_classes: usize,
    params: &'a TreeParams,
    rng: &'a mut StdRng,
    nodes: Vec<Node>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

impl Builder<'_, '_> {
    fn class_counts(&self, samples: &[usize]) -> Vec<u32> {
        let mut counts = vec![0u32; self.n_classes];
        for &s in samples {
            counts[self.y[s]] += 1;
        }
        counts
    }

    /// Returns the index of the node created for `samples`.
    fn grow(&mut self, samples: Vec<usize>, depth: usize) -> usize {
        let counts = self.class_counts(&samples);
        let node_idx = self.nodes.len();
        self.nodes.push(Node::Leaf {
            counts: counts.clone(),
        });

        let is_pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        let depth_reached = self.params.max_depth.is_some_and(|d| depth >= d);
        if is_pure || depth_reached || samples.len() < self.params.min_samples_split {
            return node_idx;
        }

        let Some(best) = self.best_split(&samples, &counts) else {
            return node_idx;
        };

        let (left, right): (Vec<usize>, Vec<usize>) = samples
            .into_iter()
            .partition(|&s| self.x[[s, best.feature]] <= best.threshold);

        let left_idx = self.grow(left, depth + 1);
        let right_idx = self.grow(right, depth + 1);
        self.nodes[node_idx] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: left_idx,
            right: right_idx,
        };
        node_idx
    }

    fn best_split(&mut self, samples: &[usize], parent_counts: &[u32]) -> Option<BestSplit> {
        let n_features = self.x.ncols();
        let k = self.params.max_features.min(n_features);
        let candidates = sample(&mut *self.rng, n_features, k).into_vec();

        let n = samples.len();
        let min_leaf = self.params.min_samples_leaf;
        let mut best: Option<BestSplit> = None;
        let mut sorted: Vec<(f64, usize)> = Vec::with_capacity(n);

        for feature in candidates {
            sorted.clear();
            sorted.extend(samples.iter().map(|&s| (self.x[[s, feature]], self.y[s])));
            sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
            if sorted[0].0 == sorted[n - 1].0 {
                continue;
            }

            let mut left = vec![0u32; self.n_classes];
            let mut right = parent_counts.to_vec();
            for i in 0..n - 1 {
                let (value, class) = sorted[i];
                left[class] += 1;
                right[class] -= 1;

                let next = sorted[i + 1].0;
                let n_left = i + 1;
                let n_right = n - n_left;
                if value == next || n_left < min_leaf || n_right < min_leaf {
                    continue;
                }

                let impurity = (n_left as f64 * gini(&left, n_left)
                    + n_right as f64 * gini(&right, n_right))
                    / n as f64;
                if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                    best = Some(BestSplit {
                        feature,
                        threshold: midpoint(value, next),
                        impurity,
                    });
                }
            }
        }
        best
    }
}

fn gini(counts: &[u32], n: usize) -> f64 {
    let n = n as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / n;
            p * p
        })
        .sum::<f64>()
}

/// Midpoint of two adjacent distinct values, falling back to `lo` when the
/// midpoint rounds up to `hi`.
fn midpoint(lo: f64, hi: f64) -> f64 {
    let mid = lo + (hi - lo) / 2.0;
    if mid >= hi || !mid.is_finite() {
        lo
    } else {
        mid
    }
}
