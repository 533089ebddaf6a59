//! Bagged ensemble of decision trees.
//!
//! Every tree gets its own `StdRng` seeded from a sequence drawn up front
//! from the forest seed, so the fitted forest does not depend on how rayon
//! schedules the trees.

use ndarray::ArrayView2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::ForestConfig;
use crate::forest::tree::{DecisionTree, TreeParams};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_features: usize,
    n_classes: usize,
}

impl RandomForest {
    /// Fit `config.n_trees` trees on `x`/`y`. `y` holds class codes in
    /// `0..n_classes`.
    pub fn fit(
        x: ArrayView2<'_, f64>,
        y: &[usize],
        n_classes: usize,
        config: &ForestConfig,
        seed: u64,
    ) -> Self {
        let n_samples = x.nrows();
        let params = TreeParams {
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split,
            min_samples_leaf: config.min_samples_leaf,
            max_features: config.max_features.resolve(x.ncols()),
        };

        let mut seeder = StdRng::seed_from_u64(seed);
        let tree_seeds: Vec<u64> = (0..config.n_trees).map(|_| seeder.gen()).collect();

        let trees: Vec<DecisionTree> = tree_seeds
            .into_par_iter()
            .map(|tree_seed| {
                let mut rng = StdRng::seed_from_u64(tree_seed);
                let samples: Vec<usize> = if config.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };
                DecisionTree::fit(x, y, samples, n_classes, &params, &mut rng)
            })
            .collect();

        let forest = RandomForest {
            trees,
            n_features: x.ncols(),
            n_classes,
        };
        log::debug!(
            "Fitted {} trees on {} samples (max_features={}, avg depth {:.1}, {} nodes)",
            forest.n_trees(),
            n_samples,
            params.max_features,
            forest.avg_depth(),
            forest.total_nodes()
        );
        forest
    }

    /// Mean of the per-tree leaf class distributions.
    pub fn predict_proba(&self, features: &[f64]) -> Vec<f64> {
        let mut probs = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (acc, p) in probs.iter_mut().zip(tree.predict_proba(features)) {
                *acc += p;
            }
        }
        let n = self.trees.len().max(1) as f64;
        for p in probs.iter_mut() {
            *p = (*p / n).clamp(0.0, 1.0);
        }
        probs
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn avg_depth(&self) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let total: usize = self.trees.iter().map(DecisionTree::depth).sum();
        total as f64 / self.trees.len() as f64
    }

    pub fn total_nodes(&self) -> usize {
        self.trees.iter().map(DecisionTree::n_nodes).sum()
    }

    /// Check that every tree agrees with the forest's shape.
    pub fn check(&self) -> Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        for (i, tree) in self.trees.iter().enumerate() {
            if tree.n_features() != self.n_features || tree.n_classes() != self.n_classes {
                return Err(format!(
                    "tree {} has shape ({} features, {} classes), forest expects ({}, {})",
                    i,
                    tree.n_features(),
                    tree.n_classes(),
                    self.n_features,
                    self.n_classes
                ));
            }
            tree.check().map_err(|e| format!("tree {}: {}", i, e))?;
        }
        Ok(())
    }
}

/// Index of the largest probability; ties go to the lowest index.
pub fn argmax(probs: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &p) in probs.iter().enumerate() {
        if best.map_or(true, |(_, b)| p > b) {
            best = Some((i, p));
        }
    }
    best.map(|(i, _)| i)
}
