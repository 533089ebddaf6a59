//! Random-forest classifier: CART trees fitted on bootstrap samples, with
//! probabilities averaged across trees.
pub mod ensemble;
pub mod tree;

pub use ensemble::{argmax, RandomForest};
pub use tree::{DecisionTree, Node, TreeParams};
