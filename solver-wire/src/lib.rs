//! Binary wire codec for blob trees and solved-spot solution trees.
//!
//! Every primitive is big-endian and explicitly sized (no varints, no
//! self-describing tags beyond the single-byte strategy-option discriminant)
//! so that a tree's on-disk/on-wire byte length can be computed without
//! encoding it first.

pub mod action;
pub mod blob_tree;
pub mod error;
pub mod primitives;
pub mod solution_tree;

pub use action::{Action, ActionSequence};
pub use blob_tree::{BlobTree, BlobTreeNode, ROOT_NODE_ID};
pub use error::{WireError, WireResult};
pub use solution_tree::{
    Matrix2D, RaiseOption, SolutionTree, SolutionTreeBuilder, SolutionTreeError, SolutionTreeNode,
    SolvedSpot, StrategyOption,
};
