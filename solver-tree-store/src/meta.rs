//! Self-describing record stored alongside every persisted tree: which
//! solver produced it, how (path vs. subtree), and the two content keys
//! (config, tree) needed to reconstruct an index entry for it. Meta blobs
//! are the only thing `rebuild_index` needs to read to regenerate the whole
//! index from scratch.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use solver_wire::ActionSequence;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverType {
    #[serde(rename = "PREFLOP")]
    Preflop,
    #[serde(rename = "POSTFLOP")]
    Postflop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveMode {
    #[serde(rename = "PATH")]
    Path,
    #[serde(rename = "SUBTREE")]
    Subtree,
}

impl SolveMode {
    pub fn from_is_path_solve(is_path_solve: bool) -> Self {
        if is_path_solve {
            SolveMode::Path
        } else {
            SolveMode::Subtree
        }
    }

    pub fn is_path_solve(&self) -> bool {
        matches!(self, SolveMode::Path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolutionTreeMeta {
    pub solver_type: SolverType,
    pub solve_mode: SolveMode,
    pub action_sequence: String,
    pub solver_config_key: String,
    pub solution_tree_key: String,
}

impl SolutionTreeMeta {
    pub fn new(
        solver_type: SolverType,
        is_path_solve: bool,
        action_sequence: &ActionSequence,
        solver_config_key: impl Into<String>,
        solution_tree_key: impl Into<String>,
    ) -> Self {
        SolutionTreeMeta {
            solver_type,
            solve_mode: SolveMode::from_is_path_solve(is_path_solve),
            action_sequence: action_sequence.to_string(),
            solver_config_key: solver_config_key.into(),
            solution_tree_key: solution_tree_key.into(),
        }
    }

    pub fn is_path_solve(&self) -> bool {
        self.solve_mode.is_path_solve()
    }

    /// The key this meta blob is stored under: SHA-256 of its own canonical
    /// JSON, so two identical metas (e.g. re-indexing the same tree twice)
    /// collide onto the same blob instead of duplicating storage.
    pub fn content_key(&self) -> String {
        // `serde_json::Map` is backed by a `BTreeMap` unless the
        // `preserve_order` feature is enabled, so this serialization is
        // already key-sorted without any extra step.
        let bytes = serde_json::to_vec(self).expect("SolutionTreeMeta always serializes");
        let digest = Sha256::digest(&bytes);
        hex::encode(digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_key_is_stable_for_equal_metas() {
        let seq: ActionSequence = "xc".parse().unwrap();
        let a = SolutionTreeMeta::new(SolverType::Postflop, true, &seq, "cfgkey", "treekey");
        let b = SolutionTreeMeta::new(SolverType::Postflop, true, &seq, "cfgkey", "treekey");
        assert_eq!(a.content_key(), b.content_key());
    }

    #[test]
    fn round_trips_through_json() {
        let seq: ActionSequence = "r150f".parse().unwrap();
        let meta = SolutionTreeMeta::new(SolverType::Preflop, false, &seq, "abc", "def");
        let json = serde_json::to_string(&meta).unwrap();
        assert!(json.contains("\"PREFLOP\""));
        assert!(json.contains("\"SUBTREE\""));
        let decoded: SolutionTreeMeta = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, meta);
    }
}
