use std::path::Path;

use serde_json::Value;
use sha2::{Digest, Sha256};
use solver_blobstore::BlobStore;
use solver_wire::{ActionSequence, SolutionTree};

use crate::error::{TreeStoreError, TreeStoreResult};
use crate::index::{compute_postflop_index_key, compute_preflop_index_key, Index, IndexEntry};
use crate::meta::{SolutionTreeMeta, SolverType};

const SOLUTION_TREE_PREFIX: &str = "solution-tree";
const SOLUTION_TREE_META_PREFIX: &str = "solution-tree-meta";
const PREFLOP_SOLVER_CONFIG_PREFIX: &str = "preflop-solver-config";
const POSTFLOP_SOLVER_CONFIG_PREFIX: &str = "postflop-solver-config";
const INDEX_PREFIX: &str = "index";

fn config_prefix(solver_type: SolverType) -> &'static str {
    match solver_type {
        SolverType::Preflop => PREFLOP_SOLVER_CONFIG_PREFIX,
        SolverType::Postflop => POSTFLOP_SOLVER_CONFIG_PREFIX,
    }
}

fn compute_index_key(solver_type: SolverType, is_path_solve: bool, action_sequence: &ActionSequence, solver_config: &Value) -> String {
    match solver_type {
        SolverType::Preflop => compute_preflop_index_key(is_path_solve, action_sequence, solver_config),
        SolverType::Postflop => compute_postflop_index_key(is_path_solve, action_sequence, solver_config),
    }
}

fn canonical_json_bytes(value: &Value) -> Vec<u8> {
    // `serde_json::Map` is a `BTreeMap` unless `preserve_order` is enabled,
    // so this is already sorted-key canonical JSON.
    serde_json::to_vec(value).expect("JSON value always serializes")
}

/// Content-addressed persistence for solved-spot trees on top of
/// [`solver_blobstore::BlobStore`] and the [`solver_wire`] tree codec, with
/// an in-memory index of solver-fingerprint -> stored-tree mappings that can
/// be saved, merged from disk, and rebuilt from the meta blobs alone.
pub struct SolutionTreeStore {
    blob_store: BlobStore,
    index: Index,
}

impl SolutionTreeStore {
    /// Open a store rooted at `root`, merging every `index/*` blob found on
    /// disk into the in-memory index. An empty or freshly created directory
    /// yields an empty index, not an error.
    pub fn open(root: impl Into<std::path::PathBuf>) -> TreeStoreResult<Self> {
        let blob_store = BlobStore::new(root.into());
        let index = Self::load_and_merge_indexes(&blob_store)?;
        Ok(SolutionTreeStore { blob_store, index })
    }

    pub fn root(&self) -> &Path {
        self.blob_store.root()
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    fn load_and_merge_indexes(blob_store: &BlobStore) -> TreeStoreResult<Index> {
        let keys = blob_store.list_keys(INDEX_PREFIX)?;
        let mut indexes = Vec::with_capacity(keys.len());
        for key in keys {
            let bytes = blob_store.get_blob_bytes(INDEX_PREFIX, &key)?;
            let value: Value = serde_json::from_slice(&bytes)?;
            indexes.push(Index::from_canonical_json(&value)?);
        }
        Ok(Index::merge(indexes))
    }

    fn add_solution_tree(
        &mut self,
        solver_type: SolverType,
        solver_config: Value,
        action_sequence: &ActionSequence,
        is_path_solve: bool,
        tree: &SolutionTree,
    ) -> TreeStoreResult<IndexEntry> {
        let tree_bytes = tree.to_blob_tree().encode_all();
        let solution_tree_key = hex::encode(Sha256::digest(&tree_bytes));
        let config_bytes = canonical_json_bytes(&solver_config);
        let solver_config_key = hex::encode(Sha256::digest(&config_bytes));

        self.blob_store
            .add_compressed_blob_from_bytes(SOLUTION_TREE_PREFIX, &solution_tree_key, &tree_bytes)?;
        self.blob_store
            .add_compressed_blob_from_bytes(config_prefix(solver_type), &solver_config_key, &config_bytes)?;

        let meta = SolutionTreeMeta::new(solver_type, is_path_solve, action_sequence, &solver_config_key, &solution_tree_key);
        let meta_bytes = serde_json::to_vec(&meta)?;
        self.blob_store
            .add_blob_from_bytes(SOLUTION_TREE_META_PREFIX, &meta.content_key(), &meta_bytes)?;

        let index_key = compute_index_key(solver_type, is_path_solve, action_sequence, &solver_config);
        let entry = IndexEntry::new(index_key, solver_config_key, solution_tree_key);
        self.index.add_entry(entry.clone());
        Ok(entry)
    }

    pub fn add_preflop(
        &mut self,
        solver_config: Value,
        action_sequence: &ActionSequence,
        is_path_solve: bool,
        tree: &SolutionTree,
    ) -> TreeStoreResult<IndexEntry> {
        self.add_solution_tree(SolverType::Preflop, solver_config, action_sequence, is_path_solve, tree)
    }

    pub fn add_postflop(
        &mut self,
        solver_config: Value,
        action_sequence: &ActionSequence,
        is_path_solve: bool,
        tree: &SolutionTree,
    ) -> TreeStoreResult<IndexEntry> {
        self.add_solution_tree(SolverType::Postflop, solver_config, action_sequence, is_path_solve, tree)
    }

    /// Serialize the current in-memory index to a brand-new blob under
    /// `index/`, keyed by the SHA-256 of its own canonical JSON. Multiple
    /// writers calling this concurrently simply produce multiple index
    /// blobs, reconciled on the next `open`/`rebuild_index`.
    pub fn save_index(&mut self) -> TreeStoreResult<()> {
        let json = self.index.to_canonical_json();
        let bytes = canonical_json_bytes(&json);
        let key = hex::encode(Sha256::digest(&bytes));
        self.blob_store.add_compressed_blob_from_bytes(INDEX_PREFIX, &key, &bytes)?;
        Ok(())
    }

    /// Rescan every `solution-tree-meta/` blob, recomputing its index entry
    /// against the stored config blob, and replace the in-memory index
    /// wholesale. This is the store's self-healing path: it needs nothing
    /// but the meta and config blobs to reconstruct a correct index.
    pub fn rebuild_index(&mut self) -> TreeStoreResult<()> {
        let mut rebuilt = Index::empty();
        for meta_key in self.blob_store.list_keys(SOLUTION_TREE_META_PREFIX)? {
            let meta = self.read_meta(&meta_key)?;
            let config = self.read_config(meta.solver_type, &meta.solver_config_key)?;
            let action_sequence: ActionSequence = meta
                .action_sequence
                .parse()
                .map_err(|e: solver_wire::WireError| TreeStoreError::InvalidMeta(e.to_string()))?;
            let index_key = compute_index_key(meta.solver_type, meta.is_path_solve(), &action_sequence, &config);
            rebuilt.add_entry(IndexEntry::new(index_key, meta.solver_config_key, meta.solution_tree_key));
        }
        self.index = rebuilt;
        Ok(())
    }

    /// Delete every on-disk index blob strictly smaller than the current
    /// in-memory index. Callers must `save_index()` first, or the current
    /// index may itself be culled as "small" before it has a chance to be
    /// durable.
    pub fn clean_up_indexes(&mut self) -> TreeStoreResult<()> {
        let current_size = self.index.size();
        for key in self.blob_store.list_keys(INDEX_PREFIX)? {
            let bytes = self.blob_store.get_blob_bytes(INDEX_PREFIX, &key)?;
            let value: Value = serde_json::from_slice(&bytes)?;
            let candidate = Index::from_canonical_json(&value)?;
            if candidate.size() < current_size {
                self.blob_store.delete_blob(INDEX_PREFIX, &key)?;
            }
        }
        Ok(())
    }

    pub fn get_solution_tree(&self, key: &str) -> TreeStoreResult<SolutionTree> {
        let bytes = self.blob_store.get_blob_bytes(SOLUTION_TREE_PREFIX, key)?;
        let blob_tree = solver_wire::BlobTree::decode_all(&bytes)?;
        Ok(SolutionTree::from_blob_tree(&blob_tree)?)
    }

    fn read_meta(&self, key: &str) -> TreeStoreResult<SolutionTreeMeta> {
        let bytes = self.blob_store.get_blob_bytes(SOLUTION_TREE_META_PREFIX, key)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn get_meta(&self, key: &str) -> TreeStoreResult<SolutionTreeMeta> {
        self.read_meta(key)
    }

    fn read_config(&self, solver_type: SolverType, key: &str) -> TreeStoreResult<Value> {
        let bytes = self.blob_store.get_blob_bytes(config_prefix(solver_type), key)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn get_preflop_config(&self, key: &str) -> TreeStoreResult<Value> {
        self.read_config(SolverType::Preflop, key)
    }

    pub fn get_postflop_config(&self, key: &str) -> TreeStoreResult<Value> {
        self.read_config(SolverType::Postflop, key)
    }

    /// Entries matching `(is_path_solve, action_sequence, solver_config,
    /// solver_type)`'s fingerprint. Empty if nothing has ever been stored
    /// under that exact index key.
    pub fn lookup(
        &self,
        is_path_solve: bool,
        action_sequence: &ActionSequence,
        solver_config: &Value,
        solver_type: SolverType,
    ) -> Vec<IndexEntry> {
        let index_key = compute_index_key(solver_type, is_path_solve, action_sequence, solver_config);
        self.index.entries_for_key(&index_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use solver_wire::{Action, Matrix2D, SolutionTreeBuilder, SolvedSpot, StrategyOption};
    use tempfile::tempdir;

    fn sample_tree() -> SolutionTree {
        let mut builder = SolutionTreeBuilder::new();
        builder
            .create_root_node(
                0,
                SolvedSpot {
                    strategy_options: vec![StrategyOption::Check, StrategyOption::Fold],
                    strategy_matrix: Matrix2D::new(1, 2, vec![6000, 4000]),
                    ev_matrix: Matrix2D::new(1, 2, vec![5, -5]),
                },
            )
            .unwrap();
        builder
            .create_child_node(
                1,
                0,
                Action::Check,
                SolvedSpot {
                    strategy_options: Vec::new(),
                    strategy_matrix: Matrix2D::empty(),
                    ev_matrix: Matrix2D::empty(),
                },
            )
            .unwrap();
        builder.build()
    }

    #[test]
    fn add_save_clean_up_leaves_exactly_one_index() {
        let dir = tempdir().unwrap();
        let mut store = SolutionTreeStore::open(dir.path()).unwrap();
        let seq: ActionSequence = "x".parse().unwrap();
        store
            .add_postflop(json!({"stack": 100, "solving_time": 30}), &seq, true, &sample_tree())
            .unwrap();
        store.save_index().unwrap();
        store.clean_up_indexes().unwrap();

        assert_eq!(store.blob_store.list_keys(INDEX_PREFIX).unwrap().len(), 1);
    }

    #[test]
    fn postflop_configs_differing_only_in_solving_time_share_an_index_key() {
        let dir = tempdir().unwrap();
        let mut store = SolutionTreeStore::open(dir.path()).unwrap();
        let seq: ActionSequence = "x".parse().unwrap();
        let entry_a = store
            .add_postflop(json!({"stack": 100, "solving_time": 10}), &seq, true, &sample_tree())
            .unwrap();
        let entry_b = store
            .add_postflop(json!({"stack": 100, "solving_time": 99999}), &seq, true, &sample_tree())
            .unwrap();
        assert_eq!(entry_a.index_key, entry_b.index_key);
    }

    #[test]
    fn rebuild_index_matches_the_original() {
        let dir = tempdir().unwrap();
        let mut store = SolutionTreeStore::open(dir.path()).unwrap();
        let seq: ActionSequence = "xc".parse().unwrap();
        store
            .add_preflop(json!({"stack": 50}), &seq, false, &sample_tree())
            .unwrap();
        let before = store.index().to_canonical_json();

        store.rebuild_index().unwrap();
        let after = store.index().to_canonical_json();
        assert_eq!(before, after);
    }

    #[test]
    fn lookup_round_trips_to_the_stored_tree() {
        let dir = tempdir().unwrap();
        let mut store = SolutionTreeStore::open(dir.path()).unwrap();
        let seq: ActionSequence = "x".parse().unwrap();
        let config = json!({"stack": 100});
        let tree = sample_tree();
        store.add_preflop(config.clone(), &seq, true, &tree).unwrap();

        let entries = store.lookup(true, &seq, &config, SolverType::Preflop);
        assert_eq!(entries.len(), 1);
        let fetched = store.get_solution_tree(&entries[0].solution_tree_key).unwrap();
        assert_eq!(fetched, tree);
    }

    #[test]
    fn open_on_fresh_directory_is_an_empty_index() {
        let dir = tempdir().unwrap();
        let store = SolutionTreeStore::open(dir.path()).unwrap();
        assert!(store.index().is_empty());
    }
}
