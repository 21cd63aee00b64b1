//! The solution-tree store's index: a fingerprint (`index_key`) computed
//! from `(solver_type, solve_mode, action_sequence, solver_config)` mapping
//! to the set of `(solver_config_key, solution_tree_key)` pairs that were
//! ever stored under that fingerprint. Multiple writers may append distinct
//! `index/*` blobs concurrently; they are reconciled by set union, never by
//! last-writer-wins.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use solver_wire::ActionSequence;

use crate::error::{TreeStoreError, TreeStoreResult};
use crate::meta::SolverType;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct IndexEntry {
    pub index_key: String,
    pub solver_config_key: String,
    pub solution_tree_key: String,
}

impl IndexEntry {
    pub fn new(
        index_key: impl Into<String>,
        solver_config_key: impl Into<String>,
        solution_tree_key: impl Into<String>,
    ) -> Self {
        IndexEntry {
            index_key: index_key.into(),
            solver_config_key: solver_config_key.into(),
            solution_tree_key: solution_tree_key.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireEntry {
    solver_config_key: String,
    solution_tree_key: String,
}

/// Mapping from `index_key` to an unordered set of `(config_key, tree_key)`
/// pairs. The `BTreeSet` is an implementation convenience for deterministic
/// iteration; the wire schema treats each bucket as an unordered set and
/// merge is always plain set union.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Index {
    entries: BTreeMap<String, BTreeSet<(String, String)>>,
}

impl Index {
    pub fn empty() -> Self {
        Index::default()
    }

    pub fn add_entry(&mut self, entry: IndexEntry) {
        self.entries
            .entry(entry.index_key)
            .or_default()
            .insert((entry.solver_config_key, entry.solution_tree_key));
    }

    /// Total number of `(index_key, config_key, tree_key)` triples across
    /// every bucket.
    pub fn size(&self) -> usize {
        self.entries.values().map(|set| set.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries_for_key(&self, index_key: &str) -> Vec<IndexEntry> {
        self.entries
            .get(index_key)
            .into_iter()
            .flatten()
            .map(|(config_key, tree_key)| IndexEntry::new(index_key, config_key.clone(), tree_key.clone()))
            .collect()
    }

    pub fn all_entries(&self) -> Vec<IndexEntry> {
        self.entries
            .iter()
            .flat_map(|(index_key, set)| {
                set.iter()
                    .map(move |(config_key, tree_key)| IndexEntry::new(index_key.clone(), config_key.clone(), tree_key.clone()))
            })
            .collect()
    }

    /// Union of every bucket across all given indexes.
    pub fn merge(indexes: impl IntoIterator<Item = Index>) -> Index {
        let mut result = Index::empty();
        for index in indexes {
            for entry in index.all_entries() {
                result.add_entry(entry);
            }
        }
        result
    }

    /// Canonical JSON form: an object keyed by `index_key`, each value a
    /// list of `{solver_config_key, solution_tree_key}` sorted by
    /// `(index_key, solver_config_key, solution_tree_key)` so that the same
    /// set of entries always serializes to identical bytes regardless of
    /// insertion order.
    pub fn to_canonical_json(&self) -> Value {
        let mut out = serde_json::Map::new();
        for (index_key, set) in &self.entries {
            let list: Vec<Value> = set
                .iter()
                .map(|(config_key, tree_key)| {
                    json!({
                        "solver_config_key": config_key,
                        "solution_tree_key": tree_key,
                    })
                })
                .collect();
            out.insert(index_key.clone(), Value::Array(list));
        }
        Value::Object(out)
    }

    pub fn from_canonical_json(value: &Value) -> TreeStoreResult<Index> {
        let object = value
            .as_object()
            .ok_or_else(|| TreeStoreError::InvalidIndex("index root must be a JSON object".to_string()))?;
        let mut index = Index::empty();
        for (index_key, entries) in object {
            let list = entries
                .as_array()
                .ok_or_else(|| TreeStoreError::InvalidIndex(format!("entries for `{index_key}` must be a list")))?;
            for entry in list {
                let wire: WireEntry = serde_json::from_value(entry.clone())
                    .map_err(|e| TreeStoreError::InvalidIndex(format!("entry under `{index_key}`: {e}")))?;
                index.add_entry(IndexEntry::new(index_key.clone(), wire.solver_config_key, wire.solution_tree_key));
            }
        }
        Ok(index)
    }

    pub fn content_key(&self) -> String {
        let bytes = serde_json::to_vec(&self.to_canonical_json()).expect("index json always serializes");
        hex::encode(Sha256::digest(&bytes))
    }
}

fn index_key_dict(solver_type: SolverType, is_path_solve: bool, action_sequence: &ActionSequence, solver_config: &Value) -> Value {
    json!({
        "solver_type": match solver_type {
            SolverType::Preflop => "PREFLOP",
            SolverType::Postflop => "POSTFLOP",
        },
        "solve_mode": if is_path_solve { "PATH" } else { "SUBTREE" },
        "action_sequence": action_sequence.to_string(),
        "solver_config": solver_config,
    })
}

/// Blank the `solving_time` field of a postflop config before fingerprinting
/// so that two runs of the same spot differing only in wall-clock solve
/// budget collide onto the same index key.
fn blank_solving_time(solver_config: &Value) -> Value {
    let mut config = solver_config.clone();
    if let Value::Object(map) = &mut config {
        map.insert("solving_time".to_string(), Value::Null);
    }
    config
}

pub fn compute_preflop_index_key(is_path_solve: bool, action_sequence: &ActionSequence, solver_config: &Value) -> String {
    let dict = index_key_dict(SolverType::Preflop, is_path_solve, action_sequence, solver_config);
    let bytes = serde_json::to_vec(&dict).expect("index key dict always serializes");
    hex::encode(Sha256::digest(&bytes))
}

pub fn compute_postflop_index_key(is_path_solve: bool, action_sequence: &ActionSequence, solver_config: &Value) -> String {
    let blanked = blank_solving_time(solver_config);
    let dict = index_key_dict(SolverType::Postflop, is_path_solve, action_sequence, &blanked);
    let bytes = serde_json::to_vec(&dict).expect("index key dict always serializes");
    hex::encode(Sha256::digest(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_is_set_union_across_indexes() {
        let seq = ActionSequence::empty();
        let mut a = Index::empty();
        a.add_entry(IndexEntry::new("k", "c1", "t1"));
        let mut b = Index::empty();
        b.add_entry(IndexEntry::new("k", "c1", "t1"));
        b.add_entry(IndexEntry::new("k", "c2", "t2"));

        let merged = Index::merge([a, b]);
        assert_eq!(merged.size(), 2);
        let _ = seq;
    }

    #[test]
    fn postflop_index_key_ignores_solving_time() {
        let seq: ActionSequence = "xc".parse().unwrap();
        let config_a = json!({"stack": 100, "solving_time": 30});
        let config_b = json!({"stack": 100, "solving_time": 9999});
        let key_a = compute_postflop_index_key(true, &seq, &config_a);
        let key_b = compute_postflop_index_key(true, &seq, &config_b);
        assert_eq!(key_a, key_b);
    }

    #[test]
    fn preflop_index_key_is_sensitive_to_every_field() {
        let seq: ActionSequence = "xc".parse().unwrap();
        let config_a = json!({"stack": 100});
        let config_b = json!({"stack": 200});
        assert_ne!(
            compute_preflop_index_key(true, &seq, &config_a),
            compute_preflop_index_key(true, &seq, &config_b)
        );
    }

    #[test]
    fn canonical_json_round_trips() {
        let mut index = Index::empty();
        index.add_entry(IndexEntry::new("k1", "c1", "t1"));
        index.add_entry(IndexEntry::new("k1", "c2", "t2"));
        index.add_entry(IndexEntry::new("k2", "c3", "t3"));

        let json = index.to_canonical_json();
        let decoded = Index::from_canonical_json(&json).unwrap();
        assert_eq!(decoded, index);
    }

    #[test]
    fn rejects_malformed_index_json() {
        let bad = json!({"k": [{"solver_config_key": "c1"}]});
        assert!(Index::from_canonical_json(&bad).is_err());
    }
}
