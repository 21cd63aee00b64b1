//! Solved-spot payloads and the action-addressed tree of them. Strategy
//! options are a small closed set of poker actions, modeled as a tagged enum
//! instead of the base-class-plus-subclass hierarchy a dynamically typed
//! implementation would use.

use std::collections::{HashMap, VecDeque};

use crate::action::{Action, ActionSequence};
use crate::blob_tree::{BlobTree, BlobTreeNode, ROOT_NODE_ID};
use crate::error::{WireError, WireResult};
use crate::primitives::{decode_i32, decode_u32, encode_i32, encode_u32, need};

const FOLD_TAG: u8 = b'f';
const CALL_TAG: u8 = b'c';
const CHECK_TAG: u8 = b'x';
const RAISE_TAG: u8 = b'r';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaiseOption {
    pub amount: i32,
    pub pot_ratio_bps: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyOption {
    Fold,
    Call,
    Check,
    Raise(RaiseOption),
}

impl StrategyOption {
    pub fn action(&self) -> Action {
        match self {
            StrategyOption::Fold => Action::Fold,
            StrategyOption::Call => Action::Call,
            StrategyOption::Check => Action::Check,
            StrategyOption::Raise(r) => Action::Raise(r.amount.max(0) as u32),
        }
    }

    pub fn encoded_len(&self) -> usize {
        match self {
            StrategyOption::Raise(_) => 1 + 4 + 4,
            _ => 1,
        }
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        match self {
            StrategyOption::Fold => buf.push(FOLD_TAG),
            StrategyOption::Call => buf.push(CALL_TAG),
            StrategyOption::Check => buf.push(CHECK_TAG),
            StrategyOption::Raise(r) => {
                buf.push(RAISE_TAG);
                encode_i32(buf, r.amount);
                encode_i32(buf, r.pot_ratio_bps);
            }
        }
    }

    pub fn decode(buf: &[u8], at: usize) -> WireResult<(StrategyOption, usize)> {
        need(buf, at, 1)?;
        let tag = buf[at];
        let at = at + 1;
        match tag {
            FOLD_TAG => Ok((StrategyOption::Fold, at)),
            CALL_TAG => Ok((StrategyOption::Call, at)),
            CHECK_TAG => Ok((StrategyOption::Check, at)),
            RAISE_TAG => {
                // Both fields round-trip unconditionally: an earlier revision
                // of this format only read `amount` for raises, silently
                // dropping `pot_ratio_bps` on decode.
                let (amount, at) = decode_i32(buf, at)?;
                let (pot_ratio_bps, at) = decode_i32(buf, at)?;
                Ok((
                    StrategyOption::Raise(RaiseOption {
                        amount,
                        pot_ratio_bps,
                    }),
                    at,
                ))
            }
            other => Err(WireError::InvalidOptionTag(other)),
        }
    }
}

pub fn encode_strategy_options(buf: &mut Vec<u8>, options: &[StrategyOption]) {
    encode_u32(buf, options.len() as u32);
    for option in options {
        option.encode(buf);
    }
}

pub fn decode_strategy_options(buf: &[u8], at: usize) -> WireResult<(Vec<StrategyOption>, usize)> {
    let (len, mut at) = decode_u32(buf, at)?;
    let mut options = Vec::with_capacity(len as usize);
    for _ in 0..len {
        let (option, next) = StrategyOption::decode(buf, at)?;
        options.push(option);
        at = next;
    }
    Ok((options, at))
}

/// Row-major 2-D matrix of signed 32-bit cells (fixed-point strategy
/// fractions or expected-value figures).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matrix2D {
    rows: u32,
    cols: u32,
    values: Vec<i32>,
}

impl Matrix2D {
    pub fn new(rows: u32, cols: u32, values: Vec<i32>) -> Self {
        assert_eq!(values.len(), rows as usize * cols as usize);
        Matrix2D { rows, cols, values }
    }

    pub fn empty() -> Self {
        Matrix2D {
            rows: 0,
            cols: 0,
            values: Vec::new(),
        }
    }

    pub fn shape(&self) -> (u32, u32) {
        (self.rows, self.cols)
    }

    pub fn values(&self) -> &[i32] {
        &self.values
    }

    pub fn get(&self, row: u32, col: u32) -> Option<i32> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.values.get((row * self.cols + col) as usize).copied()
    }

    pub fn encoded_len(&self) -> usize {
        4 + 4 + self.values.len() * 4
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        encode_u32(buf, self.rows);
        encode_u32(buf, self.cols);
        for v in &self.values {
            encode_i32(buf, *v);
        }
    }

    pub fn decode(buf: &[u8], at: usize) -> WireResult<(Matrix2D, usize)> {
        let (rows, at) = decode_u32(buf, at)?;
        let (cols, mut at) = decode_u32(buf, at)?;
        let count = rows as usize * cols as usize;
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            let (v, next) = decode_i32(buf, at)?;
            values.push(v);
            at = next;
        }
        Ok((Matrix2D { rows, cols, values }, at))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolvedSpot {
    pub strategy_options: Vec<StrategyOption>,
    pub strategy_matrix: Matrix2D,
    pub ev_matrix: Matrix2D,
}

impl SolvedSpot {
    pub fn is_leaf_spot(&self) -> bool {
        self.strategy_options.is_empty()
    }

    pub fn encoded_len(&self) -> usize {
        4 + self.strategy_options.iter().map(|o| o.encoded_len()).sum::<usize>()
            + self.strategy_matrix.encoded_len()
            + self.ev_matrix.encoded_len()
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        encode_strategy_options(buf, &self.strategy_options);
        self.strategy_matrix.encode(buf);
        self.ev_matrix.encode(buf);
    }

    pub fn decode(buf: &[u8], at: usize) -> WireResult<(SolvedSpot, usize)> {
        let (strategy_options, at) = decode_strategy_options(buf, at)?;
        let (strategy_matrix, at) = Matrix2D::decode(buf, at)?;
        let (ev_matrix, at) = Matrix2D::decode(buf, at)?;
        Ok((
            SolvedSpot {
                strategy_options,
                strategy_matrix,
                ev_matrix,
            },
            at,
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolutionTreeNode {
    pub action_sequence: ActionSequence,
    pub solved_spot: SolvedSpot,
}

impl SolutionTreeNode {
    pub fn depth(&self) -> usize {
        self.action_sequence.len()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SolutionTreeError {
    #[error("node for action sequence {0:?} not found")]
    NodeNotFound(String),
    #[error("node for action sequence {0:?} already exists")]
    DuplicateNode(String),
    #[error(transparent)]
    Wire(#[from] WireError),
}

/// Arena of solved spots keyed by action path, with an adjacency map
/// standing in for the parent/child object pointers a mutable tree would
/// otherwise need.
#[derive(Debug, Default, Clone)]
pub struct SolutionTree {
    nodes: HashMap<ActionSequence, SolutionTreeNode>,
    children: HashMap<ActionSequence, Vec<ActionSequence>>,
}

impl SolutionTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn has_node(&self, action_sequence: &ActionSequence) -> bool {
        self.nodes.contains_key(action_sequence)
    }

    pub fn get_node(&self, action_sequence: &ActionSequence) -> Option<&SolutionTreeNode> {
        self.nodes.get(action_sequence)
    }

    pub fn root_node(&self) -> Option<&SolutionTreeNode> {
        self.get_node(&ActionSequence::empty())
    }

    pub fn add_node(&mut self, node: SolutionTreeNode) -> Result<(), SolutionTreeError> {
        if self.nodes.contains_key(&node.action_sequence) {
            return Err(SolutionTreeError::DuplicateNode(node.action_sequence.to_string()));
        }
        if let Some(parent) = node.action_sequence.parent() {
            self.children.entry(parent).or_default().push(node.action_sequence.clone());
        }
        self.nodes.insert(node.action_sequence.clone(), node);
        Ok(())
    }

    pub fn child_nodes(&self, action_sequence: &ActionSequence) -> impl Iterator<Item = &SolutionTreeNode> {
        self.children
            .get(action_sequence)
            .into_iter()
            .flatten()
            .filter_map(move |seq| self.nodes.get(seq))
    }

    /// Every node on the path to `action_sequence`, starting from the root.
    pub fn nodes_on_path(&self, action_sequence: &ActionSequence) -> Vec<&SolutionTreeNode> {
        action_sequence
            .prefixes()
            .iter()
            .filter_map(|seq| self.nodes.get(seq))
            .collect()
    }

    pub fn bfs_traversal(&self, max_depth: Option<usize>) -> Vec<&SolutionTreeNode> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut queue = VecDeque::new();
        if let Some(root) = self.root_node() {
            queue.push_back(root.action_sequence.clone());
        }
        while let Some(seq) = queue.pop_front() {
            if let Some(node) = self.nodes.get(&seq) {
                if max_depth.is_some_and(|d| node.depth() > d) {
                    continue;
                }
                out.push(node);
                for child in self.children.get(&seq).into_iter().flatten() {
                    queue.push_back(child.clone());
                }
            }
        }
        out
    }

    pub fn leaf_nodes(&self) -> impl Iterator<Item = &SolutionTreeNode> {
        self.nodes
            .values()
            .filter(|n| !self.children.contains_key(&n.action_sequence))
    }

    /// Translate into the integer-`node_id`-addressed [`BlobTree`] that is
    /// actually written to disk or sent over IPC: node ids are assigned in
    /// BFS order, and each solved spot is encoded into its node's opaque
    /// payload.
    pub fn to_blob_tree(&self) -> BlobTree {
        let mut blob_tree = BlobTree::new();
        let mut ids = HashMap::new();
        for (next_id, node) in self.bfs_traversal(None).into_iter().enumerate() {
            let node_id = next_id as u32;
            ids.insert(node.action_sequence.clone(), node_id);
            let mut payload = Vec::new();
            node.solved_spot.encode(&mut payload);
            let (parent_node_id, child_id) = match node.action_sequence.parent() {
                None => (node_id, String::new()),
                Some(parent) => {
                    let parent_id = *ids.get(&parent).expect("parent visited before child in BFS order");
                    let action = node.action_sequence.actions().last().expect("non-root sequence has a last action");
                    (parent_id, action.to_string())
                }
            };
            blob_tree.add_node(BlobTreeNode {
                node_id,
                parent_node_id,
                child_id,
                payload,
            });
        }
        blob_tree
    }

    /// Inverse of [`SolutionTree::to_blob_tree`]: decode every node's
    /// payload as a [`SolvedSpot`] and re-key by action sequence.
    pub fn from_blob_tree(blob_tree: &BlobTree) -> Result<SolutionTree, SolutionTreeError> {
        let mut builder = SolutionTreeBuilder::new();
        for node in blob_tree.bfs_traversal() {
            let (solved_spot, _) = SolvedSpot::decode(&node.payload, 0)?;
            if node.node_id == ROOT_NODE_ID {
                builder.create_root_node(node.node_id, solved_spot)?;
            } else {
                let action: Action = node.child_id.parse()?;
                builder.create_child_node(node.node_id, node.parent_node_id, action, solved_spot)?;
            }
        }
        Ok(builder.build())
    }
}

impl PartialEq for SolutionTree {
    /// Strict structural equality: both trees must contain exactly the same
    /// set of action sequences with identical solved spots. A weaker
    /// `zip`-over-BFS comparison would silently treat a tree with extra
    /// trailing nodes as equal to a strict prefix of itself.
    fn eq(&self, other: &Self) -> bool {
        self.nodes.len() == other.nodes.len()
            && self.nodes.iter().all(|(seq, node)| other.nodes.get(seq) == Some(node))
    }
}

impl Eq for SolutionTree {}

/// Builder that mirrors the supervisor's decode loop: nodes arrive tagged by
/// an integer `node_id` (the blob-tree's id space) and must be translated
/// into action-sequence-addressed tree nodes as they stream in.
#[derive(Debug, Default)]
pub struct SolutionTreeBuilder {
    tree: SolutionTree,
    id_to_sequence: HashMap<u32, ActionSequence>,
}

impl SolutionTreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_root_node(&mut self, node_id: u32, solved_spot: SolvedSpot) -> Result<(), SolutionTreeError> {
        let action_sequence = ActionSequence::empty();
        self.tree.add_node(SolutionTreeNode {
            action_sequence: action_sequence.clone(),
            solved_spot,
        })?;
        self.id_to_sequence.insert(node_id, action_sequence);
        Ok(())
    }

    pub fn create_child_node(
        &mut self,
        node_id: u32,
        parent_node_id: u32,
        action: Action,
        solved_spot: SolvedSpot,
    ) -> Result<(), SolutionTreeError> {
        let parent_sequence = self
            .id_to_sequence
            .get(&parent_node_id)
            .cloned()
            .ok_or_else(|| SolutionTreeError::NodeNotFound(parent_node_id.to_string()))?;
        let action_sequence = parent_sequence.child(action);
        self.tree.add_node(SolutionTreeNode {
            action_sequence: action_sequence.clone(),
            solved_spot,
        })?;
        self.id_to_sequence.insert(node_id, action_sequence);
        Ok(())
    }

    pub fn build(self) -> SolutionTree {
        self.tree
    }

    pub fn tree(&self) -> &SolutionTree {
        &self.tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf_spot() -> SolvedSpot {
        SolvedSpot {
            strategy_options: Vec::new(),
            strategy_matrix: Matrix2D::empty(),
            ev_matrix: Matrix2D::empty(),
        }
    }

    fn branching_spot() -> SolvedSpot {
        SolvedSpot {
            strategy_options: vec![
                StrategyOption::Check,
                StrategyOption::Raise(RaiseOption {
                    amount: 150,
                    pot_ratio_bps: 5000,
                }),
            ],
            strategy_matrix: Matrix2D::new(1, 2, vec![6000, 4000]),
            ev_matrix: Matrix2D::new(1, 2, vec![12, -3]),
        }
    }

    #[test]
    fn strategy_option_raise_round_trips_both_fields() {
        let option = StrategyOption::Raise(RaiseOption {
            amount: 275,
            pot_ratio_bps: 6600,
        });
        let mut buf = Vec::new();
        option.encode(&mut buf);
        assert_eq!(buf.len(), option.encoded_len());
        let (decoded, consumed) = StrategyOption::decode(&buf, 0).unwrap();
        assert_eq!(decoded, option);
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn solved_spot_round_trips() {
        let spot = branching_spot();
        let mut buf = Vec::new();
        spot.encode(&mut buf);
        assert_eq!(buf.len(), spot.encoded_len());
        let (decoded, consumed) = SolvedSpot::decode(&buf, 0).unwrap();
        assert_eq!(decoded, spot);
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn builder_links_children_through_node_ids() {
        let mut builder = SolutionTreeBuilder::new();
        builder.create_root_node(0, branching_spot()).unwrap();
        builder.create_child_node(1, 0, Action::Check, leaf_spot()).unwrap();
        builder
            .create_child_node(2, 0, Action::Raise(150), leaf_spot())
            .unwrap();

        let tree = builder.build();
        assert_eq!(tree.node_count(), 3);
        let root_seq = ActionSequence::empty();
        let children: Vec<_> = tree.child_nodes(&root_seq).map(|n| n.action_sequence.to_string()).collect();
        assert_eq!(children, vec!["x".to_string(), "r150".to_string()]);
    }

    #[test]
    fn equality_is_strict_not_zip_truncated() {
        let mut a = SolutionTree::new();
        a.add_node(SolutionTreeNode {
            action_sequence: ActionSequence::empty(),
            solved_spot: branching_spot(),
        })
        .unwrap();
        a.add_node(SolutionTreeNode {
            action_sequence: "x".parse().unwrap(),
            solved_spot: leaf_spot(),
        })
        .unwrap();

        let mut b = a.clone();
        b.add_node(SolutionTreeNode {
            action_sequence: "r150".parse().unwrap(),
            solved_spot: leaf_spot(),
        })
        .unwrap();

        assert_ne!(a, b);
    }

    #[test]
    fn nodes_on_path_includes_root() {
        let mut builder = SolutionTreeBuilder::new();
        builder.create_root_node(0, branching_spot()).unwrap();
        builder.create_child_node(1, 0, Action::Check, leaf_spot()).unwrap();
        let tree = builder.build();

        let path = tree.nodes_on_path(&"x".parse().unwrap());
        assert_eq!(path.len(), 2);
        assert!(path[0].action_sequence.is_empty());
    }

    #[test]
    fn blob_tree_round_trip_preserves_structure_and_spots() {
        let mut builder = SolutionTreeBuilder::new();
        builder.create_root_node(0, branching_spot()).unwrap();
        builder.create_child_node(1, 0, Action::Check, leaf_spot()).unwrap();
        builder
            .create_child_node(2, 0, Action::Raise(150), leaf_spot())
            .unwrap();
        let tree = builder.build();

        let blob_tree = tree.to_blob_tree();
        let decoded = SolutionTree::from_blob_tree(&blob_tree).unwrap();
        assert_eq!(decoded, tree);

        // on-disk byte layout also round-trips through a fresh decode.
        let bytes = blob_tree.encode_all();
        let reloaded_blob_tree = BlobTree::decode_all(&bytes).unwrap();
        assert_eq!(SolutionTree::from_blob_tree(&reloaded_blob_tree).unwrap(), tree);
    }
}
