//! Arena-backed tree of opaque byte payloads, addressed by an integer
//! `node_id` rather than owning parent/child pointers — this lets a tree be
//! built incrementally from a stream of wire-decoded nodes without the
//! borrow-checker fighting a cyclic parent/child graph.

use std::collections::{HashMap, VecDeque};

use crate::error::WireResult;
use crate::primitives::{decode_bytes, decode_string, decode_u32, encode_bytes, encode_string, encode_u32};

pub const ROOT_NODE_ID: u32 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobTreeNode {
    pub node_id: u32,
    pub parent_node_id: u32,
    /// Label of the edge connecting this node to its parent (the empty
    /// string for the root, which has no incoming edge).
    pub child_id: String,
    pub payload: Vec<u8>,
}

impl BlobTreeNode {
    pub fn is_root(&self) -> bool {
        self.node_id == self.parent_node_id
    }

    pub fn encoded_len(&self) -> usize {
        4 + 4 + 4 + self.child_id.len() + 4 + self.payload.len()
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        encode_u32(buf, self.node_id);
        encode_u32(buf, self.parent_node_id);
        encode_string(buf, &self.child_id);
        encode_bytes(buf, &self.payload);
    }

    pub fn decode(buf: &[u8], at: usize) -> WireResult<(BlobTreeNode, usize)> {
        let (node_id, at) = decode_u32(buf, at)?;
        let (parent_node_id, at) = decode_u32(buf, at)?;
        let (child_id, at) = decode_string(buf, at)?;
        let (payload, at) = decode_bytes(buf, at)?;
        Ok((
            BlobTreeNode {
                node_id,
                parent_node_id,
                child_id,
                payload,
            },
            at,
        ))
    }
}

#[derive(Debug, Default, Clone)]
pub struct BlobTree {
    nodes: HashMap<u32, BlobTreeNode>,
    children: HashMap<u32, Vec<u32>>,
}

impl BlobTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_node(&self, node_id: u32) -> Option<&BlobTreeNode> {
        self.nodes.get(&node_id)
    }

    pub fn root_node(&self) -> Option<&BlobTreeNode> {
        self.nodes.get(&ROOT_NODE_ID)
    }

    pub fn add_node(&mut self, node: BlobTreeNode) {
        if !node.is_root() {
            self.children.entry(node.parent_node_id).or_default().push(node.node_id);
        }
        self.nodes.insert(node.node_id, node);
    }

    pub fn child_nodes(&self, node_id: u32) -> impl Iterator<Item = &BlobTreeNode> {
        self.children
            .get(&node_id)
            .into_iter()
            .flatten()
            .filter_map(move |id| self.nodes.get(id))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in breadth-first order starting from the root. Empty if there
    /// is no root node yet.
    pub fn bfs_traversal(&self) -> Vec<&BlobTreeNode> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut queue = VecDeque::new();
        if let Some(root) = self.root_node() {
            queue.push_back(root.node_id);
        }
        while let Some(node_id) = queue.pop_front() {
            if let Some(node) = self.nodes.get(&node_id) {
                out.push(node);
                for child in self.children.get(&node_id).into_iter().flatten() {
                    queue.push_back(*child);
                }
            }
        }
        out
    }

    /// Concatenate every node's wire encoding, in BFS order, with no outer
    /// framing — this is exactly the on-disk/on-wire layout: readers
    /// iterate by decoding one record at a time until the buffer is
    /// exhausted.
    pub fn encode_all(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for node in self.bfs_traversal() {
            node.encode(&mut buf);
        }
        buf
    }

    /// Inverse of [`BlobTree::encode_all`]: decode records back-to-back
    /// until the buffer is exhausted, inserting each as it is read. Nodes
    /// must appear parent-before-child in the stream, matching the BFS
    /// emission order.
    pub fn decode_all(buf: &[u8]) -> WireResult<BlobTree> {
        let mut tree = BlobTree::new();
        let mut at = 0usize;
        while at < buf.len() {
            let (node, next) = BlobTreeNode::decode(buf, at)?;
            at = next;
            tree.add_node(node);
        }
        Ok(tree)
    }
}

impl PartialEq for BlobTree {
    fn eq(&self, other: &Self) -> bool {
        let a = self.bfs_traversal();
        let b = other.bfs_traversal();
        a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y)
    }
}

impl Eq for BlobTree {}
