//! The compact Merkle tree: the right edge "frontier" of an RFC 6962 tree,
//! stored as at most one node hash per level. Appending and recomputing the
//! root are both O(log n), and the frontier is cheap to persist so the tree
//! signer can resume after a crash without replaying every leaf.
//!
//! The frontier mirrors the binary representation of the tree size: level
//! `i` holds a value exactly when bit `i` of `size` is set, and that value
//! is the hash of the complete, not-yet-merged subtree of `2^i` leaves
//! ending at the current right edge.

use serde::{Deserialize, Serialize};

use ctlog_core::hash::{empty_tree_hash, leaf_hash, node_hash};
use ctlog_core::types::Digest;

/// A persistable snapshot of a `CompactMerkleTree`'s frontier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactTreeSnapshot {
    pub size: u64,
    pub frontier: Vec<Option<Digest>>,
}

/// The right-edge frontier of an append-only Merkle tree.
#[derive(Debug, Clone, Default)]
pub struct CompactMerkleTree {
    size: u64,
    frontier: Vec<Option<Digest>>,
}

impl CompactMerkleTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rehydrate a tree from a previously persisted frontier, e.g. after the
    /// signer restarts mid-sequencing run.
    pub fn from_snapshot(snapshot: CompactTreeSnapshot) -> Self {
        Self {
            size: snapshot.size,
            frontier: snapshot.frontier,
        }
    }

    pub fn snapshot(&self) -> CompactTreeSnapshot {
        CompactTreeSnapshot {
            size: self.size,
            frontier: self.frontier.clone(),
        }
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Hash `leaf_input` and append it to the tree.
    pub fn push_leaf(&mut self, leaf_input: &[u8]) -> Digest {
        let hash = leaf_hash(leaf_input);
        self.push_leaf_hash(hash);
        hash
    }

    /// Append an already-computed leaf hash to the tree.
    pub fn push_leaf_hash(&mut self, leaf_hash: Digest) {
        let mut node = leaf_hash;
        let mut size = self.size;
        let mut level = 0usize;
        while size & 1 == 1 {
            let sibling = self.frontier[level]
                .take()
                .expect("bit set implies frontier slot is occupied");
            node = node_hash(&sibling, &node);
            size >>= 1;
            level += 1;
        }
        if level >= self.frontier.len() {
            self.frontier.resize(level + 1, None);
        }
        self.frontier[level] = Some(node);
        self.size += 1;
    }

    /// The current tree's Merkle root.
    pub fn root(&self) -> Digest {
        if self.size == 0 {
            return empty_tree_hash();
        }
        let mut acc: Option<Digest> = None;
        for slot in self.frontier.iter().rev() {
            if let Some(hash) = slot {
                acc = Some(match acc {
                    None => *hash,
                    Some(accumulated) => node_hash(&accumulated, hash),
                });
            }
        }
        acc.expect("non-zero size implies at least one occupied frontier slot")
    }
}
