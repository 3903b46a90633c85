//! The full RFC 6962 Merkle tree over a dense, append-only leaf array.
//!
//! `DenseMerkleTree` keeps every leaf hash in memory and memoises internal
//! node hashes in a `(start, count)`-keyed cache so that repeated
//! `root_at`/proof calls over overlapping ranges don't redo the hashing.
//! Node hashes never change once computed (append-only), so the cache is
//! never invalidated, only grown.

use std::cell::RefCell;
use std::collections::HashMap;

use ctlog_core::errors::CtLogError;
use ctlog_core::hash::{empty_tree_hash, node_hash};
use ctlog_core::types::Digest;

use crate::util::largest_pow2_lt;

/// A dense, in-memory Merkle tree. Every appended leaf hash is retained, so
/// memory use is O(n). Used by the log lookup service, which needs to answer
/// inclusion and consistency proofs against arbitrary historical sizes.
#[derive(Default)]
pub struct DenseMerkleTree {
    leaves: Vec<Digest>,
    cache: RefCell<HashMap<(u64, u64), Digest>>,
}

impl DenseMerkleTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from already-hashed leaves, e.g. when rehydrating from
    /// storage.
    pub fn from_leaf_hashes(leaves: Vec<Digest>) -> Self {
        Self {
            leaves,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn size(&self) -> u64 {
        self.leaves.len() as u64
    }

    pub fn leaf_hashes(&self) -> &[Digest] {
        &self.leaves
    }

    /// Append a leaf hash (the caller has already applied the `0x00` leaf
    /// prefix) and return the new tree size.
    pub fn append(&mut self, leaf_hash: Digest) -> u64 {
        self.leaves.push(leaf_hash);
        self.leaves.len() as u64
    }

    /// The Merkle Tree Hash of the first `size` leaves.
    pub fn root_at(&self, size: u64) -> Result<Digest, CtLogError> {
        if size > self.size() {
            return Err(CtLogError::validation(format!(
                "root_at({size}) requested but tree only has {} leaves",
                self.size()
            )));
        }
        Ok(self.mth(0, size))
    }

    fn mth(&self, start: u64, count: u64) -> Digest {
        if count == 0 {
            return empty_tree_hash();
        }
        if count == 1 {
            return self.leaves[start as usize];
        }
        if let Some(hash) = self.cache.borrow().get(&(start, count)) {
            return *hash;
        }
        let k = largest_pow2_lt(count);
        let left = self.mth(start, k);
        let right = self.mth(start + k, count - k);
        let hash = node_hash(&left, &right);
        self.cache.borrow_mut().insert((start, count), hash);
        hash
    }

    /// An inclusion proof for the leaf at `leaf_index` (0-based) against a
    /// tree of size `tree_size`.
    pub fn inclusion_proof(&self, leaf_index: u64, tree_size: u64) -> Result<Vec<Digest>, CtLogError> {
        if tree_size > self.size() {
            return Err(CtLogError::validation(format!(
                "inclusion_proof: tree_size {tree_size} exceeds stored leaves {}",
                self.size()
            )));
        }
        if leaf_index >= tree_size {
            return Err(CtLogError::validation(format!(
                "inclusion_proof: leaf_index {leaf_index} out of range for tree_size {tree_size}"
            )));
        }
        Ok(self.path(leaf_index, 0, tree_size))
    }

    fn path(&self, leaf_index: u64, start: u64, count: u64) -> Vec<Digest> {
        if count == 1 {
            return Vec::new();
        }
        let k = largest_pow2_lt(count);
        if leaf_index < k {
            let mut proof = self.path(leaf_index, start, k);
            proof.push(self.mth(start + k, count - k));
            proof
        } else {
            let mut proof = self.path(leaf_index - k, start + k, count - k);
            proof.push(self.mth(start, k));
            proof
        }
    }

    /// A consistency proof showing that the tree of size `new_size` is an
    /// extension of the tree of size `old_size`.
    pub fn consistency_proof(&self, old_size: u64, new_size: u64) -> Result<Vec<Digest>, CtLogError> {
        if old_size > new_size {
            return Err(CtLogError::validation(format!(
                "consistency_proof: old_size {old_size} exceeds new_size {new_size}"
            )));
        }
        if new_size > self.size() {
            return Err(CtLogError::validation(format!(
                "consistency_proof: new_size {new_size} exceeds stored leaves {}",
                self.size()
            )));
        }
        if old_size == 0 || old_size == new_size {
            return Ok(Vec::new());
        }
        Ok(self.subproof(old_size, 0, new_size, true))
    }

    fn subproof(&self, m: u64, start: u64, n: u64, b: bool) -> Vec<Digest> {
        if m == n {
            if b {
                Vec::new()
            } else {
                vec![self.mth(start, n)]
            }
        } else {
            let k = largest_pow2_lt(n);
            if m <= k {
                let mut proof = self.subproof(m, start, k, b);
                proof.push(self.mth(start + k, n - k));
                proof
            } else {
                let mut proof = self.subproof(m - k, start + k, n - k, false);
                proof.push(self.mth(start, k));
                proof
            }
        }
    }
}

/// Recompute a root from a leaf hash, its position, and an inclusion proof.
/// Used by monitors and clients that only hold the proof, not the tree.
pub fn verify_inclusion_proof(
    leaf_hash: Digest,
    leaf_index: u64,
    tree_size: u64,
    proof: &[Digest],
    root_hash: &Digest,
) -> Result<(), CtLogError> {
    if leaf_index >= tree_size {
        return Err(CtLogError::validation(format!(
            "leaf_index {leaf_index} out of range for tree_size {tree_size}"
        )));
    }
    let mut iter = proof.iter().copied();
    let computed = reconstruct_path(leaf_index, tree_size, leaf_hash, &mut iter)?;
    if iter.next().is_some() {
        return Err(CtLogError::validation("inclusion proof has trailing elements"));
    }
    if &computed != root_hash {
        return Err(CtLogError::validation("inclusion proof does not match root hash"));
    }
    Ok(())
}

fn reconstruct_path(
    leaf_index: u64,
    count: u64,
    leaf_hash: Digest,
    proof: &mut impl Iterator<Item = Digest>,
) -> Result<Digest, CtLogError> {
    if count == 1 {
        return Ok(leaf_hash);
    }
    let k = largest_pow2_lt(count);
    let short = || CtLogError::validation("inclusion proof ended early");
    if leaf_index < k {
        let left = reconstruct_path(leaf_index, k, leaf_hash, proof)?;
        let right = proof.next().ok_or_else(short)?;
        Ok(node_hash(&left, &right))
    } else {
        let right = reconstruct_path(leaf_index - k, count - k, leaf_hash, proof)?;
        let left = proof.next().ok_or_else(short)?;
        Ok(node_hash(&left, &right))
    }
}

/// Verify that `new_root` at `new_size` is a consistent extension of
/// `old_root` at `old_size`, given a consistency proof.
pub fn verify_consistency_proof(
    old_size: u64,
    new_size: u64,
    old_root: &Digest,
    new_root: &Digest,
    proof: &[Digest],
) -> Result<(), CtLogError> {
    if old_size > new_size {
        return Err(CtLogError::validation("old_size exceeds new_size"));
    }
    if old_size == 0 {
        return Ok(());
    }
    if old_size == new_size {
        if !proof.is_empty() {
            return Err(CtLogError::validation("consistency proof for equal sizes must be empty"));
        }
        return if old_root == new_root {
            Ok(())
        } else {
            Err(CtLogError::validation("old_root and new_root differ for equal tree sizes"))
        };
    }
    let mut iter = proof.iter().copied();
    let (reconstructed_old, reconstructed_new) =
        reconstruct_subproof(old_size, new_size, true, old_root, &mut iter)?;
    if iter.next().is_some() {
        return Err(CtLogError::validation("consistency proof has trailing elements"));
    }
    if &reconstructed_old != old_root {
        return Err(CtLogError::validation("consistency proof does not match old root"));
    }
    if &reconstructed_new != new_root {
        return Err(CtLogError::validation("consistency proof does not match new root"));
    }
    Ok(())
}

fn reconstruct_subproof(
    m: u64,
    n: u64,
    b: bool,
    old_root: &Digest,
    proof: &mut impl Iterator<Item = Digest>,
) -> Result<(Digest, Digest), CtLogError> {
    if m == n {
        if b {
            Ok((*old_root, *old_root))
        } else {
            let h = proof
                .next()
                .ok_or_else(|| CtLogError::validation("consistency proof ended early"))?;
            Ok((h, h))
        }
    } else {
        let k = largest_pow2_lt(n);
        let short = || CtLogError::validation("consistency proof ended early");
        if m <= k {
            let (old_r, new_left) = reconstruct_subproof(m, k, b, old_root, proof)?;
            let right = proof.next().ok_or_else(short)?;
            Ok((old_r, node_hash(&new_left, &right)))
        } else {
            let (old_r_right, new_right) = reconstruct_subproof(m - k, n - k, false, old_root, proof)?;
            let left = proof.next().ok_or_else(short)?;
            Ok((node_hash(&left, &old_r_right), node_hash(&left, &new_right)))
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use ctlog_core::hash::leaf_hash;
    use proptest::prelude::*;

    fn tree_of(n: u64) -> DenseMerkleTree {
        let mut tree = DenseMerkleTree::new();
        for i in 0..n {
            tree.append(leaf_hash(format!("leaf-{i}").as_bytes()));
        }
        tree
    }

    proptest! {
        /// Any leaf's inclusion proof against any tree size that contains it
        /// verifies against that size's own root, for arbitrary sizes and
        /// indices, not just the hand-picked ones in the unit tests above.
        #[test]
        fn inclusion_proof_verifies_for_arbitrary_size_and_index(size in 1..300u64, seed in 0..300u64) {
            let tree = tree_of(size);
            let index = seed % size;
            let root = tree.root_at(size).unwrap();
            let proof = tree.inclusion_proof(index, size).unwrap();
            prop_assert!(verify_inclusion_proof(tree.leaf_hashes()[index as usize], index, size, &proof, &root).is_ok());
        }

        /// A consistency proof between any `0 <= old_size <= new_size` drawn
        /// from the same tree verifies against both roots.
        #[test]
        fn consistency_proof_verifies_for_arbitrary_old_and_new_size(new_size in 1..300u64, old_seed in 0..300u64) {
            let old_size = old_seed % (new_size + 1);
            let tree = tree_of(new_size);
            let old_root = tree.root_at(old_size).unwrap();
            let new_root = tree.root_at(new_size).unwrap();
            let proof = tree.consistency_proof(old_size, new_size).unwrap();
            prop_assert!(verify_consistency_proof(old_size, new_size, &old_root, &new_root, &proof).is_ok());
        }
    }
}
