//! RFC 6962 leaf and internal node hashing.
//!
//! Bit-exact per RFC 6962 §2.1: leaves are prefixed `0x00`, internal nodes
//! `0x01`. Centralized here so every crate that needs a leaf or node hash
//! (the dense tree, the compact tree, the fetcher's proof verification)
//! shares one implementation.

use sha2::{Digest as _, Sha256};

use crate::types::Digest;

/// Domain separation prefix for leaf hashes (RFC 6962 §2.1).
const LEAF_PREFIX: u8 = 0x00;

/// Domain separation prefix for internal node hashes (RFC 6962 §2.1).
const NODE_PREFIX: u8 = 0x01;

/// `SHA256(0x00 || leaf_input)`.
pub fn leaf_hash(leaf_input: &[u8]) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update([LEAF_PREFIX]);
    hasher.update(leaf_input);
    hasher.finalize().into()
}

/// `SHA256(0x01 || left || right)`.
pub fn node_hash(left: &Digest, right: &Digest) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update([NODE_PREFIX]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// The RFC 6962 empty-tree root hash: `SHA256("")`.
pub fn empty_tree_hash() -> Digest {
    Sha256::new().finalize().into()
}
