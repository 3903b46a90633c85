//! Signing and verifying Signed Tree Heads.

use ctlog_core::errors::CtLogError;
use ctlog_core::types::{Digest, SignedTreeHead};

use crate::encoding::sth_signature_input;
use crate::signer::{Signer, Verifier};

/// Produce a signed STH for `(tree_size, timestamp_ms, root_hash)`.
pub fn sign_sth(
    signer: &dyn Signer,
    tree_size: u64,
    timestamp_ms: u64,
    root_hash: Digest,
) -> SignedTreeHead {
    let input = sth_signature_input(timestamp_ms, tree_size, &root_hash);
    let signature = signer.sign(&input);
    SignedTreeHead {
        tree_size,
        timestamp_ms,
        root_hash,
        signature,
    }
}

/// Verify an STH's signature against its own fields.
pub fn verify_sth(verifier: &dyn Verifier, sth: &SignedTreeHead) -> Result<(), CtLogError> {
    let input = sth_signature_input(sth.timestamp_ms, sth.tree_size, &sth.root_hash);
    verifier.verify(&input, &sth.signature)
}
