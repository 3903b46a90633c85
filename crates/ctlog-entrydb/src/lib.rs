//! The local, single-writer durable store: a dense by-sequence index and a
//! by-leaf-hash index populated once an entry is sequenced.
//!
//! `EntryDb` is a capability trait rather than a concrete type so a
//! production on-disk backend (ordered KV with range iteration) and an
//! in-memory test backend share one contract. No inheritance hierarchy is
//! needed; the capability set is the contract.

use async_trait::async_trait;

use ctlog_core::errors::CtLogError;
use ctlog_core::types::{Digest, Entry, LeafIndex, SignedTreeHead};

/// Durable local storage for one log's entries.
///
/// Implementations are single-writer (only the leader's tree signer calls
/// `assign_sequence`) and many-reader. `assign_sequence` must be
/// crash-consistent: once it returns `Ok`, the by-sequence and by-leaf-hash
/// mappings survive a restart, and `latest_contiguous_sequence` reflects the
/// assignment. Reads are linearisable against writes on the same node.
#[async_trait]
pub trait EntryDb: Send + Sync {
    /// Stage an entry under its leaf hash before it has a sequence number.
    /// Idempotent: staging the same `leaf_hash` twice is a no-op, not an
    /// error — the caller (a CAS-insert against the consistent store) has
    /// already resolved the "first writer wins" race.
    async fn put_pending(&self, leaf_hash: Digest, entry: Entry) -> Result<(), CtLogError>;

    /// Atomically promote a pending entry to a sequenced one at `seq`.
    /// Returns `Conflict` if `seq` is already assigned to a different leaf
    /// hash, and `Validation` if `leaf_hash` was never staged via
    /// `put_pending`.
    async fn assign_sequence(&self, leaf_hash: Digest, seq: LeafIndex) -> Result<(), CtLogError>;

    /// The sequence number assigned to `leaf_hash`, if any.
    async fn lookup_by_hash(&self, leaf_hash: Digest) -> Result<Option<LeafIndex>, CtLogError>;

    /// The sequenced entry at `seq`, if present.
    async fn read(&self, seq: LeafIndex) -> Result<Option<Entry>, CtLogError>;

    /// The largest `n` such that every sequence in `[0, n)` is present.
    /// May lag the global high-water mark while a mirror catches up on a
    /// gap left by out-of-order fetches.
    async fn latest_contiguous_sequence(&self) -> Result<LeafIndex, CtLogError>;

    /// The most recent STH this node has signed (leader) or adopted
    /// (mirror/follower), if any.
    async fn latest_tree_head(&self) -> Result<Option<SignedTreeHead>, CtLogError>;

    /// Record a newly signed or adopted STH as the latest tree head.
    /// Callers must ensure `sth.tree_size <= latest_contiguous_sequence()`
    /// before calling; the store itself only persists, it does not verify.
    async fn set_latest_tree_head(&self, sth: SignedTreeHead) -> Result<(), CtLogError>;
}
