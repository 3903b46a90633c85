//! The consistent store: the trait boundary to an external, quorum-replicated
//! key-value service (compare-and-swap, watches, leases) that every node in
//! the cluster agrees on. This crate expresses the *shape* of that boundary
//! as a Rust trait; it does not implement a replicated KV itself — a real
//! deployment backs it with its own control plane, the same way a production
//! signer backs `ctlog_crypto::Signer` with a custody system.
//!
//! Namespaces under a per-log root (spec):
//! - `/entries/<leaf_hash>` - pending entry + promised timestamp.
//! - `/sequence_mapping` - the authoritative partial leaf_hash -> sequence map.
//! - `/nodes/<node_id>` - heartbeated node state.
//! - `/election/` - the leader election lock.
//! - `/sth/` - the latest STH published by the leader.
//! - `/serving_sth` - the STH currently served to external clients.
//!
//! All mutations go through CAS with explicit version expectations; blind
//! writes are forbidden. Leader-gated writes additionally carry the calling
//! node's current lease epoch, which the store rejects once a newer lease
//! has been granted — this is how "writes on behalf of the leader MUST fail
//! if the leader's lease has expired" is enforced without this crate
//! depending on the election crate's types.

use async_trait::async_trait;

use ctlog_core::errors::CtLogError;
use ctlog_core::types::{ClusterNodeState, Digest, LeafIndex, PendingEntry, SignedTreeHead};

/// Outcome of a CAS-insert into `/entries/<leaf_hash>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddPendingOutcome {
    Created,
    AlreadyExists { existing_timestamp_ms: u64 },
}

/// The kind of change a watcher observes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

/// A single observed mutation under a watched prefix. `index` is the store's
/// modification index for the key, monotonically increasing per key so that
/// a caller can detect staleness in data read separately from the watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub key: String,
    pub kind: ChangeKind,
    pub value: Option<Vec<u8>>,
    pub index: u64,
}

/// The boundary to the replicated control-plane key-value store.
#[async_trait]
pub trait ConsistentStore: Send + Sync {
    /// CAS-insert a pending entry under its leaf hash. Idempotent: a second
    /// `add_pending` for the same leaf hash returns `AlreadyExists` carrying
    /// the first submission's promised timestamp rather than erroring, so a
    /// frontend can always respond with a valid SCT.
    async fn add_pending(&self, entry: PendingEntry) -> Result<AddPendingOutcome, CtLogError>;

    /// Up to `limit` unsequenced entries, oldest first by promised timestamp.
    async fn get_pending_entries(&self, limit: usize) -> Result<Vec<PendingEntry>, CtLogError>;

    /// CAS-assign `seq` to `leaf_hash` in `/sequence_mapping`. Fails with
    /// `Conflict` if `leaf_hash` already has a sequence or `seq` is already
    /// taken by a different leaf hash. `lease_epoch` must match the store's
    /// current notion of the active leader's epoch or the write is rejected
    /// with `Transient` (stale leader).
    async fn assign_sequence_number(
        &self,
        leaf_hash: Digest,
        seq: LeafIndex,
        lease_epoch: u64,
    ) -> Result<(), CtLogError>;

    /// The next sequence number available for reservation, derived from the
    /// current STH's tree size plus any outstanding reservations.
    async fn next_available_sequence_number(&self) -> Result<LeafIndex, CtLogError>;

    /// Remove `/entries/<leaf_hash>` once the entry is covered by a
    /// published STH (§4.6 step 6). Removing an already-removed or
    /// never-staged key is not an error — GC may race a previous iteration
    /// that already cleaned it up.
    async fn remove_pending(&self, leaf_hash: Digest) -> Result<(), CtLogError>;

    /// Publish this node's heartbeat under `/nodes/<node_id>`.
    async fn set_cluster_node_state(&self, state: ClusterNodeState) -> Result<(), CtLogError>;

    /// All peer states currently visible under `/nodes/`.
    async fn get_cluster_node_states(&self) -> Result<Vec<ClusterNodeState>, CtLogError>;

    /// Publish a newly signed STH to `/sth/`. Leader-gated: `lease_epoch`
    /// must match or exceed the store's current notion of the active
    /// leader's epoch, or the write is rejected with `Transient` (stale
    /// leader) — this is how "writes on behalf of the leader MUST fail if
    /// the leader's lease has expired" is enforced without this crate
    /// depending on the election crate's types.
    async fn publish_sth(&self, sth: SignedTreeHead, lease_epoch: u64) -> Result<(), CtLogError>;

    /// The most recent STH published to `/sth/` by the leader.
    async fn get_published_sth(&self) -> Result<Option<SignedTreeHead>, CtLogError>;

    /// CAS-update `/serving_sth`. Not leader-gated — any node's cluster
    /// controller may advance it once quorum confirms replication.
    /// Implementations must reject a write that would decrease `tree_size`,
    /// and must reject one that disagrees on `root_hash` at an unchanged
    /// `tree_size` — the caller should treat either as `Fatal` (a cluster
    /// invariant violation), not retry it.
    async fn set_serving_sth(&self, sth: SignedTreeHead) -> Result<(), CtLogError>;

    /// The STH currently being served to external clients, if any.
    async fn get_serving_sth(&self) -> Result<Option<SignedTreeHead>, CtLogError>;

    /// Subscribe to changes under `prefix`. The receiver end of a broadcast
    /// channel; a slow subscriber that falls behind the channel's capacity
    /// observes a lagged error rather than blocking publishers.
    async fn watch(&self, prefix: &str) -> Result<tokio::sync::broadcast::Receiver<ChangeEvent>, CtLogError>;
}
