//! The minimal capability an election backend needs to provide. Kept
//! separate from `ctlog_store::ConsistentStore` so this crate stays testable
//! against a bare-bones fake; a real deployment's `ElectionBackend` impl is
//! typically a thin adapter over the consistent store's `/election/`
//! namespace.

use async_trait::async_trait;

use ctlog_core::errors::CtLogError;

/// Result of proposing (or re-proposing) for leadership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElectionProposal {
    /// True if this node holds the lease after the proposal.
    pub won: bool,
    /// Monotonically increasing epoch identifying this lease term. Used by
    /// `ConsistentStore::assign_sequence_number` / `set_serving_sth` to
    /// reject writes from a node whose lease has since been superseded.
    pub epoch: u64,
}

/// Backend capability for lease-based election. `node_id` identifies the
/// caller; the backend tracks, per log, which `node_id` currently holds the
/// lease and its expiry.
#[async_trait]
pub trait ElectionBackend: Send + Sync {
    /// Propose for leadership with a lease of `ttl_ms`. Wins immediately if
    /// no lease is currently held, or if this node already holds it.
    async fn try_propose(&self, node_id: &str, ttl_ms: u64) -> Result<ElectionProposal, CtLogError>;

    /// Refresh an already-held lease. Returns `Ok(false)` (not an error) if
    /// the lease was lost — expired, or stolen by a racing node — so the
    /// caller can distinguish "lost the lease" from "backend unavailable".
    async fn refresh(&self, node_id: &str, ttl_ms: u64) -> Result<bool, CtLogError>;

    /// The node_id currently holding the lease, if any.
    async fn current_leader(&self) -> Result<Option<String>, CtLogError>;
}
