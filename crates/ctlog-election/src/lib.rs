//! Standard lease-based election over an external store: at any wall-clock
//! instant at most one node holds the lease. No Byzantine protection; the
//! trust boundary is the backend itself.

pub mod backend;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ctlog_core::errors::CtLogError;

pub use backend::{ElectionBackend, ElectionProposal};

/// A token proving (at the moment it was last checked) that this node holds
/// the leadership lease. The tree signer must call `is_valid` immediately
/// before publishing an STH — holding a `LeaderHandle` is not itself proof
/// the lease is still current, only that it was at acquisition time.
#[derive(Clone)]
pub struct LeaderHandle {
    epoch: u64,
    valid: Arc<AtomicBool>,
}

impl LeaderHandle {
    /// The epoch this lease term was granted under. Threaded through to
    /// `ConsistentStore` writes that must be rejected once a newer lease
    /// exists.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether the lease was valid as of the last refresh attempt. Becomes
    /// permanently `false` once lost; a lost lease is never regained by the
    /// same handle, a fresh `run` call is required.
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }
}

/// Drives lease acquisition and refresh for one node.
pub struct LeaseElection<B> {
    backend: Arc<B>,
    lease_ms: u64,
    refresh_ms: u64,
}

impl<B: ElectionBackend + 'static> LeaseElection<B> {
    pub fn new(backend: Arc<B>, lease_ms: u64, refresh_ms: u64) -> Self {
        Self {
            backend,
            lease_ms,
            refresh_ms,
        }
    }

    /// Propose for leadership and, if won, spawn a background task that
    /// refreshes the lease at `refresh_ms` intervals (`refresh_ms` should be
    /// far smaller than `lease_ms`, enforced by `LogConfig::validate`).
    /// `on_lease_lost` fires exactly once, strictly before peers would
    /// observe the lease as expired, so the signer can stop before anyone
    /// else believes it is still the leader.
    pub async fn run(
        &self,
        node_id: String,
        on_lease_lost: impl Fn() + Send + Sync + 'static,
    ) -> Result<LeaderHandle, CtLogError> {
        let proposal = self.backend.try_propose(&node_id, self.lease_ms).await?;
        if !proposal.won {
            return Err(CtLogError::conflict(format!(
                "node {node_id} did not win the leadership lease"
            )));
        }

        let valid = Arc::new(AtomicBool::new(true));
        let handle = LeaderHandle {
            epoch: proposal.epoch,
            valid: Arc::clone(&valid),
        };

        let backend = Arc::clone(&self.backend);
        let refresh_ms = self.refresh_ms;
        let lease_ms = self.lease_ms;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(refresh_ms)).await;
                match backend.refresh(&node_id, lease_ms).await {
                    Ok(true) => continue,
                    Ok(false) => {
                        tracing::warn!(node_id = %node_id, "leadership lease lost");
                        valid.store(false, Ordering::Release);
                        on_lease_lost();
                        break;
                    }
                    Err(err) => {
                        tracing::error!(node_id = %node_id, error = %err, "lease refresh failed, stepping down");
                        valid.store(false, Ordering::Release);
                        on_lease_lost();
                        break;
                    }
                }
            }
        });

        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU64;
    use std::sync::Mutex;

    struct FakeBackend {
        leader: Mutex<Option<String>>,
        epoch: AtomicU64,
        refreshes_before_loss: AtomicU64,
    }

    impl FakeBackend {
        fn new(refreshes_before_loss: u64) -> Self {
            Self {
                leader: Mutex::new(None),
                epoch: AtomicU64::new(0),
                refreshes_before_loss: AtomicU64::new(refreshes_before_loss),
            }
        }
    }

    #[async_trait]
    impl ElectionBackend for FakeBackend {
        async fn try_propose(&self, node_id: &str, _ttl_ms: u64) -> Result<ElectionProposal, CtLogError> {
            let mut leader = self.leader.lock().unwrap();
            if leader.is_none() {
                *leader = Some(node_id.to_string());
                let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(ElectionProposal { won: true, epoch })
            } else {
                Ok(ElectionProposal {
                    won: leader.as_deref() == Some(node_id),
                    epoch: self.epoch.load(Ordering::SeqCst),
                })
            }
        }

        async fn refresh(&self, _node_id: &str, _ttl_ms: u64) -> Result<bool, CtLogError> {
            let remaining = self.refreshes_before_loss.fetch_update(
                Ordering::SeqCst,
                Ordering::SeqCst,
                |n| if n == 0 { None } else { Some(n - 1) },
            );
            Ok(remaining.is_ok())
        }

        async fn current_leader(&self) -> Result<Option<String>, CtLogError> {
            Ok(self.leader.lock().unwrap().clone())
        }
    }

    #[tokio::test]
    async fn winning_proposal_yields_a_valid_handle() {
        let backend = Arc::new(FakeBackend::new(100));
        let elector = LeaseElection::new(backend, 10_000, 5);
        let handle = elector.run("node-a".to_string(), || {}).await.unwrap();
        assert!(handle.is_valid());
        assert_eq!(handle.epoch(), 1);
    }

    #[tokio::test]
    async fn losing_the_lease_invalidates_the_handle_and_fires_callback() {
        let backend = Arc::new(FakeBackend::new(0));
        let elector = LeaseElection::new(backend, 10_000, 1);
        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = Arc::clone(&fired);
        let handle = elector
            .run("node-a".to_string(), move || {
                fired_clone.store(true, Ordering::SeqCst);
            })
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_valid());
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn a_second_node_cannot_win_while_the_first_holds_the_lease() {
        let backend = Arc::new(FakeBackend::new(100));
        let elector_a = LeaseElection::new(Arc::clone(&backend), 10_000, 5);
        let elector_b = LeaseElection::new(backend, 10_000, 5);
        let _handle_a = elector_a.run("node-a".to_string(), || {}).await.unwrap();
        let result_b = elector_b.run("node-b".to_string(), || {}).await;
        assert!(result_b.is_err());
    }
}
