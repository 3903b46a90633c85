//! In-memory `ElectionBackend` fixture, with a `force_lease_loss` hook for
//! exercising failover in crate-level tests.

use async_trait::async_trait;
use parking_lot::Mutex;

use ctlog_core::errors::CtLogError;
use ctlog_election::{ElectionBackend, ElectionProposal};

#[derive(Default)]
struct Inner {
    leader: Option<String>,
    epoch: u64,
    lease_lost: bool,
}

/// A single-process election backend: the first node to propose wins, and
/// holds the lease until `force_lease_loss` is called or the instance is
/// dropped.
#[derive(Default)]
pub struct InMemoryElectionBackend {
    inner: Mutex<Inner>,
}

impl InMemoryElectionBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the current leader's lease expiring — a partition or GC
    /// pause the node failed to refresh through in time.
    pub fn force_lease_loss(&self) {
        let mut inner = self.inner.lock();
        inner.lease_lost = true;
        inner.leader = None;
    }
}

#[async_trait]
impl ElectionBackend for InMemoryElectionBackend {
    async fn try_propose(&self, node_id: &str, _ttl_ms: u64) -> Result<ElectionProposal, CtLogError> {
        let mut inner = self.inner.lock();
        if inner.lease_lost {
            inner.lease_lost = false;
        }
        match &inner.leader {
            None => {
                inner.leader = Some(node_id.to_string());
                inner.epoch += 1;
                Ok(ElectionProposal {
                    won: true,
                    epoch: inner.epoch,
                })
            }
            Some(current) if current == node_id => Ok(ElectionProposal {
                won: true,
                epoch: inner.epoch,
            }),
            Some(_) => Ok(ElectionProposal {
                won: false,
                epoch: inner.epoch,
            }),
        }
    }

    async fn refresh(&self, node_id: &str, _ttl_ms: u64) -> Result<bool, CtLogError> {
        let mut inner = self.inner.lock();
        if inner.lease_lost {
            inner.leader = None;
            return Ok(false);
        }
        Ok(inner.leader.as_deref() == Some(node_id))
    }

    async fn current_leader(&self) -> Result<Option<String>, CtLogError> {
        Ok(self.inner.lock().leader.clone())
    }
}
