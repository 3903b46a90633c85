//! In-memory `ConsistentStore` fixture. Single-process only — `watch`
//! delivers events via a local broadcast channel rather than anything
//! actually replicated.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use ctlog_core::errors::CtLogError;
use ctlog_core::types::{ClusterNodeState, Digest, LeafIndex, PendingEntry, SignedTreeHead};
use ctlog_store::{AddPendingOutcome, ChangeEvent, ChangeKind, ConsistentStore};

struct Inner {
    pending: BTreeMap<Digest, PendingEntry>,
    sequence_mapping: HashMap<Digest, LeafIndex>,
    taken_sequences: HashSet<LeafIndex>,
    next_sequence: LeafIndex,
    node_states: HashMap<String, ClusterNodeState>,
    published_sth: Option<SignedTreeHead>,
    serving_sth: Option<SignedTreeHead>,
    max_lease_epoch_seen: u64,
    next_index: u64,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            pending: BTreeMap::new(),
            sequence_mapping: HashMap::new(),
            taken_sequences: HashSet::new(),
            next_sequence: 0,
            node_states: HashMap::new(),
            published_sth: None,
            serving_sth: None,
            max_lease_epoch_seen: 0,
            next_index: 0,
        }
    }
}

/// An in-memory, single-process stand-in for the external quorum-replicated
/// key-value service.
pub struct LocalStore {
    inner: Mutex<Inner>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl Default for LocalStore {
    fn default() -> Self {
        let (changes, _) = broadcast::channel(1024);
        Self {
            inner: Mutex::new(Inner::default()),
            changes,
        }
    }
}

impl LocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn publish(&self, inner: &mut Inner, key: String, kind: ChangeKind, value: Option<Vec<u8>>) {
        inner.next_index += 1;
        let event = ChangeEvent {
            key,
            kind,
            value,
            index: inner.next_index,
        };
        let _ = self.changes.send(event);
    }

    fn check_lease_epoch(&self, inner: &mut Inner, lease_epoch: u64) -> Result<(), CtLogError> {
        if lease_epoch < inner.max_lease_epoch_seen {
            return Err(CtLogError::transient(format!(
                "lease epoch {lease_epoch} is stale, current epoch is {}",
                inner.max_lease_epoch_seen
            )));
        }
        inner.max_lease_epoch_seen = lease_epoch;
        Ok(())
    }
}

#[async_trait]
impl ConsistentStore for LocalStore {
    async fn add_pending(&self, entry: PendingEntry) -> Result<AddPendingOutcome, CtLogError> {
        let mut inner = self.inner.lock();
        if let Some(existing) = inner.pending.get(&entry.leaf_hash) {
            return Ok(AddPendingOutcome::AlreadyExists {
                existing_timestamp_ms: existing.promised_timestamp_ms,
            });
        }
        let key = format!("/entries/{}", hex::encode(entry.leaf_hash));
        inner.pending.insert(entry.leaf_hash, entry);
        self.publish(&mut inner, key, ChangeKind::Created, None);
        Ok(AddPendingOutcome::Created)
    }

    async fn get_pending_entries(&self, limit: usize) -> Result<Vec<PendingEntry>, CtLogError> {
        let inner = self.inner.lock();
        let mut entries: Vec<PendingEntry> = inner.pending.values().cloned().collect();
        entries.sort_by(|a, b| {
            a.promised_timestamp_ms
                .cmp(&b.promised_timestamp_ms)
                .then_with(|| a.leaf_hash.cmp(&b.leaf_hash))
        });
        entries.truncate(limit);
        Ok(entries)
    }

    async fn assign_sequence_number(
        &self,
        leaf_hash: Digest,
        seq: LeafIndex,
        lease_epoch: u64,
    ) -> Result<(), CtLogError> {
        let mut inner = self.inner.lock();
        self.check_lease_epoch(&mut inner, lease_epoch)?;
        if inner.sequence_mapping.contains_key(&leaf_hash) {
            return Err(CtLogError::conflict("leaf hash already has an assigned sequence"));
        }
        if inner.taken_sequences.contains(&seq) {
            return Err(CtLogError::conflict(format!("sequence {seq} is already taken")));
        }
        inner.sequence_mapping.insert(leaf_hash, seq);
        inner.taken_sequences.insert(seq);
        if seq >= inner.next_sequence {
            inner.next_sequence = seq + 1;
        }
        Ok(())
    }

    async fn next_available_sequence_number(&self) -> Result<LeafIndex, CtLogError> {
        Ok(self.inner.lock().next_sequence)
    }

    async fn remove_pending(&self, leaf_hash: Digest) -> Result<(), CtLogError> {
        let mut inner = self.inner.lock();
        if inner.pending.remove(&leaf_hash).is_some() {
            let key = format!("/entries/{}", hex::encode(leaf_hash));
            self.publish(&mut inner, key, ChangeKind::Deleted, None);
        }
        Ok(())
    }

    async fn set_cluster_node_state(&self, state: ClusterNodeState) -> Result<(), CtLogError> {
        self.inner.lock().node_states.insert(state.node_id.clone(), state);
        Ok(())
    }

    async fn get_cluster_node_states(&self) -> Result<Vec<ClusterNodeState>, CtLogError> {
        Ok(self.inner.lock().node_states.values().cloned().collect())
    }

    async fn publish_sth(&self, sth: SignedTreeHead, lease_epoch: u64) -> Result<(), CtLogError> {
        let mut inner = self.inner.lock();
        self.check_lease_epoch(&mut inner, lease_epoch)?;
        if let Some(current) = &inner.published_sth {
            if sth.tree_size < current.tree_size {
                return Err(CtLogError::conflict("published STH tree_size may not decrease"));
            }
            if sth.tree_size == current.tree_size && sth.root_hash != current.root_hash {
                return Err(CtLogError::fatal("two STHs at the same tree_size disagree on root_hash"));
            }
        }
        inner.published_sth = Some(sth);
        self.publish(&mut inner, "/sth/".to_string(), ChangeKind::Modified, None);
        Ok(())
    }

    async fn get_published_sth(&self) -> Result<Option<SignedTreeHead>, CtLogError> {
        Ok(self.inner.lock().published_sth.clone())
    }

    async fn set_serving_sth(&self, sth: SignedTreeHead) -> Result<(), CtLogError> {
        let mut inner = self.inner.lock();
        if let Some(current) = &inner.serving_sth {
            if sth.tree_size < current.tree_size {
                return Err(CtLogError::conflict("serving STH tree_size may not decrease"));
            }
            if sth.tree_size == current.tree_size && sth.root_hash != current.root_hash {
                return Err(CtLogError::fatal("two STHs at the same tree_size disagree on root_hash"));
            }
        }
        inner.serving_sth = Some(sth);
        self.publish(&mut inner, "/serving_sth".to_string(), ChangeKind::Modified, None);
        Ok(())
    }

    async fn get_serving_sth(&self) -> Result<Option<SignedTreeHead>, CtLogError> {
        Ok(self.inner.lock().serving_sth.clone())
    }

    async fn watch(&self, _prefix: &str) -> Result<broadcast::Receiver<ChangeEvent>, CtLogError> {
        Ok(self.changes.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctlog_core::types::{Entry, EntryType};

    fn pending(seed: u8, promised_ms: u64) -> PendingEntry {
        let entry = Entry {
            leaf_input: vec![seed; 4],
            extra_data: Vec::new(),
            timestamp_ms: promised_ms,
            entry_type: EntryType::X509,
        };
        PendingEntry {
            leaf_hash: entry.leaf_hash(),
            entry,
            promised_timestamp_ms: promised_ms,
        }
    }

    #[tokio::test]
    async fn add_pending_is_idempotent_on_leaf_hash() {
        let store = LocalStore::new();
        let entry = pending(1, 100);
        let first = store.add_pending(entry.clone()).await.unwrap();
        assert_eq!(first, AddPendingOutcome::Created);
        let second = store.add_pending(entry).await.unwrap();
        assert_eq!(
            second,
            AddPendingOutcome::AlreadyExists {
                existing_timestamp_ms: 100
            }
        );
    }

    #[tokio::test]
    async fn get_pending_entries_orders_by_promised_timestamp() {
        let store = LocalStore::new();
        store.add_pending(pending(1, 200)).await.unwrap();
        store.add_pending(pending(2, 50)).await.unwrap();
        let entries = store.get_pending_entries(10).await.unwrap();
        assert_eq!(entries[0].promised_timestamp_ms, 50);
        assert_eq!(entries[1].promised_timestamp_ms, 200);
    }

    #[tokio::test]
    async fn assigning_an_already_taken_sequence_conflicts() {
        let store = LocalStore::new();
        let a = pending(1, 1);
        let b = pending(2, 2);
        store.assign_sequence_number(a.leaf_hash, 0, 1).await.unwrap();
        let err = store.assign_sequence_number(b.leaf_hash, 0, 1).await.unwrap_err();
        assert!(matches!(err, CtLogError::Conflict { .. }));
    }

    #[tokio::test]
    async fn stale_lease_epoch_is_rejected() {
        let store = LocalStore::new();
        let a = pending(1, 1);
        store.assign_sequence_number(a.leaf_hash, 0, 5).await.unwrap();
        let b = pending(2, 2);
        let err = store.assign_sequence_number(b.leaf_hash, 1, 3).await.unwrap_err();
        assert!(matches!(err, CtLogError::Transient { .. }));
    }

    #[tokio::test]
    async fn serving_sth_cannot_regress() {
        let store = LocalStore::new();
        let big = SignedTreeHead {
            tree_size: 10,
            timestamp_ms: 100,
            root_hash: [1u8; 32],
            signature: vec![],
        };
        store.set_serving_sth(big).await.unwrap();
        let small = SignedTreeHead {
            tree_size: 5,
            timestamp_ms: 200,
            root_hash: [2u8; 32],
            signature: vec![],
        };
        let err = store.set_serving_sth(small).await.unwrap_err();
        assert!(matches!(err, CtLogError::Conflict { .. }));
    }

    #[tokio::test]
    async fn watchers_observe_published_changes() {
        let store = LocalStore::new();
        let mut rx = store.watch("/entries").await.unwrap();
        store.add_pending(pending(1, 1)).await.unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Created);
    }
}
