//! In-memory `EntryDb` fixture.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::Mutex;

use ctlog_core::errors::CtLogError;
use ctlog_core::types::{Digest, Entry, LeafIndex, SignedTreeHead};
use ctlog_entrydb::EntryDb;

#[derive(Default)]
struct Inner {
    pending: HashMap<Digest, Entry>,
    by_sequence: BTreeMap<LeafIndex, Entry>,
    by_leaf_hash: HashMap<Digest, LeafIndex>,
    contiguous: LeafIndex,
    latest_sth: Option<SignedTreeHead>,
}

/// An in-memory `EntryDb`. Not durable across process restarts — tests that
/// exercise crash recovery construct a fresh instance and replay state
/// explicitly rather than relying on this fixture to survive a drop.
#[derive(Default)]
pub struct InMemoryEntryDb {
    inner: Mutex<Inner>,
}

impl InMemoryEntryDb {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntryDb for InMemoryEntryDb {
    async fn put_pending(&self, leaf_hash: Digest, entry: Entry) -> Result<(), CtLogError> {
        let mut inner = self.inner.lock();
        inner.pending.entry(leaf_hash).or_insert(entry);
        Ok(())
    }

    async fn assign_sequence(&self, leaf_hash: Digest, seq: LeafIndex) -> Result<(), CtLogError> {
        let mut inner = self.inner.lock();
        if let Some(existing) = inner.by_sequence.get(&seq) {
            if existing.leaf_hash() != leaf_hash {
                return Err(CtLogError::conflict(format!(
                    "sequence {seq} already assigned to a different leaf hash"
                )));
            }
            return Ok(());
        }
        let entry = inner
            .pending
            .remove(&leaf_hash)
            .ok_or_else(|| CtLogError::validation("assign_sequence called on an entry that was never staged"))?;
        inner.by_sequence.insert(seq, entry);
        inner.by_leaf_hash.insert(leaf_hash, seq);
        while inner.by_sequence.contains_key(&inner.contiguous) {
            inner.contiguous += 1;
        }
        Ok(())
    }

    async fn lookup_by_hash(&self, leaf_hash: Digest) -> Result<Option<LeafIndex>, CtLogError> {
        Ok(self.inner.lock().by_leaf_hash.get(&leaf_hash).copied())
    }

    async fn read(&self, seq: LeafIndex) -> Result<Option<Entry>, CtLogError> {
        Ok(self.inner.lock().by_sequence.get(&seq).cloned())
    }

    async fn latest_contiguous_sequence(&self) -> Result<LeafIndex, CtLogError> {
        Ok(self.inner.lock().contiguous)
    }

    async fn latest_tree_head(&self) -> Result<Option<SignedTreeHead>, CtLogError> {
        Ok(self.inner.lock().latest_sth.clone())
    }

    async fn set_latest_tree_head(&self, sth: SignedTreeHead) -> Result<(), CtLogError> {
        self.inner.lock().latest_sth = Some(sth);
        Ok(())
    }
}
