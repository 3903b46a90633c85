//! Log lookup (§4.8): the read side. On startup and on every STH adoption,
//! rebuilds a `leaf_hash -> sequence` index by scanning entries up to the
//! adopted STH's tree size, and retains the full Merkle tree needed to
//! generate proofs. The snapshot is swapped atomically so readers never see
//! a partially rebuilt tree; per the concurrency model, it's read-only
//! between adoptions.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use ctlog_core::errors::CtLogError;
use ctlog_core::types::{Digest, Entry, LeafIndex, SignedTreeHead};
use ctlog_entrydb::EntryDb;
use ctlog_merkle::DenseMerkleTree;

struct LookupSnapshot {
    tree: DenseMerkleTree,
    index: HashMap<Digest, LeafIndex>,
    sth: SignedTreeHead,
}

impl LookupSnapshot {
    fn empty() -> Self {
        Self {
            tree: DenseMerkleTree::new(),
            index: HashMap::new(),
            sth: SignedTreeHead {
                tree_size: 0,
                timestamp_ms: 0,
                root_hash: ctlog_core::hash::empty_tree_hash(),
                signature: Vec::new(),
            },
        }
    }
}

/// Serves inclusion and consistency proofs against the most recently
/// adopted STH.
pub struct LogLookup<D> {
    entry_db: Arc<D>,
    snapshot: RwLock<Arc<LookupSnapshot>>,
}

impl<D: EntryDb> LogLookup<D> {
    pub fn new(entry_db: Arc<D>) -> Self {
        Self {
            entry_db,
            snapshot: RwLock::new(Arc::new(LookupSnapshot::empty())),
        }
    }

    /// Rebuild the index and tree for a newly adopted STH. Fails `Fatal` if
    /// the entry DB is missing an entry below `sth.tree_size`, or if the
    /// recomputed root disagrees with `sth.root_hash` — both indicate local
    /// storage corruption, not a transient condition.
    pub async fn rebuild(&self, sth: SignedTreeHead) -> Result<(), CtLogError> {
        let mut tree = DenseMerkleTree::new();
        let mut index = HashMap::with_capacity(sth.tree_size as usize);
        for seq in 0..sth.tree_size {
            let entry = self.entry_db.read(seq).await?.ok_or_else(|| {
                CtLogError::fatal(format!("entry_db missing sequence {seq} below adopted tree_size {}", sth.tree_size))
            })?;
            let leaf_hash = entry.leaf_hash();
            tree.append(leaf_hash);
            index.insert(leaf_hash, seq);
        }
        let recomputed_root = tree.root_at(sth.tree_size)?;
        if recomputed_root != sth.root_hash {
            return Err(CtLogError::fatal(format!(
                "recomputed root for tree_size {} does not match adopted STH's root_hash",
                sth.tree_size
            )));
        }
        *self.snapshot.write().await = Arc::new(LookupSnapshot { tree, index, sth });
        Ok(())
    }

    /// The STH the current snapshot was built for.
    pub async fn current_sth(&self) -> SignedTreeHead {
        self.snapshot.read().await.sth.clone()
    }

    pub async fn get_entry_and_proof(&self, seq: LeafIndex, tree_size: u64) -> Result<(Entry, Vec<Digest>), CtLogError> {
        let snapshot = Arc::clone(&*self.snapshot.read().await);
        if tree_size > snapshot.sth.tree_size {
            return Err(CtLogError::validation(format!(
                "tree_size {tree_size} exceeds the adopted STH's tree_size {}",
                snapshot.sth.tree_size
            )));
        }
        let entry = self
            .entry_db
            .read(seq)
            .await?
            .ok_or_else(|| CtLogError::validation(format!("no entry at sequence {seq}")))?;
        let proof = snapshot.tree.inclusion_proof(seq, tree_size)?;
        Ok((entry, proof))
    }

    pub async fn get_proof_by_hash(
        &self,
        leaf_hash: Digest,
        tree_size: u64,
    ) -> Result<Option<(LeafIndex, Vec<Digest>)>, CtLogError> {
        let snapshot = Arc::clone(&*self.snapshot.read().await);
        let Some(&seq) = snapshot.index.get(&leaf_hash) else {
            return Ok(None);
        };
        if seq >= tree_size {
            return Ok(None);
        }
        let proof = snapshot.tree.inclusion_proof(seq, tree_size)?;
        Ok(Some((seq, proof)))
    }

    pub async fn get_consistency(&self, old_size: u64, new_size: u64) -> Result<Vec<Digest>, CtLogError> {
        let snapshot = Arc::clone(&*self.snapshot.read().await);
        snapshot.tree.consistency_proof(old_size, new_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctlog_core::types::EntryType;
    use ctlog_testkit::InMemoryEntryDb;

    async fn seeded_lookup(n: u64) -> (LogLookup<InMemoryEntryDb>, SignedTreeHead) {
        let entry_db = Arc::new(InMemoryEntryDb::new());
        let mut hashes = Vec::new();
        for i in 0..n {
            let entry = Entry {
                leaf_input: format!("leaf-{i}").into_bytes(),
                extra_data: Vec::new(),
                timestamp_ms: i,
                entry_type: EntryType::X509,
            };
            let leaf_hash = entry.leaf_hash();
            entry_db.put_pending(leaf_hash, entry).await.unwrap();
            entry_db.assign_sequence(leaf_hash, i).await.unwrap();
            hashes.push(leaf_hash);
        }
        let dense_root = {
            let mut t = DenseMerkleTree::new();
            for h in &hashes {
                t.append(*h);
            }
            t.root_at(n).unwrap()
        };
        let sth = SignedTreeHead {
            tree_size: n,
            timestamp_ms: 1,
            root_hash: dense_root,
            signature: vec![],
        };
        let lookup = LogLookup::new(entry_db);
        lookup.rebuild(sth.clone()).await.unwrap();
        (lookup, sth)
    }

    #[tokio::test]
    async fn get_proof_by_hash_finds_sequenced_entries() {
        let (lookup, sth) = seeded_lookup(6).await;
        let entry = Entry {
            leaf_input: b"leaf-2".to_vec(),
            extra_data: Vec::new(),
            timestamp_ms: 2,
            entry_type: EntryType::X509,
        };
        let (seq, proof) = lookup
            .get_proof_by_hash(entry.leaf_hash(), sth.tree_size)
            .await
            .unwrap()
            .expect("should find entry");
        assert_eq!(seq, 2);
        ctlog_merkle::verify_inclusion_proof(entry.leaf_hash(), seq, sth.tree_size, &proof, &sth.root_hash).unwrap();
    }

    #[tokio::test]
    async fn get_proof_by_hash_returns_none_for_unknown_leaf() {
        let (lookup, sth) = seeded_lookup(4).await;
        let unknown = ctlog_core::hash::leaf_hash(b"never-submitted");
        let result = lookup.get_proof_by_hash(unknown, sth.tree_size).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn get_consistency_verifies_against_both_roots() {
        let (lookup, sth) = seeded_lookup(9).await;
        let old_root = {
            let mut t = DenseMerkleTree::new();
            for seq in 0..4u64 {
                let entry = lookup.entry_db.read(seq).await.unwrap().unwrap();
                t.append(entry.leaf_hash());
            }
            t.root_at(4).unwrap()
        };
        let proof = lookup.get_consistency(4, sth.tree_size).await.unwrap();
        ctlog_merkle::verify_consistency_proof(4, sth.tree_size, &old_root, &sth.root_hash, &proof).unwrap();
    }

    #[tokio::test]
    async fn rebuild_rejects_a_root_mismatch_as_fatal() {
        let entry_db = Arc::new(InMemoryEntryDb::new());
        let entry = Entry {
            leaf_input: b"only".to_vec(),
            extra_data: Vec::new(),
            timestamp_ms: 0,
            entry_type: EntryType::X509,
        };
        let leaf_hash = entry.leaf_hash();
        entry_db.put_pending(leaf_hash, entry).await.unwrap();
        entry_db.assign_sequence(leaf_hash, 0).await.unwrap();

        let lookup = LogLookup::new(entry_db);
        let bad_sth = SignedTreeHead {
            tree_size: 1,
            timestamp_ms: 0,
            root_hash: [0xffu8; 32],
            signature: vec![],
        };
        let err = lookup.rebuild(bad_sth).await.unwrap_err();
        assert!(matches!(err, CtLogError::Fatal { .. }));
    }
}
