//! The tree signer: the leader-only sequencing loop (§4.6). One iteration
//! drains pending entries, assigns them sequence numbers, grows the compact
//! tree, and signs and publishes a new STH. Runs only while the calling
//! node's `LeaderHandle` is valid.

use std::sync::Arc;
use std::time::Duration;

use ctlog_core::config::LogConfig;
use ctlog_core::errors::CtLogError;
use ctlog_core::time::{clock_skew_ms, next_sth_timestamp_ms, now_ms};
use ctlog_core::types::{Digest, SignedTreeHead};
use ctlog_crypto::signer::Signer;
use ctlog_crypto::sth::sign_sth;
use ctlog_election::LeaderHandle;
use ctlog_entrydb::EntryDb;
use ctlog_merkle::CompactMerkleTree;
use ctlog_store::ConsistentStore;

/// Drives one log's sequencing loop. Holds the only live `CompactMerkleTree`
/// for the log — per the concurrency model, the compact tree is owned
/// exclusively by the signer.
pub struct SequencingLoop<D, S> {
    entry_db: Arc<D>,
    store: Arc<S>,
    signer: Arc<dyn Signer>,
    config: LogConfig,
    compact_tree: CompactMerkleTree,
}

impl<D: EntryDb, S: ConsistentStore> SequencingLoop<D, S> {
    /// Construct a loop with a fresh, empty compact tree. Callers that are
    /// resuming after a restart should use `resume` instead.
    pub fn new(entry_db: Arc<D>, store: Arc<S>, signer: Arc<dyn Signer>, config: LogConfig) -> Self {
        Self {
            entry_db,
            store,
            signer,
            config,
            compact_tree: CompactMerkleTree::new(),
        }
    }

    /// Rebuild the compact tree from `entry_db` up to
    /// `latest_contiguous_sequence()` before starting the loop. Covers the
    /// crash-recovery case in §4.6's failure handling: a crash between
    /// steps 3 and 4 leaves the entry DB ahead of the last published STH,
    /// and the signer must recompute the root from durable state rather
    /// than trust an in-memory tree that no longer exists.
    pub async fn resume(entry_db: Arc<D>, store: Arc<S>, signer: Arc<dyn Signer>, config: LogConfig) -> Result<Self, CtLogError> {
        let contiguous = entry_db.latest_contiguous_sequence().await?;
        let mut compact_tree = CompactMerkleTree::new();
        for seq in 0..contiguous {
            let entry = entry_db
                .read(seq)
                .await?
                .ok_or_else(|| CtLogError::fatal(format!("entry_db missing sequence {seq} below its own contiguous watermark")))?;
            compact_tree.push_leaf_hash(entry.leaf_hash());
        }
        if let Some(sth) = entry_db.latest_tree_head().await? {
            if sth.tree_size > contiguous {
                return Err(CtLogError::fatal(format!(
                    "latest_tree_head size {} exceeds latest_contiguous_sequence {contiguous}",
                    sth.tree_size
                )));
            }
        }
        Ok(Self {
            entry_db,
            store,
            signer,
            config,
            compact_tree,
        })
    }

    /// Run the loop forever, sleeping `signing_interval_ms` between
    /// iterations, until `leader.is_valid()` goes false.
    pub async fn run(&mut self, leader: &LeaderHandle) -> Result<(), CtLogError> {
        while leader.is_valid() {
            if let Some(sth) = self.run_once(leader).await? {
                tracing::info!(tree_size = sth.tree_size, timestamp_ms = sth.timestamp_ms, "published STH");
            }
            tokio::time::sleep(Duration::from_millis(self.config.signing_interval_ms)).await;
        }
        Ok(())
    }

    /// One iteration of the six-step sequencing algorithm. Returns the newly
    /// published STH, or `None` if no pending entries were sequenced this
    /// round.
    pub async fn run_once(&mut self, leader: &LeaderHandle) -> Result<Option<SignedTreeHead>, CtLogError> {
        // Step 1.
        let contiguous = self.entry_db.latest_contiguous_sequence().await?;
        let current_sth = self.entry_db.latest_tree_head().await?;
        let current_size = current_sth.as_ref().map(|s| s.tree_size).unwrap_or(0);
        if current_size > contiguous {
            return Err(CtLogError::fatal(format!(
                "current STH tree_size {current_size} exceeds latest_contiguous_sequence {contiguous}"
            )));
        }

        // Step 2.
        let candidates = self.store.get_pending_entries(self.config.signing_batch_limit).await?;
        let mut pending = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if self.entry_db.lookup_by_hash(candidate.leaf_hash).await?.is_some() {
                continue;
            }
            pending.push(candidate);
        }
        pending.sort_by(|a, b| {
            a.promised_timestamp_ms
                .cmp(&b.promised_timestamp_ms)
                .then_with(|| a.leaf_hash.cmp(&b.leaf_hash))
        });

        // Step 3.
        let mut sequenced: Vec<Digest> = Vec::new();
        for candidate in pending {
            let seq = self.store.next_available_sequence_number().await?;
            match self
                .store
                .assign_sequence_number(candidate.leaf_hash, seq, leader.epoch())
                .await
            {
                Ok(()) => {}
                Err(CtLogError::Conflict { message }) => {
                    tracing::debug!(leaf_hash = ?candidate.leaf_hash, message, "sequence assignment lost a race, skipping");
                    continue;
                }
                Err(err) => return Err(err),
            }
            self.entry_db.assign_sequence(candidate.leaf_hash, seq).await?;
            self.compact_tree.push_leaf_hash(candidate.leaf_hash);
            sequenced.push(candidate.leaf_hash);
        }

        if sequenced.is_empty() {
            return Ok(None);
        }

        if !leader.is_valid() {
            return Err(CtLogError::conflict("leadership lease lost before publishing STH"));
        }

        // Step 4.
        let new_root = self.compact_tree.root();
        let new_size = current_size + sequenced.len() as u64;
        let prev_timestamp_ms = current_sth.as_ref().map(|s| s.timestamp_ms).unwrap_or(0);
        let now = now_ms();
        let skew = clock_skew_ms(now, prev_timestamp_ms);
        if skew > self.config.max_clock_skew_ms {
            return Err(CtLogError::fatal(format!(
                "clock skew {skew}ms exceeds max_clock_skew_ms {}, refusing to sign",
                self.config.max_clock_skew_ms
            )));
        }
        let timestamp_ms = next_sth_timestamp_ms(now, prev_timestamp_ms);
        let sth = sign_sth(self.signer.as_ref(), new_size, timestamp_ms, new_root);

        // Step 5.
        if !leader.is_valid() {
            return Err(CtLogError::conflict("leadership lease lost immediately before publish"));
        }
        self.store.publish_sth(sth.clone(), leader.epoch()).await?;
        self.entry_db.set_latest_tree_head(sth.clone()).await?;

        // Step 6.
        for leaf_hash in &sequenced {
            self.store.remove_pending(*leaf_hash).await?;
        }

        Ok(Some(sth))
    }
}
