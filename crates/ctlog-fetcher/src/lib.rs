//! The mirror fetcher (§4.9): a read-only follower of an upstream log. Pulls
//! entries into the local `EntryDb`, verifying boundary entries of every
//! fetch window against the upstream's signed STH before writing anything,
//! and never signs an STH of its own — it only adopts the upstream's after
//! checking its signature.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use rand::Rng;

use ctlog_core::config::LogConfig;
use ctlog_core::errors::CtLogError;
use ctlog_core::types::{Entry, LeafIndex, SignedTreeHead};
use ctlog_crypto::signer::Verifier;
use ctlog_crypto::sth::verify_sth;
use ctlog_entrydb::EntryDb;
use ctlog_merkle::verify_inclusion_proof;

/// The network boundary a mirror pulls from. Named but not implemented over
/// the wire here, same as `ConsistentStore` and `EntryDb`: this trait
/// expresses the shape of an external collaborator, leaving the transport to
/// a caller-supplied implementation.
#[async_trait]
pub trait UpstreamLog: Send + Sync {
    /// The upstream's current signed tree head.
    async fn get_sth(&self) -> Result<SignedTreeHead, CtLogError>;

    /// Entries `[start, start + count)`, in order. May return fewer than
    /// `count` if the upstream has that many available; never more.
    async fn get_entries(&self, start: LeafIndex, count: u64) -> Result<Vec<Entry>, CtLogError>;

    /// An inclusion proof for `leaf_index` against `tree_size`, per the
    /// upstream's own tree.
    async fn get_inclusion_proof(&self, leaf_index: LeafIndex, tree_size: u64) -> Result<Vec<[u8; 32]>, CtLogError>;
}

/// One non-overlapping slice of `[local_contiguous, upstream.tree_size)`
/// fetched and verified independently of its siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    start: LeafIndex,
    end: LeafIndex,
}

/// Drives one mirror's catch-up against an upstream log.
pub struct Fetcher<D, U> {
    entry_db: Arc<D>,
    upstream: Arc<U>,
    verifier: Arc<dyn Verifier>,
    config: LogConfig,
}

impl<D: EntryDb, U: UpstreamLog> Fetcher<D, U> {
    pub fn new(entry_db: Arc<D>, upstream: Arc<U>, verifier: Arc<dyn Verifier>, config: LogConfig) -> Self {
        Self {
            entry_db,
            upstream,
            verifier,
            config,
        }
    }

    /// Run forever, sleeping `period_ms` between successful catch-up
    /// attempts. A `Transient` failure (upstream timeout, a short-handed
    /// window response) is retried in place with exponential backoff and
    /// full jitter instead of propagating out of the loop; `Validation`,
    /// `Conflict`, and `Fatal` errors are not retryable and end the loop.
    pub async fn run(&self, period_ms: u64) -> Result<(), CtLogError> {
        let mut attempt: u32 = 0;
        loop {
            match self.run_once().await {
                Ok(Some(sth)) => {
                    attempt = 0;
                    tracing::info!(tree_size = sth.tree_size, "mirror adopted upstream STH");
                    tokio::time::sleep(Duration::from_millis(period_ms)).await;
                }
                Ok(None) => {
                    attempt = 0;
                    tokio::time::sleep(Duration::from_millis(period_ms)).await;
                }
                Err(err) if err.is_retryable() => {
                    attempt += 1;
                    let delay = retry_backoff(attempt);
                    tracing::warn!(%err, attempt, delay_ms = delay.as_millis() as u64, "transient fetch failure, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// One catch-up attempt: fetch the upstream's current STH, verify its
    /// signature, and pull every entry not yet held locally in parallel,
    /// verified windows. Returns the adopted STH if the local tree advanced.
    pub async fn run_once(&self) -> Result<Option<SignedTreeHead>, CtLogError> {
        let sth = self.upstream.get_sth().await?;
        verify_sth(self.verifier.as_ref(), &sth)?;

        let local_contiguous = self.entry_db.latest_contiguous_sequence().await?;
        if sth.tree_size <= local_contiguous {
            return Ok(None);
        }

        let windows = partition_into_windows(local_contiguous, sth.tree_size, self.config.fetcher_window_size);
        let results: Vec<Result<(), CtLogError>> = stream::iter(windows)
            .map(|window| self.fetch_and_verify_window(window, &sth))
            .buffer_unordered(self.config.fetcher_parallelism)
            .collect()
            .await;
        for result in results {
            result?;
        }

        self.entry_db.set_latest_tree_head(sth.clone()).await?;
        Ok(Some(sth))
    }

    async fn fetch_and_verify_window(&self, window: Window, sth: &SignedTreeHead) -> Result<(), CtLogError> {
        let count = window.end - window.start;
        let entries = self.upstream.get_entries(window.start, count).await?;
        if entries.len() as u64 != count {
            return Err(CtLogError::transient(format!(
                "upstream returned {} entries for window [{}, {}), expected {count}",
                entries.len(),
                window.start,
                window.end
            )));
        }

        self.verify_boundary(window.start, &entries[0], sth).await?;
        self.verify_boundary(window.end - 1, entries.last().expect("count > 0"), sth).await?;

        for (offset, entry) in entries.into_iter().enumerate() {
            let seq = window.start + offset as u64;
            let leaf_hash = entry.leaf_hash();
            self.entry_db.put_pending(leaf_hash, entry).await?;
            self.entry_db.assign_sequence(leaf_hash, seq).await?;
        }
        Ok(())
    }

    async fn verify_boundary(&self, leaf_index: LeafIndex, entry: &Entry, sth: &SignedTreeHead) -> Result<(), CtLogError> {
        let proof = self.upstream.get_inclusion_proof(leaf_index, sth.tree_size).await?;
        verify_inclusion_proof(entry.leaf_hash(), leaf_index, sth.tree_size, &proof, &sth.root_hash)
    }
}

const RETRY_BASE_DELAY_MS: u64 = 1_000;
const RETRY_MAX_DELAY_MS: u64 = 60_000;

/// Exponential backoff with full jitter: doubles the base delay per attempt
/// up to a cap, then picks uniformly at random between zero and that cap so
/// that many mirrors recovering from the same outage don't retry in lockstep.
fn retry_backoff(attempt: u32) -> Duration {
    let cap = RETRY_BASE_DELAY_MS
        .saturating_mul(1u64 << attempt.min(6))
        .min(RETRY_MAX_DELAY_MS);
    let delay_ms = rand::thread_rng().gen_range(0..=cap);
    Duration::from_millis(delay_ms)
}

fn partition_into_windows(start: LeafIndex, end: LeafIndex, window_size: u64) -> Vec<Window> {
    let mut windows = Vec::new();
    let mut cursor = start;
    while cursor < end {
        let window_end = (cursor + window_size).min(end);
        windows.push(Window {
            start: cursor,
            end: window_end,
        });
        cursor = window_end;
    }
    windows
}
