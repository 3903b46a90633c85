//! Log configuration: the tunables enumerated in the design's external
//! interfaces section (§6), loaded from TOML with conservative defaults.

use serde::{Deserialize, Serialize};

use crate::errors::CtLogError;

/// Configuration for one log's engine: signing cadence, cluster quorum, and
/// mirror fetch parallelism.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Maximum merge delay, in seconds: every SCT must be covered by a
    /// published STH within this window (I5).
    pub mmd_seconds: u64,
    /// Maximum number of pending entries drained per sequencing iteration.
    pub signing_batch_limit: usize,
    /// Sleep between sequencing loop iterations, in milliseconds.
    pub signing_interval_ms: u64,
    /// An STH is eligible to serve only if its timestamp is within this many
    /// milliseconds of now.
    pub serving_freshness_window_ms: u64,
    /// Minimum number of nodes that must report a tree size before it can
    /// become the serving STH.
    pub cluster_quorum: usize,
    /// Leader election lease duration, in milliseconds.
    pub leader_lease_ms: u64,
    /// Interval at which the current leader refreshes its lease, in
    /// milliseconds. Must be much smaller than `leader_lease_ms`.
    pub leader_refresh_ms: u64,
    /// Number of concurrent fetch windows a mirror runs.
    pub fetcher_parallelism: usize,
    /// Number of entries per fetch window.
    pub fetcher_window_size: u64,
    /// Maximum tolerated clock skew, in milliseconds, between the leader's
    /// wall clock and the previous STH's timestamp before signing is
    /// refused (resolves the Open Question in spec.md §9).
    pub max_clock_skew_ms: i64,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            mmd_seconds: 24 * 60 * 60,
            signing_batch_limit: 1_000,
            signing_interval_ms: 1_000,
            serving_freshness_window_ms: 5 * 60 * 1_000,
            cluster_quorum: 2,
            leader_lease_ms: 10_000,
            leader_refresh_ms: 2_000,
            fetcher_parallelism: 8,
            fetcher_window_size: 1_000,
            max_clock_skew_ms: 60_000,
        }
    }
}

impl LogConfig {
    /// Load configuration from a TOML file, falling back to defaults for any
    /// field the file omits (via `#[serde(default)]`).
    pub fn load_from_file(path: &std::path::Path) -> Result<Self, CtLogError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CtLogError::validation(format!(
                "failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        Self::load_from_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn load_from_str(content: &str) -> Result<Self, CtLogError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| CtLogError::validation(format!("invalid config TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate field constraints that serde's defaulting cannot express.
    pub fn validate(&self) -> Result<(), CtLogError> {
        if self.cluster_quorum == 0 {
            return Err(CtLogError::validation("cluster_quorum must be at least 1"));
        }
        if self.leader_refresh_ms >= self.leader_lease_ms {
            return Err(CtLogError::validation(
                "leader_refresh_ms must be much smaller than leader_lease_ms",
            ));
        }
        if self.signing_batch_limit == 0 {
            return Err(CtLogError::validation(
                "signing_batch_limit must be at least 1",
            ));
        }
        if self.fetcher_parallelism == 0 {
            return Err(CtLogError::validation(
                "fetcher_parallelism must be at least 1",
            ));
        }
        Ok(())
    }
}
