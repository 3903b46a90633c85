//! Common imports for downstream crates.

pub use crate::config::LogConfig;
pub use crate::errors::{CtLogError, Result};
pub use crate::types::{
    ClusterNodeState, Digest, Entry, EntryType, LeafIndex, PendingEntry,
    SignedCertificateTimestamp, SignedTreeHead,
};
