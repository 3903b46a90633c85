//! Foundation types for the CT log engine: the error enum, domain types,
//! time helpers, and configuration shared by every other crate in the
//! workspace.

pub mod config;
pub mod errors;
pub mod hash;
pub mod prelude;
pub mod time;
pub mod types;

pub use config::LogConfig;
pub use errors::{CtLogError, Result};
pub use types::{
    ClusterNodeState, Digest, Entry, EntryType, LeafIndex, PendingEntry,
    SignedCertificateTimestamp, SignedTreeHead,
};
