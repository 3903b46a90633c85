//! The RFC 6962 Merkle hash tree: a dense, provable tree for serving proofs
//! and a compact, append-only frontier for the sequencer's hot path.

pub mod compact;
pub mod dense;
pub mod util;

pub use compact::{CompactMerkleTree, CompactTreeSnapshot};
pub use dense::{verify_consistency_proof, verify_inclusion_proof, DenseMerkleTree};
