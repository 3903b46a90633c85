//! Core domain types shared across the CT log engine.

use serde::{Deserialize, Serialize};

/// A 32-byte SHA-256 digest, used for leaf hashes and internal node hashes.
pub type Digest = [u8; 32];

/// The kind of certificate an entry represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    /// A submitted X.509 end-entity certificate.
    X509,
    /// A submitted precertificate.
    Precert,
}

impl EntryType {
    /// The RFC 6962 `LogEntryType` wire value (0 = x509_entry, 1 = precert_entry).
    pub fn wire_value(self) -> u16 {
        match self {
            Self::X509 => 0,
            Self::Precert => 1,
        }
    }
}

/// An immutable record accepted by the log. Once sequenced, the pair
/// `(sequence, entry)` is immutable forever (I1, §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// The leaf input bytes (the `MerkleTreeLeaf` encoding, RFC 6962 §3.4).
    pub leaf_input: Vec<u8>,
    /// Additional data served alongside the entry but not hashed into the tree.
    pub extra_data: Vec<u8>,
    /// Milliseconds since the Unix epoch when the entry was accepted.
    pub timestamp_ms: u64,
    /// Whether this is an X.509 or precertificate entry.
    pub entry_type: EntryType,
}

impl Entry {
    /// The RFC 6962 leaf hash: `SHA256(0x00 || leaf_input)`.
    pub fn leaf_hash(&self) -> Digest {
        crate::hash::leaf_hash(&self.leaf_input)
    }
}

/// A 64-bit dense, gap-free sequence number assigned to exactly one entry.
pub type LeafIndex = u64;

/// A Signed Tree Head: the cryptographic commitment to the log's state at a
/// given size (§3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTreeHead {
    /// Number of entries committed into the tree.
    pub tree_size: u64,
    /// Milliseconds since the Unix epoch when this STH was signed.
    pub timestamp_ms: u64,
    /// The RFC 6962 Merkle tree hash at `tree_size`.
    pub root_hash: Digest,
    /// Signature over the TLS-encoded STH signature input.
    pub signature: Vec<u8>,
}

impl SignedTreeHead {
    /// Whether `self` could legally follow `earlier` under the tree-size and
    /// timestamp monotonicity invariants (does not itself verify consistency
    /// proofs or signatures — see `ctlog_merkle` for that).
    pub fn is_monotonic_successor_of(&self, earlier: &SignedTreeHead) -> bool {
        self.tree_size >= earlier.tree_size && self.timestamp_ms > earlier.timestamp_ms
    }
}

/// A Signed Certificate Timestamp: the log's promise to include an entry
/// within the maximum merge delay (§3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedCertificateTimestamp {
    /// Identifier of the log that issued this SCT.
    pub log_id: Digest,
    /// Milliseconds since the Unix epoch when the SCT was issued.
    pub timestamp_ms: u64,
    /// CT extensions (opaque, usually empty).
    pub extensions: Vec<u8>,
    /// Signature over the TLS-encoded SCT signature input.
    pub signature: Vec<u8>,
}

/// An accepted-but-not-yet-sequenced entry, staged in the consistent store
/// under a key including its leaf hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEntry {
    /// The leaf hash this pending entry is staged under.
    pub leaf_hash: Digest,
    /// The full entry payload.
    pub entry: Entry,
    /// The timestamp promised in the issued SCT; used for FIFO ordering and
    /// as the MMD deadline.
    pub promised_timestamp_ms: u64,
}

/// A cluster node's self-reported replication progress (§3, §4.7).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterNodeState {
    /// Stable identifier for the reporting node.
    pub node_id: String,
    /// The newest STH this node has signed or adopted, if any.
    pub newest_sth: Option<SignedTreeHead>,
    /// Largest `n` such that this node holds all entries `[0, n)` locally.
    pub contiguous_tree_size: u64,
    /// Milliseconds since the Unix epoch when this state was last published.
    pub updated_at_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_type_wire_values_match_rfc6962() {
        assert_eq!(EntryType::X509.wire_value(), 0);
        assert_eq!(EntryType::Precert.wire_value(), 1);
    }

    #[test]
    fn sth_monotonic_successor_requires_strictly_later_timestamp() {
        let a = SignedTreeHead {
            tree_size: 10,
            timestamp_ms: 1_000,
            root_hash: [0u8; 32],
            signature: vec![],
        };
        let equal_ts = SignedTreeHead {
            tree_size: 10,
            timestamp_ms: 1_000,
            ..a.clone()
        };
        let later = SignedTreeHead {
            tree_size: 12,
            timestamp_ms: 1_001,
            ..a.clone()
        };
        assert!(!equal_ts.is_monotonic_successor_of(&a));
        assert!(later.is_monotonic_successor_of(&a));
    }

    #[test]
    fn sth_successor_rejects_shrinking_tree_size() {
        let a = SignedTreeHead {
            tree_size: 10,
            timestamp_ms: 1_000,
            root_hash: [0u8; 32],
            signature: vec![],
        };
        let smaller = SignedTreeHead {
            tree_size: 5,
            timestamp_ms: 2_000,
            ..a.clone()
        };
        assert!(!smaller.is_monotonic_successor_of(&a));
    }
}
