//! Signing Signed Certificate Timestamps.

use ctlog_core::types::{Digest, Entry, SignedCertificateTimestamp};

use crate::encoding::sct_signature_input;
use crate::signer::Signer;

/// Issue an SCT for `entry`, binding it to the log's identity and the
/// current timestamp. The signature covers `entry.leaf_input` directly
/// (the RFC 6962 `signed_entry`), so a client can verify the promise before
/// the entry is ever sequenced.
pub fn issue_sct(
    signer: &dyn Signer,
    log_id: Digest,
    entry: &Entry,
    timestamp_ms: u64,
) -> SignedCertificateTimestamp {
    let extensions: Vec<u8> = Vec::new();
    let input = sct_signature_input(
        timestamp_ms,
        entry.entry_type.wire_value(),
        &entry.leaf_input,
        &extensions,
    );
    let signature = signer.sign(&input);
    SignedCertificateTimestamp {
        log_id,
        timestamp_ms,
        extensions,
        signature,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::Ed25519Signer;
    use ctlog_core::types::EntryType;

    fn sample_entry() -> Entry {
        Entry {
            leaf_input: b"certificate-bytes".to_vec(),
            extra_data: Vec::new(),
            timestamp_ms: 1_000,
            entry_type: EntryType::X509,
        }
    }

    #[test]
    fn sct_carries_the_issuing_timestamp() {
        let signer = Ed25519Signer::generate();
        let sct = issue_sct(&signer, [0u8; 32], &sample_entry(), 1_234);
        assert_eq!(sct.timestamp_ms, 1_234);
        assert!(!sct.signature.is_empty());
    }

    #[test]
    fn duplicate_submission_is_idempotent_on_leaf_hash_not_sct_bytes() {
        // Two SCTs issued for the same entry at the same timestamp sign the
        // same bytes, but a real duplicate request replays the *stored*
        // SCT rather than minting a new one (I3) — this only checks that
        // the signature input is stable, which is what makes replay safe.
        let signer = Ed25519Signer::generate();
        let entry = sample_entry();
        let a = issue_sct(&signer, [0u8; 32], &entry, 1_234);
        let b = issue_sct(&signer, [0u8; 32], &entry, 1_234);
        assert_eq!(a.signature, b.signature);
    }
}
