//! TLS-encoded signature inputs for STHs and SCTs (RFC 6962 §3.2, §3.4).
//!
//! Per spec.md §6, both structures use `version = 0` and `signature_type =
//! 0`; the structures differ in their remaining fields, which is what binds
//! a signature to "this is a tree head" versus "this is a timestamp promise"
//! in practice (a signer never reuses one signature across the two shapes).

use ctlog_core::types::Digest;

const VERSION_V1: u8 = 0;
const SIGNATURE_TYPE: u8 = 0;

/// Build the TLS-encoded bytes a leader signs to produce an STH signature
/// (spec.md §6: `{version, signature_type, timestamp, tree_size,
/// sha256_root_hash}`).
pub fn sth_signature_input(timestamp_ms: u64, tree_size: u64, root_hash: &Digest) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + 1 + 8 + 8 + 32);
    buf.push(VERSION_V1);
    buf.push(SIGNATURE_TYPE);
    buf.extend_from_slice(&timestamp_ms.to_be_bytes());
    buf.extend_from_slice(&tree_size.to_be_bytes());
    buf.extend_from_slice(root_hash);
    buf
}

/// Build the TLS-encoded bytes signed to produce an SCT (spec.md §6:
/// `{version, signature_type, timestamp, log_entry_type, signed_entry,
/// extensions}`).
///
/// `signed_entry` and `extensions` are each length-prefixed with a
/// big-endian `u32` so the encoding is unambiguous without a shared schema;
/// `log_entry_type` is `EntryType::wire_value()`.
pub fn sct_signature_input(
    timestamp_ms: u64,
    log_entry_type: u16,
    signed_entry: &[u8],
    extensions: &[u8],
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + 1 + 8 + 2 + 4 + signed_entry.len() + 4 + extensions.len());
    buf.push(VERSION_V1);
    buf.push(SIGNATURE_TYPE);
    buf.extend_from_slice(&timestamp_ms.to_be_bytes());
    buf.extend_from_slice(&log_entry_type.to_be_bytes());
    buf.extend_from_slice(&(signed_entry.len() as u32).to_be_bytes());
    buf.extend_from_slice(signed_entry);
    buf.extend_from_slice(&(extensions.len() as u32).to_be_bytes());
    buf.extend_from_slice(extensions);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sth_input_is_deterministic_and_length_fixed() {
        let root = [7u8; 32];
        let a = sth_signature_input(1_000, 42, &root);
        let b = sth_signature_input(1_000, 42, &root);
        assert_eq!(a, b);
        assert_eq!(a.len(), 1 + 1 + 8 + 8 + 32);
    }

    #[test]
    fn sth_input_changes_with_any_field() {
        let root = [7u8; 32];
        let base = sth_signature_input(1_000, 42, &root);
        assert_ne!(base, sth_signature_input(1_001, 42, &root));
        assert_ne!(base, sth_signature_input(1_000, 43, &root));
        assert_ne!(base, sth_signature_input(1_000, 42, &[8u8; 32]));
    }

    #[test]
    fn sct_input_roundtrips_length_prefixes() {
        let a = sct_signature_input(500, 0, b"leaf-bytes", b"");
        let b = sct_signature_input(500, 0, b"leaf-bytes", b"ext");
        assert_ne!(a, b);
        assert!(a.len() < b.len());
    }
}
