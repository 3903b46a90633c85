//! Pluggable signing for STHs and SCTs.
//!
//! Key loading and custody are explicitly out of scope (spec.md §1): this
//! module defines the `Signer`/`Verifier` traits the rest of the engine
//! depends on, plus a software Ed25519 implementation for tests and local
//! development. A production deployment supplies its own `Signer` backed by
//! an HSM, KMS, or file-based key — nothing above this trait boundary
//! depends on how the private key is stored.

use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};
use rand::rngs::OsRng;

use ctlog_core::errors::CtLogError;

/// Signs arbitrary byte strings (the TLS-encoded STH/SCT signature inputs).
///
/// Implementations must be safe to call from multiple tasks concurrently;
/// the tree signer and the SCT-issuing submission path may both sign at
/// once.
pub trait Signer: Send + Sync {
    /// Sign `message` and return the raw signature bytes.
    fn sign(&self, message: &[u8]) -> Vec<u8>;

    /// The public key bytes a verifier needs to check signatures produced
    /// by this signer.
    fn public_key_bytes(&self) -> Vec<u8>;
}

/// Verifies signatures produced by a `Signer`'s counterpart public key.
pub trait Verifier: Send + Sync {
    /// Verify `signature` over `message`. Returns `Ok(())` on success.
    fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), CtLogError>;
}

/// A software Ed25519 signer. Suitable for tests, local development, and
/// mirrors that only verify; production leaders should supply a `Signer`
/// backed by a custody system instead.
pub struct Ed25519Signer {
    signing_key: SigningKey,
}

impl Ed25519Signer {
    /// Generate a fresh signing key from the OS RNG.
    pub fn generate() -> Self {
        let mut rng = OsRng;
        Self {
            signing_key: SigningKey::generate(&mut rng),
        }
    }

    /// Construct from an existing 32-byte seed. Real deployments load this
    /// from the key-custody system named in spec.md's `signing-key loading`
    /// out-of-scope boundary.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// A `Verifier` for this signer's public key.
    pub fn verifying_key(&self) -> Ed25519Verifier {
        Ed25519Verifier {
            verifying_key: self.signing_key.verifying_key(),
        }
    }
}

impl Signer for Ed25519Signer {
    fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.signing_key.sign(message).to_bytes().to_vec()
    }

    fn public_key_bytes(&self) -> Vec<u8> {
        self.signing_key.verifying_key().to_bytes().to_vec()
    }
}

/// Verifier counterpart to `Ed25519Signer`.
#[derive(Clone, Copy)]
pub struct Ed25519Verifier {
    verifying_key: VerifyingKey,
}

impl Ed25519Verifier {
    /// Construct a verifier from raw public key bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CtLogError> {
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CtLogError::validation("public key must be 32 bytes"))?;
        let verifying_key = VerifyingKey::from_bytes(&array)
            .map_err(|e| CtLogError::validation(format!("invalid public key: {e}")))?;
        Ok(Self { verifying_key })
    }
}

impl Verifier for Ed25519Verifier {
    fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), CtLogError> {
        let sig_bytes: [u8; 64] = signature
            .try_into()
            .map_err(|_| CtLogError::validation("signature must be 64 bytes"))?;
        let signature = Signature::from_bytes(&sig_bytes);
        self.verifying_key
            .verify(message, &signature)
            .map_err(|e| CtLogError::validation(format!("signature verification failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_round_trips() {
        let signer = Ed25519Signer::generate();
        let verifier = signer.verifying_key();
        let message = b"tree_size=10";
        let signature = signer.sign(message);
        verifier.verify(message, &signature).expect("valid signature");
    }

    #[test]
    fn verify_rejects_tampered_message() {
        let signer = Ed25519Signer::generate();
        let verifier = signer.verifying_key();
        let signature = signer.sign(b"tree_size=10");
        let err = verifier
            .verify(b"tree_size=11", &signature)
            .expect_err("should reject tampered message");
        assert!(matches!(err, CtLogError::Validation { .. }));
    }

    #[test]
    fn verify_rejects_signature_from_different_key() {
        let signer_a = Ed25519Signer::generate();
        let signer_b = Ed25519Signer::generate();
        let signature = signer_a.sign(b"tree_size=10");
        let err = signer_b
            .verifying_key()
            .verify(b"tree_size=10", &signature)
            .expect_err("should reject wrong-key signature");
        assert!(matches!(err, CtLogError::Validation { .. }));
    }

    #[test]
    fn from_seed_is_deterministic() {
        let seed = [9u8; 32];
        let a = Ed25519Signer::from_seed(seed);
        let b = Ed25519Signer::from_seed(seed);
        assert_eq!(a.public_key_bytes(), b.public_key_bytes());
    }
}
