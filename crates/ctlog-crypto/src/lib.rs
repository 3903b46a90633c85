//! Signing and verification primitives for the CT log: RFC 6962 TLS-encoded
//! signature inputs, and pluggable `Signer`/`Verifier` traits with a
//! software Ed25519 implementation.

pub mod encoding;
pub mod sct;
pub mod signer;
pub mod sth;

pub use sct::issue_sct;
pub use signer::{Ed25519Signer, Ed25519Verifier, Signer, Verifier};
pub use sth::{sign_sth, verify_sth};
