//! Cryptographic primitives: SHA-256 digests and secp256k1 ECDSA keypairs.

pub mod digest;
pub mod hash;
pub mod keypair;

pub use digest::Digest;
pub use hash::sha256;
pub use keypair::{Keypair, PrivateKey, PublicKey, Signature};

/// Errors from digest parsing and key operations.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid digest string")]
    InvalidDigest,
    #[error("failed to parse public key")]
    InvalidKey,
    #[error("invalid signature encoding")]
    InvalidSignature,
    #[error("crypto backend failure: {0}")]
    Backend(String),
}
