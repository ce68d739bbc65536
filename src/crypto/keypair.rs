//! secp256k1 ECDSA keypairs over 32-byte digests.
//!
//! Addresses are hex-encoded compressed SEC1 public keys; signatures are
//! variable-length DER (at most 72 bytes), hex-encoded on the wire. Both are
//! plain strings in JSON so wallets in any language can produce them.

use std::fmt;
use std::sync::OnceLock;

use secp256k1::ecdsa;
use secp256k1::{All, Message, Secp256k1, SecretKey};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{CryptoError, Digest};

fn secp() -> &'static Secp256k1<All> {
    static CTX: OnceLock<Secp256k1<All>> = OnceLock::new();
    CTX.get_or_init(Secp256k1::new)
}

/// A DER-encoded ECDSA signature (at most 72 bytes).
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Signature(Vec<u8>);

impl Signature {
    /// Maximum DER encoding length for a secp256k1 ECDSA signature.
    pub const MAX_LEN: usize = 72;

    /// The empty placeholder used for not-yet-signed inputs.
    pub fn empty() -> Self {
        Signature(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(s).map_err(|_| CryptoError::InvalidSignature)?;
        if bytes.len() > Self::MAX_LEN {
            return Err(CryptoError::InvalidSignature);
        }
        Ok(Signature(bytes))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self.to_hex())
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Signature::from_hex(&s).map_err(D::Error::custom)
    }
}

/// Signing half of a keypair.
#[derive(Clone)]
pub struct PrivateKey {
    inner: SecretKey,
}

impl PrivateKey {
    /// ECDSA-sign a 32-byte digest, returning the DER encoding.
    pub fn sign(&self, digest: &Digest) -> Signature {
        let message = Message::from_digest(*digest.as_bytes());
        let sig = secp().sign_ecdsa(&message, &self.inner);
        Signature(sig.serialize_der().to_vec())
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

/// Verifying half of a keypair; its string form is the wallet address.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PublicKey {
    inner: secp256k1::PublicKey,
}

impl PublicKey {
    /// Parse an address string (hex-encoded compressed SEC1 key).
    pub fn from_address(address: &str) -> Result<Self, CryptoError> {
        let inner = address.parse().map_err(|_| CryptoError::InvalidKey)?;
        Ok(PublicKey { inner })
    }

    /// The address string for this key.
    pub fn to_address(&self) -> String {
        self.inner.to_string()
    }

    /// Verify a DER signature over a 32-byte digest.
    ///
    /// Signature mismatch and undecodable DER both yield `Ok(false)`;
    /// `Err` is reserved for backend failures.
    pub fn verify(&self, digest: &Digest, signature: &Signature) -> Result<bool, CryptoError> {
        let Ok(sig) = ecdsa::Signature::from_der(signature.as_bytes()) else {
            return Ok(false);
        };
        let message = Message::from_digest(*digest.as_bytes());
        Ok(secp().verify_ecdsa(&message, &sig, &self.inner).is_ok())
    }
}

/// A secp256k1 signing/verifying keypair.
#[derive(Clone, Debug)]
pub struct Keypair {
    pub private: PrivateKey,
    pub public: PublicKey,
}

impl Keypair {
    /// Generate a fresh random keypair.
    pub fn generate() -> Self {
        let (secret, public) = secp().generate_keypair(&mut rand::thread_rng());
        Keypair {
            private: PrivateKey { inner: secret },
            public: PublicKey { inner: public },
        }
    }

    /// The address string of the public half.
    pub fn address(&self) -> String {
        self.public.to_address()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::sha256;

    #[test]
    fn sign_and_verify() {
        let kp = Keypair::generate();
        let digest = sha256(b"payload");
        let sig = kp.private.sign(&digest);
        assert!(!sig.is_empty());
        assert!(sig.as_bytes().len() <= Signature::MAX_LEN);
        assert!(kp.public.verify(&digest, &sig).unwrap());
    }

    #[test]
    fn verify_rejects_wrong_digest() {
        let kp = Keypair::generate();
        let sig = kp.private.sign(&sha256(b"one"));
        assert!(!kp.public.verify(&sha256(b"two"), &sig).unwrap());
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let kp = Keypair::generate();
        let other = Keypair::generate();
        let digest = sha256(b"payload");
        let sig = kp.private.sign(&digest);
        assert!(!other.public.verify(&digest, &sig).unwrap());
    }

    #[test]
    fn malformed_der_is_a_mismatch() {
        let kp = Keypair::generate();
        let garbage = Signature::from_hex("00ff00ff").unwrap();
        assert!(!kp.public.verify(&sha256(b"x"), &garbage).unwrap());
    }

    #[test]
    fn address_roundtrip() {
        let kp = Keypair::generate();
        let address = kp.address();
        let parsed = PublicKey::from_address(&address).unwrap();
        assert_eq!(parsed, kp.public);
        assert_eq!(parsed.to_address(), address);
    }

    #[test]
    fn bad_address_rejected() {
        assert_eq!(
            PublicKey::from_address("not-a-key").unwrap_err(),
            CryptoError::InvalidKey
        );
        assert_eq!(
            PublicKey::from_address("").unwrap_err(),
            CryptoError::InvalidKey
        );
    }

    #[test]
    fn signature_hex_roundtrip() {
        let kp = Keypair::generate();
        let sig = kp.private.sign(&sha256(b"payload"));
        let back = Signature::from_hex(&sig.to_hex()).unwrap();
        assert_eq!(back, sig);
        assert!(Signature::from_hex("zz").is_err());
        assert!(Signature::from_hex(&"00".repeat(80)).is_err());
    }
}
