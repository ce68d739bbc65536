//! SHA-256 hashing to a [`Digest`].

use sha2::{Digest as _, Sha256};

use super::Digest;

/// Deterministic SHA-256 over the given bytes.
pub fn sha256(data: &[u8]) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(data);
    Digest::new(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        // SHA-256("abc")
        let d = sha256(b"abc");
        assert_eq!(
            d.to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn deterministic() {
        assert_eq!(sha256(b"cinder"), sha256(b"cinder"));
        assert_ne!(sha256(b"cinder"), sha256(b"cinders"));
    }
}
