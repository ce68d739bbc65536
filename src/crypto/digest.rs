//! Fixed-width 32-byte digests with hex encoding and leading-zero scanning.

use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::CryptoError;

/// A 32-byte digest, rendered as a 64-character lowercase hex string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Digest([u8; 32]);

impl Digest {
    /// Digest width in bytes.
    pub const LEN: usize = 32;

    pub fn new(bytes: [u8; 32]) -> Self {
        Digest(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex encoding, exactly 64 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a 64-character hex string (either case accepted).
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        if s.len() != 2 * Self::LEN {
            return Err(CryptoError::InvalidDigest);
        }
        let bytes = hex::decode(s).map_err(|_| CryptoError::InvalidDigest)?;
        let mut out = [0u8; Self::LEN];
        out.copy_from_slice(&bytes);
        Ok(Digest(out))
    }

    /// Number of leading zero bits, scanning from the most-significant byte.
    /// Returns a value in `[0, 256]`.
    pub fn leading_zero_bits(&self) -> u32 {
        let mut count = 0;
        for byte in self.0 {
            if byte == 0 {
                count += 8;
            } else {
                count += byte.leading_zeros();
                break;
            }
        }
        count
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Digest::from_hex(&s).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex_of(first: &str) -> String {
        let mut s = String::from(first);
        s.push_str(&"0".repeat(64 - first.len()));
        s
    }

    #[test]
    fn hex_roundtrip() {
        let d = Digest::from_hex(&hex_of("8badf00d")).unwrap();
        assert_eq!(Digest::from_hex(&d.to_hex()).unwrap(), d);
        assert_eq!(d.to_hex().len(), 64);
        assert!(d.to_hex().chars().all(|c| !c.is_ascii_uppercase()));
    }

    #[test]
    fn uppercase_accepted_lowercase_emitted() {
        let d = Digest::from_hex(&hex_of("ABCDEF")).unwrap();
        assert!(d.to_hex().starts_with("abcdef"));
    }

    #[test]
    fn bad_strings_rejected() {
        assert_eq!(Digest::from_hex(""), Err(CryptoError::InvalidDigest));
        assert_eq!(Digest::from_hex("abcd"), Err(CryptoError::InvalidDigest));
        assert_eq!(
            Digest::from_hex(&hex_of("zz")),
            Err(CryptoError::InvalidDigest)
        );
        // 65 chars
        let mut too_long = hex_of("");
        too_long.push('0');
        assert_eq!(Digest::from_hex(&too_long), Err(CryptoError::InvalidDigest));
    }

    #[test]
    fn leading_zero_bits_scan() {
        assert_eq!(
            Digest::from_hex(&hex_of("80")).unwrap().leading_zero_bits(),
            0
        );
        assert_eq!(
            Digest::from_hex(&hex_of("40")).unwrap().leading_zero_bits(),
            1
        );
        assert_eq!(
            Digest::from_hex(&hex_of("0080")).unwrap().leading_zero_bits(),
            8
        );
        assert_eq!(
            Digest::from_hex(&hex_of("01")).unwrap().leading_zero_bits(),
            7
        );
        assert_eq!(Digest::default().leading_zero_bits(), 256);
    }

    #[test]
    fn serde_as_hex_string() {
        let d = Digest::from_hex(&hex_of("beef")).unwrap();
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, format!("\"{}\"", d.to_hex()));
        let back: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }
}
