//! Public keys and object identifiers

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use subtle::ConstantTimeEq;

use crate::encoding::{b64url_decode, b64url_encode, blake2b_256};
use crate::{MemeError, Result};

/// Length of a compressed SEC1 secp256k1 point
pub const COMPRESSED_KEY_LEN: usize = 33;

/// Compressed secp256k1 public key identifying a client.
///
/// Equality is constant time. On the wire the key travels as padded
/// base64url, except in the challenge form where clients send hex.
#[derive(Clone, Copy)]
pub struct PublicKey([u8; COMPRESSED_KEY_LEN]);

impl PublicKey {
    /// Wrap raw compressed point bytes (no curve validation here)
    pub fn from_bytes(bytes: [u8; COMPRESSED_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Build from a slice, rejecting anything but a compressed point encoding
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; COMPRESSED_KEY_LEN] = bytes.try_into().map_err(|_| {
            MemeError::token_format(format!(
                "public key must be {COMPRESSED_KEY_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        if array[0] != 0x02 && array[0] != 0x03 {
            return Err(MemeError::token_format(
                "public key is not a compressed point",
            ));
        }
        Ok(Self(array))
    }

    /// Parse the padded base64url form
    pub fn from_base64url(encoded: &str) -> Result<Self> {
        Self::from_slice(&b64url_decode(encoded)?)
    }

    /// Parse the hex form used by the challenge verification form
    pub fn from_hex(encoded: &str) -> Result<Self> {
        let bytes = hex::decode(encoded)
            .map_err(|e| MemeError::token_format(format!("invalid hex public key: {e}")))?;
        Self::from_slice(&bytes)
    }

    /// Raw compressed point bytes
    pub fn as_bytes(&self) -> &[u8; COMPRESSED_KEY_LEN] {
        &self.0
    }

    /// Padded base64url form
    pub fn to_base64url(&self) -> String {
        b64url_encode(self.0)
    }

    /// Lowercase hex form
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for PublicKey {}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64url())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_base64url())
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64url())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Self::from_base64url(&encoded).map_err(serde::de::Error::custom)
    }
}

/// Identifier of a stored object.
///
/// Content-addressed ids are the base64url BLAKE2b-256 digest of the
/// plaintext, so the same upload always lands on the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    /// Wrap an existing identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive the content address of `content`
    pub fn for_content(content: &[u8]) -> Self {
        Self(b64url_encode(blake2b_256(content)))
    }

    /// Identifier from raw id bytes, as carried inside access terms
    pub fn from_raw(raw: &[u8]) -> Self {
        Self(b64url_encode(raw))
    }

    /// Identifier string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const KEY_B64: &str = "A3PKNqMx2P2EfxkJCHFaNJl7Fdw8XVYMoDLPNBL89JTk";

    #[test]
    fn test_public_key_base64_round_trip() {
        let key = PublicKey::from_base64url(KEY_B64).unwrap();
        assert_eq!(key.to_base64url(), KEY_B64);
        assert_eq!(key.as_bytes()[0], 0x03);
    }

    #[test]
    fn test_public_key_hex_matches_base64() {
        let key = PublicKey::from_base64url(KEY_B64).unwrap();
        let from_hex = PublicKey::from_hex(&hex::encode(key.as_bytes())).unwrap();
        assert_eq!(key, from_hex);
    }

    #[test]
    fn test_public_key_rejects_bad_input() {
        assert_matches!(
            PublicKey::from_slice(&[2u8; 32]),
            Err(MemeError::TokenFormat { .. })
        );
        assert_matches!(
            PublicKey::from_slice(&[4u8; 33]),
            Err(MemeError::TokenFormat { .. })
        );
        assert_matches!(PublicKey::from_hex("zz"), Err(MemeError::TokenFormat { .. }));
    }

    #[test]
    fn test_content_id_is_deterministic() {
        let a = ObjectId::for_content(b"hello");
        let b = ObjectId::for_content(b"hello");
        assert_eq!(a, b);
        assert_ne!(a, ObjectId::for_content(b"hello\n"));
        assert_eq!(a.as_str().len(), 44);
    }
}
