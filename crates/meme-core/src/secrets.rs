//! Key material held by the process

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{MemeError, Result};

/// Length of the storage master key and of per-object nonces
pub const KEY_LEN: usize = 32;

/// Storage master key. Every object key is derived from it.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey([u8; KEY_LEN]);

impl MasterKey {
    /// Wrap raw key bytes
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse a 64 character hex key
    pub fn from_hex(encoded: &str) -> Result<Self> {
        let mut bytes = hex::decode(encoded.trim())
            .map_err(|e| MemeError::invalid(format!("master key is not hex: {e}")))?;
        let result = <[u8; KEY_LEN]>::try_from(bytes.as_slice())
            .map(Self)
            .map_err(|_| MemeError::invalid(format!("master key must be {KEY_LEN} bytes")));
        bytes.zeroize();
        result
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(<redacted>)")
    }
}

/// Per-object random nonce, persisted as object metadata.
///
/// The nonce is the HKDF salt for the object key; losing it makes the
/// object unrecoverable.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ObjectNonce([u8; KEY_LEN]);

impl ObjectNonce {
    /// Wrap raw nonce bytes
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse the hex form kept in object metadata
    pub fn from_hex(encoded: &str) -> Result<Self> {
        let bytes = hex::decode(encoded)
            .map_err(|e| MemeError::invalid(format!("nonce is not hex: {e}")))?;
        <[u8; KEY_LEN]>::try_from(bytes.as_slice())
            .map(Self)
            .map_err(|_| MemeError::invalid(format!("nonce must be {KEY_LEN} bytes")))
    }

    /// Hex form for metadata storage
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Raw nonce bytes
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for ObjectNonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectNonce({})", self.to_hex())
    }
}
