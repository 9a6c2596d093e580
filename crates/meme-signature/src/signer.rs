//! Compact recoverable signing
//!
//! Produces signatures that [`crate::SignatureVerifier`] accepts. Used by
//! object owners to sign access terms and by test clients answering
//! challenges.

use k256::ecdsa::SigningKey;
use meme_core::encoding::b64url_encode;
use meme_core::{MemeError, PublicKey, Result};
use zeroize::Zeroizing;

use crate::verifier::message_digest;

/// Header offset for a compressed-key signature
const COMPRESSED_HEADER_BASE: u8 = 27 + 4;

/// secp256k1 signing key producing compact recoverable signatures
#[derive(Clone)]
pub struct MessageSigner {
    key: SigningKey,
}

impl std::fmt::Debug for MessageSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageSigner")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

impl MessageSigner {
    /// Fresh random key from the OS CSPRNG
    pub fn generate() -> Self {
        Self {
            key: SigningKey::random(&mut rand::rngs::OsRng),
        }
    }

    /// Load a 32-byte secret scalar
    pub fn from_bytes(secret: &[u8]) -> Result<Self> {
        let key = SigningKey::from_slice(secret)
            .map_err(|_| MemeError::invalid("secret is not a valid secp256k1 scalar"))?;
        Ok(Self { key })
    }

    /// Load a hex encoded secret scalar
    pub fn from_hex(secret_hex: &str) -> Result<Self> {
        let mut bytes = Zeroizing::new([0u8; 32]);
        hex::decode_to_slice(secret_hex, &mut bytes[..])
            .map_err(|e| MemeError::invalid(format!("secret is not 32 hex bytes: {e}")))?;
        Self::from_bytes(&bytes[..])
    }

    /// Compressed public key of this signer
    pub fn public_key(&self) -> PublicKey {
        let point = self.key.verifying_key().to_encoded_point(true);
        let mut bytes = [0u8; meme_core::identifiers::COMPRESSED_KEY_LEN];
        bytes.copy_from_slice(point.as_bytes());
        PublicKey::from_bytes(bytes)
    }

    /// Sign raw message bytes, returning padded base64url of the 65-byte
    /// compact signature
    pub fn sign(&self, message: &[u8]) -> Result<String> {
        let digest = message_digest(message);
        let (sig, recovery_id) = self
            .key
            .sign_prehash_recoverable(&digest)
            .map_err(|e| MemeError::internal(format!("signing failed: {e}")))?;

        let mut compact = Vec::with_capacity(crate::verifier::COMPACT_SIGNATURE_LEN);
        compact.push(COMPRESSED_HEADER_BASE + recovery_id.to_byte());
        compact.extend_from_slice(&sig.to_bytes());
        Ok(b64url_encode(compact))
    }
}
