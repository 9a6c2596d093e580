//! Per-object key derivation
//!
//! Every object is encrypted under its own key:
//!
//! ```text
//! object_key = HKDF-SHA256(ikm = master_key, salt = nonce, info = "")
//! ```
//!
//! The nonce is never written next to the ciphertext. Losing it makes the
//! object unrecoverable.

use hkdf::Hkdf;
use meme_core::secrets::KEY_LEN;
use meme_core::{MasterKey, MemeError, ObjectNonce, Result};
use sha2::Sha256;
use zeroize::Zeroizing;

/// Derive the encryption key for one object
pub fn derive_object_key(master: &MasterKey, nonce: &ObjectNonce) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let hkdf = Hkdf::<Sha256>::new(Some(nonce.as_bytes()), master.as_bytes());
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    hkdf.expand(&[], key.as_mut())
        .map_err(|e| MemeError::internal(format!("object key derivation failed: {e}")))?;
    Ok(key)
}
