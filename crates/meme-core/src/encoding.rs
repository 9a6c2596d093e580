//! Base64 and hashing helpers shared by every wire format
//!
//! All URL-facing encodings use the padded base64url alphabet, matching the
//! clients that mint challenges, access terms and object ids. The capability
//! header uses the standard alphabet.

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine as _;
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};

use crate::{MemeError, Result};

type Blake2b256 = Blake2b<U32>;

/// Encode bytes as padded base64url
pub fn b64url_encode(bytes: impl AsRef<[u8]>) -> String {
    URL_SAFE.encode(bytes)
}

/// Decode padded base64url, reporting failures as token format errors
pub fn b64url_decode(input: &str) -> Result<Vec<u8>> {
    URL_SAFE
        .decode(input)
        .map_err(|e| MemeError::token_format(format!("invalid base64url: {e}")))
}

/// Decode standard (non-URL) base64
pub fn b64_std_decode(input: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(input)
        .map_err(|e| MemeError::token_format(format!("invalid base64: {e}")))
}

/// Encode bytes as standard padded base64
pub fn b64_std_encode(bytes: impl AsRef<[u8]>) -> String {
    STANDARD.encode(bytes)
}

/// BLAKE2b with a 256-bit output.
///
/// Used for challenge digests and content addressing.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    hasher.finalize().into()
}
