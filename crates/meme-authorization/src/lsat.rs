//! LSAT authorization header and token identifier
//!
//! Header form: `LSAT <base64 std macaroon>:<64 lowercase hex preimage>`.
//! The macaroon identifier carries the payment hash the preimage unlocks.

use meme_core::encoding::{b64_std_decode, b64_std_encode};
use meme_core::{MemeError, Result};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Header scheme keyword
pub const LSAT_SCHEME: &str = "LSAT";

/// Length of payment hash, preimage and token id
pub const HASH_LEN: usize = 32;

/// Hex length of a preimage in the header
const PREIMAGE_HEX_LEN: usize = HASH_LEN * 2;

/// Only identifier version understood
pub const IDENTIFIER_VERSION_0: u16 = 0;

/// Encoded size of a version 0 identifier
pub const IDENTIFIER_V0_LEN: usize = 2 + HASH_LEN + HASH_LEN;

/// First `Authorization` header value mentioning LSAT
pub fn find_lsat_header<'a, I>(values: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    values.into_iter().find(|v| v.contains(LSAT_SCHEME))
}

/// Split a header into macaroon bytes and the hex preimage
pub fn parse_header(value: &str) -> Result<(Vec<u8>, String)> {
    let rest = value
        .trim()
        .strip_prefix(LSAT_SCHEME)
        .and_then(|r| r.strip_prefix(' '))
        .ok_or_else(|| MemeError::token_format("authorization header is not an LSAT"))?;

    let (mac_b64, preimage) = rest
        .split_once(':')
        .ok_or_else(|| MemeError::token_format("LSAT header is missing the preimage"))?;

    if mac_b64.is_empty() {
        return Err(MemeError::token_format("LSAT header has an empty macaroon"));
    }
    if preimage.len() != PREIMAGE_HEX_LEN
        || !preimage.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    {
        return Err(MemeError::token_format(
            "LSAT preimage must be 64 lowercase hex characters",
        ));
    }

    let mac = b64_std_decode(mac_b64)
        .map_err(|e| MemeError::token_format(format!("LSAT macaroon encoding: {e}")))?;
    Ok((mac, preimage.to_string()))
}

/// Render a header value
pub fn format_header(macaroon: &[u8], preimage: &[u8; HASH_LEN]) -> String {
    format!("{LSAT_SCHEME} {}:{}", b64_std_encode(macaroon), hex::encode(preimage))
}

/// Decoded macaroon identifier of an LSAT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LsatIdentifier {
    /// Identifier format version
    pub version: u16,
    /// Hash of the payment preimage
    pub payment_hash: [u8; HASH_LEN],
    /// Unique token id
    pub token_id: [u8; HASH_LEN],
}

impl LsatIdentifier {
    /// Version 0 identifier
    pub fn new(payment_hash: [u8; HASH_LEN], token_id: [u8; HASH_LEN]) -> Self {
        Self {
            version: IDENTIFIER_VERSION_0,
            payment_hash,
            token_id,
        }
    }

    /// Decode `version(u16 BE) || payment_hash || token_id`
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let version_bytes: [u8; 2] = bytes
            .get(..2)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| MemeError::token_format("LSAT identifier too short"))?;
        let version = u16::from_be_bytes(version_bytes);
        if version != IDENTIFIER_VERSION_0 {
            return Err(MemeError::token_format(format!(
                "unknown LSAT identifier version {version}"
            )));
        }
        if bytes.len() != IDENTIFIER_V0_LEN {
            return Err(MemeError::token_format(format!(
                "LSAT identifier must be {IDENTIFIER_V0_LEN} bytes, got {}",
                bytes.len()
            )));
        }

        let mut payment_hash = [0u8; HASH_LEN];
        payment_hash.copy_from_slice(&bytes[2..2 + HASH_LEN]);
        let mut token_id = [0u8; HASH_LEN];
        token_id.copy_from_slice(&bytes[2 + HASH_LEN..]);
        Ok(Self {
            version,
            payment_hash,
            token_id,
        })
    }

    /// Encode to the identifier byte layout
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(IDENTIFIER_V0_LEN);
        out.extend_from_slice(&self.version.to_be_bytes());
        out.extend_from_slice(&self.payment_hash);
        out.extend_from_slice(&self.token_id);
        out
    }

    /// Whether `preimage` hashes to the payment hash
    pub fn matches_preimage(&self, preimage: &[u8]) -> bool {
        let digest = Sha256::digest(preimage);
        digest.as_slice().ct_eq(&self.payment_hash).into()
    }
}
