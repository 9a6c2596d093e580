//! Public key recovery from compact signatures
//!
//! Messages are signed in the Lightning `signmessage` style: the digest is
//! `SHA256(SHA256("Lightning Signed Message:" || message))` and the signature
//! is 65 bytes, a header byte followed by `r || s`. Recovery validates the
//! signature, so there is no separate verify step.

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use meme_core::encoding::b64url_decode;
use meme_core::{MemeError, PublicKey, Result};
use sha2::{Digest, Sha256};

/// Domain separation prefix of every signed message
pub const SIGNED_MESSAGE_PREFIX: &[u8] = b"Lightning Signed Message:";

/// Length of a compact recoverable signature
pub const COMPACT_SIGNATURE_LEN: usize = 65;

/// Lowest valid header byte (uncompressed key, recid 0)
const HEADER_MIN: u8 = 27;
/// Highest valid header byte (compressed key, recid 3)
const HEADER_MAX: u8 = 34;

/// How the caller-supplied message text maps to signed bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageEncoding {
    /// Message text is base64url of the signed bytes
    Base64Url,
    /// Message text is itself the signed bytes (legacy clients)
    Utf8,
}

impl MessageEncoding {
    fn decode(self, message: &str) -> Result<Vec<u8>> {
        match self {
            Self::Base64Url => b64url_decode(message)
                .map_err(|e| MemeError::authentication(format!("message is not base64url: {e}"))),
            Self::Utf8 => Ok(message.as_bytes().to_vec()),
        }
    }
}

/// A successfully recovered signer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recovered {
    /// Key that produced the signature
    pub pub_key: PublicKey,
    /// Decoding that made the signature check out
    pub encoding: MessageEncoding,
}

impl Recovered {
    /// Whether the signature only verified under a fallback decoding
    pub fn is_fallback(&self) -> bool {
        self.encoding != MessageEncoding::Base64Url
    }
}

/// Double SHA-256 of the domain-separated message
pub fn message_digest(message: &[u8]) -> [u8; 32] {
    let first = Sha256::new()
        .chain_update(SIGNED_MESSAGE_PREFIX)
        .chain_update(message)
        .finalize();
    Sha256::digest(first).into()
}

/// Recover the compressed key that signed `message`.
///
/// Malformed, high-S and otherwise invalid signatures all fail with
/// `Authentication`.
pub fn recover_pubkey(message: &[u8], signature: &[u8]) -> Result<PublicKey> {
    if signature.len() != COMPACT_SIGNATURE_LEN {
        return Err(MemeError::authentication(format!(
            "signature must be {COMPACT_SIGNATURE_LEN} bytes, got {}",
            signature.len()
        )));
    }

    let header = signature[0];
    if !(HEADER_MIN..=HEADER_MAX).contains(&header) {
        return Err(MemeError::authentication(format!(
            "invalid signature header byte {header}"
        )));
    }
    let recovery_id = RecoveryId::from_byte((header - HEADER_MIN) & 3)
        .ok_or_else(|| MemeError::authentication("invalid recovery id"))?;

    let sig = Signature::from_slice(&signature[1..])
        .map_err(|_| MemeError::authentication("malformed signature scalars"))?;

    let digest = message_digest(message);
    let key = VerifyingKey::recover_from_prehash(&digest, &sig, recovery_id)
        .map_err(|_| MemeError::authentication("signature does not recover a key"))?;

    PublicKey::from_slice(key.to_encoded_point(true).as_bytes())
}

/// Verifies signatures over caller-supplied message text.
///
/// The text is decoded with each configured [`MessageEncoding`] in order and
/// the first decoding whose recovered key matches is accepted. Anything other
/// than base64url is a compatibility path for old clients and is reported in
/// [`Recovered::encoding`].
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    encodings: Vec<MessageEncoding>,
}

impl Default for SignatureVerifier {
    fn default() -> Self {
        Self::legacy()
    }
}

impl SignatureVerifier {
    /// Try base64url, then the raw text
    pub fn legacy() -> Self {
        Self {
            encodings: vec![MessageEncoding::Base64Url, MessageEncoding::Utf8],
        }
    }

    /// Only accept base64url messages
    pub fn strict() -> Self {
        Self {
            encodings: vec![MessageEncoding::Base64Url],
        }
    }

    /// Pick legacy or strict behaviour from a configuration switch
    pub fn from_legacy_flag(allow_legacy: bool) -> Self {
        if allow_legacy {
            Self::legacy()
        } else {
            Self::strict()
        }
    }

    /// Decoding strategies in the order they are tried
    pub fn encodings(&self) -> &[MessageEncoding] {
        &self.encodings
    }

    /// Recover the signer of `message` and check it against `expected`.
    ///
    /// `signature` is padded base64url of the 65-byte compact signature.
    /// Without an expected key the first decoding that recovers any key wins.
    /// When no decoding matches, the error of the last attempt is returned.
    pub fn recover_and_verify(
        &self,
        message: &str,
        signature: &str,
        expected: Option<&PublicKey>,
    ) -> Result<Recovered> {
        let sig_bytes = b64url_decode(signature)
            .map_err(|e| MemeError::authentication(format!("signature is not base64url: {e}")))?;

        let mut last_err = MemeError::authentication("no message encodings configured");
        for &encoding in &self.encodings {
            let attempt = encoding
                .decode(message)
                .and_then(|bytes| recover_pubkey(&bytes, &sig_bytes))
                .and_then(|pub_key| match expected {
                    Some(want) if *want != pub_key => {
                        Err(MemeError::authentication("signer does not match expected key"))
                    }
                    _ => Ok(pub_key),
                });

            match attempt {
                Ok(pub_key) => {
                    let recovered = Recovered { pub_key, encoding };
                    if recovered.is_fallback() {
                        tracing::warn!(
                            pub_key = %pub_key,
                            encoding = ?encoding,
                            "signature accepted under fallback message encoding"
                        );
                    }
                    return Ok(recovered);
                }
                Err(err) => {
                    tracing::debug!(encoding = ?encoding, error = %err, "signature attempt failed");
                    last_err = err;
                }
            }
        }

        Err(last_err)
    }
}
