//! Access terms: signed grants of one object to one buyer
//!
//! Wire form, every segment padded base64url and joined by `.`:
//!
//! ```text
//! host . object_id . buyer_pubkey . expiry(u32 BE) [. urlencoded metadata]* . signature
//! ```
//!
//! The owner signs the concatenated *decoded* bytes of every segment but the
//! last. An unsigned token ends in a bare `.` where the signature goes.

use std::collections::HashSet;

use indexmap::IndexMap;
use meme_core::encoding::{b64url_decode, b64url_encode};
use meme_core::{MemeError, PublicKey, Result};
use meme_signature::{MessageSigner, SignatureVerifier};

/// Segments before the optional metadata: host, object, buyer, expiry
const FIXED_SEGMENTS: usize = 4;
/// Fixed segments plus the signature
const MIN_SEGMENTS: usize = FIXED_SEGMENTS + 1;

/// Decoded access terms
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessTerms {
    /// Host the grant is valid on
    pub host: String,
    /// Raw object id bytes
    pub object_id: Vec<u8>,
    /// Raw buyer public key bytes
    pub buyer_pub_key: Vec<u8>,
    /// Unix seconds the grant expires at
    pub expiry: u32,
    /// Merged metadata; later segments win on repeated keys
    pub metadata: IndexMap<String, String>,
    /// Signature segment, still base64url
    pub signature: String,
}

impl AccessTerms {
    /// Object id in its base64url form
    pub fn object_id_b64(&self) -> String {
        b64url_encode(&self.object_id)
    }

    /// Buyer key in its base64url form
    pub fn buyer_b64(&self) -> String {
        b64url_encode(&self.buyer_pub_key)
    }
}

/// Terms together with the bytes the owner signed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTerms {
    /// Decoded fields
    pub terms: AccessTerms,
    /// Concatenated decoded bytes of every segment but the signature
    pub signed_payload: Vec<u8>,
}

impl ParsedTerms {
    /// The message text handed to the signature verifier
    pub fn signed_message(&self) -> String {
        b64url_encode(&self.signed_payload)
    }
}

/// Build an unsigned token. `object_id` and `buyer_pub_key` are base64url.
pub fn start(host: &str, object_id: &str, buyer_pub_key: &str, expiry: u32) -> Result<String> {
    start_with_metadata(host, object_id, buyer_pub_key, expiry, std::iter::empty::<(&str, &str)>())
}

/// Build an unsigned token carrying one url-encoded metadata segment.
///
/// An empty metadata iterator produces no metadata segment.
pub fn start_with_metadata<I, K, V>(
    host: &str,
    object_id: &str,
    buyer_pub_key: &str,
    expiry: u32,
    metadata: I,
) -> Result<String>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let object_bytes = b64url_decode(object_id)?;
    let buyer_bytes = b64url_decode(buyer_pub_key)?;

    let mut segments = vec![
        b64url_encode(host.as_bytes()),
        b64url_encode(object_bytes),
        b64url_encode(buyer_bytes),
        b64url_encode(expiry.to_be_bytes()),
    ];

    let mut query = form_urlencoded::Serializer::new(String::new());
    let mut has_metadata = false;
    for (key, value) in metadata {
        query.append_pair(key.as_ref(), value.as_ref());
        has_metadata = true;
    }
    if has_metadata {
        segments.push(b64url_encode(query.finish().as_bytes()));
    }

    let mut token = segments.join(".");
    token.push('.');
    Ok(token)
}

/// Parse a token into its terms and signed payload
pub fn parse(token: &str) -> Result<ParsedTerms> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() < MIN_SEGMENTS {
        return Err(MemeError::token_format(format!(
            "access terms need at least {MIN_SEGMENTS} segments, got {}",
            segments.len()
        )));
    }

    let (signature, fields) = match segments.split_last() {
        Some((last, rest)) => (*last, rest),
        None => return Err(MemeError::token_format("empty access terms")),
    };

    let mut decoded = Vec::with_capacity(fields.len());
    let mut signed_payload = Vec::new();
    for segment in fields {
        let bytes = b64url_decode(segment)?;
        signed_payload.extend_from_slice(&bytes);
        decoded.push(bytes);
    }

    let mut decoded = decoded.into_iter();
    let mut next = || decoded.next().unwrap_or_default();

    let host = String::from_utf8(next())
        .map_err(|_| MemeError::token_format("access terms host is not UTF-8"))?;
    let object_id = next();
    let buyer_pub_key = next();
    let expiry_bytes: [u8; 4] = next()
        .try_into()
        .map_err(|_| MemeError::token_format("access terms expiry must be 4 bytes"))?;

    let mut metadata = IndexMap::new();
    for segment in decoded {
        merge_metadata(&mut metadata, &segment);
    }

    Ok(ParsedTerms {
        terms: AccessTerms {
            host,
            object_id,
            buyer_pub_key,
            expiry: u32::from_be_bytes(expiry_bytes),
            metadata,
            signature: signature.to_string(),
        },
        signed_payload,
    })
}

/// First value per key within a segment, later segments override
fn merge_metadata(metadata: &mut IndexMap<String, String>, segment: &[u8]) {
    let mut seen = HashSet::new();
    for (key, value) in form_urlencoded::parse(segment) {
        if !seen.insert(key.clone()) {
            continue;
        }
        metadata.insert(key.into_owned(), value.into_owned());
    }
}

/// Append the owner's signature to an unsigned token
pub fn sign_terms(unsigned: &str, signer: &MessageSigner) -> Result<String> {
    let parsed = parse(unsigned)?;
    if !parsed.terms.signature.is_empty() {
        return Err(MemeError::invalid("access terms are already signed"));
    }
    let signature = signer.sign(&parsed.signed_payload)?;
    Ok(format!("{unsigned}{signature}"))
}

/// Server-side checks for presented access terms
#[derive(Debug, Clone)]
pub struct TermsAuthorizer {
    host: String,
    verifier: SignatureVerifier,
}

impl TermsAuthorizer {
    /// Authorizer for the configured host
    pub fn new(host: impl Into<String>, verifier: SignatureVerifier) -> Self {
        Self {
            host: host.into(),
            verifier,
        }
    }

    /// Host terms must name
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Check the owner's signature over the payload
    pub fn verify_signature(&self, parsed: &ParsedTerms, owner: &PublicKey) -> Result<()> {
        self.verifier
            .recover_and_verify(&parsed.signed_message(), &parsed.terms.signature, Some(owner))
            .map(|_| ())
            .map_err(|err| {
                tracing::warn!(owner = %owner, error = %err, "access terms signature rejected");
                err
            })
    }

    /// Authorize `caller` to read the object under `parsed`.
    ///
    /// Order: owner signature (skipped when the caller owns the object),
    /// host, buyer, expiry. Expired terms are `Gone`.
    pub fn authorize(
        &self,
        parsed: &ParsedTerms,
        caller: &PublicKey,
        owner: &PublicKey,
        now: u64,
    ) -> Result<()> {
        let terms = &parsed.terms;

        if caller != owner {
            self.verify_signature(parsed, owner)?;
        }

        if terms.host != self.host {
            tracing::debug!(expected = %self.host, got = %terms.host, "access terms host mismatch");
            return Err(MemeError::authentication("access terms issued for another host"));
        }

        let buyer = PublicKey::from_slice(&terms.buyer_pub_key)
            .map_err(|_| MemeError::authentication("access terms buyer key is malformed"))?;
        if buyer != *caller {
            return Err(MemeError::authentication("access terms issued to another buyer"));
        }

        if u64::from(terms.expiry) <= now {
            return Err(MemeError::gone(format!(
                "access terms expired at {}",
                terms.expiry
            )));
        }

        Ok(())
    }
}
