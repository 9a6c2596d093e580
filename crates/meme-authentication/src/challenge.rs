//! Challenge-response authentication
//!
//! `ask` hands out the current unix second as the challenge id together with
//! its BLAKE2b-256 digest. The client signs the base64url digest and posts
//! it back with its hex public key; `verify` recomputes everything from the
//! id alone, so nothing is stored between the two calls.

use meme_core::config::{parse_truthy, AuthConfig, SEVEN_DAYS_SECS};
use meme_core::encoding::{b64url_encode, blake2b_256};
use meme_core::{MemeError, PhysicalTimeEffects, PublicKey, Result};
use meme_signature::SignatureVerifier;
use serde::{Deserialize, Serialize};

use crate::claims::IdentityClaims;

/// Default challenge validity window in seconds
pub const DEFAULT_CHALLENGE_TIMEOUT_SECS: u64 = 10;

/// Issued challenge: `{id, challenge}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    /// Unix seconds at issue time, as a decimal string
    pub id: String,
    /// base64url digest the client must sign
    pub challenge: String,
}

/// Posted challenge response. Missing fields deserialize as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignedResponse {
    /// Challenge id being answered
    pub id: String,
    /// base64url compact signature over the challenge
    pub sig: String,
    /// Hex compressed public key the client claims
    pub pubkey: String,
    /// Truthy to request a readonly credential
    pub readonly: String,
}

/// Challenge digest for an id, base64url encoded
pub fn challenge_digest(id: &str) -> String {
    b64url_encode(blake2b_256(id.as_bytes()))
}

/// Issues and verifies challenges against an injected clock
#[derive(Debug, Clone)]
pub struct ChallengeAuthenticator<C> {
    clock: C,
    verifier: SignatureVerifier,
    timeout_secs: u64,
    claims_lifetime_secs: u64,
}

impl<C: PhysicalTimeEffects> ChallengeAuthenticator<C> {
    /// Authenticator with default timeout and claims lifetime
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            verifier: SignatureVerifier::legacy(),
            timeout_secs: DEFAULT_CHALLENGE_TIMEOUT_SECS,
            claims_lifetime_secs: SEVEN_DAYS_SECS,
        }
    }

    /// Authenticator configured from the `auth` section
    pub fn from_config(config: &AuthConfig, clock: C) -> Self {
        Self {
            clock,
            verifier: SignatureVerifier::from_legacy_flag(config.allow_legacy_message_encoding),
            timeout_secs: config.challenge_timeout_secs,
            claims_lifetime_secs: config.claims_lifetime_secs,
        }
    }

    /// Override the challenge validity window
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Override the signature verifier
    pub fn with_verifier(mut self, verifier: SignatureVerifier) -> Self {
        self.verifier = verifier;
        self
    }

    /// Issue a challenge for the current second
    pub fn ask(&self) -> Challenge {
        let id = self.clock.now_secs().to_string();
        let challenge = challenge_digest(&id);
        Challenge { id, challenge }
    }

    /// Verify a challenge response and issue identity claims.
    ///
    /// The id must fall in `(now - timeout, now]`.
    pub fn verify(&self, response: &SignedResponse) -> Result<IdentityClaims> {
        if response.id.is_empty() || response.sig.is_empty() {
            return Err(MemeError::token_format("challenge id and signature are required"));
        }

        let issued: u64 = response
            .id
            .parse()
            .map_err(|_| MemeError::token_format("challenge id is not a number"))?;
        if issued == 0 {
            return Err(MemeError::token_format("challenge id must be non-zero"));
        }

        let now = self.clock.now_secs();
        if issued <= now.saturating_sub(self.timeout_secs) || issued > now {
            tracing::debug!(issued, now, "challenge outside validity window");
            return Err(MemeError::authentication("challenge expired or not yet issued"));
        }

        let expected = PublicKey::from_hex(&response.pubkey)
            .map_err(|e| MemeError::authentication(format!("claimed key invalid: {e}")))?;

        let digest = challenge_digest(&response.id);
        let recovered = self
            .verifier
            .recover_and_verify(&digest, &response.sig, Some(&expected))
            .map_err(|err| {
                tracing::warn!(error = %err, "challenge signature rejected");
                err
            })?;

        let readonly = parse_truthy(&response.readonly).unwrap_or(false);
        tracing::debug!(pub_key = %recovered.pub_key, readonly, "challenge verified");

        Ok(IdentityClaims {
            pub_key: recovered.pub_key,
            expiry: now.saturating_add(self.claims_lifetime_secs),
            readonly,
        })
    }
}
