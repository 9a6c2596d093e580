//! Identity claims issued after a successful challenge
//!
//! `BearerClaims` is the JSON shape handed to whatever signs the bearer
//! credential; serialising and signing that credential happens elsewhere.

use meme_core::{MemeError, PublicKey, RequestContext, Result};
use serde::{Deserialize, Serialize};

/// Authenticated identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityClaims {
    /// Key proven by the challenge response
    pub pub_key: PublicKey,
    /// Unix seconds after which the claims are void
    pub expiry: u64,
    /// Credential only allows reads
    pub readonly: bool,
}

impl IdentityClaims {
    /// Wire form of these claims
    pub fn to_bearer(&self) -> BearerClaims {
        BearerClaims {
            key: self.pub_key.to_base64url(),
            exp: self.expiry,
            readonly: self.readonly.then_some(true),
        }
    }

    /// Request context for a call made with these claims
    pub fn request_context(&self, host: impl Into<String>) -> RequestContext {
        RequestContext::new(self.pub_key, host, self.readonly)
    }
}

/// Bearer credential claims: `{key, exp, readonly?}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BearerClaims {
    /// base64url compressed public key
    pub key: String,
    /// Expiry in unix seconds
    pub exp: u64,
    /// Present and true for readonly credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readonly: Option<bool>,
}

impl BearerClaims {
    /// Check expiry and key, yielding the identity they carry
    pub fn into_identity(self, now: u64) -> Result<IdentityClaims> {
        if self.exp <= now {
            return Err(MemeError::authentication("bearer claims expired"));
        }
        let pub_key = PublicKey::from_base64url(&self.key)
            .map_err(|e| MemeError::authentication(format!("bearer key invalid: {e}")))?;
        Ok(IdentityClaims {
            pub_key,
            expiry: self.exp,
            readonly: self.readonly.unwrap_or(false),
        })
    }
}
