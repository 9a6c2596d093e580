//! Unified error system for the meme vault
//!
//! Every verification and storage path returns [`MemeError`]. The variants
//! follow the access-control taxonomy: malformed input, failed
//! authentication, unsatisfied authorization, expired grants, integrity
//! failures, conflicting writes and transport problems. Each maps to exactly
//! one HTTP status so callers never have to re-classify.

use serde::{Deserialize, Serialize};

/// Unified error type for all meme vault operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum MemeError {
    /// Malformed token, header or form input. The client must regenerate it.
    #[error("Token format error: {message}")]
    TokenFormat {
        /// What was malformed
        message: String,
    },

    /// Signature, key or challenge-window check failed
    #[error("Authentication failed: {message}")]
    Authentication {
        /// Why authentication failed
        message: String,
    },

    /// A capability caveat or access rule was not satisfied
    #[error("Authorization failed{}: {message}", condition_label(.condition))]
    Authorization {
        /// Caveat condition that failed, when a caveat chain was evaluated
        condition: Option<String>,
        /// Why authorization failed
        message: String,
    },

    /// Access terms have expired; the buyer must request new terms
    #[error("Gone: {message}")]
    Gone {
        /// Expiry description
        message: String,
    },

    /// Authenticated decryption failed. Deliberately carries no detail.
    #[error("Integrity check failed")]
    Integrity,

    /// Object not found in the backing store
    #[error("Not found: {message}")]
    NotFound {
        /// What was not found
        message: String,
    },

    /// An object already exists under a content address
    #[error("Conflict: {message}")]
    Conflict {
        /// What already exists
        message: String,
    },

    /// Backing store unreachable or failed
    #[error("Transport error: {message}")]
    Transport {
        /// Error message describing the transport failure
        message: String,
    },

    /// Invalid configuration or caller misuse
    #[error("Invalid: {message}")]
    Invalid {
        /// Error message describing the invalid input
        message: String,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal error
        message: String,
    },
}

impl MemeError {
    /// Create a token format error
    pub fn token_format(message: impl Into<String>) -> Self {
        Self::TokenFormat {
            message: message.into(),
        }
    }

    /// Create an authentication error
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Create an authorization error not tied to a caveat condition
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            condition: None,
            message: message.into(),
        }
    }

    /// Create an authorization error labelled with the offending caveat condition
    pub fn caveat_unsatisfied(condition: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Authorization {
            condition: Some(condition.into()),
            message: message.into(),
        }
    }

    /// Create a gone error
    pub fn gone(message: impl Into<String>) -> Self {
        Self::Gone {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// HTTP status code the error surfaces as.
    ///
    /// `Integrity` is reported as 404 so that a wrong key, a wrong nonce and
    /// tampered ciphertext all look like a missing object from outside.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::TokenFormat { .. } | Self::Invalid { .. } => 400,
            Self::Authentication { .. } | Self::Authorization { .. } => 401,
            Self::Gone { .. } => 410,
            Self::Integrity | Self::NotFound { .. } => 404,
            Self::Conflict { .. } => 409,
            Self::Transport { .. } => 503,
            Self::Internal { .. } => 500,
        }
    }

    /// Whether the caller may retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Caveat condition attached to an authorization failure
    pub fn condition(&self) -> Option<&str> {
        match self {
            Self::Authorization { condition, .. } => condition.as_deref(),
            _ => None,
        }
    }
}

fn condition_label(condition: &Option<String>) -> String {
    condition
        .as_ref()
        .map(|c| format!(" [{c}]"))
        .unwrap_or_default()
}

/// Standard Result type for meme vault operations
pub type Result<T> = std::result::Result<T, MemeError>;

impl From<std::io::Error> for MemeError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::not_found(err.to_string()),
            _ => Self::transport(err.to_string()),
        }
    }
}
