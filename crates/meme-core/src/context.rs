//! Per-request context
//!
//! Carries the authenticated identity and the resolved caveats explicitly
//! through a request instead of stashing them in ambient storage.

use crate::identifiers::PublicKey;
use crate::{MemeError, Result};

/// Authenticated state of one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Caller's authenticated key
    pub pub_key: PublicKey,
    /// Host the request was addressed to
    pub host: String,
    /// Credential only allows reads
    pub readonly: bool,
    /// Resolved `(condition, value)` caveats, in token order
    pub caveats: Vec<(String, String)>,
}

impl RequestContext {
    /// Context for an authenticated caller with no caveats
    pub fn new(pub_key: PublicKey, host: impl Into<String>, readonly: bool) -> Self {
        Self {
            pub_key,
            host: host.into(),
            readonly,
            caveats: Vec::new(),
        }
    }

    /// Attach caveats resolved by the capability validator
    pub fn with_caveats(mut self, caveats: Vec<(String, String)>) -> Self {
        self.caveats = caveats;
        self
    }

    /// Last value recorded for `condition`
    pub fn caveat(&self, condition: &str) -> Option<&str> {
        self.caveats
            .iter()
            .rev()
            .find(|(c, _)| c == condition)
            .map(|(_, v)| v.as_str())
    }

    /// Fail unless the credential permits writes
    pub fn require_writable(&self) -> Result<()> {
        if self.readonly {
            tracing::debug!(pub_key = %self.pub_key, "write attempted with readonly credential");
            return Err(MemeError::authorization("credential is readonly"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn key() -> PublicKey {
        let mut bytes = [7u8; 33];
        bytes[0] = 0x02;
        PublicKey::from_bytes(bytes)
    }

    #[test]
    fn test_readonly_blocks_writes() {
        let ctx = RequestContext::new(key(), "localhost:5000", true);
        assert_matches!(ctx.require_writable(), Err(MemeError::Authorization { .. }));

        let ctx = RequestContext::new(key(), "localhost:5000", false);
        assert!(ctx.require_writable().is_ok());
    }

    #[test]
    fn test_last_caveat_wins() {
        let ctx = RequestContext::new(key(), "localhost:5000", false).with_caveats(vec![
            ("large_upload_max_mb".to_string(), "10".to_string()),
            ("large_upload_max_mb".to_string(), "5".to_string()),
        ]);
        assert_eq!(ctx.caveat("large_upload_max_mb"), Some("5"));
        assert_eq!(ctx.caveat("meme_timeout"), None);
    }
}
