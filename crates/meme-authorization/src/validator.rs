//! LSAT capability token validation

use meme_core::{MemeConfig, MemeError, Result};

use crate::caveat::{decode_caveats, Caveat};
use crate::limits::UploadLimits;
use crate::lsat::{parse_header, LsatIdentifier};
use crate::macaroon::Macaroon;
use crate::registry::{Requirement, SatisfierRegistry, VerifiedCaveats};
use crate::satisfier::{
    CapabilitiesSatisfier, TimeoutSatisfier, UploadSizeSatisfier, MEME_SERVICE,
};

/// A decoded `Authorization: LSAT` credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityToken {
    /// The presented macaroon
    pub macaroon: Macaroon,
    /// Hex payment preimage from the header
    pub preimage: String,
    /// LSAT identifier, when the macaroon id is one
    pub identifier: Option<LsatIdentifier>,
    /// First-party caveats in token order
    pub caveats: Vec<Caveat>,
}

/// Parses LSAT headers and checks caveats against satisfiers
#[derive(Clone)]
pub struct CapabilityTokenValidator {
    root_key: Option<Vec<u8>>,
    require_preimage_match: bool,
    service: String,
    limits: UploadLimits,
}

impl std::fmt::Debug for CapabilityTokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityTokenValidator")
            .field("root_key", &self.root_key.as_ref().map(|_| "<redacted>"))
            .field("require_preimage_match", &self.require_preimage_match)
            .field("service", &self.service)
            .field("limits", &self.limits)
            .finish()
    }
}

impl Default for CapabilityTokenValidator {
    fn default() -> Self {
        Self::new(None, UploadLimits::default())
    }
}

impl CapabilityTokenValidator {
    /// Validator that verifies macaroon signatures only when `root_key` is set
    pub fn new(root_key: Option<Vec<u8>>, limits: UploadLimits) -> Self {
        Self {
            root_key,
            require_preimage_match: false,
            service: MEME_SERVICE.to_string(),
            limits,
        }
    }

    /// Validator from the `lsat` and `uploads` config sections
    pub fn from_config(config: &MemeConfig) -> Result<Self> {
        let mut validator = Self::new(
            config.lsat_root_key()?,
            UploadLimits::from_config(&config.uploads),
        );
        validator.require_preimage_match = config.lsat.require_preimage_match;
        Ok(validator)
    }

    /// Require `sha256(preimage)` to match the identifier's payment hash
    pub fn with_preimage_check(mut self, required: bool) -> Self {
        self.require_preimage_match = required;
        self
    }

    /// Service prefix for timeout and capability conditions
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    /// Upload limits in force
    pub fn limits(&self) -> &UploadLimits {
        &self.limits
    }

    /// Parse and check an `Authorization` header value
    pub fn from_header(&self, value: &str) -> Result<CapabilityToken> {
        let (raw, preimage) = parse_header(value)?;
        let macaroon = Macaroon::from_binary(&raw)?;

        if let Some(root_key) = &self.root_key {
            macaroon.verify_signature(root_key).map_err(|err| {
                tracing::warn!(error = %err, "macaroon signature rejected");
                err
            })?;
        }

        let identifier = LsatIdentifier::decode(macaroon.identifier()).ok();
        if self.require_preimage_match {
            self.check_preimage(identifier.as_ref(), &preimage)?;
        }

        let caveats = decode_caveats(&macaroon);
        tracing::debug!(caveats = caveats.len(), "capability token decoded");

        Ok(CapabilityToken {
            macaroon,
            preimage,
            identifier,
            caveats,
        })
    }

    fn check_preimage(&self, identifier: Option<&LsatIdentifier>, preimage_hex: &str) -> Result<()> {
        let identifier = identifier
            .ok_or_else(|| MemeError::authentication("macaroon id is not an LSAT identifier"))?;
        let preimage = hex::decode(preimage_hex)
            .map_err(|e| MemeError::token_format(format!("LSAT preimage: {e}")))?;
        if identifier.matches_preimage(&preimage) {
            Ok(())
        } else {
            tracing::warn!("LSAT preimage does not match payment hash");
            Err(MemeError::authentication("LSAT preimage does not match payment hash"))
        }
    }

    /// Run caveats through an arbitrary registry
    pub fn verify(&self, caveats: &[Caveat], registry: &SatisfierRegistry) -> Result<VerifiedCaveats> {
        registry.verify(caveats)
    }

    /// Check an upload of `file_size` bytes at `now`
    pub fn authorize_upload(&self, caveats: &[Caveat], file_size: u64, now: u64) -> Result<VerifiedCaveats> {
        let registry = SatisfierRegistry::new()
            .with(UploadSizeSatisfier::new(file_size), Requirement::Optional)
            .with(TimeoutSatisfier::new(&self.service, now), Requirement::Optional);
        self.verify(caveats, &registry)
    }

    /// Check that `capability` is granted for this service at `now`
    pub fn authorize_capability(
        &self,
        caveats: &[Caveat],
        capability: &str,
        now: u64,
    ) -> Result<VerifiedCaveats> {
        let registry = SatisfierRegistry::new()
            .with(CapabilitiesSatisfier::new(&self.service, capability), Requirement::Required)
            .with(TimeoutSatisfier::new(&self.service, now), Requirement::Optional);
        self.verify(caveats, &registry)
    }

    /// Body cap for a request carrying `caveats`
    pub fn max_upload_bytes(&self, caveats: &[Caveat], large_route: bool) -> Result<u64> {
        self.limits.max_upload_bytes(caveats, large_route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lsat::format_header;
    use assert_matches::assert_matches;

    fn token(root: &[u8], caveats: &[&str]) -> (Macaroon, [u8; 32]) {
        let preimage = [7u8; 32];
        let mut mac = Macaroon::new(root, b"id".to_vec(), Some("lsat")).unwrap();
        for c in caveats {
            mac.add_first_party_caveat(c.as_bytes().to_vec()).unwrap();
        }
        (mac, preimage)
    }

    #[test]
    fn test_from_header_without_root_key() {
        let (mac, preimage) = token(b"root", &["large_upload_max_mb=5"]);
        let header = format_header(&mac.to_binary(), &preimage);

        let parsed = CapabilityTokenValidator::default().from_header(&header).unwrap();
        assert_eq!(parsed.caveats, vec![Caveat::new("large_upload_max_mb", "5")]);
        assert_eq!(parsed.identifier, None);
        assert_eq!(parsed.preimage, hex::encode(preimage));
    }

    #[test]
    fn test_root_key_mismatch_rejected() {
        let (mac, preimage) = token(b"root", &[]);
        let header = format_header(&mac.to_binary(), &preimage);

        let validator = CapabilityTokenValidator::new(Some(b"other".to_vec()), UploadLimits::default());
        assert_matches!(validator.from_header(&header), Err(MemeError::Authentication { .. }));
    }

    #[test]
    fn test_preimage_check_needs_lsat_identifier() {
        let (mac, preimage) = token(b"root", &[]);
        let header = format_header(&mac.to_binary(), &preimage);

        let validator = CapabilityTokenValidator::default().with_preimage_check(true);
        assert_matches!(validator.from_header(&header), Err(MemeError::Authentication { .. }));
    }

    #[test]
    fn test_authorize_capability_is_required() {
        let validator = CapabilityTokenValidator::default();
        let granted = [Caveat::new("meme_capabilities", "upload,read")];
        assert!(validator.authorize_capability(&granted, "upload", 0).is_ok());
        assert_matches!(
            validator.authorize_capability(&[], "upload", 0),
            Err(MemeError::Authorization { .. })
        );
    }
}
