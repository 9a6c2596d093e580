//! Request body caps derived from caveats and configuration

use meme_core::config::UploadConfig;
use meme_core::{MemeError, Result};

use crate::caveat::Caveat;
use crate::satisfier::LARGE_UPLOAD_MAX_MB;

/// Extra bytes allowed on top of the file for multipart framing
pub const MULTIPART_SLACK: u64 = 512;

const MB_SHIFT: u32 = 20;

/// Upload size policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    restrict: bool,
    free_tier_mb: u64,
    default_mb: u64,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self::from_config(&UploadConfig::default())
    }
}

impl UploadLimits {
    /// Limits from the `uploads` config section
    pub fn from_config(config: &UploadConfig) -> Self {
        Self {
            restrict: config.restrict_upload_size,
            free_tier_mb: config.max_free_upload_mb,
            default_mb: config.default_max_upload_mb,
        }
    }

    /// Whether caveats and the free tier apply at all
    pub fn is_restricted(&self) -> bool {
        self.restrict
    }

    /// Maximum accepted request body in bytes.
    ///
    /// Unrestricted servers accept the default cap everywhere. Restricted
    /// servers give large-upload routes the last positive
    /// `large_upload_max_mb` caveat and everything else the free tier.
    pub fn max_upload_bytes(&self, caveats: &[Caveat], large_route: bool) -> Result<u64> {
        if !self.restrict {
            return Ok(mb_to_bytes(self.default_mb));
        }

        if large_route {
            if let Some(mb) = last_large_upload_mb(caveats)? {
                return Ok(mb_to_bytes(u64::from(mb)));
            }
            tracing::debug!("no large upload caveat, falling back to free tier");
        }

        Ok(mb_to_bytes(self.free_tier_mb))
    }
}

fn mb_to_bytes(mb: u64) -> u64 {
    mb.saturating_mul(1 << MB_SHIFT).saturating_add(MULTIPART_SLACK)
}

fn last_large_upload_mb(caveats: &[Caveat]) -> Result<Option<u16>> {
    let mut found = None;
    for caveat in caveats.iter().filter(|c| c.condition == LARGE_UPLOAD_MAX_MB) {
        let mb: u16 = caveat.value.parse().map_err(|_| {
            MemeError::caveat_unsatisfied(
                LARGE_UPLOAD_MAX_MB,
                format!("caveat value '{}' is not a valid integer", caveat.value),
            )
        })?;
        if mb > 0 {
            found = Some(mb);
        }
    }
    Ok(found)
}
