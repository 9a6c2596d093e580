//! Caveat satisfiers
//!
//! A satisfier owns one condition. When a token repeats that condition,
//! every caveat must be at least as restrictive as the one before it
//! (`satisfy_previous`), and the last one must hold for the request at hand
//! (`satisfy_final`).

use std::collections::HashSet;

use meme_core::{MemeError, Result};

use crate::caveat::Caveat;

/// Condition limiting large uploads, in MB
pub const LARGE_UPLOAD_MAX_MB: &str = "large_upload_max_mb";

/// Suffix of absolute expiry conditions
pub const TIMEOUT_SUFFIX: &str = "_timeout";

/// Suffix of per-service capability conditions
pub const CAPABILITIES_SUFFIX: &str = "_capabilities";

/// Service prefix of this server's caveats
pub const MEME_SERVICE: &str = "meme";

/// Policy for one caveat condition
pub trait Satisfier: Send + Sync {
    /// Condition this satisfier handles
    fn condition(&self) -> &str;

    /// `current` must be no more permissive than `previous`
    fn satisfy_previous(&self, previous: &Caveat, current: &Caveat) -> Result<()>;

    /// The effective caveat must allow the request
    fn satisfy_final(&self, caveat: &Caveat) -> Result<()>;
}

fn parse_value<T: std::str::FromStr>(caveat: &Caveat) -> Result<T> {
    caveat.value.parse().map_err(|_| {
        MemeError::caveat_unsatisfied(
            caveat.condition.clone(),
            format!("caveat value '{}' is not a valid integer", caveat.value),
        )
    })
}

/// Caps the uploaded file size by `large_upload_max_mb`
#[derive(Debug, Clone, Copy)]
pub struct UploadSizeSatisfier {
    file_size: u64,
}

impl UploadSizeSatisfier {
    /// Satisfier for an upload of `file_size` bytes
    pub fn new(file_size: u64) -> Self {
        Self { file_size }
    }
}

impl Satisfier for UploadSizeSatisfier {
    fn condition(&self) -> &str {
        LARGE_UPLOAD_MAX_MB
    }

    fn satisfy_previous(&self, previous: &Caveat, current: &Caveat) -> Result<()> {
        let prev: u16 = parse_value(previous)?;
        let cur: u16 = parse_value(current)?;
        if cur > prev {
            return Err(MemeError::caveat_unsatisfied(
                LARGE_UPLOAD_MAX_MB,
                format!("{cur} MB widens the previous limit of {prev} MB"),
            ));
        }
        Ok(())
    }

    fn satisfy_final(&self, caveat: &Caveat) -> Result<()> {
        let max_mb: u16 = parse_value(caveat)?;
        let max_bytes = u64::from(max_mb) << 20;
        if self.file_size <= max_bytes {
            Ok(())
        } else {
            Err(MemeError::caveat_unsatisfied(
                LARGE_UPLOAD_MAX_MB,
                format!("not authorized to upload files larger than {max_mb} MB"),
            ))
        }
    }
}

/// Absolute expiry: `<prefix>_timeout=<unix seconds>`
#[derive(Debug, Clone)]
pub struct TimeoutSatisfier {
    condition: String,
    now: u64,
}

impl TimeoutSatisfier {
    /// Satisfier for `<prefix>_timeout` evaluated at `now`
    pub fn new(prefix: &str, now: u64) -> Self {
        Self {
            condition: format!("{prefix}{TIMEOUT_SUFFIX}"),
            now,
        }
    }
}

impl Satisfier for TimeoutSatisfier {
    fn condition(&self) -> &str {
        &self.condition
    }

    fn satisfy_previous(&self, previous: &Caveat, current: &Caveat) -> Result<()> {
        let prev: u64 = parse_value(previous)?;
        let cur: u64 = parse_value(current)?;
        if prev < cur {
            return Err(MemeError::caveat_unsatisfied(
                self.condition.clone(),
                "later expiry extends an earlier one",
            ));
        }
        Ok(())
    }

    fn satisfy_final(&self, caveat: &Caveat) -> Result<()> {
        let expiry: u64 = parse_value(caveat)?;
        if self.now < expiry {
            Ok(())
        } else {
            Err(MemeError::caveat_unsatisfied(
                self.condition.clone(),
                "token has expired",
            ))
        }
    }
}

/// Comma separated capability set: `<service>_capabilities=a,b`
#[derive(Debug, Clone)]
pub struct CapabilitiesSatisfier {
    condition: String,
    target: String,
}

impl CapabilitiesSatisfier {
    /// Require `target` among the capabilities granted for `service`
    pub fn new(service: &str, target: impl Into<String>) -> Self {
        Self {
            condition: format!("{service}{CAPABILITIES_SUFFIX}"),
            target: target.into(),
        }
    }
}

fn capability_set(value: &str) -> HashSet<&str> {
    value.split(',').map(str::trim).collect()
}

impl Satisfier for CapabilitiesSatisfier {
    fn condition(&self) -> &str {
        &self.condition
    }

    fn satisfy_previous(&self, previous: &Caveat, current: &Caveat) -> Result<()> {
        let prev = capability_set(&previous.value);
        match capability_set(&current.value)
            .into_iter()
            .find(|cap| !prev.contains(cap))
        {
            Some(extra) => Err(MemeError::caveat_unsatisfied(
                self.condition.clone(),
                format!("capability '{extra}' was not previously granted"),
            )),
            None => Ok(()),
        }
    }

    fn satisfy_final(&self, caveat: &Caveat) -> Result<()> {
        if capability_set(&caveat.value).contains(self.target.as_str()) {
            Ok(())
        } else {
            Err(MemeError::caveat_unsatisfied(
                self.condition.clone(),
                format!("capability '{}' not granted", self.target),
            ))
        }
    }
}
