//! First-party caveats encoded as `condition=value`

use std::fmt;
use std::str::FromStr;

use meme_core::{MemeError, Result};

use crate::macaroon::Macaroon;

/// A single `condition=value` restriction
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Caveat {
    /// What is being restricted, e.g. `large_upload_max_mb`
    pub condition: String,
    /// The restriction
    pub value: String,
}

impl Caveat {
    /// Build a caveat
    pub fn new(condition: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            condition: condition.into(),
            value: value.into(),
        }
    }

    /// Parse `condition=value`, splitting on the first `=` and trimming
    /// whitespace around both halves
    pub fn decode(raw: &str) -> Result<Self> {
        let (condition, value) = raw
            .split_once('=')
            .ok_or_else(|| MemeError::token_format(format!("caveat '{raw}' has no '='")))?;
        let condition = condition.trim();
        if condition.is_empty() {
            return Err(MemeError::token_format("caveat condition is empty"));
        }
        Ok(Self::new(condition, value.trim()))
    }

    /// The encoded `condition=value` form
    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Caveat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.condition, self.value)
    }
}

impl FromStr for Caveat {
    type Err = MemeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::decode(s)
    }
}

/// Decode every first-party caveat of a macaroon.
///
/// Caveat ids that are not UTF-8 or not `condition=value` are skipped.
pub fn decode_caveats(macaroon: &Macaroon) -> Vec<Caveat> {
    macaroon
        .caveats()
        .iter()
        .filter_map(|raw| {
            let decoded = std::str::from_utf8(&raw.id)
                .map_err(|_| MemeError::token_format("caveat id is not UTF-8"))
                .and_then(Caveat::decode);
            match decoded {
                Ok(caveat) => Some(caveat),
                Err(err) => {
                    tracing::debug!(error = %err, "skipping undecodable caveat");
                    None
                }
            }
        })
        .collect()
}
