//! Satisfier registry and caveat verification

use indexmap::IndexMap;
use meme_core::{MemeError, Result};

use crate::caveat::Caveat;
use crate::satisfier::Satisfier;

/// Whether a satisfier passes when the token carries no caveat for it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Requirement {
    /// No matching caveat means nothing to enforce
    #[default]
    Optional,
    /// At least one matching caveat must be present
    Required,
}

struct Entry {
    satisfier: Box<dyn Satisfier>,
    requirement: Requirement,
}

/// Satisfiers keyed by condition, checked in registration order
#[derive(Default)]
pub struct SatisfierRegistry {
    entries: IndexMap<String, Entry>,
}

impl std::fmt::Debug for SatisfierRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(c, e)| (c, e.requirement)))
            .finish()
    }
}

impl SatisfierRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an optional satisfier, replacing any for the same condition
    pub fn register(&mut self, satisfier: impl Satisfier + 'static) -> &mut Self {
        self.register_with(satisfier, Requirement::Optional)
    }

    /// Register a satisfier with an explicit requirement
    pub fn register_with(
        &mut self,
        satisfier: impl Satisfier + 'static,
        requirement: Requirement,
    ) -> &mut Self {
        self.entries.insert(
            satisfier.condition().to_string(),
            Entry {
                satisfier: Box::new(satisfier),
                requirement,
            },
        );
        self
    }

    /// Builder form of [`Self::register_with`]
    pub fn with(mut self, satisfier: impl Satisfier + 'static, requirement: Requirement) -> Self {
        self.register_with(satisfier, requirement);
        self
    }

    /// Number of registered satisfiers
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check every registered condition against `caveats`.
    ///
    /// Matching caveats are folded pairwise through `satisfy_previous` in
    /// token order, then the last one goes through `satisfy_final`. The
    /// first failure aborts verification.
    pub fn verify(&self, caveats: &[Caveat]) -> Result<VerifiedCaveats> {
        let mut resolved = IndexMap::new();

        for (condition, entry) in &self.entries {
            let matching: Vec<&Caveat> =
                caveats.iter().filter(|c| &c.condition == condition).collect();

            let Some(last) = matching.last() else {
                if entry.requirement == Requirement::Required {
                    tracing::debug!(%condition, "required caveat missing");
                    return Err(MemeError::caveat_unsatisfied(
                        condition.clone(),
                        "required caveat missing",
                    ));
                }
                continue;
            };

            for pair in matching.windows(2) {
                entry.satisfier.satisfy_previous(pair[0], pair[1]).map_err(|err| {
                    tracing::warn!(%condition, error = %err, "caveat chain widens permission");
                    err
                })?;
            }
            entry.satisfier.satisfy_final(last).map_err(|err| {
                tracing::debug!(%condition, error = %err, "final caveat not satisfied");
                err
            })?;

            resolved.insert(condition.clone(), last.value.clone());
        }

        Ok(VerifiedCaveats {
            caveats: caveats.to_vec(),
            resolved,
        })
    }
}

/// Caveats that passed verification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifiedCaveats {
    caveats: Vec<Caveat>,
    resolved: IndexMap<String, String>,
}

impl VerifiedCaveats {
    /// Every decoded caveat, in token order
    pub fn all(&self) -> &[Caveat] {
        &self.caveats
    }

    /// Effective (last) value of a condition a satisfier checked
    pub fn resolved(&self, condition: &str) -> Option<&str> {
        self.resolved.get(condition).map(String::as_str)
    }

    /// `(condition, value)` pairs for a request context
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        self.caveats
            .iter()
            .map(|c| (c.condition.clone(), c.value.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::satisfier::{UploadSizeSatisfier, LARGE_UPLOAD_MAX_MB};
    use assert_matches::assert_matches;

    fn caveats(values: &[&str]) -> Vec<Caveat> {
        values
            .iter()
            .map(|v| Caveat::new(LARGE_UPLOAD_MAX_MB, *v))
            .collect()
    }

    #[test]
    fn test_unmatched_optional_passes_required_fails() {
        let unrelated = vec![Caveat::new("foo", "bar")];

        let optional = SatisfierRegistry::new().with(UploadSizeSatisfier::new(1), Requirement::Optional);
        let verified = optional.verify(&unrelated).unwrap();
        assert_eq!(verified.resolved(LARGE_UPLOAD_MAX_MB), None);
        assert_eq!(verified.all().len(), 1);

        let required = SatisfierRegistry::new().with(UploadSizeSatisfier::new(1), Requirement::Required);
        let err = required.verify(&unrelated).unwrap_err();
        assert_eq!(err.condition(), Some(LARGE_UPLOAD_MAX_MB));
    }

    #[test]
    fn test_chain_resolves_last_value() {
        let registry = SatisfierRegistry::new().with(UploadSizeSatisfier::new(1 << 20), Requirement::Optional);
        let verified = registry.verify(&caveats(&["10", "5", "5", "2"])).unwrap();
        assert_eq!(verified.resolved(LARGE_UPLOAD_MAX_MB), Some("2"));
    }

    #[test]
    fn test_widening_anywhere_fails() {
        let registry = SatisfierRegistry::new().with(UploadSizeSatisfier::new(0), Requirement::Optional);
        assert_matches!(
            registry.verify(&caveats(&["10", "5", "6", "1"])),
            Err(MemeError::Authorization { .. })
        );
    }

    #[test]
    fn test_register_replaces_same_condition() {
        let mut registry = SatisfierRegistry::new();
        registry
            .register(UploadSizeSatisfier::new(u64::MAX))
            .register(UploadSizeSatisfier::new(0));
        assert_eq!(registry.len(), 1);
        assert!(registry.verify(&caveats(&["1"])).is_ok());
    }
}
