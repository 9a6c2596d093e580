//! Meme Authentication - who is calling, and what were they granted
//!
//! Two independent proofs, both resting on recoverable signatures:
//! - [`challenge`]: a client proves control of a key by signing a fresh,
//!   time-bounded challenge and receives [`IdentityClaims`]
//! - [`terms`]: an object owner signs access terms granting one buyer key
//!   time-limited access to one object on one host
//!
//! Both are stateless: nothing is stored between issue and verification.

#![forbid(unsafe_code)]

pub mod challenge;
pub mod claims;
pub mod terms;

pub use challenge::{challenge_digest, Challenge, ChallengeAuthenticator, SignedResponse};
pub use claims::{BearerClaims, IdentityClaims};
pub use terms::{sign_terms, AccessTerms, ParsedTerms, TermsAuthorizer};
