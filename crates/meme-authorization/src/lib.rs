//! Meme Authorization - LSAT capability tokens
//!
//! An LSAT is a macaroon plus a payment preimage. The macaroon carries
//! first-party caveats (`condition=value`) that can only ever narrow what
//! the holder may do. This crate parses the header and the macaroon binary
//! format, decodes caveats, and checks them with [`Satisfier`]s collected in
//! a [`SatisfierRegistry`].

#![forbid(unsafe_code)]

pub mod caveat;
pub mod limits;
pub mod lsat;
pub mod macaroon;
pub mod registry;
pub mod satisfier;
pub mod validator;

pub use caveat::{decode_caveats, Caveat};
pub use limits::{UploadLimits, MULTIPART_SLACK};
pub use lsat::{find_lsat_header, format_header, parse_header, LsatIdentifier};
pub use macaroon::Macaroon;
pub use registry::{Requirement, SatisfierRegistry, VerifiedCaveats};
pub use satisfier::{
    CapabilitiesSatisfier, Satisfier, TimeoutSatisfier, UploadSizeSatisfier, LARGE_UPLOAD_MAX_MB,
    MEME_SERVICE,
};
pub use validator::{CapabilityToken, CapabilityTokenValidator};
