//! Meme Core - shared foundation of the meme vault access-control core
//!
//! This crate holds the types every other layer agrees on and nothing that
//! performs I/O.
//!
//! # Contents
//! - `MemeError`: the single error taxonomy, with HTTP status mapping
//! - `PublicKey`, `ObjectId`: identities and content-addressed object ids
//! - `MasterKey`, `ObjectNonce`: storage key material
//! - `MemeConfig`: process configuration, built once at startup
//! - `RequestContext`: authenticated per-request state
//! - Effect interfaces: `PhysicalTimeEffects`, `RandomEffects`,
//!   `BlobStorageEffects`

#![forbid(unsafe_code)]

/// Process configuration
pub mod config;

/// Per-request authenticated context
pub mod context;

/// Base64 and hashing helpers
pub mod encoding;

/// Unified error handling
pub mod errors;

/// Pure effect interfaces (no implementations)
pub mod effects;

/// Public keys and object identifiers
pub mod identifiers;

/// Storage key material
pub mod secrets;

pub use config::MemeConfig;
pub use context::RequestContext;
pub use effects::{BlobStorageEffects, PhysicalTimeEffects, RandomEffects, StorageError};
pub use errors::{MemeError, Result};
pub use identifiers::{ObjectId, PublicKey};
pub use secrets::{MasterKey, ObjectNonce};
