//! Meme Testing Infrastructure
//!
//! Deterministic keys, historical token fixtures, token builders and
//! proptest strategies shared by the integration tests of every crate.
//!
//! Only depend on this from `tests/` directories. Unit tests inside a crate
//! that the testkit itself depends on would see two copies of that crate.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

pub mod builders;
pub mod fixtures;
pub mod keys;
pub mod store;
pub mod strategies;

pub use builders::{answer_challenge, signed_terms, LsatBuilder};
pub use keys::SignerFixture;
pub use store::{memory_store, MemoryStoreFixture};
