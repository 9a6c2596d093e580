//! Proptest strategies for token inputs

use proptest::prelude::*;

pub use proptest;

use crate::keys::SignerFixture;

/// Host names: label characters, dots and an optional port
pub fn arb_host() -> impl Strategy<Value = String> {
    ("[a-z0-9][a-z0-9.-]{0,30}", proptest::option::of(1u16..))
        .prop_map(|(name, port)| match port {
            Some(port) => format!("{name}:{port}"),
            None => name,
        })
}

/// Raw object id bytes
pub fn arb_object_id() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(any::<u8>(), 1..48)
}

/// Signers from arbitrary seed strings
pub fn arb_signer() -> impl Strategy<Value = SignerFixture> {
    "[a-z]{1,12}".prop_map(|seed| SignerFixture::from_seed_string(&seed))
}

/// Non-increasing sequence of MB limits, largest first
pub fn arb_shrinking_limits() -> impl Strategy<Value = Vec<u16>> {
    proptest::collection::vec(any::<u16>(), 1..6).prop_map(|mut v| {
        v.sort_unstable_by(|a, b| b.cmp(a));
        v
    })
}
