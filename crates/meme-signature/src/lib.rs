//! Meme Signature - recoverable secp256k1 message signatures
//!
//! Clients prove possession of a key by signing a domain-separated digest;
//! the server recovers the key from the signature instead of being told it.
//! Both the challenge flow and access terms go through
//! [`SignatureVerifier::recover_and_verify`].

#![forbid(unsafe_code)]

pub mod signer;
pub mod verifier;

pub use signer::MessageSigner;
pub use verifier::{
    message_digest, recover_pubkey, MessageEncoding, Recovered, SignatureVerifier,
    SIGNED_MESSAGE_PREFIX,
};
