//! Deterministic signing keys

use meme_core::PublicKey;
use meme_signature::MessageSigner;
use sha2::{Digest, Sha256};

/// Secret of the long-lived test identity used across client fixtures
pub const ZEKE_SECRET_HEX: &str =
    "2bd807c97f0e00af1a1fc3328fa763a9269723c8db8fac4f93af72db186d6e90";

/// Public key of [`ZEKE_SECRET_HEX`], base64url
pub const ZEKE_PUBKEY: &str = "Axaq4Qha3k5kavt_tQpO6xmdCqmH8baqo5QOccL9hcuP";

/// A signer together with its public key
#[derive(Debug, Clone)]
pub struct SignerFixture {
    signer: MessageSigner,
    public_key: PublicKey,
}

impl SignerFixture {
    /// Fixture from a 32 byte secret
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signer = MessageSigner::from_bytes(seed).expect("seed is a valid secp256k1 scalar");
        let public_key = signer.public_key();
        Self { signer, public_key }
    }

    /// Fixture whose secret is the SHA-256 of `seed`
    pub fn from_seed_string(seed: &str) -> Self {
        let digest: [u8; 32] = Sha256::digest(seed.as_bytes()).into();
        Self::from_seed(&digest)
    }

    /// The zeke identity
    pub fn zeke() -> Self {
        let signer = MessageSigner::from_hex(ZEKE_SECRET_HEX).expect("zeke secret is valid");
        let public_key = signer.public_key();
        Self { signer, public_key }
    }

    /// Signing half
    pub fn signer(&self) -> &MessageSigner {
        &self.signer
    }

    /// Public half
    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    /// Sign raw bytes, base64url compact signature
    pub fn sign(&self, message: &[u8]) -> String {
        self.signer.sign(message).expect("signing never fails for fixtures")
    }
}
