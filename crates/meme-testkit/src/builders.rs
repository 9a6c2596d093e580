//! Builders for client-side artifacts: challenge answers, signed terms, LSATs

use meme_authentication::terms::{start, start_with_metadata};
use meme_authentication::{sign_terms, Challenge, SignedResponse};
use meme_authorization::lsat::{format_header, HASH_LEN};
use meme_authorization::{LsatIdentifier, Macaroon};
use meme_core::encoding::b64url_decode;
use sha2::{Digest, Sha256};

use crate::keys::SignerFixture;

/// Sign an issued challenge the way a client does
pub fn answer_challenge(client: &SignerFixture, challenge: &Challenge) -> SignedResponse {
    let digest = b64url_decode(&challenge.challenge).expect("challenge is base64url");
    SignedResponse {
        id: challenge.id.clone(),
        sig: client.sign(&digest),
        pubkey: client.public_key().to_hex(),
        readonly: String::new(),
    }
}

/// Owner-signed access terms
pub fn signed_terms(
    owner: &SignerFixture,
    host: &str,
    object_id: &str,
    buyer: &SignerFixture,
    expiry: u32,
) -> String {
    let unsigned = start(host, object_id, &buyer.public_key().to_base64url(), expiry)
        .expect("fixture inputs are valid base64url");
    sign_terms(&unsigned, owner.signer()).expect("fresh terms are unsigned")
}

/// Owner-signed access terms with one metadata segment
pub fn signed_terms_with_metadata(
    owner: &SignerFixture,
    host: &str,
    object_id: &str,
    buyer: &SignerFixture,
    expiry: u32,
    metadata: &[(&str, &str)],
) -> String {
    let unsigned = start_with_metadata(
        host,
        object_id,
        &buyer.public_key().to_base64url(),
        expiry,
        metadata.iter().copied(),
    )
    .expect("fixture inputs are valid base64url");
    sign_terms(&unsigned, owner.signer()).expect("fresh terms are unsigned")
}

/// Mints LSAT headers the way the payment proxy does
#[derive(Debug, Clone)]
pub struct LsatBuilder {
    root_key: Vec<u8>,
    preimage: [u8; HASH_LEN],
    token_id: [u8; HASH_LEN],
    caveats: Vec<String>,
}

impl LsatBuilder {
    /// Builder minting under `root_key`
    pub fn new(root_key: &[u8]) -> Self {
        Self {
            root_key: root_key.to_vec(),
            preimage: [0x11; HASH_LEN],
            token_id: [0x22; HASH_LEN],
            caveats: Vec::new(),
        }
    }

    /// Use a specific payment preimage
    pub fn preimage(mut self, preimage: [u8; HASH_LEN]) -> Self {
        self.preimage = preimage;
        self
    }

    /// Append a `condition=value` caveat
    pub fn caveat(mut self, condition: &str, value: &str) -> Self {
        self.caveats.push(format!("{condition}={value}"));
        self
    }

    /// The minted macaroon
    pub fn macaroon(&self) -> Macaroon {
        let payment_hash: [u8; HASH_LEN] = Sha256::digest(self.preimage).into();
        let id = LsatIdentifier::new(payment_hash, self.token_id);
        let mut mac = Macaroon::new(&self.root_key, id.encode(), Some("lsat")).expect("mint");
        for caveat in &self.caveats {
            mac.add_first_party_caveat(caveat.as_bytes().to_vec()).expect("attenuate");
        }
        mac
    }

    /// `Authorization` header value
    pub fn header(&self) -> String {
        format_header(&self.macaroon().to_binary(), &self.preimage)
    }

    /// Header whose preimage does not match the payment hash
    pub fn header_with_wrong_preimage(&self) -> String {
        let mut wrong = self.preimage;
        wrong[0] ^= 0xff;
        format_header(&self.macaroon().to_binary(), &wrong)
    }
}
