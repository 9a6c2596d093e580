//! End-to-end authentication flows: challenge login and access terms

use assert_matches::assert_matches;
use meme_authentication::terms::{parse, start};
use meme_authentication::{
    challenge_digest, BearerClaims, Challenge, ChallengeAuthenticator, TermsAuthorizer,
};
use meme_core::{MemeError, PublicKey};
use meme_effects::SimulatedTimeHandler;
use meme_signature::SignatureVerifier;
use meme_testkit::builders::signed_terms_with_metadata;
use meme_testkit::fixtures::*;
use meme_testkit::{answer_challenge, signed_terms, SignerFixture};

const T: u64 = 1_581_547_570;
const NOW: u64 = 1_700_000_000;

fn owner() -> PublicKey {
    PublicKey::from_base64url(TERMS_OWNER).unwrap()
}

#[test]
fn test_challenge_login_flow() {
    let clock = SimulatedTimeHandler::new(T);
    let auth = ChallengeAuthenticator::new(clock.clone());
    let client = SignerFixture::zeke();

    let challenge = auth.ask();
    clock.advance(2);
    let claims = auth.verify(&answer_challenge(&client, &challenge)).unwrap();
    assert_eq!(claims.pub_key, client.public_key());

    let bearer = claims.to_bearer();
    let json = serde_json::to_string(&bearer).unwrap();
    assert!(!json.contains("readonly"));
    let decoded: BearerClaims = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded.into_identity(T + 3).unwrap(), claims);

    let ctx = claims.request_context("localhost:5000");
    assert!(ctx.require_writable().is_ok());
}

#[test]
fn test_readonly_login_yields_readonly_context() {
    let auth = ChallengeAuthenticator::new(SimulatedTimeHandler::new(T));
    let client = SignerFixture::from_seed_string("reader");

    let mut response = answer_challenge(&client, &auth.ask());
    response.readonly = "true".to_string();
    let claims = auth.verify(&response).unwrap();

    let json = serde_json::to_value(claims.to_bearer()).unwrap();
    assert_eq!(json["readonly"], serde_json::Value::Bool(true));
    assert_matches!(
        claims.request_context("h").require_writable(),
        Err(MemeError::Authorization { .. })
    );
}

#[test]
fn test_stale_challenge_rejected() {
    let auth = ChallengeAuthenticator::new(SimulatedTimeHandler::new(T)).with_timeout(10);
    let client = SignerFixture::zeke();

    let issued = auth.ask();
    assert_eq!(issued.id, T.to_string());

    let stale_id = (T - 11).to_string();
    let stale = Challenge {
        challenge: challenge_digest(&stale_id),
        id: stale_id,
    };
    assert_matches!(
        auth.verify(&answer_challenge(&client, &stale)),
        Err(MemeError::Authentication { .. })
    );

    let edge_id = (T - 10).to_string();
    let edge = Challenge {
        challenge: challenge_digest(&edge_id),
        id: edge_id,
    };
    assert_matches!(
        auth.verify(&answer_challenge(&client, &edge)),
        Err(MemeError::Authentication { .. })
    );

    let fresh_id = (T - 9).to_string();
    let fresh = Challenge {
        challenge: challenge_digest(&fresh_id),
        id: fresh_id,
    };
    assert!(auth.verify(&answer_challenge(&client, &fresh)).is_ok());
}

#[test]
fn test_historical_terms_authorize_buyer() {
    let parsed = parse(TERMS_FUTURE).unwrap();
    assert_eq!(parsed.terms.host, TERMS_FUTURE_HOST);
    assert_eq!(parsed.terms.expiry, TERMS_FUTURE_EXPIRY);
    assert_eq!(parsed.terms.object_id_b64(), TERMS_OBJECT_ID);
    assert_eq!(parsed.terms.buyer_b64(), TERMS_FUTURE_BUYER);

    let buyer = PublicKey::from_base64url(TERMS_FUTURE_BUYER).unwrap();
    let authorizer = TermsAuthorizer::new(TERMS_FUTURE_HOST, SignatureVerifier::legacy());
    authorizer.authorize(&parsed, &buyer, &owner(), NOW).unwrap();

    let elsewhere = TermsAuthorizer::new("other.host", SignatureVerifier::legacy());
    assert_matches!(
        elsewhere.authorize(&parsed, &buyer, &owner(), NOW),
        Err(MemeError::Authentication { .. })
    );

    let stranger = SignerFixture::from_seed_string("stranger").public_key();
    assert_matches!(
        authorizer.authorize(&parsed, &stranger, &owner(), NOW),
        Err(MemeError::Authentication { .. })
    );
}

#[test]
fn test_historical_terms_wrong_owner_rejected() {
    let parsed = parse(TERMS_FUTURE).unwrap();
    let buyer = PublicKey::from_base64url(TERMS_FUTURE_BUYER).unwrap();
    let not_owner = SignerFixture::zeke().public_key();

    let authorizer = TermsAuthorizer::new(TERMS_FUTURE_HOST, SignatureVerifier::legacy());
    assert_matches!(
        authorizer.authorize(&parsed, &buyer, &not_owner, NOW),
        Err(MemeError::Authentication { .. })
    );
}

#[test]
fn test_historical_expired_terms_are_gone() {
    let parsed = parse(TERMS_EXPIRED).unwrap();
    assert_eq!(parsed.terms.host, TERMS_EXPIRED_HOST);
    assert_eq!(parsed.terms.expiry, TERMS_EXPIRED_EXPIRY);
    assert_eq!(parsed.terms.metadata.get("amt").map(String::as_str), Some("100"));

    let authorizer = TermsAuthorizer::new(TERMS_EXPIRED_HOST, SignatureVerifier::legacy());
    authorizer.verify_signature(&parsed, &owner()).unwrap();

    // The buyer here is the owner, so the signature check is skipped
    assert_matches!(
        authorizer.authorize(&parsed, &owner(), &owner(), NOW),
        Err(MemeError::Gone { .. })
    );
}

#[test]
fn test_expired_fresh_terms_are_gone_not_unauthenticated() {
    let owner = SignerFixture::from_seed_string("owner");
    let buyer = SignerFixture::from_seed_string("buyer");
    let token = signed_terms(&owner, "localhost:5000", TERMS_OBJECT_ID, &buyer, 1_000);

    let parsed = parse(&token).unwrap();
    let authorizer = TermsAuthorizer::new("localhost:5000", SignatureVerifier::strict());
    authorizer.verify_signature(&parsed, &owner.public_key()).unwrap();
    assert_matches!(
        authorizer.authorize(&parsed, &buyer.public_key(), &owner.public_key(), 1_000),
        Err(MemeError::Gone { .. })
    );
    authorizer
        .authorize(&parsed, &buyer.public_key(), &owner.public_key(), 999)
        .unwrap();
}

#[test]
fn test_metadata_is_covered_by_signature() {
    let owner = SignerFixture::from_seed_string("owner");
    let buyer = SignerFixture::from_seed_string("buyer");
    let token = signed_terms_with_metadata(
        &owner,
        "h",
        TERMS_OBJECT_ID,
        &buyer,
        u32::MAX,
        &[("amt", "100")],
    );

    let parsed = parse(&token).unwrap();
    assert_eq!(parsed.terms.metadata.get("amt").map(String::as_str), Some("100"));

    let segments: Vec<&str> = token.split('.').collect();
    let forged_meta = meme_core::encoding::b64url_encode("amt=1");
    let forged = format!(
        "{}.{}.{}.{}.{}.{}",
        segments[0], segments[1], segments[2], segments[3], forged_meta, segments[5]
    );
    let authorizer = TermsAuthorizer::new("h", SignatureVerifier::legacy());
    assert_matches!(
        authorizer.authorize(&parse(&forged).unwrap(), &buyer.public_key(), &owner.public_key(), 0),
        Err(MemeError::Authentication { .. })
    );
}

#[test]
fn test_unsigned_terms_rejected() {
    let buyer = SignerFixture::from_seed_string("buyer");
    let unsigned = start("h", TERMS_OBJECT_ID, &buyer.public_key().to_base64url(), 10).unwrap();
    let parsed = parse(&unsigned).unwrap();
    assert!(parsed.terms.signature.is_empty());

    let authorizer = TermsAuthorizer::new("h", SignatureVerifier::legacy());
    assert_matches!(
        authorizer.authorize(&parsed, &buyer.public_key(), &owner(), 0),
        Err(MemeError::Authentication { .. })
    );
}
