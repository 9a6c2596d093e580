//! LSAT header parsing, macaroon verification and caveat enforcement

use assert_matches::assert_matches;
use meme_authorization::lsat::parse_header;
use meme_authorization::{
    find_lsat_header, CapabilityTokenValidator, Caveat, LsatIdentifier, Macaroon, Requirement,
    SatisfierRegistry, UploadLimits, UploadSizeSatisfier, LARGE_UPLOAD_MAX_MB,
};
use meme_core::config::{MemeConfig, UploadConfig};
use meme_core::encoding::b64_std_decode;
use meme_core::{MemeError, RequestContext};
use meme_testkit::fixtures::{lsat_header, LSAT_MACAROON_B64, LSAT_PREIMAGE_HEX};
use meme_testkit::{LsatBuilder, SignerFixture};

const MIB: u64 = 1 << 20;
const ROOT: &[u8] = b"root key for tests";

fn upload_caveats(values: &[&str]) -> Vec<Caveat> {
    values.iter().map(|v| Caveat::new(LARGE_UPLOAD_MAX_MB, *v)).collect()
}

#[test]
fn test_historical_lsat_decodes() {
    let header = lsat_header();
    let values = ["Bearer abc", header.as_str()];
    let found = find_lsat_header(values).unwrap();

    let token = CapabilityTokenValidator::default().from_header(found).unwrap();
    assert_eq!(token.preimage, LSAT_PREIMAGE_HEX);
    assert_eq!(token.macaroon.location(), Some("lsat"));
    assert_eq!(
        token.caveats,
        vec![
            Caveat::new("services", "meme:0"),
            Caveat::new("meme_capabilities", ""),
        ]
    );

    let identifier = token.identifier.unwrap();
    assert_eq!(identifier.version, 0);
    assert_eq!(LsatIdentifier::decode(&identifier.encode()).unwrap(), identifier);

    let raw = b64_std_decode(LSAT_MACAROON_B64).unwrap();
    assert_eq!(token.macaroon.to_binary(), raw);
}

#[test]
fn test_malformed_headers_are_token_format_errors() {
    let preimage = LSAT_PREIMAGE_HEX;
    for header in [
        String::new(),
        "LSAT".to_string(),
        format!("Bearer {LSAT_MACAROON_B64}:{preimage}"),
        format!("LSAT {LSAT_MACAROON_B64}"),
        format!("LSAT {LSAT_MACAROON_B64}:{}", &preimage[..63]),
        format!("LSAT {LSAT_MACAROON_B64}:{}", preimage.to_uppercase()),
        format!("LSAT !!!:{preimage}"),
        format!("LSAT AgEE:{preimage}"),
    ] {
        assert_matches!(
            CapabilityTokenValidator::default().from_header(&header),
            Err(MemeError::TokenFormat { .. }),
            "header {header:?}"
        );
    }
    assert!(parse_header(&lsat_header()).is_ok());
}

#[test]
fn test_root_key_verification() {
    let header = LsatBuilder::new(ROOT).caveat(LARGE_UPLOAD_MAX_MB, "5").header();

    let validator = CapabilityTokenValidator::new(Some(ROOT.to_vec()), UploadLimits::default());
    let token = validator.from_header(&header).unwrap();
    assert_eq!(token.caveats, upload_caveats(&["5"]));

    let other = CapabilityTokenValidator::new(Some(b"other".to_vec()), UploadLimits::default());
    assert_matches!(other.from_header(&header), Err(MemeError::Authentication { .. }));
}

#[test]
fn test_attenuation_cannot_be_stripped() {
    let mac = LsatBuilder::new(ROOT)
        .caveat(LARGE_UPLOAD_MAX_MB, "5")
        .caveat(LARGE_UPLOAD_MAX_MB, "2")
        .macaroon();

    let mut stripped = Macaroon::new(ROOT, mac.identifier().to_vec(), mac.location()).unwrap();
    stripped.add_first_party_caveat(b"large_upload_max_mb=5".to_vec()).unwrap();
    assert_ne!(stripped.signature(), mac.signature());
    assert!(mac.verify_signature(ROOT).is_ok());

    // A shortened chain carrying the full chain's signature
    let mut bytes = stripped.to_binary();
    let sig_at = bytes.len() - 32;
    bytes[sig_at..].copy_from_slice(mac.signature());
    let forged = Macaroon::from_binary(&bytes).unwrap();
    assert_matches!(forged.verify_signature(ROOT), Err(MemeError::Authentication { .. }));
}

#[test]
fn test_preimage_check() {
    let builder = LsatBuilder::new(ROOT).preimage([0x33; 32]);
    let validator = CapabilityTokenValidator::default().with_preimage_check(true);

    assert!(validator.from_header(&builder.header()).is_ok());
    assert_matches!(
        validator.from_header(&builder.header_with_wrong_preimage()),
        Err(MemeError::Authentication { .. })
    );
}

#[test]
fn test_upload_size_accepts_within_limit() {
    let validator = CapabilityTokenValidator::default();
    let caveats = upload_caveats(&["2"]);

    assert!(validator.authorize_upload(&caveats, MIB, 0).is_ok());
    let err = validator.authorize_upload(&caveats, 3 * MIB, 0).unwrap_err();
    assert_eq!(err.condition(), Some(LARGE_UPLOAD_MAX_MB));
    assert_eq!(err.status_code(), 401);
}

#[test]
fn test_widening_chain_rejected_regardless_of_size() {
    let validator = CapabilityTokenValidator::default();
    let caveats = upload_caveats(&["1", "2"]);
    for size in [0, 1, MIB, 2 * MIB, 100 * MIB] {
        let err = validator.authorize_upload(&caveats, size, 0).unwrap_err();
        assert_eq!(err.condition(), Some(LARGE_UPLOAD_MAX_MB));
    }
}

#[test]
fn test_timeout_caveat_enforced() {
    let header = LsatBuilder::new(ROOT)
        .caveat("meme_timeout", "2000")
        .caveat("meme_timeout", "1500")
        .header();
    let validator = CapabilityTokenValidator::new(Some(ROOT.to_vec()), UploadLimits::default());
    let token = validator.from_header(&header).unwrap();

    let verified = validator.authorize_upload(&token.caveats, 0, 1_499).unwrap();
    assert_eq!(verified.resolved("meme_timeout"), Some("1500"));
    assert_matches!(
        validator.authorize_upload(&token.caveats, 0, 1_500),
        Err(MemeError::Authorization { .. })
    );
}

#[test]
fn test_verified_caveats_flow_into_request_limits() {
    let config = MemeConfig {
        uploads: UploadConfig {
            restrict_upload_size: true,
            ..UploadConfig::default()
        },
        ..MemeConfig::default()
    };
    let validator = CapabilityTokenValidator::from_config(&config).unwrap();
    let header = LsatBuilder::new(ROOT).caveat(LARGE_UPLOAD_MAX_MB, "8").header();
    let token = validator.from_header(&header).unwrap();

    let verified = validator.authorize_upload(&token.caveats, 4 * MIB, 0).unwrap();
    let caller = SignerFixture::from_seed_string("uploader").public_key();
    let ctx = RequestContext::new(caller, config.host.clone(), false).with_caveats(verified.to_pairs());
    assert_eq!(ctx.caveat(LARGE_UPLOAD_MAX_MB), Some("8"));

    assert_eq!(validator.max_upload_bytes(verified.all(), true).unwrap(), 8 * MIB + 512);
    assert_eq!(validator.max_upload_bytes(verified.all(), false).unwrap(), MIB + 512);
}

#[test]
fn test_required_satisfier_fails_closed() {
    let registry = SatisfierRegistry::new()
        .with(UploadSizeSatisfier::new(MIB), Requirement::Required);
    let validator = CapabilityTokenValidator::default();
    assert_matches!(
        validator.verify(&[], &registry),
        Err(MemeError::Authorization { .. })
    );
    assert!(validator.verify(&upload_caveats(&["1"]), &registry).is_ok());
}

#[test]
fn test_historical_lsat_lacks_meme_capability() {
    let token = CapabilityTokenValidator::default().from_header(&lsat_header()).unwrap();
    let err = CapabilityTokenValidator::default()
        .authorize_capability(&token.caveats, "upload", 0)
        .unwrap_err();
    assert_eq!(err.condition(), Some("meme_capabilities"));
}
