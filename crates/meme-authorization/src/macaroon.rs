//! Macaroon V2 binary format
//!
//! Layout:
//!
//! ```text
//! 0x02
//! [location] identifier EOS
//! ( [location] identifier [verification id] EOS )*
//! EOS
//! signature
//! ```
//!
//! Each field is `type (varint) || length (uvarint) || data`. Only
//! first-party caveats can be minted or verified here; third-party caveats
//! survive a decode/encode round trip but fail signature verification.

use hmac::{Hmac, Mac};
use meme_core::{MemeError, Result};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Binary format version byte
pub const VERSION_2: u8 = 2;

/// Macaroon signature length
pub const SIGNATURE_LEN: usize = 32;

const FIELD_EOS: u64 = 0;
const FIELD_LOCATION: u64 = 1;
const FIELD_IDENTIFIER: u64 = 2;
const FIELD_VERIFICATION_ID: u64 = 4;
const FIELD_SIGNATURE: u64 = 6;

/// Key used to derive the signing key from the root key
const KEY_GENERATOR: &[u8] = b"macaroons-key-generator";

/// One caveat as stored in the macaroon
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCaveat {
    /// Optional location hint
    pub location: Option<String>,
    /// Opaque caveat id, `condition=value` for first-party caveats
    pub id: Vec<u8>,
    /// Present only on third-party caveats
    pub verification_id: Option<Vec<u8>>,
}

impl RawCaveat {
    /// Whether this is a first-party caveat
    pub fn is_first_party(&self) -> bool {
        self.verification_id.is_none()
    }
}

/// A decoded macaroon
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Macaroon {
    location: Option<String>,
    identifier: Vec<u8>,
    caveats: Vec<RawCaveat>,
    signature: [u8; SIGNATURE_LEN],
}

fn hmac(key: &[u8], data: &[u8]) -> Result<[u8; SIGNATURE_LEN]> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| MemeError::internal(format!("hmac key rejected: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}

fn derive_key(root_key: &[u8]) -> Result<[u8; SIGNATURE_LEN]> {
    hmac(KEY_GENERATOR, root_key)
}

impl Macaroon {
    /// Mint a macaroon under `root_key`
    pub fn new(root_key: &[u8], identifier: impl Into<Vec<u8>>, location: Option<&str>) -> Result<Self> {
        let identifier = identifier.into();
        let signature = hmac(&derive_key(root_key)?, &identifier)?;
        Ok(Self {
            location: location.filter(|l| !l.is_empty()).map(str::to_string),
            identifier,
            caveats: Vec::new(),
            signature,
        })
    }

    /// Attenuate with a first-party caveat
    pub fn add_first_party_caveat(&mut self, caveat_id: impl Into<Vec<u8>>) -> Result<()> {
        let id = caveat_id.into();
        self.signature = hmac(&self.signature, &id)?;
        self.caveats.push(RawCaveat {
            location: None,
            id,
            verification_id: None,
        });
        Ok(())
    }

    /// Location hint
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Opaque identifier
    pub fn identifier(&self) -> &[u8] {
        &self.identifier
    }

    /// Caveats in order
    pub fn caveats(&self) -> &[RawCaveat] {
        &self.caveats
    }

    /// Current chained signature
    pub fn signature(&self) -> &[u8; SIGNATURE_LEN] {
        &self.signature
    }

    /// Recompute the signature chain from `root_key` and compare
    pub fn verify_signature(&self, root_key: &[u8]) -> Result<()> {
        let mut sig = hmac(&derive_key(root_key)?, &self.identifier)?;
        for caveat in &self.caveats {
            if !caveat.is_first_party() {
                return Err(MemeError::authentication(
                    "third-party caveats are not supported",
                ));
            }
            sig = hmac(&sig, &caveat.id)?;
        }
        if bool::from(sig.ct_eq(&self.signature)) {
            Ok(())
        } else {
            Err(MemeError::authentication("macaroon signature mismatch"))
        }
    }

    /// Decode the V2 binary form
    pub fn from_binary(data: &[u8]) -> Result<Self> {
        let mut reader = FieldReader::new(data);
        match reader.byte()? {
            VERSION_2 => {}
            other => {
                return Err(MemeError::token_format(format!(
                    "unsupported macaroon version byte {other}"
                )))
            }
        }

        let mut field = reader.field()?;
        let location = if field.kind == FIELD_LOCATION {
            let loc = utf8(field.data, "location")?;
            field = reader.field()?;
            Some(loc)
        } else {
            None
        };
        if field.kind != FIELD_IDENTIFIER {
            return Err(MemeError::token_format("macaroon identifier missing"));
        }
        let identifier = field.data.to_vec();
        reader.expect_eos()?;

        let mut caveats = Vec::new();
        loop {
            let mut field = reader.field()?;
            if field.kind == FIELD_EOS {
                break;
            }
            let cav_location = if field.kind == FIELD_LOCATION {
                let loc = utf8(field.data, "caveat location")?;
                field = reader.field()?;
                Some(loc)
            } else {
                None
            };
            if field.kind != FIELD_IDENTIFIER {
                return Err(MemeError::token_format("caveat identifier missing"));
            }
            let id = field.data.to_vec();

            let mut field = reader.field()?;
            let verification_id = if field.kind == FIELD_VERIFICATION_ID {
                let vid = field.data.to_vec();
                field = reader.field()?;
                Some(vid)
            } else {
                None
            };
            if field.kind != FIELD_EOS {
                return Err(MemeError::token_format("caveat section not terminated"));
            }
            caveats.push(RawCaveat {
                location: cav_location,
                id,
                verification_id,
            });
        }

        let field = reader.field()?;
        if field.kind != FIELD_SIGNATURE {
            return Err(MemeError::token_format("macaroon signature missing"));
        }
        let signature: [u8; SIGNATURE_LEN] = field
            .data
            .try_into()
            .map_err(|_| MemeError::token_format("macaroon signature must be 32 bytes"))?;
        if !reader.is_empty() {
            return Err(MemeError::token_format("trailing bytes after macaroon"));
        }

        Ok(Self {
            location,
            identifier,
            caveats,
            signature,
        })
    }

    /// Encode to the V2 binary form
    pub fn to_binary(&self) -> Vec<u8> {
        let mut out = vec![VERSION_2];
        if let Some(loc) = &self.location {
            put_field(&mut out, FIELD_LOCATION, loc.as_bytes());
        }
        put_field(&mut out, FIELD_IDENTIFIER, &self.identifier);
        put_uvarint(&mut out, FIELD_EOS);
        for caveat in &self.caveats {
            if let Some(loc) = &caveat.location {
                put_field(&mut out, FIELD_LOCATION, loc.as_bytes());
            }
            put_field(&mut out, FIELD_IDENTIFIER, &caveat.id);
            if let Some(vid) = &caveat.verification_id {
                put_field(&mut out, FIELD_VERIFICATION_ID, vid);
            }
            put_uvarint(&mut out, FIELD_EOS);
        }
        put_uvarint(&mut out, FIELD_EOS);
        put_field(&mut out, FIELD_SIGNATURE, &self.signature);
        out
    }
}

fn utf8(data: &[u8], what: &str) -> Result<String> {
    String::from_utf8(data.to_vec())
        .map_err(|_| MemeError::token_format(format!("macaroon {what} is not UTF-8")))
}

fn put_uvarint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

fn put_field(out: &mut Vec<u8>, kind: u64, data: &[u8]) {
    put_uvarint(out, kind);
    put_uvarint(out, data.len() as u64);
    out.extend_from_slice(data);
}

struct Field<'a> {
    kind: u64,
    data: &'a [u8],
}

/// Bounds-checked cursor over packed fields
struct FieldReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn byte(&mut self) -> Result<u8> {
        let b = *self
            .data
            .get(self.pos)
            .ok_or_else(|| MemeError::token_format("macaroon truncated"))?;
        self.pos += 1;
        Ok(b)
    }

    fn uvarint(&mut self) -> Result<u64> {
        let mut value = 0u64;
        for shift in (0..64).step_by(7) {
            let b = self.byte()?;
            value |= u64::from(b & 0x7f) << shift;
            if b & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(MemeError::token_format("macaroon varint overflow"))
    }

    fn field(&mut self) -> Result<Field<'a>> {
        let kind = self.uvarint()?;
        if kind == FIELD_EOS {
            return Ok(Field { kind, data: &[] });
        }
        let len = usize::try_from(self.uvarint()?)
            .map_err(|_| MemeError::token_format("macaroon field too long"))?;
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| MemeError::token_format("macaroon field overruns buffer"))?;
        let data = &self.data[self.pos..end];
        self.pos = end;
        Ok(Field { kind, data })
    }

    fn expect_eos(&mut self) -> Result<()> {
        match self.field()?.kind {
            FIELD_EOS => Ok(()),
            kind => Err(MemeError::token_format(format!(
                "unexpected macaroon field {kind}"
            ))),
        }
    }
}
