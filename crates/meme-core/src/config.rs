//! Process configuration
//!
//! Built once at startup (file, then `MEME_*` environment overrides, then
//! validation) and shared immutably afterwards. No component reads the
//! environment on its own.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::secrets::MasterKey;
use crate::{MemeError, Result};

/// Prefix of every environment override
pub const ENV_PREFIX: &str = "MEME_";

/// Seconds in seven days, the default bearer claims lifetime
pub const SEVEN_DAYS_SECS: u64 = 7 * 24 * 60 * 60;

/// Top level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemeConfig {
    /// Host name access terms must be minted for
    pub host: String,
    /// Challenge-response authentication
    pub auth: AuthConfig,
    /// Backing store selection and encryption
    pub storage: StorageConfig,
    /// Upload size caps
    pub uploads: UploadConfig,
    /// Capability token checks
    pub lsat: LsatConfig,
    /// Tracing output
    pub logging: LoggingConfig,
}

impl Default for MemeConfig {
    fn default() -> Self {
        Self {
            host: "localhost:5000".to_string(),
            auth: AuthConfig::default(),
            storage: StorageConfig::default(),
            uploads: UploadConfig::default(),
            lsat: LsatConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Challenge-response authentication settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Seconds a challenge id stays valid
    pub challenge_timeout_secs: u64,
    /// Lifetime of issued identity claims
    pub claims_lifetime_secs: u64,
    /// Also accept signatures over the raw UTF-8 message text
    pub allow_legacy_message_encoding: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            challenge_timeout_secs: 10,
            claims_lifetime_secs: SEVEN_DAYS_SECS,
            allow_legacy_message_encoding: true,
        }
    }
}

/// Which blob storage backend to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Local filesystem directory
    Local,
    /// Process memory (tests and development)
    Memory,
    /// S3-compatible object storage
    S3,
}

impl std::str::FromStr for StorageMode {
    type Err = MemeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "local" | "" => Ok(Self::Local),
            "memory" => Ok(Self::Memory),
            "s3" => Ok(Self::S3),
            other => Err(MemeError::invalid(format!("unknown storage mode '{other}'"))),
        }
    }
}

/// Storage settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend to use
    pub mode: StorageMode,
    /// Root directory of the local backend
    pub local_dir: PathBuf,
    /// Hex encoded 32-byte master key
    pub master_key_hex: Option<String>,
    /// Object storage backend settings
    pub s3: S3Config,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            mode: StorageMode::Local,
            local_dir: PathBuf::from("files"),
            master_key_hex: None,
            s3: S3Config::default(),
        }
    }
}

/// S3-compatible object storage settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Config {
    /// Bucket holding the ciphertext
    pub bucket: String,
    /// Bucket region
    pub region: String,
    /// Key prefix objects are stored under, empty for the bucket root
    pub prefix: String,
    /// Custom endpoint for S3-compatible services
    pub endpoint: Option<String>,
    /// Access key id; the ambient credential chain is used when unset
    pub access_key: Option<String>,
    /// Secret access key
    pub secret_key: Option<String>,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: "sphinx-memes".to_string(),
            region: "us-east-1".to_string(),
            prefix: String::new(),
            endpoint: None,
            access_key: None,
            secret_key: None,
        }
    }
}

/// Upload size caps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Enforce capability/free-tier upload caps
    pub restrict_upload_size: bool,
    /// Free tier cap in MB when restriction is on
    pub max_free_upload_mb: u64,
    /// Cap in MB when restriction is off
    pub default_max_upload_mb: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            restrict_upload_size: false,
            max_free_upload_mb: 1,
            default_max_upload_mb: 32,
        }
    }
}

/// Capability token settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LsatConfig {
    /// Hex root key; when set, macaroon signatures are verified
    pub root_key_hex: Option<String>,
    /// Require sha256(preimage) to equal the payment hash in the identifier
    pub require_preimage_match: bool,
}

/// Tracing settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Colourised output
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            ansi: false,
        }
    }
}

impl MemeConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MemeError::invalid(format!("Failed to read config file: {e}")))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| MemeError::invalid(format!("Invalid TOML: {e}")))
    }

    /// Merge `MEME_*` variables from the process environment
    pub fn merge_with_env(&mut self) -> Result<()> {
        self.merge_from_vars(std::env::vars())
    }

    /// Merge `MEME_*` overrides from an explicit variable list
    pub fn merge_from_vars<I, K, V>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let Some(name) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value = value.as_ref();
            match name {
                "HOST" => self.host = value.to_string(),
                "STORAGE_MODE" => self.storage.mode = value.parse()?,
                "LOCAL_DIR" => self.storage.local_dir = PathBuf::from(value),
                "LOCAL_ENCRYPTION_KEY" => self.storage.master_key_hex = Some(value.to_string()),
                "S3_BUCKET" => self.storage.s3.bucket = value.to_string(),
                "S3_REGION" => self.storage.s3.region = value.to_string(),
                "S3_PREFIX" => self.storage.s3.prefix = value.to_string(),
                "S3_ENDPOINT" => self.storage.s3.endpoint = Some(value.to_string()),
                "S3_KEY" => self.storage.s3.access_key = Some(value.to_string()),
                "S3_SECRET" => self.storage.s3.secret_key = Some(value.to_string()),
                "RESTRICT_UPLOAD_SIZE" => {
                    self.uploads.restrict_upload_size = parse_bool(name, value)?;
                }
                "MAX_FREE_UPLOAD_SIZE_MB" => {
                    self.uploads.max_free_upload_mb = parse_u64(name, value)?;
                }
                "CHALLENGE_TIMEOUT_SECS" => {
                    self.auth.challenge_timeout_secs = parse_u64(name, value)?;
                }
                "LSAT_ROOT_KEY" => self.lsat.root_key_hex = Some(value.to_string()),
                "LOG_LEVEL" => self.logging.level = value.to_string(),
                _ => tracing::debug!(variable = %key.as_ref(), "ignoring unknown override"),
            }
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(MemeError::invalid("host must not be empty"));
        }
        if self.auth.challenge_timeout_secs == 0 {
            return Err(MemeError::invalid("challenge timeout must be positive"));
        }
        if self.auth.claims_lifetime_secs == 0 {
            return Err(MemeError::invalid("claims lifetime must be positive"));
        }
        if let Some(hex_key) = &self.storage.master_key_hex {
            MasterKey::from_hex(hex_key)?;
        }
        if self.storage.mode == StorageMode::S3 {
            let s3 = &self.storage.s3;
            if s3.bucket.trim().is_empty() {
                return Err(MemeError::invalid("s3 bucket must not be empty"));
            }
            if s3.access_key.is_some() != s3.secret_key.is_some() {
                return Err(MemeError::invalid(
                    "s3 access key and secret key must be set together",
                ));
            }
        }
        if let Some(root) = &self.lsat.root_key_hex {
            hex::decode(root)
                .map_err(|e| MemeError::invalid(format!("lsat root key is not hex: {e}")))?;
        }
        Ok(())
    }

    /// The storage master key, required to open the encrypted store
    pub fn master_key(&self) -> Result<MasterKey> {
        let encoded = self
            .storage
            .master_key_hex
            .as_deref()
            .ok_or_else(|| MemeError::invalid("no storage master key configured"))?;
        MasterKey::from_hex(encoded)
    }

    /// The macaroon root key, when signature verification is enabled
    pub fn lsat_root_key(&self) -> Result<Option<Vec<u8>>> {
        self.lsat
            .root_key_hex
            .as_deref()
            .map(|root| {
                hex::decode(root)
                    .map_err(|e| MemeError::invalid(format!("lsat root key is not hex: {e}")))
            })
            .transpose()
    }
}

/// Boolean parsing with the spellings clients historically send
/// (`1 t T TRUE true True` / `0 f F FALSE false False`).
pub fn parse_truthy(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    parse_truthy(value)
        .ok_or_else(|| MemeError::invalid(format!("{ENV_PREFIX}{name} is not a boolean: {value}")))
}

fn parse_u64(name: &str, value: &str) -> Result<u64> {
    value
        .parse()
        .map_err(|e| MemeError::invalid(format!("{ENV_PREFIX}{name} is not a number: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = MemeConfig::default();
        assert_eq!(config.host, "localhost:5000");
        assert_eq!(config.auth.challenge_timeout_secs, 10);
        assert_eq!(config.auth.claims_lifetime_secs, SEVEN_DAYS_SECS);
        assert_eq!(config.storage.mode, StorageMode::Local);
        assert_eq!(config.uploads.max_free_upload_mb, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = MemeConfig::from_toml(
            r#"
            host = "memes.example.com"

            [storage]
            mode = "memory"
            "#,
        )
        .unwrap();
        assert_eq!(config.host, "memes.example.com");
        assert_eq!(config.storage.mode, StorageMode::Memory);
        assert_eq!(config.auth.challenge_timeout_secs, 10);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "host = \"files.example.com\"").unwrap();
        writeln!(file, "[uploads]").unwrap();
        writeln!(file, "restrict_upload_size = true").unwrap();
        let config = MemeConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.host, "files.example.com");
        assert!(config.uploads.restrict_upload_size);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = MemeConfig::default();
        config
            .merge_from_vars([
                ("MEME_HOST", "memes.sphinx.chat"),
                ("MEME_STORAGE_MODE", "memory"),
                ("MEME_RESTRICT_UPLOAD_SIZE", "true"),
                ("MEME_MAX_FREE_UPLOAD_SIZE_MB", "4"),
                ("MEME_LOCAL_ENCRYPTION_KEY", &"01".repeat(32)),
                ("PATH", "/usr/bin"),
            ])
            .unwrap();
        assert_eq!(config.host, "memes.sphinx.chat");
        assert_eq!(config.storage.mode, StorageMode::Memory);
        assert!(config.uploads.restrict_upload_size);
        assert_eq!(config.uploads.max_free_upload_mb, 4);
        assert_eq!(config.master_key().unwrap().as_bytes(), &[1u8; 32]);
    }

    #[test]
    fn test_s3_overrides() {
        let mut config = MemeConfig::default();
        assert_eq!(config.storage.s3.bucket, "sphinx-memes");
        config
            .merge_from_vars([
                ("MEME_STORAGE_MODE", "S3"),
                ("MEME_S3_BUCKET", "memes-test"),
                ("MEME_S3_PREFIX", "uploads"),
                ("MEME_S3_KEY", "AKIA0000"),
            ])
            .unwrap();
        assert_eq!(config.storage.mode, StorageMode::S3);
        assert_eq!(config.storage.s3.bucket, "memes-test");
        assert_eq!(config.storage.s3.prefix, "uploads");
        assert!(config.validate().is_err());

        config.merge_from_vars([("MEME_S3_SECRET", "shh")]).unwrap();
        assert!(config.validate().is_ok());

        config.storage.s3.bucket = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_env_override_is_rejected() {
        let mut config = MemeConfig::default();
        assert!(config
            .merge_from_vars([("MEME_RESTRICT_UPLOAD_SIZE", "maybe")])
            .is_err());
        assert!(config
            .merge_from_vars([("MEME_STORAGE_MODE", "tape")])
            .is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = MemeConfig::default();
        config.auth.challenge_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = MemeConfig::default();
        config.storage.master_key_hex = Some("abc".to_string());
        assert!(config.validate().is_err());

        let config = MemeConfig::default();
        assert!(config.master_key().is_err());
    }

    #[test]
    fn test_truthy_spellings() {
        assert_eq!(parse_truthy("True"), Some(true));
        assert_eq!(parse_truthy("0"), Some(false));
        assert_eq!(parse_truthy("yes"), None);
    }
}
