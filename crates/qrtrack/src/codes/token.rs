//! Signed deletion tokens.
//!
//! A token is `{expires}.{signature}` where `expires` is a unix timestamp
//! (0 for "never") and `signature` is the hex HMAC-SHA256 of the item id and
//! expiry. The token rides in the query string of the URL printed in an
//! item's code, so only codes issued by this server can delete items.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;
use tracing::info;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::storage::ensure_parent_dir;

type HmacSha256 = Hmac<Sha256>;

/// Length of a generated signing key, in bytes.
const GENERATED_KEY_LEN: usize = 32;

/// Why a deletion token was refused.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    /// No token was supplied.
    #[error("missing token")]
    Missing,
    /// The token is not `{expires}.{hex}`.
    #[error("malformed token")]
    Malformed,
    /// The signature does not match the item.
    #[error("bad token signature")]
    BadSignature,
    /// The token is past its expiry.
    #[error("token expired")]
    Expired,
}

/// Issues and checks deletion tokens.
#[derive(Clone)]
pub struct TokenSigner {
    mac: HmacSha256,
    ttl: Option<Duration>,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenSigner {
    /// Create a signer from raw key bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is empty.
    pub fn new(key: &[u8], ttl: Option<Duration>) -> Result<Self> {
        if key.is_empty() {
            return Err(Error::ConfigValidation {
                message: "signing key must not be empty".to_string(),
            });
        }
        let mac = HmacSha256::new_from_slice(key)
            .map_err(|err| Error::internal(format!("signing key rejected: {err}")))?;
        Ok(Self { mac, ttl })
    }

    /// Build the signer described by the configuration.
    ///
    /// Uses `codes.signing_secret` when set; otherwise reads the generated
    /// key file next to the data, creating it on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the key file cannot be read or written.
    pub fn from_config(config: &Config) -> Result<Self> {
        let ttl = config.token_ttl();
        match &config.codes.signing_secret {
            Some(secret) => Self::new(secret.as_bytes(), ttl),
            None => Self::new(&load_or_create_key(&config.signing_key_path())?, ttl),
        }
    }

    /// Issue a token for `id`.
    #[must_use]
    pub fn sign(&self, id: &str, now: DateTime<Utc>) -> String {
        let expires = self.ttl.map_or(0, |ttl| {
            now.timestamp()
                .saturating_add(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX))
        });
        let signature = self.keyed(id, expires).finalize().into_bytes();
        format!("{expires}.{}", hex::encode(signature))
    }

    /// Check that `token` was issued for `id` and is still valid at `now`.
    ///
    /// # Errors
    ///
    /// Returns the reason the token was refused.
    pub fn verify(
        &self,
        id: &str,
        token: &str,
        now: DateTime<Utc>,
    ) -> std::result::Result<(), TokenError> {
        let (expires, signature) = token.split_once('.').ok_or(TokenError::Malformed)?;
        let expires: i64 = expires.parse().map_err(|_| TokenError::Malformed)?;
        let signature = hex::decode(signature).map_err(|_| TokenError::Malformed)?;

        self.keyed(id, expires)
            .verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        if expires != 0 && now.timestamp() > expires {
            return Err(TokenError::Expired);
        }
        Ok(())
    }

    fn keyed(&self, id: &str, expires: i64) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(format!("delete\n{id}\n{expires}").as_bytes());
        mac
    }
}

/// Read the hex key at `path`, generating and saving a random one if absent.
fn load_or_create_key(path: &Path) -> Result<Vec<u8>> {
    if let Some(key) = read_key_file(path)? {
        return Ok(key);
    }

    let mut key = vec![0u8; GENERATED_KEY_LEN];
    rand::rng().fill_bytes(&mut key);
    ensure_parent_dir(path)?;
    match write_key_file(path, &key) {
        Ok(()) => {
            info!("Generated new signing key at {}", path.display());
            Ok(key)
        }
        // Another process created the key first.
        Err(err) if err.kind() == ErrorKind::AlreadyExists => read_key_file(path)?
            .ok_or_else(|| Error::internal(format!("signing key {} vanished", path.display()))),
        Err(err) => Err(err.into()),
    }
}

fn read_key_file(path: &Path) -> Result<Option<Vec<u8>>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => hex::decode(contents.trim())
            .map(Some)
            .map_err(|err| Error::ConfigValidation {
                message: format!("signing key file {} is not hex: {err}", path.display()),
            }),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Create the key file readable by the owner only. Never overwrites.
fn write_key_file(path: &Path, key: &[u8]) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(hex::encode(key).as_bytes())?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const ID: &str = "6f1c2a9e-0b7d-4f43-8e1a-2d3c4b5a6978";

    fn signer(ttl: Option<Duration>) -> TokenSigner {
        TokenSigner::new(b"0123456789abcdef", ttl).unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_sign_and_verify() {
        let signer = signer(Some(Duration::from_secs(60)));
        let token = signer.sign(ID, at(1_000));

        assert!(token.starts_with("1060."));
        assert_eq!(signer.verify(ID, &token, at(1_030)), Ok(()));
    }

    #[test]
    fn test_token_is_bound_to_item() {
        let signer = signer(None);
        let token = signer.sign(ID, at(0));

        assert_eq!(
            signer.verify("another-id", &token, at(0)),
            Err(TokenError::BadSignature)
        );
    }

    #[test]
    fn test_expired_token() {
        let signer = signer(Some(Duration::from_secs(60)));
        let token = signer.sign(ID, at(1_000));

        assert_eq!(signer.verify(ID, &token, at(1_061)), Err(TokenError::Expired));
    }

    #[test]
    fn test_no_ttl_never_expires() {
        let signer = signer(None);
        let token = signer.sign(ID, at(1_000));

        assert!(token.starts_with("0."));
        assert_eq!(signer.verify(ID, &token, at(i64::from(u32::MAX))), Ok(()));
    }

    #[test]
    fn test_extending_expiry_breaks_signature() {
        let signer = signer(Some(Duration::from_secs(60)));
        let token = signer.sign(ID, at(1_000));
        let (_, sig) = token.split_once('.').unwrap();

        assert_eq!(
            signer.verify(ID, &format!("0.{sig}"), at(5_000)),
            Err(TokenError::BadSignature)
        );
    }

    #[test]
    fn test_malformed_tokens() {
        let signer = signer(None);
        for token in ["", "abc", "12.zz", "x.00"] {
            assert_eq!(
                signer.verify(ID, token, at(0)),
                Err(TokenError::Malformed),
                "token {token:?}"
            );
        }
    }

    #[test]
    fn test_different_keys_disagree() {
        let token = signer(None).sign(ID, at(0));
        let other = TokenSigner::new(b"fedcba9876543210", None).unwrap();

        assert_eq!(other.verify(ID, &token, at(0)), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(TokenSigner::new(b"", None).is_err());
    }

    #[test]
    fn test_debug_hides_key() {
        let debug = format!("{:?}", signer(None));
        assert!(debug.contains("TokenSigner"));
        assert!(!debug.contains("0123456789abcdef"));
    }

    #[test]
    fn test_generated_key_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.data_path = Some(dir.path().join("items.json"));

        let first = TokenSigner::from_config(&config).unwrap();
        assert!(config.signing_key_path().exists());
        let token = first.sign(ID, Utc::now());

        let second = TokenSigner::from_config(&config).unwrap();
        assert_eq!(second.verify(ID, &token, Utc::now()), Ok(()));
    }

    #[cfg(unix)]
    #[test]
    fn test_generated_key_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.data_path = Some(dir.path().join("items.json"));

        TokenSigner::from_config(&config).unwrap();
        let mode = std::fs::metadata(config.signing_key_path())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_existing_key_file_is_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signing.key");
        std::fs::write(&path, "00112233").unwrap();

        let err = write_key_file(&path, b"other").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(
            load_or_create_key(&path).unwrap(),
            vec![0x00, 0x11, 0x22, 0x33]
        );
    }

    #[test]
    fn test_configured_secret_wins() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.data_path = Some(dir.path().join("items.json"));
        config.codes.signing_secret = Some("0123456789abcdef".to_string());

        let from_config = TokenSigner::from_config(&config).unwrap();
        let token = signer(config.token_ttl()).sign(ID, Utc::now());

        assert_eq!(from_config.verify(ID, &token, Utc::now()), Ok(()));
        assert!(!config.signing_key_path().exists());
    }
}
