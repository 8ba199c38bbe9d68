// Encrypted token store for OAuth credentials.
// Persists one record per provider with field-level encryption and lazy expiry.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, SatchelError};

use super::crypto::{self, MasterKey};
use super::paths;
use super::provider::Provider;

/// Tokens produced by a completed OAuth code exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Absolute expiry, epoch milliseconds.
    pub expires_at: i64,
    /// Granted OAuth scopes, in the order the provider returned them.
    pub scope: Vec<String>,
}

/// A live token read back from storage, secrets in cleartext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredToken {
    pub provider: Provider,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: i64,
    pub scope: Vec<String>,
}

/// Non-secret connection summary for status display.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TokenInfo {
    pub is_connected: bool,
    pub expires_at: Option<i64>,
    pub scope: Option<Vec<String>>,
}

/// On-disk record shape. The secret fields hold base64 ciphertext, so the
/// metadata stays readable without a decrypt.
#[derive(Debug, Serialize, Deserialize)]
struct TokenRecord {
    provider: Provider,
    access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    expires_at: i64,
    scope: Vec<String>,
}

/// Durable store for per-provider OAuth tokens.
///
/// A token is live iff `now < expires_at`. Reads check expiry before any
/// decryption, and a record that is expired, unparsable, or undecryptable
/// is deleted and reported as absent; a broken credential is operationally
/// the same as no credential.
pub struct TokenStore {
    dir: PathBuf,
    key: MasterKey,
}

impl TokenStore {
    /// Open a store rooted at `dir`, resolving the master key.
    pub fn open(dir: impl Into<PathBuf>, configured_key: Option<&str>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let key = MasterKey::resolve(&dir, configured_key)?;
        Ok(Self { dir, key })
    }

    /// Open a store in the per-user data directory.
    ///
    /// An operator-supplied key is honored via `SATCHEL_MASTER_KEY`.
    pub fn open_default() -> Result<Self> {
        let dir = paths::data_dir().ok_or(SatchelError::MissingStorageDir)?;
        let configured = std::env::var("SATCHEL_MASTER_KEY").ok();
        Self::open(dir, configured.as_deref())
    }

    /// Encrypt and persist a provider's tokens.
    ///
    /// Overwrites any existing record. A storage or serialization failure
    /// surfaces as [`SatchelError::TokenPersistence`] so the caller can
    /// tell the user their sign-in was not saved.
    pub fn save_token(&self, provider: Provider, tokens: &TokenSet) -> Result<()> {
        let access_token =
            crypto::encrypt(&self.key, &tokens.access_token).map_err(|e| persistence(provider, e))?;
        let refresh_token = match &tokens.refresh_token {
            Some(token) => {
                Some(crypto::encrypt(&self.key, token).map_err(|e| persistence(provider, e))?)
            }
            None => None,
        };

        let record = TokenRecord {
            provider,
            access_token,
            refresh_token,
            expires_at: tokens.expires_at,
            scope: tokens.scope.clone(),
        };

        let json = serde_json::to_string_pretty(&record)
            .map_err(|e| persistence(provider, e.into()))?;
        write_atomic(&paths::token_path(&self.dir, provider), json.as_bytes())
            .map_err(|e| persistence(provider, e))?;

        Ok(())
    }

    /// Read a provider's tokens, decrypting the secret fields.
    pub fn get_token(&self, provider: Provider) -> Result<Option<StoredToken>> {
        let record = match self.read_record(provider)? {
            Some(record) => record,
            None => return Ok(None),
        };

        let access_token = match crypto::decrypt(&self.key, &record.access_token) {
            Ok(token) => token,
            Err(err) => {
                warn!(%provider, %err, "discarding undecryptable token record");
                self.remove_token(provider)?;
                return Ok(None);
            }
        };

        let refresh_token = match &record.refresh_token {
            Some(ciphertext) => match crypto::decrypt(&self.key, ciphertext) {
                Ok(token) => Some(token),
                Err(err) => {
                    warn!(%provider, %err, "discarding undecryptable token record");
                    self.remove_token(provider)?;
                    return Ok(None);
                }
            },
            None => None,
        };

        Ok(Some(StoredToken {
            provider,
            access_token,
            refresh_token,
            expires_at: record.expires_at,
            scope: record.scope,
        }))
    }

    /// Whether a live token exists for `provider`.
    pub fn has_valid_token(&self, provider: Provider) -> bool {
        matches!(self.get_token(provider), Ok(Some(_)))
    }

    /// Delete a provider's record. Idempotent.
    pub fn remove_token(&self, provider: Provider) -> Result<()> {
        let path = paths::token_path(&self.dir, provider);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// Delete the records of every known provider.
    pub fn clear_all_tokens(&self) -> Result<()> {
        for provider in Provider::ALL {
            self.remove_token(provider)?;
        }
        Ok(())
    }

    /// Connection status for `provider` without decrypting any secret.
    pub fn token_info(&self, provider: Provider) -> TokenInfo {
        match self.read_record(provider) {
            Ok(Some(record)) => TokenInfo {
                is_connected: true,
                expires_at: Some(record.expires_at),
                scope: Some(record.scope),
            },
            _ => TokenInfo::default(),
        }
    }

    /// Read and expiry-check a record without touching the ciphertext.
    ///
    /// Expiry is checked before any decryption is attempted, so a dead
    /// token never costs cryptographic work and is never handed back.
    fn read_record(&self, provider: Provider) -> Result<Option<TokenRecord>> {
        let path = paths::token_path(&self.dir, provider);
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&path)?;
        let record: TokenRecord = match serde_json::from_str(&contents) {
            Ok(record) => record,
            Err(err) => {
                warn!(%provider, %err, "discarding unparsable token record");
                self.remove_token(provider)?;
                return Ok(None);
            }
        };

        if Utc::now().timestamp_millis() >= record.expires_at {
            self.remove_token(provider)?;
            return Ok(None);
        }

        Ok(Some(record))
    }
}

fn persistence(provider: Provider, err: SatchelError) -> SatchelError {
    SatchelError::TokenPersistence {
        provider,
        reason: err.to_string(),
    }
}

/// Write atomically via temp file so a crash never leaves a torn record.
pub(super) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension("tmp");
    let mut file = fs::File::create(&temp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    fs::rename(&temp_path, path)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use tempfile::TempDir;

    use super::*;

    fn live_tokens() -> TokenSet {
        TokenSet {
            access_token: "gho_abc123".to_string(),
            refresh_token: Some("ghr_refresh456".to_string()),
            expires_at: Utc::now().timestamp_millis() + 60_000,
            scope: vec!["repo".to_string(), "read:user".to_string()],
        }
    }

    #[test]
    fn test_round_trip_recovers_secrets_exactly() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::open(dir.path(), None).unwrap();
        let tokens = live_tokens();

        store.save_token(Provider::GitHub, &tokens).unwrap();

        let stored = store.get_token(Provider::GitHub).unwrap().unwrap();
        assert_eq!(stored.provider, Provider::GitHub);
        assert_eq!(stored.access_token, tokens.access_token);
        assert_eq!(stored.refresh_token, tokens.refresh_token);
        assert_eq!(stored.expires_at, tokens.expires_at);
        assert_eq!(stored.scope, tokens.scope);
    }

    #[test]
    fn test_round_trip_without_refresh_token() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::open(dir.path(), None).unwrap();

        let tokens = TokenSet {
            refresh_token: None,
            ..live_tokens()
        };
        store.save_token(Provider::LinkedIn, &tokens).unwrap();

        let stored = store.get_token(Provider::LinkedIn).unwrap().unwrap();
        assert_eq!(stored.refresh_token, None);
    }

    #[test]
    fn test_secrets_never_hit_disk_in_cleartext() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::open(dir.path(), None).unwrap();
        let tokens = live_tokens();

        store.save_token(Provider::GitHub, &tokens).unwrap();

        let raw = fs::read_to_string(paths::token_path(dir.path(), Provider::GitHub)).unwrap();
        assert!(!raw.contains("gho_abc123"));
        assert!(!raw.contains("ghr_refresh456"));
        // Metadata stays readable without a decrypt.
        assert!(raw.contains("\"repo\""));
        assert!(raw.contains(&tokens.expires_at.to_string()));
    }

    #[test]
    fn test_overwrite_replaces_record() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::open(dir.path(), None).unwrap();

        store.save_token(Provider::GitHub, &live_tokens()).unwrap();

        let newer = TokenSet {
            access_token: "gho_rotated".to_string(),
            ..live_tokens()
        };
        store.save_token(Provider::GitHub, &newer).unwrap();

        let stored = store.get_token(Provider::GitHub).unwrap().unwrap();
        assert_eq!(stored.access_token, "gho_rotated");
    }

    #[test]
    fn test_expired_token_auto_clears() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::open(dir.path(), None).unwrap();

        let tokens = TokenSet {
            expires_at: Utc::now().timestamp_millis() - 1,
            ..live_tokens()
        };
        store.save_token(Provider::GitHub, &tokens).unwrap();

        assert!(store.get_token(Provider::GitHub).unwrap().is_none());
        assert!(!store.has_valid_token(Provider::GitHub));
        assert!(!paths::token_path(dir.path(), Provider::GitHub).exists());
    }

    #[test]
    fn test_corrupt_record_self_heals() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::open(dir.path(), None).unwrap();

        let path = paths::token_path(dir.path(), Provider::GitHub);
        fs::write(&path, "{definitely not a token record").unwrap();

        assert!(store.get_token(Provider::GitHub).unwrap().is_none());
        assert!(!store.token_info(Provider::GitHub).is_connected);
        assert!(!path.exists());
    }

    #[test]
    fn test_key_rotation_discards_old_records() {
        let dir = TempDir::new().unwrap();
        let key_a = STANDARD.encode([1u8; 32]);
        let key_b = STANDARD.encode([2u8; 32]);

        let store = TokenStore::open(dir.path(), Some(&key_a)).unwrap();
        store.save_token(Provider::GitHub, &live_tokens()).unwrap();

        let rotated = TokenStore::open(dir.path(), Some(&key_b)).unwrap();
        assert!(rotated.get_token(Provider::GitHub).unwrap().is_none());
        assert!(!paths::token_path(dir.path(), Provider::GitHub).exists());
    }

    #[test]
    fn test_persisted_key_survives_reopen() {
        let dir = TempDir::new().unwrap();

        let first = TokenStore::open(dir.path(), None).unwrap();
        first.save_token(Provider::GitHub, &live_tokens()).unwrap();
        drop(first);

        let second = TokenStore::open(dir.path(), None).unwrap();
        let stored = second.get_token(Provider::GitHub).unwrap().unwrap();
        assert_eq!(stored.access_token, "gho_abc123");
    }

    #[test]
    fn test_remove_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::open(dir.path(), None).unwrap();

        store.save_token(Provider::GitHub, &live_tokens()).unwrap();
        store.remove_token(Provider::GitHub).unwrap();
        store.remove_token(Provider::GitHub).unwrap();

        assert!(store.get_token(Provider::GitHub).unwrap().is_none());
    }

    #[test]
    fn test_clear_all_tokens() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::open(dir.path(), None).unwrap();

        store.save_token(Provider::GitHub, &live_tokens()).unwrap();
        store.save_token(Provider::LinkedIn, &live_tokens()).unwrap();

        store.clear_all_tokens().unwrap();

        assert!(!store.has_valid_token(Provider::GitHub));
        assert!(!store.has_valid_token(Provider::LinkedIn));
    }

    #[test]
    fn test_token_info_reports_metadata_only() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::open(dir.path(), None).unwrap();
        let tokens = live_tokens();

        store.save_token(Provider::GitHub, &tokens).unwrap();

        let info = store.token_info(Provider::GitHub);
        assert!(info.is_connected);
        assert_eq!(info.expires_at, Some(tokens.expires_at));
        assert_eq!(info.scope, Some(tokens.scope));

        let absent = store.token_info(Provider::LinkedIn);
        assert!(!absent.is_connected);
        assert_eq!(absent.expires_at, None);
    }

    #[test]
    fn test_persistence_failure_surfaces() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::open(dir.path(), None).unwrap();

        // A directory squatting on the record path makes the final rename fail.
        fs::create_dir(paths::token_path(dir.path(), Provider::GitHub)).unwrap();

        let err = store
            .save_token(Provider::GitHub, &live_tokens())
            .unwrap_err();
        assert!(matches!(
            err,
            SatchelError::TokenPersistence {
                provider: Provider::GitHub,
                ..
            }
        ));
    }
}
