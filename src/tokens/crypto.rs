// Field-level encryption for token records.
// AES-256-GCM keyed by a process-wide master key resolved at store construction.

use std::fs;
use std::path::Path;

use aes_gcm::{
    Aes256Gcm,
    aead::{Aead, KeyInit, generic_array::GenericArray},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use rand::RngCore;
use tracing::warn;
use zeroize::Zeroizing;

use crate::error::{Result, SatchelError};

use super::paths;
use super::store::write_atomic;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// The symmetric key protecting token fields at rest.
///
/// Once records exist, the same key must keep being used; ciphertext
/// written under a different key is undecryptable and gets discarded on
/// read, which loses the stored sign-ins.
pub struct MasterKey(Zeroizing<[u8; KEY_LEN]>);

impl MasterKey {
    /// Resolve the key for a store rooted at `dir`.
    ///
    /// Fallback order: an operator-supplied base64 key, then the key
    /// persisted at [`paths::key_path`], then a freshly generated key
    /// (persisted for reuse). An unreadable persisted key is replaced.
    pub fn resolve(dir: &Path, configured: Option<&str>) -> Result<Self> {
        if let Some(encoded) = configured {
            return Self::from_base64(encoded);
        }

        let key_path = paths::key_path(dir);
        if key_path.exists() {
            let encoded = fs::read_to_string(&key_path)?;
            match Self::from_base64(encoded.trim()) {
                Ok(key) => return Ok(key),
                Err(err) => {
                    warn!(%err, "persisted master key unreadable, regenerating; existing tokens are lost");
                }
            }
        }

        let key = Self::generate();
        write_atomic(&key_path, STANDARD.encode(key.0.as_ref()).as_bytes())?;
        Ok(key)
    }

    /// Decode a base64-encoded 256-bit key.
    fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| SatchelError::InvalidKey(e.to_string()))?;
        let bytes: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| SatchelError::InvalidKey("expected 32 bytes".to_string()))?;
        Ok(Self(Zeroizing::new(bytes)))
    }

    fn generate() -> Self {
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        rand::rng().fill_bytes(bytes.as_mut());
        Self(bytes)
    }
}

/// Encrypt a secret field. Output is base64(nonce || ciphertext).
pub(crate) fn encrypt(key: &MasterKey, plaintext: &str) -> Result<String> {
    let mut nonce = [0u8; NONCE_LEN];
    rand::rng().fill_bytes(&mut nonce);

    let cipher = Aes256Gcm::new_from_slice(key.0.as_ref())
        .map_err(|e| SatchelError::InvalidKey(e.to_string()))?;

    let ciphertext = cipher
        .encrypt(GenericArray::from_slice(&nonce), plaintext.as_bytes())
        .map_err(|_| SatchelError::Crypto("field encryption failed".to_string()))?;

    let mut combined = nonce.to_vec();
    combined.extend_from_slice(&ciphertext);
    Ok(STANDARD.encode(combined))
}

/// Decrypt a secret field produced by [`encrypt`].
///
/// Fails on malformed encoding, truncated input, or a key mismatch.
pub(crate) fn decrypt(key: &MasterKey, encoded: &str) -> Result<String> {
    let combined = STANDARD
        .decode(encoded)
        .map_err(|e| SatchelError::Crypto(e.to_string()))?;

    if combined.len() < NONCE_LEN + TAG_LEN {
        return Err(SatchelError::Crypto("ciphertext too short".to_string()));
    }

    let (nonce, ciphertext) = combined.split_at(NONCE_LEN);

    let cipher = Aes256Gcm::new_from_slice(key.0.as_ref())
        .map_err(|e| SatchelError::InvalidKey(e.to_string()))?;

    let plaintext = cipher
        .decrypt(GenericArray::from_slice(nonce), ciphertext)
        .map_err(|_| SatchelError::Crypto("field decryption failed".to_string()))?;

    String::from_utf8(plaintext).map_err(|e| SatchelError::Crypto(e.to_string()))
}
