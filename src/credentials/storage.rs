//! Credential Storage
//!
//! File-based cache for the credentials entered on previous runs.
//! Secret fields are encrypted with AES-256-GCM; restoring returns the exact
//! strings that were saved.

use super::Credentials;
use crate::types::{AppError, AppResult};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, info, warn};

const CREDENTIALS_FILE: &str = "credentials.json";
const ENCRYPTION_KEY_FILE: &str = ".credentials_key";
const KEY_SIZE: usize = 32;
const NONCE_SIZE: usize = 12;

fn credentials_error(context: &str, e: impl std::fmt::Display) -> AppError {
    AppError::Credentials(format!("{}: {}", context, e))
}

/// AES-256-GCM sealing of single secret values.
///
/// A sealed value is base64 of `nonce || ciphertext`, with a fresh nonce per value.
struct SecretBox {
    cipher: Aes256Gcm,
}

impl SecretBox {
    fn new(key: &[u8; KEY_SIZE]) -> AppResult<Self> {
        let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| credentials_error("bad key", e))?;
        Ok(Self { cipher })
    }

    fn seal(&self, plaintext: &str) -> AppResult<String> {
        let nonce: [u8; NONCE_SIZE] = rand::random();
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|e| credentials_error("encryption failed", e))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(sealed))
    }

    fn open(&self, sealed: &str) -> AppResult<String> {
        let bytes = BASE64
            .decode(sealed)
            .map_err(|e| credentials_error("not base64", e))?;
        if bytes.len() < NONCE_SIZE {
            return Err(AppError::Credentials("sealed value too short".to_string()));
        }

        let (nonce, ciphertext) = bytes.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| credentials_error("decryption failed", e))?;
        String::from_utf8(plaintext).map_err(|e| credentials_error("not utf-8", e))
    }

    /// Seal in place. Empty values stay empty so they restore as empty.
    fn seal_field(&self, value: &mut String) -> AppResult<()> {
        if !value.is_empty() {
            *value = self.seal(value)?;
        }
        Ok(())
    }

    /// Open in place, clearing a value that no longer decrypts.
    fn open_field(&self, name: &str, value: &mut String) {
        if value.is_empty() {
            return;
        }
        match self.open(value) {
            Ok(plaintext) => *value = plaintext,
            Err(e) => {
                warn!("Dropping cached {}: {}", name, e);
                value.clear();
            }
        }
    }
}

/// Credential storage manager
pub struct CredentialStore {
    credentials_path: PathBuf,
    key_path: PathBuf,
}

impl CredentialStore {
    /// Store under the platform data directory
    pub fn new() -> Self {
        let base_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("media-jobs");
        Self::with_path(base_dir)
    }

    /// Store under a custom directory
    pub fn with_path(base_dir: PathBuf) -> Self {
        Self {
            credentials_path: base_dir.join(CREDENTIALS_FILE),
            key_path: base_dir.join(ENCRYPTION_KEY_FILE),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.credentials_path
    }

    async fn ensure_dir(&self) -> AppResult<()> {
        if let Some(parent) = self.credentials_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Read the stored key. A missing or malformed key file yields `None`.
    async fn read_key(&self) -> AppResult<Option<[u8; KEY_SIZE]>> {
        if !self.key_path.exists() {
            return Ok(None);
        }
        let encoded = fs::read(&self.key_path).await?;
        let key = BASE64
            .decode(encoded.trim_ascii())
            .ok()
            .and_then(|bytes| <[u8; KEY_SIZE]>::try_from(bytes).ok());
        if key.is_none() {
            warn!("Credential key file {:?} is malformed, replacing it", self.key_path);
        }
        Ok(key)
    }

    async fn write_key(&self, key: &[u8; KEY_SIZE]) -> AppResult<()> {
        fs::write(&self.key_path, BASE64.encode(key)).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.key_path, std::fs::Permissions::from_mode(0o600)).await?;
        }

        info!("Generated new encryption key for credentials");
        Ok(())
    }

    async fn secret_box(&self) -> AppResult<SecretBox> {
        self.ensure_dir().await?;
        let key = match self.read_key().await? {
            Some(key) => key,
            None => {
                let key: [u8; KEY_SIZE] = rand::random();
                self.write_key(&key).await?;
                key
            }
        };
        SecretBox::new(&key)
    }

    /// Load cached credentials, or empty ones when nothing was saved yet
    pub async fn load(&self) -> AppResult<Credentials> {
        if !self.credentials_path.exists() {
            debug!("No credentials file at {:?}", self.credentials_path);
            return Ok(Credentials::default());
        }

        let content = fs::read_to_string(&self.credentials_path).await?;
        let mut credentials: Credentials = serde_json::from_str(&content).map_err(|e| {
            credentials_error(&format!("unreadable {}", self.credentials_path.display()), e)
        })?;

        let secrets = self.secret_box().await?;
        secrets.open_field("secret_access_key", &mut credentials.secret_access_key);
        secrets.open_field("api_key", &mut credentials.api_key);
        if let Some(token) = credentials.auth_token.as_mut() {
            secrets.open_field("auth_token", token);
        }

        info!("Restored credentials from {:?}", self.credentials_path);
        Ok(credentials)
    }

    /// Save credentials to disk
    pub async fn save(&self, credentials: &Credentials) -> AppResult<()> {
        let secrets = self.secret_box().await?;

        let mut sealed = credentials.clone();
        secrets.seal_field(&mut sealed.secret_access_key)?;
        secrets.seal_field(&mut sealed.api_key)?;
        if let Some(token) = sealed.auth_token.as_mut() {
            secrets.seal_field(token)?;
        }

        fs::write(&self.credentials_path, serde_json::to_string_pretty(&sealed)?).await?;

        info!("Saved credentials to {:?}", self.credentials_path);
        Ok(())
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}
