use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use argon2::Argon2;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{SessionStore, DEFAULT_EXPIRY_BUFFER_HOURS};
use crate::auth::models::Token;

const ENVELOPE_VERSION: u32 = 1;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 24;
const KEY_LEN: usize = 32;

/// Plaintext document inside the envelope.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredSession {
    token: Option<String>,
    username: Option<String>,
    password: Option<String>,
    expiry_buffer_hours: Option<i64>,
}

/// On-disk format: everything needed to decrypt, except the passphrase.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    version: u32,
    salt: String,
    nonce: String,
    ciphertext: String,
}

/// Argon2 output for one salt.
struct DerivedKey {
    salt: Vec<u8>,
    key: [u8; KEY_LEN],
}

/// Durable store: one XChaCha20-Poly1305 encrypted JSON file, key derived
/// from a passphrase with Argon2. The key is derived once per salt and kept;
/// writes reuse it with a fresh nonce.
pub struct EncryptedFileStore {
    path: PathBuf,
    passphrase: String,
    // Serializes read-modify-write cycles within this process
    lock: Mutex<()>,
    key: Mutex<Option<DerivedKey>>,
}

impl EncryptedFileStore {
    pub fn new(path: impl Into<PathBuf>, passphrase: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            passphrase: passphrase.into(),
            lock: Mutex::new(()),
            key: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist a non-default expiry buffer alongside the session.
    pub fn set_expiry_buffer_hours(&self, hours: i64) -> Result<()> {
        self.update(|doc| doc.expiry_buffer_hours = Some(hours))
    }

    fn derive_key(&self, salt: &[u8]) -> Result<[u8; KEY_LEN]> {
        let mut cached = self.key.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(ref derived) = *cached {
            if derived.salt == salt {
                return Ok(derived.key);
            }
        }

        let mut key = [0u8; KEY_LEN];
        Argon2::default()
            .hash_password_into(self.passphrase.as_bytes(), salt, &mut key)
            .map_err(|e| anyhow!("Failed to derive store key: {}", e))?;
        *cached = Some(DerivedKey {
            salt: salt.to_vec(),
            key,
        });
        Ok(key)
    }

    /// Salt for the next write: the cached one, or a fresh draw.
    fn write_salt(&self) -> Vec<u8> {
        let cached = self.key.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        match *cached {
            Some(ref derived) => derived.salt.clone(),
            None => {
                let mut salt = vec![0u8; SALT_LEN];
                OsRng.fill_bytes(&mut salt);
                salt
            }
        }
    }

    fn read(&self) -> Result<StoredSession> {
        if !self.path.exists() {
            return Ok(StoredSession::default());
        }

        let contents = std::fs::read_to_string(&self.path)
            .context("Failed to read session store")?;
        let envelope: Envelope =
            serde_json::from_str(&contents).context("Failed to parse session store")?;
        if envelope.version != ENVELOPE_VERSION {
            return Err(anyhow!("Unsupported session store version {}", envelope.version));
        }

        let salt = STANDARD.decode(&envelope.salt).context("Corrupt store salt")?;
        let nonce = STANDARD.decode(&envelope.nonce).context("Corrupt store nonce")?;
        let ciphertext = STANDARD
            .decode(&envelope.ciphertext)
            .context("Corrupt store ciphertext")?;
        if nonce.len() != NONCE_LEN {
            return Err(anyhow!("Corrupt store nonce length {}", nonce.len()));
        }

        let key = self.derive_key(&salt)?;
        let cipher = XChaCha20Poly1305::new_from_slice(&key)
            .map_err(|e| anyhow!("Invalid store key: {}", e))?;
        let plaintext = cipher
            .decrypt(XNonce::from_slice(&nonce), ciphertext.as_slice())
            .map_err(|_| anyhow!("Failed to decrypt session store (wrong passphrase?)"))?;

        serde_json::from_slice(&plaintext).context("Failed to parse decrypted session store")
    }

    fn write(&self, doc: &StoredSession) -> Result<()> {
        let salt = self.write_salt();
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let key = self.derive_key(&salt)?;
        let cipher = XChaCha20Poly1305::new_from_slice(&key)
            .map_err(|e| anyhow!("Invalid store key: {}", e))?;
        let plaintext = serde_json::to_vec(doc)?;
        let ciphertext = cipher
            .encrypt(XNonce::from_slice(&nonce), plaintext.as_slice())
            .map_err(|_| anyhow!("Failed to encrypt session store"))?;

        let envelope = Envelope {
            version: ENVELOPE_VERSION,
            salt: STANDARD.encode(salt),
            nonce: STANDARD.encode(nonce),
            ciphertext: STANDARD.encode(ciphertext),
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&envelope)?;
        std::fs::write(&self.path, contents).context("Failed to write session store")?;
        debug!(path = %self.path.display(), "Session store written");
        Ok(())
    }

    /// Read for getters: unreadable means empty.
    fn load_or_empty(&self) -> StoredSession {
        match self.read() {
            Ok(doc) => doc,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Session store unreadable, treating as empty");
                StoredSession::default()
            }
        }
    }

    fn update(&self, apply: impl FnOnce(&mut StoredSession)) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        // An unreadable file must not be overwritten with an empty document
        let mut doc = self.read()?;
        apply(&mut doc);
        self.write(&doc)
    }
}

impl SessionStore for EncryptedFileStore {
    fn save_token(&self, token: &Token) -> Result<()> {
        self.update(|doc| doc.token = Some(token.as_str().to_string()))
    }

    fn get_token(&self) -> Option<Token> {
        self.load_or_empty().token.map(Token::from)
    }

    fn clear_token(&self) -> Result<()> {
        self.update(|doc| doc.token = None)
    }

    fn save_credentials(&self, username: &str, password: &str) -> Result<()> {
        self.update(|doc| {
            doc.username = Some(username.to_string());
            doc.password = Some(password.to_string());
        })
    }

    fn get_credentials(&self) -> (Option<String>, Option<String>) {
        let doc = self.load_or_empty();
        (doc.username, doc.password)
    }

    fn clear_credentials(&self) -> Result<()> {
        self.update(|doc| {
            doc.username = None;
            doc.password = None;
        })
    }

    fn expiry_buffer_hours(&self) -> i64 {
        self.load_or_empty()
            .expiry_buffer_hours
            .unwrap_or(DEFAULT_EXPIRY_BUFFER_HOURS)
    }
}
