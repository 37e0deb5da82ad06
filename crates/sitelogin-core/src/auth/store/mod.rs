//! Session Store: where the token and the credentials for silent refresh live.
//!
//! Backends implement [`SessionStore`] directly. Every read is safe on an
//! empty backend and reports absence rather than an error; writes return
//! `Result` because durable backends can fail.

mod encrypted;
mod keychain;
mod memory;

pub use self::encrypted::EncryptedFileStore;
pub use self::keychain::KeyringStore;
pub use self::memory::MemoryStore;

use anyhow::{bail, Result};
use tracing::debug;

use super::models::{Credential, Token};
use crate::config::{Config, StoreBackend};

/// Encrypted store file name in cache directory
const STORE_FILE: &str = "store.json";

/// Expiry buffer used when a backend has none configured or cannot read it.
pub const DEFAULT_EXPIRY_BUFFER_HOURS: i64 = 1;

pub trait SessionStore: Send + Sync {
    fn save_token(&self, token: &Token) -> Result<()>;
    fn get_token(&self) -> Option<Token>;
    fn clear_token(&self) -> Result<()>;

    fn save_credentials(&self, username: &str, password: &str) -> Result<()>;
    fn get_credentials(&self) -> (Option<String>, Option<String>);
    fn clear_credentials(&self) -> Result<()>;

    /// Lead time before expiry at which a refresh is attempted.
    fn expiry_buffer_hours(&self) -> i64;
}

/// Both halves of the stored credentials, or nothing.
pub fn stored_credential(store: &dyn SessionStore) -> Option<Credential> {
    match store.get_credentials() {
        (Some(username), Some(password)) => Some(Credential { username, password }),
        _ => None,
    }
}

/// Open the backend `config.store` selects. The encrypted backend needs a
/// passphrase.
pub fn open_store(config: &Config, passphrase: Option<&str>) -> Result<Box<dyn SessionStore>> {
    let buffer = config.expiry_buffer_hours;
    let store: Box<dyn SessionStore> = match config.store {
        StoreBackend::Memory => Box::new(MemoryStore::with_buffer_hours(buffer)),
        StoreBackend::Keyring => Box::new(KeyringStore::new(buffer)),
        StoreBackend::Encrypted => {
            let Some(passphrase) = passphrase.filter(|p| !p.is_empty()) else {
                bail!("The encrypted session store needs a passphrase");
            };
            let store = EncryptedFileStore::new(config.cache_dir()?.join(STORE_FILE), passphrase);
            if store.expiry_buffer_hours() != buffer {
                store.set_expiry_buffer_hours(buffer)?;
            }
            Box::new(store)
        }
    };
    debug!(backend = ?config.store, buffer_hours = buffer, "Session store opened");
    Ok(store)
}

/// Round-trip laws every backend must satisfy. Shared by the backend tests.
#[cfg(test)]
pub(crate) fn assert_store_contract(store: &dyn SessionStore) {
    // Empty store reports absence
    assert_eq!(store.get_token(), None);
    assert_eq!(store.get_credentials(), (None, None));
    store.clear_token().unwrap();
    store.clear_credentials().unwrap();

    let token = Token::new("header.payload.signature");
    store.save_token(&token).unwrap();
    assert_eq!(store.get_token(), Some(token.clone()));

    store.save_credentials("scout@example.com", "p@ss word").unwrap();
    assert_eq!(
        store.get_credentials(),
        (Some("scout@example.com".to_string()), Some("p@ss word".to_string()))
    );

    // Token and credentials are independent
    store.clear_token().unwrap();
    assert_eq!(store.get_token(), None);
    assert!(stored_credential(store).is_some());

    store.save_token(&token).unwrap();
    store.clear_credentials().unwrap();
    assert_eq!(store.get_credentials(), (None, None));
    assert_eq!(store.get_token(), Some(token));
}
