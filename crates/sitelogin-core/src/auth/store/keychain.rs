use anyhow::{Context, Result};
use keyring::Entry;
use tracing::warn;

use super::SessionStore;
use crate::auth::models::Token;

const SERVICE_NAME: &str = "sitelogin";

const TOKEN_ENTRY: &str = "token";
const USERNAME_ENTRY: &str = "username";
const PASSWORD_ENTRY: &str = "password";

/// Store backed by the OS keychain, one entry per field.
pub struct KeyringStore {
    service: String,
    buffer_hours: i64,
}

impl KeyringStore {
    pub fn new(buffer_hours: i64) -> Self {
        Self::with_service(SERVICE_NAME, buffer_hours)
    }

    /// Use a different keychain service name, e.g. one per site profile.
    pub fn with_service(service: &str, buffer_hours: i64) -> Self {
        Self {
            service: service.to_string(),
            buffer_hours,
        }
    }

    fn entry(&self, field: &str) -> Result<Entry> {
        Entry::new(&self.service, field).context("Failed to create keyring entry")
    }

    fn set(&self, field: &str, value: &str) -> Result<()> {
        self.entry(field)?
            .set_password(value)
            .with_context(|| format!("Failed to store {} in keychain", field))
    }

    fn get(&self, field: &str) -> Option<String> {
        let entry = match self.entry(field) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(field, error = %e, "Keychain unavailable");
                return None;
            }
        };
        match entry.get_password() {
            Ok(value) => Some(value),
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                warn!(field, error = %e, "Failed to read keychain entry");
                None
            }
        }
    }

    fn delete(&self, field: &str) -> Result<()> {
        match self.entry(field)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to delete {} from keychain", field))
            }
        }
    }
}

impl SessionStore for KeyringStore {
    fn save_token(&self, token: &Token) -> Result<()> {
        self.set(TOKEN_ENTRY, token.as_str())
    }

    fn get_token(&self) -> Option<Token> {
        self.get(TOKEN_ENTRY).map(Token::from)
    }

    fn clear_token(&self) -> Result<()> {
        self.delete(TOKEN_ENTRY)
    }

    fn save_credentials(&self, username: &str, password: &str) -> Result<()> {
        self.set(USERNAME_ENTRY, username)?;
        self.set(PASSWORD_ENTRY, password)
    }

    fn get_credentials(&self) -> (Option<String>, Option<String>) {
        (self.get(USERNAME_ENTRY), self.get(PASSWORD_ENTRY))
    }

    fn clear_credentials(&self) -> Result<()> {
        self.delete(USERNAME_ENTRY)?;
        self.delete(PASSWORD_ENTRY)
    }

    fn expiry_buffer_hours(&self) -> i64 {
        self.buffer_hours
    }
}
