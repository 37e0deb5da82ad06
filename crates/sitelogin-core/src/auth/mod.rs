//! Authentication and session lifecycle.
//!
//! This module provides:
//! - `Authenticator`: check stored token, scrape-login if needed, refresh, logout
//! - `ScrapingLogin`: the browser login page sequence behind `LoginFlow`
//! - `jwt`: unverified claim decoding for expiry checks
//! - `SessionStore`: token/credential persistence (memory, encrypted file, keychain)
//!
//! The cookie jar is snapshotted to disk after each login so a restart can
//! pick the session back up.

pub mod authenticator;
pub mod details;
pub mod error;
pub mod jwt;
pub mod login;
pub mod models;
pub mod snapshot;
pub mod store;

pub use authenticator::Authenticator;
pub use details::{SessionDetails, SessionStatus};
pub use error::{AuthError, DecodeError};
pub use login::{LoginFlow, LoginStep, ScrapingLogin};
pub use models::{AuthResult, Claims, Credential, Token};
pub use snapshot::{CookieSnapshot, SnapshotFile};
pub use store::{open_store, EncryptedFileStore, KeyringStore, MemoryStore, SessionStore};
