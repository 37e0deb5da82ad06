//! Plain value types shared by the login flow, the stores and the core.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Username/password pair, forwarded verbatim to the login form.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

// Never print the password, even in debug logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Raw bearer token as harvested from the cookie jar.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token(<{} bytes>)", self.0.len())
    }
}

impl From<String> for Token {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for Token {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

/// Claims read from a token's payload segment. Derived on demand, never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Expiry, unix seconds
    pub exp: Option<i64>,
    /// Issued at, unix seconds
    pub iat: Option<i64>,
    pub sub: Option<String>,
    pub email: Option<String>,
}

/// Outcome of `Authenticator::authenticate`.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthResult {
    pub success: bool,
    pub token: Option<Token>,
    pub error_message: Option<String>,
}

impl AuthResult {
    pub fn success(token: Token) -> Self {
        Self {
            success: true,
            token: Some(token),
            error_message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            token: None,
            error_message: Some(message.into()),
        }
    }
}
