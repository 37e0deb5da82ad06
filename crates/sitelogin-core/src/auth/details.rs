//! Read-only session diagnostics for user-facing inspection.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use super::jwt;
use super::models::Token;
use crate::utils::format::{format_relative, format_timestamp};

/// Where a stored token stands relative to its expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    NoSession,
    Valid,
    /// Still valid, but inside the refresh buffer
    ExpiringSoon,
    Expired,
    /// Undecodable or missing `exp`
    Invalid,
}

impl SessionStatus {
    pub fn evaluate(token: Option<&Token>, buffer_secs: i64, now: i64) -> Self {
        let Some(token) = token else {
            return SessionStatus::NoSession;
        };
        match jwt::decode(token.as_str()).ok().and_then(|claims| claims.exp) {
            None => SessionStatus::Invalid,
            Some(exp) if exp <= now => SessionStatus::Expired,
            Some(exp) if now + buffer_secs >= exp => SessionStatus::ExpiringSoon,
            Some(_) => SessionStatus::Valid,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionStatus::NoSession => "not logged in",
            SessionStatus::Valid => "valid",
            SessionStatus::ExpiringSoon => "expiring soon",
            SessionStatus::Expired => "expired",
            SessionStatus::Invalid => "invalid token",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Diagnostic view of the current session. Never contains the raw token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionDetails {
    pub status: SessionStatus,
    /// `email` claim, falling back to the stored username
    pub login: Option<String>,
    /// `sub` claim
    pub account_id: Option<String>,
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub issued_relative: Option<String>,
    pub expires_relative: Option<String>,
    pub cookie_names: Vec<String>,
    pub has_stored_credentials: bool,
}

impl SessionDetails {
    pub fn collect(
        token: Option<&Token>,
        stored_username: Option<String>,
        cookie_names: Vec<String>,
        has_stored_credentials: bool,
        buffer_secs: i64,
        now: DateTime<Utc>,
    ) -> Self {
        let claims = token.and_then(|t| jwt::decode(t.as_str()).ok());
        let issued_at = claims.as_ref().and_then(|c| c.iat).and_then(from_unix);
        let expires_at = claims.as_ref().and_then(|c| c.exp).and_then(from_unix);

        Self {
            status: SessionStatus::evaluate(token, buffer_secs, now.timestamp()),
            login: claims
                .as_ref()
                .and_then(|c| c.email.clone())
                .or(stored_username),
            account_id: claims.as_ref().and_then(|c| c.sub.clone()),
            issued_at,
            expires_at,
            issued_relative: issued_at.map(|at| format_relative(at, now)),
            expires_relative: expires_at.map(|at| format_relative(at, now)),
            cookie_names,
            has_stored_credentials,
        }
    }

    /// Multi-line human summary
    pub fn summary(&self) -> String {
        let mut lines = vec![format!("Status:      {}", self.status)];
        lines.push(format!(
            "Login:       {}",
            self.login.as_deref().unwrap_or("unknown")
        ));
        if let Some(ref id) = self.account_id {
            lines.push(format!("Account:     {}", id));
        }
        if let (Some(at), Some(rel)) = (self.issued_at, &self.issued_relative) {
            lines.push(format!("Issued:      {} ({})", format_timestamp(at), rel));
        }
        if let (Some(at), Some(rel)) = (self.expires_at, &self.expires_relative) {
            lines.push(format!("Expires:     {} ({})", format_timestamp(at), rel));
        }
        let cookies = if self.cookie_names.is_empty() {
            "none".to_string()
        } else {
            self.cookie_names.join(", ")
        };
        lines.push(format!("Cookies:     {}", cookies));
        lines.push(format!(
            "Credentials: {}",
            if self.has_stored_credentials { "stored" } else { "not stored" }
        ));
        lines.join("\n")
    }
}

fn from_unix(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}
