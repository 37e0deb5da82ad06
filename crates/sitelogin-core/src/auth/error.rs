use thiserror::Error;

/// Failure kinds of the login flow and session lifecycle.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Transport failure: timeout, connection error, or unexpected status at a fetch step.
    #[error("Network error: {0}")]
    Network(String),

    /// The site rejected the credentials (status code or inline error banner).
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The site answered in a shape the login flow does not understand.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// No path to a valid token exists; the user has to log in again.
    #[error("Authentication required: {0}")]
    AuthenticationRequired(String),

    /// A well-formed session that has run past its expiry.
    #[error("Session expired: {0}")]
    SessionExpired(String),

    /// Anything outside the taxonomy above (storage, I/O, client construction).
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AuthError {
    /// Timeout while talking to `url` during `context`.
    pub fn timeout(context: &str, url: &str, timeout_secs: u64) -> Self {
        AuthError::Network(format!(
            "timeout after {}s during {} ({})",
            timeout_secs, context, url
        ))
    }

    /// Non-timeout transport failure while talking to `url` during `context`.
    pub fn transport(context: &str, url: &str, source: &reqwest::Error) -> Self {
        AuthError::Network(format!("{} failed ({}): {}", context, url, source))
    }

    /// Maps a reqwest error to the timeout or transport variant.
    pub fn from_request(
        context: &str,
        url: &str,
        timeout_secs: u64,
        source: &reqwest::Error,
    ) -> Self {
        if source.is_timeout() {
            Self::timeout(context, url, timeout_secs)
        } else {
            Self::transport(context, url, source)
        }
    }

    /// Unexpected status at a fetch step.
    pub fn status(context: &str, url: &str, status: reqwest::StatusCode) -> Self {
        AuthError::Network(format!(
            "{} returned HTTP {} ({})",
            context,
            status.as_u16(),
            url
        ))
    }

    /// Domain errors keep their kind when crossing `authenticate`; `Other` does not.
    pub fn is_domain(&self) -> bool {
        !matches!(self, AuthError::Other(_))
    }
}

/// Why a token could not be decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("expected 3 token segments, found {0}")]
    SegmentCount(usize),

    #[error("payload is not valid base64url: {0}")]
    Base64(String),

    #[error("payload is not a JSON claim object: {0}")]
    Payload(String),
}
