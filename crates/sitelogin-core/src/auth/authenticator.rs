//! Authentication Core: token checks, scraped login, refresh, logout.
//!
//! ```text
//! NoSession <-> Valid <-> ExpiringSoon -> Refreshing -> Valid | reauth required
//! logout -> NoSession
//! ```
//!
//! Methods that change session state take `&mut self`; callers sharing an
//! `Authenticator` across tasks wrap it in a mutex. The HTTP session is never
//! mutated in place: login, restore and logout build a new `HttpSession` and
//! swap the `Arc`, so a consumer holding the old one keeps a coherent value.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, info, warn};

use super::details::{SessionDetails, SessionStatus};
use super::error::AuthError;
use super::jwt;
use super::login::{extract_bearer, LoginFlow, ScrapingLogin};
use super::models::{AuthResult, Credential, Token};
use super::snapshot::{CookieSnapshot, SnapshotFile};
use super::store::{stored_credential, SessionStore};
use crate::config::Config;
use crate::http::HttpSession;

const SECS_PER_HOUR: i64 = 3600;

pub struct Authenticator<F: LoginFlow = ScrapingLogin> {
    config: Config,
    flow: F,
    store: Box<dyn SessionStore>,
    http: Arc<HttpSession>,
    snapshot: Option<SnapshotFile>,
}

impl Authenticator<ScrapingLogin> {
    /// Core driving the site's login pages.
    pub fn new(config: Config, store: Box<dyn SessionStore>) -> Result<Self> {
        config.validate()?;
        let flow = ScrapingLogin::new(&config)?;
        Self::with_flow(config, flow, store)
    }
}

impl<F: LoginFlow> Authenticator<F> {
    /// Core with a custom login flow.
    pub fn with_flow(config: Config, flow: F, store: Box<dyn SessionStore>) -> Result<Self> {
        let http = Arc::new(HttpSession::new(&config)?);
        Ok(Self {
            config,
            flow,
            store,
            http,
            snapshot: None,
        })
    }

    /// Persist the cookie jar under `cache_dir` after each login.
    pub fn with_snapshot_dir(mut self, cache_dir: PathBuf) -> Self {
        self.snapshot = Some(SnapshotFile::new(cache_dir));
        self
    }

    /// Live HTTP session for authenticated calls.
    pub fn http_session(&self) -> Arc<HttpSession> {
        Arc::clone(&self.http)
    }

    pub fn store(&self) -> &dyn SessionStore {
        self.store.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn buffer_secs(&self) -> i64 {
        self.store.expiry_buffer_hours().max(0) * SECS_PER_HOUR
    }

    /// Reload the saved cookie jar into a fresh session. If the store has no
    /// token but a bearer cookie comes back, adopt it. A valid stored token is
    /// installed as the bearer whether or not a snapshot exists. Returns
    /// whether a token is now available.
    pub fn restore(&mut self) -> Result<bool> {
        let snapshot = match self.snapshot {
            Some(ref file) => file.load()?,
            None => None,
        };

        let fresh = match snapshot {
            Some(snapshot) => {
                let fresh = HttpSession::new(&self.config)?;
                let restored = snapshot.restore_into(&fresh);
                debug!(restored, saved_at = %snapshot.saved_at, "Session snapshot restored");
                Some(fresh)
            }
            None => {
                debug!("No session snapshot to restore");
                None
            }
        };

        let token = match (self.store.get_token(), &fresh) {
            (Some(token), _) => Some(token),
            (None, Some(fresh)) => {
                let adopted = extract_bearer(fresh, &self.config.cookie_names);
                if let Some(ref token) = adopted {
                    info!("Adopting bearer cookie from saved session");
                    self.store.save_token(token)?;
                }
                adopted
            }
            (None, None) => None,
        };

        let base = fresh.unwrap_or_else(|| (*self.http).clone());
        self.http = match token {
            Some(ref token) if jwt::is_valid(token.as_str()) => Arc::new(base.authorized(token)?),
            _ => Arc::new(base),
        };
        Ok(token.is_some())
    }

    /// Log in with `username`/`password` unless a valid token is already stored.
    ///
    /// Failures the caller only needs to display come back as an unsuccessful
    /// `AuthResult`; errors of the authentication taxonomy are returned as `Err`
    /// so their kind survives.
    pub async fn authenticate(
        &mut self,
        username: &str,
        password: &str,
    ) -> Result<AuthResult, AuthError> {
        if let Some(token) = self.store.get_token() {
            if jwt::is_valid(token.as_str()) {
                debug!("Stored token still valid, skipping login");
                if self.http.bearer() != Some(&token) {
                    if let Err(e) = self.install_bearer(&token) {
                        return Ok(AuthResult::failure(e.to_string()));
                    }
                }
                return Ok(AuthResult::success(token));
            }
            debug!("Stored token invalid or expired, logging in");
        }

        self.login_and_persist(Credential::new(username, password))
            .await
    }

    /// Run the login flow on a fresh session; swap it in and persist on success.
    async fn login_and_persist(&mut self, credential: Credential) -> Result<AuthResult, AuthError> {
        let fresh = match HttpSession::new(&self.config) {
            Ok(http) => http,
            Err(e) => return Ok(AuthResult::failure(format!("{:#}", e))),
        };

        let token = match self.flow.login(&fresh, &credential).await {
            Ok(Some(token)) => token,
            Ok(None) => {
                return Ok(AuthResult::failure(
                    "Login completed but no authentication cookie was found",
                ))
            }
            Err(e) if e.is_domain() => {
                warn!(error = %e, "Login failed");
                return Err(e);
            }
            Err(e) => {
                warn!(error = %e, "Login failed unexpectedly");
                return Ok(AuthResult::failure(format!("{:#}", e)));
            }
        };

        let authorized = match fresh.authorized(&token) {
            Ok(http) => http,
            Err(e) => return Ok(AuthResult::failure(format!("{:#}", e))),
        };
        if let Err(e) = self.persist(&token, &credential, &authorized) {
            warn!(error = %e, "Failed to persist session");
            return Ok(AuthResult::failure(format!("Failed to persist session: {:#}", e)));
        }

        self.http = Arc::new(authorized);
        info!(username = %credential.username, "Authenticated");
        Ok(AuthResult::success(token))
    }

    fn persist(&self, token: &Token, credential: &Credential, http: &HttpSession) -> Result<()> {
        self.store.save_token(token)?;
        self.store
            .save_credentials(&credential.username, &credential.password)?;
        if let Some(ref file) = self.snapshot {
            // The cookie blob is a convenience; the store already has the token
            if let Err(e) = file.save(&CookieSnapshot::capture(http)) {
                warn!(error = %e, "Failed to save session snapshot");
            }
        }
        Ok(())
    }

    fn install_bearer(&mut self, token: &Token) -> Result<()> {
        self.http = Arc::new(self.http.authorized(token)?);
        Ok(())
    }

    /// Whether a stored token exists and has not expired.
    pub fn validate_session(&self) -> bool {
        self.store
            .get_token()
            .map(|token| jwt::is_valid(token.as_str()))
            .unwrap_or(false)
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus::evaluate(
            self.store.get_token().as_ref(),
            self.buffer_secs(),
            Utc::now().timestamp(),
        )
    }

    /// Make sure a usable token exists, refreshing with stored credentials
    /// when it is missing or inside the expiry buffer. No network traffic
    /// when the token is comfortably valid.
    pub async fn ensure_valid_session(&mut self) -> Result<(), AuthError> {
        let Some(token) = self.store.get_token() else {
            let credential = stored_credential(self.store.as_ref()).ok_or_else(|| {
                AuthError::AuthenticationRequired(
                    "No authentication token and no stored credentials".to_string(),
                )
            })?;
            info!("No stored token, re-authenticating with stored credentials");
            return self
                .refresh(credential, "Automatic re-authentication failed")
                .await;
        };

        let claims = jwt::decode(token.as_str()).map_err(|e| {
            warn!(error = %e, "Stored token cannot be decoded");
            AuthError::AuthenticationRequired("Invalid authentication token".to_string())
        })?;

        // A token without exp is treated as already expired
        let exp = claims.exp.unwrap_or(0);
        let now = Utc::now().timestamp();
        if now + self.buffer_secs() < exp {
            debug!(seconds_left = exp - now, "Session valid");
            if self.http.bearer() != Some(&token) {
                self.install_bearer(&token)?;
            }
            return Ok(());
        }

        let credential = stored_credential(self.store.as_ref()).ok_or_else(|| {
            AuthError::AuthenticationRequired(
                "Token expiring soon and no stored credentials for refresh".to_string(),
            )
        })?;
        info!(seconds_left = exp - now, "Token expiring soon, refreshing");
        self.refresh(credential, "Automatic refresh failed").await
    }

    async fn refresh(&mut self, credential: Credential, context: &str) -> Result<(), AuthError> {
        match self.login_and_persist(credential).await {
            Ok(result) if result.success => Ok(()),
            Ok(result) => Err(AuthError::AuthenticationRequired(format!(
                "{}: {}",
                context,
                result
                    .error_message
                    .unwrap_or_else(|| "unknown error".to_string())
            ))),
            Err(e) => Err(AuthError::AuthenticationRequired(format!("{}: {}", context, e))),
        }
    }

    /// Current token for an outgoing request, distinguishing "never logged in"
    /// from "logged in but expired".
    pub fn bearer_token(&self) -> Result<Token, AuthError> {
        let token = self.store.get_token().ok_or_else(|| {
            AuthError::AuthenticationRequired("Not logged in".to_string())
        })?;
        match SessionStatus::evaluate(Some(&token), 0, Utc::now().timestamp()) {
            SessionStatus::Valid | SessionStatus::ExpiringSoon => Ok(token),
            SessionStatus::Expired => Err(AuthError::SessionExpired(
                "Authentication token has expired".to_string(),
            )),
            SessionStatus::Invalid | SessionStatus::NoSession => Err(
                AuthError::AuthenticationRequired("Invalid authentication token".to_string()),
            ),
        }
    }

    /// Drop the token and start over with an empty cookie jar. Stored
    /// credentials survive so the next `ensure_valid_session` can log in
    /// silently. Never fails; teardown problems are logged.
    pub fn logout(&mut self) {
        if let Err(e) = self.store.clear_token() {
            warn!(error = %e, "Failed to clear stored token during logout");
        }
        if let Some(ref file) = self.snapshot {
            if let Err(e) = file.clear() {
                warn!(error = %e, "Failed to remove session snapshot during logout");
            }
        }
        match HttpSession::new(&self.config) {
            Ok(fresh) => self.http = Arc::new(fresh),
            Err(e) => warn!(error = %e, "Failed to build fresh HTTP session during logout"),
        }
        info!("Logged out");
    }

    /// Log out, then log straight back in with the stored credentials.
    pub async fn force_reauthenticate(&mut self) -> Result<AuthResult, AuthError> {
        self.logout();
        let credential = stored_credential(self.store.as_ref()).ok_or_else(|| {
            AuthError::AuthenticationRequired(
                "No stored credentials for re-authentication".to_string(),
            )
        })?;
        self.login_and_persist(credential).await
    }

    /// Explicitly remove stored credentials. The token is left alone.
    pub fn forget_credentials(&mut self) -> Result<()> {
        self.store.clear_credentials()
    }

    /// Diagnostic snapshot of the session; never fails, never shows the token.
    pub fn get_session_details(&self) -> SessionDetails {
        let (username, password) = self.store.get_credentials();
        let has_credentials = username.is_some() && password.is_some();
        SessionDetails::collect(
            self.store.get_token().as_ref(),
            username,
            self.http.cookie_names(),
            has_credentials,
            self.buffer_secs(),
            Utc::now(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::MemoryStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Outcome = Box<dyn Fn() -> Result<Option<Token>, AuthError> + Send + Sync>;

    /// Login flow that counts calls and returns a scripted outcome.
    struct FakeFlow {
        calls: Arc<AtomicUsize>,
        outcome: Outcome,
    }

    #[async_trait]
    impl LoginFlow for FakeFlow {
        async fn login(
            &self,
            http: &HttpSession,
            _credential: &Credential,
        ) -> Result<Option<Token>, AuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = (self.outcome)();
            if let Ok(Some(ref token)) = result {
                let web = http.web_url().clone();
                http.add_cookie("access_token", token.as_str(), &web);
            }
            result
        }
    }

    fn token_expiring_in(secs: i64) -> Token {
        let now = Utc::now().timestamp();
        Token::new(jwt::encode_unsigned(&json!({
            "exp": now + secs,
            "iat": now,
            "sub": "auth0|42",
            "email": "scout@example.com"
        })))
    }

    fn authenticator(
        store: MemoryStore,
        outcome: Outcome,
    ) -> (Authenticator<FakeFlow>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let flow = FakeFlow {
            calls: Arc::clone(&calls),
            outcome,
        };
        let auth = Authenticator::with_flow(
            Config::for_origin("https://www.example.com"),
            flow,
            Box::new(store),
        )
        .unwrap();
        (auth, calls)
    }

    fn fresh_token_outcome() -> Outcome {
        Box::new(|| Ok(Some(token_expiring_in(8 * 3600))))
    }

    fn creds(auth: &Authenticator<FakeFlow>) -> (Option<String>, Option<String>) {
        auth.store().get_credentials()
    }

    #[tokio::test]
    async fn test_authenticate_fast_path_skips_login_and_credentials() {
        let store = MemoryStore::new();
        let token = token_expiring_in(2 * 3600);
        store.save_token(&token).unwrap();
        let (mut auth, calls) = authenticator(store, fresh_token_outcome());

        let result = auth.authenticate("scout@example.com", "pw").await.unwrap();
        assert!(result.success);
        assert_eq!(result.token, Some(token.clone()));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(creds(&auth), (None, None));
        assert_eq!(auth.http_session().bearer(), Some(&token));
    }

    #[tokio::test]
    async fn test_authenticate_logs_in_and_persists() {
        let (mut auth, calls) = authenticator(MemoryStore::new(), fresh_token_outcome());

        let result = auth.authenticate("scout@example.com", "pw").await.unwrap();
        assert!(result.success);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(auth.store().get_token(), result.token);
        assert_eq!(
            creds(&auth),
            (Some("scout@example.com".to_string()), Some("pw".to_string()))
        );
        assert!(auth.validate_session());
        assert_eq!(auth.http_session().bearer(), result.token.as_ref());
        assert_eq!(auth.http_session().cookie_names(), vec!["access_token"]);
    }

    #[tokio::test]
    async fn test_authenticate_replaces_expired_token() {
        let store = MemoryStore::new();
        store.save_token(&token_expiring_in(-60)).unwrap();
        let (mut auth, calls) = authenticator(store, fresh_token_outcome());

        assert!(auth.authenticate("u", "p").await.unwrap().success);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(auth.validate_session());
    }

    #[tokio::test]
    async fn test_authenticate_without_cookie_is_a_failed_result() {
        let (mut auth, _) = authenticator(MemoryStore::new(), Box::new(|| Ok(None)));

        let result = auth.authenticate("u", "p").await.unwrap();
        assert!(!result.success);
        assert!(result.error_message.unwrap().contains("no authentication cookie"));
        assert_eq!(auth.store().get_token(), None);
        assert_eq!(creds(&auth), (None, None));
    }

    #[tokio::test]
    async fn test_authenticate_propagates_domain_errors() {
        let (mut auth, _) = authenticator(
            MemoryStore::new(),
            Box::new(|| {
                Err(AuthError::InvalidCredentials(
                    "Invalid username or password".to_string(),
                ))
            }),
        );

        let err = auth.authenticate("u", "bad").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials(_)));
    }

    #[tokio::test]
    async fn test_authenticate_converts_other_errors() {
        let (mut auth, _) = authenticator(
            MemoryStore::new(),
            Box::new(|| Err(AuthError::Other(anyhow::anyhow!("socket exploded")))),
        );

        let result = auth.authenticate("u", "p").await.unwrap();
        assert!(!result.success);
        assert!(result.error_message.unwrap().contains("socket exploded"));
    }

    #[test]
    fn test_validate_session() {
        let (auth, _) = authenticator(MemoryStore::new(), fresh_token_outcome());
        assert!(!auth.validate_session());

        auth.store().save_token(&Token::new("not-a-jwt")).unwrap();
        assert!(!auth.validate_session());

        auth.store().save_token(&token_expiring_in(-1)).unwrap();
        assert!(!auth.validate_session());

        auth.store().save_token(&token_expiring_in(60)).unwrap();
        assert!(auth.validate_session());
    }

    #[tokio::test]
    async fn test_ensure_is_noop_outside_buffer() {
        let store = MemoryStore::new();
        let token = token_expiring_in(2 * 3600);
        store.save_token(&token).unwrap();
        let (mut auth, calls) = authenticator(store, fresh_token_outcome());

        auth.ensure_valid_session().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(auth.store().get_token(), Some(token));
    }

    #[tokio::test]
    async fn test_restart_without_snapshot_installs_bearer() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let token = token_expiring_in(8 * 3600);
        store.save_token(&token).unwrap();
        let (auth, calls) = authenticator(store, fresh_token_outcome());
        let mut auth = auth.with_snapshot_dir(dir.path().to_path_buf());

        assert!(auth.restore().unwrap());
        assert_eq!(auth.http_session().bearer(), Some(&token));
        auth.ensure_valid_session().await.unwrap();
        assert_eq!(auth.http_session().bearer(), Some(&token));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ensure_installs_bearer_for_stored_token() {
        let store = MemoryStore::new();
        let token = token_expiring_in(8 * 3600);
        store.save_token(&token).unwrap();
        let (mut auth, calls) = authenticator(store, fresh_token_outcome());
        assert!(auth.http_session().bearer().is_none());

        auth.ensure_valid_session().await.unwrap();
        assert_eq!(auth.http_session().bearer(), Some(&token));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ensure_refreshes_token_without_exp() {
        let store = MemoryStore::new();
        let no_exp = Token::new(jwt::encode_unsigned(&json!({ "sub": "auth0|42" })));
        store.save_token(&no_exp).unwrap();
        store.save_credentials("u", "p").unwrap();
        let (mut auth, calls) = authenticator(store, fresh_token_outcome());

        auth.ensure_valid_session().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_ne!(auth.store().get_token(), Some(no_exp));
        assert!(auth.validate_session());
    }

    #[tokio::test]
    async fn test_ensure_token_without_exp_and_no_credentials() {
        let store = MemoryStore::new();
        store
            .save_token(&Token::new(jwt::encode_unsigned(&json!({ "sub": "auth0|42" }))))
            .unwrap();
        let (mut auth, calls) = authenticator(store, fresh_token_outcome());

        let err = auth.ensure_valid_session().await.unwrap_err();
        assert!(matches!(err, AuthError::AuthenticationRequired(_)));
        assert!(err.to_string().contains("no stored credentials for refresh"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ensure_expiring_without_credentials() {
        let store = MemoryStore::new();
        store.save_token(&token_expiring_in(30 * 60)).unwrap();
        let (mut auth, calls) = authenticator(store, fresh_token_outcome());

        let err = auth.ensure_valid_session().await.unwrap_err();
        assert!(matches!(err, AuthError::AuthenticationRequired(_)));
        assert!(err.to_string().contains("no stored credentials for refresh"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ensure_refreshes_expiring_token() {
        let store = MemoryStore::new();
        let old = token_expiring_in(30 * 60);
        store.save_token(&old).unwrap();
        store.save_credentials("u", "p").unwrap();
        let (mut auth, calls) = authenticator(store, fresh_token_outcome());

        auth.ensure_valid_session().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let new = auth.store().get_token().unwrap();
        assert_ne!(new, old);
        assert_eq!(auth.status(), SessionStatus::Valid);
    }

    #[tokio::test]
    async fn test_ensure_refresh_failure() {
        let store = MemoryStore::new();
        store.save_token(&token_expiring_in(30 * 60)).unwrap();
        store.save_credentials("u", "p").unwrap();
        let (mut auth, calls) = authenticator(
            store,
            Box::new(|| Err(AuthError::Network("timeout after 10s".to_string()))),
        );

        let err = auth.ensure_valid_session().await.unwrap_err();
        assert!(matches!(err, AuthError::AuthenticationRequired(_)));
        assert!(err.to_string().contains("Automatic refresh failed"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ensure_refresh_without_cookie_fails() {
        let store = MemoryStore::new();
        store.save_token(&token_expiring_in(-10)).unwrap();
        store.save_credentials("u", "p").unwrap();
        let (mut auth, _) = authenticator(store, Box::new(|| Ok(None)));

        let err = auth.ensure_valid_session().await.unwrap_err();
        assert!(err.to_string().contains("Automatic refresh failed"));
    }

    #[tokio::test]
    async fn test_ensure_without_token() {
        let (mut auth, calls) = authenticator(MemoryStore::new(), fresh_token_outcome());
        let err = auth.ensure_valid_session().await.unwrap_err();
        assert!(matches!(err, AuthError::AuthenticationRequired(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        auth.store().save_credentials("u", "p").unwrap();
        auth.ensure_valid_session().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(auth.validate_session());
    }

    #[tokio::test]
    async fn test_ensure_with_undecodable_token() {
        let store = MemoryStore::new();
        store.save_token(&Token::new("garbage")).unwrap();
        store.save_credentials("u", "p").unwrap();
        let (mut auth, calls) = authenticator(store, fresh_token_outcome());

        let err = auth.ensure_valid_session().await.unwrap_err();
        assert!(err.to_string().contains("Invalid authentication token"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_logout_keeps_credentials_and_swaps_session() {
        let (mut auth, _) = authenticator(MemoryStore::new(), fresh_token_outcome());
        auth.authenticate("u", "p").await.unwrap();
        let before = auth.http_session();
        let creds_before = creds(&auth);

        auth.logout();
        assert_eq!(auth.store().get_token(), None);
        assert_eq!(creds(&auth), creds_before);
        let after = auth.http_session();
        assert!(!Arc::ptr_eq(&before, &after));
        assert!(after.cookies().is_empty());
        assert!(after.bearer().is_none());
        // The old value is untouched for anyone still holding it
        assert_eq!(before.cookie_names(), vec!["access_token"]);

        // Logging out twice is harmless
        auth.logout();
        assert_eq!(auth.status(), SessionStatus::NoSession);
    }

    #[tokio::test]
    async fn test_force_reauthenticate() {
        let (mut auth, calls) = authenticator(MemoryStore::new(), fresh_token_outcome());
        let err = auth.force_reauthenticate().await.unwrap_err();
        assert!(matches!(err, AuthError::AuthenticationRequired(_)));

        auth.authenticate("u", "p").await.unwrap();
        let result = auth.force_reauthenticate().await.unwrap();
        assert!(result.success);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_forget_credentials_leaves_token() {
        let (mut auth, _) = authenticator(MemoryStore::new(), fresh_token_outcome());
        auth.authenticate("u", "p").await.unwrap();
        auth.forget_credentials().unwrap();
        assert_eq!(creds(&auth), (None, None));
        assert!(auth.validate_session());
    }

    #[test]
    fn test_bearer_token_kinds() {
        let (auth, _) = authenticator(MemoryStore::new(), fresh_token_outcome());
        assert!(matches!(
            auth.bearer_token(),
            Err(AuthError::AuthenticationRequired(_))
        ));

        auth.store().save_token(&token_expiring_in(-5)).unwrap();
        assert!(matches!(auth.bearer_token(), Err(AuthError::SessionExpired(_))));

        let token = token_expiring_in(600);
        auth.store().save_token(&token).unwrap();
        assert_eq!(auth.bearer_token().unwrap(), token);
    }

    #[tokio::test]
    async fn test_session_details() {
        let (mut auth, _) = authenticator(MemoryStore::new(), fresh_token_outcome());
        let empty = auth.get_session_details();
        assert_eq!(empty.status, SessionStatus::NoSession);
        assert!(!empty.has_stored_credentials);

        let token = auth.authenticate("u", "p").await.unwrap().token.unwrap();
        let details = auth.get_session_details();
        assert_eq!(details.status, SessionStatus::Valid);
        assert_eq!(details.login.as_deref(), Some("scout@example.com"));
        assert_eq!(details.account_id.as_deref(), Some("auth0|42"));
        assert_eq!(details.cookie_names, vec!["access_token"]);
        assert!(details.has_stored_credentials);
        assert!(!details.summary().contains(token.as_str()));
    }

    #[tokio::test]
    async fn test_snapshot_restore_adopts_cookie() {
        let dir = tempfile::tempdir().unwrap();
        let (auth, _) = authenticator(MemoryStore::new(), fresh_token_outcome());
        let mut auth = auth.with_snapshot_dir(dir.path().to_path_buf());
        let token = auth.authenticate("u", "p").await.unwrap().token.unwrap();

        // New process: empty token store, same cache dir
        let store = MemoryStore::new();
        store.save_credentials("u", "p").unwrap();
        let (restarted, calls) = authenticator(store, fresh_token_outcome());
        let mut restarted = restarted.with_snapshot_dir(dir.path().to_path_buf());

        assert!(restarted.restore().unwrap());
        assert_eq!(restarted.store().get_token(), Some(token.clone()));
        assert_eq!(restarted.http_session().bearer(), Some(&token));
        restarted.ensure_valid_session().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        // Logout removes the snapshot
        restarted.logout();
        let (again, _) = authenticator(MemoryStore::new(), fresh_token_outcome());
        let mut again = again.with_snapshot_dir(dir.path().to_path_buf());
        assert!(!again.restore().unwrap());
    }
}
