//! Scraped browser login.
//!
//! The target site has no token API, so the login pages are replayed in a
//! fixed order:
//!
//! ```text
//! LoginPage -> PasswordPage -> Submit -> (Redirect | direct 200)
//!           -> ErrorScan -> TokenExtract -> token | none
//! ```
//!
//! Every step fails on its own terms and nothing is retried here; retrying
//! is the caller's decision. If the site changes its login markup this
//! module is what breaks.

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{header, StatusCode};
use scraper::{Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use super::error::AuthError;
use super::models::{Credential, Token};
use crate::config::Config;
use crate::http::HttpSession;
use crate::utils::format::truncate;

const PASSWORD_PAGE_PATH: &str = "/u/login/password";
const SUBMIT_PATH: &str = "/u/login";

const STATE_FIELD: &str = "state";
const CSRF_FIELD: &str = "_csrf_token";

/// Element the site renders when it rejects a password.
const ERROR_BANNER_SELECTOR: &str = "#error-element-password, .ulp-input-error-message";

/// Maximum body length included in debug logs
const MAX_LOGGED_BODY: usize = 500;

/// Steps of the scraped login, used for log fields and error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStep {
    LoginPage,
    PasswordPage,
    Submit,
    Redirect,
    ErrorScan,
    TokenExtract,
}

impl LoginStep {
    pub fn describe(&self) -> &'static str {
        match self {
            LoginStep::LoginPage => "login page fetch",
            LoginStep::PasswordPage => "password page fetch",
            LoginStep::Submit => "credential submit",
            LoginStep::Redirect => "post-login redirect",
            LoginStep::ErrorScan => "error banner scan",
            LoginStep::TokenExtract => "token extraction",
        }
    }
}

impl fmt::Display for LoginStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Exchanges credentials for a bearer token using an HTTP session.
///
/// `Ok(None)` means the flow completed but no bearer cookie appeared.
#[async_trait]
pub trait LoginFlow: Send + Sync {
    async fn login(
        &self,
        http: &HttpSession,
        credential: &Credential,
    ) -> Result<Option<Token>, AuthError>;
}

/// Hidden form fields of the password page.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PasswordForm {
    state: String,
    csrf: String,
}

/// How the site answered the credential submit.
#[derive(Debug)]
enum Submission {
    Redirect(Url),
    Direct(String),
}

/// Production `LoginFlow` driving the site's login pages.
#[derive(Debug, Clone)]
pub struct ScrapingLogin {
    login_url: Url,
    cookie_names: Vec<String>,
}

impl ScrapingLogin {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self::from_parts(config.login_url()?, config.cookie_names.clone()))
    }

    pub fn from_parts(login_url: Url, cookie_names: Vec<String>) -> Self {
        Self {
            login_url,
            cookie_names,
        }
    }

    /// Step 1-2: load the login entry page and pick up the first state token.
    async fn fetch_login_page(&self, http: &HttpSession) -> Result<String, AuthError> {
        let step = LoginStep::LoginPage;
        let url = self.login_url.as_str();
        debug!(%step, url, "Fetching login page");

        let response = http
            .client()
            .get(self.login_url.clone())
            .send()
            .await
            .map_err(|e| AuthError::from_request(step.describe(), url, http.timeout_secs(), &e))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(AuthError::status(step.describe(), url, status));
        }

        let final_url = response.url().clone();
        let body = read_body(response, step, url, http.timeout_secs()).await?;

        let state = extract_state(&body)
            .or_else(|| query_param(&final_url, STATE_FIELD))
            .or_else(|| http.cookie(STATE_FIELD))
            .unwrap_or_else(|| {
                warn!(%step, "No state token found, continuing with an empty one");
                String::new()
            });
        Ok(state)
    }

    /// Step 3-4: load the password page and read its hidden form fields.
    async fn fetch_password_page(
        &self,
        http: &HttpSession,
        email: &str,
        state: &str,
    ) -> Result<PasswordForm, AuthError> {
        let step = LoginStep::PasswordPage;
        let url = join(http.auth_url(), PASSWORD_PAGE_PATH)?;
        debug!(%step, url = %url, "Fetching password page");

        let response = http
            .client()
            .get(url.clone())
            .query(&[("email", email), ("state", state)])
            .header(header::CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| {
                AuthError::from_request(step.describe(), url.as_str(), http.timeout_secs(), &e)
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(AuthError::status(step.describe(), url.as_str(), status));
        }

        let body = read_body(response, step, url.as_str(), http.timeout_secs()).await?;
        let form = PasswordForm {
            state: extract_state(&body).unwrap_or_else(|| state.to_string()),
            csrf: extract_csrf(&body).unwrap_or_default(),
        };
        if form.csrf.is_empty() {
            debug!(%step, "Password page has no CSRF token");
        }
        Ok(form)
    }

    /// Step 5-6: post the credentials without following the answer.
    async fn submit(
        &self,
        http: &HttpSession,
        credential: &Credential,
        form: &PasswordForm,
    ) -> Result<Submission, AuthError> {
        let step = LoginStep::Submit;
        let url = join(http.auth_url(), SUBMIT_PATH)?;
        debug!(%step, url = %url, "Submitting credentials");

        let response = http
            .no_redirect_client()
            .post(url.clone())
            .query(&[("state", form.state.as_str())])
            .form(&[
                ("email", credential.username.as_str()),
                ("password", credential.password.as_str()),
                ("state", form.state.as_str()),
                (CSRF_FIELD, form.csrf.as_str()),
                ("has_agreed", "true"),
            ])
            .send()
            .await
            .map_err(|e| {
                AuthError::from_request(step.describe(), url.as_str(), http.timeout_secs(), &e)
            })?;

        let status = response.status();
        match status {
            StatusCode::FOUND | StatusCode::SEE_OTHER => {
                let location = response
                    .headers()
                    .get(header::LOCATION)
                    .and_then(|value| value.to_str().ok())
                    .ok_or_else(|| {
                        AuthError::Authentication(format!(
                            "{} returned HTTP {} but is missing Location header",
                            step,
                            status.as_u16()
                        ))
                    })?;
                let target = response.url().join(location).map_err(|e| {
                    AuthError::Authentication(format!(
                        "{} redirected to unusable Location {:?}: {}",
                        step, location, e
                    ))
                })?;
                Ok(Submission::Redirect(target))
            }
            StatusCode::OK => {
                let body = read_body(response, step, url.as_str(), http.timeout_secs()).await?;
                Ok(Submission::Direct(body))
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                debug!(%step, status = status.as_u16(), body = %truncate(&body, MAX_LOGGED_BODY), "Submit rejected");
                Err(AuthError::InvalidCredentials(format!(
                    "Login failed: HTTP {}",
                    status.as_u16()
                )))
            }
        }
    }

    /// Step 6, redirect branch: follow the post-login redirect chain.
    async fn follow_redirect(&self, http: &HttpSession, target: Url) -> Result<String, AuthError> {
        let step = LoginStep::Redirect;
        debug!(%step, url = %target, "Following post-login redirect");

        let response = http.client().get(target.clone()).send().await.map_err(|e| {
            AuthError::from_request(step.describe(), target.as_str(), http.timeout_secs(), &e)
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(AuthError::InvalidCredentials(format!(
                "Login failed after redirect: HTTP {}",
                status.as_u16()
            )));
        }
        read_body(response, step, target.as_str(), http.timeout_secs()).await
    }

    /// Step 8: first configured bearer cookie present in the jar.
    pub fn extract_token(&self, http: &HttpSession) -> Option<Token> {
        extract_bearer(http, &self.cookie_names)
    }
}

#[async_trait]
impl LoginFlow for ScrapingLogin {
    async fn login(
        &self,
        http: &HttpSession,
        credential: &Credential,
    ) -> Result<Option<Token>, AuthError> {
        info!(username = %credential.username, "Starting scraped login");

        let state = self.fetch_login_page(http).await?;
        let form = self
            .fetch_password_page(http, &credential.username, &state)
            .await?;

        let body = match self.submit(http, credential, &form).await? {
            Submission::Redirect(target) => self.follow_redirect(http, target).await?,
            Submission::Direct(body) => body,
        };

        if has_error_banner(&body) {
            debug!(step = %LoginStep::ErrorScan, "Error banner present in final page");
            return Err(AuthError::InvalidCredentials(
                "Invalid username or password".to_string(),
            ));
        }

        let token = self.extract_token(http);
        if token.is_none() {
            warn!(
                step = %LoginStep::TokenExtract,
                wanted = ?self.cookie_names,
                present = ?http.cookie_names(),
                "No bearer cookie after login"
            );
        } else {
            info!("Scraped login succeeded");
        }
        Ok(token)
    }
}

async fn read_body(
    response: reqwest::Response,
    step: LoginStep,
    url: &str,
    timeout_secs: u64,
) -> Result<String, AuthError> {
    response
        .text()
        .await
        .map_err(|e| AuthError::from_request(step.describe(), url, timeout_secs, &e))
}

/// First cookie from `cookie_names` (priority order) that `http` holds.
pub fn extract_bearer(http: &HttpSession, cookie_names: &[String]) -> Option<Token> {
    let cookies = http.cookies();
    cookie_names.iter().find_map(|wanted| {
        cookies
            .iter()
            .find(|(name, value)| name == wanted && !value.is_empty())
            .map(|(name, value)| {
                debug!(step = %LoginStep::TokenExtract, cookie = %name, "Bearer cookie found");
                Token::new(value.clone())
            })
    })
}

fn join(base: &Url, path: &str) -> Result<Url, AuthError> {
    base.join(path)
        .map_err(|e| AuthError::Other(anyhow::anyhow!("Failed to build URL for {}: {}", path, e)))
}

fn query_param(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, v)| k == key && !v.is_empty())
        .map(|(_, v)| v.into_owned())
}

fn select_value(html: &str, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    let document = Html::parse_document(html);
    let value = document
        .select(&selector)
        .find_map(|el| el.value().attr("value"))
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    value
}

/// Value of the `<input>` whose id and name are both `state`.
pub fn extract_state(html: &str) -> Option<String> {
    select_value(html, r#"input[id="state"][name="state"]"#)
}

/// Value of the `<input name="_csrf_token">`.
pub fn extract_csrf(html: &str) -> Option<String> {
    select_value(html, r#"input[name="_csrf_token"]"#)
}

/// Whether the page carries the site's "wrong password" banner.
pub fn has_error_banner(html: &str) -> bool {
    let Ok(selector) = Selector::parse(ERROR_BANNER_SELECTOR) else {
        return false;
    };
    let found = Html::parse_document(html).select(&selector).next().is_some();
    found
}
