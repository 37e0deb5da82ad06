use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::{header, redirect, Client};
use url::Url;

use crate::auth::models::Token;
use crate::config::Config;

/// HTTP client pair over one shared cookie jar.
///
/// `client` follows redirects like a browser; `no_redirect` is for the
/// credential submit, whose redirect has to be inspected. Values are never
/// mutated after construction apart from the jar itself; a new bearer or a
/// fresh jar means a new `HttpSession`.
/// Clone is cheap - reqwest::Client and the jar are reference counted.
#[derive(Clone)]
pub struct HttpSession {
    client: Client,
    no_redirect: Client,
    jar: Arc<Jar>,
    web_url: Url,
    auth_url: Url,
    timeout_secs: u64,
    user_agent: String,
    bearer: Option<Token>,
}

impl HttpSession {
    /// Fresh session with an empty cookie jar.
    pub fn new(config: &Config) -> Result<Self> {
        Self::build(
            Arc::new(Jar::default()),
            config.web_url()?,
            config.auth_url()?,
            config.timeout_secs,
            config.user_agent().to_string(),
            None,
        )
    }

    /// New session sharing this one's cookie jar, sending `token` as bearer.
    pub fn authorized(&self, token: &Token) -> Result<Self> {
        Self::build(
            Arc::clone(&self.jar),
            self.web_url.clone(),
            self.auth_url.clone(),
            self.timeout_secs,
            self.user_agent.clone(),
            Some(token.clone()),
        )
    }

    fn build(
        jar: Arc<Jar>,
        web_url: Url,
        auth_url: Url,
        timeout_secs: u64,
        user_agent: String,
        bearer: Option<Token>,
    ) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref token) = bearer {
            let mut value = header::HeaderValue::from_str(&format!("Bearer {}", token.as_str()))
                .context("Bearer token is not a valid header value")?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }

        let builder = || {
            Client::builder()
                .cookie_provider(Arc::clone(&jar))
                .timeout(Duration::from_secs(timeout_secs))
                .user_agent(user_agent.as_str())
                .default_headers(headers.clone())
        };

        let client = builder().build().context("Failed to build HTTP client")?;
        let no_redirect = builder()
            .redirect(redirect::Policy::none())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            no_redirect,
            jar,
            web_url,
            auth_url,
            timeout_secs,
            user_agent,
            bearer,
        })
    }

    /// Redirect-following client; carries the bearer header once authorized.
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub(crate) fn no_redirect_client(&self) -> &Client {
        &self.no_redirect
    }

    pub fn web_url(&self) -> &Url {
        &self.web_url
    }

    pub fn auth_url(&self) -> &Url {
        &self.auth_url
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    pub fn bearer(&self) -> Option<&Token> {
        self.bearer.as_ref()
    }

    /// Cookies the jar would send to `url`, in jar order.
    pub fn cookies_for(&self, url: &Url) -> Vec<(String, String)> {
        let Some(value) = self.jar.cookies(url) else {
            return Vec::new();
        };
        let Ok(header) = value.to_str() else {
            return Vec::new();
        };
        header
            .split(';')
            .filter_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                Some((name.to_string(), value.to_string()))
            })
            .collect()
    }

    /// Cookies for the web origin followed by auth-origin cookies not already seen.
    pub fn cookies(&self) -> Vec<(String, String)> {
        let mut cookies = self.cookies_for(&self.web_url);
        for (name, value) in self.cookies_for(&self.auth_url) {
            if !cookies.iter().any(|(n, _)| *n == name) {
                cookies.push((name, value));
            }
        }
        cookies
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        self.cookies()
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn cookie_names(&self) -> Vec<String> {
        self.cookies().into_iter().map(|(name, _)| name).collect()
    }

    /// Put a host-only cookie for `url` into the jar.
    pub fn add_cookie(&self, name: &str, value: &str, url: &Url) {
        self.jar
            .add_cookie_str(&format!("{}={}; Path=/", name, value), url);
    }
}
