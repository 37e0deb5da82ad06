//! Configuration for the login flow and session lifecycle.
//!
//! Stored at `~/.config/sitelogin/config.json`; a missing file yields
//! defaults. A few fields can be overridden from the environment.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "sitelogin";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Request timeout in seconds.
/// 30s tolerates slow login pages while still failing fast enough to retry.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

const DEFAULT_EXPIRY_BUFFER_HOURS: i64 = 1;

const DEFAULT_LOGIN_PATH: &str = "/login";

/// Browser-like UA; some login pages refuse obvious bots.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

const ENV_WEB_ORIGIN: &str = "SITELOGIN_WEB_ORIGIN";
const ENV_TIMEOUT_SECS: &str = "SITELOGIN_TIMEOUT_SECS";
const ENV_USER_AGENT: &str = "SITELOGIN_USER_AGENT";

/// Which Session Store backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    #[default]
    Encrypted,
    Keyring,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Site origin serving the login entry page, e.g. `https://www.example.com`
    pub web_origin: String,
    /// Identity origin; derived from `web_origin` when unset
    pub auth_origin: Option<String>,
    pub login_path: String,
    /// Bearer cookie names, highest priority first
    pub cookie_names: Vec<String>,
    pub timeout_secs: u64,
    pub expiry_buffer_hours: i64,
    pub user_agent: Option<String>,
    pub store: StoreBackend,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            web_origin: String::new(),
            auth_origin: None,
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            cookie_names: vec!["access_token".to_string(), "auth_token".to_string()],
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            expiry_buffer_hours: DEFAULT_EXPIRY_BUFFER_HOURS,
            user_agent: None,
            store: StoreBackend::default(),
        }
    }
}

impl Config {
    /// Minimal valid config for `web_origin`.
    pub fn for_origin(web_origin: &str) -> Self {
        Self {
            web_origin: web_origin.to_string(),
            ..Self::default()
        }
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Overlay environment variables onto the loaded values.
    pub fn apply_env(&mut self) {
        if let Ok(origin) = std::env::var(ENV_WEB_ORIGIN) {
            self.web_origin = origin;
        }
        if let Some(secs) = std::env::var(ENV_TIMEOUT_SECS)
            .ok()
            .and_then(|raw| parse_timeout(&raw))
        {
            self.timeout_secs = secs;
        }
        if let Ok(agent) = std::env::var(ENV_USER_AGENT) {
            self.user_agent = Some(agent);
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.web_url().context("Invalid web origin")?;
        self.auth_url().context("Invalid auth origin")?;
        if self.cookie_names.iter().all(|name| name.trim().is_empty()) {
            bail!("At least one bearer cookie name is required");
        }
        if self.timeout_secs == 0 {
            bail!("Request timeout must be greater than zero");
        }
        if self.expiry_buffer_hours < 0 {
            bail!("Expiry buffer must not be negative");
        }
        Ok(())
    }

    pub fn web_url(&self) -> Result<Url> {
        if self.web_origin.trim().is_empty() {
            bail!("web_origin is not configured (set it in config.json or {})", ENV_WEB_ORIGIN);
        }
        let url = Url::parse(self.web_origin.trim())?;
        if url.host_str().is_none() {
            bail!("web_origin has no host: {}", self.web_origin);
        }
        Ok(url)
    }

    /// Explicit auth origin, or the `auth.` sibling of the web origin's host.
    pub fn auth_url(&self) -> Result<Url> {
        if let Some(ref origin) = self.auth_origin {
            return Ok(Url::parse(origin.trim())?);
        }

        let web = self.web_url()?;
        let host = web
            .host_str()
            .ok_or_else(|| anyhow!("web_origin has no host"))?;
        let base = host.strip_prefix("www.").unwrap_or(host);

        let mut auth = web.clone();
        auth.set_host(Some(&format!("auth.{}", base)))?;
        auth.set_path("/");
        auth.set_query(None);
        Ok(auth)
    }

    pub fn login_url(&self) -> Result<Url> {
        Ok(self.web_url()?.join(&self.login_path)?)
    }

    pub fn user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory for the persisted cookie snapshot and the encrypted store.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}

/// Timeout override from the environment; unparsable values are ignored.
fn parse_timeout(raw: &str) -> Option<u64> {
    match raw.trim().parse() {
        Ok(secs) => Some(secs),
        Err(e) => {
            warn!(value = %raw, error = %e, "Ignoring unparsable {}", ENV_TIMEOUT_SECS);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timeout() {
        assert_eq!(parse_timeout("45"), Some(45));
        assert_eq!(parse_timeout(" 10\n"), Some(10));
        assert_eq!(parse_timeout("30s"), None);
        assert_eq!(parse_timeout("-1"), None);
        assert_eq!(parse_timeout(""), None);
    }

    #[test]
    fn test_derived_auth_origin() {
        let config = Config::for_origin("https://www.example.com");
        assert_eq!(config.auth_url().unwrap().as_str(), "https://auth.example.com/");

        let bare = Config::for_origin("https://example.org/some/page?x=1");
        assert_eq!(bare.auth_url().unwrap().as_str(), "https://auth.example.org/");
    }

    #[test]
    fn test_explicit_auth_origin_wins() {
        let config = Config {
            auth_origin: Some("http://127.0.0.1:9999".to_string()),
            ..Config::for_origin("http://127.0.0.1:8888")
        };
        assert_eq!(config.auth_url().unwrap().as_str(), "http://127.0.0.1:9999/");
    }

    #[test]
    fn test_login_url() {
        let config = Config::for_origin("https://www.example.com");
        assert_eq!(config.login_url().unwrap().as_str(), "https://www.example.com/login");
    }

    #[test]
    fn test_validate() {
        assert!(Config::for_origin("https://www.example.com").validate().is_ok());
        assert!(Config::default().validate().is_err());
        assert!(Config::for_origin("not a url").validate().is_err());

        let mut config = Config::for_origin("https://www.example.com");
        config.cookie_names.clear();
        assert!(config.validate().is_err());

        let mut config = Config::for_origin("https://www.example.com");
        config.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::for_origin("https://www.example.com");
        config.expiry_buffer_hours = -1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"web_origin": "https://www.example.com", "store": "keyring"}"#)
                .unwrap();
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.expiry_buffer_hours, 1);
        assert_eq!(config.store, StoreBackend::Keyring);
        assert_eq!(config.user_agent(), DEFAULT_USER_AGENT);
    }
}
