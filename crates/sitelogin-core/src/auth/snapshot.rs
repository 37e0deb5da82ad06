//! Cookie jar snapshot persisted across restarts.
//!
//! The file holds bearer cookies in plaintext. On unix it is written with
//! mode 0600.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::http::HttpSession;

/// Snapshot file name in cache directory
const SNAPSHOT_FILE: &str = "session.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedCookie {
    pub name: String,
    pub value: String,
    /// Origin the cookie was sent to, e.g. `https://www.example.com/`
    pub origin: String,
}

/// Cookie jar contents sufficient to rebuild a bearer token after restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CookieSnapshot {
    pub cookies: Vec<SavedCookie>,
    pub saved_at: DateTime<Utc>,
}

impl CookieSnapshot {
    /// Capture the cookies `http` holds for its web and auth origins.
    pub fn capture(http: &HttpSession) -> Self {
        let mut cookies = Vec::new();
        for origin in [http.web_url(), http.auth_url()] {
            for (name, value) in http.cookies_for(origin) {
                cookies.push(SavedCookie {
                    name,
                    value,
                    origin: origin.to_string(),
                });
            }
        }
        Self {
            cookies,
            saved_at: Utc::now(),
        }
    }

    /// Replay the saved cookies into `http`'s jar. Returns how many were restored.
    pub fn restore_into(&self, http: &HttpSession) -> usize {
        let mut restored = 0;
        for cookie in &self.cookies {
            match Url::parse(&cookie.origin) {
                Ok(url) => {
                    http.add_cookie(&cookie.name, &cookie.value, &url);
                    restored += 1;
                }
                Err(e) => {
                    tracing::warn!(cookie = %cookie.name, error = %e, "Skipping cookie with bad origin");
                }
            }
        }
        restored
    }
}

/// The snapshot file on disk.
pub struct SnapshotFile {
    cache_dir: PathBuf,
}

impl SnapshotFile {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Load snapshot from disk, if one was saved
    pub fn load(&self) -> Result<Option<CookieSnapshot>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)
            .context("Failed to read session snapshot")?;
        let snapshot = serde_json::from_str(&contents)
            .context("Failed to parse session snapshot")?;
        Ok(Some(snapshot))
    }

    pub fn save(&self, snapshot: &CookieSnapshot) -> Result<()> {
        let path = self.path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(snapshot)?;
        std::fs::write(&path, contents).context("Failed to write session snapshot")?;
        restrict_permissions(&path)?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        let path = self.path();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    fn path(&self) -> PathBuf {
        self.cache_dir.join(SNAPSHOT_FILE)
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .context("Failed to restrict session snapshot permissions")
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
