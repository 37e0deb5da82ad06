use std::sync::{PoisonError, RwLock};

use anyhow::Result;

use super::{SessionStore, DEFAULT_EXPIRY_BUFFER_HOURS};
use crate::auth::models::Token;

#[derive(Debug, Default)]
struct MemoryState {
    token: Option<Token>,
    username: Option<String>,
    password: Option<String>,
}

/// Process-local store for tests and throwaway sessions.
#[derive(Debug)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    buffer_hours: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_buffer_hours(DEFAULT_EXPIRY_BUFFER_HOURS)
    }

    pub fn with_buffer_hours(buffer_hours: i64) -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            buffer_hours,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for MemoryStore {
    fn save_token(&self, token: &Token) -> Result<()> {
        self.state.write().unwrap_or_else(PoisonError::into_inner).token = Some(token.clone());
        Ok(())
    }

    fn get_token(&self) -> Option<Token> {
        self.state.read().unwrap_or_else(PoisonError::into_inner).token.clone()
    }

    fn clear_token(&self) -> Result<()> {
        self.state.write().unwrap_or_else(PoisonError::into_inner).token = None;
        Ok(())
    }

    fn save_credentials(&self, username: &str, password: &str) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.username = Some(username.to_string());
        state.password = Some(password.to_string());
        Ok(())
    }

    fn get_credentials(&self) -> (Option<String>, Option<String>) {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        (state.username.clone(), state.password.clone())
    }

    fn clear_credentials(&self) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.username = None;
        state.password = None;
        Ok(())
    }

    fn expiry_buffer_hours(&self) -> i64 {
        self.buffer_hours
    }
}
