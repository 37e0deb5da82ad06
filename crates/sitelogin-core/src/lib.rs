//! sitelogin core library.
//!
//! Logs in to a web application that only offers browser login pages, by
//! replaying the page sequence with a cookie-carrying HTTP client, then keeps
//! the harvested JWT bearer token alive:
//!
//! - `auth`: scraping login flow, JWT decoding, refresh orchestration, stores
//! - `http`: the cookie-jar HTTP session the flow runs on
//! - `config`: origins, cookie names, timeouts
//! - `utils`: display formatting helpers

pub mod auth;
pub mod config;
pub mod http;
pub mod utils;

pub use auth::{
    AuthError, AuthResult, Authenticator, Claims, Credential, DecodeError, LoginFlow,
    ScrapingLogin, SessionDetails, SessionStatus, SessionStore, Token,
};
pub use config::Config;
pub use http::HttpSession;
