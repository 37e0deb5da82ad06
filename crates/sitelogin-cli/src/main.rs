//! sitelogin - log in to a site that only offers browser login pages and keep
//! the harvested session token fresh.
//!
//! Usage:
//!   sitelogin login [username]   log in (password from SITELOGIN_PASSWORD or prompt)
//!   sitelogin status             show session details
//!   sitelogin ensure             refresh the token if it is missing or expiring
//!   sitelogin logout             drop the token, keep stored credentials
//!   sitelogin forget             drop stored credentials as well

use std::io::{self, Write};

use anyhow::{bail, Result};
use sitelogin_core::auth::open_store;
use sitelogin_core::{AuthError, Authenticator, Config};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const ENV_USERNAME: &str = "SITELOGIN_USERNAME";
const ENV_PASSWORD: &str = "SITELOGIN_PASSWORD";
const ENV_PASSPHRASE: &str = "SITELOGIN_PASSPHRASE";

const USAGE: &str = "usage: sitelogin <login [username] | status | ensure | logout | forget>";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    };

    let config = Config::load()?;
    config.validate()?;
    debug!(web_origin = %config.web_origin, store = ?config.store, "Config loaded");

    let passphrase = std::env::var(ENV_PASSPHRASE).ok();
    let store = open_store(&config, passphrase.as_deref())?;
    let cache_dir = config.cache_dir()?;
    let mut auth = Authenticator::new(config, store)?.with_snapshot_dir(cache_dir);

    if let Err(e) = auth.restore() {
        debug!(error = %e, "Could not restore saved session");
    }

    match command.as_str() {
        "login" => login(&mut auth, args.get(1).cloned()).await,
        "status" => {
            println!("{}", auth.get_session_details().summary());
            Ok(())
        }
        "ensure" => match auth.ensure_valid_session().await {
            Ok(()) => {
                println!("Session valid ({})", auth.status());
                Ok(())
            }
            Err(AuthError::AuthenticationRequired(msg)) => {
                eprintln!("Please log in again: {}", msg);
                std::process::exit(1);
            }
            Err(e) => Err(e.into()),
        },
        "logout" => {
            auth.logout();
            println!("Logged out");
            Ok(())
        }
        "forget" => {
            auth.logout();
            auth.forget_credentials()?;
            println!("Logged out and stored credentials removed");
            Ok(())
        }
        other => bail!("unknown command '{}'\n{}", other, USAGE),
    }
}

async fn login(auth: &mut Authenticator, username: Option<String>) -> Result<()> {
    let (stored_username, stored_password) = auth.store().get_credentials();

    let username = match username.or_else(|| std::env::var(ENV_USERNAME).ok()) {
        Some(username) => username,
        None => match stored_username {
            Some(ref stored) => stored.clone(),
            None => prompt_username()?,
        },
    };

    let password = match std::env::var(ENV_PASSWORD) {
        Ok(password) => password,
        Err(_) if stored_username.as_deref() == Some(username.as_str()) => {
            match stored_password {
                Some(password) => password,
                None => prompt_password()?,
            }
        }
        Err(_) => prompt_password()?,
    };

    info!(%username, "Logging in");
    let result = auth.authenticate(&username, &password).await?;
    if result.success {
        println!("Login successful");
        println!("{}", auth.get_session_details().summary());
        Ok(())
    } else {
        bail!(
            "Login failed: {}",
            result.error_message.unwrap_or_else(|| "unknown error".to_string())
        )
    }
}

fn prompt_username() -> Result<String> {
    print!("Username: ");
    io::stdout().flush()?;

    let mut username = String::new();
    io::stdin().read_line(&mut username)?;
    Ok(username.trim().to_string())
}

fn prompt_password() -> Result<String> {
    let password = rpassword::prompt_password("Password: ")?;
    Ok(password)
}
