use std::time::Duration;

use anyhow::{Context, Result};

/// Process configuration, read from the environment (and `.env` if present).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// `None` means any origin.
    pub cors_origin: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let _ = dotenv::dotenv();

        let cors_origin = dotenv::var("CORS_ORIGIN")
            .ok()
            .filter(|origin| origin != "*");

        Ok(Self {
            database_url: dotenv::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://roomrelay.db".to_owned()),
            port: dotenv::var("PORT")
                .unwrap_or_else(|_| "8004".to_owned())
                .parse()
                .context("PORT must be a valid port number")?,
            cors_origin,
            max_connections: dotenv::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "16".to_owned())
                .parse()
                .context("DB_MAX_CONNECTIONS must be a number")?,
            acquire_timeout: Duration::from_secs(
                dotenv::var("DB_ACQUIRE_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "5".to_owned())
                    .parse()
                    .context("DB_ACQUIRE_TIMEOUT_SECS must be a number of seconds")?,
            ),
        })
    }
}
