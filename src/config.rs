//! Configuration loading and validation.

use crate::error::ConfigError;

const DEFAULT_PORT: u16 = 8080;

/// Daemon configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database DSN. Required; startup fails without it.
    pub database_uri: String,

    /// HTTP bind port.
    pub port: u16,

    /// CORS allow-list; empty means any origin.
    pub cors_allowed_origins: Vec<String>,
}

impl Config {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let database_uri =
            std::env::var("DATABASE_URI").map_err(|_| ConfigError::MissingVar("DATABASE_URI"))?;

        let port = match std::env::var("PORT") {
            Ok(value) => value
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("PORT must be a port number: {value}")))?,
            Err(_) => DEFAULT_PORT,
        };

        let cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .map(|value| parse_origins(&value))
            .unwrap_or_default();

        Ok(Self {
            database_uri,
            port,
            cors_allowed_origins,
        })
    }
}

fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(';')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_owned)
        .collect()
}
