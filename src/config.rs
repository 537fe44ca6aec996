//! Runtime configuration parsed from environment variables.
//!
//! `.env` files are loaded by `main` through `dotenvy` before this runs, so
//! every knob can be set either way.
//!
//! Required:
//! - `DATABASE_URL`
//!
//! Optional:
//! - `PORT` (default 3000)
//! - `DB_MAX_CONNECTIONS` (default 5)
//! - `STORAGE_DIR` (default `./storage`): root of the public object bucket
//! - `STATIC_DIR` (default `./public`): SPA shell and assets
//! - `PUBLIC_URL` (default `http://localhost:<port>`): base for public links
//! - `REMOTE_TIMEOUT_MS` (default 15000): upper bound for one submit
//! - `COOKIE_SECURE`: defaults to true when `PUBLIC_URL` is https

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_REMOTE_TIMEOUT_MS: u64 = 15_000;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub db_max_connections: u32,
    pub storage_dir: PathBuf,
    pub static_dir: PathBuf,
    pub public_url: String,
    pub remote_timeout: Duration,
    pub cookie_secure: bool,
}

impl AppConfig {
    /// Build the config from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URL` is missing or a numeric knob does
    /// not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`AppConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let port = parse_or(&lookup, "PORT", DEFAULT_PORT)?;
        let db_max_connections = parse_or(&lookup, "DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?;
        let remote_timeout_ms = parse_or(&lookup, "REMOTE_TIMEOUT_MS", DEFAULT_REMOTE_TIMEOUT_MS)?;

        let public_url = lookup("PUBLIC_URL")
            .unwrap_or_else(|| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_owned();
        let cookie_secure = match lookup("COOKIE_SECURE") {
            Some(raw) => parse_bool(&raw).ok_or(ConfigError::Invalid { key: "COOKIE_SECURE", value: raw })?,
            None => public_url.starts_with("https://"),
        };

        Ok(Self {
            database_url,
            port,
            db_max_connections,
            storage_dir: lookup("STORAGE_DIR").map_or_else(|| PathBuf::from("./storage"), PathBuf::from),
            static_dir: lookup("STATIC_DIR").map_or_else(|| PathBuf::from("./public"), PathBuf::from),
            public_url,
            remote_timeout: Duration::from_millis(remote_timeout_ms),
            cookie_secure,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
