//! Environment configuration
//!
//! Values come from the process environment (after `.env` is loaded by the
//! binary). Missing values fall back to defaults; malformed ones are errors.

use std::{env, fmt::Display, str::FromStr};

use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Bootstrap administrator created at startup when missing
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// redb file path; `None` keeps everything in memory
    pub database_url: Option<String>,
    pub session_ttl_hours: i64,
    pub analytics_window_days: u32,
    pub admin: Option<AdminSeed>,
}

/// Log filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "rateflow=debug,tower_http=debug";

/// Longest accepted session lifetime (366 days)
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 366;

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let session_ttl_hours = check_session_ttl(try_load("SESSION_TTL_HOURS", "24")?)?;
        let analytics_window_days = try_load("ANALYTICS_WINDOW_DAYS", "7")?;
        if analytics_window_days == 0 {
            return Err(ConfigError::Invalid {
                key: "ANALYTICS_WINDOW_DAYS",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            port: try_load("PORT", "8080")?,
            database_url: optional("DATABASE_URL"),
            session_ttl_hours,
            analytics_window_days,
            admin: admin_seed(),
        })
    }
}

fn check_session_ttl(hours: i64) -> Result<i64, ConfigError> {
    if (1..=MAX_SESSION_TTL_HOURS).contains(&hours) {
        Ok(hours)
    } else {
        Err(ConfigError::Invalid {
            key: "SESSION_TTL_HOURS",
            reason: format!("must be between 1 and {MAX_SESSION_TTL_HOURS}"),
        })
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    optional(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        })
}

fn admin_seed() -> Option<AdminSeed> {
    let Some(password) = optional("ADMIN_PASSWORD") else {
        warn!("ADMIN_PASSWORD not set, no bootstrap admin will be created");
        return None;
    };
    Some(AdminSeed {
        username: optional("ADMIN_USERNAME").unwrap_or_else(|| "admin".to_string()),
        email: optional("ADMIN_EMAIL").unwrap_or_else(|| "admin@localhost".to_string()),
        password,
    })
}
