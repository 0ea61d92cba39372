// src/config.rs

use std::{env, str::FromStr};

use dotenvy::dotenv;
use thiserror::Error;

/// Points credited to a user for every correctly submitted answer.
pub const POINTS_PER_CORRECT_ANSWER: i64 = 3;

pub const DEFAULT_PAGE_LIMIT: i64 = 20;
pub const MAX_PAGE_LIMIT: i64 = 100;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub rust_log: String,
    pub server_port: u16,
    pub db_max_connections: u32,
    /// How many times the award worker tries a point award before giving up.
    pub award_max_attempts: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let jwt_secret = env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            database_url,
            jwt_secret,
            rust_log,
            server_port: parse_or("SERVER_PORT", env::var("SERVER_PORT").ok(), 3000)?,
            db_max_connections: parse_or(
                "DB_MAX_CONNECTIONS",
                env::var("DB_MAX_CONNECTIONS").ok(),
                5,
            )?,
            award_max_attempts: parse_or(
                "AWARD_MAX_ATTEMPTS",
                env::var("AWARD_MAX_ATTEMPTS").ok(),
                5,
            )?,
        })
    }
}

fn parse_or<T: FromStr>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or_uses_default_when_unset() {
        let port: u16 = parse_or("SERVER_PORT", None, 3000).unwrap();
        assert_eq!(port, 3000);
    }

    #[test]
    fn test_parse_or_reads_value() {
        let attempts: usize = parse_or("AWARD_MAX_ATTEMPTS", Some(" 8 ".to_string()), 5).unwrap();
        assert_eq!(attempts, 8);
    }

    #[test]
    fn test_parse_or_rejects_garbage() {
        let err = parse_or::<u16>("SERVER_PORT", Some("eighty".to_string()), 3000).unwrap_err();
        assert_eq!(err.to_string(), "SERVER_PORT has an invalid value: eighty");
    }
}
