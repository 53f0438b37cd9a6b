use std::env;
use std::fmt;

use crate::utils::constants::{
    DEFAULT_BIND_ADDR, DEFAULT_REDIS_HOST, DEFAULT_REDIS_PORT, DEFAULT_SESSION_COOKIE,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("environment variable {0} is required")]
    Missing(&'static str),

    #[error("environment variable {name} has invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Clone, PartialEq, Eq)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: u32,
    /// Full connection URL; takes precedence over the individual parts.
    pub url: Option<String>,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_REDIS_HOST.to_string(),
            port: DEFAULT_REDIS_PORT,
            password: None,
            db: 0,
            url: None,
        }
    }
}

impl RedisConfig {
    pub fn url(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        match &self.password {
            Some(password) => format!("redis://:{password}@{}:{}/{}", self.host, self.port, self.db),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

impl fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("db", &self.db)
            .field("url", &self.url.as_ref().map(|_| "***"))
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub secret: String,
    pub cookie_name: String,
}

impl SessionConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            cookie_name: DEFAULT_SESSION_COOKIE.to_string(),
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("secret", &"***")
            .field("cookie_name", &self.cookie_name)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub redis: RedisConfig,
    pub session: SessionConfig,
    pub bind_addr: String,
}

impl AppConfig {
    /// Reads the process environment, after loading `.env` if one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is fine; real deployments set variables directly.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let defaults = RedisConfig::default();
        let redis = RedisConfig {
            host: get("REDIS_HOST").unwrap_or(defaults.host),
            port: parse_or("REDIS_PORT", get("REDIS_PORT"), defaults.port)?,
            password: get("REDIS_PASSWORD"),
            db: parse_or("REDIS_DB", get("REDIS_DB"), defaults.db)?,
            url: get("REDIS_URL"),
        };

        let session = SessionConfig {
            secret: get("SESSION_SECRET").ok_or(ConfigError::Missing("SESSION_SECRET"))?,
            cookie_name: get("SESSION_COOKIE").unwrap_or_else(|| DEFAULT_SESSION_COOKIE.to_string()),
        };

        Ok(Self {
            redis,
            session,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}
