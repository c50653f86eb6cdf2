//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development, and an optional secrets file (same format)
//! is consulted for anything the environment does not define.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// How the application password is supplied.
#[derive(Clone, Debug)]
pub enum AppSecret {
    /// An Argon2 PHC string.
    Hashed(String),
    /// A plaintext password, hashed once at startup.
    Plain(String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub db_max_connections: u32,
    pub log_level: Level,
    pub app_secret: AppSecret,
    pub ai_assist_enabled: bool,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub sql_model: String,
    pub sql_temperature: f32,
    pub sql_max_tokens: u32,
    pub session_idle_minutes: i64,
    pub cookie_secure: bool,
    pub allowed_origin: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let secrets = match std::env::var("SECRETS_PATH") {
            Ok(path) => read_secrets_file(PathBuf::from(path))?,
            Err(_) => HashMap::new(),
        };

        Self::from_lookup(|key| {
            std::env::var(key)
                .ok()
                .or_else(|| secrets.get(key).cloned())
        })
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Load Server and Database Settings ---
        let bind_address: SocketAddr = parse_or(&lookup, "BIND_ADDRESS", "0.0.0.0:3000".parse().ok())?;
        let database_url =
            lookup("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;
        let db_max_connections: u32 = parse_or(&lookup, "DB_MAX_CONNECTIONS", Some(5))?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load the Access Secret ---
        let app_secret = match (lookup("APP_PASSWORD_HASH"), lookup("APP_PASSWORD")) {
            (Some(hash), _) if !hash.trim().is_empty() => AppSecret::Hashed(hash.trim().to_string()),
            (_, Some(password)) if !password.is_empty() => AppSecret::Plain(password),
            _ => {
                return Err(ConfigError::MissingVar(
                    "APP_PASSWORD_HASH or APP_PASSWORD".to_string(),
                ))
            }
        };

        // --- Load AI Assistant Settings ---
        let ai_assist_enabled = parse_bool(&lookup, "AI_ASSIST_ENABLED", true)?;
        let openai_api_key = lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty());
        let openai_base_url = lookup("OPENAI_BASE_URL").filter(|u| !u.trim().is_empty());
        let sql_model = lookup("SQL_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string());
        let sql_temperature: f32 = parse_or(&lookup, "SQL_TEMPERATURE", Some(0.1))?;
        let sql_max_tokens: u32 = parse_or(&lookup, "SQL_MAX_TOKENS", Some(800))?;

        // --- Load Session and HTTP Settings ---
        let session_idle_minutes: i64 = parse_or(&lookup, "SESSION_IDLE_MINUTES", Some(1440))?;
        if session_idle_minutes <= 0 {
            return Err(ConfigError::InvalidValue(
                "SESSION_IDLE_MINUTES".to_string(),
                "must be positive".to_string(),
            ));
        }
        // Browsers drop `Secure` cookies over plain HTTP, so TLS deployments opt in.
        let cookie_secure = parse_bool(&lookup, "COOKIE_SECURE", false)?;
        let allowed_origin = lookup("ALLOWED_ORIGIN").filter(|o| !o.trim().is_empty());

        Ok(Self {
            bind_address,
            database_url,
            db_max_connections,
            log_level,
            app_secret,
            ai_assist_enabled,
            openai_api_key,
            openai_base_url,
            sql_model,
            sql_temperature,
            sql_max_tokens,
            session_idle_minutes,
            cookie_secure,
            allowed_origin,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: Option<T>) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => default.ok_or_else(|| ConfigError::MissingVar(key.to_string())),
    }
}

fn parse_bool<F>(lookup: &F, key: &str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue(
                key.to_string(),
                format!("'{}' is not a boolean", v),
            )),
        },
    }
}

fn read_secrets_file(path: PathBuf) -> Result<HashMap<String, String>, ConfigError> {
    let invalid = |e: dotenvy::Error| {
        ConfigError::InvalidValue("SECRETS_PATH".to_string(), e.to_string())
    };
    dotenvy::from_path_iter(&path)
        .map_err(invalid)?
        .map(|item| item.map_err(invalid))
        .collect()
}
