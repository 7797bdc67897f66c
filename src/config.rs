use std::env;

use thiserror::Error;

/// AppConfig
///
/// Holds the application's entire configuration state. Loaded once at startup and
/// shared read-only through `AppState` (pulled into handlers via `FromRef`).
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format and dev fallbacks.
    pub env: Env,
    // Postgres connection string. `None` selects the in-memory repository (local only).
    pub db_url: Option<String>,
    // HMAC secret for tokens issued by the admin login.
    pub jwt_secret: String,
    // HMAC secret for tokens issued by the root (super-admin) login.
    pub root_jwt_secret: String,
    // Shared secret expected in the `x-api-key` header.
    pub api_key: String,
    pub bind_addr: String,
    // Lifetime of issued tokens.
    pub token_ttl_hours: i64,
    // Optional super-admin account seeded at startup.
    pub root_email: Option<String>,
    pub root_password: Option<String>,
}

/// Env
///
/// Defines the runtime context, used to switch between developer conveniences
/// (pretty logs, in-memory storage, default secrets) and hardened production settings.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

const LOCAL_JWT_SECRET: &str = "local-admin-jwt-secret";
const LOCAL_ROOT_JWT_SECRET: &str = "local-root-jwt-secret";
const LOCAL_API_KEY: &str = "local-api-key";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;

impl Default for AppConfig {
    /// Safe, non-failing configuration used for test state scaffolding.
    fn default() -> Self {
        Self {
            env: Env::Local,
            db_url: None,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            root_jwt_secret: LOCAL_ROOT_JWT_SECRET.to_string(),
            api_key: LOCAL_API_KEY.to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            token_ttl_hours: DEFAULT_TOKEN_TTL_HOURS,
            root_email: None,
            root_password: None,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables. In production every
    /// secret and the database URL are mandatory, so a misconfigured deployment
    /// refuses to start instead of running with development defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let secret = |key: &'static str, fallback: &str| -> Result<String, ConfigError> {
            match (env::var(key).ok().filter(|v| !v.is_empty()), &env) {
                (Some(value), _) => Ok(value),
                (None, Env::Production) => Err(ConfigError::Missing(key)),
                (None, Env::Local) => Ok(fallback.to_string()),
            }
        };

        let jwt_secret = secret("JWT_SECRET", LOCAL_JWT_SECRET)?;
        let root_jwt_secret = secret("ROOT_JWT_SECRET", LOCAL_ROOT_JWT_SECRET)?;
        let api_key = secret("API_KEY", LOCAL_API_KEY)?;

        let db_url = env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());
        if env == Env::Production && db_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let token_ttl_hours = match env::var("TOKEN_TTL_HOURS") {
            Ok(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|hours| *hours > 0)
                .ok_or(ConfigError::Invalid {
                    key: "TOKEN_TTL_HOURS",
                    value: raw,
                })?,
            Err(_) => DEFAULT_TOKEN_TTL_HOURS,
        };

        Ok(Self {
            env,
            db_url,
            jwt_secret,
            root_jwt_secret,
            api_key,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            token_ttl_hours,
            root_email: env::var("ROOT_EMAIL").ok().filter(|v| !v.is_empty()),
            root_password: env::var("ROOT_PASSWORD").ok().filter(|v| !v.is_empty()),
        })
    }
}
