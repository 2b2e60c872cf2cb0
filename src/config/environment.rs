// Start of file: /src/config/environment.rs

// * Environment configuration with a singleton pattern
// * and zero-copy parsing.

use std::{borrow::Cow, collections::HashMap, str::FromStr};
// * anyhow for convenient error handling
use anyhow::{anyhow, Context, Result};
// * once_cell for lazy static initialization
use once_cell::sync::Lazy;
use tracing::warn;

// ! Default values for environment variables (used if variables aren't set):
const DEFAULT_ENVIRONMENT: &str = "development";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PROTOCOL: &str = "http";
const DEFAULT_DB_HOST: &str = "localhost";
const DEFAULT_DB_USER: &str = "postgres";
const DEFAULT_DB_PASSWORD: &str = "postgres";
const DEFAULT_DB_NAME: &str = "hotel_security";
const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_MAX_BODY_SIZE: usize = 2_097_152; // 2MB
const DEFAULT_TIMEOUT: u64 = 3; // 3 seconds
const DEFAULT_DB_PORT: u16 = 5432; // Default Postgres port
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_ACCESS_TOKEN_TTL: u64 = 3_600; // 1 hour
const DEFAULT_REFRESH_TOKEN_TTL: u64 = 604_800; // 7 days
const DEFAULT_MAX_FAILED_LOGINS: u32 = 5;
const DEFAULT_LOCKOUT_MINUTES: i64 = 15;

/// Where audit events, alerts, blocks and users are persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Postgres,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(anyhow!("Unknown STORAGE_BACKEND '{other}'")),
        }
    }
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Postgres => "postgres",
        }
    }
}

/// Where access and refresh tokens live.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionBackend {
    Memory,
    Redis,
}

impl FromStr for SessionBackend {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            other => Err(anyhow!("Unknown SESSION_BACKEND '{other}'")),
        }
    }
}

impl SessionBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Redis => "redis",
        }
    }
}

// * A struct containing all environment variables used by the app
#[derive(Clone, Debug)]
pub struct EnvironmentVariables {
    pub environment: Cow<'static, str>,
    pub host: Cow<'static, str>,
    pub port: u16,
    pub protocol: Cow<'static, str>,
    pub max_request_body_size: usize,
    pub default_timeout_seconds: u64,
    pub storage_backend: StorageBackend,
    pub db_host: Cow<'static, str>,
    pub db_port: u16,
    pub db_user: Cow<'static, str>,
    pub db_password: Cow<'static, str>,
    pub db_name: Cow<'static, str>,
    pub db_max_connections: u32,
    pub session_backend: SessionBackend,
    pub redis_url: Cow<'static, str>,
    pub access_token_ttl_seconds: u64,
    pub refresh_token_ttl_seconds: u64,
    pub max_failed_logins: u32,
    pub account_lockout_minutes: i64,
    pub bcrypt_cost: u32,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Default for EnvironmentVariables {
    fn default() -> Self {
        Self {
            environment: Cow::Borrowed(DEFAULT_ENVIRONMENT),
            host: Cow::Borrowed(DEFAULT_HOST),
            port: DEFAULT_PORT,
            protocol: Cow::Borrowed(DEFAULT_PROTOCOL),
            max_request_body_size: DEFAULT_MAX_BODY_SIZE,
            default_timeout_seconds: DEFAULT_TIMEOUT,
            storage_backend: StorageBackend::Memory,
            db_host: Cow::Borrowed(DEFAULT_DB_HOST),
            db_port: DEFAULT_DB_PORT,
            db_user: Cow::Borrowed(DEFAULT_DB_USER),
            db_password: Cow::Borrowed(DEFAULT_DB_PASSWORD),
            db_name: Cow::Borrowed(DEFAULT_DB_NAME),
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            session_backend: SessionBackend::Memory,
            redis_url: Cow::Borrowed(DEFAULT_REDIS_URL),
            access_token_ttl_seconds: DEFAULT_ACCESS_TOKEN_TTL,
            refresh_token_ttl_seconds: DEFAULT_REFRESH_TOKEN_TTL,
            max_failed_logins: DEFAULT_MAX_FAILED_LOGINS,
            account_lockout_minutes: DEFAULT_LOCKOUT_MINUTES,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            admin_email: None,
            admin_password: None,
        }
    }
}

impl EnvironmentVariables {
    // * Loads environment variables once.
    // * Only reads .env if ENVIRONMENT != "production".
    pub fn load() -> Result<Self> {
        // ? In non-production environments, attempt to load .env
        if std::env::var("ENVIRONMENT").unwrap_or_default() != "production" {
            dotenv::dotenv().ok();
        }

        // * Collect all environment vars from the system and .env
        let vars: HashMap<String, String> = std::env::vars()
            .chain(dotenv::vars())
            .collect();

        Self::from_vars(&vars)
    }

    // * Builds the configuration from an already collected key/value map
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let defaults: EnvironmentVariables = EnvironmentVariables::default();

        // * A small helper closure to fetch a variable by key
        let get_var = |key: &str| vars.get(key).map(String::as_str).filter(|s| !s.is_empty());

        let storage_backend: StorageBackend = get_var("STORAGE_BACKEND")
            .map(str::parse)
            .transpose()?
            .unwrap_or(defaults.storage_backend);

        let session_backend: SessionBackend = get_var("SESSION_BACKEND")
            .map(str::parse)
            .transpose()?
            .unwrap_or(defaults.session_backend);

        let admin_email: Option<String> = get_var("ADMIN_EMAIL").map(str::to_owned);
        let admin_password: Option<String> = get_var("ADMIN_PASSWORD").map(str::to_owned);

        if admin_email.is_some() != admin_password.is_some() {
            warn!("ADMIN_EMAIL and ADMIN_PASSWORD must both be set to seed an admin account");
        }

        Ok(Self {
            environment: get_var("ENVIRONMENT")
                .map(|s| Cow::Owned(s.into()))
                .unwrap_or_else(|| {
                    warn!("Missing ENVIRONMENT, defaulting to '{DEFAULT_ENVIRONMENT}'");
                    Cow::Borrowed(DEFAULT_ENVIRONMENT)
                }),

            host: get_var("HOST")
                .map(|s| Cow::Owned(s.into()))
                .unwrap_or(defaults.host),

            port: get_var("PORT")
                .map(|s| s.parse().context("Invalid PORT value"))
                .transpose()?
                .unwrap_or(defaults.port),

            protocol: get_var("PROTOCOL")
                .map(|s| Cow::Owned(s.into()))
                .unwrap_or(defaults.protocol),

            max_request_body_size: get_var("MAX_REQUEST_BODY_SIZE")
                .map(|s| s.parse().context("Invalid MAX_REQUEST_BODY_SIZE"))
                .transpose()?
                .unwrap_or(defaults.max_request_body_size),

            default_timeout_seconds: get_var("DEFAULT_TIMEOUT_SECONDS")
                .map(|s| s.parse().context("Invalid DEFAULT_TIMEOUT_SECONDS"))
                .transpose()?
                .unwrap_or(defaults.default_timeout_seconds),

            storage_backend,

            db_host: match get_var("DB_HOST") {
                Some(s) => Cow::Owned(s.into()),
                None => {
                    if storage_backend == StorageBackend::Postgres {
                        warn!("Missing DB_HOST, defaulting to '{DEFAULT_DB_HOST}'");
                    }
                    defaults.db_host
                }
            },

            db_port: get_var("DB_PORT")
                .map(|s| s.parse().context("Invalid DB_PORT"))
                .transpose()?
                .unwrap_or(defaults.db_port),

            db_user: match get_var("DB_USER") {
                Some(s) => Cow::Owned(s.into()),
                None => {
                    if storage_backend == StorageBackend::Postgres {
                        warn!("Missing DB_USER, defaulting to '{DEFAULT_DB_USER}'");
                    }
                    defaults.db_user
                }
            },

            db_password: match get_var("DB_PASSWORD") {
                Some(s) => Cow::Owned(s.into()),
                None => {
                    if storage_backend == StorageBackend::Postgres {
                        warn!("Missing DB_PASSWORD, defaulting to '{DEFAULT_DB_PASSWORD}'");
                    }
                    defaults.db_password
                }
            },

            db_name: get_var("DB_NAME")
                .map(|s| Cow::Owned(s.into()))
                .unwrap_or(defaults.db_name),

            db_max_connections: get_var("DB_MAX_CONNECTIONS")
                .map(|s| s.parse().context("Invalid DB_MAX_CONNECTIONS"))
                .transpose()?
                .unwrap_or(defaults.db_max_connections),

            session_backend,

            redis_url: match get_var("REDIS_URL") {
                Some(s) => Cow::Owned(s.into()),
                None => {
                    if session_backend == SessionBackend::Redis {
                        warn!("Missing REDIS_URL, defaulting to '{DEFAULT_REDIS_URL}'");
                    }
                    defaults.redis_url
                }
            },

            access_token_ttl_seconds: get_var("ACCESS_TOKEN_TTL_SECONDS")
                .map(|s| s.parse().context("Invalid ACCESS_TOKEN_TTL_SECONDS"))
                .transpose()?
                .unwrap_or(defaults.access_token_ttl_seconds),

            refresh_token_ttl_seconds: get_var("REFRESH_TOKEN_TTL_SECONDS")
                .map(|s| s.parse().context("Invalid REFRESH_TOKEN_TTL_SECONDS"))
                .transpose()?
                .unwrap_or(defaults.refresh_token_ttl_seconds),

            max_failed_logins: get_var("MAX_FAILED_LOGINS")
                .map(|s| s.parse().context("Invalid MAX_FAILED_LOGINS"))
                .transpose()?
                .unwrap_or(defaults.max_failed_logins),

            account_lockout_minutes: get_var("ACCOUNT_LOCKOUT_MINUTES")
                .map(|s| s.parse().context("Invalid ACCOUNT_LOCKOUT_MINUTES"))
                .transpose()?
                .unwrap_or(defaults.account_lockout_minutes),

            bcrypt_cost: get_var("BCRYPT_COST")
                .map(|s| s.parse().context("Invalid BCRYPT_COST"))
                .transpose()?
                .unwrap_or(defaults.bcrypt_cost),

            admin_email,
            admin_password,
        })
    }

    /// Postgres connection URL built from the DB_* variables
    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.db_user, self.db_password, self.db_host, self.db_port, self.db_name
        )
    }

    // * Returns a reference to the lazily-initialized environment configuration
    pub fn instance() -> &'static Self {
        static INSTANCE: Lazy<Result<EnvironmentVariables, anyhow::Error>> = Lazy::new(|| {
            let config: EnvironmentVariables = EnvironmentVariables::load()?;

            if cfg!(debug_assertions) {
                tracing::debug!(
                    environment = %config.environment,
                    storage = config.storage_backend.as_str(),
                    "Loaded environment configuration"
                );
            }

            Ok(config)
        });

        // ! Panics if loading fails
        INSTANCE.as_ref().expect("Failed to load environment configuration")
    }
}


// End of file: /src/config/environment.rs
