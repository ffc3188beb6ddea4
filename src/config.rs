//! Layered configuration.
//!
//! Sources, lowest to highest priority:
//! 1. built-in defaults
//! 2. `~/.config/consilium/config.toml`
//! 3. `./consilium.toml`
//! 4. `CONSILIUM_*` environment variables, `__` separating sections
//!    (`CONSILIUM_AUTH__SECRET_KEY` -> `auth.secret_key`)
//! 5. a handful of well-known bare variables (`SECRET_KEY`, `GEMINI_API_KEY`, ...)
//!
//! A `.env` file in the working directory is loaded first by
//! [`Config::load_with_dotenv`].

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Deserializer, Serialize};

use consilium_core::credentials::DEFAULT_PASSWORD_ITERATIONS;

const REDACTED: &str = "********";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),

    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(deserialize_with = "comma_list")]
    pub cors_allowed_origins: Vec<String>,
    #[serde(deserialize_with = "comma_list")]
    pub csrf_trusted_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_allowed_origins: Vec::new(),
            csrf_trusted_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Unset means the platform data directory.
    pub path: Option<PathBuf>,
    /// Use an in-memory database that vanishes on exit.
    pub ephemeral: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub secret_key: String,
    pub access_token_lifetime_minutes: i64,
    pub refresh_token_lifetime_days: i64,
    pub password_iterations: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            access_token_lifetime_minutes: 60,
            refresh_token_lifetime_days: 7,
            password_iterations: DEFAULT_PASSWORD_ITERATIONS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub requests_per_minute: u32,
    pub requests_per_hour: u32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.0-flash-exp".to_string(),
            timeout_secs: 60,
            requests_per_minute: 10,
            requests_per_hour: 100,
        }
    }
}

impl AiConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub dashboard_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dashboard_ttl_secs: 300,
        }
    }
}

/// Accept either a list or a comma-separated string.
fn comma_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        Joined(String),
    }

    let items = match Raw::deserialize(deserializer)? {
        Raw::List(items) => items,
        Raw::Joined(joined) => joined.split(',').map(str::to_string).collect(),
    };
    Ok(items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect())
}

/// Config key for a well-known bare environment variable.
fn bare_env_key(name: &str) -> Option<&'static str> {
    const KEYS: [(&str, &str); 8] = [
        ("SECRET_KEY", "auth.secret_key"),
        ("GEMINI_API_KEY", "ai.api_key"),
        ("DATABASE_PATH", "database.path"),
        ("USE_EPHEMERAL_DB", "database.ephemeral"),
        ("CORS_ALLOWED_ORIGINS", "server.cors_allowed_origins"),
        ("CSRF_TRUSTED_ORIGINS", "server.csrf_trusted_origins"),
        ("ACCESS_TOKEN_LIFETIME_MINUTES", "auth.access_token_lifetime_minutes"),
        ("REFRESH_TOKEN_LIFETIME_DAYS", "auth.refresh_token_lifetime_days"),
    ];
    KEYS.iter()
        .find(|(var, _)| var.eq_ignore_ascii_case(name))
        .map(|(_, key)| *key)
}

impl Config {
    /// Load from files and environment, then validate.
    pub fn load() -> Result<Self, ConfigError> {
        let config: Self = Self::figment().extract()?;
        config.validate()?;
        Ok(config)
    }

    /// [`Config::load`] after reading `.env` from the working directory.
    pub fn load_with_dotenv() -> Result<Self, ConfigError> {
        // a missing .env is normal outside development
        let _ = dotenvy::dotenv();
        Self::load()
    }

    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                figment = figment.merge(Toml::file(global_path));
            }
        }

        let local_path = PathBuf::from("consilium.toml");
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        figment
            .merge(Env::prefixed("CONSILIUM_").split("__"))
            .merge(Env::raw().filter_map(|name| bare_env_key(name.as_str()).map(Into::into)))
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("consilium").join("config.toml"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.secret_key.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "auth.secret_key",
                reason: "must be set (SECRET_KEY or CONSILIUM_AUTH__SECRET_KEY)".into(),
            });
        }
        if self.auth.access_token_lifetime_minutes <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "auth.access_token_lifetime_minutes",
                reason: "must be positive".into(),
            });
        }
        if self.auth.refresh_token_lifetime_days <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "auth.refresh_token_lifetime_days",
                reason: "must be positive".into(),
            });
        }
        if self.auth.password_iterations == 0 {
            return Err(ConfigError::InvalidValue {
                field: "auth.password_iterations",
                reason: "must be at least 1".into(),
            });
        }
        if self.ai.requests_per_minute == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ai.requests_per_minute",
                reason: "must be at least 1".into(),
            });
        }
        if self.ai.requests_per_hour == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ai.requests_per_hour",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Copy safe to print: secrets replaced by a placeholder.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.auth.secret_key.is_empty() {
            copy.auth.secret_key = REDACTED.to_string();
        }
        if !copy.ai.api_key.is_empty() {
            copy.ai.api_key = REDACTED.to_string();
        }
        copy
    }

    /// Origins allowed to make state-changing browser requests.
    pub fn trusted_origins(&self) -> Vec<String> {
        let mut origins = self.server.csrf_trusted_origins.clone();
        for origin in &self.server.cors_allowed_origins {
            if !origins.contains(origin) {
                origins.push(origin.clone());
            }
        }
        origins
    }
}
