use std::env;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::authz::DeleteStrategy;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub delete_strategy: DeleteStrategy,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
}

#[derive(Clone)]
pub struct SecurityConfig {
    pub long_token_secret: String,
    pub short_token_secret: String,
    pub long_token_ttl_days: i64,
    pub short_token_ttl_days: i64,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

// Secrets stay out of logs.
impl fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("long_token_secret", &"<redacted>")
            .field("short_token_secret", &"<redacted>")
            .field("long_token_ttl_days", &self.long_token_ttl_days)
            .field("short_token_ttl_days", &self.short_token_ttl_days)
            .field("enable_cors", &self.enable_cors)
            .field("cors_origins", &self.cors_origins)
            .finish()
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            long_token_secret: String::new(),
            short_token_secret: String::new(),
            long_token_ttl_days: 90,
            short_token_ttl_days: 365,
            enable_cors: true,
            cors_origins: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source. Missing token
    /// secrets are fatal here so the process never starts without them.
    pub fn from_vars<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match get("APP_ENV").as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            Some("staging") | Some("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        let config = match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_overrides(&get)?;

        if config.security.long_token_secret.is_empty() {
            return Err(ConfigError::MissingVar("LONG_TOKEN_SECRET"));
        }
        if config.security.short_token_secret.is_empty() {
            return Err(ConfigError::MissingVar("SHORT_TOKEN_SECRET"));
        }
        if config.store.backend == StoreBackend::Postgres && config.store.database_url.is_none() {
            return Err(ConfigError::MissingVar("DATABASE_URL"));
        }

        Ok(config)
    }

    fn with_overrides<F>(mut self, get: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server overrides
        if let Some(v) = get("SCHOOL_API_PORT").or_else(|| get("PORT")) {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }

        // Store overrides
        if let Some(v) = get("STORE_BACKEND") {
            self.store.backend = match v.as_str() {
                "memory" => StoreBackend::Memory,
                "postgres" => StoreBackend::Postgres,
                _ => return Err(ConfigError::InvalidValue { var: "STORE_BACKEND", value: v }),
            };
        }
        if let Some(v) = get("DATABASE_URL") {
            self.store.database_url = Some(v);
        }
        if let Some(v) = get("DATABASE_MAX_CONNECTIONS") {
            self.store.max_connections = v.parse().unwrap_or(self.store.max_connections);
        }
        if let Some(v) = get("DATABASE_CONNECTION_TIMEOUT") {
            self.store.connection_timeout = v.parse().unwrap_or(self.store.connection_timeout);
        }
        if let Some(v) = get("DELETE_STRATEGY") {
            self.store.delete_strategy = match v.as_str() {
                "check_then_delete" => DeleteStrategy::CheckThenDelete,
                "conditional" => DeleteStrategy::Conditional,
                _ => return Err(ConfigError::InvalidValue { var: "DELETE_STRATEGY", value: v }),
            };
        }

        // API overrides
        if let Some(v) = get("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Some(v) = get("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Some(v) = get("LONG_TOKEN_SECRET") {
            self.security.long_token_secret = v;
        }
        if let Some(v) = get("SHORT_TOKEN_SECRET") {
            self.security.short_token_secret = v;
        }
        if let Some(v) = get("LONG_TOKEN_TTL_DAYS") {
            self.security.long_token_ttl_days = v.parse().unwrap_or(self.security.long_token_ttl_days);
        }
        if let Some(v) = get("SHORT_TOKEN_TTL_DAYS") {
            self.security.short_token_ttl_days = v.parse().unwrap_or(self.security.short_token_ttl_days);
        }
        if let Some(v) = get("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Some(v) = get("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }

        Ok(self)
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig { port: 5111 },
            store: StoreConfig {
                backend: StoreBackend::Memory,
                database_url: None,
                max_connections: 10,
                connection_timeout: 30,
                delete_strategy: DeleteStrategy::CheckThenDelete,
            },
            api: ApiConfig {
                enable_request_logging: true,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
            },
            security: SecurityConfig {
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                ..SecurityConfig::default()
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig { port: 5111 },
            store: StoreConfig {
                backend: StoreBackend::Postgres,
                database_url: None,
                max_connections: 20,
                connection_timeout: 10,
                delete_strategy: DeleteStrategy::Conditional,
            },
            api: ApiConfig {
                enable_request_logging: true,
                max_request_size_bytes: 5 * 1024 * 1024, // 5MB
            },
            security: SecurityConfig {
                cors_origins: vec!["https://staging.example.com".to_string()],
                ..SecurityConfig::default()
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig { port: 5111 },
            store: StoreConfig {
                backend: StoreBackend::Postgres,
                database_url: None,
                max_connections: 50,
                connection_timeout: 5,
                delete_strategy: DeleteStrategy::Conditional,
            },
            api: ApiConfig {
                enable_request_logging: false,
                max_request_size_bytes: 2 * 1024 * 1024, // 2MB
            },
            security: SecurityConfig {
                cors_origins: vec!["https://app.example.com".to_string()],
                ..SecurityConfig::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const SECRETS: [(&str, &str); 2] = [("LONG_TOKEN_SECRET", "l"), ("SHORT_TOKEN_SECRET", "s")];

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::from_vars(vars(&SECRETS)).unwrap();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.delete_strategy, DeleteStrategy::CheckThenDelete);
        assert_eq!(config.security.long_token_ttl_days, 90);
        assert_eq!(config.security.short_token_ttl_days, 365);
        assert_eq!(config.server.port, 5111);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert_eq!(config.store.backend, StoreBackend::Postgres);
        assert_eq!(config.store.delete_strategy, DeleteStrategy::Conditional);
        assert!(!config.api.enable_request_logging);
    }

    #[test]
    fn missing_secrets_are_fatal() {
        assert_eq!(
            AppConfig::from_vars(vars(&[("SHORT_TOKEN_SECRET", "s")])).unwrap_err(),
            ConfigError::MissingVar("LONG_TOKEN_SECRET")
        );
        assert_eq!(
            AppConfig::from_vars(vars(&[("LONG_TOKEN_SECRET", "l"), ("SHORT_TOKEN_SECRET", "")])).unwrap_err(),
            ConfigError::MissingVar("SHORT_TOKEN_SECRET")
        );
    }

    #[test]
    fn postgres_requires_database_url() {
        let mut pairs = SECRETS.to_vec();
        pairs.push(("STORE_BACKEND", "postgres"));
        assert_eq!(
            AppConfig::from_vars(vars(&pairs)).unwrap_err(),
            ConfigError::MissingVar("DATABASE_URL")
        );
    }

    #[test]
    fn overrides_apply_on_top_of_preset() {
        let mut pairs = SECRETS.to_vec();
        pairs.extend([
            ("APP_ENV", "production"),
            ("DATABASE_URL", "postgres://localhost/school"),
            ("DELETE_STRATEGY", "check_then_delete"),
            ("PORT", "8080"),
            ("LONG_TOKEN_TTL_DAYS", "30"),
        ]);
        let config = AppConfig::from_vars(vars(&pairs)).unwrap();
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.store.delete_strategy, DeleteStrategy::CheckThenDelete);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.security.long_token_ttl_days, 30);
    }

    #[test]
    fn unknown_delete_strategy_is_rejected() {
        let mut pairs = SECRETS.to_vec();
        pairs.push(("DELETE_STRATEGY", "yolo"));
        assert!(matches!(
            AppConfig::from_vars(vars(&pairs)),
            Err(ConfigError::InvalidValue { var: "DELETE_STRATEGY", .. })
        ));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let config = AppConfig::from_vars(vars(&SECRETS)).unwrap();
        let printed = format!("{:?}", config.security);
        assert!(printed.contains("<redacted>"));
        assert!(!printed.contains("long_token_secret: \"l\""));
    }
}
