//! Configuration management for the Distribution Ledger
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with DL_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT authentication configuration
    pub jwt: JwtConfig,

    /// Inventory ledger configuration
    pub ledger: LedgerConfig,

    /// Order configuration
    pub orders: OrdersConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

/// Which store implementation backs the service
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    /// Process-local store; state is lost on restart
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub backend: StorageBackend,

    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Seconds to wait for a pooled connection
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key for verifying JWT tokens issued by the identity service
    pub secret: String,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct LedgerConfig {
    /// Reorder level given to quantity records created implicitly
    pub default_reorder_level: i64,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct OrdersConfig {
    /// Attempts at allocating a free order number before giving up
    pub number_retry_attempts: u32,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("DL_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.backend", "postgres")?
            .set_default("database.url", "postgres://localhost/distribution_ledger")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("ledger.default_reorder_level", 10)?
            .set_default("orders.number_retry_attempts", 3)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (DL_ prefix)
            .add_source(
                Environment::with_prefix("DL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            default_reorder_level: 10,
        }
    }
}

impl Default for OrdersConfig {
    fn default() -> Self {
        Self {
            number_retry_attempts: 3,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Postgres,
            url: "postgres://localhost/distribution_ledger".to_string(),
            max_connections: 10,
            min_connections: 2,
            acquire_timeout_secs: 30,
        }
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: "development-secret-key".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            jwt: JwtConfig::default(),
            ledger: LedgerConfig::default(),
            orders: OrdersConfig::default(),
        }
    }
}
