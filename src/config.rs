use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub pool: PoolSettings,
    pub logging: LoggingConfig,
}

/// SQLite file holding connection configs and query history
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Sizing and liveness settings for tenant connection pools
#[derive(Debug, Clone, Deserialize)]
pub struct PoolSettings {
    pub max_size: usize,
    pub connect_timeout_secs: u64,
    pub checkout_timeout_secs: u64,
}

impl PoolSettings {
    /// Upper bound on opening and validating one physical connection
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// How long a statement waits for a free pooled connection
    pub fn checkout_timeout(&self) -> Duration {
        Duration::from_secs(self.checkout_timeout_secs)
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_size: 16,
            connect_timeout_secs: 2,
            checkout_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub style: String,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Try to load from .env file
        let _ = dotenv::dotenv();

        let defaults = PoolSettings::default();
        let mut builder = config::Config::builder()
            .set_default("database.url", "./db_assistant.db")?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("pool.max_size", defaults.max_size as u64)?
            .set_default("pool.connect_timeout_secs", defaults.connect_timeout_secs)?
            .set_default("pool.checkout_timeout_secs", defaults.checkout_timeout_secs)?
            .set_default("logging.level", "info")?
            .set_default("logging.style", "auto")?;

        // Load from environment variables
        if let Ok(database_url) = env::var("DATABASE_URL") {
            builder = builder.set_override("database.url", database_url)?;
        }

        if let Ok(host) = env::var("HOST") {
            builder = builder.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            builder = builder.set_override("server.port", port.parse::<u16>().unwrap_or(3000))?;
        }

        if let Ok(max_size) = env::var("POOL_MAX_SIZE") {
            builder = builder.set_override("pool.max_size", max_size.parse::<u64>().unwrap_or(16))?;
        }

        if let Ok(timeout) = env::var("POOL_CONNECT_TIMEOUT_SECS") {
            builder = builder.set_override("pool.connect_timeout_secs", timeout.parse::<u64>().unwrap_or(2))?;
        }

        if let Ok(timeout) = env::var("POOL_CHECKOUT_TIMEOUT_SECS") {
            builder = builder.set_override("pool.checkout_timeout_secs", timeout.parse::<u64>().unwrap_or(30))?;
        }

        if let Ok(log_level) = env::var("RUST_LOG") {
            builder = builder.set_override("logging.level", log_level)?;
        }

        if let Ok(log_style) = env::var("RUST_LOG_STYLE") {
            builder = builder.set_override("logging.style", log_style)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
