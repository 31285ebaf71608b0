use serde::Deserialize;
use std::env;

use crate::api::middleware::AppError;
use crate::models::DatabaseFamily;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database family selecting the SQL dialect (postgresql, oracle, sqlserver)
    pub family: String,
    pub url: Option<String>,
    pub max_pool_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Try to load from .env file
        let _ = dotenv::dotenv();

        let mut builder = config::Config::builder()
            .set_default("database.family", "postgresql")?
            .set_default("database.max_pool_size", 16)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("logging.level", "info")?;

        // Load from environment variables
        if let Ok(family) = env::var("DATABASE_FAMILY") {
            builder = builder.set_override("database.family", family)?;
        }

        if let Ok(database_url) = env::var("DATABASE_URL") {
            builder = builder.set_override("database.url", database_url)?;
        }

        if let Ok(max_pool_size) = env::var("DATABASE_MAX_POOL_SIZE") {
            builder = builder.set_override(
                "database.max_pool_size",
                max_pool_size.parse::<u64>().unwrap_or(16),
            )?;
        }

        if let Ok(host) = env::var("HOST") {
            builder = builder.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            builder = builder.set_override("server.port", port.parse::<u16>().unwrap_or(3000))?;
        }

        if let Ok(log_level) = env::var("RUST_LOG") {
            builder = builder.set_override("logging.level", log_level)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Configured database family; an unknown family is a fatal configuration error
    pub fn database_family(&self) -> Result<DatabaseFamily, AppError> {
        self.database.family.parse()
    }

    /// Database URL with any password replaced, for logging
    pub fn masked_database_url(&self) -> Option<String> {
        self.database.url.as_deref().map(mask_credentials)
    }
}

/// Mask credentials in connection URL for safe logging
pub fn mask_credentials(url: &str) -> String {
    if let Ok(parsed_url) = url::Url::parse(url) {
        let mut masked = parsed_url.clone();
        if parsed_url.password().is_some() {
            let _ = masked.set_password(Some("***"));
        }
        masked.to_string()
    } else {
        "[invalid-url]".to_string()
    }
}
