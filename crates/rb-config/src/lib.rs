//! # rb-config
//!
//! Layered application configuration. Sources, lowest priority first:
//!
//! 1. built-in defaults
//! 2. `config/default.toml`, then `config/local.toml` (both optional)
//! 3. `RB__`-prefixed environment variables, `__` separating sections
//!    (e.g. `RB__DATABASE__URL`, `RB__EVENTS__TRANSPORT=redis`)
//!
//! A `.env` file in the working directory is loaded into the environment first.

use config::{Config, Environment, File};
use rb_core::events::COMMENT_EXCHANGE;
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub events: EventsConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseConfig {
    /// May embed credentials; never logged.
    pub url: SecretString,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Local,
    Redis,
}

#[derive(Debug, Deserialize)]
pub struct EventsConfig {
    pub exchange: String,
    /// Events buffered between the write path and the publish worker.
    pub queue_capacity: usize,
    pub transport: TransportKind,
    pub redis_url: Option<SecretString>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    pub json: bool,
}

impl AppConfig {
    /// Loads configuration from `./config`, `.env` and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::load_from("config")
    }

    pub fn load_from(dir: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("database.url", "sqlite:reply_board.db")?
            .set_default("database.max_connections", 5)?
            .set_default("events.exchange", COMMENT_EXCHANGE)?
            .set_default("events.queue_capacity", 1024)?
            .set_default("events.transport", "local")?
            .set_default("log.level", "info")?
            .set_default("log.json", false)?
            .add_source(File::with_name(&format!("{dir}/default")).required(false))
            .add_source(File::with_name(&format!("{dir}/local")).required(false))
            .add_source(Environment::with_prefix("RB").prefix_separator("__").separator("__"))
            .build()?;

        let app: AppConfig = config.try_deserialize()?;
        app.validate()?;
        debug!(host = %app.server.host, port = app.server.port, transport = ?app.events.transport, "configuration loaded");
        Ok(app)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.events.queue_capacity == 0 {
            return Err(ConfigError::Invalid("events.queue_capacity must be at least 1".into()));
        }
        if self.events.transport == TransportKind::Redis && self.events.redis_url.is_none() {
            return Err(ConfigError::Invalid(
                "events.redis_url is required when events.transport = \"redis\"".into(),
            ));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.server.host.clone(), self.server.port)
    }
}
