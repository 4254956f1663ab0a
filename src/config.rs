use anyhow::Result;
use figment::{providers::{Env, Format, Toml}, Figment};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// `EnvFilter` directives used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            filter: "info,sqlx=warn,tower_http=info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    30
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

/// Storage engine connection settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    /// Run `CREATE TABLE IF NOT EXISTS` for every registered entity at startup
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://grill_stats.db?mode=rwc".to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,
            auto_migrate: false,
        }
    }
}

impl DatabaseConfig {
    /// Settings for a private in-memory database.
    ///
    /// A single connection is used so that every manager call sees the same
    /// in-memory database.
    pub fn in_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            ..Self::default()
        }
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let figment = Figment::new()
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("GRILL__").split("__"));
        Self::from_figment(figment)
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        Ok(figment.extract()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_config_default() {
        let config = DatabaseConfig::default();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.acquire_timeout(), Duration::from_secs(30));
        assert!(!config.auto_migrate);
    }

    #[test]
    fn test_config_from_toml_fills_database_defaults() {
        let figment = Figment::new().merge(Toml::string(
            r#"
            [server]
            host = "0.0.0.0"
            port = 9000

            [database]
            url = "sqlite::memory:"
            auto_migrate = true
            "#,
        ));

        let config = Config::from_figment(figment).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.request_timeout_secs, 30);
        assert_eq!(config.database.url, "sqlite::memory:");
        assert!(config.database.auto_migrate);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(
            config.server.socket_addr().unwrap().to_string(),
            "0.0.0.0:9000"
        );
    }

    #[test]
    fn test_logging_section() {
        let figment = Figment::new().merge(Toml::string(
            r#"
            [server]
            host = "127.0.0.1"
            port = 8080

            [database]

            [logging]
            format = "pretty"
            "#,
        ));

        let config = Config::from_figment(figment).unwrap();
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.logging.filter, LoggingConfig::default().filter);
        assert_eq!(config.database.url, DatabaseConfig::default().url);
    }

    #[test]
    fn test_config_missing_server_section_fails() {
        let figment = Figment::new().merge(Toml::string("[database]\nurl = \"x\""));
        assert!(Config::from_figment(figment).is_err());
    }
}
