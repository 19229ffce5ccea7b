pub mod database;

use config::{Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
    pub max_db_connections: u32,
    pub log_format: LogFormat,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Config {
    /// Layered load: built-in defaults, then `waterstation.toml` if present,
    /// then `WATERSTATION_*` environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let settings = config::Config::builder()
            .set_default("database_url", "sqlite://waterstation.db")?
            .set_default("host", "0.0.0.0")?
            .set_default("port", 8000)?
            .set_default("jwt_secret", "")?
            .set_default("access_token_ttl_minutes", 60)?
            .set_default("refresh_token_ttl_days", 1)?
            .set_default("max_db_connections", 5)?
            .set_default("log_format", "pretty")?
            .add_source(File::with_name("waterstation").required(false))
            .add_source(
                Environment::with_prefix("WATERSTATION")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("cors_origins"),
            )
            .build()?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.jwt_secret.trim().is_empty() {
            return Err(anyhow::anyhow!("WATERSTATION_JWT_SECRET must be set"));
        }
        if self.access_token_ttl_minutes <= 0 || self.refresh_token_ttl_days <= 0 {
            return Err(anyhow::anyhow!("Token lifetimes must be positive"));
        }
        if self.max_db_connections == 0 {
            return Err(anyhow::anyhow!("max_db_connections must be at least 1"));
        }
        Ok(())
    }

    /// Configuration for tests and local tooling: in-memory database, fixed secret.
    pub fn for_tests() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            jwt_secret: "test-secret".to_string(),
            access_token_ttl_minutes: 60,
            refresh_token_ttl_days: 1,
            max_db_connections: 1,
            log_format: LogFormat::Pretty,
            cors_origins: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_secret_is_rejected() {
        let mut config = Config::for_tests();
        config.jwt_secret = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_connections_is_rejected() {
        let mut config = Config::for_tests();
        config.max_db_connections = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_is_valid() {
        assert!(Config::for_tests().validate().is_ok());
    }
}
