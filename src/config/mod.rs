use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub scheduler: SchedulerConfig,
    /// Externally reachable base URL used to compose absolute tracking links
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub token: String,
    /// The single chat id allowed to run broadcast/schedule commands
    pub admin_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub poll_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let token = std::env::var("TELEGRAM_TOKEN").context("TELEGRAM_TOKEN must be set")?;

        let admin_id = std::env::var("ADMIN_ID")
            .context("ADMIN_ID must be set")?
            .parse::<i64>()
            .context("ADMIN_ID must be an integer chat id")?;

        let base_url = std::env::var("BASE_URL").context("BASE_URL must be set")?;
        let base_url = base_url.trim_end_matches('/').to_string();
        url::Url::parse(&base_url).context("BASE_URL must be an absolute URL")?;
        if !base_url.starts_with("https://") {
            tracing::warn!(
                "BASE_URL does not use https; tracking links should use a secure scheme in production"
            );
        }

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./tracklink.db?mode=rwc".to_string());
        let max_connections = std::env::var("SQLITE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(5);

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .context("PORT must be a valid port number")?;

        let poll_interval_secs = std::env::var("DISPATCH_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(60);

        Ok(Config {
            telegram: TelegramConfig { token, admin_id },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            server: ServerConfig { host, port },
            scheduler: SchedulerConfig { poll_interval_secs },
            base_url,
        })
    }
}
