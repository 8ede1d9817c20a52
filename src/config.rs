use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub document_store_dir: String,
    pub document_base_url: Option<String>,
    pub notify_webhook_url: Option<String>,
    pub catalog_path: Option<String>,
    pub queue_poll_ms: u64,
    pub queue_lease_ms: i64,
    pub monthly_approval_limit: i64,
    pub sponsor_guarantee_limit: i64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = parse_or(&env_map, "PORT", 8080u16, "must be a valid u16")?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let document_store_dir = env_map
            .get("DOCUMENT_STORE_DIR")
            .cloned()
            .unwrap_or_else(|| "./data/documents".to_string());

        let queue_poll_ms = parse_or(&env_map, "QUEUE_POLL_MS", 1000u64, "must be a valid u64")?;
        if queue_poll_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "QUEUE_POLL_MS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let queue_lease_ms = parse_or(&env_map, "QUEUE_LEASE_MS", 60_000i64, "must be a valid i64")?;

        let monthly_approval_limit =
            parse_positive(&env_map, "MONTHLY_APPROVAL_LIMIT", 5)?;
        let sponsor_guarantee_limit =
            parse_positive(&env_map, "SPONSOR_GUARANTEE_LIMIT", 2)?;

        Ok(Config {
            port,
            database_path,
            document_store_dir,
            document_base_url: non_empty(&env_map, "DOCUMENT_BASE_URL"),
            notify_webhook_url: non_empty(&env_map, "NOTIFY_WEBHOOK_URL"),
            catalog_path: non_empty(&env_map, "CATALOG_PATH"),
            queue_poll_ms,
            queue_lease_ms,
            monthly_approval_limit,
            sponsor_guarantee_limit,
        })
    }
}

fn non_empty(env_map: &HashMap<String, String>, key: &str) -> Option<String> {
    env_map
        .get(key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_or<T: std::str::FromStr>(
    env_map: &HashMap<String, String>,
    key: &str,
    default: T,
    hint: &str,
) -> Result<T, ConfigError> {
    match env_map.get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(key.to_string(), hint.to_string())),
    }
}

fn parse_positive(
    env_map: &HashMap<String, String>,
    key: &str,
    default: i64,
) -> Result<i64, ConfigError> {
    let value = parse_or(env_map, key, default, "must be a valid integer")?;
    if value < 1 {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            format!("must be at least 1, got {}", value),
        ));
    }
    Ok(value)
}
