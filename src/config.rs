use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub store_path: String,
    pub store_key: String,
    pub optimizer_url: String,
    pub optimizer_timeout_ms: u64,
    pub event_buffer_size: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            store_path: env::var("STORE_PATH").unwrap_or_else(|_| "deliveries.json".to_string()),
            store_key: env::var("STORE_KEY").unwrap_or_else(|_| "deliveries".to_string()),
            optimizer_url: env::var("OPTIMIZER_URL")
                .unwrap_or_else(|_| "http://localhost:8090/optimize".to_string()),
            optimizer_timeout_ms: parse_or_default("OPTIMIZER_TIMEOUT_MS", 15_000)?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
