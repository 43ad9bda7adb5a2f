use anyhow::Result;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub feed_base_url: String,
    pub feed_user_agent: String,
    pub feed_timeout_secs: u64,
    pub fetch_batch_size: usize,
    pub max_locations: i64,
    pub push_endpoint: String,
    pub push_server_key: String,
    pub push_timeout_secs: u64,
    pub max_tokens_per_send: usize,
    pub dispatch_batch_size: usize,
    pub poll_interval_secs: u64,
    pub alert_retention_days: i32,
    pub token_stale_days: i32,
    pub log_level: String,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        dotenv().ok();

        let feed_base_url =
            env::var("FEED_BASE_URL").unwrap_or_else(|_| "https://api.weather.gov".to_string());
        let feed_user_agent = env::var("FEED_USER_AGENT")
            .unwrap_or_else(|_| "weather-alert-engine/0.1 (ops@weatheralerts.app)".to_string());
        let feed_timeout_secs = parse_env("FEED_TIMEOUT_SECS", 10);
        let fetch_batch_size = parse_env("FETCH_BATCH_SIZE", 5);
        let max_locations = parse_env("MAX_LOCATIONS", 50);

        let push_endpoint = env::var("PUSH_ENDPOINT")
            .unwrap_or_else(|_| "https://fcm.googleapis.com/fcm/send".to_string());
        let push_server_key = env::var("PUSH_SERVER_KEY").unwrap_or_default();
        let push_timeout_secs = parse_env("PUSH_TIMEOUT_SECS", 10);
        let max_tokens_per_send = parse_env("MAX_TOKENS_PER_SEND", 500);
        let dispatch_batch_size = parse_env("DISPATCH_BATCH_SIZE", 10);

        let poll_interval_secs = parse_env("POLL_INTERVAL_SECS", 300);
        let alert_retention_days = parse_env("ALERT_RETENTION_DAYS", 30);
        let token_stale_days = parse_env("TOKEN_STALE_DAYS", 90);

        let db_host = env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string());
        let db_port = env::var("DB_PORT").unwrap_or_else(|_| "5432".to_string());
        let db_name = env::var("DB_DATABASE").unwrap_or_else(|_| "weather_alerts".to_string());
        let db_user = env::var("DB_USER").unwrap_or_else(|_| "weather".to_string());
        let db_pwd = env::var("DB_PWD").unwrap_or_else(|_| "weather".to_string());

        let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| {
            format!(
                "postgres://{}:{}@{}:{}/{}",
                db_user, db_pwd, db_host, db_port, db_name
            )
        });

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            database_url,
            feed_base_url,
            feed_user_agent,
            feed_timeout_secs,
            fetch_batch_size,
            max_locations,
            push_endpoint,
            push_server_key,
            push_timeout_secs,
            max_tokens_per_send,
            dispatch_batch_size,
            poll_interval_secs,
            alert_retention_days,
            token_stale_days,
            log_level,
        })
    }
}

fn parse_env<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
