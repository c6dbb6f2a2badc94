use std::{env, fmt::Display, str::FromStr, time::Duration};

use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub jwt_secret: String,
    pub cors_origin: String,
    pub strict_vote_direction: bool,
    pub default_page_size: i64,
    pub busy_timeout: Duration,
    pub notify_queue: usize,
}

const DEFAULTS: &[(&str, &str)] = &[
    ("DATABASE_URL", "engage.db"),
    ("BIND_ADDR", "0.0.0.0:8080"),
    ("JWT_SECRET", "dev-secret-change-me"),
    ("CORS_ORIGIN", "http://localhost:1313"),
    ("STRICT_VOTE_DIRECTION", "true"),
    ("DEFAULT_PAGE_SIZE", "10"),
    ("DB_BUSY_TIMEOUT_MS", "5000"),
    ("NOTIFY_QUEUE", "1024"),
];

impl Config {
    /// Reads every setting from the environment, falling back to the built-in defaults.
    pub fn load() -> Self {
        Self::build(|key, default| env::var(key).ok().unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        }))
    }

    fn build(lookup: impl Fn(&str, &str) -> String) -> Self {
        let get = |key: &str| {
            let default = DEFAULTS
                .iter()
                .find(|(k, _)| *k == key)
                .map_or("", |(_, v)| *v);
            lookup(key, default)
        };
        Self {
            database_url: parse("DATABASE_URL", get("DATABASE_URL")),
            bind_addr: parse("BIND_ADDR", get("BIND_ADDR")),
            jwt_secret: parse("JWT_SECRET", get("JWT_SECRET")),
            cors_origin: parse("CORS_ORIGIN", get("CORS_ORIGIN")),
            strict_vote_direction: parse("STRICT_VOTE_DIRECTION", get("STRICT_VOTE_DIRECTION")),
            default_page_size: parse("DEFAULT_PAGE_SIZE", get("DEFAULT_PAGE_SIZE")),
            busy_timeout: Duration::from_millis(parse("DB_BUSY_TIMEOUT_MS", get("DB_BUSY_TIMEOUT_MS"))),
            notify_queue: parse("NOTIFY_QUEUE", get("NOTIFY_QUEUE")),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::build(|_, default| default.to_string())
    }
}

fn parse<T: FromStr>(key: &str, raw: String) -> T
where
    T::Err: Display,
{
    raw.parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}
