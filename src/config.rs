use once_cell::sync::Lazy;
use std::{env, time::Duration};

fn env_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|value| value.trim().parse().ok())
}

pub static LISTING_API_URL: Lazy<String> = Lazy::new(|| {
    env_or("LISTING_API_URL", "http://127.0.0.1:8000/api/v1")
        .trim_end_matches('/')
        .to_string()
});

pub static LISTING_API_TOKEN: Lazy<Option<String>> = Lazy::new(|| {
    env::var("LISTING_API_TOKEN")
        .ok()
        .filter(|token| !token.trim().is_empty())
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategorySourceKind {
    Static,
    Remote,
}

pub static CATEGORY_SOURCE: Lazy<CategorySourceKind> = Lazy::new(|| {
    match env_or("CATEGORY_SOURCE", "static").to_ascii_lowercase().as_str() {
        "remote" | "http" => CategorySourceKind::Remote,
        _ => CategorySourceKind::Static,
    }
});

pub fn port() -> u16 {
    env_parse("PORT").unwrap_or(8000)
}

/// Photo batches travel as base64 inside JSON, so the default is generous.
pub fn body_limit() -> usize {
    env_parse::<usize>("REQUEST_MAX_BYTES")
        .filter(|value| *value > 0)
        .unwrap_or(16 * 1024 * 1024)
}

pub fn http_timeout_secs() -> u64 {
    env_parse("HTTP_TIMEOUT_SECS").unwrap_or(15)
}

pub fn http_connect_timeout_secs() -> u64 {
    env_parse("HTTP_CONNECT_TIMEOUT_SECS").unwrap_or(5)
}

pub fn idempotency_ttl_secs() -> u64 {
    env_parse("IDEMPOTENCY_TTL_SECS").unwrap_or(3600)
}

pub fn redis_url() -> Option<String> {
    env::var("REDIS_URL").ok().filter(|url| !url.trim().is_empty())
}

pub fn metrics_key() -> Option<String> {
    env::var("METRICS_KEY").ok()
}

/// When set, uploaded photo bytes wait on disk here until finalize instead of in memory.
pub fn photo_spool_dir() -> Option<std::path::PathBuf> {
    env::var("PHOTO_SPOOL_DIR")
        .ok()
        .filter(|dir| !dir.trim().is_empty())
        .map(std::path::PathBuf::from)
}

/// Sessions untouched for this long are closed and their previews released.
pub static SESSION_IDLE_TTL: Lazy<Duration> = Lazy::new(|| {
    Duration::from_secs(
        env_parse::<u64>("SESSION_IDLE_TTL_SECS")
            .filter(|secs| *secs > 0)
            .unwrap_or(1800),
    )
});
