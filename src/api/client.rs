use crate::config;
use reqwest::{Client, RequestBuilder};
use std::time::Duration;

pub fn build_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(config::http_timeout_secs()))
        .connect_timeout(Duration::from_secs(config::http_connect_timeout_secs()))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Attaches the bearer token when one is configured.
pub fn authorize(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}
