// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, REFERER};

use crate::error::{AppError, Result};
use crate::models::HarvestConfig;

fn default_headers(config: &HarvestConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    let referer = HeaderValue::from_str(config.referer())
        .map_err(|e| AppError::config(format!("Invalid referer: {e}")))?;
    headers.insert(REFERER, referer);
    Ok(headers)
}

/// Create the client for the sequential discovery chain.
///
/// It keeps cookies, so the form state established by one call is visible
/// to the next.
pub fn create_session_client(config: &HarvestConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .default_headers(default_headers(config)?)
        .timeout(Duration::from_secs(config.timeout_secs))
        .cookie_store(true)
        .build()?;
    Ok(client)
}

/// Create the client used by leaf workers.
///
/// No cookie store and no idle connection reuse: every leaf request opens its
/// own connection and carries no session state.
pub fn create_leaf_client(config: &HarvestConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .default_headers(default_headers(config)?)
        .timeout(Duration::from_secs(config.timeout_secs))
        .pool_max_idle_per_host(0)
        .build()?;
    Ok(client)
}

/// Read a response body as UTF-8 regardless of its declared charset.
pub async fn read_utf8(response: reqwest::Response) -> Result<String> {
    let bytes = response.bytes().await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
