//! Shared HTTP client for adapter requests.
//!
//! Every adapter receives an [`HttpContext`] holding one configured
//! [`reqwest::Client`] (timeout + User-Agent from `[http]`) and the pause
//! to insert between consecutive requests to the same upstream.

use anyhow::{bail, Context, Result};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::config::HttpConfig;

#[derive(Clone)]
pub struct HttpContext {
    client: reqwest::Client,
    request_pause: Duration,
}

impl HttpContext {
    pub fn from_config(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            request_pause: Duration::from_millis(config.request_pause_ms),
        })
    }

    /// Same settings as `from_config`, with a different pause.
    pub fn with_request_pause(mut self, pause: Duration) -> Self {
        self.request_pause = pause;
        self
    }

    pub fn request_pause(&self) -> Duration {
        self.request_pause
    }

    /// Start a GET request.
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    /// Send and decode a JSON body. Non-2xx statuses are errors.
    pub async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            bail!("{} returned HTTP {}", response.url(), status);
        }
        Ok(response.json::<T>().await?)
    }

    /// Send and read the body as text. Non-2xx statuses are errors.
    pub async fn send_text(&self, request: RequestBuilder) -> Result<String> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            bail!("{} returned HTTP {}", response.url(), status);
        }
        Ok(response.text().await?)
    }

    /// Sleep for the configured inter-request pause.
    pub async fn pause(&self) {
        if !self.request_pause.is_zero() {
            tokio::time::sleep(self.request_pause).await;
        }
    }
}
