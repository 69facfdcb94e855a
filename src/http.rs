// src/http.rs
//
// JSON fetches for the source feeds, with bounded exponential-backoff retries.

use crate::settings::Http;
use anyhow::{anyhow, Context, Result};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::Retry;
use url::Url;

#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    max_retries: usize,
    base_delay_ms: u64,
    max_delay: Duration,
}

impl HttpFetcher {
    pub fn new(cfg: &Http) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            max_retries: cfg.max_retries,
            base_delay_ms: cfg.retry_base_delay_ms.max(1),
            max_delay: Duration::from_millis(cfg.retry_max_delay_ms),
        })
    }

    fn strategy(&self) -> impl Iterator<Item = Duration> {
        // base * 2^n, capped
        ExponentialBackoff::from_millis(2)
            .factor(self.base_delay_ms / 2 + 1)
            .max_delay(self.max_delay)
            .take(self.max_retries)
    }

    /// GET `url` with `headers` and decode the body as JSON.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &Url, headers: &[(&str, &str)]) -> Result<T> {
        let mut attempt = 0u32;
        Retry::start(self.strategy(), || {
            attempt += 1;
            let current = attempt;
            async move {
                let mut request = self.client.get(url.clone());
                for (name, value) in headers {
                    request = request.header(*name, *value);
                }
                let result = Self::decode::<T>(request.send().await).await;
                if let Err(e) = &result {
                    warn!("GET {} failed (attempt {}): {}", url, current, e);
                }
                result
            }
        })
        .await
    }

    /// POST a JSON body and decode the JSON response.
    pub async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(&self, url: &Url, body: &B) -> Result<T> {
        let mut attempt = 0u32;
        Retry::start(self.strategy(), || {
            attempt += 1;
            let current = attempt;
            async move {
                let result = Self::decode::<T>(self.client.post(url.clone()).json(body).send().await).await;
                if let Err(e) = &result {
                    warn!("POST {} failed (attempt {}): {}", url, current, e);
                }
                result
            }
        })
        .await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Result<reqwest::Response>) -> Result<T> {
        let response = response.map_err(|e| anyhow!("HTTP request failed: {}", e))?;
        let status = response.status();
        if !status.is_success() {
            if status.as_u16() == 429 {
                return Err(anyhow!("Rate limited (429)"));
            }
            return Err(anyhow!("HTTP error: {}", status));
        }
        debug!("HTTP {} from {}", status, response.url());
        response
            .json::<T>()
            .await
            .map_err(|e| anyhow!("JSON parse failed: {}", e))
    }
}
