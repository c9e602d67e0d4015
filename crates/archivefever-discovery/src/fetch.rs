//! Document fetch

use crate::error::{DiscoveryError, DiscoveryResult};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Retrieves the full body of a document by URL.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> DiscoveryResult<String>;
}

pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_FETCH_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            timeout,
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> DiscoveryResult<String> {
        debug!("Fetching {}", url);
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DiscoveryError::Timeout(self.timeout.as_millis() as u64)
                } else {
                    DiscoveryError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}
