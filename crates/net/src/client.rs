//! HTTP client with connection pooling and request retry

use pkgcore_config::NetworkConfig;
use pkgcore_errors::{Error, NetworkError};
use reqwest::header::{HeaderValue, RANGE, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

/// Network client configuration
#[derive(Debug, Clone)]
pub struct NetConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub pool_idle_timeout: Duration,
    pub pool_max_idle_per_host: usize,
    /// Extra attempts for requests that never produced a response
    pub retry_count: u32,
    pub retry_delay: Duration,
    pub user_agent: String,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self::from(&NetworkConfig::default())
    }
}

impl From<&NetworkConfig> for NetConfig {
    fn from(config: &NetworkConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout),
            connect_timeout: Duration::from_secs(config.connect_timeout),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 10,
            retry_count: 2,
            retry_delay: Duration::from_secs(1),
            user_agent: config.user_agent.clone(),
        }
    }
}

/// HTTP client wrapper
#[derive(Clone, Debug)]
pub struct NetClient {
    client: Client,
    config: NetConfig,
}

impl NetClient {
    /// Create a new network client with the given configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: NetConfig) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| NetworkError::ConnectionRefused(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// GET a URL, asking for the bytes from `offset` onwards when given
    ///
    /// The response status is not checked here.
    ///
    /// # Errors
    ///
    /// Returns an error if no response arrives after all retries.
    pub async fn get_from(&self, url: &str, offset: Option<u64>) -> Result<Response, Error> {
        let range = match offset {
            Some(offset) if offset > 0 => Some(
                HeaderValue::from_str(&format!("bytes={offset}-"))
                    .map_err(|e| NetworkError::InvalidUrl(e.to_string()))?,
            ),
            _ => None,
        };

        self.retry_request(url, || {
            let request = self.client.get(url);
            match &range {
                Some(value) => request.header(RANGE, value.clone()),
                None => request,
            }
        })
        .await
    }

    /// Send a request, retrying on connection-level failures and 429
    async fn retry_request<F>(&self, url: &str, build: F) -> Result<Response, Error>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0u32;
        loop {
            let failure = match build().send().await {
                Ok(response) if response.status() == StatusCode::TOO_MANY_REQUESTS => {
                    let seconds = response
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .unwrap_or(60);
                    NetworkError::RateLimited { seconds }
                }
                Ok(response) => return Ok(response),
                Err(e) if e.is_timeout() => NetworkError::Timeout {
                    url: url.to_string(),
                },
                Err(e) if e.is_connect() => NetworkError::ConnectionRefused(e.to_string()),
                Err(e) => return Err(NetworkError::DownloadFailed(e.to_string()).into()),
            };

            if attempt >= self.config.retry_count {
                return Err(failure.into());
            }
            attempt += 1;
            tracing::debug!(url, attempt, error = %failure, "retrying request");
            tokio::time::sleep(self.config.retry_delay * attempt).await;
        }
    }
}
