//! HTTP client wrapper with retries and bearer auth

use crate::error::{NetworkError, NetworkResult};
use crate::retry::RetryPolicy;
use reqwest::{Client as ReqwestClient, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Per-request timeout
    pub timeout: Duration,
    pub user_agent: String,
    pub max_redirects: usize,
    pub retry_policy: RetryPolicy,
}

impl ClientConfig {
    /// Config using the server section's timeout and retry count
    pub fn from_limits(timeout_secs: u64, max_retries: u32) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs),
            retry_policy: RetryPolicy::new(max_retries.saturating_add(1)),
            ..Self::default()
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("Earshot/{}", env!("CARGO_PKG_VERSION")),
            max_redirects: 10,
            retry_policy: RetryPolicy::default(),
        }
    }
}

/// HTTP client shared by every server-facing collaborator
#[derive(Clone)]
pub struct Client {
    inner: ReqwestClient,
    config: ClientConfig,
}

impl Client {
    pub fn new() -> NetworkResult<Self> {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> NetworkResult<Self> {
        let inner = ReqwestClient::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self { inner, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// GET `url`, optionally authenticated with a bearer token
    pub async fn get(&self, url: &str, token: Option<&str>) -> NetworkResult<Response> {
        self.request(|| authorize(self.inner.get(url), token)).await
    }

    /// GET `url` and decode the JSON body
    pub async fn get_json<R>(&self, url: &str, token: Option<&str>) -> NetworkResult<R>
    where
        R: DeserializeOwned,
    {
        let response = self.get(url, token).await?;
        decode(response).await
    }

    /// POST `body` as JSON to `url` and decode the JSON reply
    pub async fn post_json<B, R>(&self, url: &str, body: &B, token: Option<&str>) -> NetworkResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .request(|| authorize(self.inner.post(url).json(body), token))
            .await?;
        decode(response).await
    }

    /// Sends the request built by `build`, retrying transport failures and 5xx
    ///
    /// 4xx responses are returned at once; retrying them cannot help.
    async fn request<F>(&self, build: F) -> NetworkResult<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let policy = &self.config.retry_policy;
        let mut attempt = 0;

        loop {
            attempt += 1;

            let error = match build().send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    NetworkError::Status {
                        status: status.as_u16(),
                        message: status.canonical_reason().unwrap_or("Unknown").to_string(),
                    }
                }
                Err(e) => NetworkError::Http(e),
            };

            if !error.is_retryable() || !policy.should_retry(attempt) {
                return Err(error);
            }

            let delay = policy.delay_for_attempt(attempt);
            log::debug!(
                "Request attempt {}/{} failed ({}), retrying in {:?}",
                attempt,
                policy.max_attempts(),
                error,
                delay
            );
            tokio::time::sleep(delay).await;
        }
    }
}

fn authorize(builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => builder.bearer_auth(token),
        None => builder,
    }
}

async fn decode<R: DeserializeOwned>(response: Response) -> NetworkResult<R> {
    let body = response.text().await?;
    Ok(serde_json::from_str(&body)?)
}
