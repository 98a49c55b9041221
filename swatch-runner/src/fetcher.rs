//! Image fetcher
//!
//! Retrieves the raw bytes of a record's image over HTTP(S).
//!
//! A fetch runs in two steps: a HEAD probe that rejects dead links before any
//! body is transferred, then a GET whose body is read chunk by chunk into a
//! bounded in-memory buffer. The buffer is owned by the fetch future, so it is
//! released on every exit path including cancellation.
//!
//! The fetcher never retries.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Client, Response, StatusCode};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::Config;

/// Trait for image sources, enabling fakes in tests
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fetches the complete body of the image at `url`
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError>;
}

/// Failure to retrieve an image
#[derive(Debug, Error)]
#[error("failed to fetch {url}: {cause}")]
pub struct FetchError {
    pub url: String,
    #[source]
    pub cause: FetchCause,
}

impl FetchError {
    pub fn new(url: &Url, cause: FetchCause) -> Self {
        Self {
            url: url.to_string(),
            cause,
        }
    }
}

/// Why a fetch failed
#[derive(Debug, Error)]
pub enum FetchCause {
    /// Connection-level failure (DNS, refused, TLS, ...)
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    /// The HEAD probe returned a non-success status
    #[error("probe returned status {0}")]
    ProbeStatus(u16),

    /// The GET returned a non-success status
    #[error("server returned status {0}")]
    Status(u16),

    /// The fetch did not complete within its deadline
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The body is larger than the configured limit
    #[error("image exceeds {limit} bytes")]
    TooLarge { limit: usize },

    /// The connection dropped while the body was being read, including a
    /// body shorter than its advertised length
    #[error("body transfer failed: {0}")]
    Body(#[source] reqwest::Error),
}

/// reqwest-backed image fetcher
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    client: Client,
    timeout: Duration,
    max_bytes: usize,
}

impl HttpImageFetcher {
    /// Creates a fetcher with a preconfigured client
    ///
    /// # Arguments
    /// * `client` - HTTP client (connection pooling is shared across fetches)
    /// * `timeout` - Deadline for one complete fetch
    /// * `max_bytes` - Largest accepted body
    pub fn new(client: Client, timeout: Duration, max_bytes: usize) -> Self {
        Self {
            client,
            timeout,
            max_bytes,
        }
    }

    /// Builds a fetcher from the runner configuration
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(config.fetch_timeout)
            .connect_timeout(config.fetch_timeout.min(Duration::from_secs(10)))
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self::new(client, config.fetch_timeout, config.max_image_bytes))
    }

    /// Checks that the resource exists without transferring its body
    ///
    /// Returns the advertised length when the server reports one. Servers that
    /// do not implement HEAD (405, 501) are treated as inconclusive.
    async fn probe(&self, url: &Url) -> Result<Option<u64>, FetchCause> {
        let response = self
            .client
            .head(url.clone())
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();

        if status == StatusCode::METHOD_NOT_ALLOWED || status == StatusCode::NOT_IMPLEMENTED {
            debug!("HEAD not supported by {} ({}), skipping probe", url, status);
            return Ok(None);
        }

        if !status.is_success() {
            return Err(FetchCause::ProbeStatus(status.as_u16()));
        }

        Ok(advertised_length(&response))
    }

    async fn download(&self, url: &Url) -> Result<Vec<u8>, FetchCause> {
        if let Some(length) = self.probe(url).await? {
            self.check_length(length)?;
        }

        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchCause::Status(status.as_u16()));
        }

        let expected = advertised_length(&response);
        if let Some(length) = expected {
            self.check_length(length)?;
        }

        let capacity = expected.unwrap_or(0).min(self.max_bytes as u64) as usize;
        let mut body = Vec::with_capacity(capacity);

        // hyper enforces Content-Length, so a short body surfaces as a chunk error
        while let Some(chunk) = response.chunk().await.map_err(|e| self.body_error(e))? {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(FetchCause::TooLarge {
                    limit: self.max_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(body)
    }

    fn check_length(&self, length: u64) -> Result<(), FetchCause> {
        if length > self.max_bytes as u64 {
            return Err(FetchCause::TooLarge {
                limit: self.max_bytes,
            });
        }
        Ok(())
    }

    fn request_error(&self, err: reqwest::Error) -> FetchCause {
        if err.is_timeout() {
            FetchCause::Timeout(self.timeout)
        } else {
            FetchCause::Request(err)
        }
    }

    fn body_error(&self, err: reqwest::Error) -> FetchCause {
        if err.is_timeout() {
            FetchCause::Timeout(self.timeout)
        } else {
            FetchCause::Body(err)
        }
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        match tokio::time::timeout(self.timeout, self.download(url)).await {
            Ok(result) => result.map_err(|cause| FetchError::new(url, cause)),
            Err(_) => Err(FetchError::new(url, FetchCause::Timeout(self.timeout))),
        }
    }
}

// reqwest reports a zero length for HEAD responses, so read the header itself
fn advertised_length(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
