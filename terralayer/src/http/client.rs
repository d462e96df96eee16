//! Async HTTP client trait and its reqwest implementation.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use tracing::debug;

use super::error::HttpError;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// HTTP basic authentication credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Trait for async HTTP GET requests.
///
/// The returned future must be `Send` so fetches can run on spawned tasks.
pub trait AsyncHttpClient: Send + Sync {
    /// Performs a GET request and returns the response body.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to request
    /// * `credentials` - Optional basic-auth credentials
    fn get(
        &self,
        url: &str,
        credentials: Option<&Credentials>,
    ) -> impl Future<Output = Result<Bytes, HttpError>> + Send;
}

/// Real async HTTP client using reqwest.
#[derive(Debug, Clone)]
pub struct AsyncReqwestClient {
    client: reqwest::Client,
}

impl AsyncReqwestClient {
    /// Creates a client with the default timeout.
    pub fn new() -> Result<Self, HttpError> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a client with a custom timeout.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("terralayer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HttpError::Client(e.to_string()))?;

        Ok(Self { client })
    }
}

impl AsyncHttpClient for AsyncReqwestClient {
    async fn get(&self, url: &str, credentials: Option<&Credentials>) -> Result<Bytes, HttpError> {
        let mut request = self.client.get(url);
        if let Some(c) = credentials {
            request = request.basic_auth(&c.username, Some(&c.password));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                HttpError::Timeout(url.to_string())
            } else {
                HttpError::Request {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(HttpError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| HttpError::Body {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        debug!(url = %url, bytes = body.len(), "HTTP GET complete");
        Ok(body)
    }
}
