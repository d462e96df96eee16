//! HTTP client abstraction.
//!
//! Loaders depend on [`AsyncHttpClient`] rather than on reqwest directly so
//! tests can substitute canned responses.

mod client;
mod error;

pub use client::{AsyncHttpClient, AsyncReqwestClient, Credentials, DEFAULT_TIMEOUT_SECS};
pub use error::HttpError;

#[cfg(test)]
pub use client::tests::MockAsyncHttpClient;
