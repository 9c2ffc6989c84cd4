//! Backend request boundary.
//!
//! The controller only sees the [`ApiClient`] trait; [`ReqwestApiClient`]
//! is the production implementation. Tests swap in scripted clients.

pub mod client;

pub use client::ReqwestApiClient;

use async_trait::async_trait;
pub use reqwest::Method;
use serde_json::Value;

/// A failed backend call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HttpError {
    /// The server answered with a non-success status. `body` is the parsed
    /// JSON body, or `{"message": <text>}` when it was not JSON.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: Value },

    /// The request never produced a response (DNS, connect, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// A success response whose body was not valid JSON.
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl HttpError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// `request(url, options, bearerToken?) -> JSON | HttpError`.
#[async_trait]
pub trait ApiClient: Send + Sync {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        bearer: Option<&str>,
    ) -> Result<Value, HttpError>;

    async fn get(&self, path: &str, bearer: Option<&str>) -> Result<Value, HttpError> {
        self.request(Method::GET, path, None, bearer).await
    }

    async fn post(
        &self,
        path: &str,
        body: &Value,
        bearer: Option<&str>,
    ) -> Result<Value, HttpError> {
        self.request(Method::POST, path, Some(body), bearer).await
    }
}
