//! Transport seam between the request executor and the wire.
//!
//! A [`Transport`] performs exactly one attempt and classifies its failure
//! into a [`NetworkError`]. Retry, breaker and credential policy live above
//! it in [`RequestExecutor`](super::RequestExecutor).

use async_trait::async_trait;
use petclinic_domain::NetworkError;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::errors::ApiError;

/// One logical request, replayed verbatim on every attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub requires_auth: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), body: None, requires_auth: true }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PUT, path).with_body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serialize `body` as the JSON payload.
    pub fn with_json<B: Serialize + ?Sized>(self, body: &B) -> Result<Self, ApiError> {
        Ok(self.with_body(serde_json::to_value(body)?))
    }

    /// Send without an `Authorization` header, e.g. for login.
    pub fn unauthenticated(mut self) -> Self {
        self.requires_auth = false;
        self
    }
}

/// Successful (2xx) response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self { status, body: body.into() }
    }

    pub fn empty(status: u16) -> Self {
        Self { status, body: Vec::new() }
    }

    /// 204/205 or a zero-length body
    pub fn is_empty(&self) -> bool {
        matches!(self.status, 204 | 205) || self.body.iter().all(u8::is_ascii_whitespace)
    }

    /// Decode the body as JSON. Empty responses decode from `null`, so
    /// `()` and `Option<T>` targets accept them.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        if self.is_empty() {
            return serde_json::from_value(Value::Null).map_err(|e| {
                ApiError::Serialization(format!("empty response (HTTP {}): {e}", self.status))
            });
        }
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// One-shot request transport.
///
/// `credential` is the bearer token to attach, already checked for expiry
/// by the caller. Implementations must not retry internally.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(
        &self,
        request: &ApiRequest,
        credential: Option<&str>,
    ) -> Result<ApiResponse, NetworkError>;
}
