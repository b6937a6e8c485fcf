//! Transport abstraction for catalog API calls
//!
//! Defines the `Transport` trait that decouples the session and books client
//! from the wire. `HttpTransport` sends requests over reqwest; tests supply
//! scripted transports implementing the same trait.
//!
//! A request carries its bearer credential and a `retried` mark. The session
//! layer owns both: it sets the bearer before dispatch and flips `retried`
//! when replaying after a token refresh. Transports only put the bearer on
//! the wire and never interpret the mark.

pub mod http;

pub use http::HttpTransport;
pub use reqwest::Method;

use common::Secret;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::pin::Pin;

/// HTTP status the backend uses to reject a credential.
pub const UNAUTHORIZED: u16 = 401;

/// Errors raised below the HTTP status line (no response was received).
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("invalid response body: {0}")]
    Decode(String),
}

/// Result alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// A single API call, relative to the transport's base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
    /// Access token sent as `Authorization: Bearer`; `None` sends the request unauthenticated.
    pub bearer: Option<Secret<String>>,
    /// Set once the request has been replayed after a refresh.
    pub retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            bearer: None,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn put(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::PUT, path).with_body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_bearer(mut self, token: Option<Secret<String>>) -> Self {
        self.bearer = token;
        self
    }
}

/// Status line and JSON body of a backend response.
///
/// Non-JSON bodies are kept as a JSON string; empty bodies become `Null`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: serde_json::Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == UNAUTHORIZED
    }

    /// The backend's `{"message": ...}` field, or the raw body as text.
    pub fn message(&self) -> String {
        match self.body.get("message").and_then(|m| m.as_str()) {
            Some(message) => message.to_string(),
            None => match &self.body {
                serde_json::Value::Null => format!("status {}", self.status),
                serde_json::Value::String(text) => text.clone(),
                other => other.to_string(),
            },
        }
    }

    /// Deserialize the body into a typed value.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.body.clone())
            .map_err(|e| TransportError::Decode(format!("status {}: {e}", self.status)))
    }
}

/// Sends API requests to the catalog backend.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn Transport>`).
pub trait Transport: Send + Sync {
    /// Identifier for logging (e.g. "http")
    fn id(&self) -> &str;

    /// Send one request and return the response, whatever its status.
    ///
    /// Only failures below the status line are errors; a 401 or 404 is an
    /// `Ok(ApiResponse)` for the caller to interpret.
    fn send<'a>(
        &'a self,
        request: &'a ApiRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ApiResponse>> + Send + 'a>>;
}
