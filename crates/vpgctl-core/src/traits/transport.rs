// # Transport Trait
//
// Defines the interface for authenticated requests against the manager's
// REST API.
//
// ## Implementations
//
// - reqwest-based: `vpgctl-http` crate
// - Tests: scripted in-memory transports
//
// ## Usage
//
// ```rust,ignore
// use vpgctl_core::traits::{Method, Transport};
//
// let response = transport
//     .request(&session, Method::Get, "/v1/tasks/abc", None)
//     .await?;
// println!("{} -> {}", response.status, response.body);
// ```

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::session::Session;

/// HTTP method of a manager request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Read
    Get,
    /// Create / submit
    Post,
    /// Whole-object replace
    Put,
    /// Remove
    Delete,
}

impl Method {
    /// Upper-case method name
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    /// Whether the method changes remote state
    pub fn is_mutating(self) -> bool {
        !matches!(self, Method::Get)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A successful (2xx) response
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// Decoded JSON body; `Value::Null` for an empty body
    pub body: Value,
}

impl ApiResponse {
    /// Create a response
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// Read the body as a bare identifier
    ///
    /// The manager answers submissions either with a JSON string or with a
    /// small object; both shapes are accepted.
    pub fn identifier(&self, object_keys: &[&str]) -> Option<String> {
        match &self.body {
            Value::String(id) if !id.is_empty() => Some(id.clone()),
            Value::Object(map) => object_keys
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str))
                .filter(|id| !id.is_empty())
                .map(str::to_string),
            _ => None,
        }
    }
}

/// Trait for transport implementations
///
/// # Error Contract
///
/// - Network failures, timeouts and 5xx responses → `Error::TransientTransport`
/// - 4xx responses → `Error::Rejected { status, .. }`
/// - 2xx → `Ok(ApiResponse)`
///
/// # Trust Level: Untrusted
///
/// Transports execute exactly one HTTP exchange per call. Retry, backoff and
/// polling are owned by `TaskTracker`; transports must not implement them.
/// Tokens are obtained from the `Session` passed in and never logged.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one authenticated request
    ///
    /// # Parameters
    ///
    /// - `session`: Credential session to authenticate with
    /// - `method`: HTTP method
    /// - `path`: API path relative to the manager base URL (e.g. `/v1/tasks/abc`)
    /// - `body`: Optional JSON body
    async fn request(
        &self,
        session: &Session,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<ApiResponse, crate::Error>;

    /// Transport name (for logging/debugging)
    fn transport_name(&self) -> &'static str;
}
