// # HTTP Transport for the ZVM API
//
// This crate provides the reqwest-based collaborators of vpgctl-core:
//
// - `HttpTransport`: one authenticated HTTPS request per call
// - `KeycloakCredentials`: client-credentials grant against the ZVM's
//   Keycloak realm
//
// ## Trust Level: Untrusted
//
// **Allowed**:
// - ✅ HTTP/HTTPS calls to the configured manager only
// - ✅ Mapping HTTP statuses to core error kinds
//
// **Forbidden**:
// - ❌ Retry, backoff or polling (owned by TaskTracker)
// - ❌ Token caching (owned by Session)
// - ❌ Spawning background tasks
//
// ## Status Mapping
//
// | Status            | Error                         |
// |-------------------|-------------------------------|
// | network / timeout | `TransientTransport`          |
// | 401               | `Authentication` (token dropped from the session) |
// | 408, 429          | `TransientTransport`          |
// | other 4xx         | `Rejected { status, message }`|
// | 5xx               | `TransientTransport`          |
//
// ## Security Requirements
//
// - Client secret and tokens NEVER appear in logs or Debug output
// - Certificate verification is on unless explicitly disabled

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use vpgctl_core::config::ClientConfig;
use vpgctl_core::session::{BearerToken, Session};
use vpgctl_core::traits::{ApiResponse, CredentialSource, Method, Transport};
use vpgctl_core::{Error, Result};

/// Default HTTP timeout for API requests (30 seconds)
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Keycloak token endpoint, relative to the manager base URL
pub const TOKEN_PATH: &str = "/auth/realms/zerto/protocol/openid-connect/token";

/// Token lifetime assumed when Keycloak omits `expires_in`
const DEFAULT_EXPIRES_IN_SECS: i64 = 300;

/// Longest response excerpt kept in error messages
const MAX_ERROR_TEXT: usize = 300;

fn build_client(verify_certificate: bool, timeout: Duration) -> Result<reqwest::Client> {
    if !verify_certificate {
        tracing::warn!("TLS certificate verification is disabled");
    }

    reqwest::Client::builder()
        .timeout(timeout)
        .danger_accept_invalid_certs(!verify_certificate)
        .build()
        .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))
}

/// Authenticated JSON transport for the ZVM REST API
///
/// # Trust Level: Untrusted
///
/// Executes exactly one HTTP exchange per `request` call.
pub struct HttpTransport {
    /// Manager base URL, without trailing slash
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl HttpTransport {
    /// Create a transport
    ///
    /// # Parameters
    ///
    /// - `base_url`: Manager base URL, e.g. `https://192.168.111.20`
    /// - `verify_certificate`: Set to false for self-signed lab managers
    /// - `timeout`: Per-request timeout
    pub fn new(
        base_url: impl Into<String>,
        verify_certificate: bool,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(Error::config("Manager base URL cannot be empty"));
        }

        Ok(Self {
            base_url,
            client: build_client(verify_certificate, timeout)?,
        })
    }

    /// Create a transport from client configuration
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::new(
            config.base_url(),
            config.verify_certificate,
            config.request_timeout(),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(
        &self,
        session: &Session,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<ApiResponse> {
        let token = session.bearer().await?;
        let url = self.url(path);
        tracing::debug!("{} {}", method, url);

        let mut builder = self
            .client
            .request(to_reqwest(method), &url)
            .bearer_auth(token.secret())
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::transient(format!("{} {} failed: {}", method, path, e)))?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| {
            Error::transient(format!("{} {}: failed to read response: {}", method, path, e))
        })?;

        if (200..300).contains(&status) {
            return Ok(ApiResponse::new(status, decode_body(&text)));
        }

        if status == 401 {
            // The cached token was refused; the next call re-authenticates
            session.invalidate().await;
        }

        let error = status_error(status, &format!("{} {}", method, path), &text);
        tracing::debug!("{} {} -> {}", method, path, error);
        Err(error)
    }

    fn transport_name(&self) -> &'static str {
        "http"
    }
}

fn to_reqwest(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
    }
}

/// Decode a success body; the manager answers some calls with a bare string
fn decode_body(text: &str) -> Value {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string()))
}

/// Map a non-2xx status to the core error kind
fn status_error(status: u16, context: &str, text: &str) -> Error {
    let message = error_message(text);
    match status {
        401 => Error::auth(format!("{} refused the bearer token: {}", context, message)),
        408 | 429 => Error::transient(format!("{} throttled ({}): {}", context, status, message)),
        400..=499 => Error::rejected(status, format!("{}: {}", context, message)),
        500..=599 => Error::transient(format!("{} server error ({}): {}", context, status, message)),
        _ => Error::invalid_response(format!("{} unexpected status {}: {}", context, status, message)),
    }
}

/// The manager's `Message` field when present, else a bounded excerpt
fn error_message(text: &str) -> String {
    if let Ok(Value::Object(body)) = serde_json::from_str::<Value>(text)
        && let Some(message) = ["Message", "message", "error_description", "error"]
            .iter()
            .find_map(|key| body.get(*key).and_then(Value::as_str))
    {
        return message.to_string();
    }

    let text = text.trim();
    match text.char_indices().nth(MAX_ERROR_TEXT) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Keycloak client-credentials token source
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the client secret.
pub struct KeycloakCredentials {
    /// Full token endpoint URL
    token_url: String,

    /// Keycloak client ID
    client_id: String,

    /// Keycloak client secret
    /// ⚠️ NEVER log this value
    client_secret: String,

    /// HTTP client for token requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the client secret
impl std::fmt::Debug for KeycloakCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeycloakCredentials")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<REDACTED>")
            .finish()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl KeycloakCredentials {
    /// Create a credential source
    ///
    /// # Errors
    ///
    /// `Error::Config` if the client ID or secret is empty.
    pub fn new(
        base_url: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        verify_certificate: bool,
        timeout: Duration,
    ) -> Result<Self> {
        let client_id = client_id.into();
        let client_secret = client_secret.into();
        if client_id.is_empty() || client_secret.is_empty() {
            return Err(Error::config("Keycloak client ID and secret are required"));
        }

        Ok(Self {
            token_url: format!("{}{}", base_url.trim_end_matches('/'), TOKEN_PATH),
            client_id,
            client_secret,
            client: build_client(verify_certificate, timeout)?,
        })
    }

    /// Create a credential source from client configuration
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::new(
            &config.base_url(),
            config.client_id.clone(),
            config.client_secret.clone(),
            config.verify_certificate,
            config.request_timeout(),
        )
    }
}

#[async_trait]
impl CredentialSource for KeycloakCredentials {
    async fn get_token(&self) -> Result<BearerToken> {
        tracing::debug!("Requesting token for client {}", self.client_id);

        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];
        let response = self
            .client
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::transient(format!("Token request failed: {}", e)))?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let text = response.text().await.unwrap_or_default();
            return Err(match status {
                500..=599 => Error::transient(format!(
                    "Token endpoint error ({}): {}",
                    status,
                    error_message(&text)
                )),
                _ => Error::auth(format!(
                    "Token request refused ({}): {}",
                    status,
                    error_message(&text)
                )),
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::auth(format!("Malformed token response: {}", e)))?;

        let lifetime = token.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        Ok(BearerToken::expiring_in(
            token.access_token,
            chrono::Duration::seconds(lifetime),
        ))
    }

    fn source_name(&self) -> &'static str {
        "keycloak"
    }
}
