// # Credential Source Trait
//
// Defines the interface for exchanging client credentials for a bearer
// token.
//
// ## Implementations
//
// - Keycloak client-credentials grant: `vpgctl-http` crate
//
// A credential source is only ever called by `Session`, which decides when
// the cached token has expired.

use async_trait::async_trait;

use crate::session::BearerToken;

/// Trait for credential exchange implementations
///
/// # Security
///
/// Implementations must never log secrets or token values.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Obtain a fresh token
    ///
    /// # Returns
    ///
    /// - `Ok(BearerToken)`: A token with its expiry instant
    /// - `Err(Error::Authentication)`: If the exchange was refused
    async fn get_token(&self) -> Result<BearerToken, crate::Error>;

    /// Source name (for logging/debugging)
    fn source_name(&self) -> &'static str;
}
