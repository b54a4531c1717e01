// # Session
//
// Explicit credential session passed to every transport call.
//
// The session owns a `CredentialSource` and the token it last produced.
// `bearer()` is the only refresh boundary: it checks the cached token's
// expiry (minus a safety margin) and exchanges credentials again when the
// token is missing or about to expire. There is no process-wide token cache.

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::error::Result;
use crate::traits::CredentialSource;

/// Default margin before expiry at which a token is refreshed
pub const DEFAULT_REFRESH_MARGIN_SECS: i64 = 30;

/// Opaque bearer credential with an expiry instant
///
/// The Debug implementation intentionally does NOT expose the token value.
#[derive(Clone)]
pub struct BearerToken {
    /// ⚠️ NEVER log this value
    value: String,
    expires_at: DateTime<Utc>,
}

impl BearerToken {
    /// Create a token expiring at the given instant
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    /// Create a token expiring `lifetime` from now
    pub fn expiring_in(value: impl Into<String>, lifetime: chrono::Duration) -> Self {
        Self::new(value, Utc::now() + lifetime)
    }

    /// The token value, for the `Authorization` header only
    pub fn secret(&self) -> &str {
        &self.value
    }

    /// Expiry instant
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether the token is still usable
    pub fn is_valid(&self) -> bool {
        self.is_valid_with_margin(chrono::Duration::zero())
    }

    /// Whether the token is usable for at least `margin` longer
    pub fn is_valid_with_margin(&self, margin: chrono::Duration) -> bool {
        !self.value.is_empty() && Utc::now() + margin < self.expires_at
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerToken")
            .field("value", &"<REDACTED>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Authenticated session against one manager
pub struct Session {
    credentials: Box<dyn CredentialSource>,
    token: Mutex<Option<BearerToken>>,
    refresh_margin: chrono::Duration,
}

impl Session {
    /// Create a session; no token is fetched until first use
    pub fn new(credentials: Box<dyn CredentialSource>) -> Self {
        Self {
            credentials,
            token: Mutex::new(None),
            refresh_margin: chrono::Duration::seconds(DEFAULT_REFRESH_MARGIN_SECS),
        }
    }

    /// Override the refresh margin
    pub fn with_refresh_margin(mut self, margin: chrono::Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    /// Return a valid token, refreshing it if needed
    ///
    /// Concurrent callers share one refresh: the lock is held across the
    /// credential exchange.
    pub async fn bearer(&self) -> Result<BearerToken> {
        let mut guard = self.token.lock().await;

        if let Some(token) = guard.as_ref() {
            if token.is_valid_with_margin(self.refresh_margin) {
                return Ok(token.clone());
            }
            tracing::debug!(
                "Token from {} expires at {}, refreshing",
                self.credentials.source_name(),
                token.expires_at()
            );
        }

        let token = self.credentials.get_token().await?;
        if !token.is_valid() {
            return Err(crate::Error::auth(format!(
                "{} returned an expired or empty token",
                self.credentials.source_name()
            )));
        }

        tracing::info!(
            "Obtained token from {} (expires at {})",
            self.credentials.source_name(),
            token.expires_at()
        );
        *guard = Some(token.clone());
        Ok(token)
    }

    /// Drop the cached token so the next call re-authenticates
    pub async fn invalidate(&self) {
        self.token.lock().await.take();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("credentials", &self.credentials.source_name())
            .field("refresh_margin", &self.refresh_margin)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingCredentials {
        calls: Arc<AtomicUsize>,
        lifetime: chrono::Duration,
    }

    #[async_trait]
    impl CredentialSource for CountingCredentials {
        async fn get_token(&self) -> Result<BearerToken> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(BearerToken::expiring_in(format!("token-{}", n), self.lifetime))
        }

        fn source_name(&self) -> &'static str {
            "counting"
        }
    }

    fn session(lifetime: chrono::Duration) -> (Session, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let session = Session::new(Box::new(CountingCredentials {
            calls: Arc::clone(&calls),
            lifetime,
        }));
        (session, calls)
    }

    #[tokio::test]
    async fn token_is_cached_while_valid() {
        let (session, calls) = session(chrono::Duration::minutes(5));

        let first = session.bearer().await.unwrap();
        let second = session.bearer().await.unwrap();

        assert_eq!(first.secret(), second.secret());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn token_inside_margin_is_refreshed() {
        // 10s lifetime is inside the 30s default margin
        let (session, calls) = session(chrono::Duration::seconds(10));

        session.bearer().await.unwrap();
        session.bearer().await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_exchange() {
        let (session, calls) = session(chrono::Duration::minutes(5));

        session.bearer().await.unwrap();
        session.invalidate().await;
        let token = session.bearer().await.unwrap();

        assert_eq!(token.secret(), "token-1");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn expired_token_from_source_is_rejected() {
        let (session, _calls) = session(chrono::Duration::seconds(-1));
        let err = session.bearer().await.unwrap_err();
        assert!(matches!(err, crate::Error::Authentication(_)));
    }

    #[test]
    fn debug_redacts_token() {
        let token = BearerToken::expiring_in("secret_token_12345", chrono::Duration::minutes(1));
        let debug_str = format!("{:?}", token);
        assert!(!debug_str.contains("secret_token"));
        assert!(debug_str.contains("BearerToken"));
    }
}
