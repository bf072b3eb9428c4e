use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{SessionError, SessionResult};
use crate::provider::{IdentityProvider, ProviderSession};

pub const DEFAULT_TOKEN_SKEW_SECONDS: i64 = 60;

/// Cache for the current provider session with refresh-on-demand.
///
/// Concurrent callers share one refresh: the cache lock is held across the provider
/// call, so a second caller observes the refreshed session instead of refreshing again.
pub struct CredentialStore {
    provider: Arc<dyn IdentityProvider>,
    cached: Mutex<Option<ProviderSession>>,
    skew: Duration,
}

impl CredentialStore {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self::with_skew(provider, Duration::seconds(DEFAULT_TOKEN_SKEW_SECONDS))
    }

    pub fn with_skew(provider: Arc<dyn IdentityProvider>, skew: Duration) -> Self {
        Self {
            provider,
            cached: Mutex::new(None),
            skew,
        }
    }

    pub fn skew(&self) -> Duration {
        self.skew
    }

    /// Cached session when it is still fresh, otherwise exactly one provider refresh.
    /// An unreachable provider keeps its transient kind; any other failure is
    /// `AuthRequired`.
    pub async fn get_session(&self) -> SessionResult<ProviderSession> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now();
        if let Some(session) = cached.as_ref() {
            if session.is_fresh_at(now, self.skew) {
                return Ok(session.clone());
            }
            debug!(expires_at = %session.expires_at, "cached session near expiry, refreshing");
        }

        match self.provider.current_session().await {
            Ok(session) if session.is_fresh_at(Utc::now(), Duration::zero()) => {
                *cached = Some(session.clone());
                Ok(session)
            }
            Ok(session) => {
                *cached = None;
                info!(expires_at = %session.expires_at, "provider returned an expired session");
                Err(SessionError::AuthRequired("session expired".into()))
            }
            Err(err) if err.kind().is_transient() => {
                *cached = None;
                warn!(error = %err, "identity provider unreachable");
                Err(err)
            }
            Err(err) => {
                *cached = None;
                info!(error = %err, "no usable provider session");
                Err(match err {
                    SessionError::AuthRequired(reason) => SessionError::AuthRequired(reason),
                    other => SessionError::AuthRequired(format!("session refresh failed: {other}")),
                })
            }
        }
    }

    /// Install a freshly issued session (sign-in, registration).
    pub async fn replace(&self, session: ProviderSession) {
        *self.cached.lock().await = Some(session);
    }

    /// Cached session without refreshing.
    pub async fn peek(&self) -> Option<ProviderSession> {
        self.cached.lock().await.clone()
    }

    pub async fn invalidate(&self) {
        self.cached.lock().await.take();
    }
}
