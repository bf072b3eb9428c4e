use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common_auth::IdentityClaims;

use crate::error::SessionResult;

/// Token pair issued by the identity provider. Replaced wholesale on refresh or re-login.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderSession {
    pub access_token: String,
    pub id_token: String,
    pub expires_at: DateTime<Utc>,
}

impl ProviderSession {
    pub fn new(
        access_token: impl Into<String>,
        id_token: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            id_token: id_token.into(),
            expires_at,
        }
    }

    /// Usable at `now` with `skew` of headroom before expiry.
    pub fn is_fresh_at(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        now < self.expires_at - skew
    }

    pub fn bearer(&self, token: BearerToken) -> &str {
        match token {
            BearerToken::Id => &self.id_token,
            BearerToken::Access => &self.access_token,
        }
    }
}

impl fmt::Debug for ProviderSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSession")
            .field("access_token", &"<redacted>")
            .field("id_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Which token backends expect as the bearer credential. The ID token is the
/// default since it carries the group claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BearerToken {
    #[default]
    Id,
    Access,
}

impl FromStr for BearerToken {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "id" | "id_token" => Ok(BearerToken::Id),
            "access" | "access_token" => Ok(BearerToken::Access),
            other => Err(format!(
                "Unsupported bearer token '{other}'. Use id or access."
            )),
        }
    }
}

/// Sign-up form data. Profile fields are forwarded to the backend user record.
#[derive(Clone)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub email: String,
    pub company_name: String,
    pub phone_number: String,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("email", &self.email)
            .field("company_name", &self.company_name)
            .field("phone_number", &self.phone_number)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpOutcome {
    pub subject_id: String,
    /// False when the pool requires an out-of-band confirmation before sign-in.
    pub confirmed: bool,
}

/// External identity provider (managed user pool).
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, username: &str, password: &str) -> SessionResult<ProviderSession>;

    async fn sign_up(&self, registration: &Registration) -> SessionResult<SignUpOutcome>;

    async fn sign_out(&self) -> SessionResult<()>;

    /// Current session, refreshed by the provider if it holds a refresh credential.
    /// Fails with `AuthRequired` when nobody is signed in.
    async fn current_session(&self) -> SessionResult<ProviderSession>;

    async fn decode_identity_claims(&self, token: &str) -> SessionResult<IdentityClaims>;
}
