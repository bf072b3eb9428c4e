use common_auth::IdentityClaims;
use common_http_errors::ErrorKind;
use common_observability::SessionMetrics;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::backend::BackendClient;
use crate::error::SessionResult;
use crate::provider::{ProviderSession, Registration};
use crate::user::User;

pub const LOOKUP_PATH: &str = "/users/by-external-id";
pub const USERS_PATH: &str = "/users";

/// Lookup bodies come either wrapped as `{user: {...}}` or as the bare record.
#[derive(Deserialize)]
#[serde(untagged)]
enum LookupBody {
    Wrapped { user: User },
    Bare(User),
}

impl LookupBody {
    fn into_user(self) -> User {
        match self {
            LookupBody::Wrapped { user } | LookupBody::Bare(user) => user,
        }
    }
}

#[derive(Serialize)]
struct NewUserRecord<'a> {
    external_id: &'a str,
    email: &'a str,
    company_name: &'a str,
    phone_number: &'a str,
}

/// Resolves the application user behind a provider session.
#[derive(Clone)]
pub struct IdentityResolver {
    backend: BackendClient,
    metrics: SessionMetrics,
}

impl IdentityResolver {
    pub fn new(backend: BackendClient, metrics: SessionMetrics) -> Self {
        Self { backend, metrics }
    }

    /// Never fails: when the lookup does not produce a user, a synthesized record
    /// built from the claims is returned instead.
    pub async fn resolve(&self, session: &ProviderSession, claims: &IdentityClaims) -> User {
        match self.lookup(session, &claims.subject_id).await {
            Ok(user) => {
                self.metrics.user_lookup("found");
                user
            }
            Err(err) => {
                match err.kind() {
                    ErrorKind::NotFound => info!(
                        subject_id = %claims.subject_id,
                        "no user record for identity yet, using claims"
                    ),
                    kind => warn!(
                        subject_id = %claims.subject_id,
                        kind = %kind,
                        error = %err,
                        "user lookup failed, using claims"
                    ),
                }
                self.metrics.user_lookup("synthesized");
                User::synthesized(claims)
            }
        }
    }

    async fn lookup(&self, session: &ProviderSession, subject_id: &str) -> SessionResult<User> {
        let path = format!("{LOOKUP_PATH}/{}", urlencoding::encode(subject_id));
        let response = self
            .backend
            .send(session, Method::GET, &path, &[], None)
            .await?;
        let body: LookupBody = response.json()?;
        let mut user = body.into_user();
        user.is_synthesized = false;
        Ok(user)
    }

    /// Create the backend row for a freshly registered identity. `None` when the
    /// backend refuses; resolution then falls back to the lookup.
    pub async fn create_user(
        &self,
        session: &ProviderSession,
        claims: &IdentityClaims,
        registration: &Registration,
    ) -> Option<User> {
        let record = NewUserRecord {
            external_id: &claims.subject_id,
            email: &registration.email,
            company_name: &registration.company_name,
            phone_number: &registration.phone_number,
        };
        let body = match serde_json::to_value(&record) {
            Ok(body) => body,
            Err(err) => {
                warn!(error = %err, "failed to encode new user record");
                return None;
            }
        };

        let created = match self
            .backend
            .send(session, Method::POST, USERS_PATH, &[], Some(&body))
            .await
        {
            Ok(response) => response.json::<LookupBody>().map(LookupBody::into_user),
            Err(err) => Err(err),
        };

        match created {
            Ok(mut user) => {
                user.is_synthesized = false;
                info!(subject_id = %claims.subject_id, user_id = user.id, "created user record");
                Some(user)
            }
            Err(err) => {
                warn!(
                    subject_id = %claims.subject_id,
                    error = %err,
                    "creating user record failed"
                );
                None
            }
        }
    }
}

