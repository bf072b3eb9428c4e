//! Identity provider backed by a managed user pool speaking the
//! `AWSCognitoIdentityProviderService` JSON protocol.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use common_auth::{IdTokenVerifier, IdentityClaims};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::IdpConfig;
use crate::credential_store::DEFAULT_TOKEN_SKEW_SECONDS;
use crate::error::{SessionError, SessionResult};
use crate::provider::{IdentityProvider, ProviderSession, Registration, SignUpOutcome};

const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

struct StoredTokens {
    session: ProviderSession,
    refresh_token: Option<String>,
}

pub struct CognitoProvider {
    client: Client,
    endpoint: String,
    client_id: String,
    verifier: IdTokenVerifier,
    tokens: Mutex<Option<StoredTokens>>,
    refresh_margin: Duration,
}

#[derive(Deserialize)]
struct InitiateAuthResponse {
    #[serde(rename = "AuthenticationResult")]
    result: Option<AuthenticationResult>,
    #[serde(rename = "ChallengeName")]
    challenge: Option<String>,
}

#[derive(Deserialize)]
struct AuthenticationResult {
    #[serde(rename = "AccessToken")]
    access_token: String,
    #[serde(rename = "IdToken")]
    id_token: String,
    #[serde(rename = "RefreshToken")]
    refresh_token: Option<String>,
    #[serde(rename = "ExpiresIn")]
    expires_in: i64,
}

#[derive(Deserialize)]
struct SignUpResponse {
    #[serde(rename = "UserConfirmed")]
    user_confirmed: bool,
    #[serde(rename = "UserSub")]
    user_sub: String,
}

#[derive(Deserialize, Default)]
struct ProviderErrorBody {
    #[serde(rename = "__type", default)]
    error_type: Option<String>,
    #[serde(default, alias = "Message")]
    message: Option<String>,
}

impl CognitoProvider {
    pub fn new(client: Client, config: &IdpConfig, verifier: IdTokenVerifier) -> Self {
        Self {
            client,
            endpoint: config.endpoint.clone(),
            client_id: config.client_id.clone(),
            verifier,
            tokens: Mutex::new(None),
            refresh_margin: Duration::seconds(DEFAULT_TOKEN_SKEW_SECONDS),
        }
    }

    /// Build with a lazily-loaded verifier for the pool's published JWKS.
    pub fn from_config(client: Client, config: &IdpConfig) -> Self {
        let verifier = IdTokenVerifier::builder(config.jwt_config())
            .with_issuer_keys()
            .build_lazy();
        Self::new(client, config, verifier)
    }

    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    /// Seed from a refresh token persisted by an earlier run; the next
    /// `current_session` exchanges it for fresh tokens.
    pub async fn restore(&self, refresh_token: impl Into<String>) {
        let expired = ProviderSession::new("", "", Utc::now() - Duration::seconds(1));
        *self.tokens.lock().await = Some(StoredTokens {
            session: expired,
            refresh_token: Some(refresh_token.into()),
        });
    }

    /// Refresh token currently held, for the caller to persist.
    pub async fn refresh_token(&self) -> Option<String> {
        self.tokens
            .lock()
            .await
            .as_ref()
            .and_then(|stored| stored.refresh_token.clone())
    }

    async fn invoke<T: DeserializeOwned>(&self, action: &str, body: Value) -> SessionResult<T> {
        let payload = serde_json::to_vec(&body)
            .map_err(|err| SessionError::Malformed(format!("encoding {action}: {err}")))?;
        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", CONTENT_TYPE)
            .header("X-Amz-Target", format!("{TARGET_PREFIX}.{action}"))
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        if status.is_success() {
            return serde_json::from_slice(&bytes)
                .map_err(|err| SessionError::Malformed(format!("{action} response: {err}")));
        }

        let error: ProviderErrorBody = serde_json::from_slice(&bytes).unwrap_or_default();
        let code = error
            .error_type
            .map(|value| value.rsplit('#').next().unwrap_or_default().to_string())
            .unwrap_or_else(|| format!("HTTP{}", status.as_u16()));
        let message = error.message.unwrap_or_else(|| status.to_string());
        debug!(action, status = status.as_u16(), code, "identity provider call failed");

        if status.is_server_error() || code == "TooManyRequestsException" {
            return Err(SessionError::Network(format!("{action}: {code}: {message}")));
        }
        Err(SessionError::Rejected { code, message })
    }

    async fn initiate_auth(
        &self,
        flow: &str,
        parameters: Value,
    ) -> SessionResult<(ProviderSession, Option<String>)> {
        let body = json!({
            "AuthFlow": flow,
            "ClientId": self.client_id,
            "AuthParameters": parameters,
        });
        let response: InitiateAuthResponse = self.invoke("InitiateAuth", body).await?;
        let result = match (response.result, response.challenge) {
            (Some(result), _) => result,
            (None, Some(challenge)) => {
                return Err(SessionError::Rejected {
                    code: challenge,
                    message: "additional sign-in challenge required".into(),
                })
            }
            (None, None) => {
                return Err(SessionError::Malformed(
                    "InitiateAuth returned neither tokens nor a challenge".into(),
                ))
            }
        };

        let session = ProviderSession::new(
            result.access_token,
            result.id_token,
            Utc::now() + Duration::seconds(result.expires_in),
        );
        Ok((session, result.refresh_token))
    }
}

#[async_trait]
impl IdentityProvider for CognitoProvider {
    async fn sign_in(&self, username: &str, password: &str) -> SessionResult<ProviderSession> {
        let (session, refresh_token) = self
            .initiate_auth(
                "USER_PASSWORD_AUTH",
                json!({ "USERNAME": username, "PASSWORD": password }),
            )
            .await?;
        *self.tokens.lock().await = Some(StoredTokens {
            session: session.clone(),
            refresh_token,
        });
        info!(username, "signed in with identity provider");
        Ok(session)
    }

    async fn sign_up(&self, registration: &Registration) -> SessionResult<SignUpOutcome> {
        let body = json!({
            "ClientId": self.client_id,
            "Username": registration.username,
            "Password": registration.password,
            "UserAttributes": [
                { "Name": "email", "Value": registration.email }
            ],
        });
        let response: SignUpResponse = self.invoke("SignUp", body).await?;
        Ok(SignUpOutcome {
            subject_id: response.user_sub,
            confirmed: response.user_confirmed,
        })
    }

    async fn sign_out(&self) -> SessionResult<()> {
        let Some(stored) = self.tokens.lock().await.take() else {
            return Ok(());
        };
        if stored.session.access_token.is_empty() {
            return Ok(());
        }
        self.invoke::<Value>(
            "GlobalSignOut",
            json!({ "AccessToken": stored.session.access_token }),
        )
        .await?;
        Ok(())
    }

    async fn current_session(&self) -> SessionResult<ProviderSession> {
        let mut tokens = self.tokens.lock().await;
        let Some(stored) = tokens.as_ref() else {
            return Err(SessionError::AuthRequired("no signed-in user".into()));
        };
        if stored.session.is_fresh_at(Utc::now(), self.refresh_margin) {
            return Ok(stored.session.clone());
        }
        let Some(refresh_token) = stored.refresh_token.clone() else {
            *tokens = None;
            return Err(SessionError::AuthRequired("session expired".into()));
        };

        match self
            .initiate_auth(
                "REFRESH_TOKEN_AUTH",
                json!({ "REFRESH_TOKEN": refresh_token }),
            )
            .await
        {
            Ok((session, rotated)) => {
                *tokens = Some(StoredTokens {
                    session: session.clone(),
                    refresh_token: rotated.or(Some(refresh_token)),
                });
                debug!("refreshed identity provider session");
                Ok(session)
            }
            Err(err) => {
                warn!(error = %err, "session refresh rejected");
                if matches!(err, SessionError::Rejected { .. }) {
                    *tokens = None;
                }
                Err(err)
            }
        }
    }

    async fn decode_identity_claims(&self, token: &str) -> SessionResult<IdentityClaims> {
        Ok(self.verifier.verify_with_refresh(token).await?)
    }
}
