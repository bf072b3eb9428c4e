use std::env;
use std::time::Duration as StdDuration;

use anyhow::{anyhow, Context, Result};
use chrono::Duration;
use common_auth::{JwtConfig, DEFAULT_ADMIN_GROUP_MARKER, DEFAULT_STAFF_GROUP_MARKER};

use crate::credential_store::DEFAULT_TOKEN_SKEW_SECONDS;
use crate::provider::BearerToken;
use crate::role_extractor::{AuthorizationModel, RoleExtractor};

const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 15;

/// Identity-provider (user pool) connection settings.
#[derive(Debug, Clone)]
pub struct IdpConfig {
    pub endpoint: String,
    pub client_id: String,
    pub issuer: String,
}

impl IdpConfig {
    pub fn jwt_config(&self) -> JwtConfig {
        JwtConfig::new(self.issuer.clone(), self.client_id.clone())
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub api_base_url: String,
    pub bearer_token: BearerToken,
    pub token_skew: Duration,
    pub http_timeout: StdDuration,
    pub authorization_model: AuthorizationModel,
    pub admin_group_marker: String,
    pub staff_group_marker: String,
    pub idp: Option<IdpConfig>,
}

impl SessionConfig {
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            bearer_token: BearerToken::default(),
            token_skew: Duration::seconds(DEFAULT_TOKEN_SKEW_SECONDS),
            http_timeout: StdDuration::from_secs(DEFAULT_HTTP_TIMEOUT_SECONDS),
            authorization_model: AuthorizationModel::default(),
            admin_group_marker: DEFAULT_ADMIN_GROUP_MARKER.to_string(),
            staff_group_marker: DEFAULT_STAFF_GROUP_MARKER.to_string(),
            idp: None,
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_base_url = env::var("SESSION_API_BASE_URL")
            .ok()
            .and_then(|value| normalize_optional(&value))
            .context("SESSION_API_BASE_URL must be set")?;

        let bearer_token = env::var("SESSION_BEARER_TOKEN")
            .ok()
            .map(|value| value.parse::<BearerToken>().map_err(|err| anyhow!(err)))
            .transpose()
            .context("Failed to parse SESSION_BEARER_TOKEN")?
            .unwrap_or_default();

        let token_skew_seconds = env::var("SESSION_TOKEN_SKEW_SECONDS")
            .ok()
            .and_then(|value| value.trim().parse::<i64>().ok())
            .unwrap_or(DEFAULT_TOKEN_SKEW_SECONDS);

        let http_timeout_seconds = env::var("SESSION_HTTP_TIMEOUT_SECONDS")
            .ok()
            .and_then(|value| value.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECONDS);

        let authorization_model = env::var("SESSION_AUTHZ_MODEL")
            .ok()
            .map(|value| {
                value
                    .parse::<AuthorizationModel>()
                    .map_err(|err| anyhow!(err))
            })
            .transpose()
            .context("Failed to parse SESSION_AUTHZ_MODEL")?
            .unwrap_or_default();

        let admin_group_marker = env::var("SESSION_ADMIN_GROUP_MARKER")
            .ok()
            .and_then(|value| normalize_optional(&value))
            .unwrap_or_else(|| DEFAULT_ADMIN_GROUP_MARKER.to_string());
        let staff_group_marker = env::var("SESSION_STAFF_GROUP_MARKER")
            .ok()
            .and_then(|value| normalize_optional(&value))
            .unwrap_or_else(|| DEFAULT_STAFF_GROUP_MARKER.to_string());

        let idp = load_idp_config()?;

        Ok(Self {
            api_base_url,
            bearer_token,
            token_skew: Duration::seconds(token_skew_seconds.max(0)),
            http_timeout: StdDuration::from_secs(http_timeout_seconds.max(1)),
            authorization_model,
            admin_group_marker,
            staff_group_marker,
            idp,
        })
    }

    pub fn role_extractor(&self) -> RoleExtractor {
        RoleExtractor::new(self.authorization_model)
            .with_markers(&self.admin_group_marker, &self.staff_group_marker)
    }
}

fn load_idp_config() -> Result<Option<IdpConfig>> {
    let Some(endpoint) = env::var("SESSION_IDP_ENDPOINT")
        .ok()
        .and_then(|value| normalize_optional(&value))
    else {
        return Ok(None);
    };
    let client_id = env::var("SESSION_IDP_CLIENT_ID")
        .ok()
        .and_then(|value| normalize_optional(&value))
        .context("SESSION_IDP_CLIENT_ID must be set when SESSION_IDP_ENDPOINT is")?;
    let issuer = env::var("SESSION_IDP_ISSUER")
        .ok()
        .and_then(|value| normalize_optional(&value))
        .context("SESSION_IDP_ISSUER must be set when SESSION_IDP_ENDPOINT is")?;
    Ok(Some(IdpConfig {
        endpoint,
        client_id,
        issuer,
    }))
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_id_token_and_reconciled_model() {
        let config = SessionConfig::new("http://api.local");
        assert_eq!(config.bearer_token, BearerToken::Id);
        assert_eq!(config.authorization_model, AuthorizationModel::Reconciled);
        assert_eq!(config.token_skew, Duration::seconds(60));
        assert!(config.idp.is_none());
    }

    #[test]
    fn normalize_optional_drops_blank_values() {
        assert_eq!(normalize_optional("  "), None);
        assert_eq!(normalize_optional(" x "), Some("x".to_string()));
    }

    #[test]
    fn from_env_reads_overrides() {
        std::env::set_var("SESSION_API_BASE_URL", "http://api.test");
        std::env::set_var("SESSION_BEARER_TOKEN", "access");
        std::env::set_var("SESSION_AUTHZ_MODEL", "claims");
        std::env::set_var("SESSION_TOKEN_SKEW_SECONDS", "5");
        let config = SessionConfig::from_env().expect("config");
        assert_eq!(config.api_base_url, "http://api.test");
        assert_eq!(config.bearer_token, BearerToken::Access);
        assert_eq!(config.authorization_model, AuthorizationModel::Claims);
        assert_eq!(config.token_skew, Duration::seconds(5));
    }

    #[test]
    fn idp_config_derives_verifier_settings() {
        let idp = IdpConfig {
            endpoint: "https://idp.local/".into(),
            client_id: "client-1".into(),
            issuer: "https://idp.local/pool".into(),
        };
        let jwt = idp.jwt_config();
        assert_eq!(jwt.audience, "client-1");
        assert_eq!(jwt.jwks_url(), "https://idp.local/pool/.well-known/jwks.json");
    }
}
