use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Decoded payload of an identity-provider ID token.
///
/// Produced once per token by the verifier; never persisted on its own.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentityClaims {
    pub subject_id: String,
    pub username: String,
    /// Group memberships in the order the provider emitted them.
    pub groups: Vec<String>,
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    #[serde(skip)]
    pub raw: serde_json::Value,
}

impl IdentityClaims {
    /// Group membership check, case-insensitive.
    pub fn in_group(&self, group: &str) -> bool {
        self.groups
            .iter()
            .any(|value| value.eq_ignore_ascii_case(group))
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct ClaimsRepr {
    sub: String,
    #[serde(rename = "cognito:username", alias = "username", default)]
    username: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(rename = "cognito:groups", alias = "groups", default)]
    groups: Option<GroupsRepr>,
    exp: i64,
    #[serde(default)]
    iat: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GroupsRepr {
    Single(String),
    Many(Vec<String>),
}

impl TryFrom<ClaimsRepr> for IdentityClaims {
    type Error = AuthError;

    fn try_from(value: ClaimsRepr) -> AuthResult<Self> {
        let subject_id = value.sub.trim().to_string();
        if subject_id.is_empty() {
            return Err(AuthError::InvalidClaim("sub", value.sub));
        }

        let expires_at = Utc
            .timestamp_opt(value.exp, 0)
            .single()
            .ok_or_else(|| AuthError::InvalidClaim("exp", value.exp.to_string()))?;

        let issued_at = match value.iat {
            Some(iat) => Some(
                Utc.timestamp_opt(iat, 0)
                    .single()
                    .ok_or_else(|| AuthError::InvalidClaim("iat", iat.to_string()))?,
            ),
            None => None,
        };

        let groups = match value.groups {
            Some(GroupsRepr::Single(item)) => vec![item],
            Some(GroupsRepr::Many(items)) => items,
            None => Vec::new(),
        };

        // Tokens minted without a username claim fall back to the email, then the subject.
        let username = value
            .username
            .or(value.email)
            .unwrap_or_else(|| subject_id.clone());

        Ok(Self {
            subject_id,
            username,
            groups,
            issued_at,
            expires_at,
            raw: serde_json::Value::Null,
        })
    }
}

impl TryFrom<serde_json::Value> for IdentityClaims {
    type Error = AuthError;

    fn try_from(value: serde_json::Value) -> AuthResult<Self> {
        let repr: ClaimsRepr = serde_json::from_value(value.clone())
            .map_err(|err| AuthError::Payload(err.to_string()))?;
        let mut claims = IdentityClaims::try_from(repr)?;
        claims.raw = value;
        Ok(claims)
    }
}
