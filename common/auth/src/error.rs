use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

/// Why an ID token could not be turned into identity claims.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("unreadable token header: {0}")]
    Header(String),
    #[error("token header carries no key id")]
    MissingKeyId,
    #[error("token signed with unknown key '{0}'")]
    UnknownSigningKey(String),
    #[error("token expired")]
    Expired,
    #[error("token rejected: {0}")]
    Rejected(String),
    #[error("expected an ID token, got token_use '{0}'")]
    WrongTokenUse(String),
    #[error("claim '{0}' has unusable value '{1}'")]
    InvalidClaim(&'static str, String),
    #[error("claims payload is not usable: {0}")]
    Payload(String),
    #[error("signing keys unavailable: {0}")]
    KeySet(#[from] KeySetError),
}

/// Failures loading the pool's published signing keys.
#[derive(Debug, Error)]
pub enum KeySetError {
    #[error("request failed: {0}")]
    Fetch(String),
    #[error("document is not a key set: {0}")]
    Decode(String),
    #[error("published key without kid")]
    MissingKid,
    #[error("key '{0}' lacks its RSA modulus or exponent")]
    MissingComponents(String),
    #[error("key '{kid}' could not be parsed: {reason}")]
    Parse { kid: String, reason: String },
}

impl AuthError {
    /// The token itself is bad. `false` means key material could not be loaded and the
    /// same token may verify later.
    pub fn is_token_rejection(&self) -> bool {
        !matches!(self, AuthError::KeySet(_))
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match value.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidIssuer => Self::InvalidClaim("iss", value.to_string()),
            ErrorKind::InvalidAudience => Self::InvalidClaim("aud", value.to_string()),
            _ => Self::Rejected(value.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_set_failures_are_not_token_rejections() {
        assert!(AuthError::Expired.is_token_rejection());
        assert!(AuthError::WrongTokenUse("access".into()).is_token_rejection());
        assert!(!AuthError::from(KeySetError::MissingKid).is_token_rejection());
    }
}
