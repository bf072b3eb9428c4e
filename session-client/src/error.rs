use common_auth::AuthError;
use common_http_errors::{ApiError, ErrorKind};
use thiserror::Error;

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("authentication required: {0}")]
    AuthRequired(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("user lookup failed: {0}")]
    LookupFailed(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("identity provider rejected the request ({code}): {message}")]
    Rejected { code: String, message: String },
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::AuthRequired(_) | SessionError::Rejected { .. } => {
                ErrorKind::AuthRequired
            }
            SessionError::Forbidden(_) => ErrorKind::Forbidden,
            SessionError::LookupFailed(_) => ErrorKind::LookupFailed,
            SessionError::Network(_) => ErrorKind::NetworkError,
            SessionError::Malformed(_) => ErrorKind::Malformed,
            SessionError::Api(err) => err.kind,
        }
    }

    /// Status-code classification, when the failure came from an HTTP response.
    pub fn status(&self) -> Option<http::StatusCode> {
        match self {
            SessionError::Api(err) => Some(err.status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SessionError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            Self::Malformed(value.to_string())
        } else {
            Self::Network(value.to_string())
        }
    }
}

impl From<AuthError> for SessionError {
    fn from(value: AuthError) -> Self {
        if value.is_token_rejection() {
            Self::AuthRequired(value.to_string())
        } else {
            Self::Network(value.to_string())
        }
    }
}
