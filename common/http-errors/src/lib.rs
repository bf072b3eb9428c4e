//! Error taxonomy shared by every outbound call in the session layer, and the single
//! place an HTTP status is turned into one of those kinds.

use std::fmt;

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Failure classes the UI layer is expected to react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No valid session; the user has to sign in.
    AuthRequired,
    /// Valid session, insufficient role.
    Forbidden,
    /// Identity-to-user resolution failed. Absorbed by the resolver.
    LookupFailed,
    /// Transport failure; the calling screen owns retry.
    NetworkError,
    /// Response did not have the expected shape.
    Malformed,
    NotFound,
    /// Backend answered 5xx.
    Server,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::AuthRequired => "auth_required",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::LookupFailed => "lookup_failed",
            ErrorKind::NetworkError => "network_error",
            ErrorKind::Malformed => "malformed",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Server => "server",
        }
    }

    /// Worth retrying from the caller's point of view.
    pub fn is_transient(&self) -> bool {
        matches!(self, ErrorKind::NetworkError | ErrorKind::Server)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a non-success status to its kind. Success statuses return `None`.
pub fn classify_status(status: StatusCode) -> Option<ErrorKind> {
    if status.is_success() {
        return None;
    }
    let kind = match status {
        StatusCode::UNAUTHORIZED => ErrorKind::AuthRequired,
        StatusCode::FORBIDDEN => ErrorKind::Forbidden,
        StatusCode::NOT_FOUND | StatusCode::GONE => ErrorKind::NotFound,
        s if s.is_server_error() => ErrorKind::Server,
        // 1xx/3xx never reach us with redirects followed; treat leftovers as shape errors.
        _ => ErrorKind::Malformed,
    };
    Some(kind)
}

/// Error body the backends return: `{code, message, trace_id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default, alias = "error", alias = "detail")]
    pub message: Option<String>,
    #[serde(default)]
    pub trace_id: Option<Uuid>,
}

impl ErrorBody {
    /// Best-effort parse; bodies that are not JSON become the message verbatim.
    pub fn parse(bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            return Self::default();
        }
        match serde_json::from_slice::<ErrorBody>(bytes) {
            Ok(body) => body,
            Err(_) => Self {
                message: Some(String::from_utf8_lossy(bytes).trim().to_string())
                    .filter(|value| !value.is_empty()),
                ..Self::default()
            },
        }
    }
}

/// A classified failure of a backend call.
#[derive(Debug, Clone, Error)]
#[error("{kind} ({status}): {}", .body.message.as_deref().unwrap_or("no details"))]
pub struct ApiError {
    pub kind: ErrorKind,
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    /// Build from a response status and raw body. Returns `None` for success statuses.
    pub fn from_response(status: StatusCode, body: &[u8]) -> Option<Self> {
        let kind = classify_status(status)?;
        Some(Self {
            kind,
            status,
            body: ErrorBody::parse(body),
        })
    }

    pub fn code(&self) -> Option<&str> {
        self.body.code.as_deref()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
