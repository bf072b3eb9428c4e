use common_auth::Role;
use common_http_errors::ErrorKind;
use serde::Serialize;

use crate::user::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Unknown,
    Checking,
    Authenticated,
    Anonymous,
}

/// Snapshot of who is signed in. Only the session controller produces new values;
/// the constructors keep `authenticated` and `user` consistent.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SessionState {
    phase: SessionPhase,
    authenticated: bool,
    user: Option<User>,
    role: Option<Role>,
    last_error: Option<ErrorKind>,
}

impl SessionState {
    pub fn anonymous(last_error: Option<ErrorKind>) -> Self {
        Self {
            phase: SessionPhase::Anonymous,
            authenticated: false,
            user: None,
            role: None,
            last_error,
        }
    }

    /// A synthesized user records `LookupFailed` so the UI can flag the profile.
    pub fn authenticated(user: User, role: Role) -> Self {
        let last_error = user.is_synthesized.then_some(ErrorKind::LookupFailed);
        Self {
            phase: SessionPhase::Authenticated,
            authenticated: true,
            user: Some(user),
            role: Some(role),
            last_error,
        }
    }

    pub(crate) fn with_phase(mut self, phase: SessionPhase) -> Self {
        self.phase = phase;
        self
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn role(&self) -> Option<&Role> {
        self.role.as_ref()
    }

    pub fn last_error(&self) -> Option<ErrorKind> {
        self.last_error
    }

    /// Signed in with a placeholder user; the UI shows a "profile incomplete" notice.
    pub fn profile_incomplete(&self) -> bool {
        self.user.as_ref().is_some_and(|user| user.is_synthesized)
    }
}
