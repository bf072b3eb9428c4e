use common_auth::Role;
use serde::Serialize;

use crate::state::SessionState;

/// Top-level screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteKey {
    Landing,
    CustomerDashboard,
    StaffDashboard,
    AdminDashboard,
    AccessDenied,
}

impl RouteKey {
    pub fn path(&self) -> &'static str {
        match self {
            RouteKey::Landing => "/login",
            RouteKey::CustomerDashboard => "/dashboard",
            RouteKey::StaffDashboard => "/sft/dashboard",
            RouteKey::AdminDashboard => "/admin/dashboard",
            RouteKey::AccessDenied => "/access-denied",
        }
    }
}

/// Screen for the given session. Pure; evaluated on every navigation.
pub fn select_route(state: &SessionState) -> RouteKey {
    if !state.is_authenticated() {
        return RouteKey::Landing;
    }
    match state.role() {
        None | Some(Role::Customer) => RouteKey::CustomerDashboard,
        Some(Role::Staff) => RouteKey::StaffDashboard,
        Some(Role::Admin) => RouteKey::AdminDashboard,
        Some(Role::Unrecognized(_)) => RouteKey::AccessDenied,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::User;
    use common_http_errors::ErrorKind;

    fn signed_in(role: Role) -> SessionState {
        let user = User {
            id: 7,
            email: "a@x.com".into(),
            company_name: String::new(),
            phone_number: String::new(),
            role: role.clone(),
            is_synthesized: false,
        };
        SessionState::authenticated(user, role)
    }

    #[test]
    fn signed_out_goes_to_landing() {
        assert_eq!(select_route(&SessionState::default()), RouteKey::Landing);
        assert_eq!(
            select_route(&SessionState::anonymous(Some(ErrorKind::AuthRequired))),
            RouteKey::Landing
        );
    }

    #[test]
    fn roles_map_to_dashboards() {
        assert_eq!(select_route(&signed_in(Role::Admin)), RouteKey::AdminDashboard);
        assert_eq!(select_route(&signed_in(Role::Staff)), RouteKey::StaffDashboard);
        assert_eq!(
            select_route(&signed_in(Role::Customer)),
            RouteKey::CustomerDashboard
        );
    }

    #[test]
    fn empty_role_string_is_default_dashboard() {
        assert_eq!(
            select_route(&signed_in(Role::parse(""))),
            RouteKey::CustomerDashboard
        );
    }

    #[test]
    fn unrecognized_role_is_denied() {
        let state = signed_in(Role::parse("superuser"));
        assert_eq!(select_route(&state), RouteKey::AccessDenied);
        assert_eq!(RouteKey::AccessDenied.path(), "/access-denied");
    }
}
