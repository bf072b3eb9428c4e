use std::str::FromStr;

use common_auth::{IdentityClaims, Role, DEFAULT_ADMIN_GROUP_MARKER, DEFAULT_STAFF_GROUP_MARKER};
use tracing::debug;

use crate::user::User;

/// Where a deployment takes its authorization role from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthorizationModel {
    /// Authoritative user record wins; claims decide when the record is synthesized.
    #[default]
    Reconciled,
    /// Group claims only.
    Claims,
    /// `user.role` only; claims are ignored.
    Database,
}

impl FromStr for AuthorizationModel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "reconciled" | "hybrid" => Ok(AuthorizationModel::Reconciled),
            "claims" | "groups" => Ok(AuthorizationModel::Claims),
            "database" | "db" => Ok(AuthorizationModel::Database),
            other => Err(format!(
                "Unsupported authorization model '{other}'. Use reconciled, claims, or database."
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RoleExtractor {
    model: AuthorizationModel,
    admin_marker: String,
    staff_marker: String,
}

impl Default for RoleExtractor {
    fn default() -> Self {
        Self::new(AuthorizationModel::default())
    }
}

impl RoleExtractor {
    pub fn new(model: AuthorizationModel) -> Self {
        Self {
            model,
            admin_marker: DEFAULT_ADMIN_GROUP_MARKER.to_string(),
            staff_marker: DEFAULT_STAFF_GROUP_MARKER.to_string(),
        }
    }

    /// Override the group-name fragments. An empty marker matches nothing.
    pub fn with_markers(mut self, admin: &str, staff: &str) -> Self {
        self.admin_marker = admin.trim().to_ascii_lowercase();
        self.staff_marker = staff.trim().to_ascii_lowercase();
        self
    }

    pub fn model(&self) -> AuthorizationModel {
        self.model
    }

    /// Role carried by the group claims: first group matching a marker, else the base role.
    pub fn claims_role(&self, claims: &IdentityClaims) -> Role {
        for group in &claims.groups {
            let group = group.to_ascii_lowercase();
            if !self.admin_marker.is_empty() && group.contains(&self.admin_marker) {
                return Role::Admin;
            }
            if !self.staff_marker.is_empty() && group.contains(&self.staff_marker) {
                return Role::Staff;
            }
        }
        Role::Customer
    }

    pub fn extract_role(&self, claims: &IdentityClaims, user: &User) -> Role {
        match self.model {
            AuthorizationModel::Claims => self.claims_role(claims),
            AuthorizationModel::Database => user.role.clone(),
            AuthorizationModel::Reconciled => {
                let from_claims = self.claims_role(claims);
                if user.is_synthesized {
                    return from_claims;
                }
                if !claims.groups.is_empty() && from_claims != user.role {
                    debug!(
                        subject_id = %claims.subject_id,
                        claims_role = %from_claims,
                        user_role = %user.role,
                        "role claims disagree with user record, record wins"
                    );
                }
                user.role.clone()
            }
        }
    }
}
