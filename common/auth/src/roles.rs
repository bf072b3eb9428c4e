use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_STAFF: &str = "staff";
pub const ROLE_CUSTOMER: &str = "customer";

/// Group-name fragments that mark elevated groups in ID-token claims.
pub const DEFAULT_ADMIN_GROUP_MARKER: &str = "admin";
pub const DEFAULT_STAFF_GROUP_MARKER: &str = "sft";

/// Authorization role of the signed-in user, most privileged first.
pub const ROLE_HIERARCHY: &[&str] = &[ROLE_ADMIN, ROLE_STAFF, ROLE_CUSTOMER];

/// Closed role set. `Customer` is the least-privileged role; `Unrecognized`
/// carries a role string nothing here understands and never grants access.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Role {
    #[default]
    Customer,
    Staff,
    Admin,
    Unrecognized(String),
}

impl Role {
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "" | ROLE_CUSTOMER | "school" | "user" => Role::Customer,
            ROLE_STAFF | "sft" => Role::Staff,
            ROLE_ADMIN => Role::Admin,
            _ => Role::Unrecognized(trimmed.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Customer => ROLE_CUSTOMER,
            Role::Staff => ROLE_STAFF,
            Role::Admin => ROLE_ADMIN,
            Role::Unrecognized(value) => value,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Role::Unrecognized(_))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(Role::parse).unwrap_or_default())
    }
}
