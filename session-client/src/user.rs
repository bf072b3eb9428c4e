use common_auth::{IdentityClaims, Role};
use serde::{Deserialize, Deserializer, Serialize};

/// Id given to users built from token claims alone.
pub const SYNTHESIZED_USER_ID: i64 = -1;

/// Application-level user record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(deserialize_with = "id_from_number_or_string")]
    pub id: i64,
    #[serde(default, deserialize_with = "string_or_null")]
    pub email: String,
    #[serde(default, alias = "companyName", deserialize_with = "string_or_null")]
    pub company_name: String,
    #[serde(default, alias = "phoneNumber", deserialize_with = "string_or_null")]
    pub phone_number: String,
    #[serde(default)]
    pub role: Role,
    /// Placeholder built from claims because the backend lookup failed.
    #[serde(default, skip_deserializing)]
    pub is_synthesized: bool,
}

impl User {
    /// Minimal record from claims. Only ever carries the base role.
    pub fn synthesized(claims: &IdentityClaims) -> Self {
        Self {
            id: SYNTHESIZED_USER_ID,
            email: claims.username.clone(),
            company_name: String::new(),
            phone_number: String::new(),
            role: Role::Customer,
            is_synthesized: true,
        }
    }

    pub fn is_authoritative(&self) -> bool {
        !self.is_synthesized
    }
}

fn string_or_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn id_from_number_or_string<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdRepr {
        Number(i64),
        Text(String),
    }

    match IdRepr::deserialize(deserializer)? {
        IdRepr::Number(value) => Ok(value),
        IdRepr::Text(value) => value
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid user id '{value}'"))),
    }
}
