pub mod claims;
pub mod config;
pub mod error;
pub mod jwks;
pub mod roles;
pub mod verifier;

pub use claims::IdentityClaims;
pub use config::JwtConfig;
pub use error::{AuthError, AuthResult, KeySetError};
pub use jwks::{PoolKeySource, SigningKey};
pub use roles::{
    Role, DEFAULT_ADMIN_GROUP_MARKER, DEFAULT_STAFF_GROUP_MARKER, ROLE_ADMIN, ROLE_CUSTOMER,
    ROLE_HIERARCHY, ROLE_STAFF,
};
pub use verifier::{IdTokenVerifier, IdTokenVerifierBuilder, SigningKeyCache};
