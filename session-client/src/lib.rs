pub mod backend;
pub mod cognito;
pub mod config;
pub mod controller;
pub mod credential_store;
pub mod error;
pub mod gateway;
pub mod provider;
pub mod resolver;
pub mod role_extractor;
pub mod route_guard;
pub mod state;
pub mod user;

pub use backend::{BackendClient, GatewayResponse};
pub use cognito::CognitoProvider;
pub use config::{IdpConfig, SessionConfig};
pub use controller::{RegistrationOutcome, SessionController};
pub use credential_store::CredentialStore;
pub use error::{SessionError, SessionResult};
pub use gateway::{AuthorizedGateway, Page, PageRequest, Pagination, ResourceEndpoint};
pub use provider::{BearerToken, IdentityProvider, ProviderSession, Registration, SignUpOutcome};
pub use resolver::IdentityResolver;
pub use role_extractor::{AuthorizationModel, RoleExtractor};
pub use route_guard::{select_route, RouteKey};
pub use state::{SessionPhase, SessionState};
pub use user::{User, SYNTHESIZED_USER_ID};

pub use common_auth::{IdentityClaims, Role};
pub use common_http_errors::ErrorKind;
