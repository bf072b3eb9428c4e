use std::sync::Arc;

use common_http_errors::ErrorKind;
use common_observability::SessionMetrics;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::backend::{BackendClient, GatewayResponse};
use crate::credential_store::CredentialStore;
use crate::error::SessionResult;

pub const DEFAULT_PAGE_LIMIT: u64 = 20;

/// Backend resource collections the feature screens work with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceEndpoint {
    Files,
    Events,
    ConversationLogs,
    AiCustoms,
    Contacts,
    AdminUsers,
}

impl ResourceEndpoint {
    pub fn path(&self) -> &'static str {
        match self {
            ResourceEndpoint::Files => "/files",
            ResourceEndpoint::Events => "/events",
            ResourceEndpoint::ConversationLogs => "/conversation-logs",
            ResourceEndpoint::AiCustoms => "/ai-customs",
            ResourceEndpoint::Contacts => "/contacts",
            ResourceEndpoint::AdminUsers => "/admin/users",
        }
    }

    pub fn item(&self, id: impl std::fmt::Display) -> String {
        let id = id.to_string();
        format!("{}/{}", self.path(), urlencoding::encode(&id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: u64,
    pub limit: u64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
    #[serde(rename = "hasMore", alias = "has_more")]
    pub has_more: bool,
}

impl Pagination {
    pub fn next_page(&self) -> Option<PageRequest> {
        if !self.has_more || self.limit == 0 {
            return None;
        }
        Some(PageRequest {
            offset: self.offset + self.limit,
            limit: self.limit,
        })
    }
}

/// List-endpoint body: `{items, pagination}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

/// The sanctioned way for feature screens to reach the backend.
///
/// Status failures are reported to the caller and never sign the user out; only
/// the session controller does that. Calls are not retried.
#[derive(Clone)]
pub struct AuthorizedGateway {
    store: Arc<CredentialStore>,
    backend: BackendClient,
    metrics: SessionMetrics,
}

impl AuthorizedGateway {
    pub fn new(store: Arc<CredentialStore>, backend: BackendClient, metrics: SessionMetrics) -> Self {
        Self {
            store,
            backend,
            metrics,
        }
    }

    pub async fn call(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<&Value>,
    ) -> SessionResult<GatewayResponse> {
        self.call_with_query(endpoint, method, &[], body).await
    }

    pub async fn call_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<&Value>,
    ) -> SessionResult<T> {
        let response = self.call(endpoint, method, body).await?;
        response.json().inspect_err(|_| {
            self.metrics.gateway_error(ErrorKind::Malformed.as_str());
        })
    }

    pub async fn list<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        page: PageRequest,
    ) -> SessionResult<Page<T>> {
        let query = [
            ("offset", page.offset.to_string()),
            ("limit", page.limit.to_string()),
        ];
        let response = self
            .call_with_query(endpoint, Method::GET, &query, None)
            .await?;
        response.json().inspect_err(|_| {
            self.metrics.gateway_error(ErrorKind::Malformed.as_str());
        })
    }

    async fn call_with_query(
        &self,
        endpoint: &str,
        method: Method,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> SessionResult<GatewayResponse> {
        let result = match self.store.get_session().await {
            Ok(session) => {
                self.backend
                    .send(&session, method.clone(), endpoint, query, body)
                    .await
            }
            Err(err) => Err(err),
        };

        result.inspect_err(|err| {
            let kind = err.kind();
            self.metrics.gateway_error(kind.as_str());
            warn!(%method, endpoint, kind = %kind, error = %err, "authorized request failed");
        })
    }
}
