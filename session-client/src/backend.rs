use std::time::Duration;

use bytes::Bytes;
use common_http_errors::ApiError;
use http::StatusCode;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::error::{SessionError, SessionResult};
use crate::provider::{BearerToken, ProviderSession};

pub const TRACE_HEADER: &str = "X-Trace-ID";

/// HTTP transport to the application backend. Attaches the bearer credential and
/// classifies every non-2xx status; it never retries.
#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
    bearer: BearerToken,
}

/// Successful backend response.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub status: StatusCode,
    pub trace_id: Uuid,
    pub body: Bytes,
}

impl GatewayResponse {
    pub fn json<T: DeserializeOwned>(&self) -> SessionResult<T> {
        serde_json::from_slice(&self.body)
            .map_err(|err| SessionError::Malformed(format!("{err} (trace {})", self.trace_id)))
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

impl BackendClient {
    pub fn new(
        base_url: impl Into<String>,
        bearer: BearerToken,
        timeout: Duration,
    ) -> SessionResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| SessionError::Network(format!("failed to build HTTP client: {err}")))?;
        Ok(Self::with_client(client, base_url, bearer))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>, bearer: BearerToken) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bearer,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn bearer(&self) -> BearerToken {
        self.bearer
    }

    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    pub async fn send(
        &self,
        session: &ProviderSession,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> SessionResult<GatewayResponse> {
        let trace_id = Uuid::new_v4();
        let mut request = self
            .client
            .request(method.clone(), self.url(path))
            .bearer_auth(session.bearer(self.bearer))
            .header(TRACE_HEADER, trace_id.to_string());
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        debug!(%method, path, status = status.as_u16(), %trace_id, "backend call completed");

        if let Some(err) = ApiError::from_response(status, &bytes) {
            return Err(SessionError::Api(err));
        }

        Ok(GatewayResponse {
            status,
            trace_id,
            body: bytes,
        })
    }
}
