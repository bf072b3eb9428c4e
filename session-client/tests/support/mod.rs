#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use common_observability::SessionMetrics;
use reqwest::Client;
use session_client::{
    BackendClient, BearerToken, IdentityClaims, IdentityProvider, ProviderSession, Registration,
    RoleExtractor, SessionController, SessionError, SessionResult, SignUpOutcome,
};

pub const SUBJECT: &str = "abc123";
pub const PASSWORD: &str = "correct horse";

pub fn fresh_session() -> ProviderSession {
    ProviderSession::new(
        "access-token",
        "id-token",
        Utc::now() + Duration::minutes(30),
    )
}

pub fn expired_session() -> ProviderSession {
    ProviderSession::new("old-access", "old-id", Utc::now() - Duration::minutes(5))
}

pub fn claims(groups: &[&str]) -> IdentityClaims {
    IdentityClaims {
        subject_id: SUBJECT.to_string(),
        username: "jane@example.com".to_string(),
        groups: groups.iter().map(|g| g.to_string()).collect(),
        issued_at: Some(Utc::now()),
        expires_at: Utc::now() + Duration::minutes(30),
        raw: serde_json::Value::Null,
    }
}

/// In-memory identity provider that counts every call.
pub struct FakeProvider {
    session: Mutex<Option<ProviderSession>>,
    refreshed: Mutex<Option<ProviderSession>>,
    claims: Mutex<IdentityClaims>,
    delay: Mutex<Option<StdDuration>>,
    sign_out_delay: Mutex<Option<StdDuration>>,
    pub fail_sign_out: AtomicBool,
    pub unreachable: AtomicBool,
    pub confirm_sign_up: AtomicBool,
    pub sign_in_calls: AtomicUsize,
    pub sign_up_calls: AtomicUsize,
    pub sign_out_calls: AtomicUsize,
    pub current_session_calls: AtomicUsize,
}

impl FakeProvider {
    pub fn signed_in(groups: &[&str]) -> Arc<Self> {
        let provider = Self::signed_out(groups);
        *provider.session.lock().unwrap() = Some(fresh_session());
        provider
    }

    pub fn signed_out(groups: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            session: Mutex::new(None),
            refreshed: Mutex::new(None),
            claims: Mutex::new(claims(groups)),
            delay: Mutex::new(None),
            sign_out_delay: Mutex::new(None),
            fail_sign_out: AtomicBool::new(false),
            unreachable: AtomicBool::new(false),
            confirm_sign_up: AtomicBool::new(true),
            sign_in_calls: AtomicUsize::new(0),
            sign_up_calls: AtomicUsize::new(0),
            sign_out_calls: AtomicUsize::new(0),
            current_session_calls: AtomicUsize::new(0),
        })
    }

    pub fn set_session(&self, session: Option<ProviderSession>) {
        *self.session.lock().unwrap() = session;
    }

    /// Session handed out once the held one has expired.
    pub fn set_refreshed(&self, session: Option<ProviderSession>) {
        *self.refreshed.lock().unwrap() = session;
    }

    /// Delay every `current_session` call, to keep a check in flight.
    pub fn set_delay(&self, delay: StdDuration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Delay every `sign_out` call.
    pub fn set_sign_out_delay(&self, delay: StdDuration) {
        *self.sign_out_delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    async fn sign_in(&self, _username: &str, password: &str) -> SessionResult<ProviderSession> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        if password != PASSWORD {
            return Err(SessionError::Rejected {
                code: "NotAuthorizedException".into(),
                message: "Incorrect username or password.".into(),
            });
        }
        let session = fresh_session();
        self.set_session(Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, _registration: &Registration) -> SessionResult<SignUpOutcome> {
        self.sign_up_calls.fetch_add(1, Ordering::SeqCst);
        Ok(SignUpOutcome {
            subject_id: SUBJECT.to_string(),
            confirmed: self.confirm_sign_up.load(Ordering::SeqCst),
        })
    }

    async fn sign_out(&self) -> SessionResult<()> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.sign_out_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.set_session(None);
        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(SessionError::Network("connection reset".into()));
        }
        Ok(())
    }

    async fn current_session(&self) -> SessionResult<ProviderSession> {
        self.current_session_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(SessionError::Network("idp 503".into()));
        }
        let held = self.session.lock().unwrap().clone();
        match held {
            Some(session) if session.expires_at > Utc::now() => Ok(session),
            Some(_) => self
                .refreshed
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| SessionError::AuthRequired("refresh token expired".into())),
            None => Err(SessionError::AuthRequired("no signed-in user".into())),
        }
    }

    async fn decode_identity_claims(&self, _token: &str) -> SessionResult<IdentityClaims> {
        Ok(self.claims.lock().unwrap().clone())
    }
}

pub fn backend(base_url: &str) -> BackendClient {
    BackendClient::with_client(Client::new(), base_url, BearerToken::Id)
}

pub fn controller(provider: Arc<FakeProvider>, base_url: &str) -> SessionController {
    SessionController::new(
        provider,
        backend(base_url),
        RoleExtractor::default(),
        Duration::seconds(60),
        SessionMetrics::new().expect("metrics"),
    )
}

pub fn registration() -> Registration {
    Registration {
        username: "jane".into(),
        password: PASSWORD.into(),
        email: "jane@example.com".into(),
        company_name: "Springfield Elementary".into(),
        phone_number: "+15550100".into(),
    }
}
