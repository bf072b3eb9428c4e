use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Duration;
use common_auth::Role;
use common_observability::SessionMetrics;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::backend::BackendClient;
use crate::config::SessionConfig;
use crate::credential_store::CredentialStore;
use crate::error::SessionResult;
use crate::gateway::AuthorizedGateway;
use crate::provider::{IdentityProvider, ProviderSession, Registration};
use crate::resolver::IdentityResolver;
use crate::role_extractor::RoleExtractor;
use crate::state::{SessionPhase, SessionState};
use crate::user::User;

#[derive(Debug, Clone, PartialEq)]
pub enum RegistrationOutcome {
    SignedIn(SessionState),
    /// The provider wants the account confirmed before it can sign in.
    ConfirmationRequired { subject_id: String },
}

/// Owns the process-wide [`SessionState`] and is its only writer.
///
/// Checks are serialized: a check that queues behind a running one adopts that
/// result instead of resolving again. Every result is tagged with the generation it
/// started in; sign-in, sign-out and [`cancel_pending`](Self::cancel_pending) bump the
/// generation so results that arrive afterwards are dropped.
pub struct SessionController {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<CredentialStore>,
    backend: BackendClient,
    resolver: IdentityResolver,
    extractor: RoleExtractor,
    metrics: SessionMetrics,
    state: watch::Sender<SessionState>,
    check_lock: Mutex<()>,
    completed_checks: AtomicU64,
    generation: AtomicU64,
}

impl SessionController {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        backend: BackendClient,
        extractor: RoleExtractor,
        token_skew: Duration,
        metrics: SessionMetrics,
    ) -> Self {
        let store = Arc::new(CredentialStore::with_skew(provider.clone(), token_skew));
        let resolver = IdentityResolver::new(backend.clone(), metrics.clone());
        let (state, _) = watch::channel(SessionState::default());
        Self {
            provider,
            store,
            backend,
            resolver,
            extractor,
            metrics,
            state,
            check_lock: Mutex::new(()),
            completed_checks: AtomicU64::new(0),
            generation: AtomicU64::new(0),
        }
    }

    pub fn from_config(
        provider: Arc<dyn IdentityProvider>,
        config: &SessionConfig,
        metrics: SessionMetrics,
    ) -> SessionResult<Self> {
        let backend = BackendClient::new(
            config.api_base_url.clone(),
            config.bearer_token,
            config.http_timeout,
        )?;
        Ok(Self::new(
            provider,
            backend,
            config.role_extractor(),
            config.token_skew,
            metrics,
        ))
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Gateway sharing this controller's credential store.
    pub fn gateway(&self) -> AuthorizedGateway {
        AuthorizedGateway::new(self.store.clone(), self.backend.clone(), self.metrics.clone())
    }

    pub fn credential_store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    /// Establish the session from whatever the provider currently holds.
    pub async fn check_auth_status(&self) -> SessionState {
        let observed = self.completed_checks.load(Ordering::SeqCst);
        let _serial = self.check_lock.lock().await;
        if self.completed_checks.load(Ordering::SeqCst) != observed {
            debug!("adopting result of the check that finished while queued");
            return self.snapshot();
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let previous_phase = self.state.borrow().phase();
        self.state
            .send_modify(|state| *state = state.clone().with_phase(SessionPhase::Checking));

        let outcome = match self.store.get_session().await {
            Ok(session) => self.establish(session, None).await,
            Err(err) => Err(err),
        };

        match outcome {
            Ok(next) => {
                if self.commit(generation, next) {
                    self.metrics.session_check("authenticated");
                } else {
                    self.restore_phase(previous_phase);
                }
            }
            Err(err) if err.kind().is_transient() => {
                warn!(error = %err, "session check interrupted, keeping provider tokens");
                if self.commit(generation, SessionState::anonymous(Some(err.kind()))) {
                    self.metrics.session_check("unavailable");
                } else {
                    self.restore_phase(previous_phase);
                }
            }
            Err(err) => {
                info!(error = %err, "session check failed, signing out locally");
                if self.commit(generation, SessionState::anonymous(Some(err.kind()))) {
                    self.metrics.session_check("anonymous");
                    self.cleanup_sign_out().await;
                } else {
                    self.restore_phase(previous_phase);
                }
            }
        }
        self.completed_checks.fetch_add(1, Ordering::SeqCst);

        self.snapshot()
    }

    /// Sign in with the provider and go straight to `Authenticated`.
    pub async fn sign_in(&self, username: &str, password: &str) -> SessionResult<SessionState> {
        let session = self.provider.sign_in(username, password).await?;
        Ok(self.on_login_success(session).await)
    }

    /// Apply a freshly issued session without asking the provider for it again.
    pub async fn on_login_success(&self, session: ProviderSession) -> SessionState {
        self.adopt_session(session, None, "login").await
    }

    /// Like [`on_login_success`](Self::on_login_success), with the user record the
    /// registration flow already created, when it has one.
    pub async fn on_register_success(
        &self,
        session: ProviderSession,
        user: Option<User>,
    ) -> SessionState {
        self.adopt_session(session, user, "register").await
    }

    /// Provider sign-up, sign-in, then a best-effort backend user record.
    pub async fn register(
        &self,
        registration: &Registration,
    ) -> SessionResult<RegistrationOutcome> {
        let outcome = self.provider.sign_up(registration).await?;
        if !outcome.confirmed {
            info!(subject_id = %outcome.subject_id, "registration awaiting confirmation");
            return Ok(RegistrationOutcome::ConfirmationRequired {
                subject_id: outcome.subject_id,
            });
        }

        let session = self
            .provider
            .sign_in(&registration.username, &registration.password)
            .await?;
        let user = match self.provider.decode_identity_claims(&session.id_token).await {
            Ok(claims) => {
                self.resolver
                    .create_user(&session, &claims, registration)
                    .await
            }
            Err(err) => {
                warn!(error = %err, "could not decode claims of new session");
                None
            }
        };
        let state = self.on_register_success(session, user).await;
        Ok(RegistrationOutcome::SignedIn(state))
    }

    /// Always ends `Anonymous`, even when the provider call fails.
    pub async fn sign_out(&self) -> SessionState {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Err(err) = self.provider.sign_out().await {
            warn!(error = %err, "provider sign-out failed, clearing local session anyway");
        }
        self.store.invalidate().await;
        self.metrics.sign_out("user");
        self.state.send_modify(|state| {
            self.generation.fetch_add(1, Ordering::SeqCst);
            *state = SessionState::anonymous(None);
        });
        info!("signed out");
        self.snapshot()
    }

    /// Replace the current user after a profile update and re-derive the role.
    pub async fn apply_profile_update(&self, user: User) -> SessionResult<SessionState> {
        if !self.state.borrow().is_authenticated() {
            warn!("ignoring profile update without an authenticated session");
            return Ok(self.snapshot());
        }
        let generation = self.generation.load(Ordering::SeqCst);
        let session = self.store.get_session().await?;
        let next = self.establish(session, Some(user)).await?;
        if !self.commit(generation, next) {
            debug!("profile update superseded");
        }
        Ok(self.snapshot())
    }

    /// Drop the result of any check still in flight (navigation away).
    pub fn cancel_pending(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    async fn adopt_session(
        &self,
        session: ProviderSession,
        user: Option<User>,
        trigger: &'static str,
    ) -> SessionState {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.store.replace(session.clone()).await;
        match self.establish(session, user).await {
            Ok(next) => {
                if self.commit(generation, next) {
                    self.metrics.session_check(trigger);
                }
            }
            Err(err) => {
                warn!(error = %err, trigger, "fresh session could not be established");
                let kind = err.kind();
                if self.commit(generation, SessionState::anonymous(Some(kind)))
                    && !kind.is_transient()
                {
                    self.cleanup_sign_out().await;
                }
            }
        }
        self.snapshot()
    }

    async fn establish(
        &self,
        session: ProviderSession,
        known_user: Option<User>,
    ) -> SessionResult<SessionState> {
        let claims = self
            .provider
            .decode_identity_claims(&session.id_token)
            .await?;
        let user = match known_user {
            Some(user) => user,
            None => self.resolver.resolve(&session, &claims).await,
        };
        let role: Role = self.extractor.extract_role(&claims, &user);
        info!(
            subject_id = %claims.subject_id,
            role = %role,
            synthesized = user.is_synthesized,
            "session established"
        );
        Ok(SessionState::authenticated(user, role))
    }

    /// Publish `next` unless the generation moved since the work started.
    fn commit(&self, generation: u64, next: SessionState) -> bool {
        self.state.send_if_modified(|state| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            *state = next;
            true
        })
    }

    fn restore_phase(&self, previous: SessionPhase) {
        debug!("discarding stale session check result");
        self.state.send_if_modified(|state| {
            if state.phase() != SessionPhase::Checking {
                return false;
            }
            let phase = if state.is_authenticated() {
                SessionPhase::Authenticated
            } else if previous == SessionPhase::Unknown {
                SessionPhase::Unknown
            } else {
                SessionPhase::Anonymous
            };
            *state = state.clone().with_phase(phase);
            true
        });
    }

    async fn cleanup_sign_out(&self) {
        if let Err(err) = self.provider.sign_out().await {
            warn!(error = %err, "cleanup sign-out failed");
        }
        self.store.invalidate().await;
        self.metrics.sign_out("cleanup");
    }
}

