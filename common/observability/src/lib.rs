use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

/// Counters describing how sessions are established, resolved and torn down.
#[derive(Clone)]
pub struct SessionMetrics {
    pub registry: Registry,
    pub session_checks: IntCounterVec,
    pub user_lookups: IntCounterVec,
    pub sign_outs: IntCounterVec,
    pub gateway_errors: IntCounterVec,
}

impl SessionMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let session_checks = IntCounterVec::new(
            Opts::new(
                "session_checks_total",
                "Session establishment attempts grouped by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(session_checks.clone()))?;

        let user_lookups = IntCounterVec::new(
            Opts::new(
                "session_user_lookups_total",
                "Backend user lookups grouped by found/synthesized",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(user_lookups.clone()))?;

        let sign_outs = IntCounterVec::new(
            Opts::new("session_sign_outs_total", "Sign-outs grouped by trigger"),
            &["trigger"],
        )?;
        registry.register(Box::new(sign_outs.clone()))?;

        let gateway_errors = IntCounterVec::new(
            Opts::new(
                "session_gateway_errors_total",
                "Failed authorized requests grouped by error kind",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(gateway_errors.clone()))?;

        Ok(Self {
            registry,
            session_checks,
            user_lookups,
            sign_outs,
            gateway_errors,
        })
    }

    pub fn session_check(&self, outcome: &str) {
        self.session_checks.with_label_values(&[outcome]).inc();
    }

    pub fn user_lookup(&self, outcome: &str) {
        self.user_lookups.with_label_values(&[outcome]).inc();
    }

    pub fn sign_out(&self, trigger: &str) {
        self.sign_outs.with_label_values(&[trigger]).inc();
    }

    pub fn gateway_error(&self, kind: &str) {
        self.gateway_errors.with_label_values(&[kind]).inc();
    }

    /// Prometheus text exposition of everything registered.
    pub fn render(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
