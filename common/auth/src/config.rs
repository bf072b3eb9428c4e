const DEFAULT_LEEWAY_SECONDS: u32 = 30;

/// What an ID token must carry to be accepted: the user pool that issued it and
/// the app client it was issued to.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// User-pool URL, matched against `iss`.
    pub issuer: String,
    /// App client id, matched against `aud`.
    pub audience: String,
    /// Clock skew tolerated on `exp`/`nbf`.
    pub leeway_seconds: u32,
}

impl JwtConfig {
    pub fn new(issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            leeway_seconds: DEFAULT_LEEWAY_SECONDS,
        }
    }

    pub fn with_leeway(self, seconds: u32) -> Self {
        Self {
            leeway_seconds: seconds,
            ..self
        }
    }

    /// Signing keys published under the issuer.
    pub fn jwks_url(&self) -> String {
        let issuer = self.issuer.trim_end_matches('/');
        format!("{issuer}/.well-known/jwks.json")
    }
}
