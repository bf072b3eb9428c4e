use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde_json::Value;
use tracing::{debug, info};

use crate::claims::IdentityClaims;
use crate::config::JwtConfig;
use crate::error::{AuthError, AuthResult, KeySetError};
use crate::jwks::{PoolKeySource, SigningKey};

const ID_TOKEN_USE: &str = "id";

/// Signing keys known to a verifier, by `kid`. Clones share the same cache.
#[derive(Clone, Default)]
pub struct SigningKeyCache {
    keys: Arc<RwLock<HashMap<String, DecodingKey>>>,
}

impl SigningKeyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, kid: impl Into<String>, key: DecodingKey) {
        self.keys
            .write()
            .expect("rwlock poisoned")
            .insert(kid.into(), key);
    }

    pub fn insert_rsa_pem(&self, kid: impl Into<String>, pem: &[u8]) -> AuthResult<()> {
        let kid = kid.into();
        let key = DecodingKey::from_rsa_pem(pem).map_err(|err| KeySetError::Parse {
            kid: kid.clone(),
            reason: err.to_string(),
        })?;
        self.insert(kid, key);
        Ok(())
    }

    pub fn get(&self, kid: &str) -> Option<DecodingKey> {
        self.keys.read().expect("rwlock poisoned").get(kid).cloned()
    }

    pub fn contains(&self, kid: &str) -> bool {
        self.keys.read().expect("rwlock poisoned").contains_key(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.read().expect("rwlock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Swap in a freshly published key set. Rotated-out keys are dropped.
    pub fn replace(&self, published: Vec<SigningKey>) {
        let next: HashMap<_, _> = published
            .into_iter()
            .map(|signing| (signing.kid, signing.key))
            .collect();
        *self.keys.write().expect("rwlock poisoned") = next;
    }
}

/// Verifies user-pool ID tokens and turns them into [`IdentityClaims`].
///
/// Only ID tokens are accepted (`token_use` must be `id` when present). With a
/// [`PoolKeySource`] configured, a token signed by a key the cache has not seen yet
/// triggers one reload of the published keys before it is rejected.
#[derive(Clone)]
pub struct IdTokenVerifier {
    config: JwtConfig,
    keys: SigningKeyCache,
    source: Option<PoolKeySource>,
}

impl IdTokenVerifier {
    pub fn new(config: JwtConfig) -> Self {
        Self::with_keys(config, SigningKeyCache::new())
    }

    pub fn with_keys(config: JwtConfig, keys: SigningKeyCache) -> Self {
        Self {
            config,
            keys,
            source: None,
        }
    }

    pub fn builder(config: JwtConfig) -> IdTokenVerifierBuilder {
        IdTokenVerifierBuilder {
            config,
            keys: SigningKeyCache::new(),
            source: None,
        }
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    pub fn keys(&self) -> &SigningKeyCache {
        &self.keys
    }

    pub fn key_source(&self) -> Option<&PoolKeySource> {
        self.source.as_ref()
    }

    /// Check signature, issuer, audience and expiry against the cached keys.
    pub fn verify(&self, token: &str) -> AuthResult<IdentityClaims> {
        let header = decode_header(token).map_err(|err| AuthError::Header(err.to_string()))?;
        let kid = header.kid.ok_or(AuthError::MissingKeyId)?;
        let key = self
            .keys
            .get(&kid)
            .ok_or_else(|| AuthError::UnknownSigningKey(kid.clone()))?;

        let payload = decode::<Value>(token, &key, &self.validation())?.claims;
        match payload.get("token_use").and_then(Value::as_str) {
            Some(ID_TOKEN_USE) | None => {}
            Some(other) => return Err(AuthError::WrongTokenUse(other.to_string())),
        }

        let claims = IdentityClaims::try_from(payload)?;
        debug!(kid = %kid, subject_id = %claims.subject_id, "verified ID token");
        Ok(claims)
    }

    /// [`verify`](Self::verify), reloading the published keys once when the token
    /// names a key the cache does not hold.
    pub async fn verify_with_refresh(&self, token: &str) -> AuthResult<IdentityClaims> {
        match self.verify(token) {
            Err(AuthError::UnknownSigningKey(kid)) if self.source.is_some() => {
                info!(kid = %kid, "token signed with an unseen key, reloading pool keys");
                self.reload_keys().await?;
                self.verify(token)
            }
            other => other,
        }
    }

    /// Replace the cache with the currently published keys. Returns how many were
    /// loaded; an empty set leaves the cache untouched.
    pub async fn reload_keys(&self) -> AuthResult<usize> {
        let Some(source) = &self.source else {
            return Ok(0);
        };
        let published = source.fetch().await?;
        let count = published.len();
        if count > 0 {
            self.keys.replace(published);
        }
        Ok(count)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[self.config.issuer.as_str()]);
        validation.set_audience(&[self.config.audience.as_str()]);
        validation.leeway = self.config.leeway_seconds.into();
        validation
    }
}

pub struct IdTokenVerifierBuilder {
    config: JwtConfig,
    keys: SigningKeyCache,
    source: Option<PoolKeySource>,
}

impl IdTokenVerifierBuilder {
    pub fn with_keys(mut self, keys: SigningKeyCache) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_decoding_key(self, kid: impl Into<String>, key: DecodingKey) -> Self {
        self.keys.insert(kid, key);
        self
    }

    pub fn with_rsa_pem(self, kid: impl Into<String>, pem: &[u8]) -> AuthResult<Self> {
        self.keys.insert_rsa_pem(kid, pem)?;
        Ok(self)
    }

    /// Load keys from `{issuer}/.well-known/jwks.json`.
    pub fn with_issuer_keys(mut self) -> Self {
        self.source = Some(PoolKeySource::for_issuer(&self.config));
        self
    }

    pub fn with_key_source(mut self, source: PoolKeySource) -> Self {
        self.source = Some(source);
        self
    }

    /// No network access; keys load on the first unseen `kid`.
    pub fn build_lazy(self) -> IdTokenVerifier {
        IdTokenVerifier {
            config: self.config,
            keys: self.keys,
            source: self.source,
        }
    }

    pub async fn build(self) -> AuthResult<IdTokenVerifier> {
        let verifier = self.build_lazy();
        verifier.reload_keys().await?;
        Ok(verifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use chrono::Utc;
    use httpmock::prelude::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey, LineEnding};
    use rsa::rand_core::OsRng;
    use rsa::traits::PublicKeyParts;
    use rsa::RsaPrivateKey;
    use serde_json::json;

    const ISSUER: &str = "https://idp.test/pool-1";
    const CLIENT: &str = "admissions-web";

    struct PoolKey {
        signing: EncodingKey,
        verifying: DecodingKey,
        n: String,
        e: String,
    }

    fn pool_key() -> PoolKey {
        let private_key = RsaPrivateKey::new(&mut OsRng, 2048).expect("key generation");
        let public_key = private_key.to_public_key();
        let private_pem = private_key
            .to_pkcs1_pem(LineEnding::LF)
            .expect("private pem");
        let public_pem = public_key.to_pkcs1_pem(LineEnding::LF).expect("public pem");

        PoolKey {
            signing: EncodingKey::from_rsa_pem(private_pem.as_bytes()).expect("encoding key"),
            verifying: DecodingKey::from_rsa_pem(public_pem.as_bytes()).expect("decoding key"),
            n: URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
            e: URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
        }
    }

    fn mint(key: &PoolKey, kid: &str, payload: serde_json::Value) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.to_string());
        encode(&header, &payload, &key.signing).expect("sign token")
    }

    fn id_token_payload(token_use: &str, ttl: i64) -> serde_json::Value {
        let now = Utc::now().timestamp();
        json!({
            "sub": "abc123",
            "cognito:username": "jane",
            "cognito:groups": ["sft-reviewers"],
            "token_use": token_use,
            "iss": ISSUER,
            "aud": CLIENT,
            "iat": now,
            "exp": now + ttl,
        })
    }

    fn verifier_trusting(kid: &str, key: &PoolKey) -> IdTokenVerifier {
        IdTokenVerifier::builder(JwtConfig::new(ISSUER, CLIENT))
            .with_decoding_key(kid, key.verifying.clone())
            .build_lazy()
    }

    #[test]
    fn replace_drops_rotated_out_keys() {
        let cache = SigningKeyCache::new();
        assert!(cache.is_empty());
        cache.insert("old", DecodingKey::from_secret(b"old"));

        cache.replace(vec![SigningKey {
            kid: "new".into(),
            key: DecodingKey::from_secret(b"new"),
        }]);

        assert!(!cache.contains("old"));
        assert!(cache.contains("new"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn accepts_id_token_from_trusted_key() {
        let key = pool_key();
        let verifier = verifier_trusting("k1", &key);

        let claims = verifier
            .verify(&mint(&key, "k1", id_token_payload("id", 600)))
            .expect("verified");

        assert_eq!(claims.subject_id, "abc123");
        assert_eq!(claims.username, "jane");
        assert_eq!(claims.groups, vec!["sft-reviewers".to_string()]);
        assert_eq!(claims.raw["token_use"], "id");
    }

    #[test]
    fn access_tokens_are_not_identity() {
        let key = pool_key();
        let verifier = verifier_trusting("k1", &key);

        let err = verifier
            .verify(&mint(&key, "k1", id_token_payload("access", 600)))
            .expect_err("access token");
        assert!(matches!(err, AuthError::WrongTokenUse(ref value) if value == "access"));
    }

    #[test]
    fn expired_and_foreign_tokens_are_rejected() {
        let key = pool_key();
        let verifier = verifier_trusting("k1", &key);

        let expired = verifier
            .verify(&mint(&key, "k1", id_token_payload("id", -3600)))
            .expect_err("expired");
        assert!(matches!(expired, AuthError::Expired));

        let mut foreign = id_token_payload("id", 600);
        foreign["aud"] = json!("another-client");
        let err = verifier
            .verify(&mint(&key, "k1", foreign))
            .expect_err("wrong audience");
        assert!(matches!(err, AuthError::InvalidClaim("aud", _)));
        assert!(err.is_token_rejection());
    }

    #[test]
    fn unknown_kid_without_source_is_rejected() {
        let key = pool_key();
        let verifier = IdTokenVerifier::new(JwtConfig::new(ISSUER, CLIENT));

        let err = verifier
            .verify(&mint(&key, "missing", id_token_payload("id", 600)))
            .expect_err("unknown key");
        assert!(matches!(err, AuthError::UnknownSigningKey(ref kid) if kid == "missing"));
    }

    #[tokio::test]
    async fn rotated_key_is_loaded_on_demand() {
        let key = pool_key();
        let server = MockServer::start_async().await;
        let published = json!({
            "keys": [
                { "kid": "enc-key", "kty": "RSA", "alg": "RSA-OAEP", "use": "enc", "n": "AQAB", "e": "AQAB" },
                { "kid": "rotated", "kty": "RSA", "alg": "RS256", "use": "sig", "n": key.n, "e": key.e }
            ]
        });
        let jwks = server
            .mock_async(|when, then| {
                when.method(GET).path("/pool-1/.well-known/jwks.json");
                then.status(200).json_body(published.clone());
            })
            .await;

        let verifier = IdTokenVerifier::builder(JwtConfig::new(ISSUER, CLIENT))
            .with_key_source(PoolKeySource::new(
                server.url("/pool-1/.well-known/jwks.json"),
            ))
            .build_lazy();
        let token = mint(&key, "rotated", id_token_payload("id", 600));

        let claims = verifier.verify_with_refresh(&token).await.expect("verified");
        verifier.verify_with_refresh(&token).await.expect("cached");

        assert_eq!(claims.subject_id, "abc123");
        assert!(verifier.keys().contains("rotated"));
        assert!(!verifier.keys().contains("enc-key"));
        jwks.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn unavailable_key_set_is_not_a_token_rejection() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/jwks");
                then.status(503);
            })
            .await;

        let verifier = IdTokenVerifier::builder(JwtConfig::new(ISSUER, CLIENT))
            .with_key_source(PoolKeySource::new(server.url("/jwks")))
            .build_lazy();
        let err = verifier.reload_keys().await.expect_err("fetch fails");

        assert!(matches!(err, AuthError::KeySet(KeySetError::Fetch(_))));
        assert!(!err.is_token_rejection());
    }

    #[tokio::test]
    async fn reload_without_source_is_a_no_op() {
        let verifier = IdTokenVerifier::new(JwtConfig::new(ISSUER, CLIENT));
        assert_eq!(verifier.reload_keys().await.expect("no-op"), 0);
    }
}
