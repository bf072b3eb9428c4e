//! Published signing keys of a user pool (its JWKS document).

use jsonwebtoken::DecodingKey;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::JwtConfig;
use crate::error::{AuthResult, KeySetError};

/// A verification key together with the `kid` tokens reference it by.
#[derive(Clone)]
pub struct SigningKey {
    pub kid: String,
    pub key: DecodingKey,
}

/// Where to download the pool's signing keys from.
#[derive(Clone)]
pub struct PoolKeySource {
    client: Client,
    url: String,
}

impl PoolKeySource {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), url)
    }

    pub fn for_issuer(config: &JwtConfig) -> Self {
        Self::new(config.jwks_url())
    }

    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn fetch(&self) -> AuthResult<Vec<SigningKey>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|err| KeySetError::Fetch(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(KeySetError::Fetch(format!("HTTP {status} from {}", self.url)).into());
        }

        let document: KeyDocument = response
            .json()
            .await
            .map_err(|err| KeySetError::Decode(err.to_string()))?;
        let keys = signing_keys(document)?;
        debug!(url = %self.url, count = keys.len(), "loaded pool signing keys");
        Ok(keys)
    }
}

#[derive(Debug, Deserialize)]
struct KeyDocument {
    keys: Vec<PublishedKey>,
}

#[derive(Debug, Deserialize)]
struct PublishedKey {
    kid: Option<String>,
    kty: Option<String>,
    alg: Option<String>,
    #[serde(rename = "use")]
    usage: Option<String>,
    n: Option<String>,
    e: Option<String>,
}

impl PublishedKey {
    /// Absent attributes default to what the pool publishes for ID-token keys.
    fn signs_rs256(&self) -> bool {
        self.kty.as_deref().unwrap_or("RSA") == "RSA"
            && self.alg.as_deref().unwrap_or("RS256") == "RS256"
            && self.usage.as_deref().unwrap_or("sig") == "sig"
    }
}

/// RS256 signing keys of the document. Encryption keys and other algorithms are
/// skipped; a signing key that cannot be used fails the whole set.
fn signing_keys(document: KeyDocument) -> Result<Vec<SigningKey>, KeySetError> {
    let mut keys = Vec::with_capacity(document.keys.len());
    for published in document.keys {
        let kid = published.kid.clone().ok_or(KeySetError::MissingKid)?;
        if !published.signs_rs256() {
            warn!(
                kid = %kid,
                kty = ?published.kty,
                alg = ?published.alg,
                usage = ?published.usage,
                "skipping key not used for RS256 signatures"
            );
            continue;
        }

        let (Some(modulus), Some(exponent)) = (published.n, published.e) else {
            return Err(KeySetError::MissingComponents(kid));
        };
        let key = DecodingKey::from_rsa_components(&modulus, &exponent).map_err(|err| {
            KeySetError::Parse {
                kid: kid.clone(),
                reason: err.to_string(),
            }
        })?;
        keys.push(SigningKey { kid, key });
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(value: serde_json::Value) -> KeyDocument {
        serde_json::from_value(value).expect("key document")
    }

    #[test]
    fn encryption_keys_are_skipped() {
        let keys = signing_keys(document(json!({
            "keys": [
                { "kid": "enc", "kty": "RSA", "alg": "RSA-OAEP", "use": "enc", "n": "AQAB", "e": "AQAB" },
                { "kid": "ec", "kty": "EC", "alg": "ES256" }
            ]
        })))
        .expect("keys");
        assert!(keys.is_empty());
    }

    #[test]
    fn key_without_kid_fails_the_set() {
        let err = signing_keys(document(json!({ "keys": [{ "n": "AQAB", "e": "AQAB" }] })))
            .err()
            .expect("missing kid");
        assert!(matches!(err, KeySetError::MissingKid));
    }

    #[test]
    fn signing_key_without_modulus_fails_the_set() {
        let err = signing_keys(document(json!({ "keys": [{ "kid": "k1", "e": "AQAB" }] })))
            .err()
            .expect("missing modulus");
        assert!(matches!(err, KeySetError::MissingComponents(kid) if kid == "k1"));
    }
}
