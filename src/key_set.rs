use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::jwk::AlgorithmParameters;
use jsonwebtoken::jwk::EllipticCurve;
use jsonwebtoken::jwk::EllipticCurveKeyParameters;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::jwk::RSAKeyParameters;
use jsonwebtoken::DecodingKey;
use reqwest::header::CACHE_CONTROL;
use reqwest::Client;
use tokio::sync::Mutex;
use tokio::sync::RwLock;
use tracing::debug;
use tracing::info;
use tracing::warn;
use x509_cert::der::DecodePem;
use x509_cert::spki::ObjectIdentifier;
use x509_cert::Certificate;

use crate::clock::Clock;
use crate::config::KeySetSource;
use crate::error::fetch_key_set_error;
use crate::error::parse_key_set_error;
use crate::error::Error;
use crate::error::Result;
use crate::signer::KeyKind;
use crate::signer::PublicKey;

const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");

struct CachedKeys {
    keys: HashMap<String, PublicKey>,
    expires_at: i64,
    generation: u64,
}

impl CachedKeys {
    fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}

/// Process-wide cache of a provider's public signing keys
///
/// The key set lives for the `max-age` the provider advertises. A key id that
/// is missing from a fresh set triggers at most one forced refresh per lookup,
/// and concurrent lookups share a single refresh.
pub struct PublicKeyResolver {
    source: KeySetSource,
    client: Client,
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
    cache: RwLock<Option<Arc<CachedKeys>>>,
    refresh_lock: Mutex<()>,
}

impl PublicKeyResolver {
    pub fn new(
        source: KeySetSource,
        default_ttl: Duration,
        client: Client,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            client,
            default_ttl,
            clock,
            cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn source(&self) -> &KeySetSource {
        &self.source
    }

    /// Look up the public key for `kid`
    ///
    /// # Errors
    /// Returns `Error::UnknownKey` if the key id is still absent after a refresh,
    /// or `Error::KeySetFetch` if the provider cannot be reached
    pub async fn resolve(&self, kid: &str) -> Result<PublicKey> {
        let now = self.clock.now();
        let cached = self.cache.read().await.clone();

        let (keys, refreshed) = match cached {
            Some(keys) if !keys.is_expired(now) => (keys, false),
            stale => {
                let seen = stale.map_or(0, |keys| keys.generation);
                (self.refresh_after(seen).await?, true)
            }
        };

        if let Some(key) = keys.keys.get(kid) {
            return Ok(key.clone());
        }

        if refreshed {
            return Err(Error::UnknownKey(kid.to_string()));
        }

        info!(kid, url = self.source.url(), "Unknown key id, forcing key set refresh");
        let keys = self.refresh_after(keys.generation).await?;
        keys.keys
            .get(kid)
            .cloned()
            .ok_or_else(|| Error::UnknownKey(kid.to_string()))
    }

    /// Refresh the key set unless someone else already replaced generation `seen`
    async fn refresh_after(&self, seen: u64) -> Result<Arc<CachedKeys>> {
        let _guard = self.refresh_lock.lock().await;

        if let Some(current) = self.cache.read().await.as_ref() {
            if current.generation > seen {
                debug!(
                    generation = current.generation,
                    "Reusing key set refreshed by a concurrent caller"
                );
                return Ok(Arc::clone(current));
            }
        }

        let (keys, ttl) = self.fetch_keys().await?;
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let cached = Arc::new(CachedKeys {
            keys,
            expires_at: self.clock.now().saturating_add(ttl_secs),
            generation: seen + 1,
        });

        info!(
            url = self.source.url(),
            keys = cached.keys.len(),
            ttl_secs = ttl.as_secs(),
            "Refreshed public key set"
        );

        *self.cache.write().await = Some(Arc::clone(&cached));
        Ok(cached)
    }

    async fn fetch_keys(&self) -> Result<(HashMap<String, PublicKey>, Duration)> {
        let response = self
            .client
            .get(self.source.url())
            .send()
            .await
            .map_err(fetch_key_set_error)?
            .error_for_status()
            .map_err(fetch_key_set_error)?;

        let ttl = response
            .headers()
            .get(CACHE_CONTROL)
            .and_then(|value| value.to_str().ok())
            .and_then(max_age)
            .unwrap_or(self.default_ttl);

        let body = response.bytes().await.map_err(fetch_key_set_error)?;
        let keys = match &self.source {
            KeySetSource::Jwks(_) => {
                let jwks: JwkSet = serde_json::from_slice(&body).map_err(parse_key_set_error)?;
                keys_from_jwks(&jwks)
            }
            KeySetSource::X509(_) => {
                let certs: HashMap<String, String> =
                    serde_json::from_slice(&body).map_err(parse_key_set_error)?;
                keys_from_certificates(&certs)
            }
        };

        if keys.is_empty() {
            warn!(url = self.source.url(), "Public key set contains no usable keys");
        }

        Ok((keys, ttl))
    }
}

/// Extract `max-age` from a Cache-Control header value
pub(crate) fn max_age(cache_control: &str) -> Option<Duration> {
    cache_control
        .split(',')
        .filter_map(|directive| directive.trim().strip_prefix("max-age="))
        .find_map(|secs| secs.trim_matches('"').parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn keys_from_jwks(jwks: &JwkSet) -> HashMap<String, PublicKey> {
    let mut keys = HashMap::new();

    for jwk in &jwks.keys {
        let Some(kid) = jwk.common.key_id.clone() else {
            debug!("Skipping JWK without key id");
            continue;
        };

        let key = match &jwk.algorithm {
            AlgorithmParameters::RSA(RSAKeyParameters { n, e, .. }) => {
                DecodingKey::from_rsa_components(n, e).map(|key| PublicKey::new(KeyKind::Rsa, key))
            }
            AlgorithmParameters::EllipticCurve(EllipticCurveKeyParameters {
                curve: EllipticCurve::P256,
                x,
                y,
                ..
            }) => DecodingKey::from_ec_components(x, y).map(|key| PublicKey::new(KeyKind::Ec, key)),
            other => {
                debug!(kid, algorithm = ?other, "Skipping unsupported JWK");
                continue;
            }
        };

        match key {
            Ok(key) => {
                keys.insert(kid, key);
            }
            Err(error) => debug!(kid, %error, "Skipping malformed JWK"),
        }
    }

    keys
}

fn keys_from_certificates(certs: &HashMap<String, String>) -> HashMap<String, PublicKey> {
    let mut keys = HashMap::new();

    for (kid, pem) in certs {
        let cert = match Certificate::from_pem(pem.as_bytes()) {
            Ok(cert) => cert,
            Err(error) => {
                debug!(kid, %error, "Skipping unparseable certificate");
                continue;
            }
        };

        let spki = &cert.tbs_certificate.subject_public_key_info;
        let Some(raw) = spki.subject_public_key.as_bytes() else {
            debug!(kid, "Skipping certificate with unaligned public key");
            continue;
        };

        let key = if spki.algorithm.oid == RSA_ENCRYPTION {
            PublicKey::new(KeyKind::Rsa, DecodingKey::from_rsa_der(raw))
        } else if spki.algorithm.oid == EC_PUBLIC_KEY && raw.len() == 65 {
            PublicKey::new(KeyKind::Ec, DecodingKey::from_ec_der(raw))
        } else {
            debug!(kid, oid = %spki.algorithm.oid, "Skipping certificate with unsupported key");
            continue;
        };

        keys.insert(kid.clone(), key);
    }

    keys
}
