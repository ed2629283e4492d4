use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::claims::StandardClaims;
use crate::clock::Clock;
use crate::clock::SystemClock;
use crate::config::JwtVerifierConfig;
use crate::error::ClaimError;
use crate::error::Error;
use crate::error::Result;
use crate::extractor::IdentityExtractor;
use crate::jwt;
use crate::key_set::PublicKeyResolver;
use crate::signer;
use crate::signer::SignatureAlgorithm;

/// Trait for JWT verification
#[async_trait]
pub trait VerifyJwt {
    /// The type of identity information extracted from the JWT
    type Identity;

    /// Verify a JWT token and extract the identity information
    async fn verify(&self, token: &str) -> Result<Self::Identity>;
}

/// Expectations a single verification is checked against
#[derive(Debug, Clone)]
pub struct VerifyOptions {
    pub issuer: String,
    /// The token must be addressed to at least one of these
    pub audiences: Vec<String>,
    /// Unix seconds
    pub now: i64,
}

impl VerifyOptions {
    pub fn new(issuer: impl Into<String>, audience: impl Into<String>, now: i64) -> Self {
        Self {
            issuer: issuer.into(),
            audiences: vec![audience.into()],
            now,
        }
    }
}

/// ID token verifier backed by a cached provider key set
///
/// Generic over an `IdentityExtractor` type that defines how to extract identity
/// information from validated JWT claims.
pub struct JwtVerifier<E: IdentityExtractor> {
    resolver: Arc<PublicKeyResolver>,
    expected_issuer: String,
    expected_audiences: Vec<String>,
    clock_skew: i64,
    clock: Arc<dyn Clock>,
    extractor: E,
}

impl<E: IdentityExtractor> JwtVerifier<E> {
    /// Create a new JWT verifier with its own key set cache
    pub async fn new(config: JwtVerifierConfig, extractor: E) -> Result<Self> {
        Self::new_with_clock(config, extractor, Arc::new(SystemClock))
    }

    /// Create a verifier whose key set cache and claim checks use `clock`
    pub fn new_with_clock(
        config: JwtVerifierConfig,
        extractor: E,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let client = config.http_client.clone().unwrap_or_default();
        let resolver = Arc::new(PublicKeyResolver::new(
            config.key_set_source.clone(),
            config.key_set_ttl,
            client,
            Arc::clone(&clock),
        ));
        Self::with_resolver(config, resolver, clock, extractor)
    }

    /// Create a verifier sharing an existing key set cache
    ///
    /// The resolver's key source wins over the one in `config`.
    pub fn with_resolver(
        config: JwtVerifierConfig,
        resolver: Arc<PublicKeyResolver>,
        clock: Arc<dyn Clock>,
        extractor: E,
    ) -> Result<Self> {
        if config.expected_audiences.is_empty() {
            return Err(Error::NoAudiencesConfigured);
        }

        Ok(Self {
            resolver,
            expected_issuer: config.expected_issuer,
            expected_audiences: config.expected_audiences,
            clock_skew: i64::try_from(config.clock_skew.as_secs()).unwrap_or(i64::MAX),
            clock,
            extractor,
        })
    }

    pub fn resolver(&self) -> &Arc<PublicKeyResolver> {
        &self.resolver
    }

    /// Verify `token` against `options` and return its claims
    ///
    /// Checks run in a fixed order and stop at the first failure: structure,
    /// key resolution, signature, then claims. No claim is looked at before
    /// the signature is known to be good.
    pub async fn verify_claims(&self, token: &str, options: &VerifyOptions) -> Result<E::Claims> {
        let result = self.verify_claims_inner(token, options).await;
        if let Err(error) = &result {
            debug!(%error, "ID token rejected");
        }
        result
    }

    async fn verify_claims_inner(&self, token: &str, options: &VerifyOptions) -> Result<E::Claims> {
        let decoded = jwt::decode(token)?;
        let algorithm = SignatureAlgorithm::from_header(&decoded.header.alg)?;
        let kid = decoded.header.kid.as_deref().ok_or(Error::KeyIdMissing)?;

        let public_key = self.resolver.resolve(kid).await?;

        if !signer::verify(&decoded.signing_input, &decoded.signature, &public_key, algorithm) {
            return Err(Error::Signature);
        }

        let claims: E::Claims = decoded.claims_as()?;
        validate_claims(&claims, options, self.clock_skew)?;

        Ok(claims)
    }
}

#[async_trait]
impl<E: IdentityExtractor> VerifyJwt for JwtVerifier<E> {
    type Identity = E::Identity;

    async fn verify(&self, token: &str) -> Result<Self::Identity> {
        let options = VerifyOptions {
            issuer: self.expected_issuer.clone(),
            audiences: self.expected_audiences.clone(),
            now: self.clock.now(),
        };
        let claims = self.verify_claims(token, &options).await?;

        self.extractor.extract_identity(&claims)
    }
}

/// Check the standard claims of an already signature-verified token
fn validate_claims<C: StandardClaims>(
    claims: &C,
    options: &VerifyOptions,
    clock_skew: i64,
) -> Result<()> {
    if options.audiences.is_empty() {
        return Err(Error::NoAudiencesConfigured);
    }

    if claims.iss() != options.issuer {
        return Err(ClaimError::WrongIssuer(claims.iss().to_string()).into());
    }

    if !claims
        .aud()
        .iter()
        .any(|aud| options.audiences.iter().any(|expected| expected == aud))
    {
        return Err(ClaimError::WrongAudience(claims.aud().to_vec()).into());
    }

    if claims.exp() < options.now {
        return Err(ClaimError::TokenExpired(claims.exp()).into());
    }

    if let Some(iat) = claims.iat() {
        if iat > options.now.saturating_add(clock_skew) {
            return Err(ClaimError::IssuedInFuture(iat).into());
        }
    }

    if claims.sub().is_empty() {
        return Err(ClaimError::MissingSubject.into());
    }

    Ok(())
}
