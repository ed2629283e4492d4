//! Google-signed OIDC ID tokens
//!
//! These are the tokens Google mints for service accounts and signed-in
//! users (`iss` is `https://accounts.google.com` or the bare host name).

use serde::Deserialize;
use serde_json::Map;
use serde_json::Value;

use crate::claims::one_or_many;
use crate::claims::StandardClaims;
use crate::config::JwtVerifierConfig;
use crate::config::KeySetSource;
use crate::error::Result;
use crate::extractor::IdentityExtractor;
use crate::verifier::JwtVerifier;

pub const ISSUER: &str = "https://accounts.google.com";

pub const JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";

/// Verifier configuration for Google ID tokens addressed to `audience`
pub fn config(audience: impl Into<String>) -> JwtVerifierConfig {
    JwtVerifierConfig::new(ISSUER, audience, KeySetSource::Jwks(JWKS_URL.to_string()))
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleClaims {
    pub iss: String,
    pub sub: String,
    #[serde(deserialize_with = "one_or_many")]
    pub aud: Vec<String>,
    pub exp: i64,
    pub iat: i64,
    #[serde(default)]
    pub azp: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
    /// Hosted domain of a Workspace account
    #[serde(default)]
    pub hd: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StandardClaims for GoogleClaims {
    fn iss(&self) -> &str {
        // Google issues both spellings
        match self.iss.as_str() {
            "accounts.google.com" => ISSUER,
            other => other,
        }
    }

    fn sub(&self) -> &str {
        &self.sub
    }

    fn aud(&self) -> &[String] {
        &self.aud
    }

    fn exp(&self) -> i64 {
        self.exp
    }

    fn iat(&self) -> Option<i64> {
        Some(self.iat)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleIdentity {
    pub subject: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub hosted_domain: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct GoogleExtractor;

impl IdentityExtractor for GoogleExtractor {
    type Claims = GoogleClaims;
    type Identity = GoogleIdentity;

    fn extract_identity(&self, claims: &Self::Claims) -> Result<Self::Identity> {
        Ok(GoogleIdentity {
            subject: claims.sub.clone(),
            email: claims.email.clone(),
            email_verified: claims.email_verified.unwrap_or(false),
            hosted_domain: claims.hd.clone(),
        })
    }
}

pub type GoogleJwtVerifier = JwtVerifier<GoogleExtractor>;

impl GoogleJwtVerifier {
    /// Create a verifier for Google ID tokens addressed to `audience`
    pub async fn for_audience(audience: impl Into<String>) -> Result<Self> {
        Self::new(config(audience), GoogleExtractor).await
    }
}
