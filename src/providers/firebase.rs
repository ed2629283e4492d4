//! Firebase Authentication ID token validation
//!
//! Firebase ID tokens are RS256 JWTs signed by `securetoken@system.gserviceaccount.com`.
//! The public keys are published as X.509 certificates keyed by `kid`.
//!
//! ## Claims Structure
//!
//! ```json
//! {
//!   "iss": "https://securetoken.google.com/my-project",
//!   "aud": "my-project",
//!   "sub": "uid-123",
//!   "user_id": "uid-123",
//!   "iat": 1700000000,
//!   "exp": 1700003600,
//!   "auth_time": 1700000000,
//!   "email": "user@example.com",
//!   "firebase": {
//!     "sign_in_provider": "custom",
//!     "identities": {}
//!   }
//! }
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use tollgate::providers::firebase::FirebaseJwtVerifier;
//! use tollgate::VerifyJwt;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let verifier = FirebaseJwtVerifier::for_project("my-project").await?;
//!
//! let identity = verifier.verify("eyJhbG...").await?;
//! println!("uid: {} via {}", identity.uid, identity.sign_in_provider);
//! # Ok(())
//! # }
//! ```

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

pub const CERTIFICATES_URL: &str =
    "https://www.googleapis.com/robot/v1/metadata/x509/securetoken@system.gserviceaccount.com";

/// Issuer of ID tokens for `project_id`
pub fn issuer(project_id: &str) -> String {
    format!("https://securetoken.google.com/{project_id}")
}

/// Verifier configuration for the ID tokens of one Firebase project
pub fn config(project_id: &str) -> JwtVerifierConfig {
    JwtVerifierConfig::new(
        issuer(project_id),
        project_id,
        KeySetSource::X509(CERTIFICATES_URL.to_string()),
    )
}

/// JWT claims structure for Firebase ID tokens
#[derive(Debug, Clone, Deserialize)]
pub struct FirebaseClaims {
    pub iss: String,
    /// Subject - the Firebase uid
    pub sub: String,
    #[serde(deserialize_with = "one_or_many")]
    pub aud: Vec<String>,
    pub exp: i64,
    pub iat: i64,
    #[serde(default)]
    pub auth_time: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
    #[serde(default)]
    pub firebase: Option<FirebaseInfo>,
    /// Developer claims set on the custom token, plus anything else
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StandardClaims for FirebaseClaims {
    fn iss(&self) -> &str {
        &self.iss
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

/// Firebase-specific claims under the "firebase" namespace
#[derive(Debug, Clone, Deserialize)]
pub struct FirebaseInfo {
    pub sign_in_provider: String,
    #[serde(default)]
    pub tenant: Option<String>,
}

/// Identity information extracted from Firebase ID tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirebaseIdentity {
    pub uid: String,
    pub email: Option<String>,
    pub sign_in_provider: String,
    pub tenant: Option<String>,
}

/// Extractor for Firebase ID tokens
#[derive(Clone, Debug, Default)]
pub struct FirebaseExtractor;

impl IdentityExtractor for FirebaseExtractor {
    type Claims = FirebaseClaims;
    type Identity = FirebaseIdentity;

    fn extract_identity(&self, claims: &Self::Claims) -> Result<Self::Identity> {
        let (sign_in_provider, tenant) = match &claims.firebase {
            Some(info) => (info.sign_in_provider.clone(), info.tenant.clone()),
            None => ("unknown".to_string(), None),
        };

        Ok(FirebaseIdentity {
            uid: claims.sub.clone(),
            email: claims.email.clone(),
            sign_in_provider,
            tenant,
        })
    }
}

/// Convenience type alias for Firebase ID token verifier
pub type FirebaseJwtVerifier = JwtVerifier<FirebaseExtractor>;

impl FirebaseJwtVerifier {
    /// Create a verifier for the ID tokens of `project_id`
    pub async fn for_project(project_id: &str) -> Result<Self> {
        Self::new(config(project_id), FirebaseExtractor).await
    }
}
