use std::time::Duration;

use reqwest::Client;

use crate::error::Error;
use crate::error::Result;

/// Where the provider publishes the public keys for its ID tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySetSource {
    /// A JSON Web Key Set document
    Jwks(String),
    /// A JSON object mapping key ids to PEM encoded X.509 certificates
    X509(String),
}

impl KeySetSource {
    pub fn url(&self) -> &str {
        match self {
            KeySetSource::Jwks(url) | KeySetSource::X509(url) => url,
        }
    }
}

/// Configuration for the JWT verifier
#[derive(Debug, Clone)]
pub struct JwtVerifierConfig {
    /// The expected issuer of the JWT tokens
    pub(crate) expected_issuer: String,
    /// Expected audiences - the token's audience must match at least one of these
    pub(crate) expected_audiences: Vec<String>,
    /// Public key endpoint of the issuer
    pub(crate) key_set_source: KeySetSource,
    /// Lifetime of a fetched key set when the response carries no max-age (default: 1 hour)
    pub(crate) key_set_ttl: Duration,
    /// How far in the future `iat` may be (default: 1 minute)
    pub(crate) clock_skew: Duration,
    /// Optional custom HTTP client for fetching keys
    /// If not provided, a default client will be created
    pub(crate) http_client: Option<Client>,
}

const DEFAULT_KEY_SET_TTL_SECS: u64 = 3600;
const DEFAULT_CLOCK_SKEW_SECS: u64 = 60;
const DEFAULT_RENEWAL_LEAD_SECS: u64 = 300;
const MAX_ASSERTION_LIFETIME_SECS: u64 = 3600;

pub const DEFAULT_IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com";

impl JwtVerifierConfig {
    /// Create a new configuration with the given issuer, key endpoint and a single expected audience
    pub fn new(
        expected_issuer: impl Into<String>,
        audience: impl Into<String>,
        key_set_source: KeySetSource,
    ) -> Self {
        Self {
            expected_issuer: expected_issuer.into(),
            expected_audiences: vec![audience.into()],
            key_set_source,
            key_set_ttl: Duration::from_secs(DEFAULT_KEY_SET_TTL_SECS),
            clock_skew: Duration::from_secs(DEFAULT_CLOCK_SKEW_SECS),
            http_client: None,
        }
    }

    /// Create a new configuration with multiple expected audiences
    /// The token's audience claim must match at least one of these audiences
    ///
    /// # Errors
    /// Returns `Error::NoAudiencesConfigured` if the audiences vector is empty
    pub fn new_with_audiences(
        expected_issuer: impl Into<String>,
        expected_audiences: Vec<String>,
        key_set_source: KeySetSource,
    ) -> Result<Self> {
        if expected_audiences.is_empty() {
            return Err(Error::NoAudiencesConfigured);
        }

        Ok(Self {
            expected_audiences,
            ..Self::new(expected_issuer, String::new(), key_set_source)
        })
    }

    /// Replace the expected audiences
    ///
    /// # Errors
    /// Returns `Error::NoAudiencesConfigured` if the audiences vector is empty
    pub fn with_audiences(mut self, audiences: Vec<String>) -> Result<Self> {
        if audiences.is_empty() {
            return Err(Error::NoAudiencesConfigured);
        }
        self.expected_audiences = audiences;
        Ok(self)
    }

    /// Add a single expected audience
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.expected_audiences.push(audience.into());
        self
    }

    pub fn with_key_set_source(mut self, source: KeySetSource) -> Self {
        self.key_set_source = source;
        self
    }

    /// Set the fallback key set TTL
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.key_set_ttl = ttl;
        self
    }

    pub fn with_clock_skew(mut self, skew: Duration) -> Self {
        self.clock_skew = skew;
        self
    }

    /// Set a custom HTTP client
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }
}

/// Configuration for the token cache
#[derive(Debug, Clone)]
pub struct TokenCacheConfig {
    /// Entries are renewed in the background once they are this close to expiry (default: 5 minutes)
    pub(crate) renewal_lead: Duration,
}

impl Default for TokenCacheConfig {
    fn default() -> Self {
        Self {
            renewal_lead: Duration::from_secs(DEFAULT_RENEWAL_LEAD_SECS),
        }
    }
}

impl TokenCacheConfig {
    pub fn with_renewal_lead(mut self, lead: Duration) -> Self {
        self.renewal_lead = lead;
        self
    }
}

/// Configuration for token issuance
#[derive(Debug, Clone)]
pub struct IssuerConfig {
    /// Lifetime of signed assertions, never above the provider's one hour ceiling
    pub(crate) assertion_lifetime: Duration,
    /// Base URL of the identity toolkit API
    pub(crate) identity_toolkit_url: String,
    /// API key of the Firebase project, required for ID token issuance
    pub(crate) api_key: Option<String>,
    pub(crate) http_client: Option<Client>,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            assertion_lifetime: Duration::from_secs(MAX_ASSERTION_LIFETIME_SECS),
            identity_toolkit_url: DEFAULT_IDENTITY_TOOLKIT_URL.to_string(),
            api_key: None,
            http_client: None,
        }
    }
}

impl IssuerConfig {
    /// Set the assertion lifetime, capped at one hour
    pub fn with_assertion_lifetime(mut self, lifetime: Duration) -> Self {
        self.assertion_lifetime = lifetime.min(Duration::from_secs(MAX_ASSERTION_LIFETIME_SECS));
        self
    }

    pub fn with_identity_toolkit_url(mut self, url: impl Into<String>) -> Self {
        self.identity_toolkit_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set a custom HTTP client
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }
}
