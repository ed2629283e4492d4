use std::sync::Arc;

use jsonwebtoken::EncodingKey;
use serde_json::Map;
use serde_json::Value;
use tracing::debug;

use crate::clock::Clock;
use crate::config::IssuerConfig;
use crate::credentials::Credentials;
use crate::credentials::ServiceAccountKey;
use crate::error::Result;
use crate::exchange::TokenExchangeClient;
use crate::jwt;
use crate::jwt::ClaimsSet;
use crate::jwt::Header;
use crate::signer;
use crate::token_cache::CacheKey;
use crate::token_cache::FetchedToken;
use crate::token_cache::TokenCache;
use crate::token_cache::TokenKind;

/// Audience of Firebase custom tokens
pub const IDENTITY_TOOLKIT_AUDIENCE: &str =
    "https://identitytoolkit.googleapis.com/google.identity.identitytoolkit.v1.IdentityToolkit";

/// Request for an OAuth2 access token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessTokenRequest {
    pub scopes: Vec<String>,
    /// User to impersonate through domain-wide delegation
    pub subject: Option<String>,
}

impl AccessTokenRequest {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scopes: vec![scope.into()],
            subject: None,
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes.push(scope.into());
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    fn scope(&self) -> String {
        self.scopes.join(" ")
    }
}

/// Request for a Firebase ID token minted for `uid`
#[derive(Debug, Clone, PartialEq)]
pub struct IdTokenRequest {
    pub uid: String,
    /// Firebase project the ID token must be addressed to
    pub audience: String,
    /// Developer claims copied into the ID token
    pub claims: Option<Map<String, Value>>,
}

impl IdTokenRequest {
    pub fn new(uid: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            audience: audience.into(),
            claims: None,
        }
    }

    pub fn with_claims(mut self, claims: Map<String, Value>) -> Self {
        self.claims = Some(claims);
        self
    }
}

/// Signs assertions with one service account and trades them for tokens
///
/// Every token goes through the shared [`TokenCache`], so repeated and
/// concurrent requests for the same token cost one exchange.
pub struct TokenIssuer {
    credential: Arc<ServiceAccountKey>,
    signing_key: Arc<EncodingKey>,
    exchange: TokenExchangeClient,
    cache: TokenCache,
    clock: Arc<dyn Clock>,
    assertion_lifetime: i64,
}

impl TokenIssuer {
    /// Create an issuer for `credentials`
    ///
    /// The private key is imported once here.
    ///
    /// # Errors
    /// Returns `Error::InvalidCredential` or `Error::Signing` for unusable key material
    pub fn new(
        credentials: impl Into<Credentials>,
        config: IssuerConfig,
        cache: TokenCache,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let credential = credentials.into().resolve()?;
        let signing_key = credential.signing_key()?;
        let exchange = TokenExchangeClient::new(
            config.http_client.unwrap_or_default(),
            config.identity_toolkit_url,
            config.api_key,
        );

        Ok(Self {
            credential: Arc::new(credential),
            signing_key: Arc::new(signing_key),
            exchange,
            cache,
            clock,
            assertion_lifetime: config.assertion_lifetime.as_secs() as i64,
        })
    }

    pub fn credential(&self) -> &ServiceAccountKey {
        &self.credential
    }

    /// Get an access token for the requested scopes, from cache when possible
    ///
    /// # Errors
    /// Returns `Error::Signing`, `Error::TokenExchange` or `Error::Http` when a
    /// new token is needed and cannot be obtained
    pub async fn access_token(&self, request: &AccessTokenRequest) -> Result<String> {
        let scope = request.scope();
        let key = self.cache_key(TokenKind::Access {
            scope: scope.clone(),
            subject: request.subject.clone(),
        });

        let signer = self.assertion_signer();
        let exchange = self.exchange.clone();
        let subject = request.subject.clone();

        self.cache
            .get_or_fetch(&key, move || async move {
                let token_uri = signer.credential.token_uri.clone();
                let mut claims = signer.claims(&token_uri).with_claim("scope", scope);
                if let Some(subject) = subject {
                    claims = claims.with_subject(subject);
                }

                let assertion = signer.sign(&claims)?;
                let response = exchange.exchange_for_access_token(&token_uri, &assertion).await?;

                Ok(FetchedToken {
                    value: response.access_token,
                    expires_in: response.expires_in,
                })
            })
            .await
    }

    /// Get a Firebase ID token for `request.uid`, from cache when possible
    ///
    /// # Errors
    /// Returns `Error::MissingApiKey` without a configured API key, otherwise
    /// the same errors as [`TokenIssuer::access_token`]
    pub async fn id_token(&self, request: &IdTokenRequest) -> Result<String> {
        let key = self.cache_key(TokenKind::Id {
            audience: request.audience.clone(),
            uid: request.uid.clone(),
            claims: request
                .claims
                .as_ref()
                .map(|claims| Value::Object(claims.clone()).to_string()),
        });

        let signer = self.assertion_signer();
        let exchange = self.exchange.clone();
        let request = request.clone();

        self.cache
            .get_or_fetch(&key, move || async move {
                let custom_token = signer.custom_token(&request.uid, request.claims)?;
                let response = exchange
                    .exchange_for_id_token(&custom_token, &request.audience)
                    .await?;

                Ok(FetchedToken {
                    value: response.id_token,
                    expires_in: response.expires_in,
                })
            })
            .await
    }

    /// Sign a Firebase custom token for `uid` without exchanging it
    ///
    /// # Errors
    /// Returns `Error::Signing` if the key cannot sign
    pub fn custom_token(&self, uid: &str, claims: Option<Map<String, Value>>) -> Result<String> {
        self.assertion_signer().custom_token(uid, claims)
    }

    fn cache_key(&self, kind: TokenKind) -> CacheKey {
        CacheKey {
            client_email: self.credential.client_email.clone(),
            private_key_id: self.credential.private_key_id.clone(),
            kind,
        }
    }

    fn assertion_signer(&self) -> AssertionSigner {
        AssertionSigner {
            credential: Arc::clone(&self.credential),
            signing_key: Arc::clone(&self.signing_key),
            clock: Arc::clone(&self.clock),
            lifetime: self.assertion_lifetime,
        }
    }
}

/// Owned pieces needed to sign an assertion inside an exchange task
struct AssertionSigner {
    credential: Arc<ServiceAccountKey>,
    signing_key: Arc<EncodingKey>,
    clock: Arc<dyn Clock>,
    lifetime: i64,
}

impl AssertionSigner {
    fn claims(&self, audience: &str) -> ClaimsSet {
        ClaimsSet::new(
            self.credential.client_email.clone(),
            audience,
            self.clock.now(),
            self.lifetime,
        )
    }

    fn custom_token(&self, uid: &str, claims: Option<Map<String, Value>>) -> Result<String> {
        let mut custom = self
            .claims(IDENTITY_TOOLKIT_AUDIENCE)
            .with_subject(self.credential.client_email.clone())
            .with_claim("uid", uid);
        if let Some(claims) = claims {
            custom = custom.with_claim("claims", claims);
        }
        self.sign(&custom)
    }

    fn sign(&self, claims: &ClaimsSet) -> Result<String> {
        let header = Header::rs256(self.credential.private_key_id.clone());
        let encoded = jwt::encode(&header, claims)?;
        let signature = signer::sign(encoded.signing_input(), &self.signing_key)?;

        debug!(
            iss = %claims.iss,
            aud = %claims.aud,
            exp = claims.exp,
            "Signed assertion"
        );
        Ok(encoded.complete(&signature))
    }
}
