//! # Tollgate
//!
//! Service-account credentials for Google Cloud and Firebase: mint OAuth2
//! access tokens and Firebase ID tokens, cache them, and verify ID tokens
//! issued by Google.
//!
//! ## Features
//!
//! - RS256 assertion signing with a service account's PKCS#8 key
//! - OAuth2 JWT-bearer exchange and Firebase custom token sign-in
//! - Token cache with single-flight exchanges and background renewal before expiry
//! - ID token verification (RS256 and ES256) against JWKS or X.509 certificate maps,
//!   with the key set cached for the provider's advertised `max-age`
//! - Issuer, audience, expiry, issued-at and subject validation
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use tollgate::{
//!     AccessTokenRequest, IssuerConfig, SystemClock, TokenCache, TokenCacheConfig, TokenIssuer,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let clock = Arc::new(SystemClock);
//!     // One cache per process, shared by every issuer
//!     let cache = TokenCache::new(TokenCacheConfig::default(), clock.clone());
//!
//!     let credentials = std::fs::read_to_string("service-account.json")?;
//!     let issuer = TokenIssuer::new(credentials, IssuerConfig::default(), cache, clock)?;
//!
//!     let token = issuer
//!         .access_token(&AccessTokenRequest::new(
//!             "https://www.googleapis.com/auth/cloud-platform",
//!         ))
//!         .await?;
//!     println!("Bearer {token}");
//!
//!     Ok(())
//! }
//! ```

mod claims;
mod clock;
mod config;
mod credentials;
mod error;
mod exchange;
mod extractor;
mod issuer;
pub mod jwt;
mod key_set;
pub mod providers;
pub mod signer;
mod token_cache;
mod verifier;

// Re-exports for public API
pub use claims::IdTokenClaims;
pub use claims::StandardClaims;
pub use clock::Clock;
pub use clock::ManualClock;
pub use clock::SystemClock;
pub use config::IssuerConfig;
pub use config::JwtVerifierConfig;
pub use config::KeySetSource;
pub use config::TokenCacheConfig;
pub use credentials::Credentials;
pub use credentials::ServiceAccountKey;
pub use error::ClaimError;
pub use error::Error;
pub use error::Result;
pub use exchange::AccessTokenResponse;
pub use exchange::IdTokenResponse;
pub use exchange::TokenExchangeClient;
pub use extractor::IdentityExtractor;
pub use extractor::RawClaimsExtractor;
pub use issuer::AccessTokenRequest;
pub use issuer::IdTokenRequest;
pub use issuer::TokenIssuer;
pub use issuer::IDENTITY_TOOLKIT_AUDIENCE;
pub use key_set::PublicKeyResolver;
pub use token_cache::CacheKey;
pub use token_cache::CachedToken;
pub use token_cache::FetchedToken;
pub use token_cache::TokenCache;
pub use token_cache::TokenKind;
pub use token_cache::WaitUntil;
pub use verifier::JwtVerifier;
pub use verifier::VerifyJwt;
pub use verifier::VerifyOptions;
