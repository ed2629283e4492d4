//! Provider presets for ID tokens issued by Google
//!
//! Each provider module includes:
//!
//! - **Endpoints**: issuer and public key location
//! - **Claims**: Provider-specific JWT claims structure
//! - **Identity**: The extracted identity information
//! - **Extractor**: Implementation of `IdentityExtractor`
//!
//! ## Available Providers
//!
//! - [`google`]: Google-signed OIDC ID tokens
//! - [`firebase`]: Firebase Authentication ID tokens
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
//! println!("uid: {}", identity.uid);
//! # Ok(())
//! # }
//! ```

pub mod firebase;
pub mod google;
