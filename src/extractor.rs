use serde::de::DeserializeOwned;

use crate::claims::IdTokenClaims;
use crate::claims::StandardClaims;
use crate::error::Result;

/// Trait for extracting identity information from validated JWT claims
///
/// Implementations define their own Claims type and Identity type. The
/// associated `Claims` type must implement `StandardClaims` so the verifier
/// can check the standard fields before the extractor ever sees them.
pub trait IdentityExtractor: Send + Sync {
    /// The JWT claims structure for this extractor
    type Claims: StandardClaims + DeserializeOwned + Send;

    /// The type of identity information to extract
    type Identity;

    /// Extract identity information from validated JWT claims
    ///
    /// Only called after signature, issuer, audience and validity window checks passed.
    fn extract_identity(&self, claims: &Self::Claims) -> Result<Self::Identity>;
}

/// Extractor that hands back the verified claims unchanged
#[derive(Clone, Debug, Default)]
pub struct RawClaimsExtractor;

impl IdentityExtractor for RawClaimsExtractor {
    type Claims = IdTokenClaims;
    type Identity = IdTokenClaims;

    fn extract_identity(&self, claims: &Self::Claims) -> Result<Self::Identity> {
        Ok(claims.clone())
    }
}
