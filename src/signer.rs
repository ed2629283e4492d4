//! RS256 signing and RS256/ES256 verification over a JWT signing input

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::crypto;
use jsonwebtoken::Algorithm;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::EncodingKey;
use tracing::debug;

use crate::error::signing_error;
use crate::error::Error;
use crate::error::Result;

/// Signature algorithms accepted on inbound tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    Rs256,
    Es256,
}

impl SignatureAlgorithm {
    pub fn from_header(alg: &str) -> Result<Self> {
        match alg {
            "RS256" => Ok(Self::Rs256),
            "ES256" => Ok(Self::Es256),
            other => Err(Error::AlgorithmNotSupported(other.to_string())),
        }
    }

    fn as_jwt(self) -> Algorithm {
        match self {
            Self::Rs256 => Algorithm::RS256,
            Self::Es256 => Algorithm::ES256,
        }
    }
}

/// Key family of a resolved public key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Rsa,
    Ec,
}

/// Public key resolved from the provider key set
#[derive(Clone)]
pub struct PublicKey {
    pub kind: KeyKind,
    pub(crate) key: DecodingKey,
}

impl PublicKey {
    pub fn new(kind: KeyKind, key: DecodingKey) -> Self {
        Self { kind, key }
    }

    fn accepts(&self, algorithm: SignatureAlgorithm) -> bool {
        matches!(
            (self.kind, algorithm),
            (KeyKind::Rsa, SignatureAlgorithm::Rs256) | (KeyKind::Ec, SignatureAlgorithm::Es256)
        )
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicKey").field("kind", &self.kind).finish_non_exhaustive()
    }
}

/// Sign `signing_input` with RSASSA-PKCS1-v1_5 / SHA-256
///
/// # Errors
/// Returns `Error::Signing` if the primitive rejects the key
pub fn sign(signing_input: &str, private_key: &EncodingKey) -> Result<Vec<u8>> {
    let signature = crypto::sign(signing_input.as_bytes(), private_key, Algorithm::RS256)
        .map_err(signing_error)?;
    URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|e| Error::Signing(e.to_string()))
}

/// Check `signature` over `signing_input`
///
/// Never fails: a wrong key type, a rejected key or a bad signature are all `false`.
pub fn verify(
    signing_input: &str,
    signature: &[u8],
    public_key: &PublicKey,
    algorithm: SignatureAlgorithm,
) -> bool {
    if !public_key.accepts(algorithm) {
        debug!(?algorithm, kind = ?public_key.kind, "Key type does not match token algorithm");
        return false;
    }

    let signature = URL_SAFE_NO_PAD.encode(signature);
    let message = signing_input.as_bytes();
    match crypto::verify(&signature, message, &public_key.key, algorithm.as_jwt()) {
        Ok(valid) => valid,
        Err(error) => {
            debug!(%error, "Signature primitive rejected the input");
            false
        }
    }
}
