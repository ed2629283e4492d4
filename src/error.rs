use std::fmt::Debug;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Malformed JWT: {0}")]
    MalformedToken(String),
    #[error("Signing failed: {0}")]
    Signing(String),
    #[error("Invalid service account credential: {0}")]
    InvalidCredential(String),
    #[error("Token exchange rejected by provider (status {status}): {body}")]
    TokenExchange { status: u16, body: String },
    #[error("HTTP transport error: {0}")]
    Http(String),
    #[error("Missing 'kid' in the header of the provided JWT")]
    KeyIdMissing,
    #[error("Key id {0:?} of the provided JWT is not present in the provider key set")]
    UnknownKey(String),
    #[error("Signature verification failed")]
    Signature,
    #[error("Claim validation failed: {0}")]
    Claim(#[from] ClaimError),
    #[error("Only RS256 and ES256 are supported, got: {0}")]
    AlgorithmNotSupported(String),
    #[error("Public key set error: {0}")]
    KeySetFetch(String),
    #[error("An ID token was requested but no identity toolkit API key is configured")]
    MissingApiKey,
    #[error(
        "No audiences configured - at least one expected audience must be configured for security"
    )]
    NoAudiencesConfigured,
    #[error("Token exchange task ended without a result: {0}")]
    TaskAborted(String),
}

/// Standard claim violations, reported after the signature has been checked
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClaimError {
    #[error("The provided JWT does not match the expected issuer. Provided issuer: {0}")]
    WrongIssuer(String),
    #[error("The provided JWT is not addressed to any expected audience. Provided audience: {0:?}")]
    WrongAudience(Vec<String>),
    #[error("The provided JWT has expired. Expiration timestamp: {0}")]
    TokenExpired(i64),
    #[error("The provided JWT was issued in the future. Issued at: {0}")]
    IssuedInFuture(i64),
    #[error("The provided JWT has an empty subject")]
    MissingSubject,
}

pub(crate) fn fetch_key_set_error(error: reqwest::Error) -> Error {
    Error::KeySetFetch(format!("Failed to fetch public keys: {error}"))
}

pub(crate) fn parse_key_set_error(error: impl std::fmt::Display) -> Error {
    Error::KeySetFetch(format!("Failed to parse public keys: {error}"))
}

pub(crate) fn http_error(error: reqwest::Error) -> Error {
    Error::Http(error.to_string())
}

pub(crate) fn signing_error(error: jsonwebtoken::errors::Error) -> Error {
    Error::Signing(error.to_string())
}

pub(crate) fn malformed(reason: impl Into<String>) -> Error {
    Error::MalformedToken(reason.into())
}
