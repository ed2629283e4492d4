//! Compact JWT encoding and structural decoding
//!
//! Nothing here touches keys or verifies anything; [`decode`] only checks
//! that a token is three base64url segments whose first two are JSON objects.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::error::malformed;
use crate::error::Result;

/// JOSE header of a compact JWT
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

impl Header {
    /// RS256 header used for every assertion signed with a service account key
    pub fn rs256(kid: impl Into<String>) -> Self {
        Self {
            alg: "RS256".to_string(),
            typ: Some("JWT".to_string()),
            kid: Some(kid.into()),
        }
    }
}

/// `header.claims` half of a JWT, waiting for a signature
#[derive(Debug, Clone)]
pub struct EncodedJwt {
    signing_input: String,
}

impl EncodedJwt {
    pub fn signing_input(&self) -> &str {
        &self.signing_input
    }

    /// Append the signature, producing the compact three-part token
    pub fn complete(self, signature: &[u8]) -> String {
        let mut token = self.signing_input;
        token.push('.');
        token.push_str(&URL_SAFE_NO_PAD.encode(signature));
        token
    }
}

/// A structurally valid JWT, not yet trusted
#[derive(Debug, Clone)]
pub struct DecodedJwt {
    pub header: Header,
    pub claims: Map<String, Value>,
    pub signing_input: String,
    pub signature: Vec<u8>,
}

impl DecodedJwt {
    pub fn claims_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.claims.clone()))
            .map_err(|e| malformed(format!("claims do not match the expected shape: {e}")))
    }
}

pub fn encode<C: Serialize>(header: &Header, claims: &C) -> Result<EncodedJwt> {
    let header = serde_json::to_vec(header).map_err(|e| malformed(e.to_string()))?;
    let claims = serde_json::to_vec(claims).map_err(|e| malformed(e.to_string()))?;

    let mut signing_input = URL_SAFE_NO_PAD.encode(header);
    signing_input.push('.');
    signing_input.push_str(&URL_SAFE_NO_PAD.encode(claims));

    Ok(EncodedJwt { signing_input })
}

pub fn decode(token: &str) -> Result<DecodedJwt> {
    let segments: Vec<&str> = token.split('.').collect();
    let [header_b64, claims_b64, signature_b64] = segments.as_slice() else {
        return Err(malformed(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    };

    let header: Header = serde_json::from_slice(&decode_segment(header_b64, "header")?)
        .map_err(|e| malformed(format!("header is not valid JSON: {e}")))?;
    let claims: Map<String, Value> = serde_json::from_slice(&decode_segment(claims_b64, "claims")?)
        .map_err(|e| malformed(format!("claims are not a JSON object: {e}")))?;
    let signature = decode_segment(signature_b64, "signature")?;

    Ok(DecodedJwt {
        header,
        claims,
        signing_input: format!("{header_b64}.{claims_b64}"),
        signature,
    })
}

fn decode_segment(segment: &str, name: &str) -> Result<Vec<u8>> {
    if segment.is_empty() {
        return Err(malformed(format!("{name} segment is empty")));
    }
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| malformed(format!("{name} segment is not base64url: {e}")))
}

/// Registered claims plus provider extensions for an outbound assertion
///
/// `exp` is always derived from `iat` and the lifetime.
#[derive(Debug, Clone, Serialize)]
pub struct ClaimsSet {
    pub iss: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ClaimsSet {
    pub fn new(
        iss: impl Into<String>,
        aud: impl Into<String>,
        iat: i64,
        lifetime_secs: i64,
    ) -> Self {
        Self {
            iss: iss.into(),
            sub: None,
            aud: aud.into(),
            iat,
            exp: iat + lifetime_secs,
            extra: Map::new(),
        }
    }

    pub fn with_subject(mut self, sub: impl Into<String>) -> Self {
        self.sub = Some(sub.into());
        self
    }

    pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }
}
