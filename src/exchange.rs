//! OAuth2 JWT-bearer grant and identity toolkit custom token sign-in
//!
//! No retries happen here. A failed exchange surfaces immediately and the
//! token cache decides when to try again.

use reqwest::Client;
use reqwest::Response;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use tracing::warn;

use crate::error::http_error;
use crate::error::Error;
use crate::error::Result;
use crate::jwt;

pub const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Successful response of the token endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Successful custom token sign-in, normalised to whole seconds
#[derive(Debug, Clone)]
pub struct IdTokenResponse {
    pub id_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInWithCustomToken<'a> {
    token: &'a str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    id_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: String,
}

/// HTTP client for the two provider endpoints that mint tokens
#[derive(Debug, Clone)]
pub struct TokenExchangeClient {
    client: Client,
    identity_toolkit_url: String,
    api_key: Option<String>,
}

impl TokenExchangeClient {
    pub fn new(
        client: Client,
        identity_toolkit_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client,
            identity_toolkit_url: identity_toolkit_url.into(),
            api_key,
        }
    }

    /// Exchange a signed assertion for an access token at `token_uri`
    ///
    /// # Errors
    /// Returns `Error::TokenExchange` with the provider's status and body on a
    /// non-2xx response, `Error::Http` if the endpoint cannot be reached
    pub async fn exchange_for_access_token(
        &self,
        token_uri: &str,
        assertion: &str,
    ) -> Result<AccessTokenResponse> {
        debug!(token_uri, "Exchanging assertion for access token");

        let response = self
            .client
            .post(token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT_TYPE), ("assertion", assertion)])
            .send()
            .await
            .map_err(http_error)?;

        let token: AccessTokenResponse = read_json(response).await?;
        ensure_positive_lifetime(token.expires_in)?;
        Ok(token)
    }

    /// Exchange a signed custom token for a Firebase ID token
    ///
    /// The returned token must be addressed to `audience`, the Firebase
    /// project the caller asked for.
    ///
    /// # Errors
    /// Returns `Error::MissingApiKey` without an API key, `Error::TokenExchange`
    /// on a rejected exchange or an ID token for another audience
    pub async fn exchange_for_id_token(
        &self,
        assertion: &str,
        audience: &str,
    ) -> Result<IdTokenResponse> {
        let api_key = self.api_key.as_deref().ok_or(Error::MissingApiKey)?;
        let url = format!("{}/v1/accounts:signInWithCustomToken", self.identity_toolkit_url);
        debug!(%url, audience, "Exchanging custom token for ID token");

        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .json(&SignInWithCustomToken {
                token: assertion,
                return_secure_token: true,
            })
            .send()
            .await
            .map_err(http_error)?;

        let signed_in: SignInResponse = read_json(response).await?;
        let expires_in = signed_in.expires_in.parse::<i64>().map_err(|_| Error::TokenExchange {
            status: 200,
            body: format!("expiresIn is not a number: {:?}", signed_in.expires_in),
        })?;
        ensure_positive_lifetime(expires_in)?;
        ensure_audience(&signed_in.id_token, audience)?;

        Ok(IdTokenResponse {
            id_token: signed_in.id_token,
            refresh_token: signed_in.refresh_token,
            expires_in,
        })
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await.map_err(http_error)?;

    if !status.is_success() {
        warn!(status = status.as_u16(), "Provider rejected token exchange");
        return Err(Error::TokenExchange {
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&body).map_err(|e| Error::TokenExchange {
        status: status.as_u16(),
        body: format!("unexpected response body: {e}"),
    })
}

fn ensure_positive_lifetime(expires_in: i64) -> Result<()> {
    if expires_in <= 0 {
        return Err(Error::TokenExchange {
            status: 200,
            body: format!("provider returned a token with lifetime {expires_in}s"),
        });
    }
    Ok(())
}

fn ensure_audience(id_token: &str, audience: &str) -> Result<()> {
    let decoded = jwt::decode(id_token).map_err(|e| Error::TokenExchange {
        status: 200,
        body: format!("provider returned an unreadable ID token: {e}"),
    })?;

    let matches = match decoded.claims.get("aud") {
        Some(Value::String(aud)) => aud == audience,
        Some(Value::Array(auds)) => auds.iter().any(|aud| aud.as_str() == Some(audience)),
        _ => false,
    };

    if !matches {
        return Err(Error::TokenExchange {
            status: 200,
            body: format!("ID token is not addressed to {audience:?}"),
        });
    }
    Ok(())
}
