use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Tokens are refreshed this long before the issuer says they expire.
pub const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("token exchange request failed: {0}")]
    Request(String),
    #[error("token endpoint returned status {0}")]
    Status(u16),
    #[error("failed to decode token response: {0}")]
    Decode(String),
    #[error("token endpoint returned an empty token")]
    EmptyToken,
}

/// Something that can be put into an `Authorization` header.
#[derive(Clone, Debug)]
pub enum Credential {
    IamToken(SecretString),
    ApiKey(SecretString),
}

impl Credential {
    pub fn authorization_header(&self) -> String {
        match self {
            Self::IamToken(token) => format!("Bearer {}", token.expose_secret()),
            Self::ApiKey(key) => format!("Api-Key {}", key.expose_secret()),
        }
    }
}

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn valid_credential(&self) -> Result<Credential, CredentialError>;
}

/// Service account key; never expires from our point of view.
pub struct StaticApiKey {
    key: SecretString,
}

impl StaticApiKey {
    pub fn new(key: SecretString) -> Self {
        Self { key }
    }
}

#[async_trait]
impl CredentialProvider for StaticApiKey {
    async fn valid_credential(&self) -> Result<Credential, CredentialError> {
        Ok(Credential::ApiKey(self.key.clone()))
    }
}

#[derive(Clone, Debug)]
pub struct IssuedToken {
    pub token: SecretString,
    pub expires_at: DateTime<Utc>,
}

/// One round trip to the token issuer.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    async fn exchange(&self) -> Result<IssuedToken, CredentialError>;
}

/// Exchanges a Yandex OAuth token at the IAM endpoint.
pub struct HttpIamExchange {
    client: reqwest::Client,
    iam_url: String,
    oauth_token: SecretString,
}

impl HttpIamExchange {
    pub fn new(client: reqwest::Client, iam_url: impl Into<String>, oauth_token: SecretString) -> Self {
        Self { client, iam_url: iam_url.into(), oauth_token }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IamTokenRequest<'a> {
    yandex_passport_oauth_token: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IamTokenResponse {
    iam_token: String,
    expires_at: DateTime<Utc>,
}

#[async_trait]
impl TokenExchange for HttpIamExchange {
    async fn exchange(&self) -> Result<IssuedToken, CredentialError> {
        let response = self
            .client
            .post(&self.iam_url)
            .json(&IamTokenRequest { yandex_passport_oauth_token: self.oauth_token.expose_secret() })
            .send()
            .await
            .map_err(|error| CredentialError::Request(error.to_string()))?;

        if !response.status().is_success() {
            return Err(CredentialError::Status(response.status().as_u16()));
        }

        let payload: IamTokenResponse =
            response.json().await.map_err(|error| CredentialError::Decode(error.to_string()))?;
        if payload.iam_token.trim().is_empty() {
            return Err(CredentialError::EmptyToken);
        }

        Ok(IssuedToken { token: payload.iam_token.into(), expires_at: payload.expires_at })
    }
}

/// Caches the exchanged IAM token and refreshes it shortly before expiry.
pub struct IamTokenProvider<E = HttpIamExchange> {
    exchange: E,
    cached: Mutex<Option<IssuedToken>>,
}

impl<E> IamTokenProvider<E>
where
    E: TokenExchange,
{
    pub fn new(exchange: E) -> Self {
        Self { exchange, cached: Mutex::new(None) }
    }

    pub async fn credential_at(&self, now: DateTime<Utc>) -> Result<Credential, CredentialError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|token| is_fresh(token, now)) {
            debug!(event_name = "llm.credentials.cache_hit", "reusing cached iam token");
            return Ok(Credential::IamToken(token.token.clone()));
        }

        let issued = self.exchange.exchange().await?;
        info!(
            event_name = "llm.credentials.refreshed",
            expires_at = %issued.expires_at,
            "iam token refreshed"
        );
        let credential = Credential::IamToken(issued.token.clone());
        *cached = Some(issued);
        Ok(credential)
    }
}

#[async_trait]
impl<E> CredentialProvider for IamTokenProvider<E>
where
    E: TokenExchange,
{
    async fn valid_credential(&self) -> Result<Credential, CredentialError> {
        self.credential_at(Utc::now()).await
    }
}

fn is_fresh(token: &IssuedToken, now: DateTime<Utc>) -> bool {
    now < token.expires_at - Duration::seconds(REFRESH_MARGIN_SECS)
}
