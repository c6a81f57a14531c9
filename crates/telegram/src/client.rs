use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use stampdesk_core::config::TelegramConfig;

use crate::polling::{ChatOutbox, TransportError, UpdateSource};
use crate::updates::Update;

/// Headroom on top of the long-poll timeout before the HTTP call gives up.
const POLL_GRACE_SECS: u64 = 10;

/// Bot API over HTTPS. The bot token is part of every URL, so request errors
/// are stripped of their URL before they are reported.
pub struct BotApiClient {
    http: reqwest::Client,
    api_base_url: String,
    bot_token: SecretString,
    poll_timeout_secs: u64,
}

#[derive(Debug, Serialize)]
struct GetUpdatesRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: &'static [&'static str],
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> Result<T, TransportError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            (true, None) => Err(TransportError::Api("response carried no result".to_owned())),
            (false, _) => Err(TransportError::Api(
                self.description.unwrap_or_else(|| "unknown error".to_owned()),
            )),
        }
    }
}

impl BotApiClient {
    pub fn from_config(config: &TelegramConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs + POLL_GRACE_SECS))
            .build()
            .map_err(|error| TransportError::Api(error.to_string()))?;

        Ok(Self {
            http,
            api_base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            bot_token: config.bot_token.clone(),
            poll_timeout_secs: config.poll_timeout_secs,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base_url, self.bot_token.expose_secret())
    }

    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T, reqwest::Error>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.http.post(self.method_url(method)).json(body).send().await?;
        response.json().await
    }
}

#[async_trait]
impl UpdateSource for BotApiClient {
    async fn next_batch(&self, offset: Option<i64>) -> Result<Option<Vec<Update>>, TransportError> {
        let request = GetUpdatesRequest {
            offset,
            timeout: self.poll_timeout_secs,
            allowed_updates: &["message"],
        };
        let response: ApiResponse<Vec<Update>> = self
            .call("getUpdates", &request)
            .await
            .map_err(|error| TransportError::Receive(error.without_url().to_string()))?;
        let updates = response.into_result()?;

        debug!(
            event_name = "ingress.telegram.batch_received",
            offset = ?offset,
            updates = updates.len(),
            "long poll returned"
        );
        Ok(Some(updates))
    }
}

#[async_trait]
impl ChatOutbox for BotApiClient {
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), TransportError> {
        let request = SendMessageRequest { chat_id, text };
        let response: ApiResponse<serde_json::Value> = self
            .call("sendMessage", &request)
            .await
            .map_err(|error| TransportError::Send(error.without_url().to_string()))?;
        response.into_result().map(|_| ())
    }
}
