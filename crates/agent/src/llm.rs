use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use stampdesk_core::config::{LlmAuthMode, LlmConfig};

use crate::credentials::{
    CredentialError, CredentialProvider, HttpIamExchange, IamTokenProvider, StaticApiKey,
};

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error("llm request failed: {0}")]
    Request(String),
    #[error("llm endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode llm response: {0}")]
    Decode(String),
    #[error("llm response had no alternatives")]
    EmptyAnswer,
    #[error("llm client is misconfigured: {0}")]
    Configuration(String),
}

/// YandexGPT `foundationModels/v1/completion` client.
pub struct YandexGptClient {
    http: reqwest::Client,
    completion_url: String,
    folder_id: String,
    model_uri: String,
    temperature: f32,
    max_tokens: u32,
    credentials: Arc<dyn CredentialProvider>,
}

impl YandexGptClient {
    pub fn new(
        http: reqwest::Client,
        config: &LlmConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            http,
            completion_url: config.completion_url.clone(),
            folder_id: config.folder_id.clone(),
            model_uri: model_uri(&config.folder_id, &config.model),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            credentials,
        }
    }

    /// Builds the HTTP client and the credential provider the config asks for.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| LlmError::Configuration(error.to_string()))?;
        let credentials = credential_provider(config, http.clone())?;
        Ok(Self::new(http, config, credentials))
    }

    pub fn model_uri(&self) -> &str {
        &self.model_uri
    }

    async fn request(&self, prompt: &str) -> Result<String, LlmError> {
        let credential = self.credentials.valid_credential().await?;
        let body = CompletionRequest {
            model_uri: &self.model_uri,
            completion_options: CompletionOptions {
                stream: false,
                temperature: self.temperature,
                max_tokens: self.max_tokens.to_string(),
            },
            messages: vec![Message { role: "user", text: prompt }],
        };

        let response = self
            .http
            .post(&self.completion_url)
            .header(reqwest::header::AUTHORIZATION, credential.authorization_header())
            .header("x-folder-id", &self.folder_id)
            .json(&body)
            .send()
            .await
            .map_err(|error| LlmError::Request(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status: status.as_u16(), body });
        }

        let payload: CompletionResponse =
            response.json().await.map_err(|error| LlmError::Decode(error.to_string()))?;
        let answer = payload
            .result
            .alternatives
            .into_iter()
            .next()
            .map(|alternative| alternative.message.text)
            .ok_or(LlmError::EmptyAnswer)?;

        debug!(
            event_name = "llm.completion.received",
            model_uri = %self.model_uri,
            answer_chars = answer.chars().count(),
            "llm completion received"
        );
        Ok(answer)
    }
}

#[async_trait]
impl LlmClient for YandexGptClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        Ok(self.request(prompt).await?)
    }
}

pub fn model_uri(folder_id: &str, model: &str) -> String {
    format!("gpt://{}/{}", folder_id.trim(), model.trim())
}

fn credential_provider(
    config: &LlmConfig,
    http: reqwest::Client,
) -> Result<Arc<dyn CredentialProvider>, LlmError> {
    match config.auth_mode {
        LlmAuthMode::OauthIam => {
            let oauth_token: SecretString = config.oauth_token.clone().ok_or_else(|| {
                LlmError::Configuration("llm.oauth_token is not set".to_string())
            })?;
            let exchange = HttpIamExchange::new(http, config.iam_url.clone(), oauth_token);
            Ok(Arc::new(IamTokenProvider::new(exchange)))
        }
        LlmAuthMode::ApiKey => {
            let api_key = config
                .api_key
                .clone()
                .ok_or_else(|| LlmError::Configuration("llm.api_key is not set".to_string()))?;
            Ok(Arc::new(StaticApiKey::new(api_key)))
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionRequest<'a> {
    model_uri: &'a str,
    completion_options: CompletionOptions,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletionOptions {
    stream: bool,
    temperature: f32,
    max_tokens: String,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    result: CompletionResult,
}

#[derive(Deserialize)]
struct CompletionResult {
    #[serde(default)]
    alternatives: Vec<Alternative>,
}

#[derive(Deserialize)]
struct Alternative {
    message: AlternativeMessage,
}

#[derive(Deserialize)]
struct AlternativeMessage {
    #[serde(default)]
    text: String,
}
