//! Turns free-form customer text into order fields and a follow-up question.
//!
//! The gateway never fails: transport errors, credential errors, timeouts and
//! unparseable answers all collapse into [`Extraction::fallback`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use stampdesk_core::domain::extraction::Extraction;
use stampdesk_core::domain::schema::FieldSchema;

use crate::llm::LlmClient;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnswerError {
    #[error("answer contains no JSON object")]
    NoJsonObject,
    #[error("answer JSON is invalid: {0}")]
    InvalidJson(String),
    #[error("answer JSON is not an object")]
    NotAnObject,
}

pub struct ExtractionGateway {
    llm: Arc<dyn LlmClient>,
    schema: FieldSchema,
    timeout: Duration,
}

impl ExtractionGateway {
    pub fn new(llm: Arc<dyn LlmClient>, schema: FieldSchema, timeout: Duration) -> Self {
        Self { llm, schema, timeout }
    }

    pub async fn extract(&self, combined_text: &str) -> Extraction {
        let prompt = build_prompt(&self.schema, combined_text);

        let answer = match tokio::time::timeout(self.timeout, self.llm.complete(&prompt)).await {
            Ok(Ok(answer)) => answer,
            Ok(Err(error)) => {
                warn!(
                    event_name = "intake.extraction.llm_failed",
                    error = %error,
                    "extraction call failed, asking the customer to rephrase"
                );
                return Extraction::fallback();
            }
            Err(_) => {
                warn!(
                    event_name = "intake.extraction.timeout",
                    timeout_secs = self.timeout.as_secs(),
                    "extraction call timed out"
                );
                return Extraction::fallback();
            }
        };

        match parse_answer(&self.schema, &answer) {
            Ok(extraction) => extraction,
            Err(error) => {
                warn!(
                    event_name = "intake.extraction.malformed",
                    error = %error,
                    answer_chars = answer.chars().count(),
                    "extraction answer could not be parsed"
                );
                Extraction::fallback()
            }
        }
    }
}

pub fn build_prompt(schema: &FieldSchema, text: &str) -> String {
    let mut prompt = String::from("Пользователь написал заказ на печать/штамп:\n\n");
    prompt.push_str(&format!("\"{text}\"\n\n"));
    prompt.push_str("Извлеки из этого текста JSON с такими полями (если есть):\n\n");
    for field in schema.fields() {
        prompt.push_str(&format!("- {}: {}\n", field.key, field.hint));
    }
    prompt.push_str(
        "\nЕсли каких-то полей не хватает, дай короткий уточняющий вопрос, чтобы получить эти данные.\n\n\
         Ответь строго в формате JSON с двумя полями:\n\
         {\n  \"data\": { ... }, // заполненные поля\n  \"question\": \"...\" // уточняющий вопрос или пустая строка, если всё есть\n}\n\n\
         Пример:\n\n\
         {\n  \"data\": {\n    \"name\": \"Иван Иванов\",\n    \"phone\": \"+79991234567\",\n    \"productType\": \"печать\"\n  },\n  \"question\": \"Для кого будет использоваться печать?\"\n}\n",
    );
    prompt
}

/// Reads the JSON object between the first `{` and the last `}` of the answer.
pub fn parse_answer(schema: &FieldSchema, answer: &str) -> Result<Extraction, AnswerError> {
    let start = answer.find('{').ok_or(AnswerError::NoJsonObject)?;
    let end = answer.rfind('}').filter(|end| *end > start).ok_or(AnswerError::NoJsonObject)?;

    let value: Value = serde_json::from_str(&answer[start..=end])
        .map_err(|error| AnswerError::InvalidJson(error.to_string()))?;
    let object = value.as_object().ok_or(AnswerError::NotAnObject)?;

    let fields = object
        .get("data")
        .and_then(Value::as_object)
        .map(|data| normalize_fields(schema, data))
        .unwrap_or_default();
    let question = object.get("question").and_then(Value::as_str).map(str::to_owned);

    Ok(Extraction::new(fields, question))
}

fn normalize_fields(
    schema: &FieldSchema,
    data: &serde_json::Map<String, Value>,
) -> BTreeMap<String, String> {
    data.iter()
        .filter(|(key, _)| schema.is_known(key))
        .filter_map(|(key, value)| {
            let text = match value {
                Value::String(text) => text.trim().to_owned(),
                Value::Number(number) => number.to_string(),
                Value::Bool(flag) => flag.to_string(),
                Value::Null | Value::Array(_) | Value::Object(_) => return None,
            };
            (!text.is_empty()).then(|| (key.clone(), text))
        })
        .collect()
}
