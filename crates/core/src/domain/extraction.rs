use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Fallback question used whenever the extractor's answer cannot be used.
pub const FALLBACK_QUESTION: &str = "Не смог понять ваш заказ, пожалуйста, опишите подробнее.";

/// Structured result of one extraction call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction {
    pub fields: BTreeMap<String, String>,
    pub follow_up_question: Option<String>,
}

impl Extraction {
    pub fn new<I>(fields: I, follow_up_question: Option<String>) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            fields: fields.into_iter().collect(),
            follow_up_question: follow_up_question
                .map(|question| question.trim().to_owned())
                .filter(|question| !question.is_empty()),
        }
    }

    /// Nothing extracted, ask the customer to elaborate.
    pub fn fallback() -> Self {
        Self { fields: BTreeMap::new(), follow_up_question: Some(FALLBACK_QUESTION.to_owned()) }
    }

    pub fn complete<I>(fields: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self::new(fields, None)
    }

    pub fn asks_follow_up(&self) -> bool {
        self.follow_up_question.is_some()
    }
}
