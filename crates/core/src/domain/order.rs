use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::schema::FieldSchema;
use crate::domain::session::{ConversationId, Session};

pub const FULL_SUMMARY_HEADER: &str = "Вот что вы указали:\n\n";
pub const SHORT_SUMMARY_HEADER: &str = "Новый заказ:\n";
pub const SHORT_SUMMARY_DELIMITER: &str = " | ";

/// Snapshot of a session's collected fields taken at finalization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub conversation_id: ConversationId,
    pub fields: BTreeMap<String, String>,
    pub completed_at: DateTime<Utc>,
}

/// Where a persisted order ended up (a table row, a file path, ...).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLocation(pub String);

impl Order {
    pub fn from_session(session: &Session, completed_at: DateTime<Utc>) -> Self {
        Self {
            conversation_id: session.conversation_id.clone(),
            fields: session.collected_fields().clone(),
            completed_at,
        }
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str).filter(|value| !value.is_empty())
    }

    /// `(prompt, value)` pairs for every recorded field, in schema order.
    pub fn entries<'a>(
        &'a self,
        schema: &FieldSchema,
    ) -> impl Iterator<Item = (&'static str, &'a str)> + 'a {
        schema
            .fields()
            .iter()
            .filter_map(move |field| self.value(field.key).map(|value| (field.prompt, value)))
    }

    /// Summary shown to the customer: one `<prompt> <value>` line per field.
    pub fn full_summary(&self, schema: &FieldSchema) -> String {
        let mut summary = String::from(FULL_SUMMARY_HEADER);
        for (prompt, value) in self.entries(schema) {
            summary.push_str(prompt);
            summary.push(' ');
            summary.push_str(value);
            summary.push('\n');
        }
        summary
    }

    /// One-line summary for the staff channel.
    pub fn short_summary(&self, schema: &FieldSchema) -> String {
        let entries = self
            .entries(schema)
            .map(|(prompt, value)| format!("{prompt} {value}"))
            .collect::<Vec<_>>();
        format!("{SHORT_SUMMARY_HEADER}{}", entries.join(SHORT_SUMMARY_DELIMITER))
    }

    /// Values in schema column order; missing fields are empty cells.
    pub fn row(&self, schema: &FieldSchema) -> Vec<String> {
        schema.keys().map(|key| self.value(key).unwrap_or_default().to_owned()).collect()
    }

    pub fn missing_keys(&self, schema: &FieldSchema) -> Vec<&'static str> {
        schema.keys().filter(|key| self.value(key).is_none()).collect()
    }
}
