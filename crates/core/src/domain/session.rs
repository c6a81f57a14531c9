use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for ConversationId {
    fn from(chat_id: i64) -> Self {
        Self(chat_id.to_string())
    }
}

impl From<&str> for ConversationId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Accumulated state of one in-progress conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub conversation_id: ConversationId,
    collected_fields: BTreeMap<String, String>,
    pending_question: Option<String>,
    pub started_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl Session {
    pub fn new(conversation_id: ConversationId, now: DateTime<Utc>) -> Self {
        Self {
            conversation_id,
            collected_fields: BTreeMap::new(),
            pending_question: None,
            started_at: now,
            last_activity_at: now,
        }
    }

    /// Rebuilds a session from stored parts, dropping any empty values.
    pub fn restore(
        conversation_id: ConversationId,
        collected_fields: BTreeMap<String, String>,
        pending_question: Option<String>,
        started_at: DateTime<Utc>,
        last_activity_at: DateTime<Utc>,
    ) -> Self {
        let mut session = Self::new(conversation_id, started_at);
        session.merge_fields(collected_fields);
        session.set_pending_question(pending_question);
        session.last_activity_at = last_activity_at;
        session
    }

    pub fn collected_fields(&self) -> &BTreeMap<String, String> {
        &self.collected_fields
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.collected_fields.get(key).map(String::as_str)
    }

    pub fn pending_question(&self) -> Option<&str> {
        self.pending_question.as_deref()
    }

    /// Last write wins per key; blank values are never recorded and never
    /// overwrite an existing value. Returns the keys that changed.
    pub fn merge_fields<I>(&mut self, fields: I) -> Vec<String>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut updated = Vec::new();
        for (key, value) in fields {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let previous = self.collected_fields.insert(key.clone(), value.to_owned());
            if previous.as_deref() != Some(value) {
                updated.push(key);
            }
        }
        updated
    }

    pub fn set_pending_question(&mut self, question: Option<String>) {
        self.pending_question =
            question.map(|question| question.trim().to_owned()).filter(|q| !q.is_empty());
    }

    /// Text handed to the extractor: the pending question (if any) followed by
    /// the customer's answer, so the model knows what was being answered.
    pub fn combined_text(&self, text: &str) -> String {
        match &self.pending_question {
            Some(question) => format!("{question} {text}"),
            None => text.to_owned(),
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity_at = now;
    }

    pub fn is_idle_since(&self, cutoff: DateTime<Utc>) -> bool {
        self.last_activity_at < cutoff
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::{ConversationId, Session};

    fn pair(key: &str, value: &str) -> (String, String) {
        (key.to_owned(), value.to_owned())
    }

    #[test]
    fn later_values_overwrite_earlier_ones() {
        let mut session = Session::new(ConversationId::from(1), Utc::now());
        session.merge_fields([pair("name", "Ivan"), pair("color", "синий")]);
        let updated = session.merge_fields([pair("color", "красный")]);

        assert_eq!(updated, vec!["color".to_owned()]);
        assert_eq!(session.field("name"), Some("Ivan"));
        assert_eq!(session.field("color"), Some("красный"));
    }

    #[test]
    fn empty_values_never_overwrite_or_get_recorded() {
        let mut session = Session::new(ConversationId::from(1), Utc::now());
        session.merge_fields([pair("phone", "555-1234")]);
        let updated = session.merge_fields([pair("phone", "  "), pair("size", "")]);

        assert!(updated.is_empty());
        assert_eq!(session.field("phone"), Some("555-1234"));
        assert!(session.field("size").is_none());
        assert!(session.collected_fields().values().all(|value| !value.is_empty()));
    }

    #[test]
    fn combined_text_prefixes_pending_question() {
        let mut session = Session::new(ConversationId::from(7), Utc::now());
        assert_eq!(session.combined_text("Company LLC"), "Company LLC");

        session.set_pending_question(Some("What should the text say?".to_owned()));
        assert_eq!(
            session.combined_text("Company LLC"),
            "What should the text say? Company LLC"
        );
    }

    #[test]
    fn blank_question_clears_pending_slot() {
        let mut session = Session::new(ConversationId::from(7), Utc::now());
        session.set_pending_question(Some("Размер?".to_owned()));
        session.set_pending_question(Some("   ".to_owned()));
        assert!(session.pending_question().is_none());
    }

    #[test]
    fn idle_detection_uses_last_activity() {
        let started = Utc::now() - Duration::minutes(90);
        let mut session = Session::new(ConversationId::from(3), started);
        assert!(session.is_idle_since(Utc::now() - Duration::minutes(30)));

        session.touch(Utc::now());
        assert!(!session.is_idle_since(Utc::now() - Duration::minutes(30)));
    }
}
