use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::session::ConversationId;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NotifyError {
    #[error("notification was rejected: {0}")]
    Rejected(String),
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Delivers order summaries to the fixed staff destination.
#[async_trait]
pub trait StaffNotifier: Send + Sync {
    async fn notify(&self, summary: &str) -> Result<(), NotifyError>;
}

/// Talks to the customer outside the reply batch of the current turn.
#[async_trait]
pub trait CustomerNotifier: Send + Sync {
    async fn send(&self, conversation_id: &ConversationId, text: &str)
        -> Result<(), NotifyError>;
}

/// Keeps notifications in memory; used by tests and dry runs.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<String>>>,
    customer: Arc<Mutex<Vec<(ConversationId, String)>>>,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl RecordingNotifier {
    /// Staff notifications in delivery order.
    pub fn sent(&self) -> Vec<String> {
        locked(&self.sent).clone()
    }

    pub fn customer_messages(&self) -> Vec<(ConversationId, String)> {
        locked(&self.customer).clone()
    }
}

#[async_trait]
impl StaffNotifier for RecordingNotifier {
    async fn notify(&self, summary: &str) -> Result<(), NotifyError> {
        locked(&self.sent).push(summary.to_owned());
        Ok(())
    }
}

#[async_trait]
impl CustomerNotifier for RecordingNotifier {
    async fn send(
        &self,
        conversation_id: &ConversationId,
        text: &str,
    ) -> Result<(), NotifyError> {
        locked(&self.customer).push((conversation_id.clone(), text.to_owned()));
        Ok(())
    }
}
