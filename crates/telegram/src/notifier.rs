use std::sync::Arc;

use async_trait::async_trait;

use stampdesk_core::domain::session::ConversationId;
use stampdesk_core::notify::{CustomerNotifier, NotifyError, StaffNotifier};

use crate::polling::{ChatOutbox, TransportError};

/// Sends order summaries to the staff chat through the bot.
pub struct TelegramStaffNotifier {
    outbox: Arc<dyn ChatOutbox>,
    staff_chat_id: String,
}

impl TelegramStaffNotifier {
    pub fn new(outbox: Arc<dyn ChatOutbox>, staff_chat_id: impl Into<String>) -> Self {
        Self { outbox, staff_chat_id: staff_chat_id.into() }
    }
}

#[async_trait]
impl StaffNotifier for TelegramStaffNotifier {
    async fn notify(&self, summary: &str) -> Result<(), NotifyError> {
        self.outbox.send_message(&self.staff_chat_id, summary).await.map_err(notify_error)
    }
}

/// Writes to the customer's own chat; the conversation id is the chat id.
pub struct TelegramCustomerNotifier {
    outbox: Arc<dyn ChatOutbox>,
}

impl TelegramCustomerNotifier {
    pub fn new(outbox: Arc<dyn ChatOutbox>) -> Self {
        Self { outbox }
    }
}

#[async_trait]
impl CustomerNotifier for TelegramCustomerNotifier {
    async fn send(
        &self,
        conversation_id: &ConversationId,
        text: &str,
    ) -> Result<(), NotifyError> {
        self.outbox.send_message(&conversation_id.0, text).await.map_err(notify_error)
    }
}

fn notify_error(error: TransportError) -> NotifyError {
    match error {
        TransportError::Api(description) => NotifyError::Rejected(description),
        other => NotifyError::Delivery(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use stampdesk_core::domain::session::ConversationId;
use stampdesk_core::notify::{CustomerNotifier, NotifyError, StaffNotifier};

    use super::{TelegramCustomerNotifier, TelegramStaffNotifier};
    use crate::polling::{ChatOutbox, TransportError};

    #[derive(Default)]
    struct RecordingOutbox {
        sent: Mutex<Vec<(String, String)>>,
        fail_with: Option<TransportError>,
    }

    #[async_trait]
    impl ChatOutbox for RecordingOutbox {
        async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), TransportError> {
            if let Some(error) = &self.fail_with {
                return Err(error.clone());
            }
            self.sent.lock().await.push((chat_id.to_owned(), text.to_owned()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn summary_goes_to_the_staff_chat() {
        let outbox = Arc::new(RecordingOutbox::default());
        let notifier = TelegramStaffNotifier::new(outbox.clone(), "-100500");

        notifier.notify("Новый заказ:\nКак вас зовут? Ivan").await.expect("notify");

        assert_eq!(
            *outbox.sent.lock().await,
            vec![("-100500".to_owned(), "Новый заказ:\nКак вас зовут? Ivan".to_owned())]
        );
    }

    #[tokio::test]
    async fn transport_failures_map_to_notify_errors() {
        let rejected = TelegramStaffNotifier::new(
            Arc::new(RecordingOutbox {
                fail_with: Some(TransportError::Api("chat not found".to_owned())),
                ..RecordingOutbox::default()
            }),
            "1",
        );
        assert_eq!(
            rejected.notify("x").await,
            Err(NotifyError::Rejected("chat not found".to_owned()))
        );

        let offline = TelegramStaffNotifier::new(
            Arc::new(RecordingOutbox {
                fail_with: Some(TransportError::Send("timed out".to_owned())),
                ..RecordingOutbox::default()
            }),
            "1",
        );
        assert!(matches!(offline.notify("x").await, Err(NotifyError::Delivery(_))));
    }

    #[tokio::test]
    async fn customer_messages_go_to_the_conversation_chat() {
        let outbox = Arc::new(RecordingOutbox::default());
        let customer = TelegramCustomerNotifier::new(outbox.clone());

        customer.send(&ConversationId::from(42), "Вот что вы указали:").await.expect("send");

        assert_eq!(
            *outbox.sent.lock().await,
            vec![("42".to_owned(), "Вот что вы указали:".to_owned())]
        );
    }
}
