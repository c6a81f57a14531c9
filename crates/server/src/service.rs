use std::sync::Arc;

use async_trait::async_trait;
use tracing::error;

use stampdesk_agent::{IntakeError, IntakeRuntime};
use stampdesk_core::{ApplicationError, ConversationId};
use stampdesk_telegram::{
    ConversationService, EventContext, EventHandlerError, MessageEvent, StartEvent,
};

/// Exposes the intake runtime to the Telegram dispatcher.
pub struct IntakeConversationService {
    runtime: Arc<IntakeRuntime>,
}

impl IntakeConversationService {
    pub fn new(runtime: Arc<IntakeRuntime>) -> Self {
        Self { runtime }
    }
}

#[async_trait]
impl ConversationService for IntakeConversationService {
    async fn start(
        &self,
        event: &StartEvent,
        ctx: &EventContext,
    ) -> Result<Vec<String>, EventHandlerError> {
        let conversation_id = ConversationId::from(event.chat_id);
        match self.runtime.start(&conversation_id).await {
            Ok(greeting) => Ok(vec![greeting]),
            Err(failure) => Ok(vec![unavailable_reply(&conversation_id, failure, ctx)]),
        }
    }

    async fn message(
        &self,
        event: &MessageEvent,
        ctx: &EventContext,
    ) -> Result<Vec<String>, EventHandlerError> {
        let conversation_id = ConversationId::from(event.chat_id);
        match self.runtime.handle_message(&conversation_id, &event.text).await {
            Ok(turn) => Ok(turn.replies),
            Err(failure) => Ok(vec![unavailable_reply(&conversation_id, failure, ctx)]),
        }
    }
}

fn unavailable_reply(
    conversation_id: &ConversationId,
    failure: IntakeError,
    ctx: &EventContext,
) -> String {
    error!(
        event_name = "intake.turn.failed",
        correlation_id = %ctx.correlation_id,
        conversation_id = %conversation_id,
        error = %failure,
        "conversation turn failed"
    );
    ApplicationError::from(failure)
        .into_interface(ctx.correlation_id.clone())
        .user_message()
        .to_owned()
}
