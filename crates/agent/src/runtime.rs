use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{error, info, warn};

use stampdesk_core::domain::order::Order;
use stampdesk_core::domain::session::ConversationId;
use stampdesk_core::errors::{ApplicationError, ORDER_NOT_CONFIRMED_REPLY};
use stampdesk_core::flows::{IntakeFlow, IntakeState, TurnAction};
use stampdesk_db::{RepositoryError, SessionStore};

use crate::extraction::ExtractionGateway;
use crate::finalizer::{FinalizeError, OrderFinalizer};

pub const GREETING: &str = "Привет! Расскажите, пожалуйста, что именно вам нужно для заказа печати или штампа. Можно в свободной форме.";
pub const NO_SESSION_REPLY: &str = "Введите /start для начала оформления заказа.";
pub const FINALIZE_FAILED_REPLY: &str = ORDER_NOT_CONFIRMED_REPLY;

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("session store failure: {0}")]
    SessionStore(#[from] RepositoryError),
    #[error("finalizing order for conversation {conversation_id} failed: {source}")]
    Finalize {
        conversation_id: ConversationId,
        #[source]
        source: FinalizeError,
    },
}

impl From<IntakeError> for ApplicationError {
    fn from(value: IntakeError) -> Self {
        match value {
            IntakeError::SessionStore(error) => Self::Persistence(error.to_string()),
            failure @ IntakeError::Finalize { .. } => Self::Integration(failure.to_string()),
        }
    }
}

/// Replies that close one turn, in send order. The order summary is not among
/// them; the finalizer delivers it to the customer before the order is stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnReply {
    pub replies: Vec<String>,
    pub state: IntakeState,
}

impl TurnReply {
    fn single(reply: impl Into<String>, state: IntakeState) -> Self {
        Self { replies: vec![reply.into()], state }
    }
}

/// Drives one conversation turn: session lookup, extraction, merge,
/// follow-up or finalization.
pub struct IntakeRuntime {
    sessions: Arc<dyn SessionStore>,
    gateway: ExtractionGateway,
    flow: IntakeFlow,
    finalizer: OrderFinalizer,
}

impl IntakeRuntime {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        gateway: ExtractionGateway,
        flow: IntakeFlow,
        finalizer: OrderFinalizer,
    ) -> Self {
        Self { sessions, gateway, flow, finalizer }
    }

    /// Opens a fresh session, discarding any partial order.
    pub async fn start(&self, conversation_id: &ConversationId) -> Result<String, IntakeError> {
        self.sessions.create(conversation_id, Utc::now()).await?;
        info!(
            event_name = "intake.session.started",
            conversation_id = %conversation_id,
            "intake session started"
        );
        Ok(GREETING.to_owned())
    }

    pub async fn handle_message(
        &self,
        conversation_id: &ConversationId,
        text: &str,
    ) -> Result<TurnReply, IntakeError> {
        let Some(mut session) = self.sessions.get(conversation_id).await? else {
            return Ok(TurnReply::single(NO_SESSION_REPLY, IntakeState::NoSession));
        };

        let combined_text = session.combined_text(text.trim());
        let extraction = self.gateway.extract(&combined_text).await;
        let outcome = self.flow.apply_turn(&mut session, extraction);
        let now = Utc::now();
        session.touch(now);

        info!(
            event_name = "intake.turn.applied",
            conversation_id = %conversation_id,
            updated_fields = ?outcome.updated_fields,
            complete = outcome.is_complete(),
            "conversation turn applied"
        );

        match outcome.action {
            TurnAction::AskFollowUp { question } => {
                if !self.sessions.save(&session).await? {
                    warn!(
                        event_name = "intake.session.vanished",
                        conversation_id = %conversation_id,
                        "session ended while the turn was in flight"
                    );
                    return Ok(TurnReply::single(NO_SESSION_REPLY, IntakeState::NoSession));
                }
                Ok(TurnReply::single(question, IntakeState::Active))
            }
            TurnAction::Finalize => {
                let order = Order::from_session(&session, now);
                let finalized = self.finalizer.finalize(&order).await;
                self.sessions.delete(conversation_id).await?;

                let mut replies = Vec::new();
                if let Err(source) = finalized {
                    let stage = source.stage;
                    let failure =
                        IntakeError::Finalize { conversation_id: conversation_id.clone(), source };
                    error!(
                        event_name = "intake.order.finalize_failed",
                        conversation_id = %conversation_id,
                        stage = %stage,
                        error = %failure,
                        "order finalization failed"
                    );
                    let reply = ApplicationError::from(failure)
                        .into_interface(conversation_id.to_string());
                    replies.push(reply.user_message().to_owned());
                }
                Ok(TurnReply { replies, state: IntakeState::Complete })
            }
        }
    }

    pub async fn active_sessions(&self) -> Result<usize, IntakeError> {
        Ok(self.sessions.count().await?)
    }

    /// Drops sessions idle since before `cutoff`.
    pub async fn expire_idle(&self, cutoff: DateTime<Utc>) -> Result<usize, IntakeError> {
        let purged = self.sessions.purge_idle(cutoff).await?;
        if purged > 0 {
            info!(event_name = "intake.session.expired", purged, "idle sessions expired");
        }
        Ok(purged)
    }
}
