use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::events::{ChatEnvelope, EventContext, EventDispatcher, HandlerResult};
use crate::updates::Update;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("update poll failed: {0}")]
    Receive(String),
    #[error("message send failed: {0}")]
    Send(String),
    #[error("bot api rejected the request: {0}")]
    Api(String),
}

/// Backoff for failed polls. Past `max_retries` consecutive failures the
/// outage is reported as an error and polling continues at `max_delay_ms`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 8, base_delay_ms: 500, max_delay_ms: 30_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Long-poll source of updates. `Ok(None)` means the source is closed.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    async fn next_batch(&self, offset: Option<i64>) -> Result<Option<Vec<Update>>, TransportError>;
}

#[async_trait]
pub trait ChatOutbox: Send + Sync {
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), TransportError>;
}

pub struct LongPollRunner {
    source: Arc<dyn UpdateSource>,
    outbox: Arc<dyn ChatOutbox>,
    dispatcher: Arc<EventDispatcher>,
    reconnect_policy: ReconnectPolicy,
}

impl LongPollRunner {
    pub fn new(
        source: Arc<dyn UpdateSource>,
        outbox: Arc<dyn ChatOutbox>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { source, outbox, dispatcher: Arc::new(dispatcher), reconnect_policy }
    }

    /// Polls until the source closes. Transport failures never end the loop.
    pub async fn start(&self) -> Result<()> {
        let mut offset = None;
        let mut failures = 0_u32;

        loop {
            match self.source.next_batch(offset).await {
                Ok(Some(updates)) => {
                    failures = 0;
                    if let Some(next) = self.process_batch(updates).await {
                        offset = Some(next);
                    }
                }
                Ok(None) => {
                    info!(event_name = "ingress.telegram.source_closed", "update source closed");
                    return Ok(());
                }
                Err(transport_error) => {
                    warn!(
                        event_name = "ingress.telegram.poll_failed",
                        attempt = failures,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "long poll failed"
                    );

                    if failures == self.reconnect_policy.max_retries {
                        error!(
                            event_name = "ingress.telegram.outage",
                            max_retries = self.reconnect_policy.max_retries,
                            "long poll keeps failing; still retrying at the capped delay"
                        );
                    }

                    let delay = self.reconnect_policy.backoff(failures);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    failures = failures.saturating_add(1);
                }
            }
        }
    }

    /// Runs chats concurrently and each chat's updates in arrival order.
    /// Returns the offset that acknowledges the whole batch.
    async fn process_batch(&self, updates: Vec<Update>) -> Option<i64> {
        let next_offset = updates.iter().map(|update| update.update_id + 1).max();

        let mut per_chat: Vec<(i64, Vec<ChatEnvelope>)> = Vec::new();
        for update in updates {
            let envelope = update.into_envelope();
            info!(
                event_name = "ingress.telegram.update_received",
                update_id = envelope.update_id,
                event_type = ?envelope.event.event_type(),
                correlation_id = %EventContext::for_update(envelope.update_id).correlation_id,
                "received telegram update"
            );

            let Some(chat_id) = envelope.event.chat_id() else {
                debug!(update_id = envelope.update_id, "skipping update without a chat");
                continue;
            };
            match per_chat.iter_mut().find(|(id, _)| *id == chat_id) {
                Some((_, queue)) => queue.push(envelope),
                None => per_chat.push((chat_id, vec![envelope])),
            }
        }

        let mut chats = JoinSet::new();
        for (chat_id, envelopes) in per_chat {
            let dispatcher = self.dispatcher.clone();
            let outbox = self.outbox.clone();
            chats.spawn(async move {
                for envelope in envelopes {
                    handle_envelope(&dispatcher, outbox.as_ref(), chat_id, &envelope).await;
                }
            });
        }
        while let Some(joined) = chats.join_next().await {
            if let Err(error) = joined {
                warn!(error = %error, "chat worker ended abnormally");
            }
        }

        next_offset
    }
}

async fn handle_envelope(
    dispatcher: &EventDispatcher,
    outbox: &dyn ChatOutbox,
    chat_id: i64,
    envelope: &ChatEnvelope,
) {
    let context = EventContext::for_update(envelope.update_id);
    let replies = match dispatcher.dispatch(envelope, &context).await {
        Ok(HandlerResult::Responded(replies)) => replies,
        Ok(HandlerResult::Processed | HandlerResult::Ignored) => return,
        Err(error) => {
            warn!(
                update_id = envelope.update_id,
                correlation_id = %context.correlation_id,
                chat_id,
                error = %error,
                "event dispatch failed; continuing poll loop"
            );
            return;
        }
    };

    let chat = chat_id.to_string();
    for reply in replies {
        if let Err(error) = outbox.send_message(&chat, &reply).await {
            warn!(
                event_name = "egress.telegram.reply_failed",
                correlation_id = %context.correlation_id,
                chat_id,
                error = %error,
                "failed to deliver reply"
            );
            return;
        }
        debug!(
            event_name = "egress.telegram.reply_sent",
            correlation_id = %context.correlation_id,
            chat_id,
            "reply sent"
        );
    }
}
