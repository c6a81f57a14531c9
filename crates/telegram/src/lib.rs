//! Telegram interface for stampdesk.
//!
//! - **Long polling** (`polling`) - `getUpdates` loop with backoff, per-chat ordering
//! - **Bot API client** (`client`) - HTTPS transport for polling and `sendMessage`
//! - **Updates** (`updates`) - Bot API wire types decoded into chat events
//! - **Commands** (`commands`) - `/start` and other slash commands
//! - **Events** (`events`) - dispatcher routing chat events to the intake service
//! - **Notifier** (`notifier`) - order summaries for the staff chat and the customer
//!
//! ```text
//! getUpdates → Update → ChatEnvelope → EventDispatcher → ConversationService
//!                                            ↓
//!                              sendMessage ← replies
//! ```

pub mod client;
pub mod commands;
pub mod events;
pub mod notifier;
pub mod polling;
pub mod updates;

pub use client::BotApiClient;
pub use events::{
    intake_dispatcher, ConversationService, EventContext, EventDispatcher, EventHandlerError,
    MessageEvent, StartEvent,
};
pub use notifier::{TelegramCustomerNotifier, TelegramStaffNotifier};
pub use polling::{ChatOutbox, LongPollRunner, ReconnectPolicy, TransportError, UpdateSource};
