use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use stampdesk_core::domain::order::{Order, OrderLocation};
use stampdesk_core::domain::session::{ConversationId, Session};

pub mod ledger;
pub mod memory;
pub mod order;
pub mod session;

pub use ledger::{write_orders_csv, CsvOrderLedger};
pub use memory::{InMemoryOrderRepository, InMemorySessionStore};
pub use order::SqlOrderRepository;
pub use session::SqlSessionStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("order ledger error: {0}")]
    Ledger(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("blocking ledger task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Holds at most one in-progress session per conversation.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Inserts a fresh session, replacing whatever the conversation had.
    async fn create(
        &self,
        conversation_id: &ConversationId,
        now: DateTime<Utc>,
    ) -> Result<Session, RepositoryError>;

    async fn get(&self, conversation_id: &ConversationId)
        -> Result<Option<Session>, RepositoryError>;

    /// Writes back a session that still exists. Returns `false` when the
    /// session was removed meanwhile (expired or finalized); it is not recreated.
    async fn save(&self, session: &Session) -> Result<bool, RepositoryError>;

    /// Removing a missing session is not an error.
    async fn delete(&self, conversation_id: &ConversationId) -> Result<(), RepositoryError>;

    /// Drops sessions whose last activity is older than `cutoff`.
    async fn purge_idle(&self, cutoff: DateTime<Utc>) -> Result<usize, RepositoryError>;

    async fn count(&self) -> Result<usize, RepositoryError>;
}

/// Durable home for completed orders.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn persist(&self, order: &Order) -> Result<OrderLocation, RepositoryError>;
}
