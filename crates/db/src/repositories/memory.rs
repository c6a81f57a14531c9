use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use stampdesk_core::domain::order::{Order, OrderLocation};
use stampdesk_core::domain::session::{ConversationId, Session};

use super::{OrderRepository, RepositoryError, SessionStore};

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(
        &self,
        conversation_id: &ConversationId,
        now: DateTime<Utc>,
    ) -> Result<Session, RepositoryError> {
        let session = Session::new(conversation_id.clone(), now);
        let mut sessions = self.sessions.write().await;
        sessions.insert(conversation_id.0.clone(), session.clone());
        Ok(session)
    }

    async fn get(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<Session>, RepositoryError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(&conversation_id.0).cloned())
    }

    async fn save(&self, session: &Session) -> Result<bool, RepositoryError> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&session.conversation_id.0) {
            Some(stored) => {
                *stored = session.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, conversation_id: &ConversationId) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(&conversation_id.0);
        Ok(())
    }

    async fn purge_idle(&self, cutoff: DateTime<Utc>) -> Result<usize, RepositoryError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_idle_since(cutoff));
        Ok(before - sessions.len())
    }

    async fn count(&self) -> Result<usize, RepositoryError> {
        Ok(self.sessions.read().await.len())
    }
}

#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<Vec<Order>>,
}

impl InMemoryOrderRepository {
    pub async fn orders(&self) -> Vec<Order> {
        self.orders.read().await.clone()
    }
}

#[async_trait::async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn persist(&self, order: &Order) -> Result<OrderLocation, RepositoryError> {
        let mut orders = self.orders.write().await;
        orders.push(order.clone());
        Ok(OrderLocation(format!("memory:order/{}", orders.len())))
    }
}
