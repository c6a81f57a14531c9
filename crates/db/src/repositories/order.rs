use std::collections::BTreeMap;

use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

use stampdesk_core::domain::order::{Order, OrderLocation};
use stampdesk_core::domain::schema::FieldSchema;
use stampdesk_core::domain::session::ConversationId;

use super::session::{format_timestamp, parse_timestamp};
use super::{OrderRepository, RepositoryError};
use crate::DbPool;

/// Stores each order as one `stamp_order` row with a column per schema key.
pub struct SqlOrderRepository {
    pool: DbPool,
    schema: FieldSchema,
}

impl SqlOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self::with_schema(pool, FieldSchema::order())
    }

    pub fn with_schema(pool: DbPool, schema: FieldSchema) -> Self {
        Self { pool, schema }
    }

    /// All stored orders, oldest first.
    pub async fn list(&self) -> Result<Vec<Order>, RepositoryError> {
        let columns = self.schema.keys().collect::<Vec<_>>().join(", ");
        let sql = format!(
            "SELECT conversation_id, {columns}, created_at
             FROM stamp_order
             ORDER BY created_at ASC, id ASC"
        );

        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.into_iter().map(|row| order_from_row(&self.schema, row)).collect()
    }
}

#[async_trait::async_trait]
impl OrderRepository for SqlOrderRepository {
    async fn persist(&self, order: &Order) -> Result<OrderLocation, RepositoryError> {
        let id = Uuid::new_v4().to_string();
        let columns = self.schema.keys().collect::<Vec<_>>().join(", ");
        let placeholders = vec!["?"; self.schema.len()].join(", ");
        let sql = format!(
            "INSERT INTO stamp_order (id, conversation_id, {columns}, created_at)
             VALUES (?, ?, {placeholders}, ?)"
        );

        let mut query = sqlx::query(&sql).bind(&id).bind(&order.conversation_id.0);
        for value in order.row(&self.schema) {
            query = query.bind(value);
        }
        query.bind(format_timestamp(order.completed_at)).execute(&self.pool).await?;

        Ok(OrderLocation(format!("sqlite:stamp_order/{id}")))
    }
}

fn order_from_row(schema: &FieldSchema, row: SqliteRow) -> Result<Order, RepositoryError> {
    let mut fields = BTreeMap::new();
    for key in schema.keys() {
        let value = row.try_get::<String, _>(key)?;
        if !value.is_empty() {
            fields.insert(key.to_owned(), value);
        }
    }

    Ok(Order {
        conversation_id: ConversationId(row.try_get("conversation_id")?),
        fields,
        completed_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use sqlx::Row;

    use stampdesk_core::domain::session::{ConversationId, Session};
    use stampdesk_core::Order;

    use super::SqlOrderRepository;
    use crate::migrations;
    use crate::repositories::OrderRepository;
    use crate::{connect_with_settings, DbPool};

    fn order(chat: i64, fields: &[(&str, &str)]) -> Order {
        let mut session = Session::new(ConversationId::from(chat), Utc::now());
        session.merge_fields(fields.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())));
        Order::from_session(&session, Utc::now())
    }

    #[tokio::test]
    async fn persist_writes_one_row_with_empty_cells_for_missing_fields() {
        let pool = setup_pool().await;
        let repo = SqlOrderRepository::new(pool.clone());

        let location = repo
            .persist(&order(55, &[("name", "Ivan"), ("phone", "555-1234"), ("color", "синий")]))
            .await
            .expect("persist");
        assert!(location.0.starts_with("sqlite:stamp_order/"));

        let row = sqlx::query("SELECT conversation_id, name, color, size FROM stamp_order")
            .fetch_one(&pool)
            .await
            .expect("row");
        assert_eq!(row.get::<String, _>("conversation_id"), "55");
        assert_eq!(row.get::<String, _>("name"), "Ivan");
        assert_eq!(row.get::<String, _>("color"), "синий");
        assert_eq!(row.get::<String, _>("size"), "");

        pool.close().await;
    }

    #[tokio::test]
    async fn list_returns_orders_oldest_first() {
        let pool = setup_pool().await;
        let repo = SqlOrderRepository::new(pool.clone());

        let mut older = order(1, &[("name", "Anna")]);
        older.completed_at = Utc::now() - Duration::minutes(5);
        let newer = order(2, &[("name", "Ivan"), ("quantity", "2")]);

        repo.persist(&newer).await.expect("persist newer");
        repo.persist(&older).await.expect("persist older");

        let orders = repo.list().await.expect("list");
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].value("name"), Some("Anna"));
        assert_eq!(orders[1].value("quantity"), Some("2"));
        assert!(orders[1].value("size").is_none());

        pool.close().await;
    }

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }
}
