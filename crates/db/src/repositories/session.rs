use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use stampdesk_core::domain::session::{ConversationId, Session};

use super::{RepositoryError, SessionStore};
use crate::DbPool;

pub struct SqlSessionStore {
    pool: DbPool,
}

impl SqlSessionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SessionStore for SqlSessionStore {
    async fn create(
        &self,
        conversation_id: &ConversationId,
        now: DateTime<Utc>,
    ) -> Result<Session, RepositoryError> {
        let session = Session::new(conversation_id.clone(), now);
        sqlx::query(
            "INSERT INTO intake_session (
                conversation_id,
                collected_fields_json,
                pending_question,
                started_at,
                last_activity_at
             ) VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(conversation_id) DO UPDATE SET
                collected_fields_json = excluded.collected_fields_json,
                pending_question = excluded.pending_question,
                started_at = excluded.started_at,
                last_activity_at = excluded.last_activity_at",
        )
        .bind(&session.conversation_id.0)
        .bind(encode_fields(&session)?)
        .bind(session.pending_question())
        .bind(format_timestamp(session.started_at))
        .bind(format_timestamp(session.last_activity_at))
        .execute(&self.pool)
        .await?;
        Ok(session)
    }

    async fn get(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<Session>, RepositoryError> {
        let row = sqlx::query(
            "SELECT
                conversation_id,
                collected_fields_json,
                pending_question,
                started_at,
                last_activity_at
             FROM intake_session
             WHERE conversation_id = ?",
        )
        .bind(&conversation_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(session_from_row).transpose()
    }

    async fn save(&self, session: &Session) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE intake_session SET
                collected_fields_json = ?,
                pending_question = ?,
                last_activity_at = ?
             WHERE conversation_id = ?",
        )
        .bind(encode_fields(session)?)
        .bind(session.pending_question())
        .bind(format_timestamp(session.last_activity_at))
        .bind(&session.conversation_id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, conversation_id: &ConversationId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM intake_session WHERE conversation_id = ?")
            .bind(&conversation_id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn purge_idle(&self, cutoff: DateTime<Utc>) -> Result<usize, RepositoryError> {
        let result = sqlx::query("DELETE FROM intake_session WHERE last_activity_at < ?")
            .bind(format_timestamp(cutoff))
            .execute(&self.pool)
            .await?;
        Ok(usize::try_from(result.rows_affected()).unwrap_or(usize::MAX))
    }

    async fn count(&self) -> Result<usize, RepositoryError> {
        let count = sqlx::query("SELECT COUNT(*) AS count FROM intake_session")
            .fetch_one(&self.pool)
            .await?
            .try_get::<i64, _>("count")?;
        usize::try_from(count)
            .map_err(|_| RepositoryError::Decode(format!("invalid session count: {count}")))
    }
}

fn encode_fields(session: &Session) -> Result<String, RepositoryError> {
    serde_json::to_string(session.collected_fields())
        .map_err(|error| RepositoryError::Decode(format!("encode fields: {error}")))
}

/// Fixed-width UTC timestamps so that text comparison matches time order.
pub(crate) fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

fn session_from_row(row: SqliteRow) -> Result<Session, RepositoryError> {
    let fields_json = row.try_get::<String, _>("collected_fields_json")?;
    let collected_fields: BTreeMap<String, String> = serde_json::from_str(&fields_json)
        .map_err(|error| {
            RepositoryError::Decode(format!("invalid collected_fields_json: {error}"))
        })?;

    Ok(Session::restore(
        ConversationId(row.try_get("conversation_id")?),
        collected_fields,
        row.try_get("pending_question")?,
        parse_timestamp("started_at", row.try_get("started_at")?)?,
        parse_timestamp("last_activity_at", row.try_get("last_activity_at")?)?,
    ))
}
