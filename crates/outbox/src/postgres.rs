use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::EventId;
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{OutboxError, OutboxMessage, OutboxStore, Result};

const UNIQUE_VIOLATION: &str = "23505";

/// PostgreSQL-backed outbox table.
#[derive(Clone)]
pub struct PostgresOutbox {
    pool: PgPool,
}

impl PostgresOutbox {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Inserts messages on `conn`, normally the connection of an open
    /// transaction.
    pub async fn insert(conn: &mut PgConnection, messages: &[OutboxMessage]) -> Result<()> {
        for message in messages {
            sqlx::query(
                r#"
                INSERT INTO outbox (id, name, payload, occurred_at_utc, processed_at_utc)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(message.id.as_uuid())
            .bind(&message.name)
            .bind(&message.payload)
            .bind(message.occurred_at_utc)
            .bind(message.processed_at_utc)
            .execute(&mut *conn)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err)
                    if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) =>
                {
                    OutboxError::DuplicateMessage(message.id)
                }
                e => OutboxError::Database(e),
            })?;
        }
        Ok(())
    }

    fn row_to_message(row: PgRow) -> Result<OutboxMessage> {
        Ok(OutboxMessage {
            id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            payload: row.try_get("payload")?,
            occurred_at_utc: row.try_get("occurred_at_utc")?,
            processed_at_utc: row.try_get("processed_at_utc")?,
        })
    }
}

#[async_trait]
impl OutboxStore for PostgresOutbox {
    async fn fetch_unprocessed(&self, limit: usize) -> Result<Vec<OutboxMessage>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, payload, occurred_at_utc, processed_at_utc
            FROM outbox
            WHERE processed_at_utc IS NULL
            ORDER BY occurred_at_utc ASC
            LIMIT $1
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_message).collect()
    }

    async fn mark_processed(&self, id: EventId, processed_at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE outbox
            SET processed_at_utc = $2
            WHERE id = $1 AND processed_at_utc IS NULL
            "#,
        )
        .bind(id.as_uuid())
        .bind(processed_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn get(&self, id: EventId) -> Result<Option<OutboxMessage>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT id, name, payload, occurred_at_utc, processed_at_utc
            FROM outbox
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_message).transpose()
    }
}
