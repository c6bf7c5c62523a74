//! Postgres-backed event store implementation.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | EventStoreError |
//! |------------|----------------------|-----------------|
//! | Database (unique violation) | `23505` | `Concurrency` |
//! | Database (other) | any other | `Backend` |
//! | PoolClosed / Io / other | N/A | `Backend` |
//!
//! A multi-stream append runs in one transaction: every stream's version is
//! checked and every insert made before the single commit. The unique key on
//! `(aggregate_id, sequence_number)` turns a concurrent writer that slipped in
//! between check and insert into a `Concurrency` error.

use std::collections::HashSet;
use std::future::Future;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tokio::runtime::Handle;
use tracing::{instrument, Span};

use galley_core::AggregateId;

use super::r#trait::{EventStore, EventStoreError, StoredEvent, StreamAppend};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS events (
        event_id        UUID PRIMARY KEY,
        aggregate_id    UUID NOT NULL,
        aggregate_type  TEXT NOT NULL,
        sequence_number BIGINT NOT NULL CHECK (sequence_number > 0),
        event_type      TEXT NOT NULL,
        event_version   INTEGER NOT NULL,
        occurred_at     TIMESTAMPTZ NOT NULL,
        payload         JSONB NOT NULL,
        created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (aggregate_id, sequence_number)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS events_by_type
        ON events (aggregate_type, aggregate_id, sequence_number)
    "#,
];

/// Postgres-backed append-only event store.
///
/// The synchronous [`EventStore`] methods run on the runtime handle captured
/// at construction. When called from inside a runtime they use
/// `block_in_place`, which needs the multi-threaded scheduler.
#[derive(Debug, Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
    runtime: Handle,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool, runtime: Handle) -> Self {
        Self { pool, runtime }
    }

    /// Connect a pool and make sure the schema exists.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, EventStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        let store = Self::new(pool, Handle::current());
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Create the `events` table and its index if they are missing.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), EventStoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }

    /// Load all events for one stream, in sequence order.
    #[instrument(skip(self), fields(aggregate_id = %aggregate_id, event_count = tracing::field::Empty), err)]
    pub async fn load_stream_async(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT event_id, aggregate_id, aggregate_type, sequence_number,
                   event_type, event_version, occurred_at, payload
            FROM events
            WHERE aggregate_id = $1
            ORDER BY sequence_number ASC
            "#,
        )
        .bind(aggregate_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_stream", e))?;

        let events = decode_rows(rows)?;
        Span::current().record("event_count", events.len());
        Ok(events)
    }

    #[instrument(skip(self), fields(event_count = tracing::field::Empty), err)]
    pub async fn load_by_type_async(
        &self,
        aggregate_type: &str,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT event_id, aggregate_id, aggregate_type, sequence_number,
                   event_type, event_version, occurred_at, payload
            FROM events
            WHERE aggregate_type = $1
            ORDER BY aggregate_id ASC, sequence_number ASC
            "#,
        )
        .bind(aggregate_type)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_by_type", e))?;

        let events = decode_rows(rows)?;
        Span::current().record("event_count", events.len());
        Ok(events)
    }

    /// Append to several streams in one transaction.
    #[instrument(skip(self, batch), fields(streams = batch.len(), committed_events = tracing::field::Empty), err)]
    pub async fn append_streams_async(
        &self,
        batch: Vec<StreamAppend>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let batch: Vec<StreamAppend> = batch.into_iter().filter(|a| !a.events.is_empty()).collect();
        if batch.is_empty() {
            return Ok(vec![]);
        }

        let mut seen = HashSet::new();
        for append in &batch {
            append.validate()?;
            if !seen.insert(append.aggregate_id) {
                return Err(EventStoreError::InvalidAppend(format!(
                    "stream {} appears twice in one batch",
                    append.aggregate_id
                )));
            }
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let mut committed = Vec::new();
        for append in batch {
            let (current_version, existing_type) =
                check_stream_version(&mut tx, append.aggregate_id).await?;

            if let Some(existing) = existing_type {
                if existing != append.aggregate_type {
                    rollback(tx).await?;
                    return Err(EventStoreError::AggregateTypeMismatch(format!(
                        "stream aggregate_type is '{existing}', attempted append with '{}'",
                        append.aggregate_type
                    )));
                }
            }
            if !append.expected_version.matches(current_version) {
                rollback(tx).await?;
                return Err(EventStoreError::Concurrency(format!(
                    "stream {}: expected {:?}, found {current_version}",
                    append.aggregate_id, append.expected_version
                )));
            }

            let mut next_sequence = current_version + 1;
            for event in append.events {
                sqlx::query(
                    r#"
                    INSERT INTO events (
                        event_id, aggregate_id, aggregate_type, sequence_number,
                        event_type, event_version, occurred_at, payload
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    "#,
                )
                .bind(event.event_id)
                .bind(event.aggregate_id.as_uuid())
                .bind(&event.aggregate_type)
                .bind(next_sequence as i64)
                .bind(&event.event_type)
                .bind(event.event_version as i32)
                .bind(event.occurred_at)
                .bind(&event.payload)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        EventStoreError::Concurrency(format!(
                            "concurrent append detected: {} #{next_sequence} already exists",
                            event.aggregate_id
                        ))
                    } else {
                        map_sqlx_error("insert_event", e)
                    }
                })?;

                committed.push(StoredEvent {
                    event_id: event.event_id,
                    aggregate_id: event.aggregate_id,
                    aggregate_type: event.aggregate_type,
                    sequence_number: next_sequence,
                    event_type: event.event_type,
                    event_version: event.event_version,
                    occurred_at: event.occurred_at,
                    payload: event.payload,
                });
                next_sequence += 1;
            }
        }

        tx.commit().await.map_err(|e| {
            if is_unique_violation(&e) {
                EventStoreError::Concurrency("concurrent append detected at commit".to_string())
            } else {
                map_sqlx_error("commit_transaction", e)
            }
        })?;

        Span::current().record("committed_events", committed.len());
        Ok(committed)
    }

    fn run<F: Future>(&self, fut: F) -> F::Output {
        if Handle::try_current().is_ok() {
            tokio::task::block_in_place(|| self.runtime.block_on(fut))
        } else {
            self.runtime.block_on(fut)
        }
    }
}

impl EventStore for PostgresEventStore {
    fn append_streams(&self, batch: Vec<StreamAppend>) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.run(self.append_streams_async(batch))
    }

    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.run(self.load_stream_async(aggregate_id))
    }

    fn load_by_type(&self, aggregate_type: &str) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.run(self.load_by_type_async(aggregate_type))
    }
}

/// Current version and aggregate type of a stream (`0`/`None` if absent).
async fn check_stream_version(
    tx: &mut Transaction<'_, Postgres>,
    aggregate_id: AggregateId,
) -> Result<(u64, Option<String>), EventStoreError> {
    let row = sqlx::query(
        r#"
        SELECT
            COALESCE(MAX(sequence_number), 0) AS current_version,
            MAX(aggregate_type) AS aggregate_type
        FROM events
        WHERE aggregate_id = $1
        "#,
    )
    .bind(aggregate_id.as_uuid())
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("check_stream_version", e))?;

    let current_version: i64 = row
        .try_get("current_version")
        .map_err(|e| EventStoreError::Backend(format!("failed to read current_version: {e}")))?;
    let aggregate_type: Option<String> = row
        .try_get("aggregate_type")
        .map_err(|e| EventStoreError::Backend(format!("failed to read aggregate_type: {e}")))?;

    Ok((current_version as u64, aggregate_type))
}

async fn rollback(tx: Transaction<'_, Postgres>) -> Result<(), EventStoreError> {
    tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))
}

fn decode_rows(rows: Vec<sqlx::postgres::PgRow>) -> Result<Vec<StoredEvent>, EventStoreError> {
    rows.iter()
        .map(|row| {
            StoredEventRow::from_row(row)
                .map(StoredEvent::from)
                .map_err(|e| EventStoreError::Backend(format!("failed to read event row: {e}")))
        })
        .collect()
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> EventStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => EventStoreError::Concurrency(msg),
                _ => EventStoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            EventStoreError::Backend(format!("connection pool closed in {operation}"))
        }
        other => EventStoreError::Backend(format!("sqlx error in {operation}: {other}")),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().as_deref() == Some("23505");
    }
    false
}

#[derive(Debug)]
struct StoredEventRow {
    event_id: uuid::Uuid,
    aggregate_id: uuid::Uuid,
    aggregate_type: String,
    sequence_number: i64,
    event_type: String,
    event_version: i32,
    occurred_at: DateTime<Utc>,
    payload: serde_json::Value,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredEventRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredEventRow {
            event_id: row.try_get("event_id")?,
            aggregate_id: row.try_get("aggregate_id")?,
            aggregate_type: row.try_get("aggregate_type")?,
            sequence_number: row.try_get("sequence_number")?,
            event_type: row.try_get("event_type")?,
            event_version: row.try_get("event_version")?,
            occurred_at: row.try_get("occurred_at")?,
            payload: row.try_get("payload")?,
        })
    }
}

impl From<StoredEventRow> for StoredEvent {
    fn from(row: StoredEventRow) -> Self {
        StoredEvent {
            event_id: row.event_id,
            aggregate_id: AggregateId::from_uuid(row.aggregate_id),
            aggregate_type: row.aggregate_type,
            sequence_number: row.sequence_number as u64,
            event_type: row.event_type,
            event_version: row.event_version as u32,
            occurred_at: row.occurred_at,
            payload: row.payload,
        }
    }
}
