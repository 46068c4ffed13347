//! Outbox / inbox / dead-letter storage.
//!
//! Outbox rows are appended inside the same transaction as the state
//! change they describe. The publisher that drains them lives outside
//! this backend; it consumes `fetch_unpublished` in order and calls
//! `mark_published` / `dead_letter` per row.

use chrono::{ DateTime, Utc };
use sqlx::{ PgConnection, Row };
use uuid::Uuid;

use crate::error::map_db_err;
use fleet_types::{ DlqMessage, OutboxEvent, Result };

/// Append an event. Call inside the mutating transaction.
pub async fn append( conn: &mut PgConnection, event: &OutboxEvent ) -> Result< () >
{
  sqlx::query(
    "INSERT INTO outbox_events (id, aggregate_type, aggregate_id, event_type, payload)
     VALUES ($1, $2, $3, $4, $5)",
  )
  .bind( event.id )
  .bind( &event.aggregate_type )
  .bind( event.aggregate_id )
  .bind( &event.event_type )
  .bind( &event.payload )
  .execute( conn )
  .await
  .map_err( map_db_err )?;
  Ok( () )
}

/// Unpublished events in per-aggregate insertion order, up to `limit`.
pub async fn fetch_unpublished( conn: &mut PgConnection, limit: i64 ) -> Result< Vec< OutboxEvent > >
{
  let rows = sqlx::query(
    "SELECT id, aggregate_type, aggregate_id, event_type, payload, created_at, published_at
       FROM outbox_events
      WHERE published_at IS NULL
      ORDER BY aggregate_type, aggregate_id, created_at
      LIMIT $1",
  )
  .bind( limit )
  .fetch_all( conn )
  .await
  .map_err( map_db_err )?;

  Ok( rows.iter().map( |row| OutboxEvent
  {
    id: row.get( "id" ),
    aggregate_type: row.get( "aggregate_type" ),
    aggregate_id: row.get( "aggregate_id" ),
    event_type: row.get( "event_type" ),
    payload: row.get( "payload" ),
    created_at: row.get( "created_at" ),
    published_at: row.get( "published_at" ),
  } ).collect() )
}

/// Stamp an event as delivered.
pub async fn mark_published( conn: &mut PgConnection, event_id: Uuid, at: DateTime< Utc > ) -> Result< () >
{
  sqlx::query( "UPDATE outbox_events SET published_at = $1 WHERE id = $2" )
    .bind( at )
    .bind( event_id )
    .execute( conn )
    .await
    .map_err( map_db_err )?;
  Ok( () )
}

/// Record a delivery the publisher gave up on.
pub async fn dead_letter( conn: &mut PgConnection, message: &DlqMessage ) -> Result< () >
{
  sqlx::query(
    "INSERT INTO dlq_messages (id, outbox_event_id, failure_reason, attempts, failed_at)
     VALUES ($1, $2, $3, $4, $5)",
  )
  .bind( message.id )
  .bind( message.outbox_event_id )
  .bind( &message.failure_reason )
  .bind( message.attempts )
  .bind( message.failed_at )
  .execute( conn )
  .await
  .map_err( map_db_err )?;
  Ok( () )
}

/// Record a consumed message; `false` when `(message_id, consumer_group)`
/// was already processed and the caller should skip the message.
pub async fn inbox_mark_processed(
  conn: &mut PgConnection,
  message_id: Uuid,
  consumer_group: &str,
) -> Result< bool >
{
  let result = sqlx::query(
    "INSERT INTO inbox_processed_messages (message_id, consumer_group)
     VALUES ($1, $2)
     ON CONFLICT (message_id, consumer_group) DO NOTHING",
  )
  .bind( message_id )
  .bind( consumer_group )
  .execute( conn )
  .await
  .map_err( map_db_err )?;

  Ok( result.rows_affected() > 0 )
}
