//! Idempotency-record storage.
//!
//! Two duplicates may arrive in flight, so the reservation insert relies
//! on the primary key: the second concurrent inserter sees the conflict,
//! reads the reservation back, and the middleware then either replays the
//! stored response or reports the request as still in progress.

use chrono::{ DateTime, Utc };
use sqlx::{ PgConnection, Row };

use crate::error::map_db_err;
use fleet_types::{ IdempotencyRecord, Result };

/// Outcome of attempting to reserve a key.
#[ derive( Debug ) ]
pub enum ReserveOutcome
{
  /// This request is first; proceed to the handler.
  Reserved,
  /// The key already exists; the existing record is returned.
  Existing( IdempotencyRecord ),
}

fn from_row( row: &sqlx::postgres::PgRow ) -> IdempotencyRecord
{
  IdempotencyRecord
  {
    key: row.get( "key" ),
    path: row.get( "path" ),
    method: row.get( "method" ),
    request_fingerprint: row.get( "request_fingerprint" ),
    response_status: row.get( "response_status" ),
    response_body: row.get( "response_body" ),
    created_at: row.get( "created_at" ),
    expires_at: row.get( "expires_at" ),
  }
}

/// Try to reserve `key` for this request.
pub async fn reserve(
  conn: &mut PgConnection,
  key: &str,
  path: &str,
  method: &str,
  request_fingerprint: Option< &str >,
  expires_at: DateTime< Utc >,
) -> Result< ReserveOutcome >
{
  let inserted = sqlx::query(
    "INSERT INTO idempotency_keys (key, path, method, request_fingerprint, expires_at)
     VALUES ($1, $2, $3, $4, $5)
     ON CONFLICT (key) DO NOTHING",
  )
  .bind( key )
  .bind( path )
  .bind( method )
  .bind( request_fingerprint )
  .bind( expires_at )
  .execute( &mut *conn )
  .await
  .map_err( map_db_err )?;

  if inserted.rows_affected() > 0
  {
    return Ok( ReserveOutcome::Reserved );
  }

  let row = sqlx::query(
    "SELECT key, path, method, request_fingerprint, response_status, response_body,
            created_at, expires_at
       FROM idempotency_keys WHERE key = $1",
  )
  .bind( key )
  .fetch_one( conn )
  .await
  .map_err( map_db_err )?;

  Ok( ReserveOutcome::Existing( from_row( &row ) ) )
}

/// Store the handler's response against a reserved key.
pub async fn finalize(
  conn: &mut PgConnection,
  key: &str,
  response_status: i32,
  response_body: &str,
) -> Result< () >
{
  sqlx::query(
    "UPDATE idempotency_keys
        SET response_status = $1, response_body = $2
      WHERE key = $3",
  )
  .bind( response_status )
  .bind( response_body )
  .bind( key )
  .execute( conn )
  .await
  .map_err( map_db_err )?;
  Ok( () )
}

/// Drop a reservation whose handler failed before producing a response,
/// so the client's retry starts fresh.
pub async fn release( conn: &mut PgConnection, key: &str ) -> Result< () >
{
  sqlx::query( "DELETE FROM idempotency_keys WHERE key = $1 AND response_status IS NULL" )
    .bind( key )
    .execute( conn )
    .await
    .map_err( map_db_err )?;
  Ok( () )
}

/// Delete every record past its expiry. Returns the number evicted.
pub async fn purge_expired( conn: &mut PgConnection, now: DateTime< Utc > ) -> Result< u64 >
{
  let result = sqlx::query( "DELETE FROM idempotency_keys WHERE expires_at < $1" )
    .bind( now )
    .execute( conn )
    .await
    .map_err( map_db_err )?;
  Ok( result.rows_affected() )
}
