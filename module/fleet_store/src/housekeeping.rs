//! Periodic purge queries, driven by the application's timer task.

use chrono::{ DateTime, Utc };
use sqlx::PgPool;
use tracing::info;

use crate::error::map_db_err;
use crate::idempotency;
use fleet_types::Result;

/// One sweep: evict expired idempotency records and verification tokens.
///
/// Returns (idempotency rows, verification tokens) evicted.
pub async fn purge_expired( pool: &PgPool, now: DateTime< Utc > ) -> Result< ( u64, u64 ) >
{
  let mut conn = pool.acquire().await.map_err( map_db_err )?;

  let idempotency_evicted = idempotency::purge_expired( &mut *conn, now ).await?;

  let tokens = sqlx::query( "DELETE FROM verification_tokens WHERE expires_at < $1" )
    .bind( now )
    .execute( &mut *conn )
    .await
    .map_err( map_db_err )?
    .rows_affected();

  if idempotency_evicted > 0 || tokens > 0
  {
    info!( idempotency_evicted, verification_tokens_evicted = tokens, "housekeeping sweep" );
  }

  Ok( ( idempotency_evicted, tokens ) )
}
