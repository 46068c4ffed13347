//! Background housekeeping: the 5-minute purge timer.
//!
//! Evicts expired idempotency records and verification tokens. When a
//! cache is configured, a distributed lock elects one sweeper across
//! processes; the lock is an optimization only, since the purge itself
//! is idempotent. The outbox publisher is a separate process and is not
//! driven from here; it consumes `fleet_store::outbox` directly.

use chrono::Utc;
use sqlx::PgPool;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{ debug, warn };

use fleet_cache::FleetCache;

/// Sweep cadence.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs( 300 );

const SWEEP_LOCK: &str = "housekeeping-sweep";
const SWEEP_LOCK_TTL_MS: u64 = 60_000;

/// Spawn the purge loop. The task runs until the process exits; dropping
/// the handle detaches it.
pub fn spawn_purge_task( pool: PgPool, cache: Option< FleetCache > ) -> JoinHandle< () >
{
  tokio::spawn( async move
  {
    let mut ticker = tokio::time::interval( SWEEP_INTERVAL );
    // The first tick fires immediately; that initial sweep is useful
    // after a restart with a backlog of expired rows.
    loop
    {
      ticker.tick().await;
      sweep_once( &pool, cache.as_ref() ).await;
    }
  } )
}

async fn sweep_once( pool: &PgPool, cache: Option< &FleetCache > )
{
  let guard = match cache
  {
    Some( cache ) => match cache.try_lock( SWEEP_LOCK, SWEEP_LOCK_TTL_MS ).await
    {
      Some( guard ) => Some( guard ),
      None =>
      {
        debug!( "another process holds the sweep lock, skipping" );
        return;
      }
    },
    None => None,
  };

  if let Err( e ) = fleet_store::housekeeping::purge_expired( pool, Utc::now() ).await
  {
    warn!( error = %e, "housekeeping sweep failed" );
  }

  if let ( Some( cache ), Some( guard ) ) = ( cache, guard )
  {
    cache.unlock( guard ).await;
  }
}
