//! # `fleet_cache`
//!
//! Redis-backed soft state: cache-aside for hot vehicle reads and a
//! simple ownership-checked distributed lock.
//!
//! The cache is never authoritative. Writes are fire-and-forget, there is
//! no proactive invalidation, and correctness under racing writers comes
//! from the optimistic-locking version columns in storage: a stale read
//! that loses the version race gets `OPTIMISTIC_LOCK_FAILURE` and retries
//! after a fresh read.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{ debug, warn };
use uuid::Uuid;

use fleet_types::Vehicle;

/// Cache TTL for vehicle bodies.
pub const VEHICLE_TTL_SECS: u64 = 300;

/// Shared cache handle. Cheap to clone; all operations are best-effort.
#[ derive( Clone ) ]
pub struct FleetCache
{
  manager: ConnectionManager,
}

impl core::fmt::Debug for FleetCache
{
  fn fmt( &self, f: &mut core::fmt::Formatter< '_ > ) -> core::fmt::Result
  {
    f.debug_struct( "FleetCache" ).finish_non_exhaustive()
  }
}

fn vehicle_key( id: Uuid ) -> String
{
  format!( "vehicle:{id}" )
}

impl FleetCache
{
  /// Connect to Redis. Fails only when the URL itself is malformed; a
  /// server that is down degrades every operation to a miss instead.
  ///
  /// # Errors
  ///
  /// Returns the underlying `redis` error for an unusable URL.
  pub async fn connect( redis_url: &str ) -> Result< Self, redis::RedisError >
  {
    let client = redis::Client::open( redis_url )?;
    let manager = ConnectionManager::new( client ).await?;
    Ok( Self { manager } )
  }

  /// Cache-aside read: `Some(vehicle)` on a hit, `None` on a miss or any
  /// cache failure.
  pub async fn get_vehicle( &self, id: Uuid ) -> Option< Vehicle >
  {
    let mut conn = self.manager.clone();
    let cached: Option< String > = match conn.get( vehicle_key( id ) ).await
    {
      Ok( value ) => value,
      Err( e ) =>
      {
        warn!( vehicle = %id, error = %e, "cache read failed, treating as miss" );
        return None;
      }
    };

    cached.and_then( |body| match serde_json::from_str( &body )
    {
      Ok( vehicle ) => Some( vehicle ),
      Err( e ) =>
      {
        warn!( vehicle = %id, error = %e, "cached vehicle body undecodable, ignoring" );
        None
      }
    } )
  }

  /// Fire-and-forget population after a storage read.
  pub async fn put_vehicle( &self, vehicle: &Vehicle )
  {
    let Ok( body ) = serde_json::to_string( vehicle ) else { return };
    let mut conn = self.manager.clone();
    let outcome: Result< (), redis::RedisError > =
      conn.set_ex( vehicle_key( vehicle.id ), body, VEHICLE_TTL_SECS ).await;
    if let Err( e ) = outcome
    {
      debug!( vehicle = %vehicle.id, error = %e, "cache write dropped" );
    }
  }

  /// Acquire `name` for `ttl_ms`. Returns a guard token on success, or
  /// `None` when another holder owns the lock (or the cache is down —
  /// callers must treat the lock as an optimization, not a guarantee).
  pub async fn try_lock( &self, name: &str, ttl_ms: u64 ) -> Option< LockGuard >
  {
    let token = Uuid::new_v4().to_string();
    let mut conn = self.manager.clone();

    let outcome: Result< Option< String >, redis::RedisError > = redis::cmd( "SET" )
      .arg( format!( "lock:{name}" ) )
      .arg( &token )
      .arg( "NX" )
      .arg( "PX" )
      .arg( ttl_ms )
      .query_async( &mut conn )
      .await;

    match outcome
    {
      Ok( Some( _ ) ) => Some( LockGuard { name: name.to_string(), token } ),
      Ok( None ) => None,
      Err( e ) =>
      {
        warn!( lock = name, error = %e, "lock acquisition failed" );
        None
      }
    }
  }

  /// Release a held lock. Ownership-checked: a guard whose TTL lapsed and
  /// whose lock was re-acquired by someone else deletes nothing.
  pub async fn unlock( &self, guard: LockGuard )
  {
    const RELEASE_SCRIPT: &str =
      "if redis.call('get', KEYS[1]) == ARGV[1] then \
         return redis.call('del', KEYS[1]) \
       else \
         return 0 \
       end";

    let mut conn = self.manager.clone();
    let outcome: Result< i64, redis::RedisError > = redis::Script::new( RELEASE_SCRIPT )
      .key( format!( "lock:{}", guard.name ) )
      .arg( &guard.token )
      .invoke_async( &mut conn )
      .await;

    if let Err( e ) = outcome
    {
      debug!( lock = %guard.name, error = %e, "lock release failed, TTL will expire it" );
    }
  }
}

/// Proof of lock ownership; pass back to [`FleetCache::unlock`].
#[ derive( Debug ) ]
pub struct LockGuard
{
  name: String,
  token: String,
}
