//! Process-wide application state.
//!
//! All shared services (pool, engines, verifier, limiter, cache) are
//! constructed once at startup and injected into handlers through this
//! state; nothing reaches for ambient globals.

use axum::extract::Request;
use sqlx::PgPool;
use std::sync::Arc;

use crate::jwt_auth::JwtVerifier;
use crate::rate_limit::RateLimiter;
use fleet_cache::FleetCache;
use fleet_ops::{ BillingEngine, MaintenanceEngine, RentalEngine, VehicleEngine };

/// Combined application state handed to every route.
#[ derive( Debug, Clone ) ]
pub struct AppState
{
  /// Shared connection pool (direct reads, idempotency middleware).
  pub pool: PgPool,
  /// Vehicle inventory use-cases.
  pub vehicles: VehicleEngine,
  /// Rental lifecycle use-cases.
  pub rentals: RentalEngine,
  /// Maintenance use-cases.
  pub maintenance: MaintenanceEngine,
  /// Invoicing and payment capture.
  pub billing: BillingEngine,
  /// Optional cache; absent when no `REDIS_URL` is configured.
  pub cache: Option< FleetCache >,
  /// Token issuer/verifier.
  pub jwt: Arc< JwtVerifier >,
  /// Shared rate-limit buckets.
  pub limiter: Arc< RateLimiter >,
  /// Idempotency record TTL, minutes.
  pub idempotency_ttl_minutes: i64,
}

impl AppState
{
  /// Assemble state over a connected pool.
  #[ must_use ]
  pub fn new(
    pool: PgPool,
    cache: Option< FleetCache >,
    jwt: JwtVerifier,
    idempotency_ttl_minutes: i64,
  ) -> Self
  {
    Self
    {
      vehicles: VehicleEngine::new( pool.clone() ),
      rentals: RentalEngine::new( pool.clone() ),
      maintenance: MaintenanceEngine::new( pool.clone() ),
      billing: BillingEngine::new( pool.clone() ),
      pool,
      cache,
      jwt: Arc::new( jwt ),
      limiter: Arc::new( RateLimiter::new() ),
      idempotency_ttl_minutes,
    }
  }

  /// Verified bearer subject of a request, if any. Used to key the
  /// authenticated rate-limit class by user rather than by IP.
  pub fn bearer_subject( &self, request: &Request ) -> Option< String >
  {
    let token = request
      .headers()
      .get( axum::http::header::AUTHORIZATION )?
      .to_str()
      .ok()?
      .strip_prefix( "Bearer " )?;
    self.jwt.verify( token ).ok().map( |claims| claims.sub )
  }
}
