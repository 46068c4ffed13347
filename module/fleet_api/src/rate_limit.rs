//! Layered rate limiting.
//!
//! Four route classes, each a sliding one-minute window:
//!
//! - `public_api`: 100 req/min keyed by client IP
//! - `auth_strict`: 5 req/min keyed by client IP (login, register)
//! - `authenticated_api`: 500 req/min keyed by user id, IP fallback
//! - `global`: 5 req/min per IP safety net on unclassified routes
//!
//! Buckets are in-process. A single actor cannot dramatically exceed its
//! quota on one process; strict cross-process accuracy is explicitly not
//! a goal of the design.

use axum::extract::{ ConnectInfo, Request, State };
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{ IntoResponse, Response };
use dashmap::DashMap;
use std::net::{ IpAddr, Ipv4Addr, SocketAddr };
use std::time::{ Duration, Instant };

use crate::envelope::ApiFailure;
use crate::request_id::RequestId;
use crate::state::AppState;
use fleet_types::FleetError;

const WINDOW: Duration = Duration::from_secs( 60 );

/// Route classes and their per-minute quotas.
#[ derive( Debug, Clone, Copy, PartialEq, Eq ) ]
pub enum RouteClass
{
  /// Unauthenticated read surface.
  PublicApi,
  /// Credential endpoints.
  AuthStrict,
  /// Everything behind a bearer token.
  AuthenticatedApi,
  /// Safety net for unclassified routes.
  Global,
}

impl RouteClass
{
  fn limit( self ) -> usize
  {
    match self
    {
      Self::PublicApi => 100,
      Self::AuthStrict => 5,
      Self::AuthenticatedApi => 500,
      Self::Global => 5,
    }
  }

  fn prefix( self ) -> &'static str
  {
    match self
    {
      Self::PublicApi => "public",
      Self::AuthStrict => "auth",
      Self::AuthenticatedApi => "authed",
      Self::Global => "global",
    }
  }
}

/// Result of consulting a bucket.
#[ derive( Debug, Clone, Copy ) ]
pub struct Decision
{
  /// Whether the request may proceed.
  pub allowed: bool,
  /// Bucket quota.
  pub limit: usize,
  /// Requests left in the current window.
  pub remaining: usize,
  /// Seconds until the window frees a slot.
  pub reset_secs: u64,
}

/// Sliding-window limiter shared across all route classes.
#[ derive( Debug, Default ) ]
pub struct RateLimiter
{
  buckets: DashMap< String, Vec< Instant > >,
}

impl RateLimiter
{
  /// Create an empty limiter.
  #[ must_use ]
  pub fn new() -> Self
  {
    Self { buckets: DashMap::new() }
  }

  /// Check-and-record one request against `key` in `class`.
  pub fn check( &self, class: RouteClass, key: &str ) -> Decision
  {
    let now = Instant::now();
    let limit = class.limit();
    let bucket_key = format!( "{}:{key}", class.prefix() );

    let mut bucket = self.buckets.entry( bucket_key ).or_default();
    bucket.retain( |at| now.duration_since( *at ) < WINDOW );

    if bucket.len() >= limit
    {
      let reset_secs = bucket
        .first()
        .map( |oldest| WINDOW.saturating_sub( now.duration_since( *oldest ) ).as_secs().max( 1 ) )
        .unwrap_or( 1 );
      return Decision { allowed: false, limit, remaining: 0, reset_secs };
    }

    bucket.push( now );
    Decision
    {
      allowed: true,
      limit,
      remaining: limit - bucket.len(),
      reset_secs: WINDOW.as_secs(),
    }
  }
}

/// Client IP: the TCP peer address when the server provides it, loopback
/// in test harnesses that drive the router directly.
fn client_ip( request: &Request ) -> IpAddr
{
  request
    .extensions()
    .get::< ConnectInfo< SocketAddr > >()
    .map_or( IpAddr::V4( Ipv4Addr::LOCALHOST ), |info| info.0.ip() )
}

fn request_id_of( request: &Request ) -> RequestId
{
  request.extensions().get::< RequestId >().cloned().unwrap_or_else( RequestId::generate )
}

fn apply_headers( response: &mut Response, decision: Decision )
{
  let headers = response.headers_mut();
  headers.insert( "x-ratelimit-limit", HeaderValue::from( decision.limit ) );
  headers.insert( "x-ratelimit-remaining", HeaderValue::from( decision.remaining ) );
  headers.insert( "x-ratelimit-reset", HeaderValue::from( decision.reset_secs ) );
}

async fn limit_by_class( state: AppState, class: RouteClass, request: Request, next: Next ) -> Response
{
  let key = match class
  {
    // The authenticated class prefers the verified principal, falling
    // back to the peer IP for requests that will fail auth anyway.
    RouteClass::AuthenticatedApi => state
      .bearer_subject( &request )
      .unwrap_or_else( || client_ip( &request ).to_string() ),
    _ => client_ip( &request ).to_string(),
  };

  let decision = state.limiter.check( class, &key );

  if !decision.allowed
  {
    let request_id = request_id_of( &request );
    tracing::warn!(
      request_id = request_id.as_str(),
      class = ?class,
      key = %key,
      retry_after_secs = decision.reset_secs,
      "rate limit exceeded"
    );
    let err = FleetError::RateLimited { retry_after_secs: decision.reset_secs };
    let mut response = ApiFailure::from_error( &err, &request_id ).into_response();
    apply_headers( &mut response, decision );
    return response;
  }

  let mut response = next.run( request ).await;
  apply_headers( &mut response, decision );
  response
}

/// `public_api` class middleware.
pub async fn public_api( State( state ): State< AppState >, request: Request, next: Next ) -> Response
{
  limit_by_class( state, RouteClass::PublicApi, request, next ).await
}

/// `auth_strict` class middleware.
pub async fn auth_strict( State( state ): State< AppState >, request: Request, next: Next ) -> Response
{
  limit_by_class( state, RouteClass::AuthStrict, request, next ).await
}

/// `authenticated_api` class middleware.
pub async fn authenticated_api(
  State( state ): State< AppState >,
  request: Request,
  next: Next,
) -> Response
{
  limit_by_class( state, RouteClass::AuthenticatedApi, request, next ).await
}

/// Global safety-net middleware for unclassified routes.
pub async fn global( State( state ): State< AppState >, request: Request, next: Next ) -> Response
{
  limit_by_class( state, RouteClass::Global, request, next ).await
}

#[ cfg( test ) ]
mod tests
{
  use super::*;

  #[ test ]
  fn auth_strict_blocks_sixth_attempt()
  {
    let limiter = RateLimiter::new();
    for _ in 0..5
    {
      assert!( limiter.check( RouteClass::AuthStrict, "10.0.0.1" ).allowed );
    }
    let decision = limiter.check( RouteClass::AuthStrict, "10.0.0.1" );
    assert!( !decision.allowed );
    assert_eq!( decision.remaining, 0 );
    assert!( decision.reset_secs >= 1 );
  }

  #[ test ]
  fn keys_are_isolated()
  {
    let limiter = RateLimiter::new();
    for _ in 0..5
    {
      limiter.check( RouteClass::AuthStrict, "10.0.0.1" );
    }
    assert!( !limiter.check( RouteClass::AuthStrict, "10.0.0.1" ).allowed );
    assert!( limiter.check( RouteClass::AuthStrict, "10.0.0.2" ).allowed );
  }

  #[ test ]
  fn classes_are_isolated()
  {
    let limiter = RateLimiter::new();
    for _ in 0..5
    {
      limiter.check( RouteClass::Global, "10.0.0.9" );
    }
    assert!( !limiter.check( RouteClass::Global, "10.0.0.9" ).allowed );
    // Same key in a wider class still has headroom.
    assert!( limiter.check( RouteClass::PublicApi, "10.0.0.9" ).allowed );
  }

  #[ test ]
  fn remaining_counts_down()
  {
    let limiter = RateLimiter::new();
    let first = limiter.check( RouteClass::PublicApi, "k" );
    let second = limiter.check( RouteClass::PublicApi, "k" );
    assert_eq!( first.remaining, 99 );
    assert_eq!( second.remaining, 98 );
  }
}
