//! Idempotency middleware for designated non-safe routes.
//!
//! Three cases per the contract:
//!
//! 1. Unknown key: reserve it, run the handler, store status+body.
//! 2. Known key with a stored response: replay it verbatim; the handler
//!    never runs.
//! 3. Known key still in progress: `409 REQUEST_IN_PROGRESS`.
//!
//! Because duplicates may race, reservation rides the primary key: the
//! loser of the insert race reads the winner's row and lands in case 2
//! or 3. A key reused with a different body or route is a plain 409.

use axum::body::{ to_bytes, Body };
use axum::extract::{ Request, State };
use axum::http::{ header, HeaderValue, StatusCode };
use axum::middleware::Next;
use axum::response::{ IntoResponse, Response };
use chrono::Utc;
use sha2::{ Digest, Sha256 };

use crate::envelope::ApiFailure;
use crate::request_id::RequestId;
use crate::state::AppState;
use fleet_store::idempotency::{ self, ReserveOutcome };
use fleet_store::map_db_err;
use fleet_types::{ FieldViolation, FleetError, IdempotencyRecord };

/// Request header carrying the client's key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

const MAX_BODY_BYTES: usize = 1024 * 1024;

fn request_id_of( extensions: &axum::http::Extensions ) -> RequestId
{
  extensions.get::< RequestId >().cloned().unwrap_or_else( RequestId::generate )
}

fn replay( record: &IdempotencyRecord ) -> Response
{
  let status = record
    .response_status
    .and_then( |s| StatusCode::from_u16( u16::try_from( s ).unwrap_or( 500 ) ).ok() )
    .unwrap_or( StatusCode::INTERNAL_SERVER_ERROR );
  let body = record.response_body.clone().unwrap_or_default();

  let mut response = Response::new( Body::from( body ) );
  *response.status_mut() = status;
  response
    .headers_mut()
    .insert( header::CONTENT_TYPE, HeaderValue::from_static( "application/json" ) );
  response
}

/// Persist or release the reservation after the handler ran.
/// `Some((status, body))` finalizes; `None` releases the key so the
/// client's retry starts fresh. Storage trouble here is logged, never
/// surfaced: the handler's response already happened.
async fn store_outcome( state: &AppState, key: &str, response: Option< ( i32, String ) > )
{
  let result = async
  {
    let mut conn = state.pool.acquire().await.map_err( map_db_err )?;
    match response
    {
      Some( ( status, body ) ) => idempotency::finalize( &mut *conn, key, status, &body ).await,
      None => idempotency::release( &mut *conn, key ).await,
    }
  }
  .await;

  if let Err( e ) = result
  {
    tracing::error!( key, error = %e, "failed to store idempotency outcome" );
  }
}

/// The middleware. Applied only to routes the API declares idempotent,
/// currently payment capture.
pub async fn idempotency_middleware(
  State( state ): State< AppState >,
  request: Request,
  next: Next,
) -> Response
{
  let request_id = request_id_of( request.extensions() );

  let Some( key ) = request
    .headers()
    .get( IDEMPOTENCY_KEY_HEADER )
    .and_then( |v| v.to_str().ok() )
    .filter( |v| !v.is_empty() && v.len() <= 255 )
    .map( str::to_string )
  else
  {
    let err = FleetError::validation_fields(
      "Idempotency-Key header is required on this route",
      vec![ FieldViolation::new( "Idempotency-Key", "required" ) ],
    );
    return ApiFailure::from_error( &err, &request_id ).into_response();
  };

  let ( parts, body ) = request.into_parts();
  let body_bytes = match to_bytes( body, MAX_BODY_BYTES ).await
  {
    Ok( bytes ) => bytes,
    Err( _ ) =>
    {
      let err = FleetError::validation( "request body too large" );
      return ApiFailure::from_error( &err, &request_id ).into_response();
    }
  };

  let fingerprint = hex::encode( Sha256::digest( &body_bytes ) );
  let path = parts.uri.path().to_string();
  let method = parts.method.to_string();
  let expires_at = IdempotencyRecord::expiry_for( Utc::now(), state.idempotency_ttl_minutes );

  // Scoped acquire: the connection goes back to the pool before the
  // handler runs, which needs connections of its own.
  let outcome =
  {
    let mut conn = match state.pool.acquire().await
    {
      Ok( conn ) => conn,
      Err( e ) => return ApiFailure::from_error( &map_db_err( e ), &request_id ).into_response(),
    };
    idempotency::reserve( &mut *conn, &key, &path, &method, Some( &fingerprint ), expires_at ).await
  };

  match outcome
  {
    Err( e ) => ApiFailure::from_error( &e, &request_id ).into_response(),

    Ok( ReserveOutcome::Existing( record ) ) =>
    {
      if record.method != method || record.path != path
        || record.request_fingerprint.as_deref() != Some( fingerprint.as_str() )
      {
        let err = FleetError::Conflict(
          "idempotency key was already used for a different request".to_string(),
        );
        return ApiFailure::from_error( &err, &request_id ).into_response();
      }

      if record.is_finalized()
      {
        tracing::debug!( request_id = request_id.as_str(), key = %key, "idempotent replay" );
        replay( &record )
      }
      else
      {
        let err = FleetError::RequestInProgress( format!(
          "request with idempotency key {key} is still being processed"
        ) );
        ApiFailure::from_error( &err, &request_id ).into_response()
      }
    }

    Ok( ReserveOutcome::Reserved ) =>
    {
      let request = Request::from_parts( parts, Body::from( body_bytes ) );
      let response = next.run( request ).await;

      let ( response_parts, response_body ) = response.into_parts();
      let response_bytes = match to_bytes( response_body, MAX_BODY_BYTES ).await
      {
        Ok( bytes ) => bytes,
        Err( e ) =>
        {
          store_outcome( &state, &key, None ).await;
          let err = FleetError::Internal( format!( "response buffering failed: {e}" ) );
          return ApiFailure::from_error( &err, &request_id ).into_response();
        }
      };

      let status = response_parts.status;
      if status.is_server_error()
      {
        // Do not pin a transient failure to the key; the client's retry
        // should reach the handler again.
        store_outcome( &state, &key, None ).await;
      }
      else
      {
        let body_str = String::from_utf8_lossy( &response_bytes ).to_string();
        store_outcome( &state, &key, Some( ( status.as_u16().into(), body_str ) ) ).await;
      }

      Response::from_parts( response_parts, Body::from( response_bytes ) )
    }
  }
}
