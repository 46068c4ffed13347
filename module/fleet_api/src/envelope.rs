//! Uniform response envelope and the error translator.
//!
//! Every body leaving this API is one of:
//!
//! ```json
//! { "success": true, "data": ..., "requestId": "req_..." }
//! { "success": false, "error": { "code": "...", "message": "...", "details": [...] }, "requestId": "req_..." }
//! ```

use axum::http::StatusCode;
use axum::response::{ IntoResponse, Response };
use axum::Json;
use serde::Serialize;
use serde_json::json;

use crate::request_id::RequestId;
use fleet_types::FleetError;

/// Build a success envelope.
pub fn success< T: Serialize >( status: StatusCode, request_id: &RequestId, data: T ) -> Response
{
  (
    status,
    Json( json!( {
      "success": true,
      "data": data,
      "requestId": request_id.as_str(),
    } ) ),
  )
    .into_response()
}

/// A translated failure, ready to serialize.
#[ derive( Debug ) ]
pub struct ApiFailure
{
  status: StatusCode,
  code: &'static str,
  message: String,
  details: serde_json::Value,
  request_id: String,
}

impl ApiFailure
{
  /// Translate a domain error under the taxonomy of the API contract.
  ///
  /// 5xx-class details never leak: the client sees a generic message and
  /// the specifics go to the log under the request id.
  pub fn from_error( err: &FleetError, request_id: &RequestId ) -> Self
  {
    let ( status, message, details ) = match err
    {
      FleetError::Validation { message, details } => (
        StatusCode::UNPROCESSABLE_ENTITY,
        message.clone(),
        serde_json::to_value( details ).unwrap_or( serde_json::Value::Null ),
      ),
      FleetError::NotFound( m ) => ( StatusCode::NOT_FOUND, m.clone(), serde_json::Value::Null ),
      FleetError::Unauthenticated( m ) =>
        ( StatusCode::UNAUTHORIZED, m.clone(), serde_json::Value::Null ),
      FleetError::Forbidden( m ) => ( StatusCode::FORBIDDEN, m.clone(), serde_json::Value::Null ),
      FleetError::Conflict( m ) => ( StatusCode::CONFLICT, m.clone(), serde_json::Value::Null ),
      FleetError::RentalConflict( m ) => ( StatusCode::CONFLICT, m.clone(), serde_json::Value::Null ),
      FleetError::InvalidState( m ) => ( StatusCode::CONFLICT, m.clone(), serde_json::Value::Null ),
      FleetError::InvalidMileage( m ) =>
        ( StatusCode::UNPROCESSABLE_ENTITY, m.clone(), serde_json::Value::Null ),
      FleetError::OptimisticLock( m ) => ( StatusCode::CONFLICT, m.clone(), serde_json::Value::Null ),
      FleetError::RequestInProgress( m ) =>
        ( StatusCode::CONFLICT, m.clone(), serde_json::Value::Null ),
      FleetError::RateLimited { retry_after_secs } => (
        StatusCode::TOO_MANY_REQUESTS,
        format!( "rate limit exceeded, retry in {retry_after_secs}s" ),
        json!( { "retryAfterSecs": retry_after_secs } ),
      ),
      FleetError::Database( internal ) =>
      {
        tracing::error!( request_id = request_id.as_str(), error = %internal, "database failure" );
        (
          StatusCode::INTERNAL_SERVER_ERROR,
          "an internal error occurred".to_string(),
          serde_json::Value::Null,
        )
      }
      FleetError::Internal( internal ) =>
      {
        tracing::error!( request_id = request_id.as_str(), error = %internal, "internal failure" );
        (
          StatusCode::INTERNAL_SERVER_ERROR,
          "an internal error occurred".to_string(),
          serde_json::Value::Null,
        )
      }
    };

    Self
    {
      status,
      code: err.code(),
      message,
      details,
      request_id: request_id.as_str().to_string(),
    }
  }

  /// The HTTP status this failure maps to.
  pub fn status( &self ) -> StatusCode
  {
    self.status
  }
}

impl IntoResponse for ApiFailure
{
  fn into_response( self ) -> Response
  {
    let mut error = json!( {
      "code": self.code,
      "message": self.message,
    } );
    if !self.details.is_null()
    {
      error[ "details" ] = self.details;
    }

    (
      self.status,
      Json( json!( {
        "success": false,
        "error": error,
        "requestId": self.request_id,
      } ) ),
    )
      .into_response()
  }
}

/// Handler result alias: success envelope or translated failure.
pub type ApiResult = core::result::Result< Response, ApiFailure >;

/// Shorthand used throughout the route handlers.
pub fn fail( err: &FleetError, request_id: &RequestId ) -> ApiFailure
{
  ApiFailure::from_error( err, request_id )
}

#[ cfg( test ) ]
mod tests
{
  use super::*;

  #[ test ]
  fn status_mapping_follows_taxonomy()
  {
    let rid = RequestId::generate();
    let cases: Vec< ( FleetError, StatusCode ) > = vec![
      ( FleetError::validation( "x" ), StatusCode::UNPROCESSABLE_ENTITY ),
      ( FleetError::NotFound( "x".into() ), StatusCode::NOT_FOUND ),
      ( FleetError::Unauthenticated( "x".into() ), StatusCode::UNAUTHORIZED ),
      ( FleetError::Forbidden( "x".into() ), StatusCode::FORBIDDEN ),
      ( FleetError::RentalConflict( "x".into() ), StatusCode::CONFLICT ),
      ( FleetError::InvalidState( "x".into() ), StatusCode::CONFLICT ),
      ( FleetError::InvalidMileage( "x".into() ), StatusCode::UNPROCESSABLE_ENTITY ),
      ( FleetError::OptimisticLock( "x".into() ), StatusCode::CONFLICT ),
      ( FleetError::RequestInProgress( "x".into() ), StatusCode::CONFLICT ),
      ( FleetError::RateLimited { retry_after_secs: 5 }, StatusCode::TOO_MANY_REQUESTS ),
      ( FleetError::Database( "boom".into() ), StatusCode::INTERNAL_SERVER_ERROR ),
      ( FleetError::Internal( "boom".into() ), StatusCode::INTERNAL_SERVER_ERROR ),
    ];

    for ( err, expected ) in cases
    {
      assert_eq!( ApiFailure::from_error( &err, &rid ).status(), expected, "{err:?}" );
    }
  }

  #[ test ]
  fn internal_details_do_not_leak()
  {
    let rid = RequestId::generate();
    let failure = ApiFailure::from_error( &FleetError::Database( "password=hunter2".into() ), &rid );
    assert_eq!( failure.message, "an internal error occurred" );
  }
}
