//! Request correlation.
//!
//! Every request gets an id: the incoming `X-Request-ID` header when
//! present, a generated `req_…` otherwise. The id rides the request
//! extensions, appears in every envelope, goes out as a response header,
//! and tags every log line emitted for the request.

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;
use uuid::Uuid;

/// Header name, request and response.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// The correlation id attached to the current request.
#[ derive( Debug, Clone ) ]
pub struct RequestId( String );

impl RequestId
{
  /// Generate a fresh `req_…` id.
  pub fn generate() -> Self
  {
    Self( format!( "req_{}", Uuid::new_v4().simple() ) )
  }

  /// Borrow the id.
  pub fn as_str( &self ) -> &str
  {
    &self.0
  }
}

/// Middleware: attach the id, propagate it, echo it back.
pub async fn request_id_middleware( mut request: Request, next: Next ) -> Response
{
  let id = request
    .headers()
    .get( REQUEST_ID_HEADER )
    .and_then( |v| v.to_str().ok() )
    .filter( |v| !v.is_empty() && v.len() <= 128 )
    .map_or_else( RequestId::generate, |v| RequestId( v.to_string() ) );

  request.extensions_mut().insert( id.clone() );

  let span = tracing::info_span!( "request", request_id = %id.as_str() );
  let mut response = next.run( request ).instrument( span ).await;

  if let Ok( header ) = HeaderValue::from_str( id.as_str() )
  {
    response.headers_mut().insert( REQUEST_ID_HEADER, header );
  }
  response
}

#[ cfg( test ) ]
mod tests
{
  use super::*;

  #[ test ]
  fn generated_ids_carry_prefix_and_differ()
  {
    let a = RequestId::generate();
    let b = RequestId::generate();
    assert!( a.as_str().starts_with( "req_" ) );
    assert_ne!( a.as_str(), b.as_str() );
  }
}
