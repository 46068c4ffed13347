//! Liveness surface.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Extension;
use serde_json::json;

use crate::envelope::{ success, ApiResult };
use crate::request_id::RequestId;
use crate::state::AppState;

/// GET /health — liveness plus a database round-trip.
pub async fn health(
  State( state ): State< AppState >,
  Extension( request_id ): Extension< RequestId >,
) -> ApiResult
{
  let database = match sqlx::query_scalar::< _, i32 >( "SELECT 1" ).fetch_one( &state.pool ).await
  {
    Ok( _ ) => "up",
    Err( _ ) => "down",
  };

  Ok( success(
    StatusCode::OK,
    &request_id,
    json!( { "status": "ok", "database": database } ),
  ) )
}

/// GET / — service banner.
pub async fn root( Extension( request_id ): Extension< RequestId > ) -> ApiResult
{
  Ok( success(
    StatusCode::OK,
    &request_id,
    json!( { "service": "fleet-backend", "version": env!( "CARGO_PKG_VERSION" ) } ),
  ) )
}
