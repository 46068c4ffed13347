//! Rental endpoints.

use axum::extract::{ Path, Query, State };
use axum::http::StatusCode;
use axum::{ Extension, Json };
use chrono::{ DateTime, Utc };
use serde::Deserialize;
use uuid::Uuid;

use crate::envelope::{ fail, success, ApiResult };
use crate::jwt_auth::AuthenticatedUser;
use crate::request_id::RequestId;
use crate::state::AppState;
use fleet_types::{ FieldViolation, FleetError, RentalStatus, Role };

/// Create-rental request body.
#[ derive( Debug, Deserialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct CreateRentalRequest
{
  /// Vehicle to book.
  pub vehicle_id: Uuid,
  /// Renting customer.
  pub customer_id: Uuid,
  /// Window start.
  pub start_date: DateTime< Utc >,
  /// Window end, strictly after start.
  pub end_date: DateTime< Utc >,
}

impl CreateRentalRequest
{
  fn validate( &self ) -> Result< (), FleetError >
  {
    if self.end_date <= self.start_date
    {
      return Err( FleetError::validation_fields(
        "endDate must be after startDate",
        vec![ FieldViolation::new( "endDate", "must_be_after_start" ) ],
      ) );
    }
    Ok( () )
  }
}

/// POST /v1/rentals — any authenticated principal may reserve.
pub async fn create_rental(
  State( state ): State< AppState >,
  Extension( request_id ): Extension< RequestId >,
  _user: AuthenticatedUser,
  Json( request ): Json< CreateRentalRequest >,
) -> ApiResult
{
  request.validate().map_err( |e| fail( &e, &request_id ) )?;

  let rental = state
    .rentals
    .create_rental( request.vehicle_id, request.customer_id, request.start_date, request.end_date )
    .await
    .map_err( |e| fail( &e, &request_id ) )?;

  Ok( success( StatusCode::CREATED, &request_id, rental ) )
}

/// Listing filters on top of pagination.
#[ derive( Debug, Deserialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct RentalListQuery
{
  /// Restrict to one vehicle.
  pub vehicle_id: Option< Uuid >,
  /// Restrict to one status.
  pub status: Option< RentalStatus >,
  /// Page size.
  pub limit: Option< i64 >,
  /// Pagination cursor.
  pub cursor: Option< Uuid >,
}

/// GET /v1/rentals
pub async fn list_rentals(
  State( state ): State< AppState >,
  Extension( request_id ): Extension< RequestId >,
  _user: AuthenticatedUser,
  Query( query ): Query< RentalListQuery >,
) -> ApiResult
{
  let rentals = state
    .rentals
    .list_rentals( query.vehicle_id, query.status, query.limit, query.cursor )
    .await
    .map_err( |e| fail( &e, &request_id ) )?;

  Ok( success( StatusCode::OK, &request_id, rentals ) )
}

/// GET /v1/rentals/{id}
pub async fn get_rental(
  State( state ): State< AppState >,
  Extension( request_id ): Extension< RequestId >,
  _user: AuthenticatedUser,
  Path( id ): Path< Uuid >,
) -> ApiResult
{
  let rental = state.rentals.get_rental( id ).await.map_err( |e| fail( &e, &request_id ) )?;
  Ok( success( StatusCode::OK, &request_id, rental ) )
}

/// Activation request body.
#[ derive( Debug, Deserialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct ActivateRentalRequest
{
  /// Odometer at pickup.
  pub start_odometer_km: i64,
}

/// POST /v1/rentals/{id}/activate — staff only.
pub async fn activate_rental(
  State( state ): State< AppState >,
  Extension( request_id ): Extension< RequestId >,
  user: AuthenticatedUser,
  Path( id ): Path< Uuid >,
  Json( request ): Json< ActivateRentalRequest >,
) -> ApiResult
{
  user.require_any( Role::STAFF ).map_err( |e| fail( &e, &request_id ) )?;

  let rental = state
    .rentals
    .activate_rental( id, request.start_odometer_km )
    .await
    .map_err( |e| fail( &e, &request_id ) )?;

  Ok( success( StatusCode::OK, &request_id, rental ) )
}

/// Completion request body.
#[ derive( Debug, Deserialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct CompleteRentalRequest
{
  /// Odometer at return.
  pub final_mileage_km: i64,
}

/// POST /v1/rentals/{id}/complete — staff only.
pub async fn complete_rental(
  State( state ): State< AppState >,
  Extension( request_id ): Extension< RequestId >,
  user: AuthenticatedUser,
  Path( id ): Path< Uuid >,
  Json( request ): Json< CompleteRentalRequest >,
) -> ApiResult
{
  user.require_any( Role::STAFF ).map_err( |e| fail( &e, &request_id ) )?;

  let rental = state
    .rentals
    .complete_rental( id, request.final_mileage_km )
    .await
    .map_err( |e| fail( &e, &request_id ) )?;

  Ok( success( StatusCode::OK, &request_id, rental ) )
}

/// POST /v1/rentals/{id}/cancel — staff only.
pub async fn cancel_rental(
  State( state ): State< AppState >,
  Extension( request_id ): Extension< RequestId >,
  user: AuthenticatedUser,
  Path( id ): Path< Uuid >,
) -> ApiResult
{
  user.require_any( Role::STAFF ).map_err( |e| fail( &e, &request_id ) )?;

  let rental = state.rentals.cancel_rental( id ).await.map_err( |e| fail( &e, &request_id ) )?;
  Ok( success( StatusCode::OK, &request_id, rental ) )
}
