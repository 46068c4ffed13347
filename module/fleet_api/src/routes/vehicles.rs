//! Vehicle inventory endpoints.
//!
//! `GET /v1/vehicles/{id}` is fronted by the cache when one is
//! configured: cache-aside with a five-minute TTL, fire-and-forget
//! population, no proactive invalidation. Writes stay correct through
//! the optimistic-lock version column, not through cache coherence.

use axum::extract::{ Path, Query, State };
use axum::http::StatusCode;
use axum::{ Extension, Json };
use serde::Deserialize;
use uuid::Uuid;

use crate::envelope::{ fail, success, ApiResult };
use crate::jwt_auth::AuthenticatedUser;
use crate::request_id::RequestId;
use crate::state::AppState;
use super::PageQuery;
use fleet_ops::{ NewVehicle, VehiclePatch };
use fleet_types::{ FieldViolation, FleetError, Role, VehicleState };

/// Roles allowed to mutate the fleet inventory.
const FLEET_WRITERS: &[ Role ] = &[ Role::Admin, Role::FleetManager ];

/// Create-vehicle request body.
#[ derive( Debug, Deserialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct CreateVehicleRequest
{
  /// 17-character VIN.
  pub vin: String,
  /// License plate.
  pub plate: String,
  /// Manufacturer.
  pub make: String,
  /// Model name.
  pub model: String,
  /// Model year.
  pub year: i32,
  /// Body color.
  #[ serde( default ) ]
  pub color: String,
  /// Odometer at intake.
  #[ serde( default ) ]
  pub mileage_km: i64,
  /// Rate per billable day, whole pesos.
  pub daily_rate_amount: i64,
  /// Seats.
  pub passenger_capacity: i32,
}

/// POST /v1/vehicles
pub async fn create_vehicle(
  State( state ): State< AppState >,
  Extension( request_id ): Extension< RequestId >,
  user: AuthenticatedUser,
  Json( request ): Json< CreateVehicleRequest >,
) -> ApiResult
{
  user.require_any( FLEET_WRITERS ).map_err( |e| fail( &e, &request_id ) )?;

  let vehicle = state
    .vehicles
    .create_vehicle( NewVehicle
    {
      vin: request.vin,
      plate: request.plate,
      make: request.make,
      model: request.model,
      year: request.year,
      color: request.color,
      mileage_km: request.mileage_km,
      daily_rate_amount: request.daily_rate_amount,
      passenger_capacity: request.passenger_capacity,
    } )
    .await
    .map_err( |e| fail( &e, &request_id ) )?;

  Ok( success( StatusCode::CREATED, &request_id, vehicle ) )
}

/// GET /v1/vehicles
pub async fn list_vehicles(
  State( state ): State< AppState >,
  Extension( request_id ): Extension< RequestId >,
  _user: AuthenticatedUser,
  Query( page ): Query< PageQuery >,
) -> ApiResult
{
  let vehicles = state
    .vehicles
    .list_vehicles( page.limit, page.cursor )
    .await
    .map_err( |e| fail( &e, &request_id ) )?;

  Ok( success( StatusCode::OK, &request_id, vehicles ) )
}

/// GET /v1/vehicles/{id} — cache-aside when a cache is configured.
pub async fn get_vehicle(
  State( state ): State< AppState >,
  Extension( request_id ): Extension< RequestId >,
  _user: AuthenticatedUser,
  Path( id ): Path< Uuid >,
) -> ApiResult
{
  if let Some( cache ) = &state.cache
  {
    if let Some( vehicle ) = cache.get_vehicle( id ).await
    {
      return Ok( success( StatusCode::OK, &request_id, vehicle ) );
    }
  }

  let vehicle = state.vehicles.get_vehicle( id ).await.map_err( |e| fail( &e, &request_id ) )?;

  if let Some( cache ) = &state.cache
  {
    cache.put_vehicle( &vehicle ).await;
  }

  Ok( success( StatusCode::OK, &request_id, vehicle ) )
}

/// Patch-vehicle request body.
#[ derive( Debug, Deserialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct PatchVehicleRequest
{
  /// New make.
  pub make: Option< String >,
  /// New model.
  pub model: Option< String >,
  /// New color.
  pub color: Option< String >,
  /// New daily rate.
  pub daily_rate_amount: Option< i64 >,
  /// New capacity.
  pub passenger_capacity: Option< i32 >,
  /// New location label.
  pub last_location: Option< String >,
}

/// PATCH /v1/vehicles/{id}
pub async fn patch_vehicle(
  State( state ): State< AppState >,
  Extension( request_id ): Extension< RequestId >,
  user: AuthenticatedUser,
  Path( id ): Path< Uuid >,
  Json( request ): Json< PatchVehicleRequest >,
) -> ApiResult
{
  user.require_any( FLEET_WRITERS ).map_err( |e| fail( &e, &request_id ) )?;

  let vehicle = state
    .vehicles
    .patch_vehicle( id, VehiclePatch
    {
      make: request.make,
      model: request.model,
      color: request.color,
      daily_rate_amount: request.daily_rate_amount,
      passenger_capacity: request.passenger_capacity,
      last_location: request.last_location,
    } )
    .await
    .map_err( |e| fail( &e, &request_id ) )?;

  Ok( success( StatusCode::OK, &request_id, vehicle ) )
}

/// DELETE /v1/vehicles/{id} — retires rather than deletes; rental and
/// ledger history stays intact.
pub async fn retire_vehicle(
  State( state ): State< AppState >,
  Extension( request_id ): Extension< RequestId >,
  user: AuthenticatedUser,
  Path( id ): Path< Uuid >,
) -> ApiResult
{
  user.require_any( FLEET_WRITERS ).map_err( |e| fail( &e, &request_id ) )?;

  let vehicle = state.vehicles.retire_vehicle( id ).await.map_err( |e| fail( &e, &request_id ) )?;
  Ok( success( StatusCode::OK, &request_id, vehicle ) )
}

/// State-change request body.
#[ derive( Debug, Deserialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct SetStateRequest
{
  /// Target state.
  pub state: VehicleState,
}

/// PATCH /v1/vehicles/{id}/state
pub async fn set_vehicle_state(
  State( state ): State< AppState >,
  Extension( request_id ): Extension< RequestId >,
  user: AuthenticatedUser,
  Path( id ): Path< Uuid >,
  Json( request ): Json< SetStateRequest >,
) -> ApiResult
{
  user.require_any( FLEET_WRITERS ).map_err( |e| fail( &e, &request_id ) )?;

  let vehicle = state
    .vehicles
    .set_state( id, request.state )
    .await
    .map_err( |e| fail( &e, &request_id ) )?;

  Ok( success( StatusCode::OK, &request_id, vehicle ) )
}

/// Odometer reading request body.
#[ derive( Debug, Deserialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct OdometerRequest
{
  /// New reading, kilometers.
  pub mileage_km: i64,
}

/// POST /v1/vehicles/{id}/odometer
pub async fn record_odometer(
  State( state ): State< AppState >,
  Extension( request_id ): Extension< RequestId >,
  user: AuthenticatedUser,
  Path( id ): Path< Uuid >,
  Json( request ): Json< OdometerRequest >,
) -> ApiResult
{
  user.require_any( FLEET_WRITERS ).map_err( |e| fail( &e, &request_id ) )?;

  if request.mileage_km < 0
  {
    return Err( fail(
      &FleetError::validation_fields(
        "odometer reading cannot be negative",
        vec![ FieldViolation::new( "mileageKm", "negative" ) ],
      ),
      &request_id,
    ) );
  }

  let vehicle = state
    .vehicles
    .record_odometer( id, request.mileage_km )
    .await
    .map_err( |e| fail( &e, &request_id ) )?;

  Ok( success( StatusCode::OK, &request_id, vehicle ) )
}
