//! Maintenance endpoints.

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
use fleet_types::{ MaintenancePart, MaintenanceType, Role };

const MAINTENANCE_ROLES: &[ Role ] = &[ Role::FleetManager ];

/// Schedule request body.
#[ derive( Debug, Deserialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct ScheduleJobRequest
{
  /// Vehicle to service.
  pub vehicle_id: Uuid,
  /// Work category.
  pub job_type: MaintenanceType,
  /// Scheduling priority.
  #[ serde( default ) ]
  pub priority: i32,
  /// Planned start.
  pub scheduled_date: DateTime< Utc >,
}

/// POST /v1/maintenance
pub async fn schedule_job(
  State( state ): State< AppState >,
  Extension( request_id ): Extension< RequestId >,
  user: AuthenticatedUser,
  Json( request ): Json< ScheduleJobRequest >,
) -> ApiResult
{
  user.require_any( MAINTENANCE_ROLES ).map_err( |e| fail( &e, &request_id ) )?;

  let job = state
    .maintenance
    .schedule_job( request.vehicle_id, request.job_type, request.priority, request.scheduled_date )
    .await
    .map_err( |e| fail( &e, &request_id ) )?;

  Ok( success( StatusCode::CREATED, &request_id, job ) )
}

/// Listing filters.
#[ derive( Debug, Deserialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct JobListQuery
{
  /// Restrict to one vehicle.
  pub vehicle_id: Option< Uuid >,
  /// Page size.
  pub limit: Option< i64 >,
  /// Pagination cursor.
  pub cursor: Option< Uuid >,
}

/// GET /v1/maintenance
pub async fn list_jobs(
  State( state ): State< AppState >,
  Extension( request_id ): Extension< RequestId >,
  user: AuthenticatedUser,
  Query( query ): Query< JobListQuery >,
) -> ApiResult
{
  user.require_any( MAINTENANCE_ROLES ).map_err( |e| fail( &e, &request_id ) )?;

  let jobs = state
    .maintenance
    .list_jobs( query.vehicle_id, query.limit, query.cursor )
    .await
    .map_err( |e| fail( &e, &request_id ) )?;

  Ok( success( StatusCode::OK, &request_id, jobs ) )
}

/// GET /v1/maintenance/{id}
pub async fn get_job(
  State( state ): State< AppState >,
  Extension( request_id ): Extension< RequestId >,
  user: AuthenticatedUser,
  Path( id ): Path< Uuid >,
) -> ApiResult
{
  user.require_any( MAINTENANCE_ROLES ).map_err( |e| fail( &e, &request_id ) )?;

  let job = state.maintenance.get_job( id ).await.map_err( |e| fail( &e, &request_id ) )?;
  Ok( success( StatusCode::OK, &request_id, job ) )
}

/// POST /v1/maintenance/{id}/start
pub async fn start_job(
  State( state ): State< AppState >,
  Extension( request_id ): Extension< RequestId >,
  user: AuthenticatedUser,
  Path( id ): Path< Uuid >,
) -> ApiResult
{
  user.require_any( MAINTENANCE_ROLES ).map_err( |e| fail( &e, &request_id ) )?;

  let job = state.maintenance.start_job( id ).await.map_err( |e| fail( &e, &request_id ) )?;
  Ok( success( StatusCode::OK, &request_id, job ) )
}

/// One consumed part on the wire.
#[ derive( Debug, Deserialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct PartRequest
{
  /// Part description.
  pub part_name: String,
  /// Units consumed.
  pub quantity: i32,
  /// Cost per unit, whole pesos.
  pub unit_cost: i64,
}

/// Completion request body.
#[ derive( Debug, Deserialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct CompleteJobRequest
{
  /// Final labor cost, whole pesos.
  #[ serde( default ) ]
  pub labor_cost: i64,
  /// Consumed parts.
  #[ serde( default ) ]
  pub parts: Vec< PartRequest >,
}

/// POST /v1/maintenance/{id}/complete
pub async fn complete_job(
  State( state ): State< AppState >,
  Extension( request_id ): Extension< RequestId >,
  user: AuthenticatedUser,
  Path( id ): Path< Uuid >,
  Json( request ): Json< CompleteJobRequest >,
) -> ApiResult
{
  user.require_any( MAINTENANCE_ROLES ).map_err( |e| fail( &e, &request_id ) )?;

  let parts = request
    .parts
    .into_iter()
    .map( |p| MaintenancePart { part_name: p.part_name, quantity: p.quantity, unit_cost: p.unit_cost } )
    .collect();

  let job = state
    .maintenance
    .complete_job( id, request.labor_cost, parts )
    .await
    .map_err( |e| fail( &e, &request_id ) )?;

  Ok( success( StatusCode::OK, &request_id, job ) )
}

/// POST /v1/maintenance/{id}/cancel
pub async fn cancel_job(
  State( state ): State< AppState >,
  Extension( request_id ): Extension< RequestId >,
  user: AuthenticatedUser,
  Path( id ): Path< Uuid >,
) -> ApiResult
{
  user.require_any( MAINTENANCE_ROLES ).map_err( |e| fail( &e, &request_id ) )?;

  let job = state.maintenance.cancel_job( id ).await.map_err( |e| fail( &e, &request_id ) )?;
  Ok( success( StatusCode::OK, &request_id, job ) )
}
