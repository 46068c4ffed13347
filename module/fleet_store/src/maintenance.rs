//! Maintenance-job repository, including consumed parts.

use sqlx::{ PgConnection, Row };
use uuid::Uuid;

use crate::error::map_db_err;
use fleet_types::pagination::{ clamp_limit, CursorPage };
use fleet_types::{ FleetError, MaintenanceJob, MaintenancePart, MaintenanceStatus, MaintenanceType, Result };

const JOB_COLUMNS: &str =
  "id, job_number, vehicle_id, status, job_type, priority, scheduled_date, \
   started_at, completed_at, labor_cost, parts_cost, created_at, updated_at";

fn from_row( row: &sqlx::postgres::PgRow, parts: Vec< MaintenancePart > ) -> Result< MaintenanceJob >
{
  Ok( MaintenanceJob
  {
    id: row.get( "id" ),
    job_number: row.get( "job_number" ),
    vehicle_id: row.get( "vehicle_id" ),
    status: MaintenanceStatus::parse( row.get( "status" ) )?,
    job_type: MaintenanceType::parse( row.get( "job_type" ) )?,
    priority: row.get( "priority" ),
    scheduled_date: row.get( "scheduled_date" ),
    started_at: row.get( "started_at" ),
    completed_at: row.get( "completed_at" ),
    labor_cost: row.get( "labor_cost" ),
    parts_cost: row.get( "parts_cost" ),
    parts,
    created_at: row.get( "created_at" ),
    updated_at: row.get( "updated_at" ),
  } )
}

async fn parts_for( conn: &mut PgConnection, job_id: Uuid ) -> Result< Vec< MaintenancePart > >
{
  let rows = sqlx::query(
    "SELECT part_name, quantity, unit_cost FROM maintenance_parts WHERE job_id = $1 ORDER BY id",
  )
  .bind( job_id )
  .fetch_all( conn )
  .await
  .map_err( map_db_err )?;

  Ok( rows.iter().map( |row| MaintenancePart
  {
    part_name: row.get( "part_name" ),
    quantity: row.get( "quantity" ),
    unit_cost: row.get( "unit_cost" ),
  } ).collect() )
}

/// Insert a newly scheduled job.
pub async fn insert( conn: &mut PgConnection, job: &MaintenanceJob ) -> Result< () >
{
  sqlx::query(
    "INSERT INTO maintenance_jobs
       (id, job_number, vehicle_id, status, job_type, priority, scheduled_date,
        labor_cost, parts_cost)
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
  )
  .bind( job.id )
  .bind( &job.job_number )
  .bind( job.vehicle_id )
  .bind( job.status.as_str() )
  .bind( job.job_type.as_str() )
  .bind( job.priority )
  .bind( job.scheduled_date )
  .bind( job.labor_cost )
  .bind( job.parts_cost )
  .execute( conn )
  .await
  .map_err( map_db_err )?;
  Ok( () )
}

/// Persist a state transition, costs, and (on completion) parts.
pub async fn update_transition( conn: &mut PgConnection, job: &MaintenanceJob ) -> Result< () >
{
  let result = sqlx::query(
    "UPDATE maintenance_jobs
        SET status = $1, started_at = $2, completed_at = $3,
            labor_cost = $4, parts_cost = $5, updated_at = $6
      WHERE id = $7",
  )
  .bind( job.status.as_str() )
  .bind( job.started_at )
  .bind( job.completed_at )
  .bind( job.labor_cost )
  .bind( job.parts_cost )
  .bind( job.updated_at )
  .bind( job.id )
  .execute( &mut *conn )
  .await
  .map_err( map_db_err )?;

  if result.rows_affected() == 0
  {
    return Err( FleetError::NotFound( format!( "maintenance job {}", job.id ) ) );
  }

  if job.status == MaintenanceStatus::Completed
  {
    for part in &job.parts
    {
      sqlx::query(
        "INSERT INTO maintenance_parts (job_id, part_name, quantity, unit_cost)
         VALUES ($1, $2, $3, $4)",
      )
      .bind( job.id )
      .bind( &part.part_name )
      .bind( part.quantity )
      .bind( part.unit_cost )
      .execute( &mut *conn )
      .await
      .map_err( map_db_err )?;
    }
  }

  Ok( () )
}

/// Fetch one job with its parts.
///
/// # Errors
///
/// `NOT_FOUND` when the id does not exist.
pub async fn find_by_id( conn: &mut PgConnection, id: Uuid ) -> Result< MaintenanceJob >
{
  let query = format!( "SELECT {JOB_COLUMNS} FROM maintenance_jobs WHERE id = $1" );
  let row = sqlx::query( &query )
    .bind( id )
    .fetch_optional( &mut *conn )
    .await
    .map_err( map_db_err )?
    .ok_or_else( || FleetError::NotFound( format!( "maintenance job {id}" ) ) )?;

  let parts = parts_for( conn, id ).await?;
  from_row( &row, parts )
}

/// Lock one job row for the rest of the transaction.
pub async fn find_by_id_for_update( conn: &mut PgConnection, id: Uuid ) -> Result< MaintenanceJob >
{
  let query = format!( "SELECT {JOB_COLUMNS} FROM maintenance_jobs WHERE id = $1 FOR UPDATE" );
  let row = sqlx::query( &query )
    .bind( id )
    .fetch_optional( &mut *conn )
    .await
    .map_err( map_db_err )?
    .ok_or_else( || FleetError::NotFound( format!( "maintenance job {id}" ) ) )?;

  let parts = parts_for( conn, id ).await?;
  from_row( &row, parts )
}

/// Cursor-paged listing, optionally filtered by vehicle.
pub async fn list(
  conn: &mut PgConnection,
  vehicle_id: Option< Uuid >,
  limit: Option< i64 >,
  cursor: Option< Uuid >,
) -> Result< CursorPage< MaintenanceJob > >
{
  let limit = clamp_limit( limit );

  let total: i64 = sqlx::query_scalar(
    "SELECT COUNT(*) FROM maintenance_jobs WHERE ($1::uuid IS NULL OR vehicle_id = $1)",
  )
  .bind( vehicle_id )
  .fetch_one( &mut *conn )
  .await
  .map_err( map_db_err )?;

  let query = format!(
    "SELECT {JOB_COLUMNS} FROM maintenance_jobs
     WHERE ($1::uuid IS NULL OR vehicle_id = $1)
       AND ($2::uuid IS NULL OR id > $2)
     ORDER BY id
     LIMIT $3"
  );
  let rows = sqlx::query( &query )
    .bind( vehicle_id )
    .bind( cursor )
    .bind( limit )
    .fetch_all( &mut *conn )
    .await
    .map_err( map_db_err )?;

  // Listings skip the parts fan-out; detail reads load them.
  let items = rows
    .iter()
    .map( |row| from_row( row, Vec::new() ) )
    .collect::< Result< Vec< _ > > >()?;
  Ok( CursorPage::new( items, limit, total, |j| j.id ) )
}
