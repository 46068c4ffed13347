//! Maintenance use-cases and their vehicle-state coupling.

use chrono::{ DateTime, Utc };
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use fleet_store::{ map_db_err, maintenance, next_document_number, outbox, vehicles };
use fleet_types::pagination::CursorPage;
use fleet_types::
{
  FleetError, MaintenanceJob, MaintenancePart, MaintenanceStatus, MaintenanceType, OutboxEvent,
  Result, VehicleState,
};

/// Maintenance use-case engine.
#[ derive( Debug, Clone ) ]
pub struct MaintenanceEngine
{
  pool: PgPool,
}

impl MaintenanceEngine
{
  /// Create a new engine over the shared pool.
  #[ must_use ]
  pub fn new( pool: PgPool ) -> Self
  {
    Self { pool }
  }

  /// Schedule a job. The vehicle keeps its current state until the job
  /// starts.
  pub async fn schedule_job(
    &self,
    vehicle_id: Uuid,
    job_type: MaintenanceType,
    priority: i32,
    scheduled_date: DateTime< Utc >,
  ) -> Result< MaintenanceJob >
  {
    let now = Utc::now();
    let mut tx = self.pool.begin().await.map_err( map_db_err )?;

    let vehicle = vehicles::find_by_id( &mut *tx, vehicle_id ).await?;
    if vehicle.state == VehicleState::Retired
    {
      return Err( FleetError::InvalidState( format!(
        "cannot schedule maintenance for retired vehicle {vehicle_id}"
      ) ) );
    }

    let job_number = next_document_number( &mut *tx, "job_number_seq", "MNT" ).await?;
    let job = MaintenanceJob
    {
      id: Uuid::new_v4(),
      job_number,
      vehicle_id,
      status: MaintenanceStatus::Scheduled,
      job_type,
      priority,
      scheduled_date,
      started_at: None,
      completed_at: None,
      labor_cost: 0,
      parts_cost: 0,
      parts: Vec::new(),
      created_at: now,
      updated_at: now,
    };

    maintenance::insert( &mut *tx, &job ).await?;
    outbox::append( &mut *tx, &job_event( &job, "maintenance.scheduled", now ) ).await?;

    tx.commit().await.map_err( map_db_err )?;
    info!( job = %job.job_number, vehicle = %vehicle_id, "maintenance scheduled" );
    Ok( job )
  }

  /// Start a scheduled job. Requires the vehicle not to be RENTED; a
  /// vehicle in the shop already stays there.
  pub async fn start_job( &self, job_id: Uuid ) -> Result< MaintenanceJob >
  {
    let now = Utc::now();
    let mut tx = self.pool.begin().await.map_err( map_db_err )?;

    let mut job = maintenance::find_by_id_for_update( &mut *tx, job_id ).await?;
    job.start( now )?;

    let mut vehicle = vehicles::find_by_id( &mut *tx, job.vehicle_id ).await?;
    let vehicle_version = vehicle.version;
    match vehicle.state
    {
      VehicleState::Rented =>
      {
        return Err( FleetError::InvalidState( format!(
          "cannot start maintenance while vehicle {} is rented", vehicle.id
        ) ) );
      }
      VehicleState::Available =>
      {
        vehicle.mark_in_maintenance()?;
        vehicles::update_locked( &mut *tx, &vehicle, vehicle_version ).await?;
      }
      // Already in the shop under another job; leave the state alone.
      VehicleState::Maintenance => {}
      VehicleState::Retired =>
      {
        return Err( FleetError::InvalidState( format!(
          "cannot start maintenance on retired vehicle {}", vehicle.id
        ) ) );
      }
    }

    maintenance::update_transition( &mut *tx, &job ).await?;
    outbox::append( &mut *tx, &job_event( &job, "maintenance.started", now ) ).await?;

    tx.commit().await.map_err( map_db_err )?;
    info!( job = %job.job_number, "maintenance started" );
    Ok( job )
  }

  /// Complete an in-progress job, recording costs and (for non-zero
  /// totals) posting the close entry. The vehicle returns to AVAILABLE
  /// iff it is still in MAINTENANCE.
  pub async fn complete_job(
    &self,
    job_id: Uuid,
    labor_cost: i64,
    parts: Vec< MaintenancePart >,
  ) -> Result< MaintenanceJob >
  {
    let now = Utc::now();
    let mut tx = self.pool.begin().await.map_err( map_db_err )?;

    let mut job = maintenance::find_by_id_for_update( &mut *tx, job_id ).await?;
    job.complete( labor_cost, parts, now )?;

    let mut vehicle = vehicles::find_by_id( &mut *tx, job.vehicle_id ).await?;
    if vehicle.state == VehicleState::Maintenance
    {
      let vehicle_version = vehicle.version;
      vehicle.mark_maintenance_done();
      vehicles::update_locked( &mut *tx, &vehicle, vehicle_version ).await?;
    }

    maintenance::update_transition( &mut *tx, &job ).await?;

    if job.total_cost() > 0
    {
      fleet_ledger::post_maintenance_close( &mut *tx, job.id, &job.job_number, job.total_cost(), now )
        .await?;
    }

    outbox::append( &mut *tx, &job_event( &job, "maintenance.completed", now ) ).await?;

    tx.commit().await.map_err( map_db_err )?;
    info!( job = %job.job_number, total_cost = job.total_cost(), "maintenance completed" );
    Ok( job )
  }

  /// Cancel a scheduled job. The vehicle returns to AVAILABLE iff it is
  /// in MAINTENANCE.
  pub async fn cancel_job( &self, job_id: Uuid ) -> Result< MaintenanceJob >
  {
    let now = Utc::now();
    let mut tx = self.pool.begin().await.map_err( map_db_err )?;

    let mut job = maintenance::find_by_id_for_update( &mut *tx, job_id ).await?;
    job.cancel( now )?;

    let mut vehicle = vehicles::find_by_id( &mut *tx, job.vehicle_id ).await?;
    if vehicle.state == VehicleState::Maintenance
    {
      let vehicle_version = vehicle.version;
      vehicle.mark_maintenance_done();
      vehicles::update_locked( &mut *tx, &vehicle, vehicle_version ).await?;
    }

    maintenance::update_transition( &mut *tx, &job ).await?;
    outbox::append( &mut *tx, &job_event( &job, "maintenance.cancelled", now ) ).await?;

    tx.commit().await.map_err( map_db_err )?;
    info!( job = %job.job_number, "maintenance cancelled" );
    Ok( job )
  }

  /// Read one job.
  pub async fn get_job( &self, job_id: Uuid ) -> Result< MaintenanceJob >
  {
    let mut conn = self.pool.acquire().await.map_err( map_db_err )?;
    maintenance::find_by_id( &mut *conn, job_id ).await
  }

  /// Cursor-paged listing.
  pub async fn list_jobs(
    &self,
    vehicle_id: Option< Uuid >,
    limit: Option< i64 >,
    cursor: Option< Uuid >,
  ) -> Result< CursorPage< MaintenanceJob > >
  {
    let mut conn = self.pool.acquire().await.map_err( map_db_err )?;
    maintenance::list( &mut *conn, vehicle_id, limit, cursor ).await
  }
}

fn job_event( job: &MaintenanceJob, event_type: &str, now: DateTime< Utc > ) -> OutboxEvent
{
  OutboxEvent
  {
    id: Uuid::new_v4(),
    aggregate_type: "maintenance".to_string(),
    aggregate_id: job.id,
    event_type: event_type.to_string(),
    payload: serde_json::json!( {
      "jobId": job.id,
      "jobNumber": job.job_number,
      "vehicleId": job.vehicle_id,
      "status": job.status.as_str(),
      "totalCost": job.total_cost(),
    } ),
    created_at: now,
    published_at: None,
  }
}
