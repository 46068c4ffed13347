//! Maintenance engine transitions and vehicle-state coupling.

mod common;

use chrono::{ Duration, Utc };
use sqlx::PgPool;

use fleet_ops::{ MaintenanceEngine, RentalEngine };
use fleet_types::{ MaintenancePart, MaintenanceStatus, MaintenanceType, VehicleState };

#[ sqlx::test( migrations = false ) ]
async fn schedule_start_complete_flow( pool: PgPool )
{
  common::prepare( &pool ).await;
  let vehicle = common::fixture_vehicle( &pool, 500, 10_000 ).await;
  let engine = MaintenanceEngine::new( pool.clone() );
  let rentals = RentalEngine::new( pool.clone() );

  let job = engine
    .schedule_job( vehicle.id, MaintenanceType::Routine, 1, Utc::now() - Duration::hours( 1 ) )
    .await
    .unwrap();
  assert_eq!( job.status, MaintenanceStatus::Scheduled );
  assert!( job.job_number.starts_with( "MNT-" ) );

  let started = engine.start_job( job.id ).await.unwrap();
  assert_eq!( started.status, MaintenanceStatus::InProgress );
  assert_eq!( rentals.get_vehicle( vehicle.id ).await.unwrap().state, VehicleState::Maintenance );

  let parts = vec![
    MaintenancePart { part_name: "oil filter".to_string(), quantity: 1, unit_cost: 350 },
    MaintenancePart { part_name: "engine oil".to_string(), quantity: 4, unit_cost: 400 },
  ];
  let completed = engine.complete_job( job.id, 1_200, parts ).await.unwrap();
  assert_eq!( completed.status, MaintenanceStatus::Completed );
  assert_eq!( completed.total_cost(), 3_150 );
  assert_eq!( rentals.get_vehicle( vehicle.id ).await.unwrap().state, VehicleState::Available );

  // The close posting carries the full job cost.
  let count: i64 = sqlx::query_scalar(
    "SELECT COUNT(*) FROM ledger_entries WHERE external_reference = $1",
  )
  .bind( format!( "maintenance-{}-close", job.id ) )
  .fetch_one( &pool )
  .await
  .unwrap();
  assert_eq!( count, 1 );
}

#[ sqlx::test( migrations = false ) ]
async fn start_against_rented_vehicle_is_invalid_state( pool: PgPool )
{
  common::prepare( &pool ).await;
  let vehicle = common::fixture_vehicle( &pool, 500, 10_000 ).await;
  let customer = common::fixture_customer( &pool ).await;
  let maintenance = MaintenanceEngine::new( pool.clone() );
  let rentals = RentalEngine::new( pool.clone() );

  let ( start, end ) = common::june( 1, 5 );
  let rental = rentals.create_rental( vehicle.id, customer.id, start, end ).await.unwrap();
  rentals.activate_rental( rental.id, 10_000 ).await.unwrap();

  let job = maintenance
    .schedule_job( vehicle.id, MaintenanceType::Routine, 1, Utc::now() - Duration::hours( 1 ) )
    .await
    .unwrap();
  let err = maintenance.start_job( job.id ).await.unwrap_err();
  assert_eq!( err.code(), "INVALID_STATE" );

  // After the rental completes, the same start succeeds.
  rentals.complete_rental( rental.id, 10_450 ).await.unwrap();
  let started = maintenance.start_job( job.id ).await.unwrap();
  assert_eq!( started.status, MaintenanceStatus::InProgress );
  assert_eq!( rentals.get_vehicle( vehicle.id ).await.unwrap().state, VehicleState::Maintenance );
}

#[ sqlx::test( migrations = false ) ]
async fn cancel_only_from_scheduled( pool: PgPool )
{
  common::prepare( &pool ).await;
  let vehicle = common::fixture_vehicle( &pool, 500, 10_000 ).await;
  let engine = MaintenanceEngine::new( pool.clone() );

  let job = engine
    .schedule_job( vehicle.id, MaintenanceType::Repair, 2, Utc::now() - Duration::hours( 1 ) )
    .await
    .unwrap();
  engine.start_job( job.id ).await.unwrap();

  assert_eq!( engine.cancel_job( job.id ).await.unwrap_err().code(), "INVALID_STATE" );
}

#[ sqlx::test( migrations = false ) ]
async fn zero_cost_completion_posts_nothing( pool: PgPool )
{
  common::prepare( &pool ).await;
  let vehicle = common::fixture_vehicle( &pool, 500, 10_000 ).await;
  let engine = MaintenanceEngine::new( pool.clone() );

  let job = engine
    .schedule_job( vehicle.id, MaintenanceType::Inspection, 0, Utc::now() - Duration::hours( 1 ) )
    .await
    .unwrap();
  engine.start_job( job.id ).await.unwrap();
  engine.complete_job( job.id, 0, Vec::new() ).await.unwrap();

  let count: i64 = sqlx::query_scalar(
    "SELECT COUNT(*) FROM ledger_entries WHERE external_reference = $1",
  )
  .bind( format!( "maintenance-{}-close", job.id ) )
  .fetch_one( &pool )
  .await
  .unwrap();
  assert_eq!( count, 0 );
}
