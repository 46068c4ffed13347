//! Rental engine lifecycle and its cross-aggregate side effects.

mod common;

use chrono::Utc;
use sqlx::PgPool;

use fleet_ops::RentalEngine;
use fleet_store::accounts;
use fleet_types::accounting::codes;
use fleet_types::{ RentalStatus, VehicleState };

#[ sqlx::test( migrations = false ) ]
async fn happy_lifecycle_reserve_activate_complete( pool: PgPool )
{
  common::prepare( &pool ).await;
  let vehicle = common::fixture_vehicle( &pool, 500, 10_000 ).await;
  let customer = common::fixture_customer( &pool ).await;
  let engine = RentalEngine::new( pool.clone() );

  let ( start, end ) = common::june( 1, 5 );
  let rental = engine.create_rental( vehicle.id, customer.id, start, end ).await.unwrap();
  assert_eq!( rental.status, RentalStatus::Reserved );
  assert_eq!( rental.total_amount, 2_000, "4 days at 500" );
  assert!( rental.rental_number.starts_with( "RNT-" ) );

  let active = engine.activate_rental( rental.id, 10_000 ).await.unwrap();
  assert_eq!( active.status, RentalStatus::Active );
  assert_eq!( engine.get_vehicle( vehicle.id ).await.unwrap().state, VehicleState::Rented );

  // The activation posting exists and is balanced against AR/revenue.
  let mut conn = pool.acquire().await.unwrap();
  let posted = accounts::find_by_external_reference(
    &mut *conn,
    &format!( "rental-{}-activation", rental.id ),
  )
  .await
  .unwrap()
  .expect( "activation entry must exist" );
  assert_eq!( posted.lines.iter().map( |l| l.debit ).sum::< i64 >(), 2_000 );

  let receivable = accounts::find_by_code( &mut *conn, codes::ACCOUNTS_RECEIVABLE ).await.unwrap();
  assert_eq!( accounts::balance_of( &mut *conn, receivable.id, Utc::now() ).await.unwrap(), 2_000 );
  drop( conn );

  let done = engine.complete_rental( rental.id, 10_450 ).await.unwrap();
  assert_eq!( done.status, RentalStatus::Completed );
  assert_eq!( done.end_odometer_km, Some( 10_450 ) );

  let returned = engine.get_vehicle( vehicle.id ).await.unwrap();
  assert_eq!( returned.state, VehicleState::Available );
  assert_eq!( returned.mileage_km, 10_450 );
}

#[ sqlx::test( migrations = false ) ]
async fn double_booking_yields_rental_conflict( pool: PgPool )
{
  common::prepare( &pool ).await;
  let vehicle = common::fixture_vehicle( &pool, 500, 10_000 ).await;
  let customer = common::fixture_customer( &pool ).await;
  let engine = RentalEngine::new( pool.clone() );

  let ( start, end ) = common::june( 1, 5 );
  engine.create_rental( vehicle.id, customer.id, start, end ).await.unwrap();

  let ( overlap_start, overlap_end ) = common::june( 3, 7 );
  let err = engine
    .create_rental( vehicle.id, customer.id, overlap_start, overlap_end )
    .await
    .unwrap_err();
  assert_eq!( err.code(), "RENTAL_CONFLICT" );
}

#[ sqlx::test( migrations = false ) ]
async fn expired_license_blocks_creation( pool: PgPool )
{
  common::prepare( &pool ).await;
  let vehicle = common::fixture_vehicle( &pool, 500, 10_000 ).await;
  let customer = common::fixture_expired_customer( &pool ).await;
  let engine = RentalEngine::new( pool );

  let ( start, end ) = common::june( 1, 5 );
  let err = engine.create_rental( vehicle.id, customer.id, start, end ).await.unwrap_err();
  assert_eq!( err.code(), "VALIDATION_ERROR" );
}

#[ sqlx::test( migrations = false ) ]
async fn completion_below_pickup_odometer_fails( pool: PgPool )
{
  common::prepare( &pool ).await;
  let vehicle = common::fixture_vehicle( &pool, 500, 10_000 ).await;
  let customer = common::fixture_customer( &pool ).await;
  let engine = RentalEngine::new( pool.clone() );

  let ( start, end ) = common::june( 1, 5 );
  let rental = engine.create_rental( vehicle.id, customer.id, start, end ).await.unwrap();
  engine.activate_rental( rental.id, 10_000 ).await.unwrap();

  let err = engine.complete_rental( rental.id, 9_500 ).await.unwrap_err();
  assert_eq!( err.code(), "INVALID_MILEAGE" );

  // Nothing committed: rental still active, vehicle still rented.
  assert_eq!( engine.get_rental( rental.id ).await.unwrap().status, RentalStatus::Active );
  assert_eq!( engine.get_vehicle( vehicle.id ).await.unwrap().state, VehicleState::Rented );
}

#[ sqlx::test( migrations = false ) ]
async fn cancelling_reservation_frees_the_window( pool: PgPool )
{
  common::prepare( &pool ).await;
  let vehicle = common::fixture_vehicle( &pool, 500, 10_000 ).await;
  let customer = common::fixture_customer( &pool ).await;
  let engine = RentalEngine::new( pool.clone() );

  let ( start, end ) = common::june( 1, 5 );
  let rental = engine.create_rental( vehicle.id, customer.id, start, end ).await.unwrap();
  engine.cancel_rental( rental.id ).await.unwrap();

  // The same window books again.
  engine.create_rental( vehicle.id, customer.id, start, end ).await.unwrap();
}

#[ sqlx::test( migrations = false ) ]
async fn cancelling_active_rental_returns_the_vehicle( pool: PgPool )
{
  common::prepare( &pool ).await;
  let vehicle = common::fixture_vehicle( &pool, 500, 10_000 ).await;
  let customer = common::fixture_customer( &pool ).await;
  let engine = RentalEngine::new( pool.clone() );

  let ( start, end ) = common::june( 10, 12 );
  let rental = engine.create_rental( vehicle.id, customer.id, start, end ).await.unwrap();
  engine.activate_rental( rental.id, 10_000 ).await.unwrap();

  let cancelled = engine.cancel_rental( rental.id ).await.unwrap();
  assert_eq!( cancelled.status, RentalStatus::Cancelled );
  assert_eq!( engine.get_vehicle( vehicle.id ).await.unwrap().state, VehicleState::Available );

  // Terminal: a second cancel is an invalid transition.
  assert_eq!( engine.cancel_rental( rental.id ).await.unwrap_err().code(), "INVALID_STATE" );
}

#[ sqlx::test( migrations = false ) ]
async fn activation_posting_is_idempotent_per_rental( pool: PgPool )
{
  common::prepare( &pool ).await;
  let vehicle = common::fixture_vehicle( &pool, 500, 10_000 ).await;
  let customer = common::fixture_customer( &pool ).await;
  let engine = RentalEngine::new( pool.clone() );

  let ( start, end ) = common::june( 1, 5 );
  let rental = engine.create_rental( vehicle.id, customer.id, start, end ).await.unwrap();
  engine.activate_rental( rental.id, 10_000 ).await.unwrap();

  // A second activation fails on the state machine; the ledger still
  // holds exactly one activation entry.
  assert_eq!( engine.activate_rental( rental.id, 10_000 ).await.unwrap_err().code(), "INVALID_STATE" );

  let count: i64 = sqlx::query_scalar(
    "SELECT COUNT(*) FROM ledger_entries WHERE external_reference = $1",
  )
  .bind( format!( "rental-{}-activation", rental.id ) )
  .fetch_one( &pool )
  .await
  .unwrap();
  assert_eq!( count, 1 );
}
