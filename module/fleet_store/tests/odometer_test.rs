//! The odometer monotonicity trigger.

mod common;

use chrono::Utc;
use sqlx::PgPool;

use fleet_store::vehicles;

#[ sqlx::test( migrations = false ) ]
async fn decreasing_reading_is_rejected( pool: PgPool )
{
  common::prepare( &pool ).await;
  let vehicle = common::fixture_vehicle( &pool, 500, 18_500 ).await;

  let mut conn = pool.acquire().await.unwrap();

  vehicles::append_odometer_reading( &mut *conn, vehicle.id, 18_500, Utc::now() ).await.unwrap();

  let err = vehicles::append_odometer_reading( &mut *conn, vehicle.id, 10_000, Utc::now() )
    .await
    .unwrap_err();
  assert_eq!( err.code(), "INVALID_MILEAGE" );

  // A higher reading still goes through.
  vehicles::append_odometer_reading( &mut *conn, vehicle.id, 18_600, Utc::now() ).await.unwrap();
  let latest = vehicles::latest_odometer_reading( &mut *conn, vehicle.id ).await.unwrap();
  assert_eq!( latest, Some( 18_600 ) );
}

#[ sqlx::test( migrations = false ) ]
async fn equal_reading_is_allowed( pool: PgPool )
{
  common::prepare( &pool ).await;
  let vehicle = common::fixture_vehicle( &pool, 500, 10_000 ).await;

  let mut conn = pool.acquire().await.unwrap();
  vehicles::append_odometer_reading( &mut *conn, vehicle.id, 10_000, Utc::now() ).await.unwrap();
  vehicles::append_odometer_reading( &mut *conn, vehicle.id, 10_000, Utc::now() ).await.unwrap();
}

#[ sqlx::test( migrations = false ) ]
async fn readings_are_per_vehicle( pool: PgPool )
{
  common::prepare( &pool ).await;
  let high = common::fixture_vehicle( &pool, 500, 90_000 ).await;
  let low = common::fixture_vehicle( &pool, 500, 1_000 ).await;

  let mut conn = pool.acquire().await.unwrap();
  vehicles::append_odometer_reading( &mut *conn, high.id, 90_000, Utc::now() ).await.unwrap();
  // The low-mileage vehicle is not constrained by the other's log.
  vehicles::append_odometer_reading( &mut *conn, low.id, 1_100, Utc::now() ).await.unwrap();
}

#[ sqlx::test( migrations = false ) ]
async fn optimistic_lock_detects_stale_version( pool: PgPool )
{
  common::prepare( &pool ).await;
  let mut vehicle = common::fixture_vehicle( &pool, 500, 10_000 ).await;

  let mut conn = pool.acquire().await.unwrap();

  let stale_version = vehicle.version;
  vehicle.color = "blue".to_string();
  vehicles::update_locked( &mut *conn, &vehicle, stale_version ).await.unwrap();

  // The trigger bumped the version; the old one no longer matches.
  vehicle.color = "red".to_string();
  let err = vehicles::update_locked( &mut *conn, &vehicle, stale_version ).await.unwrap_err();
  assert_eq!( err.code(), "OPTIMISTIC_LOCK_FAILURE" );

  // A fresh read carries the current version and succeeds.
  let current = vehicles::find_by_id( &mut *conn, vehicle.id ).await.unwrap();
  assert_eq!( current.version, stale_version + 1 );
  vehicles::update_locked( &mut *conn, &current, current.version ).await.unwrap();
}
