//! Vehicle repository: CRUD, optimistic-locked updates, odometer log.

use chrono::{ DateTime, Utc };
use sqlx::{ PgConnection, Row };
use uuid::Uuid;

use crate::error::map_db_err;
use fleet_types::pagination::{ clamp_limit, CursorPage };
use fleet_types::{ FleetError, Result, Vehicle, VehicleState };

const VEHICLE_COLUMNS: &str =
  "id, vin, plate, make, model, year, color, state, mileage_km, daily_rate_amount, \
   currency, passenger_capacity, last_location, route_progress, bearing, version, \
   created_at, updated_at";

fn from_row( row: &sqlx::postgres::PgRow ) -> Result< Vehicle >
{
  Ok( Vehicle
  {
    id: row.get( "id" ),
    vin: row.get( "vin" ),
    plate: row.get( "plate" ),
    make: row.get( "make" ),
    model: row.get( "model" ),
    year: row.get( "year" ),
    color: row.get( "color" ),
    state: VehicleState::parse( row.get( "state" ) )?,
    mileage_km: row.get( "mileage_km" ),
    daily_rate_amount: row.get( "daily_rate_amount" ),
    currency: row.get( "currency" ),
    passenger_capacity: row.get( "passenger_capacity" ),
    last_location: row.get( "last_location" ),
    route_progress: row.get( "route_progress" ),
    bearing: row.get( "bearing" ),
    version: row.get( "version" ),
    created_at: row.get( "created_at" ),
    updated_at: row.get( "updated_at" ),
  } )
}

/// Insert a new vehicle.
pub async fn insert( conn: &mut PgConnection, vehicle: &Vehicle ) -> Result< () >
{
  sqlx::query(
    "INSERT INTO vehicles
       (id, vin, plate, make, model, year, color, state, mileage_km,
        daily_rate_amount, currency, passenger_capacity, last_location,
        route_progress, bearing)
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
  )
  .bind( vehicle.id )
  .bind( &vehicle.vin )
  .bind( &vehicle.plate )
  .bind( &vehicle.make )
  .bind( &vehicle.model )
  .bind( vehicle.year )
  .bind( &vehicle.color )
  .bind( vehicle.state.as_str() )
  .bind( vehicle.mileage_km )
  .bind( vehicle.daily_rate_amount )
  .bind( &vehicle.currency )
  .bind( vehicle.passenger_capacity )
  .bind( &vehicle.last_location )
  .bind( vehicle.route_progress )
  .bind( vehicle.bearing )
  .execute( conn )
  .await
  .map_err( map_db_err )?;
  Ok( () )
}

/// Fetch one vehicle.
///
/// # Errors
///
/// `NOT_FOUND` when the id does not exist.
pub async fn find_by_id( conn: &mut PgConnection, id: Uuid ) -> Result< Vehicle >
{
  let query = format!( "SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE id = $1" );
  let row = sqlx::query( &query )
    .bind( id )
    .fetch_optional( conn )
    .await
    .map_err( map_db_err )?
    .ok_or_else( || FleetError::NotFound( format!( "vehicle {id}" ) ) )?;
  from_row( &row )
}

/// Cursor-paged listing, newest ids last so the cursor walks forward.
pub async fn list(
  conn: &mut PgConnection,
  limit: Option< i64 >,
  cursor: Option< Uuid >,
) -> Result< CursorPage< Vehicle > >
{
  let limit = clamp_limit( limit );

  let total: i64 = sqlx::query_scalar( "SELECT COUNT(*) FROM vehicles" )
    .fetch_one( &mut *conn )
    .await
    .map_err( map_db_err )?;

  let query = format!(
    "SELECT {VEHICLE_COLUMNS} FROM vehicles
     WHERE ($1::uuid IS NULL OR id > $1)
     ORDER BY id
     LIMIT $2"
  );
  let rows = sqlx::query( &query )
    .bind( cursor )
    .bind( limit )
    .fetch_all( conn )
    .await
    .map_err( map_db_err )?;

  let items = rows.iter().map( from_row ).collect::< Result< Vec< _ > > >()?;
  Ok( CursorPage::new( items, limit, total, |v| v.id ) )
}

/// Persist mutated fields under optimistic locking.
///
/// The caller passes the version it read; the storage trigger bumps the
/// column, so zero affected rows means another writer got there first.
///
/// # Errors
///
/// `OPTIMISTIC_LOCK_FAILURE` when the expected version is stale.
pub async fn update_locked(
  conn: &mut PgConnection,
  vehicle: &Vehicle,
  expected_version: i64,
) -> Result< () >
{
  let result = sqlx::query(
    "UPDATE vehicles
        SET make = $1, model = $2, year = $3, color = $4, state = $5,
            mileage_km = $6, daily_rate_amount = $7, passenger_capacity = $8,
            last_location = $9, route_progress = $10, bearing = $11
      WHERE id = $12 AND version = $13",
  )
  .bind( &vehicle.make )
  .bind( &vehicle.model )
  .bind( vehicle.year )
  .bind( &vehicle.color )
  .bind( vehicle.state.as_str() )
  .bind( vehicle.mileage_km )
  .bind( vehicle.daily_rate_amount )
  .bind( vehicle.passenger_capacity )
  .bind( &vehicle.last_location )
  .bind( vehicle.route_progress )
  .bind( vehicle.bearing )
  .bind( vehicle.id )
  .bind( expected_version )
  .execute( conn )
  .await
  .map_err( map_db_err )?;

  if result.rows_affected() == 0
  {
    return Err( FleetError::OptimisticLock( format!(
      "vehicle {} was modified concurrently (expected version {expected_version})", vehicle.id
    ) ) );
  }
  Ok( () )
}

/// Append an odometer reading. The storage trigger rejects decreases.
///
/// # Errors
///
/// `INVALID_MILEAGE` when the reading is below the latest stored one.
pub async fn append_odometer_reading(
  conn: &mut PgConnection,
  vehicle_id: Uuid,
  reading_km: i64,
  recorded_at: DateTime< Utc >,
) -> Result< () >
{
  sqlx::query(
    "INSERT INTO odometer_readings (vehicle_id, reading_km, recorded_at)
     VALUES ($1, $2, $3)",
  )
  .bind( vehicle_id )
  .bind( reading_km )
  .bind( recorded_at )
  .execute( conn )
  .await
  .map_err( map_db_err )?;
  Ok( () )
}

/// Latest stored odometer reading, if any.
pub async fn latest_odometer_reading(
  conn: &mut PgConnection,
  vehicle_id: Uuid,
) -> Result< Option< i64 > >
{
  sqlx::query_scalar(
    "SELECT reading_km FROM odometer_readings
      WHERE vehicle_id = $1 ORDER BY id DESC LIMIT 1",
  )
  .bind( vehicle_id )
  .fetch_optional( conn )
  .await
  .map_err( map_db_err )
}
