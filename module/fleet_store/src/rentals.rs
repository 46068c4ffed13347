//! Rental repository.
//!
//! Inserts and status updates fire the `rentals_sync_period` trigger,
//! which maintains `rental_periods` and with it the booking-overlap
//! exclusion constraint. A conflicting insert or transition therefore
//! fails at this layer with `RENTAL_CONFLICT`, regardless of what the
//! application believed it had checked.

use sqlx::{ PgConnection, Row };
use uuid::Uuid;

use crate::error::map_db_err;
use fleet_types::pagination::{ clamp_limit, CursorPage };
use fleet_types::{ FleetError, Rental, RentalStatus, Result };

const RENTAL_COLUMNS: &str =
  "id, rental_number, customer_id, vehicle_id, status, start_date, end_date, \
   actual_start_date, actual_end_date, daily_rate, total_amount, currency, \
   start_odometer_km, end_odometer_km, created_at, updated_at";

fn from_row( row: &sqlx::postgres::PgRow ) -> Result< Rental >
{
  Ok( Rental
  {
    id: row.get( "id" ),
    rental_number: row.get( "rental_number" ),
    customer_id: row.get( "customer_id" ),
    vehicle_id: row.get( "vehicle_id" ),
    status: RentalStatus::parse( row.get( "status" ) )?,
    start_date: row.get( "start_date" ),
    end_date: row.get( "end_date" ),
    actual_start_date: row.get( "actual_start_date" ),
    actual_end_date: row.get( "actual_end_date" ),
    daily_rate: row.get( "daily_rate" ),
    total_amount: row.get( "total_amount" ),
    currency: row.get( "currency" ),
    start_odometer_km: row.get( "start_odometer_km" ),
    end_odometer_km: row.get( "end_odometer_km" ),
    created_at: row.get( "created_at" ),
    updated_at: row.get( "updated_at" ),
  } )
}

/// Insert a new reservation.
///
/// # Errors
///
/// `RENTAL_CONFLICT` when the exclusion constraint rejects the window.
pub async fn insert( conn: &mut PgConnection, rental: &Rental ) -> Result< () >
{
  sqlx::query(
    "INSERT INTO rentals
       (id, rental_number, customer_id, vehicle_id, status, start_date, end_date,
        daily_rate, total_amount, currency)
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
  )
  .bind( rental.id )
  .bind( &rental.rental_number )
  .bind( rental.customer_id )
  .bind( rental.vehicle_id )
  .bind( rental.status.as_str() )
  .bind( rental.start_date )
  .bind( rental.end_date )
  .bind( rental.daily_rate )
  .bind( rental.total_amount )
  .bind( &rental.currency )
  .execute( conn )
  .await
  .map_err( map_db_err )?;
  Ok( () )
}

/// Persist a state transition and its lifecycle fields.
pub async fn update_transition( conn: &mut PgConnection, rental: &Rental ) -> Result< () >
{
  let result = sqlx::query(
    "UPDATE rentals
        SET status = $1, actual_start_date = $2, actual_end_date = $3,
            start_odometer_km = $4, end_odometer_km = $5, updated_at = $6
      WHERE id = $7",
  )
  .bind( rental.status.as_str() )
  .bind( rental.actual_start_date )
  .bind( rental.actual_end_date )
  .bind( rental.start_odometer_km )
  .bind( rental.end_odometer_km )
  .bind( rental.updated_at )
  .bind( rental.id )
  .execute( conn )
  .await
  .map_err( map_db_err )?;

  if result.rows_affected() == 0
  {
    return Err( FleetError::NotFound( format!( "rental {}", rental.id ) ) );
  }
  Ok( () )
}

/// Fetch one rental.
///
/// # Errors
///
/// `NOT_FOUND` when the id does not exist.
pub async fn find_by_id( conn: &mut PgConnection, id: Uuid ) -> Result< Rental >
{
  let query = format!( "SELECT {RENTAL_COLUMNS} FROM rentals WHERE id = $1" );
  let row = sqlx::query( &query )
    .bind( id )
    .fetch_optional( conn )
    .await
    .map_err( map_db_err )?
    .ok_or_else( || FleetError::NotFound( format!( "rental {id}" ) ) )?;
  from_row( &row )
}

/// Lock one rental row for the rest of the transaction.
///
/// Used by activate/complete/cancel so two concurrent transitions of the
/// same rental serialize instead of double-applying side effects.
pub async fn find_by_id_for_update( conn: &mut PgConnection, id: Uuid ) -> Result< Rental >
{
  let query = format!( "SELECT {RENTAL_COLUMNS} FROM rentals WHERE id = $1 FOR UPDATE" );
  let row = sqlx::query( &query )
    .bind( id )
    .fetch_optional( conn )
    .await
    .map_err( map_db_err )?
    .ok_or_else( || FleetError::NotFound( format!( "rental {id}" ) ) )?;
  from_row( &row )
}

/// Cursor-paged listing, optionally filtered by vehicle or status.
pub async fn list(
  conn: &mut PgConnection,
  vehicle_id: Option< Uuid >,
  status: Option< RentalStatus >,
  limit: Option< i64 >,
  cursor: Option< Uuid >,
) -> Result< CursorPage< Rental > >
{
  let limit = clamp_limit( limit );
  let status_str = status.map( RentalStatus::as_str );

  let total: i64 = sqlx::query_scalar(
    "SELECT COUNT(*) FROM rentals
      WHERE ($1::uuid IS NULL OR vehicle_id = $1)
        AND ($2::text IS NULL OR status = $2)",
  )
  .bind( vehicle_id )
  .bind( status_str )
  .fetch_one( &mut *conn )
  .await
  .map_err( map_db_err )?;

  let query = format!(
    "SELECT {RENTAL_COLUMNS} FROM rentals
     WHERE ($1::uuid IS NULL OR vehicle_id = $1)
       AND ($2::text IS NULL OR status = $2)
       AND ($3::uuid IS NULL OR id > $3)
     ORDER BY id
     LIMIT $4"
  );
  let rows = sqlx::query( &query )
    .bind( vehicle_id )
    .bind( status_str )
    .bind( cursor )
    .bind( limit )
    .fetch_all( conn )
    .await
    .map_err( map_db_err )?;

  let items = rows.iter().map( from_row ).collect::< Result< Vec< _ > > >()?;
  Ok( CursorPage::new( items, limit, total, |r| r.id ) )
}
