//! Customer repository.

use sqlx::{ PgConnection, Row };
use uuid::Uuid;

use crate::error::map_db_err;
use fleet_types::pagination::{ clamp_limit, CursorPage };
use fleet_types::{ Customer, FleetError, Result };

const CUSTOMER_COLUMNS: &str =
  "id, email, phone, first_name, last_name, driver_license_number, \
   driver_license_expiry, address_line, city, province, postal_code, \
   is_active, created_at, updated_at";

fn from_row( row: &sqlx::postgres::PgRow ) -> Customer
{
  Customer
  {
    id: row.get( "id" ),
    email: row.get( "email" ),
    phone: row.get( "phone" ),
    first_name: row.get( "first_name" ),
    last_name: row.get( "last_name" ),
    driver_license_number: row.get( "driver_license_number" ),
    driver_license_expiry: row.get( "driver_license_expiry" ),
    address_line: row.get( "address_line" ),
    city: row.get( "city" ),
    province: row.get( "province" ),
    postal_code: row.get( "postal_code" ),
    is_active: row.get( "is_active" ),
    created_at: row.get( "created_at" ),
    updated_at: row.get( "updated_at" ),
  }
}

/// Insert a new customer.
pub async fn insert( conn: &mut PgConnection, customer: &Customer ) -> Result< () >
{
  sqlx::query(
    "INSERT INTO customers
       (id, email, phone, first_name, last_name, driver_license_number,
        driver_license_expiry, address_line, city, province, postal_code, is_active)
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
  )
  .bind( customer.id )
  .bind( &customer.email )
  .bind( &customer.phone )
  .bind( &customer.first_name )
  .bind( &customer.last_name )
  .bind( &customer.driver_license_number )
  .bind( customer.driver_license_expiry )
  .bind( &customer.address_line )
  .bind( &customer.city )
  .bind( &customer.province )
  .bind( &customer.postal_code )
  .bind( customer.is_active )
  .execute( conn )
  .await
  .map_err( map_db_err )?;
  Ok( () )
}

/// Fetch one customer.
///
/// # Errors
///
/// `NOT_FOUND` when the id does not exist.
pub async fn find_by_id( conn: &mut PgConnection, id: Uuid ) -> Result< Customer >
{
  let query = format!( "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = $1" );
  let row = sqlx::query( &query )
    .bind( id )
    .fetch_optional( conn )
    .await
    .map_err( map_db_err )?
    .ok_or_else( || FleetError::NotFound( format!( "customer {id}" ) ) )?;
  Ok( from_row( &row ) )
}

/// Cursor-paged listing.
pub async fn list(
  conn: &mut PgConnection,
  limit: Option< i64 >,
  cursor: Option< Uuid >,
) -> Result< CursorPage< Customer > >
{
  let limit = clamp_limit( limit );

  let total: i64 = sqlx::query_scalar( "SELECT COUNT(*) FROM customers" )
    .fetch_one( &mut *conn )
    .await
    .map_err( map_db_err )?;

  let query = format!(
    "SELECT {CUSTOMER_COLUMNS} FROM customers
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

  let items = rows.iter().map( from_row ).collect();
  Ok( CursorPage::new( items, limit, total, |c: &Customer| c.id ) )
}
