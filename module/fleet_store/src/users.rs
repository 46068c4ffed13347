//! Authentication-user storage.

use sqlx::{ PgConnection, Row };
use uuid::Uuid;

use crate::error::map_db_err;
use fleet_types::{ AppUser, FleetError, Result, Role };

fn from_row( row: &sqlx::postgres::PgRow ) -> Result< AppUser >
{
  let raw_roles: Vec< String > = row.get( "roles" );
  let roles = raw_roles
    .iter()
    .map( |r| Role::parse( r ) )
    .collect::< Result< Vec< _ > > >()?;

  Ok( AppUser
  {
    id: row.get( "id" ),
    email: row.get( "email" ),
    password_hash: row.get( "password_hash" ),
    roles,
    is_active: row.get( "is_active" ),
    created_at: row.get( "created_at" ),
    updated_at: row.get( "updated_at" ),
  } )
}

/// Insert a new user.
///
/// # Errors
///
/// `CONFLICT` on a duplicate email.
pub async fn insert( conn: &mut PgConnection, user: &AppUser ) -> Result< () >
{
  let roles: Vec< String > = user.roles.iter().map( |r| r.as_str().to_string() ).collect();

  sqlx::query(
    "INSERT INTO app_users (id, email, password_hash, roles, is_active)
     VALUES ($1, $2, $3, $4, $5)",
  )
  .bind( user.id )
  .bind( &user.email )
  .bind( &user.password_hash )
  .bind( roles )
  .bind( user.is_active )
  .execute( conn )
  .await
  .map_err( map_db_err )?;
  Ok( () )
}

/// Fetch by login email; `None` when unknown (login flows must not
/// distinguish that case observably, so no error kind here).
pub async fn find_by_email( conn: &mut PgConnection, email: &str ) -> Result< Option< AppUser > >
{
  let row = sqlx::query(
    "SELECT id, email, password_hash, roles, is_active, created_at, updated_at
       FROM app_users WHERE email = $1",
  )
  .bind( email )
  .fetch_optional( conn )
  .await
  .map_err( map_db_err )?;

  row.as_ref().map( from_row ).transpose()
}

/// Fetch one user by id.
///
/// # Errors
///
/// `NOT_FOUND` when the id does not exist.
pub async fn find_by_id( conn: &mut PgConnection, id: Uuid ) -> Result< AppUser >
{
  let row = sqlx::query(
    "SELECT id, email, password_hash, roles, is_active, created_at, updated_at
       FROM app_users WHERE id = $1",
  )
  .bind( id )
  .fetch_optional( conn )
  .await
  .map_err( map_db_err )?
  .ok_or_else( || FleetError::NotFound( format!( "user {id}" ) ) )?;
  from_row( &row )
}
