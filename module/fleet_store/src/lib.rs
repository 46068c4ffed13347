//! # `fleet_store`
//!
//! Postgres persistence for the fleet management backend.
//!
//! Durable state and the load-bearing invariants live here, below the
//! application: the booking-overlap exclusion constraint, the odometer
//! monotonicity trigger, the deferred ledger-balance trigger, and the
//! optimistic-locking version columns. Repositories are plain async
//! functions over `&mut PgConnection` so they compose into a single
//! transaction when a use-case mutates more than one aggregate.
//!
//! Migrations are embedded SQL applied once at startup, before the
//! service accepts traffic, with checksum-repair semantics for databases
//! that were partially migrated by an older build.

pub mod error;
pub mod migrations;
pub mod seed;
pub mod vehicles;
pub mod customers;
pub mod rentals;
pub mod maintenance;
pub mod accounts;
pub mod invoices;
pub mod users;
pub mod idempotency;
pub mod outbox;
pub mod housekeeping;

use sqlx::postgres::{ PgPool, PgPoolOptions };
use std::time::Duration;

pub use error::map_db_err;

/// Connect a pool with the configured size, bounded timeouts, and
/// REPEATABLE READ as the default isolation for every session.
///
/// # Errors
///
/// Returns the underlying `sqlx` error when the database is unreachable.
pub async fn connect_pool( database_url: &str, pool_size: u32 ) -> Result< PgPool, sqlx::Error >
{
  PgPoolOptions::new()
    .max_connections( pool_size )
    .acquire_timeout( Duration::from_secs( 5 ) )
    .after_connect( |conn, _meta| Box::pin( async move
    {
      sqlx::query(
        "SET SESSION CHARACTERISTICS AS TRANSACTION ISOLATION LEVEL REPEATABLE READ",
      )
      .execute( conn )
      .await?;
      Ok( () )
    } ) )
    .connect( database_url )
    .await
}

/// Draw the next value of `sequence` and format it as `PREFIX-NNNNNN`.
///
/// Used for every human-facing document number (`RNT-`, `MNT-`, `INV-`,
/// `PAY-`, `JE-`).
pub async fn next_document_number(
  conn: &mut sqlx::PgConnection,
  sequence: &str,
  prefix: &str,
) -> fleet_types::Result< String >
{
  // Sequence names are compile-time constants, never caller input.
  let query = format!( "SELECT nextval('{sequence}')" );
  let value: i64 = sqlx::query_scalar( &query )
    .fetch_one( conn )
    .await
    .map_err( map_db_err )?;
  Ok( format!( "{prefix}-{value:06}" ) )
}
