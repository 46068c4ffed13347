//! Translation of storage failures into the domain taxonomy.
//!
//! Violations with a semantic meaning are re-interpreted here, at the
//! boundary: the booking exclusion constraint becomes `RENTAL_CONFLICT`,
//! trigger-raised odometer and balance failures become their dedicated
//! kinds, and everything else surfaces as `DATABASE_ERROR` without
//! leaking internals past the error message.

use fleet_types::FleetError;

/// Postgres error code for exclusion-constraint violations.
const EXCLUSION_VIOLATION: &str = "23P01";
/// Postgres error code for unique-constraint violations.
const UNIQUE_VIOLATION: &str = "23505";

/// The booking-overlap constraint on `rental_periods`.
pub const RENTAL_OVERLAP_CONSTRAINT: &str = "rental_periods_no_overlap";
/// The idempotency anchor on `ledger_entries`.
pub const LEDGER_REFERENCE_CONSTRAINT: &str = "ledger_entries_external_reference_key";

/// Map a `sqlx` failure onto the domain taxonomy.
pub fn map_db_err( err: sqlx::Error ) -> FleetError
{
  match &err
  {
    sqlx::Error::RowNotFound => FleetError::NotFound( "row not found".to_string() ),
    sqlx::Error::Database( db ) =>
    {
      let code = db.code().map( |c| c.to_string() ).unwrap_or_default();
      let constraint = db.constraint().unwrap_or( "" );
      let message = db.message().to_string();

      if code == EXCLUSION_VIOLATION && constraint == RENTAL_OVERLAP_CONSTRAINT
      {
        return FleetError::RentalConflict(
          "vehicle already booked for an overlapping window".to_string(),
        );
      }
      if message.contains( "INVALID_MILEAGE" )
      {
        return FleetError::InvalidMileage( message );
      }
      if message.contains( "UNBALANCED_ENTRY" )
      {
        return FleetError::validation( message );
      }
      if code == UNIQUE_VIOLATION
      {
        return FleetError::Conflict( format!( "duplicate value violates {constraint}" ) );
      }

      FleetError::Database( message )
    }
    _ => FleetError::Database( err.to_string() ),
  }
}

/// Whether a failure is the ledger external-reference unique violation,
/// which posting treats as idempotent success rather than an error.
pub fn is_ledger_reference_conflict( err: &sqlx::Error ) -> bool
{
  match err
  {
    sqlx::Error::Database( db ) =>
    {
      db.code().as_deref() == Some( UNIQUE_VIOLATION )
        && db.constraint() == Some( LEDGER_REFERENCE_CONSTRAINT )
    }
    _ => false,
  }
}
