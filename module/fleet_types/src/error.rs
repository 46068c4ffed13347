//! Typed error taxonomy shared by every layer.
//!
//! Use-cases raise these kinds; the HTTP boundary maps them onto status
//! codes and the error envelope. Storage-layer violations with a semantic
//! meaning (exclusion-constraint overlap, external-reference duplicates)
//! are re-interpreted into these kinds at the repository boundary.

use serde::{ Deserialize, Serialize };
use thiserror::Error;

/// A single field-level validation failure, reported in the error envelope.
#[ derive( Debug, Clone, PartialEq, Eq, Serialize, Deserialize ) ]
pub struct FieldViolation
{
  /// Field name as it appears on the wire.
  pub field: String,
  /// Machine-readable reason, e.g. `invalid_format`.
  pub reason: String,
}

impl FieldViolation
{
  /// Build a violation for `field` with the given `reason`.
  pub fn new( field: impl Into< String >, reason: impl Into< String > ) -> Self
  {
    Self { field: field.into(), reason: reason.into() }
  }
}

/// Domain error for all fleet operations.
#[ derive( Debug, Error ) ]
pub enum FleetError
{
  /// Malformed field, missing required value, or semantic violation.
  #[ error( "validation failed: {message}" ) ]
  Validation
  {
    /// Human-readable summary.
    message: String,
    /// Field-level detail, possibly empty.
    details: Vec< FieldViolation >,
  },

  /// Requested entity does not exist.
  #[ error( "not found: {0}" ) ]
  NotFound( String ),

  /// Missing or invalid credentials.
  #[ error( "unauthenticated: {0}" ) ]
  Unauthenticated( String ),

  /// Authenticated principal lacks a required role.
  #[ error( "forbidden: {0}" ) ]
  Forbidden( String ),

  /// Generic conflict (duplicate key, concurrent duplicate request).
  #[ error( "conflict: {0}" ) ]
  Conflict( String ),

  /// Booking overlap on the same vehicle.
  #[ error( "rental conflict: {0}" ) ]
  RentalConflict( String ),

  /// Illegal state transition.
  #[ error( "invalid state: {0}" ) ]
  InvalidState( String ),

  /// Odometer reading below the latest stored reading.
  #[ error( "invalid mileage: {0}" ) ]
  InvalidMileage( String ),

  /// Version column mismatch on update; the caller's view was stale.
  #[ error( "optimistic lock failure: {0}" ) ]
  OptimisticLock( String ),

  /// Duplicate idempotency key whose first request has not completed.
  #[ error( "request in progress: {0}" ) ]
  RequestInProgress( String ),

  /// Rate-limit bucket exhausted.
  #[ error( "rate limited, retry in {retry_after_secs}s" ) ]
  RateLimited
  {
    /// Seconds until the oldest bucket entry expires.
    retry_after_secs: u64,
  },

  /// Unclassified storage failure.
  #[ error( "database error: {0}" ) ]
  Database( String ),

  /// Catch-all for unexpected internal failures.
  #[ error( "internal error: {0}" ) ]
  Internal( String ),
}

impl FleetError
{
  /// Validation error without field detail.
  pub fn validation( message: impl Into< String > ) -> Self
  {
    Self::Validation { message: message.into(), details: Vec::new() }
  }

  /// Validation error carrying field-level detail.
  pub fn validation_fields( message: impl Into< String >, details: Vec< FieldViolation > ) -> Self
  {
    Self::Validation { message: message.into(), details }
  }

  /// Stable machine code for the error envelope.
  pub fn code( &self ) -> &'static str
  {
    match self
    {
      Self::Validation { .. } => "VALIDATION_ERROR",
      Self::NotFound( _ ) => "NOT_FOUND",
      Self::Unauthenticated( _ ) => "UNAUTHENTICATED",
      Self::Forbidden( _ ) => "FORBIDDEN",
      Self::Conflict( _ ) => "CONFLICT",
      Self::RentalConflict( _ ) => "RENTAL_CONFLICT",
      Self::InvalidState( _ ) => "INVALID_STATE",
      Self::InvalidMileage( _ ) => "INVALID_MILEAGE",
      Self::OptimisticLock( _ ) => "OPTIMISTIC_LOCK_FAILURE",
      Self::RequestInProgress( _ ) => "REQUEST_IN_PROGRESS",
      Self::RateLimited { .. } => "RATE_LIMITED",
      Self::Database( _ ) => "DATABASE_ERROR",
      Self::Internal( _ ) => "INTERNAL_ERROR",
    }
  }
}

/// Result alias for fleet operations.
pub type Result< T > = core::result::Result< T, FleetError >;

#[ cfg( test ) ]
mod tests
{
  use super::*;

  #[ test ]
  fn codes_are_stable()
  {
    assert_eq!( FleetError::validation( "x" ).code(), "VALIDATION_ERROR" );
    assert_eq!( FleetError::RentalConflict( "x".into() ).code(), "RENTAL_CONFLICT" );
    assert_eq!( FleetError::OptimisticLock( "x".into() ).code(), "OPTIMISTIC_LOCK_FAILURE" );
    assert_eq!( FleetError::RateLimited { retry_after_secs: 3 }.code(), "RATE_LIMITED" );
  }

  #[ test ]
  fn validation_fields_carry_detail()
  {
    let err = FleetError::validation_fields(
      "bad email",
      vec![ FieldViolation::new( "email", "invalid_format" ) ],
    );
    match err
    {
      FleetError::Validation { details, .. } =>
      {
        assert_eq!( details.len(), 1 );
        assert_eq!( details[ 0 ].field, "email" );
      }
      other => panic!( "unexpected variant: {other:?}" ),
    }
  }
}
