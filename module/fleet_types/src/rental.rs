//! Rental aggregate, its state machine, and the billable-day rule.
//!
//! ```text
//! RESERVED --activate--> ACTIVE --complete--> COMPLETED (terminal)
//!    |                     |
//!    +--cancel-------------+--cancel--> CANCELLED (terminal)
//! ```
//!
//! The non-overlap invariant across rentals of one vehicle is enforced by
//! the storage exclusion constraint, not here; this type only guards its
//! own transitions.

use chrono::{ DateTime, Utc };
use serde::{ Deserialize, Serialize };
use uuid::Uuid;

use crate::error::{ FleetError, Result };
use crate::Amount;

const SECS_PER_DAY: i64 = 86_400;

/// Rental lifecycle status.
#[ derive( Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize ) ]
#[ serde( rename_all = "SCREAMING_SNAKE_CASE" ) ]
pub enum RentalStatus
{
  /// Booked, blocking the window, not yet picked up.
  Reserved,
  /// Vehicle handed over.
  Active,
  /// Returned. Terminal.
  Completed,
  /// Abandoned before or during the rental. Terminal.
  Cancelled,
}

impl RentalStatus
{
  /// Database / wire representation.
  pub fn as_str( self ) -> &'static str
  {
    match self
    {
      Self::Reserved => "RESERVED",
      Self::Active => "ACTIVE",
      Self::Completed => "COMPLETED",
      Self::Cancelled => "CANCELLED",
    }
  }

  /// Parse the database representation.
  pub fn parse( s: &str ) -> Result< Self >
  {
    match s
    {
      "RESERVED" => Ok( Self::Reserved ),
      "ACTIVE" => Ok( Self::Active ),
      "COMPLETED" => Ok( Self::Completed ),
      "CANCELLED" => Ok( Self::Cancelled ),
      other => Err( FleetError::Internal( format!( "unknown rental status '{other}'" ) ) ),
    }
  }

  /// Whether this status occupies the vehicle's booking window.
  pub fn blocks_window( self ) -> bool
  {
    matches!( self, Self::Reserved | Self::Active )
  }
}

/// Billable days for a window: `ceil((end - start) / 1 day)`.
///
/// # Errors
///
/// `VALIDATION_ERROR` unless `end > start`.
pub fn billable_days( start: DateTime< Utc >, end: DateTime< Utc > ) -> Result< i64 >
{
  let secs = ( end - start ).num_seconds();
  if secs <= 0
  {
    return Err( FleetError::validation_fields(
      "endDate must be after startDate",
      vec![ crate::FieldViolation::new( "endDate", "must_be_after_start" ) ],
    ) );
  }
  Ok( ( secs + SECS_PER_DAY - 1 ) / SECS_PER_DAY )
}

/// A rental booking.
#[ derive( Debug, Clone, Serialize, Deserialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct Rental
{
  /// Stable identifier.
  pub id: Uuid,
  /// Human-facing number, unique, `RNT-...`.
  pub rental_number: String,
  /// Renting customer.
  pub customer_id: Uuid,
  /// Booked vehicle.
  pub vehicle_id: Uuid,
  /// Lifecycle status.
  pub status: RentalStatus,
  /// Booked window start.
  pub start_date: DateTime< Utc >,
  /// Booked window end, strictly after start.
  pub end_date: DateTime< Utc >,
  /// Actual pickup instant.
  pub actual_start_date: Option< DateTime< Utc > >,
  /// Actual return instant, never before pickup.
  pub actual_end_date: Option< DateTime< Utc > >,
  /// Rate per billable day at booking time.
  pub daily_rate: Amount,
  /// `billable_days × daily_rate`, non-negative.
  pub total_amount: Amount,
  /// Currency code; always PHP.
  pub currency: String,
  /// Odometer at pickup.
  pub start_odometer_km: Option< i64 >,
  /// Odometer at return, never below pickup.
  pub end_odometer_km: Option< i64 >,
  /// Creation instant.
  pub created_at: DateTime< Utc >,
  /// Last update instant.
  pub updated_at: DateTime< Utc >,
}

impl Rental
{
  /// Build a new reservation, deriving the total from the window.
  ///
  /// # Errors
  ///
  /// `VALIDATION_ERROR` when the window is empty or the rate is negative.
  #[ allow( clippy::too_many_arguments ) ]
  pub fn reserve(
    id: Uuid,
    rental_number: String,
    customer_id: Uuid,
    vehicle_id: Uuid,
    start_date: DateTime< Utc >,
    end_date: DateTime< Utc >,
    daily_rate: Amount,
    now: DateTime< Utc >,
  ) -> Result< Self >
  {
    if daily_rate < 0
    {
      return Err( FleetError::validation( "daily rate cannot be negative" ) );
    }
    let days = billable_days( start_date, end_date )?;

    Ok( Self
    {
      id,
      rental_number,
      customer_id,
      vehicle_id,
      status: RentalStatus::Reserved,
      start_date,
      end_date,
      actual_start_date: None,
      actual_end_date: None,
      daily_rate,
      total_amount: days * daily_rate,
      currency: crate::CURRENCY_PHP.to_string(),
      start_odometer_km: None,
      end_odometer_km: None,
      created_at: now,
      updated_at: now,
    } )
  }

  /// RESERVED → ACTIVE at pickup.
  pub fn activate( &mut self, start_odometer_km: i64, now: DateTime< Utc > ) -> Result< () >
  {
    if self.status != RentalStatus::Reserved
    {
      return Err( FleetError::InvalidState( format!(
        "cannot activate rental {} in {} status", self.id, self.status.as_str()
      ) ) );
    }
    if start_odometer_km < 0
    {
      return Err( FleetError::validation( "start odometer cannot be negative" ) );
    }
    self.status = RentalStatus::Active;
    self.actual_start_date = Some( now );
    self.start_odometer_km = Some( start_odometer_km );
    self.updated_at = now;
    Ok( () )
  }

  /// ACTIVE → COMPLETED at return.
  pub fn complete( &mut self, end_odometer_km: i64, now: DateTime< Utc > ) -> Result< () >
  {
    if self.status != RentalStatus::Active
    {
      return Err( FleetError::InvalidState( format!(
        "cannot complete rental {} in {} status", self.id, self.status.as_str()
      ) ) );
    }
    if let Some( start_km ) = self.start_odometer_km
    {
      if end_odometer_km < start_km
      {
        return Err( FleetError::InvalidMileage( format!(
          "final mileage {end_odometer_km} km is below pickup reading {start_km} km"
        ) ) );
      }
    }
    self.status = RentalStatus::Completed;
    self.actual_end_date = Some( now );
    self.end_odometer_km = Some( end_odometer_km );
    self.updated_at = now;
    Ok( () )
  }

  /// RESERVED/ACTIVE → CANCELLED.
  ///
  /// Accounting is not reversed here; a credit-memo flow handles that
  /// separately.
  pub fn cancel( &mut self, now: DateTime< Utc > ) -> Result< () >
  {
    match self.status
    {
      RentalStatus::Reserved | RentalStatus::Active =>
      {
        self.status = RentalStatus::Cancelled;
        self.updated_at = now;
        Ok( () )
      }
      current => Err( FleetError::InvalidState( format!(
        "cannot cancel rental {} in {} status", self.id, current.as_str()
      ) ) ),
    }
  }
}

#[ cfg( test ) ]
mod tests
{
  use super::*;
  use chrono::TimeZone;

  fn window() -> ( DateTime< Utc >, DateTime< Utc > )
  {
    (
      Utc.with_ymd_and_hms( 2026, 6, 1, 10, 0, 0 ).unwrap(),
      Utc.with_ymd_and_hms( 2026, 6, 5, 10, 0, 0 ).unwrap(),
    )
  }

  fn rental() -> Rental
  {
    let ( start, end ) = window();
    Rental::reserve(
      Uuid::new_v4(),
      "RNT-000001".to_string(),
      Uuid::new_v4(),
      Uuid::new_v4(),
      start,
      end,
      500,
      Utc::now(),
    )
    .unwrap()
  }

  #[ test ]
  fn four_exact_days_cost_four_rates()
  {
    let r = rental();
    assert_eq!( r.total_amount, 2_000 );
    assert_eq!( r.status, RentalStatus::Reserved );
  }

  #[ test ]
  fn partial_day_rounds_up()
  {
    let start = Utc.with_ymd_and_hms( 2026, 6, 1, 10, 0, 0 ).unwrap();
    let end = Utc.with_ymd_and_hms( 2026, 6, 2, 10, 0, 1 ).unwrap();
    assert_eq!( billable_days( start, end ).unwrap(), 2 );
  }

  #[ test ]
  fn empty_window_is_rejected()
  {
    let start = Utc.with_ymd_and_hms( 2026, 6, 1, 10, 0, 0 ).unwrap();
    assert_eq!( billable_days( start, start ).unwrap_err().code(), "VALIDATION_ERROR" );
  }

  #[ test ]
  fn lifecycle_happy_path()
  {
    let mut r = rental();
    r.activate( 10_000, Utc::now() ).unwrap();
    assert_eq!( r.status, RentalStatus::Active );
    assert_eq!( r.start_odometer_km, Some( 10_000 ) );
    r.complete( 10_450, Utc::now() ).unwrap();
    assert_eq!( r.status, RentalStatus::Completed );
    assert_eq!( r.end_odometer_km, Some( 10_450 ) );
  }

  #[ test ]
  fn complete_rejects_odometer_below_pickup()
  {
    let mut r = rental();
    r.activate( 10_000, Utc::now() ).unwrap();
    assert_eq!( r.complete( 9_999, Utc::now() ).unwrap_err().code(), "INVALID_MILEAGE" );
  }

  #[ test ]
  fn cancel_from_reserved_and_active_only()
  {
    let mut r = rental();
    r.cancel( Utc::now() ).unwrap();
    assert_eq!( r.status, RentalStatus::Cancelled );
    assert_eq!( r.cancel( Utc::now() ).unwrap_err().code(), "INVALID_STATE" );

    let mut r2 = rental();
    r2.activate( 100, Utc::now() ).unwrap();
    r2.cancel( Utc::now() ).unwrap();

    let mut r3 = rental();
    r3.activate( 100, Utc::now() ).unwrap();
    r3.complete( 200, Utc::now() ).unwrap();
    assert_eq!( r3.cancel( Utc::now() ).unwrap_err().code(), "INVALID_STATE" );
  }

  #[ test ]
  fn activate_requires_reserved()
  {
    let mut r = rental();
    r.cancel( Utc::now() ).unwrap();
    assert_eq!( r.activate( 0, Utc::now() ).unwrap_err().code(), "INVALID_STATE" );
  }
}
