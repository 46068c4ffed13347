//! Vehicle aggregate and its state machine.
//!
//! Transitions: AVAILABLE↔RENTED, AVAILABLE↔MAINTENANCE, any→RETIRED
//! (terminal). Mileage is monotone non-decreasing; the storage layer
//! enforces the same rule again below the application.

use chrono::{ DateTime, Utc };
use serde::{ Deserialize, Serialize };
use uuid::Uuid;

use crate::error::{ FleetError, Result };
use crate::Amount;

/// Vehicle lifecycle state.
#[ derive( Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize ) ]
#[ serde( rename_all = "SCREAMING_SNAKE_CASE" ) ]
pub enum VehicleState
{
  /// In the fleet, free to be reserved or sent to maintenance.
  Available,
  /// Out with a customer on an active rental.
  Rented,
  /// In the shop.
  Maintenance,
  /// Removed from the fleet. Terminal.
  Retired,
}

impl VehicleState
{
  /// Database / wire representation.
  pub fn as_str( self ) -> &'static str
  {
    match self
    {
      Self::Available => "AVAILABLE",
      Self::Rented => "RENTED",
      Self::Maintenance => "MAINTENANCE",
      Self::Retired => "RETIRED",
    }
  }

  /// Parse the database representation.
  pub fn parse( s: &str ) -> Result< Self >
  {
    match s
    {
      "AVAILABLE" => Ok( Self::Available ),
      "RENTED" => Ok( Self::Rented ),
      "MAINTENANCE" => Ok( Self::Maintenance ),
      "RETIRED" => Ok( Self::Retired ),
      other => Err( FleetError::Internal( format!( "unknown vehicle state '{other}'" ) ) ),
    }
  }
}

/// A vehicle in the fleet.
#[ derive( Debug, Clone, Serialize, Deserialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct Vehicle
{
  /// Stable identifier.
  pub id: Uuid,
  /// 17-character VIN, unique across the fleet.
  pub vin: String,
  /// License plate, unique.
  pub plate: String,
  /// Manufacturer.
  pub make: String,
  /// Model name.
  pub model: String,
  /// Model year, 1900..=2100.
  pub year: i32,
  /// Body color.
  pub color: String,
  /// Current lifecycle state.
  pub state: VehicleState,
  /// Odometer in kilometers, monotone non-decreasing.
  pub mileage_km: i64,
  /// Rental price per day, whole pesos.
  pub daily_rate_amount: Amount,
  /// Currency code; always PHP.
  pub currency: String,
  /// Seats including the driver's.
  pub passenger_capacity: i32,
  /// Last known location label, if tracked.
  pub last_location: Option< String >,
  /// Progress along an assigned route, 0.0..=1.0.
  pub route_progress: f64,
  /// Compass bearing in degrees.
  pub bearing: f64,
  /// Optimistic-locking version, bumped by storage on update.
  pub version: i64,
  /// Creation instant.
  pub created_at: DateTime< Utc >,
  /// Last update instant.
  pub updated_at: DateTime< Utc >,
}

impl Vehicle
{
  /// Validate construction-time field invariants.
  ///
  /// # Errors
  ///
  /// Returns `VALIDATION_ERROR` with field detail for every violated rule.
  pub fn validate( &self ) -> Result< () >
  {
    let mut details = Vec::new();

    if self.vin.len() != 17
    {
      details.push( crate::FieldViolation::new( "vin", "must_be_17_chars" ) );
    }
    if self.plate.trim().is_empty()
    {
      details.push( crate::FieldViolation::new( "plate", "required" ) );
    }
    if !( 1900..=2100 ).contains( &self.year )
    {
      details.push( crate::FieldViolation::new( "year", "out_of_range" ) );
    }
    if self.mileage_km < 0
    {
      details.push( crate::FieldViolation::new( "mileageKm", "negative" ) );
    }
    if self.daily_rate_amount < 0
    {
      details.push( crate::FieldViolation::new( "dailyRateAmount", "negative" ) );
    }
    if self.passenger_capacity <= 0
    {
      details.push( crate::FieldViolation::new( "passengerCapacity", "must_be_positive" ) );
    }
    if !( 0.0..=1.0 ).contains( &self.route_progress )
    {
      details.push( crate::FieldViolation::new( "routeProgress", "out_of_range" ) );
    }

    if details.is_empty()
    {
      Ok( () )
    }
    else
    {
      Err( FleetError::validation_fields( "vehicle failed validation", details ) )
    }
  }

  /// AVAILABLE → RENTED, when a rental activates.
  pub fn mark_rented( &mut self ) -> Result< () >
  {
    match self.state
    {
      VehicleState::Available =>
      {
        self.state = VehicleState::Rented;
        Ok( () )
      }
      current => Err( FleetError::InvalidState( format!(
        "cannot rent vehicle {} in {} state", self.id, current.as_str()
      ) ) ),
    }
  }

  /// RENTED → AVAILABLE, when the active rental completes or cancels.
  pub fn mark_returned( &mut self ) -> Result< () >
  {
    match self.state
    {
      VehicleState::Rented =>
      {
        self.state = VehicleState::Available;
        Ok( () )
      }
      current => Err( FleetError::InvalidState( format!(
        "cannot return vehicle {} in {} state", self.id, current.as_str()
      ) ) ),
    }
  }

  /// AVAILABLE → MAINTENANCE, when a maintenance job starts.
  pub fn mark_in_maintenance( &mut self ) -> Result< () >
  {
    match self.state
    {
      VehicleState::Available =>
      {
        self.state = VehicleState::Maintenance;
        Ok( () )
      }
      current => Err( FleetError::InvalidState( format!(
        "cannot start maintenance on vehicle {} in {} state", self.id, current.as_str()
      ) ) ),
    }
  }

  /// MAINTENANCE → AVAILABLE, when the job completes or cancels.
  ///
  /// A no-op when the vehicle left maintenance through another path.
  pub fn mark_maintenance_done( &mut self )
  {
    if self.state == VehicleState::Maintenance
    {
      self.state = VehicleState::Available;
    }
  }

  /// Any state → RETIRED. Terminal.
  pub fn retire( &mut self ) -> Result< () >
  {
    if self.state == VehicleState::Retired
    {
      return Err( FleetError::InvalidState( format!( "vehicle {} is already retired", self.id ) ) );
    }
    self.state = VehicleState::Retired;
    Ok( () )
  }

  /// Raise the odometer. Decreases are rejected.
  pub fn record_mileage( &mut self, reading_km: i64 ) -> Result< () >
  {
    if reading_km < self.mileage_km
    {
      return Err( FleetError::InvalidMileage( format!(
        "reading {reading_km} km is below current {} km for vehicle {}", self.mileage_km, self.id
      ) ) );
    }
    self.mileage_km = reading_km;
    Ok( () )
  }
}

#[ cfg( test ) ]
mod tests
{
  use super::*;

  fn vehicle() -> Vehicle
  {
    let now = Utc::now();
    Vehicle
    {
      id: Uuid::new_v4(),
      vin: "1HGBH41JXMN109186".to_string(),
      plate: "ABC-1234".to_string(),
      make: "Toyota".to_string(),
      model: "Vios".to_string(),
      year: 2022,
      color: "white".to_string(),
      state: VehicleState::Available,
      mileage_km: 10_000,
      daily_rate_amount: 500,
      currency: crate::CURRENCY_PHP.to_string(),
      passenger_capacity: 5,
      last_location: None,
      route_progress: 0.0,
      bearing: 0.0,
      version: 1,
      created_at: now,
      updated_at: now,
    }
  }

  #[ test ]
  fn rent_and_return_round_trip()
  {
    let mut v = vehicle();
    v.mark_rented().unwrap();
    assert_eq!( v.state, VehicleState::Rented );
    v.mark_returned().unwrap();
    assert_eq!( v.state, VehicleState::Available );
  }

  #[ test ]
  fn cannot_rent_twice()
  {
    let mut v = vehicle();
    v.mark_rented().unwrap();
    let err = v.mark_rented().unwrap_err();
    assert_eq!( err.code(), "INVALID_STATE" );
  }

  #[ test ]
  fn maintenance_rejected_while_rented()
  {
    let mut v = vehicle();
    v.mark_rented().unwrap();
    assert_eq!( v.mark_in_maintenance().unwrap_err().code(), "INVALID_STATE" );
  }

  #[ test ]
  fn retire_is_terminal()
  {
    let mut v = vehicle();
    v.retire().unwrap();
    assert_eq!( v.retire().unwrap_err().code(), "INVALID_STATE" );
    assert_eq!( v.mark_rented().unwrap_err().code(), "INVALID_STATE" );
  }

  #[ test ]
  fn mileage_cannot_decrease()
  {
    let mut v = vehicle();
    assert_eq!( v.record_mileage( 9_000 ).unwrap_err().code(), "INVALID_MILEAGE" );
    v.record_mileage( 10_450 ).unwrap();
    assert_eq!( v.mileage_km, 10_450 );
    // Equal readings are allowed
    v.record_mileage( 10_450 ).unwrap();
  }

  #[ test ]
  fn validation_collects_field_detail()
  {
    let mut v = vehicle();
    v.vin = "short".to_string();
    v.year = 1850;
    let err = v.validate().unwrap_err();
    match err
    {
      FleetError::Validation { details, .. } =>
      {
        assert_eq!( details.len(), 2 );
      }
      other => panic!( "unexpected: {other:?}" ),
    }
  }
}
