//! Customer records and the license-validity rule consulted at rental
//! creation.

use chrono::{ DateTime, Utc };
use serde::{ Deserialize, Serialize };
use uuid::Uuid;

use crate::error::{ FleetError, Result };

/// A renting customer.
#[ derive( Debug, Clone, Serialize, Deserialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct Customer
{
  /// Stable identifier.
  pub id: Uuid,
  /// Email, unique.
  pub email: String,
  /// Contact number.
  pub phone: String,
  /// Given name.
  pub first_name: String,
  /// Family name.
  pub last_name: String,
  /// Driver's license number, unique.
  pub driver_license_number: String,
  /// License expiry; must be in the future at rental creation.
  pub driver_license_expiry: DateTime< Utc >,
  /// Street address.
  pub address_line: String,
  /// City.
  pub city: String,
  /// Province.
  pub province: String,
  /// Postal code.
  pub postal_code: String,
  /// Whether the account can rent.
  pub is_active: bool,
  /// Creation instant.
  pub created_at: DateTime< Utc >,
  /// Last update instant.
  pub updated_at: DateTime< Utc >,
}

impl Customer
{
  /// Check the customer may enter a rental at `now`.
  ///
  /// # Errors
  ///
  /// `VALIDATION_ERROR` for an expired license, `INVALID_STATE` for a
  /// deactivated account.
  pub fn check_can_rent( &self, now: DateTime< Utc > ) -> Result< () >
  {
    if !self.is_active
    {
      return Err( FleetError::InvalidState( format!( "customer {} is deactivated", self.id ) ) );
    }
    if self.driver_license_expiry <= now
    {
      return Err( FleetError::validation_fields(
        "driver license is expired",
        vec![ crate::FieldViolation::new( "driverLicenseExpiry", "expired" ) ],
      ) );
    }
    Ok( () )
  }

  /// Validate construction-time field invariants.
  pub fn validate( &self ) -> Result< () >
  {
    let mut details = Vec::new();

    if !self.email.contains( '@' )
    {
      details.push( crate::FieldViolation::new( "email", "invalid_format" ) );
    }
    if self.first_name.trim().is_empty()
    {
      details.push( crate::FieldViolation::new( "firstName", "required" ) );
    }
    if self.last_name.trim().is_empty()
    {
      details.push( crate::FieldViolation::new( "lastName", "required" ) );
    }
    if self.driver_license_number.trim().is_empty()
    {
      details.push( crate::FieldViolation::new( "driverLicenseNumber", "required" ) );
    }

    if details.is_empty()
    {
      Ok( () )
    }
    else
    {
      Err( FleetError::validation_fields( "customer failed validation", details ) )
    }
  }
}

#[ cfg( test ) ]
mod tests
{
  use super::*;
  use chrono::Duration;

  fn customer( expiry_offset_days: i64 ) -> Customer
  {
    let now = Utc::now();
    Customer
    {
      id: Uuid::new_v4(),
      email: "juan@example.ph".to_string(),
      phone: "+639171234567".to_string(),
      first_name: "Juan".to_string(),
      last_name: "dela Cruz".to_string(),
      driver_license_number: "N01-23-456789".to_string(),
      driver_license_expiry: now + Duration::days( expiry_offset_days ),
      address_line: "123 Mabini St".to_string(),
      city: "Quezon City".to_string(),
      province: "Metro Manila".to_string(),
      postal_code: "1100".to_string(),
      is_active: true,
      created_at: now,
      updated_at: now,
    }
  }

  #[ test ]
  fn valid_license_can_rent()
  {
    customer( 365 ).check_can_rent( Utc::now() ).unwrap();
  }

  #[ test ]
  fn expired_license_cannot_rent()
  {
    let err = customer( -1 ).check_can_rent( Utc::now() ).unwrap_err();
    assert_eq!( err.code(), "VALIDATION_ERROR" );
  }

  #[ test ]
  fn deactivated_customer_cannot_rent()
  {
    let mut c = customer( 365 );
    c.is_active = false;
    assert_eq!( c.check_can_rent( Utc::now() ).unwrap_err().code(), "INVALID_STATE" );
  }
}
