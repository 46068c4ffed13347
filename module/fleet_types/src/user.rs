//! Authentication principals and the seeded role set.

use chrono::{ DateTime, Utc };
use serde::{ Deserialize, Serialize };
use uuid::Uuid;

use crate::error::{ FleetError, Result };

/// The five seeded roles.
#[ derive( Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize ) ]
#[ serde( rename_all = "SCREAMING_SNAKE_CASE" ) ]
pub enum Role
{
  /// Full access.
  Admin,
  /// Vehicle inventory and maintenance.
  FleetManager,
  /// Day-to-day rental desk.
  RentalAgent,
  /// Accounting, reports, reconciliation.
  FinanceOwner,
  /// Self-service customer account.
  Customer,
}

impl Role
{
  /// Database / wire representation.
  pub fn as_str( self ) -> &'static str
  {
    match self
    {
      Self::Admin => "ADMIN",
      Self::FleetManager => "FLEET_MANAGER",
      Self::RentalAgent => "RENTAL_AGENT",
      Self::FinanceOwner => "FINANCE_OWNER",
      Self::Customer => "CUSTOMER",
    }
  }

  /// Parse the database representation.
  pub fn parse( s: &str ) -> Result< Self >
  {
    match s
    {
      "ADMIN" => Ok( Self::Admin ),
      "FLEET_MANAGER" => Ok( Self::FleetManager ),
      "RENTAL_AGENT" => Ok( Self::RentalAgent ),
      "FINANCE_OWNER" => Ok( Self::FinanceOwner ),
      "CUSTOMER" => Ok( Self::Customer ),
      other => Err( FleetError::validation( format!( "unknown role '{other}'" ) ) ),
    }
  }

  /// Staff roles allowed to drive rental transitions.
  pub const STAFF: &'static [ Self ] =
    &[ Self::Admin, Self::FleetManager, Self::RentalAgent, Self::FinanceOwner ];
}

/// An authenticated backend user.
#[ derive( Debug, Clone, Serialize, Deserialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct AppUser
{
  /// Stable identifier.
  pub id: Uuid,
  /// Login email, unique.
  pub email: String,
  /// BCrypt hash; never serialized outward.
  #[ serde( skip_serializing ) ]
  pub password_hash: String,
  /// Granted roles.
  pub roles: Vec< Role >,
  /// Whether the account may log in.
  pub is_active: bool,
  /// Creation instant.
  pub created_at: DateTime< Utc >,
  /// Last update instant.
  pub updated_at: DateTime< Utc >,
}

impl AppUser
{
  /// Whether the user holds any of `required`.
  pub fn has_any_role( &self, required: &[ Role ] ) -> bool
  {
    required.iter().any( |r| self.roles.contains( r ) )
  }
}

#[ cfg( test ) ]
mod tests
{
  use super::*;

  #[ test ]
  fn role_round_trip()
  {
    for role in [ Role::Admin, Role::FleetManager, Role::RentalAgent, Role::FinanceOwner, Role::Customer ]
    {
      assert_eq!( Role::parse( role.as_str() ).unwrap(), role );
    }
    assert!( Role::parse( "JANITOR" ).is_err() );
  }

  #[ test ]
  fn has_any_role_matches()
  {
    let user = AppUser
    {
      id: Uuid::new_v4(),
      email: "agent@fleet.ph".to_string(),
      password_hash: "x".to_string(),
      roles: vec![ Role::RentalAgent ],
      is_active: true,
      created_at: Utc::now(),
      updated_at: Utc::now(),
    };
    assert!( user.has_any_role( Role::STAFF ) );
    assert!( !user.has_any_role( &[ Role::Admin, Role::FinanceOwner ] ) );
  }
}
