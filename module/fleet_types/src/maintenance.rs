//! Maintenance jobs and their state machine.
//!
//! ```text
//! SCHEDULED --start--> IN_PROGRESS --complete--> COMPLETED (terminal)
//!     |
//!     +--cancel--> CANCELLED (terminal)
//! ```
//!
//! `total_cost` is always derived from labor + parts; it is never stored
//! independently.

use chrono::{ DateTime, Utc };
use serde::{ Deserialize, Serialize };
use uuid::Uuid;

use crate::error::{ FleetError, Result };
use crate::Amount;

/// Maintenance job status.
#[ derive( Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize ) ]
#[ serde( rename_all = "SCREAMING_SNAKE_CASE" ) ]
pub enum MaintenanceStatus
{
  /// Booked with the shop.
  Scheduled,
  /// Work underway; the vehicle is out of the fleet.
  InProgress,
  /// Work finished. Terminal.
  Completed,
  /// Abandoned before starting. Terminal.
  Cancelled,
}

impl MaintenanceStatus
{
  /// Database / wire representation.
  pub fn as_str( self ) -> &'static str
  {
    match self
    {
      Self::Scheduled => "SCHEDULED",
      Self::InProgress => "IN_PROGRESS",
      Self::Completed => "COMPLETED",
      Self::Cancelled => "CANCELLED",
    }
  }

  /// Parse the database representation.
  pub fn parse( s: &str ) -> Result< Self >
  {
    match s
    {
      "SCHEDULED" => Ok( Self::Scheduled ),
      "IN_PROGRESS" => Ok( Self::InProgress ),
      "COMPLETED" => Ok( Self::Completed ),
      "CANCELLED" => Ok( Self::Cancelled ),
      other => Err( FleetError::Internal( format!( "unknown maintenance status '{other}'" ) ) ),
    }
  }
}

/// Category of maintenance work.
#[ derive( Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize ) ]
#[ serde( rename_all = "SCREAMING_SNAKE_CASE" ) ]
pub enum MaintenanceType
{
  /// Scheduled service interval.
  Routine,
  /// Fixing a defect.
  Repair,
  /// Government or insurer inspection.
  Inspection,
  /// Manufacturer recall.
  Recall,
  /// Breakdown response.
  Emergency,
}

impl MaintenanceType
{
  /// Database / wire representation.
  pub fn as_str( self ) -> &'static str
  {
    match self
    {
      Self::Routine => "ROUTINE",
      Self::Repair => "REPAIR",
      Self::Inspection => "INSPECTION",
      Self::Recall => "RECALL",
      Self::Emergency => "EMERGENCY",
    }
  }

  /// Parse the database representation.
  pub fn parse( s: &str ) -> Result< Self >
  {
    match s
    {
      "ROUTINE" => Ok( Self::Routine ),
      "REPAIR" => Ok( Self::Repair ),
      "INSPECTION" => Ok( Self::Inspection ),
      "RECALL" => Ok( Self::Recall ),
      "EMERGENCY" => Ok( Self::Emergency ),
      other => Err( FleetError::Internal( format!( "unknown maintenance type '{other}'" ) ) ),
    }
  }
}

/// A part consumed by a job.
#[ derive( Debug, Clone, Serialize, Deserialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct MaintenancePart
{
  /// Part description.
  pub part_name: String,
  /// Units consumed, positive.
  pub quantity: i32,
  /// Cost per unit, whole pesos, non-negative.
  pub unit_cost: Amount,
}

impl MaintenancePart
{
  /// `quantity × unit_cost`.
  pub fn line_cost( &self ) -> Amount
  {
    i64::from( self.quantity ) * self.unit_cost
  }

  /// Validate quantity and cost bounds.
  pub fn validate( &self ) -> Result< () >
  {
    if self.part_name.trim().is_empty()
    {
      return Err( FleetError::validation_fields(
        "part name is required",
        vec![ crate::FieldViolation::new( "partName", "required" ) ],
      ) );
    }
    if self.quantity <= 0
    {
      return Err( FleetError::validation_fields(
        "part quantity must be positive",
        vec![ crate::FieldViolation::new( "quantity", "must_be_positive" ) ],
      ) );
    }
    if self.unit_cost < 0
    {
      return Err( FleetError::validation_fields(
        "part unit cost cannot be negative",
        vec![ crate::FieldViolation::new( "unitCost", "negative" ) ],
      ) );
    }
    Ok( () )
  }
}

/// A maintenance job against one vehicle.
#[ derive( Debug, Clone, Serialize, Deserialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct MaintenanceJob
{
  /// Stable identifier.
  pub id: Uuid,
  /// Human-facing number, unique, `MNT-...`.
  pub job_number: String,
  /// Vehicle under maintenance.
  pub vehicle_id: Uuid,
  /// Lifecycle status.
  pub status: MaintenanceStatus,
  /// Work category.
  pub job_type: MaintenanceType,
  /// Scheduling priority, higher is sooner.
  pub priority: i32,
  /// Planned start.
  pub scheduled_date: DateTime< Utc >,
  /// Actual start, never before `scheduled_date`.
  pub started_at: Option< DateTime< Utc > >,
  /// Actual completion, never before `started_at`.
  pub completed_at: Option< DateTime< Utc > >,
  /// Labor cost, whole pesos.
  pub labor_cost: Amount,
  /// Parts cost, whole pesos.
  pub parts_cost: Amount,
  /// Consumed parts.
  pub parts: Vec< MaintenancePart >,
  /// Creation instant.
  pub created_at: DateTime< Utc >,
  /// Last update instant.
  pub updated_at: DateTime< Utc >,
}

impl MaintenanceJob
{
  /// Derived job cost: labor + parts.
  pub fn total_cost( &self ) -> Amount
  {
    self.labor_cost + self.parts_cost
  }

  /// SCHEDULED → IN_PROGRESS.
  ///
  /// # Errors
  ///
  /// `INVALID_STATE` from any other status; `VALIDATION_ERROR` when `now`
  /// is before the scheduled date.
  pub fn start( &mut self, now: DateTime< Utc > ) -> Result< () >
  {
    if self.status != MaintenanceStatus::Scheduled
    {
      return Err( FleetError::InvalidState( format!(
        "cannot start maintenance job {} in {} status", self.id, self.status.as_str()
      ) ) );
    }
    if now < self.scheduled_date
    {
      return Err( FleetError::validation( "cannot start a job before its scheduled date" ) );
    }
    self.status = MaintenanceStatus::InProgress;
    self.started_at = Some( now );
    self.updated_at = now;
    Ok( () )
  }

  /// IN_PROGRESS → COMPLETED, recording final costs.
  pub fn complete(
    &mut self,
    labor_cost: Amount,
    parts: Vec< MaintenancePart >,
    now: DateTime< Utc >,
  ) -> Result< () >
  {
    if self.status != MaintenanceStatus::InProgress
    {
      return Err( FleetError::InvalidState( format!(
        "cannot complete maintenance job {} in {} status", self.id, self.status.as_str()
      ) ) );
    }
    if labor_cost < 0
    {
      return Err( FleetError::validation( "labor cost cannot be negative" ) );
    }
    if let Some( started ) = self.started_at
    {
      if now < started
      {
        return Err( FleetError::validation( "completion cannot predate the start" ) );
      }
    }
    for part in &parts
    {
      part.validate()?;
    }

    self.labor_cost = labor_cost;
    self.parts_cost = parts.iter().map( MaintenancePart::line_cost ).sum();
    self.parts = parts;
    self.status = MaintenanceStatus::Completed;
    self.completed_at = Some( now );
    self.updated_at = now;
    Ok( () )
  }

  /// SCHEDULED → CANCELLED.
  pub fn cancel( &mut self, now: DateTime< Utc > ) -> Result< () >
  {
    if self.status != MaintenanceStatus::Scheduled
    {
      return Err( FleetError::InvalidState( format!(
        "cannot cancel maintenance job {} in {} status", self.id, self.status.as_str()
      ) ) );
    }
    self.status = MaintenanceStatus::Cancelled;
    self.updated_at = now;
    Ok( () )
  }
}

#[ cfg( test ) ]
mod tests
{
  use super::*;
  use chrono::Duration;

  fn job() -> MaintenanceJob
  {
    let now = Utc::now();
    MaintenanceJob
    {
      id: Uuid::new_v4(),
      job_number: "MNT-000001".to_string(),
      vehicle_id: Uuid::new_v4(),
      status: MaintenanceStatus::Scheduled,
      job_type: MaintenanceType::Routine,
      priority: 1,
      scheduled_date: now - Duration::hours( 1 ),
      started_at: None,
      completed_at: None,
      labor_cost: 0,
      parts_cost: 0,
      parts: Vec::new(),
      created_at: now,
      updated_at: now,
    }
  }

  #[ test ]
  fn start_then_complete_accumulates_costs()
  {
    let mut j = job();
    j.start( Utc::now() ).unwrap();
    assert_eq!( j.status, MaintenanceStatus::InProgress );

    let parts = vec![
      MaintenancePart { part_name: "oil filter".to_string(), quantity: 1, unit_cost: 350 },
      MaintenancePart { part_name: "engine oil".to_string(), quantity: 4, unit_cost: 400 },
    ];
    j.complete( 1_200, parts, Utc::now() ).unwrap();

    assert_eq!( j.parts_cost, 1_950 );
    assert_eq!( j.total_cost(), 3_150 );
    assert_eq!( j.status, MaintenanceStatus::Completed );
  }

  #[ test ]
  fn cannot_start_before_schedule()
  {
    let mut j = job();
    j.scheduled_date = Utc::now() + Duration::days( 1 );
    assert_eq!( j.start( Utc::now() ).unwrap_err().code(), "VALIDATION_ERROR" );
  }

  #[ test ]
  fn cancel_only_from_scheduled()
  {
    let mut j = job();
    j.start( Utc::now() ).unwrap();
    assert_eq!( j.cancel( Utc::now() ).unwrap_err().code(), "INVALID_STATE" );
  }

  #[ test ]
  fn complete_rejects_bad_part()
  {
    let mut j = job();
    j.start( Utc::now() ).unwrap();
    let bad = vec![ MaintenancePart { part_name: "belt".to_string(), quantity: 0, unit_cost: 100 } ];
    assert_eq!( j.complete( 0, bad, Utc::now() ).unwrap_err().code(), "VALIDATION_ERROR" );
  }
}
