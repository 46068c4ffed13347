//! Vehicle inventory use-cases.

use chrono::Utc;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use fleet_store::{ map_db_err, vehicles };
use fleet_types::pagination::CursorPage;
use fleet_types::{ Amount, FleetError, Result, Vehicle, VehicleState };

/// Fields accepted when creating a vehicle.
#[ derive( Debug, Clone ) ]
pub struct NewVehicle
{
  /// 17-character VIN.
  pub vin: String,
  /// License plate.
  pub plate: String,
  /// Manufacturer.
  pub make: String,
  /// Model name.
  pub model: String,
  /// Model year.
  pub year: i32,
  /// Body color.
  pub color: String,
  /// Odometer at intake.
  pub mileage_km: i64,
  /// Rate per billable day.
  pub daily_rate_amount: Amount,
  /// Seats.
  pub passenger_capacity: i32,
}

/// Partial update; `None` leaves a field untouched.
#[ derive( Debug, Clone, Default ) ]
pub struct VehiclePatch
{
  /// New make.
  pub make: Option< String >,
  /// New model.
  pub model: Option< String >,
  /// New color.
  pub color: Option< String >,
  /// New daily rate.
  pub daily_rate_amount: Option< Amount >,
  /// New capacity.
  pub passenger_capacity: Option< i32 >,
  /// New location label.
  pub last_location: Option< String >,
}

/// Vehicle use-case engine.
#[ derive( Debug, Clone ) ]
pub struct VehicleEngine
{
  pool: PgPool,
}

impl VehicleEngine
{
  /// Create a new engine over the shared pool.
  #[ must_use ]
  pub fn new( pool: PgPool ) -> Self
  {
    Self { pool }
  }

  /// Register a vehicle into the fleet, AVAILABLE, with its intake
  /// odometer reading on record.
  pub async fn create_vehicle( &self, new: NewVehicle ) -> Result< Vehicle >
  {
    let now = Utc::now();
    let vehicle = Vehicle
    {
      id: Uuid::new_v4(),
      vin: new.vin,
      plate: new.plate,
      make: new.make,
      model: new.model,
      year: new.year,
      color: new.color,
      state: VehicleState::Available,
      mileage_km: new.mileage_km,
      daily_rate_amount: new.daily_rate_amount,
      currency: fleet_types::CURRENCY_PHP.to_string(),
      passenger_capacity: new.passenger_capacity,
      last_location: None,
      route_progress: 0.0,
      bearing: 0.0,
      version: 1,
      created_at: now,
      updated_at: now,
    };
    vehicle.validate()?;

    let mut tx = self.pool.begin().await.map_err( map_db_err )?;
    vehicles::insert( &mut *tx, &vehicle ).await?;
    vehicles::append_odometer_reading( &mut *tx, vehicle.id, vehicle.mileage_km, now ).await?;
    tx.commit().await.map_err( map_db_err )?;

    info!( vehicle = %vehicle.id, plate = %vehicle.plate, "vehicle registered" );
    Ok( vehicle )
  }

  /// Read one vehicle.
  pub async fn get_vehicle( &self, id: Uuid ) -> Result< Vehicle >
  {
    let mut conn = self.pool.acquire().await.map_err( map_db_err )?;
    vehicles::find_by_id( &mut *conn, id ).await
  }

  /// Cursor-paged listing.
  pub async fn list_vehicles(
    &self,
    limit: Option< i64 >,
    cursor: Option< Uuid >,
  ) -> Result< CursorPage< Vehicle > >
  {
    let mut conn = self.pool.acquire().await.map_err( map_db_err )?;
    vehicles::list( &mut *conn, limit, cursor ).await
  }

  /// Apply a partial update under optimistic locking.
  pub async fn patch_vehicle( &self, id: Uuid, patch: VehiclePatch ) -> Result< Vehicle >
  {
    let mut tx = self.pool.begin().await.map_err( map_db_err )?;

    let mut vehicle = vehicles::find_by_id( &mut *tx, id ).await?;
    let expected_version = vehicle.version;

    if let Some( make ) = patch.make { vehicle.make = make; }
    if let Some( model ) = patch.model { vehicle.model = model; }
    if let Some( color ) = patch.color { vehicle.color = color; }
    if let Some( rate ) = patch.daily_rate_amount { vehicle.daily_rate_amount = rate; }
    if let Some( capacity ) = patch.passenger_capacity { vehicle.passenger_capacity = capacity; }
    if let Some( location ) = patch.last_location { vehicle.last_location = Some( location ); }
    vehicle.validate()?;

    vehicles::update_locked( &mut *tx, &vehicle, expected_version ).await?;
    tx.commit().await.map_err( map_db_err )?;

    self.get_vehicle( id ).await
  }

  /// Drive the vehicle state machine directly (operator surface).
  pub async fn set_state( &self, id: Uuid, target: VehicleState ) -> Result< Vehicle >
  {
    let mut tx = self.pool.begin().await.map_err( map_db_err )?;

    let mut vehicle = vehicles::find_by_id( &mut *tx, id ).await?;
    let expected_version = vehicle.version;

    match ( vehicle.state, target )
    {
      ( current, wanted ) if current == wanted => {}
      ( VehicleState::Available, VehicleState::Rented ) => vehicle.mark_rented()?,
      ( VehicleState::Rented, VehicleState::Available ) => vehicle.mark_returned()?,
      ( VehicleState::Available, VehicleState::Maintenance ) => vehicle.mark_in_maintenance()?,
      ( VehicleState::Maintenance, VehicleState::Available ) => vehicle.mark_maintenance_done(),
      ( _, VehicleState::Retired ) => vehicle.retire()?,
      ( current, wanted ) =>
      {
        return Err( FleetError::InvalidState( format!(
          "no transition from {} to {}", current.as_str(), wanted.as_str()
        ) ) );
      }
    }

    vehicles::update_locked( &mut *tx, &vehicle, expected_version ).await?;
    tx.commit().await.map_err( map_db_err )?;

    self.get_vehicle( id ).await
  }

  /// Record a new odometer reading and raise the vehicle's mileage.
  ///
  /// The domain rejects a decrease immediately; the append-only log's
  /// trigger enforces the same rule against concurrent writers.
  pub async fn record_odometer( &self, id: Uuid, reading_km: i64 ) -> Result< Vehicle >
  {
    let now = Utc::now();
    let mut tx = self.pool.begin().await.map_err( map_db_err )?;

    let mut vehicle = vehicles::find_by_id( &mut *tx, id ).await?;
    let expected_version = vehicle.version;
    vehicle.record_mileage( reading_km )?;

    vehicles::append_odometer_reading( &mut *tx, id, reading_km, now ).await?;
    vehicles::update_locked( &mut *tx, &vehicle, expected_version ).await?;
    tx.commit().await.map_err( map_db_err )?;

    self.get_vehicle( id ).await
  }

  /// Retire a vehicle (terminal). The row stays for rental and ledger
  /// history; nothing is hard-deleted.
  pub async fn retire_vehicle( &self, id: Uuid ) -> Result< Vehicle >
  {
    self.set_state( id, VehicleState::Retired ).await
  }
}
