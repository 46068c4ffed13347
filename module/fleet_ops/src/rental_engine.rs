//! Rental lifecycle use-cases.
//!
//! Conflict semantics: when two concurrent creations target overlapping
//! windows on the same vehicle, exactly one transaction commits; the
//! other surfaces `RENTAL_CONFLICT` from the exclusion constraint. No
//! application-level lock participates in that decision.

use chrono::{ DateTime, Utc };
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use fleet_store::{ map_db_err, next_document_number, outbox, rentals, vehicles, customers };
use fleet_types::pagination::CursorPage;
use fleet_types::{ FleetError, OutboxEvent, Rental, RentalStatus, Result, Vehicle, VehicleState };

/// Rental use-case engine.
#[ derive( Debug, Clone ) ]
pub struct RentalEngine
{
  pool: PgPool,
}

impl RentalEngine
{
  /// Create a new engine over the shared pool.
  #[ must_use ]
  pub fn new( pool: PgPool ) -> Self
  {
    Self { pool }
  }

  /// Create a reservation.
  ///
  /// Preconditions: vehicle exists and is AVAILABLE, customer exists with
  /// a live license, `end_date > start_date`, and no conflicting booking.
  /// The last check is the exclusion constraint's; this method only
  /// translates its verdict.
  pub async fn create_rental(
    &self,
    vehicle_id: Uuid,
    customer_id: Uuid,
    start_date: DateTime< Utc >,
    end_date: DateTime< Utc >,
  ) -> Result< Rental >
  {
    let now = Utc::now();
    let mut tx = self.pool.begin().await.map_err( map_db_err )?;

    let vehicle = vehicles::find_by_id( &mut *tx, vehicle_id ).await?;
    if vehicle.state != VehicleState::Available
    {
      return Err( FleetError::InvalidState( format!(
        "cannot rent vehicle {vehicle_id} in {} state", vehicle.state.as_str()
      ) ) );
    }

    let customer = customers::find_by_id( &mut *tx, customer_id ).await?;
    customer.check_can_rent( now )?;

    let rental_number = next_document_number( &mut *tx, "rental_number_seq", "RNT" ).await?;
    let rental = Rental::reserve(
      Uuid::new_v4(),
      rental_number,
      customer_id,
      vehicle_id,
      start_date,
      end_date,
      vehicle.daily_rate_amount,
      now,
    )?;

    // The sync trigger materializes the period row here; an overlap
    // surfaces as RENTAL_CONFLICT.
    rentals::insert( &mut *tx, &rental ).await?;

    outbox::append( &mut *tx, &rental_event( &rental, "rental.reserved", now ) ).await?;

    tx.commit().await.map_err( map_db_err )?;
    info!( rental = %rental.rental_number, vehicle = %vehicle_id, "rental reserved" );
    Ok( rental )
  }

  /// Activate a reservation at pickup: RESERVED → ACTIVE, vehicle →
  /// RENTED, and the activation posting, all in one transaction.
  pub async fn activate_rental( &self, rental_id: Uuid, start_odometer_km: i64 ) -> Result< Rental >
  {
    let now = Utc::now();
    let mut tx = self.pool.begin().await.map_err( map_db_err )?;

    let mut rental = rentals::find_by_id_for_update( &mut *tx, rental_id ).await?;
    rental.activate( start_odometer_km, now )?;

    let mut vehicle = vehicles::find_by_id( &mut *tx, rental.vehicle_id ).await?;
    let vehicle_version = vehicle.version;
    vehicle.mark_rented()?;
    vehicles::update_locked( &mut *tx, &vehicle, vehicle_version ).await?;

    rentals::update_transition( &mut *tx, &rental ).await?;

    fleet_ledger::post_rental_activation(
      &mut *tx,
      rental.id,
      &rental.rental_number,
      rental.total_amount,
      now,
    )
    .await?;

    outbox::append( &mut *tx, &rental_event( &rental, "rental.activated", now ) ).await?;

    tx.commit().await.map_err( map_db_err )?;
    info!( rental = %rental.rental_number, "rental activated" );
    Ok( rental )
  }

  /// Complete an active rental: ACTIVE → COMPLETED, vehicle back to
  /// AVAILABLE with its odometer raised, reading appended to the log.
  pub async fn complete_rental( &self, rental_id: Uuid, final_mileage_km: i64 ) -> Result< Rental >
  {
    let now = Utc::now();
    let mut tx = self.pool.begin().await.map_err( map_db_err )?;

    let mut rental = rentals::find_by_id_for_update( &mut *tx, rental_id ).await?;
    rental.complete( final_mileage_km, now )?;

    let mut vehicle = vehicles::find_by_id( &mut *tx, rental.vehicle_id ).await?;
    let vehicle_version = vehicle.version;
    vehicle.mark_returned()?;
    if final_mileage_km > vehicle.mileage_km
    {
      vehicle.mileage_km = final_mileage_km;
    }
    vehicles::update_locked( &mut *tx, &vehicle, vehicle_version ).await?;

    // The monotonicity trigger is the authority; a reading below the log's
    // latest rolls the whole transaction back as INVALID_MILEAGE.
    vehicles::append_odometer_reading( &mut *tx, vehicle.id, final_mileage_km, now ).await?;

    rentals::update_transition( &mut *tx, &rental ).await?;

    outbox::append( &mut *tx, &rental_event( &rental, "rental.completed", now ) ).await?;

    tx.commit().await.map_err( map_db_err )?;
    info!( rental = %rental.rental_number, final_mileage_km, "rental completed" );
    Ok( rental )
  }

  /// Cancel a reservation or an active rental, releasing the booking
  /// window. Accounting is not reversed here; credit memos are a
  /// separate flow.
  pub async fn cancel_rental( &self, rental_id: Uuid ) -> Result< Rental >
  {
    let now = Utc::now();
    let mut tx = self.pool.begin().await.map_err( map_db_err )?;

    let mut rental = rentals::find_by_id_for_update( &mut *tx, rental_id ).await?;
    let was_active = rental.status == RentalStatus::Active;
    rental.cancel( now )?;

    if was_active
    {
      let mut vehicle = vehicles::find_by_id( &mut *tx, rental.vehicle_id ).await?;
      let vehicle_version = vehicle.version;
      vehicle.mark_returned()?;
      vehicles::update_locked( &mut *tx, &vehicle, vehicle_version ).await?;
    }

    // The status update flips the period row to CANCELLED, freeing the
    // window for new reservations.
    rentals::update_transition( &mut *tx, &rental ).await?;

    outbox::append( &mut *tx, &rental_event( &rental, "rental.cancelled", now ) ).await?;

    tx.commit().await.map_err( map_db_err )?;
    info!( rental = %rental.rental_number, "rental cancelled" );
    Ok( rental )
  }

  /// Read one rental.
  pub async fn get_rental( &self, rental_id: Uuid ) -> Result< Rental >
  {
    let mut conn = self.pool.acquire().await.map_err( map_db_err )?;
    rentals::find_by_id( &mut *conn, rental_id ).await
  }

  /// Cursor-paged listing.
  pub async fn list_rentals(
    &self,
    vehicle_id: Option< Uuid >,
    status: Option< RentalStatus >,
    limit: Option< i64 >,
    cursor: Option< Uuid >,
  ) -> Result< CursorPage< Rental > >
  {
    let mut conn = self.pool.acquire().await.map_err( map_db_err )?;
    rentals::list( &mut *conn, vehicle_id, status, limit, cursor ).await
  }

  /// Read one vehicle (used by the cache-aside path in the API layer).
  pub async fn get_vehicle( &self, vehicle_id: Uuid ) -> Result< Vehicle >
  {
    let mut conn = self.pool.acquire().await.map_err( map_db_err )?;
    vehicles::find_by_id( &mut *conn, vehicle_id ).await
  }
}

fn rental_event( rental: &Rental, event_type: &str, now: DateTime< Utc > ) -> OutboxEvent
{
  OutboxEvent
  {
    id: Uuid::new_v4(),
    aggregate_type: "rental".to_string(),
    aggregate_id: rental.id,
    event_type: event_type.to_string(),
    payload: serde_json::json!( {
      "rentalId": rental.id,
      "rentalNumber": rental.rental_number,
      "vehicleId": rental.vehicle_id,
      "customerId": rental.customer_id,
      "status": rental.status.as_str(),
      "totalAmount": rental.total_amount,
    } ),
    created_at: now,
    published_at: None,
  }
}
