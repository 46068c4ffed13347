//! Shared fixtures for engine integration tests.

use chrono::{ DateTime, Duration, TimeZone, Utc };
use sqlx::PgPool;
use uuid::Uuid;

use fleet_store::{ customers, migrations, seed, vehicles };
use fleet_types::{ Customer, Vehicle, VehicleState };

/// Apply migrations and seed data onto a fresh test database.
pub async fn prepare( pool: &PgPool )
{
  migrations::apply_all_migrations( pool ).await.expect( "migrations must apply" );
  seed::seed_all( pool, None ).await.expect( "seed must apply" );
}

/// A June 2026 window, day precision.
pub fn june( from_day: u32, to_day: u32 ) -> ( DateTime< Utc >, DateTime< Utc > )
{
  (
    Utc.with_ymd_and_hms( 2_026, 6, from_day, 10, 0, 0 ).unwrap(),
    Utc.with_ymd_and_hms( 2_026, 6, to_day, 10, 0, 0 ).unwrap(),
  )
}

/// Insert an AVAILABLE vehicle and return it.
pub async fn fixture_vehicle( pool: &PgPool, daily_rate: i64, mileage_km: i64 ) -> Vehicle
{
  let now = Utc::now();
  let suffix: String = Uuid::new_v4().simple().to_string();
  let vehicle = Vehicle
  {
    id: Uuid::new_v4(),
    vin: format!( "VIN{}", &suffix[ ..14 ] ).to_uppercase(),
    plate: format!( "PLT-{}", &suffix[ ..6 ] ),
    make: "Toyota".to_string(),
    model: "Vios".to_string(),
    year: 2_022,
    color: "white".to_string(),
    state: VehicleState::Available,
    mileage_km,
    daily_rate_amount: daily_rate,
    currency: fleet_types::CURRENCY_PHP.to_string(),
    passenger_capacity: 5,
    last_location: None,
    route_progress: 0.0,
    bearing: 0.0,
    version: 1,
    created_at: now,
    updated_at: now,
  };

  let mut conn = pool.acquire().await.unwrap();
  vehicles::insert( &mut *conn, &vehicle ).await.expect( "vehicle fixture must insert" );
  vehicles::find_by_id( &mut *conn, vehicle.id ).await.unwrap()
}

/// Insert a customer with a license valid for a year.
pub async fn fixture_customer( pool: &PgPool ) -> Customer
{
  let now = Utc::now();
  let suffix: String = Uuid::new_v4().simple().to_string();
  let customer = Customer
  {
    id: Uuid::new_v4(),
    email: format!( "{}@example.ph", &suffix[ ..12 ] ),
    phone: "+639171234567".to_string(),
    first_name: "Juan".to_string(),
    last_name: "dela Cruz".to_string(),
    driver_license_number: format!( "N01-{}", &suffix[ ..9 ] ),
    driver_license_expiry: now + Duration::days( 365 ),
    address_line: "123 Mabini St".to_string(),
    city: "Quezon City".to_string(),
    province: "Metro Manila".to_string(),
    postal_code: "1100".to_string(),
    is_active: true,
    created_at: now,
    updated_at: now,
  };

  let mut conn = pool.acquire().await.unwrap();
  customers::insert( &mut *conn, &customer ).await.expect( "customer fixture must insert" );
  customer
}

/// Insert a customer whose license lapsed yesterday.
pub async fn fixture_expired_customer( pool: &PgPool ) -> Customer
{
  let mut customer = fixture_customer( pool ).await;
  let expired = Utc::now() - Duration::days( 1 );
  let mut conn = pool.acquire().await.unwrap();
  sqlx::query( "UPDATE customers SET driver_license_expiry = $1 WHERE id = $2" )
    .bind( expired )
    .bind( customer.id )
    .execute( &mut *conn )
    .await
    .unwrap();
  customer.driver_license_expiry = expired;
  customer
}
