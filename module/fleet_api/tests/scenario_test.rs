//! End-to-end scenarios through the full HTTP pipeline.

mod common;

use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

use fleet_types::Role;

async fn create_vehicle( router: &axum::Router, token: &str, daily_rate: i64, mileage: i64 ) -> Uuid
{
  let suffix: String = Uuid::new_v4().simple().to_string();
  let response = common::send(
    router,
    common::request(
      "POST",
      "/v1/vehicles",
      Some( token ),
      Some( json!( {
        "vin": format!( "VIN{}", &suffix[ ..14 ] ).to_uppercase(),
        "plate": format!( "PLT-{}", &suffix[ ..6 ] ),
        "make": "Toyota",
        "model": "Vios",
        "year": 2022,
        "mileageKm": mileage,
        "dailyRateAmount": daily_rate,
        "passengerCapacity": 5
      } ) ),
    ),
  )
  .await;
  let body = common::expect_status( response, StatusCode::CREATED ).await;
  body[ "data" ][ "id" ].as_str().unwrap().parse().unwrap()
}

#[ sqlx::test( migrations = false ) ]
async fn happy_rental_lifecycle( pool: sqlx::PgPool )
{
  let ( router, state ) = common::setup( pool.clone() ).await;
  let ( _user, token ) = common::user_with_roles( &state, vec![ Role::Admin ] ).await;
  let customer = common::fixture_customer( &state ).await;

  let vehicle_id = create_vehicle( &router, &token, 500, 10_000 ).await;

  // Reserve 2026-06-01 → 2026-06-05 at 500/day.
  let response = common::send(
    &router,
    common::request(
      "POST",
      "/v1/rentals",
      Some( &token ),
      Some( json!( {
        "vehicleId": vehicle_id,
        "customerId": customer.id,
        "startDate": "2026-06-01T10:00:00Z",
        "endDate": "2026-06-05T10:00:00Z"
      } ) ),
    ),
  )
  .await;
  let body = common::expect_status( response, StatusCode::CREATED ).await;
  assert_eq!( body[ "data" ][ "status" ], "RESERVED" );
  assert_eq!( body[ "data" ][ "totalAmount" ], 2_000 );
  let rental_id = body[ "data" ][ "id" ].as_str().unwrap().to_string();

  // Activate at pickup.
  let response = common::send(
    &router,
    common::request(
      "POST",
      &format!( "/v1/rentals/{rental_id}/activate" ),
      Some( &token ),
      Some( json!( { "startOdometerKm": 10_000 } ) ),
    ),
  )
  .await;
  let body = common::expect_status( response, StatusCode::OK ).await;
  assert_eq!( body[ "data" ][ "status" ], "ACTIVE" );

  let response = common::send(
    &router,
    common::request( "GET", &format!( "/v1/vehicles/{vehicle_id}" ), Some( &token ), None ),
  )
  .await;
  let body = common::expect_status( response, StatusCode::OK ).await;
  assert_eq!( body[ "data" ][ "state" ], "RENTED" );

  // The activation posting: Dr 1100 / Cr 4000, 2000 each.
  let ( ar_debit, revenue_credit ): ( i64, i64 ) = sqlx::query_as(
    "SELECT
       COALESCE(SUM(CASE WHEN a.code = '1100' THEN l.debit ELSE 0 END), 0)::bigint,
       COALESCE(SUM(CASE WHEN a.code = '4000' THEN l.credit ELSE 0 END), 0)::bigint
     FROM ledger_entry_lines l
     JOIN accounts a ON a.id = l.account_id
     JOIN ledger_entries e ON e.id = l.entry_id
     WHERE e.external_reference = $1",
  )
  .bind( format!( "rental-{rental_id}-activation" ) )
  .fetch_one( &pool )
  .await
  .unwrap();
  assert_eq!( ar_debit, 2_000 );
  assert_eq!( revenue_credit, 2_000 );

  // Complete at return.
  let response = common::send(
    &router,
    common::request(
      "POST",
      &format!( "/v1/rentals/{rental_id}/complete" ),
      Some( &token ),
      Some( json!( { "finalMileageKm": 10_450 } ) ),
    ),
  )
  .await;
  let body = common::expect_status( response, StatusCode::OK ).await;
  assert_eq!( body[ "data" ][ "status" ], "COMPLETED" );

  let response = common::send(
    &router,
    common::request( "GET", &format!( "/v1/vehicles/{vehicle_id}" ), Some( &token ), None ),
  )
  .await;
  let body = common::expect_status( response, StatusCode::OK ).await;
  assert_eq!( body[ "data" ][ "state" ], "AVAILABLE" );
  assert_eq!( body[ "data" ][ "mileageKm" ], 10_450 );
}

#[ sqlx::test( migrations = false ) ]
async fn double_booking_is_a_rental_conflict( pool: sqlx::PgPool )
{
  let ( router, state ) = common::setup( pool ).await;
  let ( _user, token ) = common::user_with_roles( &state, vec![ Role::Admin ] ).await;
  let customer = common::fixture_customer( &state ).await;
  let vehicle_id = create_vehicle( &router, &token, 500, 10_000 ).await;

  let reserve = |start: &'static str, end: &'static str| common::request(
    "POST",
    "/v1/rentals",
    Some( &token ),
    Some( json!( {
      "vehicleId": vehicle_id,
      "customerId": customer.id,
      "startDate": start,
      "endDate": end
    } ) ),
  );

  let first =
    common::send( &router, reserve( "2026-06-01T10:00:00Z", "2026-06-05T10:00:00Z" ) ).await;
  common::expect_status( first, StatusCode::CREATED ).await;

  let second =
    common::send( &router, reserve( "2026-06-03T00:00:00Z", "2026-06-07T00:00:00Z" ) ).await;
  let body = common::expect_status( second, StatusCode::CONFLICT ).await;
  assert_eq!( common::error_code( &body ), "RENTAL_CONFLICT" );
}

#[ sqlx::test( migrations = false ) ]
async fn idempotent_payment_capture( pool: sqlx::PgPool )
{
  let ( router, state ) = common::setup( pool.clone() ).await;
  let ( _user, token ) = common::user_with_roles( &state, vec![ Role::FinanceOwner ] ).await;
  let customer = common::fixture_customer( &state ).await;

  // Issue invoice I with total 2800.
  let response = common::send(
    &router,
    common::request(
      "POST",
      "/v1/accounting/invoices",
      Some( &token ),
      Some( json!( { "customerId": customer.id, "subtotal": 2_500, "tax": 300 } ) ),
    ),
  )
  .await;
  let body = common::expect_status( response, StatusCode::CREATED ).await;
  let invoice_id = body[ "data" ][ "id" ].as_str().unwrap().to_string();

  let pay_request = || {
    let mut request = common::request(
      "POST",
      &format!( "/v1/accounting/invoices/{invoice_id}/pay" ),
      Some( &token ),
      Some( json!( { "amount": 2_800, "paymentMethod": "GCASH" } ) ),
    );
    request.headers_mut().insert( "idempotency-key", "k1".parse().unwrap() );
    request
  };

  let first = common::send( &router, pay_request() ).await;
  assert_eq!( first.status(), StatusCode::OK );
  let first_bytes = common::body_bytes( first ).await;
  let first_body: serde_json::Value = serde_json::from_slice( &first_bytes ).unwrap();
  assert_eq!( first_body[ "data" ][ "invoice" ][ "status" ], "PAID" );

  // The retry replays byte-identically and runs no handler.
  let second = common::send( &router, pay_request() ).await;
  assert_eq!( second.status(), StatusCode::OK );
  let second_bytes = common::body_bytes( second ).await;
  assert_eq!( first_bytes, second_bytes, "replay must be byte-identical" );

  let payments: i64 = sqlx::query_scalar( "SELECT COUNT(*) FROM payments" )
    .fetch_one( &pool )
    .await
    .unwrap();
  assert_eq!( payments, 1 );
  let entries: i64 = sqlx::query_scalar(
    "SELECT COUNT(*) FROM ledger_entries WHERE external_reference LIKE 'invoice-%'",
  )
  .fetch_one( &pool )
  .await
  .unwrap();
  assert_eq!( entries, 1 );
}

#[ sqlx::test( migrations = false ) ]
async fn payment_without_key_is_rejected( pool: sqlx::PgPool )
{
  let ( router, state ) = common::setup( pool ).await;
  let ( _user, token ) = common::user_with_roles( &state, vec![ Role::FinanceOwner ] ).await;
  let customer = common::fixture_customer( &state ).await;

  let response = common::send(
    &router,
    common::request(
      "POST",
      "/v1/accounting/invoices",
      Some( &token ),
      Some( json!( { "customerId": customer.id, "subtotal": 100 } ) ),
    ),
  )
  .await;
  let body = common::expect_status( response, StatusCode::CREATED ).await;
  let invoice_id = body[ "data" ][ "id" ].as_str().unwrap().to_string();

  let bare = common::send(
    &router,
    common::request(
      "POST",
      &format!( "/v1/accounting/invoices/{invoice_id}/pay" ),
      Some( &token ),
      Some( json!( { "amount": 100, "paymentMethod": "CASH" } ) ),
    ),
  )
  .await;
  let body = common::expect_status( bare, StatusCode::UNPROCESSABLE_ENTITY ).await;
  assert_eq!( common::error_code( &body ), "VALIDATION_ERROR" );
}

#[ sqlx::test( migrations = false ) ]
async fn odometer_monotonicity_over_http( pool: sqlx::PgPool )
{
  let ( router, state ) = common::setup( pool ).await;
  let ( _user, token ) = common::user_with_roles( &state, vec![ Role::FleetManager ] ).await;
  let vehicle_id = create_vehicle( &router, &token, 500, 18_500 ).await;

  let post_reading = |km: i64| common::request(
    "POST",
    &format!( "/v1/vehicles/{vehicle_id}/odometer" ),
    Some( &token ),
    Some( json!( { "mileageKm": km } ) ),
  );

  let decrease = common::send( &router, post_reading( 10_000 ) ).await;
  let body = common::expect_status( decrease, StatusCode::UNPROCESSABLE_ENTITY ).await;
  assert_eq!( common::error_code( &body ), "INVALID_MILEAGE" );

  let increase = common::send( &router, post_reading( 18_600 ) ).await;
  common::expect_status( increase, StatusCode::OK ).await;

  let read = common::send(
    &router,
    common::request( "GET", &format!( "/v1/vehicles/{vehicle_id}" ), Some( &token ), None ),
  )
  .await;
  let body = common::expect_status( read, StatusCode::OK ).await;
  assert_eq!( body[ "data" ][ "mileageKm" ], 18_600 );
}

#[ sqlx::test( migrations = false ) ]
async fn maintenance_waits_for_the_active_rental( pool: sqlx::PgPool )
{
  let ( router, state ) = common::setup( pool ).await;
  let ( _user, token ) = common::user_with_roles( &state, vec![ Role::Admin ] ).await;
  let customer = common::fixture_customer( &state ).await;
  let vehicle_id = create_vehicle( &router, &token, 500, 10_000 ).await;

  // Put the vehicle out on an active rental.
  let response = common::send(
    &router,
    common::request(
      "POST",
      "/v1/rentals",
      Some( &token ),
      Some( json!( {
        "vehicleId": vehicle_id,
        "customerId": customer.id,
        "startDate": "2026-06-01T10:00:00Z",
        "endDate": "2026-06-05T10:00:00Z"
      } ) ),
    ),
  )
  .await;
  let body = common::expect_status( response, StatusCode::CREATED ).await;
  let rental_id = body[ "data" ][ "id" ].as_str().unwrap().to_string();

  common::expect_status(
    common::send(
      &router,
      common::request(
        "POST",
        &format!( "/v1/rentals/{rental_id}/activate" ),
        Some( &token ),
        Some( json!( { "startOdometerKm": 10_000 } ) ),
      ),
    )
    .await,
    StatusCode::OK,
  )
  .await;

  // Schedule and try to start maintenance while rented.
  let response = common::send(
    &router,
    common::request(
      "POST",
      "/v1/maintenance",
      Some( &token ),
      Some( json!( {
        "vehicleId": vehicle_id,
        "jobType": "ROUTINE",
        "scheduledDate": "2026-06-01T00:00:00Z"
      } ) ),
    ),
  )
  .await;
  let body = common::expect_status( response, StatusCode::CREATED ).await;
  let job_id = body[ "data" ][ "id" ].as_str().unwrap().to_string();

  let blocked = common::send(
    &router,
    common::request( "POST", &format!( "/v1/maintenance/{job_id}/start" ), Some( &token ), None ),
  )
  .await;
  let body = common::expect_status( blocked, StatusCode::CONFLICT ).await;
  assert_eq!( common::error_code( &body ), "INVALID_STATE" );

  // Complete the rental, then the same start succeeds.
  common::expect_status(
    common::send(
      &router,
      common::request(
        "POST",
        &format!( "/v1/rentals/{rental_id}/complete" ),
        Some( &token ),
        Some( json!( { "finalMileageKm": 10_450 } ) ),
      ),
    )
    .await,
    StatusCode::OK,
  )
  .await;

  let started = common::send(
    &router,
    common::request( "POST", &format!( "/v1/maintenance/{job_id}/start" ), Some( &token ), None ),
  )
  .await;
  common::expect_status( started, StatusCode::OK ).await;

  let vehicle = common::send(
    &router,
    common::request( "GET", &format!( "/v1/vehicles/{vehicle_id}" ), Some( &token ), None ),
  )
  .await;
  let body = common::expect_status( vehicle, StatusCode::OK ).await;
  assert_eq!( body[ "data" ][ "state" ], "MAINTENANCE" );
}

#[ sqlx::test( migrations = false ) ]
async fn reports_and_reconciliation_round_trip( pool: sqlx::PgPool )
{
  let ( router, state ) = common::setup( pool ).await;
  let ( _user, token ) = common::user_with_roles( &state, vec![ Role::FinanceOwner ] ).await;
  let customer = common::fixture_customer( &state ).await;

  let response = common::send(
    &router,
    common::request(
      "POST",
      "/v1/accounting/invoices",
      Some( &token ),
      Some( json!( { "customerId": customer.id, "subtotal": 1_000 } ) ),
    ),
  )
  .await;
  let body = common::expect_status( response, StatusCode::CREATED ).await;
  let invoice_id = body[ "data" ][ "id" ].as_str().unwrap().to_string();

  let mut pay = common::request(
    "POST",
    &format!( "/v1/accounting/invoices/{invoice_id}/pay" ),
    Some( &token ),
    Some( json!( { "amount": 1_000, "paymentMethod": "CASH" } ) ),
  );
  pay.headers_mut().insert( "idempotency-key", "rk1".parse().unwrap() );
  common::expect_status( common::send( &router, pay ).await, StatusCode::OK ).await;

  let balance = common::send(
    &router,
    common::request( "GET", "/v1/accounting/accounts/1000/balance", Some( &token ), None ),
  )
  .await;
  let body = common::expect_status( balance, StatusCode::OK ).await;
  assert_eq!( body[ "data" ][ "balance" ], 1_000 );

  let reconciliation = common::send(
    &router,
    common::request( "GET", "/v1/reconciliation/invoices", Some( &token ), None ),
  )
  .await;
  let body = common::expect_status( reconciliation, StatusCode::OK ).await;
  assert_eq!( body[ "data" ][ "findings" ].as_array().unwrap().len(), 0 );

  let integrity = common::send(
    &router,
    common::request( "GET", "/v1/reconciliation/integrity", Some( &token ), None ),
  )
  .await;
  let body = common::expect_status( integrity, StatusCode::OK ).await;
  assert_eq!( body[ "data" ][ "isBalanced" ], true );

  let sheet = common::send(
    &router,
    common::request( "GET", "/v1/reports/balance-sheet", Some( &token ), None ),
  )
  .await;
  let body = common::expect_status( sheet, StatusCode::OK ).await;
  assert_eq!( body[ "data" ][ "isBalanced" ], true );
}
