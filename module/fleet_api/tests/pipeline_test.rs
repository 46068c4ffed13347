//! Pipeline-level behavior: correlation, envelope shape, auth, RBAC,
//! rate limiting.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use fleet_types::Role;

#[ sqlx::test( migrations = false ) ]
async fn request_id_is_echoed_when_supplied( pool: sqlx::PgPool )
{
  let ( router, _state ) = common::setup( pool ).await;

  let mut request = common::request( "GET", "/health", None, None );
  request.headers_mut().insert( "x-request-id", "req_custom_123".parse().unwrap() );

  let response = common::send( &router, request ).await;
  assert_eq!( response.headers()[ "x-request-id" ], "req_custom_123" );

  let body = common::expect_status( response, StatusCode::OK ).await;
  assert_eq!( body[ "requestId" ], "req_custom_123" );
  assert_eq!( body[ "success" ], true );
}

#[ sqlx::test( migrations = false ) ]
async fn request_id_is_generated_when_absent( pool: sqlx::PgPool )
{
  let ( router, _state ) = common::setup( pool ).await;

  let response = common::send( &router, common::request( "GET", "/health", None, None ) ).await;
  let header = response.headers()[ "x-request-id" ].to_str().unwrap().to_string();
  assert!( header.starts_with( "req_" ) );

  let body = common::body_json( response ).await;
  assert_eq!( body[ "requestId" ], header.as_str() );
}

#[ sqlx::test( migrations = false ) ]
async fn protected_route_rejects_missing_and_garbage_tokens( pool: sqlx::PgPool )
{
  let ( router, _state ) = common::setup( pool ).await;

  let bare = common::send( &router, common::request( "GET", "/v1/vehicles", None, None ) ).await;
  let body = common::expect_status( bare, StatusCode::UNAUTHORIZED ).await;
  assert_eq!( common::error_code( &body ), "UNAUTHENTICATED" );
  assert_eq!( body[ "success" ], false );

  let garbage =
    common::send( &router, common::request( "GET", "/v1/vehicles", Some( "not-a-jwt" ), None ) ).await;
  let body = common::expect_status( garbage, StatusCode::UNAUTHORIZED ).await;
  assert_eq!( common::error_code( &body ), "UNAUTHENTICATED" );
}

#[ sqlx::test( migrations = false ) ]
async fn rbac_blocks_customers_from_fleet_mutation( pool: sqlx::PgPool )
{
  let ( router, state ) = common::setup( pool ).await;
  let ( _user, token ) = common::user_with_roles( &state, vec![ Role::Customer ] ).await;

  let request = common::request(
    "POST",
    "/v1/vehicles",
    Some( &token ),
    Some( json!( {
      "vin": "1HGBH41JXMN109186",
      "plate": "ABC-1234",
      "make": "Toyota",
      "model": "Vios",
      "year": 2022,
      "dailyRateAmount": 500,
      "passengerCapacity": 5
    } ) ),
  );
  let response = common::send( &router, request ).await;
  let body = common::expect_status( response, StatusCode::FORBIDDEN ).await;
  assert_eq!( common::error_code( &body ), "FORBIDDEN" );
}

#[ sqlx::test( migrations = false ) ]
async fn fleet_manager_may_create_vehicles( pool: sqlx::PgPool )
{
  let ( router, state ) = common::setup( pool ).await;
  let ( _user, token ) = common::user_with_roles( &state, vec![ Role::FleetManager ] ).await;

  let request = common::request(
    "POST",
    "/v1/vehicles",
    Some( &token ),
    Some( json!( {
      "vin": "1HGBH41JXMN109186",
      "plate": "ABC-1234",
      "make": "Toyota",
      "model": "Vios",
      "year": 2022,
      "mileageKm": 10000,
      "dailyRateAmount": 500,
      "passengerCapacity": 5
    } ) ),
  );
  let response = common::send( &router, request ).await;
  let body = common::expect_status( response, StatusCode::CREATED ).await;
  assert_eq!( body[ "data" ][ "state" ], "AVAILABLE" );
  assert_eq!( body[ "data" ][ "currency" ], "PHP" );
}

#[ sqlx::test( migrations = false ) ]
async fn auth_strict_class_limits_login_attempts( pool: sqlx::PgPool )
{
  let ( router, _state ) = common::setup( pool ).await;
  let credentials = json!( { "email": "nobody@fleet.ph", "password": "wrong-password" } );

  for _ in 0..5
  {
    let response = common::send(
      &router,
      common::request( "POST", "/v1/users/login", None, Some( credentials.clone() ) ),
    )
    .await;
    assert_eq!( response.status(), StatusCode::UNAUTHORIZED );
  }

  let response = common::send(
    &router,
    common::request( "POST", "/v1/users/login", None, Some( credentials ) ),
  )
  .await;
  assert_eq!( response.status(), StatusCode::TOO_MANY_REQUESTS );
  assert_eq!( response.headers()[ "x-ratelimit-remaining" ], "0" );
  assert!( response.headers().contains_key( "x-ratelimit-reset" ) );

  let body = common::body_json( response ).await;
  assert_eq!( common::error_code( &body ), "RATE_LIMITED" );
}

#[ sqlx::test( migrations = false ) ]
async fn login_does_not_distinguish_unknown_email_from_wrong_password( pool: sqlx::PgPool )
{
  let ( router, state ) = common::setup( pool ).await;
  let ( user, _token ) = common::user_with_roles( &state, vec![ Role::RentalAgent ] ).await;

  let unknown = common::send(
    &router,
    common::request(
      "POST",
      "/v1/users/login",
      None,
      Some( json!( { "email": "ghost@fleet.ph", "password": "whatever-pass" } ) ),
    ),
  )
  .await;
  let unknown_body = common::expect_status( unknown, StatusCode::UNAUTHORIZED ).await;

  let wrong = common::send(
    &router,
    common::request(
      "POST",
      "/v1/users/login",
      None,
      Some( json!( { "email": user.email, "password": "wrong-password" } ) ),
    ),
  )
  .await;
  let wrong_body = common::expect_status( wrong, StatusCode::UNAUTHORIZED ).await;

  assert_eq!( unknown_body[ "error" ][ "message" ], wrong_body[ "error" ][ "message" ] );
  assert_eq!( common::error_code( &unknown_body ), common::error_code( &wrong_body ) );
}

#[ sqlx::test( migrations = false ) ]
async fn login_returns_a_working_token( pool: sqlx::PgPool )
{
  let ( router, state ) = common::setup( pool ).await;
  let ( user, _ ) = common::user_with_roles( &state, vec![ Role::RentalAgent ] ).await;

  let response = common::send(
    &router,
    common::request(
      "POST",
      "/v1/users/login",
      None,
      Some( json!( { "email": user.email, "password": "s3cret-pass" } ) ),
    ),
  )
  .await;
  let body = common::expect_status( response, StatusCode::OK ).await;
  let token = body[ "data" ][ "accessToken" ].as_str().unwrap().to_string();

  let listing =
    common::send( &router, common::request( "GET", "/v1/vehicles", Some( &token ), None ) ).await;
  common::expect_status( listing, StatusCode::OK ).await;
}

#[ sqlx::test( migrations = false ) ]
async fn unknown_route_is_enveloped_not_found( pool: sqlx::PgPool )
{
  let ( router, _state ) = common::setup( pool ).await;

  let response =
    common::send( &router, common::request( "GET", "/v1/nonexistent", None, None ) ).await;
  let body = common::expect_status( response, StatusCode::NOT_FOUND ).await;
  assert_eq!( common::error_code( &body ), "NOT_FOUND" );
  assert!( body[ "requestId" ].as_str().unwrap().starts_with( "req_" ) );
}

#[ sqlx::test( migrations = false ) ]
async fn validation_failures_carry_field_details( pool: sqlx::PgPool )
{
  let ( router, state ) = common::setup( pool ).await;
  let ( _user, token ) = common::user_with_roles( &state, vec![ Role::Admin ] ).await;
  let customer = common::fixture_customer( &state ).await;

  // endDate before startDate
  let response = common::send(
    &router,
    common::request(
      "POST",
      "/v1/rentals",
      Some( &token ),
      Some( json!( {
        "vehicleId": uuid::Uuid::new_v4(),
        "customerId": customer.id,
        "startDate": "2026-06-05T10:00:00Z",
        "endDate": "2026-06-01T10:00:00Z"
      } ) ),
    ),
  )
  .await;
  let body = common::expect_status( response, StatusCode::UNPROCESSABLE_ENTITY ).await;
  assert_eq!( common::error_code( &body ), "VALIDATION_ERROR" );
  assert_eq!( body[ "error" ][ "details" ][ 0 ][ "field" ], "endDate" );
}
