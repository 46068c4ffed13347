//! Test infrastructure driving the assembled router end to end.
//!
//! Requests go through `tower::ServiceExt::oneshot`, so every layer of
//! the real pipeline (request-id, rate limiting, auth, idempotency,
//! error translation) is exercised exactly as in production; only the
//! TCP listener is absent.

use axum::body::Body;
use axum::http::{ header, Request, Response, StatusCode };
use axum::Router;
use chrono::{ Duration, Utc };
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

use fleet_api::jwt_auth::JwtVerifier;
use fleet_api::state::AppState;
use fleet_store::{ customers, migrations, seed, users };
use fleet_types::{ AppUser, Customer, Role };

pub const TEST_SECRET: &str =
  "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

/// Migrate, seed, and assemble the router plus its state.
pub async fn setup( pool: PgPool ) -> ( Router, AppState )
{
  migrations::apply_all_migrations( &pool ).await.expect( "migrations must apply" );
  seed::seed_all( &pool, None ).await.expect( "seed must apply" );

  let jwt = JwtVerifier::new(
    TEST_SECRET,
    "fleet-backend".to_string(),
    "fleet-clients".to_string(),
    3_600,
  );
  let state = AppState::new( pool, None, jwt, 60 );
  ( fleet_api::build_router( state.clone() ), state )
}

/// Insert a user with `roles` and mint a bearer token for it.
pub async fn user_with_roles( state: &AppState, roles: Vec< Role > ) -> ( AppUser, String )
{
  let now = Utc::now();
  let suffix: String = Uuid::new_v4().simple().to_string();
  let user = AppUser
  {
    id: Uuid::new_v4(),
    email: format!( "{}@fleet.ph", &suffix[ ..12 ] ),
    password_hash: bcrypt::hash( "s3cret-pass", 4 ).unwrap(),
    roles,
    is_active: true,
    created_at: now,
    updated_at: now,
  };

  let mut conn = state.pool.acquire().await.unwrap();
  users::insert( &mut *conn, &user ).await.expect( "test user must insert" );

  let token = state.jwt.issue( &user ).unwrap();
  ( user, token )
}

/// Insert a customer fixture directly.
pub async fn fixture_customer( state: &AppState ) -> Customer
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

  let mut conn = state.pool.acquire().await.unwrap();
  customers::insert( &mut *conn, &customer ).await.unwrap();
  customer
}

/// Build a JSON request, optionally authenticated.
pub fn request(
  method: &str,
  uri: &str,
  token: Option< &str >,
  body: Option< serde_json::Value >,
) -> Request< Body >
{
  let mut builder = Request::builder()
    .method( method )
    .uri( uri )
    .header( header::CONTENT_TYPE, "application/json" );

  if let Some( token ) = token
  {
    builder = builder.header( header::AUTHORIZATION, format!( "Bearer {token}" ) );
  }

  let body = match body
  {
    Some( value ) => Body::from( value.to_string() ),
    None => Body::empty(),
  };
  builder.body( body ).unwrap()
}

/// Drive one request through the router.
pub async fn send( router: &Router, request: Request< Body > ) -> Response< Body >
{
  router.clone().oneshot( request ).await.unwrap()
}

/// Collect a response body as raw bytes.
pub async fn body_bytes( response: Response< Body > ) -> Vec< u8 >
{
  response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

/// Collect a response body as JSON.
pub async fn body_json( response: Response< Body > ) -> serde_json::Value
{
  let bytes = body_bytes( response ).await;
  serde_json::from_slice( &bytes ).expect( "body must be JSON" )
}

/// Assert status and return the parsed body.
pub async fn expect_status(
  response: Response< Body >,
  expected: StatusCode,
) -> serde_json::Value
{
  let status = response.status();
  let body = body_json( response ).await;
  assert_eq!( status, expected, "unexpected status, body: {body}" );
  body
}

/// The error code of a failure envelope.
pub fn error_code( body: &serde_json::Value ) -> &str
{
  body[ "error" ][ "code" ].as_str().unwrap_or( "<missing>" )
}
