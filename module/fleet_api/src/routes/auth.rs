//! Login and registration.
//!
//! Login must not reveal whether an email exists: unknown emails still
//! burn a bcrypt verification against a fixed dummy hash, and every
//! credential failure returns the same message.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{ Extension, Json };
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::envelope::{ fail, success, ApiResult };
use crate::request_id::RequestId;
use crate::state::AppState;
use fleet_store::{ map_db_err, users };
use fleet_types::{ AppUser, FieldViolation, FleetError, Role };

/// A syntactically valid bcrypt hash of a random throwaway string; used
/// to equalize timing when the email is unknown.
const DUMMY_HASH: &str = "$2b$12$GhvMmNVjRW29ulnudl.LbuAnUtN/LRfe1JsBm1Xu6LE3059z5Tr8m";

const CREDENTIAL_ERROR: &str = "invalid email or password";

/// Login request body.
#[ derive( Debug, Deserialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct LoginRequest
{
  /// Login email.
  pub email: String,
  /// Plaintext password.
  pub password: String,
}

impl LoginRequest
{
  fn validate( &self ) -> Result< (), FleetError >
  {
    let mut details = Vec::new();
    if !self.email.contains( '@' )
    {
      details.push( FieldViolation::new( "email", "invalid_format" ) );
    }
    if self.password.is_empty()
    {
      details.push( FieldViolation::new( "password", "required" ) );
    }
    if details.is_empty()
    {
      Ok( () )
    }
    else
    {
      Err( FleetError::validation_fields( "login failed validation", details ) )
    }
  }
}

/// POST /v1/users/login
pub async fn login(
  State( state ): State< AppState >,
  Extension( request_id ): Extension< RequestId >,
  Json( request ): Json< LoginRequest >,
) -> ApiResult
{
  request.validate().map_err( |e| fail( &e, &request_id ) )?;

  let mut conn = state.pool.acquire().await
    .map_err( |e| fail( &map_db_err( e ), &request_id ) )?;
  let user = users::find_by_email( &mut *conn, &request.email ).await
    .map_err( |e| fail( &e, &request_id ) )?;

  // Verify against the stored hash or the dummy so both paths cost a
  // bcrypt round.
  let ( hash, known ) = match &user
  {
    Some( u ) => ( u.password_hash.as_str(), true ),
    None => ( DUMMY_HASH, false ),
  };
  let password_matches = bcrypt::verify( &request.password, hash ).unwrap_or( false );

  let authenticated = match user
  {
    Some( u ) if known && password_matches && u.is_active => u,
    _ =>
    {
      tracing::info!( request_id = request_id.as_str(), "failed login attempt" );
      return Err( fail(
        &FleetError::Unauthenticated( CREDENTIAL_ERROR.to_string() ),
        &request_id,
      ) );
    }
  };

  let token = state.jwt.issue( &authenticated ).map_err( |e| fail( &e, &request_id ) )?;

  Ok( success(
    StatusCode::OK,
    &request_id,
    json!( {
      "accessToken": token,
      "tokenType": "Bearer",
      "user": authenticated,
    } ),
  ) )
}

/// Registration request body.
#[ derive( Debug, Deserialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct RegisterRequest
{
  /// Login email, unique.
  pub email: String,
  /// Plaintext password, 8..=128 chars.
  pub password: String,
}

impl RegisterRequest
{
  fn validate( &self ) -> Result< (), FleetError >
  {
    let mut details = Vec::new();
    if !self.email.contains( '@' ) || self.email.len() > 255
    {
      details.push( FieldViolation::new( "email", "invalid_format" ) );
    }
    if self.password.len() < 8
    {
      details.push( FieldViolation::new( "password", "too_short" ) );
    }
    if self.password.len() > 128
    {
      details.push( FieldViolation::new( "password", "too_long" ) );
    }
    if details.is_empty()
    {
      Ok( () )
    }
    else
    {
      Err( FleetError::validation_fields( "registration failed validation", details ) )
    }
  }
}

/// POST /v1/users/register — self-service accounts get the CUSTOMER role.
pub async fn register(
  State( state ): State< AppState >,
  Extension( request_id ): Extension< RequestId >,
  Json( request ): Json< RegisterRequest >,
) -> ApiResult
{
  request.validate().map_err( |e| fail( &e, &request_id ) )?;

  let password_hash = bcrypt::hash( &request.password, bcrypt::DEFAULT_COST )
    .map_err( |e| fail( &FleetError::Internal( format!( "hashing failed: {e}" ) ), &request_id ) )?;

  let now = Utc::now();
  let user = AppUser
  {
    id: Uuid::new_v4(),
    email: request.email,
    password_hash,
    roles: vec![ Role::Customer ],
    is_active: true,
    created_at: now,
    updated_at: now,
  };

  let mut conn = state.pool.acquire().await
    .map_err( |e| fail( &map_db_err( e ), &request_id ) )?;
  users::insert( &mut *conn, &user ).await.map_err( |e| match e
  {
    // Do not leak which emails exist beyond the unavoidable conflict
    // status itself.
    FleetError::Conflict( _ ) =>
      fail( &FleetError::Conflict( "account cannot be created".to_string() ), &request_id ),
    other => fail( &other, &request_id ),
  } )?;

  Ok( success( StatusCode::CREATED, &request_id, user ) )
}
