//! JWT issuing and verification, plus the authenticated-principal
//! extractor.
//!
//! Tokens are HS256. Verification checks signature, `iss`, `aud`, and
//! `exp` against configuration; any failure is a 401 without detail
//! about which check failed.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use jsonwebtoken::{ decode, encode, DecodingKey, EncodingKey, Header, Validation };
use serde::{ Deserialize, Serialize };
use uuid::Uuid;

use crate::envelope::ApiFailure;
use crate::request_id::RequestId;
use crate::state::AppState;
use fleet_types::{ AppUser, FleetError, Result, Role };

/// Claims carried by an access token.
#[ derive( Debug, Clone, Serialize, Deserialize ) ]
pub struct Claims
{
  /// User id.
  pub sub: String,
  /// Login email.
  pub email: String,
  /// Granted roles.
  pub roles: Vec< String >,
  /// Issuer.
  pub iss: String,
  /// Audience.
  pub aud: String,
  /// Issued at (unix seconds).
  pub iat: i64,
  /// Expiry (unix seconds).
  pub exp: i64,
  /// Token id.
  pub jti: String,
}

impl Claims
{
  /// Parsed user id.
  pub fn user_id( &self ) -> Result< Uuid >
  {
    self.sub.parse().map_err( |_| FleetError::Unauthenticated( "malformed subject".to_string() ) )
  }

  /// Parsed roles; unknown role strings are dropped rather than trusted.
  pub fn parsed_roles( &self ) -> Vec< Role >
  {
    self.roles.iter().filter_map( |r| Role::parse( r ).ok() ).collect()
  }
}

/// Process-wide verifier, constructed once at startup and injected.
#[ derive( Clone ) ]
pub struct JwtVerifier
{
  encoding: EncodingKey,
  decoding: DecodingKey,
  issuer: String,
  audience: String,
  expiry_secs: i64,
}

impl core::fmt::Debug for JwtVerifier
{
  fn fmt( &self, f: &mut core::fmt::Formatter< '_ > ) -> core::fmt::Result
  {
    f.debug_struct( "JwtVerifier" )
      .field( "issuer", &self.issuer )
      .field( "audience", &self.audience )
      .finish_non_exhaustive()
  }
}

impl JwtVerifier
{
  /// Build from configuration.
  #[ must_use ]
  pub fn new( secret: &str, issuer: String, audience: String, expiry_secs: i64 ) -> Self
  {
    Self
    {
      encoding: EncodingKey::from_secret( secret.as_bytes() ),
      decoding: DecodingKey::from_secret( secret.as_bytes() ),
      issuer,
      audience,
      expiry_secs,
    }
  }

  /// Issue an access token for a user.
  ///
  /// # Errors
  ///
  /// `INTERNAL_ERROR` when encoding fails.
  pub fn issue( &self, user: &AppUser ) -> Result< String >
  {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims
    {
      sub: user.id.to_string(),
      email: user.email.clone(),
      roles: user.roles.iter().map( |r| r.as_str().to_string() ).collect(),
      iss: self.issuer.clone(),
      aud: self.audience.clone(),
      iat: now,
      exp: now + self.expiry_secs,
      jti: Uuid::new_v4().to_string(),
    };

    encode( &Header::default(), &claims, &self.encoding )
      .map_err( |e| FleetError::Internal( format!( "token encoding failed: {e}" ) ) )
  }

  /// Verify a bearer token.
  ///
  /// # Errors
  ///
  /// `UNAUTHENTICATED` for any signature, issuer, audience, or expiry
  /// failure.
  pub fn verify( &self, token: &str ) -> Result< Claims >
  {
    let mut validation = Validation::default();
    validation.set_issuer( &[ &self.issuer ] );
    validation.set_audience( &[ &self.audience ] );

    decode::< Claims >( token, &self.decoding, &validation )
      .map( |data| data.claims )
      .map_err( |_| FleetError::Unauthenticated( "invalid or expired token".to_string() ) )
  }
}

/// Extractor for handlers behind authentication.
///
/// Pulls `Authorization: Bearer …` from the request, verifies it against
/// the process-wide verifier, and hands the handler the claims. Missing
/// or bad credentials reject with the standard 401 envelope.
#[ derive( Debug, Clone ) ]
pub struct AuthenticatedUser( pub Claims );

impl AuthenticatedUser
{
  /// Enforce that the principal holds one of `required` (ADMIN always
  /// passes).
  ///
  /// # Errors
  ///
  /// `FORBIDDEN` when no required role is held.
  pub fn require_any( &self, required: &[ Role ] ) -> Result< () >
  {
    let held = self.0.parsed_roles();
    if held.contains( &Role::Admin ) || required.iter().any( |r| held.contains( r ) )
    {
      Ok( () )
    }
    else
    {
      Err( FleetError::Forbidden( format!(
        "requires one of: {}",
        required.iter().map( |r| r.as_str() ).collect::< Vec< _ > >().join( ", " )
      ) ) )
    }
  }
}

#[ axum::async_trait ]
impl FromRequestParts< AppState > for AuthenticatedUser
{
  type Rejection = ApiFailure;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState,
  ) -> core::result::Result< Self, Self::Rejection >
  {
    let request_id = parts
      .extensions
      .get::< RequestId >()
      .cloned()
      .unwrap_or_else( RequestId::generate );

    let TypedHeader( Authorization( bearer ) ) =
      TypedHeader::< Authorization< Bearer > >::from_request_parts( parts, state )
        .await
        .map_err( |_| ApiFailure::from_error(
          &FleetError::Unauthenticated( "missing bearer token".to_string() ),
          &request_id,
        ) )?;

    let claims = state
      .jwt
      .verify( bearer.token() )
      .map_err( |e| ApiFailure::from_error( &e, &request_id ) )?;

    Ok( Self( claims ) )
  }
}

#[ cfg( test ) ]
mod tests
{
  use super::*;
  use chrono::Utc;

  fn verifier() -> JwtVerifier
  {
    JwtVerifier::new(
      "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef",
      "fleet-backend".to_string(),
      "fleet-clients".to_string(),
      3_600,
    )
  }

  fn user( roles: Vec< Role > ) -> AppUser
  {
    AppUser
    {
      id: Uuid::new_v4(),
      email: "agent@fleet.ph".to_string(),
      password_hash: String::new(),
      roles,
      is_active: true,
      created_at: Utc::now(),
      updated_at: Utc::now(),
    }
  }

  #[ test ]
  fn issue_verify_round_trip()
  {
    let v = verifier();
    let u = user( vec![ Role::RentalAgent ] );
    let token = v.issue( &u ).unwrap();
    let claims = v.verify( &token ).unwrap();
    assert_eq!( claims.user_id().unwrap(), u.id );
    assert_eq!( claims.parsed_roles(), vec![ Role::RentalAgent ] );
  }

  #[ test ]
  fn wrong_audience_rejected()
  {
    let issuing = verifier();
    let expecting = JwtVerifier::new(
      "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef",
      "fleet-backend".to_string(),
      "other-audience".to_string(),
      3_600,
    );
    let token = issuing.issue( &user( vec![] ) ).unwrap();
    assert!( expecting.verify( &token ).is_err() );
  }

  #[ test ]
  fn wrong_secret_rejected()
  {
    let issuing = verifier();
    let expecting = JwtVerifier::new(
      "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
      "fleet-backend".to_string(),
      "fleet-clients".to_string(),
      3_600,
    );
    let token = issuing.issue( &user( vec![] ) ).unwrap();
    assert!( expecting.verify( &token ).is_err() );
  }

  #[ test ]
  fn admin_passes_any_role_gate()
  {
    let v = verifier();
    let token = v.issue( &user( vec![ Role::Admin ] ) ).unwrap();
    let principal = AuthenticatedUser( v.verify( &token ).unwrap() );
    principal.require_any( &[ Role::FinanceOwner ] ).unwrap();
  }

  #[ test ]
  fn missing_role_is_forbidden()
  {
    let v = verifier();
    let token = v.issue( &user( vec![ Role::Customer ] ) ).unwrap();
    let principal = AuthenticatedUser( v.verify( &token ).unwrap() );
    let err = principal.require_any( &[ Role::FleetManager ] ).unwrap_err();
    assert_eq!( err.code(), "FORBIDDEN" );
  }
}
