//! Customer endpoints. Thin enough to talk to the store directly.

use axum::extract::{ Path, Query, State };
use axum::http::StatusCode;
use axum::{ Extension, Json };
use chrono::{ DateTime, Utc };
use serde::Deserialize;
use uuid::Uuid;

use crate::envelope::{ fail, success, ApiResult };
use crate::jwt_auth::AuthenticatedUser;
use crate::request_id::RequestId;
use crate::state::AppState;
use super::PageQuery;
use fleet_store::{ customers, map_db_err };
use fleet_types::Customer;

/// Create-customer request body.
#[ derive( Debug, Deserialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct CreateCustomerRequest
{
  /// Email, unique.
  pub email: String,
  /// Contact number.
  #[ serde( default ) ]
  pub phone: String,
  /// Given name.
  pub first_name: String,
  /// Family name.
  pub last_name: String,
  /// License number, unique.
  pub driver_license_number: String,
  /// License expiry.
  pub driver_license_expiry: DateTime< Utc >,
  /// Street address.
  #[ serde( default ) ]
  pub address_line: String,
  /// City.
  #[ serde( default ) ]
  pub city: String,
  /// Province.
  #[ serde( default ) ]
  pub province: String,
  /// Postal code.
  #[ serde( default ) ]
  pub postal_code: String,
}

/// POST /v1/customers
pub async fn create_customer(
  State( state ): State< AppState >,
  Extension( request_id ): Extension< RequestId >,
  _user: AuthenticatedUser,
  Json( request ): Json< CreateCustomerRequest >,
) -> ApiResult
{
  let now = Utc::now();
  let customer = Customer
  {
    id: Uuid::new_v4(),
    email: request.email,
    phone: request.phone,
    first_name: request.first_name,
    last_name: request.last_name,
    driver_license_number: request.driver_license_number,
    driver_license_expiry: request.driver_license_expiry,
    address_line: request.address_line,
    city: request.city,
    province: request.province,
    postal_code: request.postal_code,
    is_active: true,
    created_at: now,
    updated_at: now,
  };
  customer.validate().map_err( |e| fail( &e, &request_id ) )?;

  let mut conn = state.pool.acquire().await
    .map_err( |e| fail( &map_db_err( e ), &request_id ) )?;
  customers::insert( &mut *conn, &customer ).await.map_err( |e| fail( &e, &request_id ) )?;

  Ok( success( StatusCode::CREATED, &request_id, customer ) )
}

/// GET /v1/customers
pub async fn list_customers(
  State( state ): State< AppState >,
  Extension( request_id ): Extension< RequestId >,
  _user: AuthenticatedUser,
  Query( page ): Query< PageQuery >,
) -> ApiResult
{
  let mut conn = state.pool.acquire().await
    .map_err( |e| fail( &map_db_err( e ), &request_id ) )?;
  let customers = customers::list( &mut *conn, page.limit, page.cursor )
    .await
    .map_err( |e| fail( &e, &request_id ) )?;

  Ok( success( StatusCode::OK, &request_id, customers ) )
}

/// GET /v1/customers/{id}
pub async fn get_customer(
  State( state ): State< AppState >,
  Extension( request_id ): Extension< RequestId >,
  _user: AuthenticatedUser,
  Path( id ): Path< Uuid >,
) -> ApiResult
{
  let mut conn = state.pool.acquire().await
    .map_err( |e| fail( &map_db_err( e ), &request_id ) )?;
  let customer = customers::find_by_id( &mut *conn, id ).await
    .map_err( |e| fail( &e, &request_id ) )?;

  Ok( success( StatusCode::OK, &request_id, customer ) )
}
