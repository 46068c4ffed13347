//! Invoicing, payment capture, and account balances.
//!
//! The pay route sits behind the idempotency middleware: a retried
//! `Idempotency-Key` replays the stored response byte-for-byte and the
//! handler never runs twice for one key.

use axum::extract::{ Path, Query, State };
use axum::http::StatusCode;
use axum::{ Extension, Json };
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::envelope::{ fail, success, ApiResult };
use crate::jwt_auth::AuthenticatedUser;
use crate::request_id::RequestId;
use crate::state::AppState;
use super::PageQuery;
use fleet_ledger::display_balance_of;
use fleet_store::{ accounts, map_db_err };
use fleet_types::{ FieldViolation, FleetError, Role };

const FINANCE_ROLES: &[ Role ] = &[ Role::FinanceOwner, Role::Admin ];

/// Issue-invoice request body.
#[ derive( Debug, Deserialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct IssueInvoiceRequest
{
  /// Billed customer.
  pub customer_id: Uuid,
  /// Source rental, if billing one.
  pub rental_id: Option< Uuid >,
  /// Pre-tax amount, whole pesos.
  pub subtotal: i64,
  /// Tax amount, whole pesos.
  #[ serde( default ) ]
  pub tax: i64,
  /// Days until due, default 30.
  pub due_in_days: Option< i64 >,
}

/// POST /v1/accounting/invoices
pub async fn issue_invoice(
  State( state ): State< AppState >,
  Extension( request_id ): Extension< RequestId >,
  user: AuthenticatedUser,
  Json( request ): Json< IssueInvoiceRequest >,
) -> ApiResult
{
  user.require_any( FINANCE_ROLES ).map_err( |e| fail( &e, &request_id ) )?;

  let invoice = state
    .billing
    .issue_invoice(
      request.customer_id,
      request.rental_id,
      request.subtotal,
      request.tax,
      request.due_in_days.unwrap_or( 30 ),
    )
    .await
    .map_err( |e| fail( &e, &request_id ) )?;

  Ok( success( StatusCode::CREATED, &request_id, invoice ) )
}

/// GET /v1/accounting/invoices
pub async fn list_invoices(
  State( state ): State< AppState >,
  Extension( request_id ): Extension< RequestId >,
  user: AuthenticatedUser,
  Query( page ): Query< PageQuery >,
) -> ApiResult
{
  user.require_any( FINANCE_ROLES ).map_err( |e| fail( &e, &request_id ) )?;

  let invoices = state
    .billing
    .list_invoices( page.limit, page.cursor )
    .await
    .map_err( |e| fail( &e, &request_id ) )?;

  Ok( success( StatusCode::OK, &request_id, invoices ) )
}

/// GET /v1/accounting/invoices/{id}
pub async fn get_invoice(
  State( state ): State< AppState >,
  Extension( request_id ): Extension< RequestId >,
  user: AuthenticatedUser,
  Path( id ): Path< Uuid >,
) -> ApiResult
{
  user.require_any( FINANCE_ROLES ).map_err( |e| fail( &e, &request_id ) )?;

  let invoice = state.billing.get_invoice( id ).await.map_err( |e| fail( &e, &request_id ) )?;
  Ok( success( StatusCode::OK, &request_id, invoice ) )
}

/// Pay-invoice request body.
#[ derive( Debug, Deserialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct PayInvoiceRequest
{
  /// Amount to capture, positive, whole pesos.
  pub amount: i64,
  /// Method code, e.g. `GCASH`.
  pub payment_method: String,
  /// Gateway reference.
  pub transaction_reference: Option< String >,
  /// Free-form notes.
  pub notes: Option< String >,
}

impl PayInvoiceRequest
{
  fn validate( &self ) -> Result< (), FleetError >
  {
    let mut details = Vec::new();
    if self.amount <= 0
    {
      details.push( FieldViolation::new( "amount", "must_be_positive" ) );
    }
    if self.payment_method.trim().is_empty()
    {
      details.push( FieldViolation::new( "paymentMethod", "required" ) );
    }
    if details.is_empty()
    {
      Ok( () )
    }
    else
    {
      Err( FleetError::validation_fields( "payment failed validation", details ) )
    }
  }
}

/// POST /v1/accounting/invoices/{id}/pay — behind the idempotency layer.
pub async fn pay_invoice(
  State( state ): State< AppState >,
  Extension( request_id ): Extension< RequestId >,
  user: AuthenticatedUser,
  Path( id ): Path< Uuid >,
  Json( request ): Json< PayInvoiceRequest >,
) -> ApiResult
{
  user.require_any( FINANCE_ROLES ).map_err( |e| fail( &e, &request_id ) )?;
  request.validate().map_err( |e| fail( &e, &request_id ) )?;

  let outcome = state
    .billing
    .capture_payment(
      id,
      request.amount,
      &request.payment_method,
      request.transaction_reference,
      request.notes,
    )
    .await
    .map_err( |e| fail( &e, &request_id ) )?;

  Ok( success(
    StatusCode::OK,
    &request_id,
    json!( {
      "invoice": outcome.invoice,
      "payment": outcome.payment,
    } ),
  ) )
}

/// GET /v1/accounting/accounts/{code}/balance?asOf=…
#[ derive( Debug, Deserialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct BalanceQuery
{
  /// Balance instant; defaults to now.
  pub as_of: Option< chrono::DateTime< Utc > >,
}

/// GET /v1/accounting/accounts/{code}/balance
pub async fn account_balance(
  State( state ): State< AppState >,
  Extension( request_id ): Extension< RequestId >,
  _user: AuthenticatedUser,
  Path( code ): Path< String >,
  Query( query ): Query< BalanceQuery >,
) -> ApiResult
{
  let as_of = query.as_of.unwrap_or_else( Utc::now );

  let mut conn = state.pool.acquire().await
    .map_err( |e| fail( &map_db_err( e ), &request_id ) )?;
  let account = accounts::find_by_code( &mut *conn, &code ).await
    .map_err( |e| fail( &e, &request_id ) )?;
  let balance = display_balance_of( &mut *conn, &account, as_of ).await
    .map_err( |e| fail( &e, &request_id ) )?;

  Ok( success(
    StatusCode::OK,
    &request_id,
    json!( {
      "accountCode": account.code,
      "accountName": account.name,
      "accountType": account.account_type,
      "asOf": as_of,
      "balance": balance,
    } ),
  ) )
}
