//! Financial reports and reconciliation endpoints.

use axum::extract::{ Query, State };
use axum::http::StatusCode;
use axum::Extension;
use chrono::{ DateTime, Duration, Utc };
use serde::Deserialize;

use crate::envelope::{ fail, success, ApiResult };
use crate::jwt_auth::AuthenticatedUser;
use crate::request_id::RequestId;
use crate::state::AppState;
use fleet_ledger::{ balance_sheet, check_integrity, reconcile_invoices, revenue_report };
use fleet_store::map_db_err;
use fleet_types::Role;

const FINANCE_ROLES: &[ Role ] = &[ Role::FinanceOwner, Role::Admin ];

/// Revenue-report window; defaults to the last 30 days.
#[ derive( Debug, Deserialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct RevenueQuery
{
  /// Window start.
  pub start: Option< DateTime< Utc > >,
  /// Window end.
  pub end: Option< DateTime< Utc > >,
}

/// GET /v1/reports/revenue
pub async fn revenue(
  State( state ): State< AppState >,
  Extension( request_id ): Extension< RequestId >,
  user: AuthenticatedUser,
  Query( query ): Query< RevenueQuery >,
) -> ApiResult
{
  user.require_any( FINANCE_ROLES ).map_err( |e| fail( &e, &request_id ) )?;

  let end = query.end.unwrap_or_else( Utc::now );
  let start = query.start.unwrap_or( end - Duration::days( 30 ) );

  let mut conn = state.pool.acquire().await
    .map_err( |e| fail( &map_db_err( e ), &request_id ) )?;
  let report = revenue_report( &mut *conn, start, end ).await
    .map_err( |e| fail( &e, &request_id ) )?;

  Ok( success( StatusCode::OK, &request_id, report ) )
}

/// Balance-sheet instant; defaults to now.
#[ derive( Debug, Deserialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct BalanceSheetQuery
{
  /// Reporting instant.
  pub as_of: Option< DateTime< Utc > >,
}

/// GET /v1/reports/balance-sheet
pub async fn balance_sheet_report(
  State( state ): State< AppState >,
  Extension( request_id ): Extension< RequestId >,
  _user: AuthenticatedUser,
  Query( query ): Query< BalanceSheetQuery >,
) -> ApiResult
{
  let as_of = query.as_of.unwrap_or_else( Utc::now );

  let mut conn = state.pool.acquire().await
    .map_err( |e| fail( &map_db_err( e ), &request_id ) )?;
  let report = balance_sheet( &mut *conn, as_of ).await.map_err( |e| fail( &e, &request_id ) )?;

  Ok( success( StatusCode::OK, &request_id, report ) )
}

/// GET /v1/reconciliation/invoices
pub async fn reconciliation_invoices(
  State( state ): State< AppState >,
  Extension( request_id ): Extension< RequestId >,
  user: AuthenticatedUser,
) -> ApiResult
{
  user.require_any( FINANCE_ROLES ).map_err( |e| fail( &e, &request_id ) )?;

  let mut conn = state.pool.acquire().await
    .map_err( |e| fail( &map_db_err( e ), &request_id ) )?;
  let report = reconcile_invoices( &mut *conn, Utc::now() ).await
    .map_err( |e| fail( &e, &request_id ) )?;

  Ok( success( StatusCode::OK, &request_id, report ) )
}

/// GET /v1/reconciliation/integrity
pub async fn reconciliation_integrity(
  State( state ): State< AppState >,
  Extension( request_id ): Extension< RequestId >,
  user: AuthenticatedUser,
) -> ApiResult
{
  user.require_any( FINANCE_ROLES ).map_err( |e| fail( &e, &request_id ) )?;

  let mut conn = state.pool.acquire().await
    .map_err( |e| fail( &map_db_err( e ), &request_id ) )?;
  let report = check_integrity( &mut *conn, Utc::now() ).await
    .map_err( |e| fail( &e, &request_id ) )?;

  Ok( success( StatusCode::OK, &request_id, report ) )
}
