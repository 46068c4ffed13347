//! Balance queries and financial reports.
//!
//! Raw balances are `Σ debits − Σ credits`. Display flips the sign for
//! Liability, Equity, and Revenue accounts so a normal credit balance
//! presents as positive. The balance sheet folds current earnings
//! (revenue − expenses) into equity, which is what keeps
//! `assets = liabilities + equity` true without a period-close step.

use chrono::{ DateTime, Utc };
use serde::Serialize;
use sqlx::PgConnection;
use std::collections::HashMap;
use uuid::Uuid;

use fleet_store::accounts;
use fleet_types::{ Account, AccountType, Amount, Result };

/// One account's balance as presented to readers.
#[ derive( Debug, Clone, Serialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct AccountBalance
{
  /// Account code, e.g. `4000`.
  pub account_code: String,
  /// Account display name.
  pub account_name: String,
  /// Account classification.
  pub account_type: AccountType,
  /// Display-signed balance.
  pub balance: Amount,
}

/// Display-signed balance of one account as of an instant.
pub async fn display_balance_of(
  conn: &mut PgConnection,
  account: &Account,
  as_of: DateTime< Utc >,
) -> Result< Amount >
{
  let raw = accounts::balance_of( conn, account.id, as_of ).await?;
  Ok( if account.account_type.display_flips_sign() { -raw } else { raw } )
}

/// Revenue report over a window.
#[ derive( Debug, Clone, Serialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct RevenueReport
{
  /// Window start.
  pub start: DateTime< Utc >,
  /// Window end.
  pub end: DateTime< Utc >,
  /// Per-account signed revenue recognized inside the window.
  pub lines: Vec< AccountBalance >,
  /// Sum of all lines.
  pub total_revenue: Amount,
}

/// Revenue recognized in `[start, end]`: for every revenue account, the
/// signed balance as of `end` minus the signed balance as of just before
/// `start`, so adjacent windows add up to their union.
pub async fn revenue_report(
  conn: &mut PgConnection,
  start: DateTime< Utc >,
  end: DateTime< Utc >,
) -> Result< RevenueReport >
{
  let all = accounts::list_active( conn ).await?;
  let mut lines = Vec::new();
  let mut total_revenue: Amount = 0;

  for account in all.iter().filter( |a| a.account_type == AccountType::Revenue )
  {
    let until_end = accounts::balance_of( conn, account.id, end ).await?;
    let before_start =
      accounts::balance_of( conn, account.id, start - chrono::Duration::microseconds( 1 ) ).await?;
    let recognized = -( until_end - before_start );

    total_revenue += recognized;
    lines.push( AccountBalance
    {
      account_code: account.code.clone(),
      account_name: account.name.clone(),
      account_type: account.account_type,
      balance: recognized,
    } );
  }

  Ok( RevenueReport { start, end, lines, total_revenue } )
}

/// Grouped balance-sheet view.
#[ derive( Debug, Clone, Serialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct BalanceSheet
{
  /// Reporting instant.
  pub as_of: DateTime< Utc >,
  /// Asset accounts.
  pub assets: Vec< AccountBalance >,
  /// Liability accounts.
  pub liabilities: Vec< AccountBalance >,
  /// Equity accounts plus the derived current-earnings line.
  pub equity: Vec< AccountBalance >,
  /// Σ assets.
  pub total_assets: Amount,
  /// Σ liabilities.
  pub total_liabilities: Amount,
  /// Σ equity including current earnings.
  pub total_equity: Amount,
  /// `total_assets − total_liabilities == total_equity`.
  pub is_balanced: bool,
}

/// Balance sheet as of an instant.
pub async fn balance_sheet( conn: &mut PgConnection, as_of: DateTime< Utc > ) -> Result< BalanceSheet >
{
  let all = accounts::list_active( conn ).await?;
  let raw: HashMap< Uuid, i64 > =
    accounts::balances_as_of( conn, as_of ).await?.into_iter().collect();

  let mut assets = Vec::new();
  let mut liabilities = Vec::new();
  let mut equity = Vec::new();
  let ( mut total_assets, mut total_liabilities, mut total_equity ) = ( 0_i64, 0_i64, 0_i64 );
  let mut current_earnings = 0_i64;

  for account in &all
  {
    let raw_balance = raw.get( &account.id ).copied().unwrap_or( 0 );
    let display = if account.account_type.display_flips_sign() { -raw_balance } else { raw_balance };
    let line = AccountBalance
    {
      account_code: account.code.clone(),
      account_name: account.name.clone(),
      account_type: account.account_type,
      balance: display,
    };

    match account.account_type
    {
      AccountType::Asset =>
      {
        total_assets += display;
        assets.push( line );
      }
      AccountType::Liability =>
      {
        total_liabilities += display;
        liabilities.push( line );
      }
      AccountType::Equity =>
      {
        total_equity += display;
        equity.push( line );
      }
      // Revenue displays positive, expense raw-positive; the net rolls
      // into equity as current earnings.
      AccountType::Revenue => current_earnings += display,
      AccountType::Expense => current_earnings -= display,
    }
  }

  total_equity += current_earnings;
  equity.push( AccountBalance
  {
    account_code: "9999".to_string(),
    account_name: "Current Earnings".to_string(),
    account_type: AccountType::Equity,
    balance: current_earnings,
  } );

  Ok( BalanceSheet
  {
    as_of,
    assets,
    liabilities,
    equity,
    total_assets,
    total_liabilities,
    total_equity,
    is_balanced: total_assets - total_liabilities == total_equity,
  } )
}
