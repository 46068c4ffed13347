//! Operational-vs-ledger consistency checks.

use chrono::{ DateTime, Utc };
use serde::Serialize;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::reports::{ balance_sheet, BalanceSheet };
use fleet_store::{ accounts, invoices };
use fleet_types::accounting::codes;
use fleet_types::{ Amount, Result };

/// One invoice whose ledger trail disagrees with its operational state.
#[ derive( Debug, Clone, Serialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct InvoiceFinding
{
  /// Mismatching invoice.
  pub invoice_id: Uuid,
  /// Its human-facing number.
  pub invoice_number: String,
  /// Stable finding code.
  pub code: &'static str,
  /// What the invoice row says was paid.
  pub operational_value: Amount,
  /// What the ledger says was paid against it.
  pub ledger_value: Amount,
}

/// Result of sweeping every non-draft invoice.
#[ derive( Debug, Clone, Serialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct InvoiceReconciliationReport
{
  /// Sweep instant.
  pub checked_at: DateTime< Utc >,
  /// Invoices examined.
  pub invoices_checked: usize,
  /// Mismatches found; empty means consistent.
  pub findings: Vec< InvoiceFinding >,
}

/// Compare each non-draft invoice's `paid` against the ledger: payments
/// credit Accounts Receivable under `invoice-{id}-payment-…`, so the
/// negated AR balance restricted to that reference prefix must equal the
/// operational figure.
pub async fn reconcile_invoices(
  conn: &mut PgConnection,
  now: DateTime< Utc >,
) -> Result< InvoiceReconciliationReport >
{
  let receivable = accounts::find_by_code( conn, codes::ACCOUNTS_RECEIVABLE ).await?;
  let all = invoices::list_non_draft( conn ).await?;

  let mut findings = Vec::new();
  for invoice in &all
  {
    let prefix = format!( "invoice-{}-payment-", invoice.id );
    let ledger_value =
      -accounts::balance_of_with_reference_prefix( conn, receivable.id, now, &prefix ).await?;

    if ledger_value != invoice.paid
    {
      findings.push( InvoiceFinding
      {
        invoice_id: invoice.id,
        invoice_number: invoice.invoice_number.clone(),
        code: "INVOICE_LEDGER_MISMATCH",
        operational_value: invoice.paid,
        ledger_value,
      } );
    }
  }

  Ok( InvoiceReconciliationReport
  {
    checked_at: now,
    invoices_checked: all.len(),
    findings,
  } )
}

/// Account-type totals and the accounting identity.
#[ derive( Debug, Clone, Serialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct IntegrityReport
{
  /// Check instant.
  pub as_of: DateTime< Utc >,
  /// Σ asset balances.
  pub total_assets: Amount,
  /// Σ liability balances.
  pub total_liabilities: Amount,
  /// Σ equity balances including current earnings.
  pub total_equity: Amount,
  /// `total_assets − total_liabilities == total_equity`.
  pub is_balanced: bool,
}

/// The integrity check is the balance sheet reduced to its identity.
pub async fn check_integrity( conn: &mut PgConnection, as_of: DateTime< Utc > ) -> Result< IntegrityReport >
{
  let BalanceSheet { total_assets, total_liabilities, total_equity, is_balanced, .. } =
    balance_sheet( conn, as_of ).await?;

  Ok( IntegrityReport { as_of, total_assets, total_liabilities, total_equity, is_balanced } )
}
