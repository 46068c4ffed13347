//! # `fleet_ledger`
//!
//! Double-entry accounting engine.
//!
//! Postings are balanced-or-rejected before they reach storage, and
//! idempotent by external reference: posting the same reference twice
//! yields the one existing entry. Balances, the revenue report, the
//! balance sheet, and the operational-vs-ledger reconciliation all read
//! through the same raw-balance queries so they cannot disagree with
//! each other.

pub mod posting;
pub mod reports;
pub mod reconciliation;

pub use posting::{ post, post_maintenance_close, post_payment_capture, post_rental_activation };
pub use reconciliation::
{
  check_integrity, reconcile_invoices, IntegrityReport, InvoiceFinding, InvoiceReconciliationReport,
};
pub use reports::{ balance_sheet, display_balance_of, revenue_report, AccountBalance, BalanceSheet, RevenueReport };
