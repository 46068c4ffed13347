//! Invoice issuing, payment capture, and the reconciliation view over
//! the resulting ledger.

mod common;

use chrono::Utc;
use sqlx::PgPool;

use fleet_ledger::{ check_integrity, reconcile_invoices, revenue_report };
use fleet_ops::{ BillingEngine, RentalEngine };
use fleet_types::InvoiceStatus;

#[ sqlx::test( migrations = false ) ]
async fn capture_marks_paid_and_posts_once( pool: PgPool )
{
  common::prepare( &pool ).await;
  let customer = common::fixture_customer( &pool ).await;
  let billing = BillingEngine::new( pool.clone() );

  let invoice = billing.issue_invoice( customer.id, None, 2_500, 300, 30 ).await.unwrap();
  assert_eq!( invoice.status, InvoiceStatus::Issued );
  assert_eq!( invoice.total(), 2_800 );

  let outcome = billing
    .capture_payment( invoice.id, 2_800, "GCASH", Some( "gw-123".to_string() ), None )
    .await
    .unwrap();
  assert_eq!( outcome.invoice.status, InvoiceStatus::Paid );
  assert_eq!( outcome.invoice.balance(), 0 );
  assert!( outcome.payment.payment_number.starts_with( "PAY-" ) );

  let entries: i64 = sqlx::query_scalar(
    "SELECT COUNT(*) FROM ledger_entries WHERE external_reference = $1",
  )
  .bind( format!( "invoice-{}-payment-{}", invoice.id, outcome.payment.id ) )
  .fetch_one( &pool )
  .await
  .unwrap();
  assert_eq!( entries, 1 );

  // GCash captures debit the configured clearing account, not cash.
  let clearing_debits: i64 = sqlx::query_scalar(
    "SELECT COALESCE(SUM(l.debit), 0)::bigint
       FROM ledger_entry_lines l
       JOIN accounts a ON a.id = l.account_id
      WHERE a.code = '1200'",
  )
  .fetch_one( &pool )
  .await
  .unwrap();
  assert_eq!( clearing_debits, 2_800 );
}

#[ sqlx::test( migrations = false ) ]
async fn overpayment_and_double_full_payment_are_rejected( pool: PgPool )
{
  common::prepare( &pool ).await;
  let customer = common::fixture_customer( &pool ).await;
  let billing = BillingEngine::new( pool.clone() );

  let invoice = billing.issue_invoice( customer.id, None, 1_000, 0, 30 ).await.unwrap();

  assert_eq!(
    billing.capture_payment( invoice.id, 1_500, "CASH", None, None ).await.unwrap_err().code(),
    "VALIDATION_ERROR"
  );

  billing.capture_payment( invoice.id, 1_000, "CASH", None, None ).await.unwrap();
  assert_eq!(
    billing.capture_payment( invoice.id, 1_000, "CASH", None, None ).await.unwrap_err().code(),
    "INVALID_STATE"
  );
}

#[ sqlx::test( migrations = false ) ]
async fn partial_payments_accumulate( pool: PgPool )
{
  common::prepare( &pool ).await;
  let customer = common::fixture_customer( &pool ).await;
  let billing = BillingEngine::new( pool.clone() );

  let invoice = billing.issue_invoice( customer.id, None, 2_000, 0, 30 ).await.unwrap();

  let first = billing.capture_payment( invoice.id, 800, "CASH", None, None ).await.unwrap();
  assert_eq!( first.invoice.status, InvoiceStatus::Issued );
  assert_eq!( first.invoice.balance(), 1_200 );

  let second = billing.capture_payment( invoice.id, 1_200, "CASH", None, None ).await.unwrap();
  assert_eq!( second.invoice.status, InvoiceStatus::Paid );
  assert!( second.invoice.paid_date.is_some() );
}

#[ sqlx::test( migrations = false ) ]
async fn unknown_method_falls_back_to_cash( pool: PgPool )
{
  common::prepare( &pool ).await;
  let customer = common::fixture_customer( &pool ).await;
  let billing = BillingEngine::new( pool.clone() );

  let invoice = billing.issue_invoice( customer.id, None, 500, 0, 30 ).await.unwrap();
  let outcome = billing.capture_payment( invoice.id, 500, "BARTER", None, None ).await.unwrap();
  assert_eq!( outcome.payment.method, "BARTER" );

  let cash_debits: i64 = sqlx::query_scalar(
    "SELECT COALESCE(SUM(l.debit), 0)::bigint
       FROM ledger_entry_lines l
       JOIN accounts a ON a.id = l.account_id
      WHERE a.code = '1000'",
  )
  .fetch_one( &pool )
  .await
  .unwrap();
  assert_eq!( cash_debits, 500 );
}

#[ sqlx::test( migrations = false ) ]
async fn reconciliation_is_clean_after_consistent_flow( pool: PgPool )
{
  common::prepare( &pool ).await;
  let vehicle = common::fixture_vehicle( &pool, 700, 10_000 ).await;
  let customer = common::fixture_customer( &pool ).await;
  let billing = BillingEngine::new( pool.clone() );
  let rentals = RentalEngine::new( pool.clone() );

  // Rent 4 days at 700, invoice it, pay it.
  let ( start, end ) = common::june( 1, 5 );
  let rental = rentals.create_rental( vehicle.id, customer.id, start, end ).await.unwrap();
  rentals.activate_rental( rental.id, 10_000 ).await.unwrap();

  let invoice =
    billing.issue_invoice( customer.id, Some( rental.id ), rental.total_amount, 0, 30 ).await.unwrap();
  billing.capture_payment( invoice.id, 2_800, "GCASH", None, None ).await.unwrap();

  let mut conn = pool.acquire().await.unwrap();
  let report = reconcile_invoices( &mut *conn, Utc::now() ).await.unwrap();
  assert_eq!( report.invoices_checked, 1 );
  assert!( report.findings.is_empty(), "operational and ledger views agree" );

  let integrity = check_integrity( &mut *conn, Utc::now() ).await.unwrap();
  assert!( integrity.is_balanced );

  let revenue = revenue_report( &mut *conn, start, Utc::now() ).await.unwrap();
  assert_eq!( revenue.total_revenue, 2_800 );
}

#[ sqlx::test( migrations = false ) ]
async fn reconciliation_flags_manual_ledger_drift( pool: PgPool )
{
  common::prepare( &pool ).await;
  let customer = common::fixture_customer( &pool ).await;
  let billing = BillingEngine::new( pool.clone() );

  let invoice = billing.issue_invoice( customer.id, None, 1_000, 0, 30 ).await.unwrap();
  billing.capture_payment( invoice.id, 1_000, "CASH", None, None ).await.unwrap();

  // Simulate drift: operational paid figure changes without a posting.
  sqlx::query( "UPDATE invoices SET paid = 900 WHERE id = $1" )
    .bind( invoice.id )
    .execute( &pool )
    .await
    .unwrap();

  let mut conn = pool.acquire().await.unwrap();
  let report = reconcile_invoices( &mut *conn, Utc::now() ).await.unwrap();
  assert_eq!( report.findings.len(), 1 );
  let finding = &report.findings[ 0 ];
  assert_eq!( finding.code, "INVOICE_LEDGER_MISMATCH" );
  assert_eq!( finding.operational_value, 900 );
  assert_eq!( finding.ledger_value, 1_000 );
}
