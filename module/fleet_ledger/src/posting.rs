//! Idempotent balanced postings and the standard event entries.

use chrono::{ DateTime, Utc };
use sqlx::PgConnection;
use tracing::debug;
use uuid::Uuid;

use fleet_store::accounts::{ self, InsertOutcome };
use fleet_store::next_document_number;
use fleet_types::accounting::{ codes, validate_lines };
use fleet_types::{ Amount, LedgerEntry, LedgerLine, Result };

/// Post a balanced entry under `external_reference`.
///
/// Calling again with the same reference is a no-op that returns the
/// already-stored entry, whether the duplicate is detected pre-insert or
/// on the unique violation. Lines are validated (balanced, pure-sided,
/// non-negative) before any row is written.
///
/// Runs on whatever connection the caller provides; use-cases pass their
/// open transaction so the posting commits or rolls back with the rest
/// of the mutation.
pub async fn post(
  conn: &mut PgConnection,
  external_reference: &str,
  entry_date: DateTime< Utc >,
  description: &str,
  lines: Vec< LedgerLine >,
) -> Result< LedgerEntry >
{
  validate_lines( &lines )?;

  if let Some( existing ) = accounts::find_by_external_reference( conn, external_reference ).await?
  {
    debug!( external_reference, "posting already exists, returning stored entry" );
    return Ok( existing );
  }

  let entry_number = next_document_number( conn, "entry_number_seq", "JE" ).await?;
  let entry = LedgerEntry
  {
    id: Uuid::new_v4(),
    entry_number,
    external_reference: external_reference.to_string(),
    entry_date,
    description: description.to_string(),
    lines,
    created_at: entry_date,
  };

  match accounts::insert_entry( conn, &entry ).await?
  {
    InsertOutcome::Inserted => Ok( entry ),
    InsertOutcome::Duplicate =>
    {
      // A concurrent poster won the race between our pre-check and the
      // insert; the stored entry is the answer.
      let stored = accounts::find_by_external_reference( conn, external_reference )
        .await?
        .ok_or_else( || fleet_types::FleetError::Internal( format!(
          "entry {external_reference} vanished after duplicate detection"
        ) ) )?;
      Ok( stored )
    }
  }
}

/// Rental activation: Dr Accounts Receivable / Cr Rental Revenue for the
/// rental's total, under `rental-{id}-activation`.
pub async fn post_rental_activation(
  conn: &mut PgConnection,
  rental_id: Uuid,
  rental_number: &str,
  total_amount: Amount,
  now: DateTime< Utc >,
) -> Result< LedgerEntry >
{
  let receivable = accounts::find_by_code( conn, codes::ACCOUNTS_RECEIVABLE ).await?;
  let revenue = accounts::find_by_code( conn, codes::RENTAL_REVENUE ).await?;

  post(
    conn,
    &format!( "rental-{rental_id}-activation" ),
    now,
    &format!( "Activation of rental {rental_number}" ),
    vec![
      LedgerLine::debit( receivable.id, total_amount ),
      LedgerLine::credit( revenue.id, total_amount ),
    ],
  )
  .await
}

/// Payment capture: Dr the method's target asset account / Cr Accounts
/// Receivable, under `invoice-{invoiceId}-payment-{paymentId}`.
///
/// `target_account_code` comes from payment-method configuration; unknown
/// methods fall back to Cash upstream.
pub async fn post_payment_capture(
  conn: &mut PgConnection,
  invoice_id: Uuid,
  payment_id: Uuid,
  payment_number: &str,
  target_account_code: &str,
  amount: Amount,
  now: DateTime< Utc >,
) -> Result< LedgerEntry >
{
  let target = accounts::find_by_code( conn, target_account_code ).await?;
  let receivable = accounts::find_by_code( conn, codes::ACCOUNTS_RECEIVABLE ).await?;

  post(
    conn,
    &format!( "invoice-{invoice_id}-payment-{payment_id}" ),
    now,
    &format!( "Capture of payment {payment_number}" ),
    vec![
      LedgerLine::debit( target.id, amount ),
      LedgerLine::credit( receivable.id, amount ),
    ],
  )
  .await
}

/// Maintenance close: Dr Maintenance Expense / Cr Accounts Payable for
/// the job's total cost, under `maintenance-{id}-close`.
pub async fn post_maintenance_close(
  conn: &mut PgConnection,
  job_id: Uuid,
  job_number: &str,
  total_cost: Amount,
  now: DateTime< Utc >,
) -> Result< LedgerEntry >
{
  let expense = accounts::find_by_code( conn, codes::MAINTENANCE_EXPENSE ).await?;
  let payable = accounts::find_by_code( conn, codes::ACCOUNTS_PAYABLE ).await?;

  post(
    conn,
    &format!( "maintenance-{job_id}-close" ),
    now,
    &format!( "Closing costs of maintenance job {job_number}" ),
    vec![
      LedgerLine::debit( expense.id, total_cost ),
      LedgerLine::credit( payable.id, total_cost ),
    ],
  )
  .await
}
