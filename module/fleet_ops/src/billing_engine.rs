//! Invoice issuing and idempotent payment capture.
//!
//! Capture is the ledger reflection of a gateway settlement: the gateway
//! integration itself lives outside this backend, but the payment row,
//! the invoice update, and the capture posting commit together here.

use chrono::{ DateTime, Duration, Utc };
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use fleet_store::{ customers, invoices, map_db_err, next_document_number, outbox, rentals };
use fleet_types::accounting::codes;
use fleet_types::pagination::CursorPage;
use fleet_types::
{
  Amount, FleetError, Invoice, InvoiceStatus, OutboxEvent, Payment, PaymentStatus, Result,
};

/// Billing use-case engine.
#[ derive( Debug, Clone ) ]
pub struct BillingEngine
{
  pool: PgPool,
}

/// Outcome of a payment capture: the refreshed invoice and the payment.
#[ derive( Debug, Clone ) ]
pub struct CaptureOutcome
{
  /// Invoice after the capture applied.
  pub invoice: Invoice,
  /// The payment row created.
  pub payment: Payment,
}

impl BillingEngine
{
  /// Create a new engine over the shared pool.
  #[ must_use ]
  pub fn new( pool: PgPool ) -> Self
  {
    Self { pool }
  }

  /// Issue an invoice to a customer, optionally billing a rental.
  pub async fn issue_invoice(
    &self,
    customer_id: Uuid,
    rental_id: Option< Uuid >,
    subtotal: Amount,
    tax: Amount,
    due_in_days: i64,
  ) -> Result< Invoice >
  {
    let now = Utc::now();
    let mut tx = self.pool.begin().await.map_err( map_db_err )?;

    customers::find_by_id( &mut *tx, customer_id ).await?;
    if let Some( rental_id ) = rental_id
    {
      rentals::find_by_id( &mut *tx, rental_id ).await?;
    }

    let invoice_number = next_document_number( &mut *tx, "invoice_number_seq", "INV" ).await?;
    let invoice = Invoice
    {
      id: Uuid::new_v4(),
      invoice_number,
      customer_id,
      rental_id,
      status: InvoiceStatus::Issued,
      subtotal,
      tax,
      paid: 0,
      issue_date: now,
      due_date: now + Duration::days( due_in_days.max( 0 ) ),
      paid_date: None,
      version: 1,
      created_at: now,
      updated_at: now,
    };
    invoice.validate()?;
    if invoice.total() <= 0
    {
      return Err( FleetError::validation( "invoice total must be positive" ) );
    }

    invoices::insert( &mut *tx, &invoice ).await?;
    outbox::append( &mut *tx, &invoice_event( &invoice, "invoice.issued", now ) ).await?;

    tx.commit().await.map_err( map_db_err )?;
    info!( invoice = %invoice.invoice_number, total = invoice.total(), "invoice issued" );
    Ok( invoice )
  }

  /// Capture a payment against an invoice.
  ///
  /// One transaction: payment row, invoice `paid`/status under optimistic
  /// locking, and the `invoice-{id}-payment-{paymentId}` posting debiting
  /// the method's configured asset account. Unknown method codes fall
  /// back to Cash; the code itself is stored verbatim on the payment.
  pub async fn capture_payment(
    &self,
    invoice_id: Uuid,
    amount: Amount,
    method: &str,
    transaction_reference: Option< String >,
    notes: Option< String >,
  ) -> Result< CaptureOutcome >
  {
    let now = Utc::now();
    let mut tx = self.pool.begin().await.map_err( map_db_err )?;

    let mut invoice = invoices::find_by_id_for_update( &mut *tx, invoice_id ).await?;
    let invoice_version = invoice.version;
    invoice.apply_payment( amount, now )?;

    let target_account_code = match invoices::find_payment_method( &mut *tx, method ).await?
    {
      Some( configured ) => configured.target_account_code,
      None => codes::CASH.to_string(),
    };

    let payment_number = next_document_number( &mut *tx, "payment_number_seq", "PAY" ).await?;
    let payment = Payment
    {
      id: Uuid::new_v4(),
      payment_number,
      customer_id: invoice.customer_id,
      invoice_id: Some( invoice.id ),
      amount,
      method: method.to_string(),
      status: PaymentStatus::Completed,
      payment_date: now,
      transaction_reference,
      notes,
      created_at: now,
    };

    invoices::insert_payment( &mut *tx, &payment ).await?;
    invoices::update_locked( &mut *tx, &invoice, invoice_version ).await?;

    fleet_ledger::post_payment_capture(
      &mut *tx,
      invoice.id,
      payment.id,
      &payment.payment_number,
      &target_account_code,
      amount,
      now,
    )
    .await?;

    outbox::append( &mut *tx, &invoice_event( &invoice, "invoice.payment_captured", now ) ).await?;

    tx.commit().await.map_err( map_db_err )?;
    info!(
      invoice = %invoice.invoice_number,
      payment = %payment.payment_number,
      amount,
      "payment captured"
    );

    // Re-read so the caller sees the trigger-bumped version.
    let mut conn = self.pool.acquire().await.map_err( map_db_err )?;
    let refreshed = invoices::find_by_id( &mut *conn, invoice.id ).await?;
    Ok( CaptureOutcome { invoice: refreshed, payment } )
  }

  /// Read one invoice.
  pub async fn get_invoice( &self, invoice_id: Uuid ) -> Result< Invoice >
  {
    let mut conn = self.pool.acquire().await.map_err( map_db_err )?;
    invoices::find_by_id( &mut *conn, invoice_id ).await
  }

  /// Cursor-paged invoice listing.
  pub async fn list_invoices(
    &self,
    limit: Option< i64 >,
    cursor: Option< Uuid >,
  ) -> Result< CursorPage< Invoice > >
  {
    let mut conn = self.pool.acquire().await.map_err( map_db_err )?;
    invoices::list( &mut *conn, limit, cursor ).await
  }
}

fn invoice_event( invoice: &Invoice, event_type: &str, now: DateTime< Utc > ) -> OutboxEvent
{
  OutboxEvent
  {
    id: Uuid::new_v4(),
    aggregate_type: "invoice".to_string(),
    aggregate_id: invoice.id,
    event_type: event_type.to_string(),
    payload: serde_json::json!( {
      "invoiceId": invoice.id,
      "invoiceNumber": invoice.invoice_number,
      "customerId": invoice.customer_id,
      "status": invoice.status.as_str(),
      "total": invoice.total(),
      "paid": invoice.paid,
    } ),
    created_at: now,
    published_at: None,
  }
}
