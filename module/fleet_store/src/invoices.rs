//! Invoice, payment, and payment-method storage.

use sqlx::{ PgConnection, Row };
use uuid::Uuid;

use crate::error::map_db_err;
use fleet_types::pagination::{ clamp_limit, CursorPage };
use fleet_types::{ FleetError, Invoice, InvoiceStatus, Payment, PaymentMethod, PaymentStatus, Result };

const INVOICE_COLUMNS: &str =
  "id, invoice_number, customer_id, rental_id, status, subtotal, tax, paid, \
   issue_date, due_date, paid_date, version, created_at, updated_at";

fn invoice_from_row( row: &sqlx::postgres::PgRow ) -> Result< Invoice >
{
  Ok( Invoice
  {
    id: row.get( "id" ),
    invoice_number: row.get( "invoice_number" ),
    customer_id: row.get( "customer_id" ),
    rental_id: row.get( "rental_id" ),
    status: InvoiceStatus::parse( row.get( "status" ) )?,
    subtotal: row.get( "subtotal" ),
    tax: row.get( "tax" ),
    paid: row.get( "paid" ),
    issue_date: row.get( "issue_date" ),
    due_date: row.get( "due_date" ),
    paid_date: row.get( "paid_date" ),
    version: row.get( "version" ),
    created_at: row.get( "created_at" ),
    updated_at: row.get( "updated_at" ),
  } )
}

/// Insert a new invoice.
pub async fn insert( conn: &mut PgConnection, invoice: &Invoice ) -> Result< () >
{
  sqlx::query(
    "INSERT INTO invoices
       (id, invoice_number, customer_id, rental_id, status, subtotal, tax, paid,
        issue_date, due_date)
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
  )
  .bind( invoice.id )
  .bind( &invoice.invoice_number )
  .bind( invoice.customer_id )
  .bind( invoice.rental_id )
  .bind( invoice.status.as_str() )
  .bind( invoice.subtotal )
  .bind( invoice.tax )
  .bind( invoice.paid )
  .bind( invoice.issue_date )
  .bind( invoice.due_date )
  .execute( conn )
  .await
  .map_err( map_db_err )?;
  Ok( () )
}

/// Fetch one invoice.
///
/// # Errors
///
/// `NOT_FOUND` when the id does not exist.
pub async fn find_by_id( conn: &mut PgConnection, id: Uuid ) -> Result< Invoice >
{
  let query = format!( "SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1" );
  let row = sqlx::query( &query )
    .bind( id )
    .fetch_optional( conn )
    .await
    .map_err( map_db_err )?
    .ok_or_else( || FleetError::NotFound( format!( "invoice {id}" ) ) )?;
  invoice_from_row( &row )
}

/// Lock one invoice row for the rest of the transaction.
pub async fn find_by_id_for_update( conn: &mut PgConnection, id: Uuid ) -> Result< Invoice >
{
  let query = format!( "SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1 FOR UPDATE" );
  let row = sqlx::query( &query )
    .bind( id )
    .fetch_optional( conn )
    .await
    .map_err( map_db_err )?
    .ok_or_else( || FleetError::NotFound( format!( "invoice {id}" ) ) )?;
  invoice_from_row( &row )
}

/// Persist payment application under optimistic locking.
///
/// # Errors
///
/// `OPTIMISTIC_LOCK_FAILURE` when the expected version is stale.
pub async fn update_locked(
  conn: &mut PgConnection,
  invoice: &Invoice,
  expected_version: i64,
) -> Result< () >
{
  let result = sqlx::query(
    "UPDATE invoices
        SET status = $1, paid = $2, paid_date = $3
      WHERE id = $4 AND version = $5",
  )
  .bind( invoice.status.as_str() )
  .bind( invoice.paid )
  .bind( invoice.paid_date )
  .bind( invoice.id )
  .bind( expected_version )
  .execute( conn )
  .await
  .map_err( map_db_err )?;

  if result.rows_affected() == 0
  {
    return Err( FleetError::OptimisticLock( format!(
      "invoice {} was modified concurrently (expected version {expected_version})", invoice.id
    ) ) );
  }
  Ok( () )
}

/// Every non-draft invoice, for reconciliation.
pub async fn list_non_draft( conn: &mut PgConnection ) -> Result< Vec< Invoice > >
{
  let query = format!( "SELECT {INVOICE_COLUMNS} FROM invoices WHERE status <> 'DRAFT' ORDER BY id" );
  let rows = sqlx::query( &query )
    .fetch_all( conn )
    .await
    .map_err( map_db_err )?;
  rows.iter().map( invoice_from_row ).collect()
}

/// Cursor-paged invoice listing.
pub async fn list(
  conn: &mut PgConnection,
  limit: Option< i64 >,
  cursor: Option< Uuid >,
) -> Result< CursorPage< Invoice > >
{
  let limit = clamp_limit( limit );

  let total: i64 = sqlx::query_scalar( "SELECT COUNT(*) FROM invoices" )
    .fetch_one( &mut *conn )
    .await
    .map_err( map_db_err )?;

  let query = format!(
    "SELECT {INVOICE_COLUMNS} FROM invoices
     WHERE ($1::uuid IS NULL OR id > $1)
     ORDER BY id
     LIMIT $2"
  );
  let rows = sqlx::query( &query )
    .bind( cursor )
    .bind( limit )
    .fetch_all( conn )
    .await
    .map_err( map_db_err )?;

  let items = rows.iter().map( invoice_from_row ).collect::< Result< Vec< _ > > >()?;
  Ok( CursorPage::new( items, limit, total, |i| i.id ) )
}

/// Insert a captured payment row.
pub async fn insert_payment( conn: &mut PgConnection, payment: &Payment ) -> Result< () >
{
  sqlx::query(
    "INSERT INTO payments
       (id, payment_number, customer_id, invoice_id, amount, method, status,
        payment_date, transaction_reference, notes)
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
  )
  .bind( payment.id )
  .bind( &payment.payment_number )
  .bind( payment.customer_id )
  .bind( payment.invoice_id )
  .bind( payment.amount )
  .bind( &payment.method )
  .bind( payment.status.as_str() )
  .bind( payment.payment_date )
  .bind( &payment.transaction_reference )
  .bind( &payment.notes )
  .execute( conn )
  .await
  .map_err( map_db_err )?;
  Ok( () )
}

/// Payments captured against one invoice.
pub async fn payments_for_invoice( conn: &mut PgConnection, invoice_id: Uuid ) -> Result< Vec< Payment > >
{
  let rows = sqlx::query(
    "SELECT id, payment_number, customer_id, invoice_id, amount, method, status,
            payment_date, transaction_reference, notes, created_at
       FROM payments WHERE invoice_id = $1 ORDER BY created_at",
  )
  .bind( invoice_id )
  .fetch_all( conn )
  .await
  .map_err( map_db_err )?;

  rows
    .iter()
    .map( |row| Ok( Payment
    {
      id: row.get( "id" ),
      payment_number: row.get( "payment_number" ),
      customer_id: row.get( "customer_id" ),
      invoice_id: row.get( "invoice_id" ),
      amount: row.get( "amount" ),
      method: row.get( "method" ),
      status: PaymentStatus::parse( row.get( "status" ) )?,
      payment_date: row.get( "payment_date" ),
      transaction_reference: row.get( "transaction_reference" ),
      notes: row.get( "notes" ),
      created_at: row.get( "created_at" ),
    } ) )
    .collect()
}

/// Payment-method configuration; `None` for an unconfigured code.
pub async fn find_payment_method( conn: &mut PgConnection, code: &str ) -> Result< Option< PaymentMethod > >
{
  let row = sqlx::query(
    "SELECT code, display_name, target_account_code FROM payment_methods WHERE code = $1",
  )
  .bind( code )
  .fetch_optional( conn )
  .await
  .map_err( map_db_err )?;

  Ok( row.map( |row| PaymentMethod
  {
    code: row.get( "code" ),
    display_name: row.get( "display_name" ),
    target_account_code: row.get( "target_account_code" ),
  } ) )
}
