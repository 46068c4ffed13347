//! Invoices, payments, and payment-method configuration.
//!
//! `total` and `balance` are derived; a payment capture is the only way an
//! invoice accumulates `paid`.

use chrono::{ DateTime, Utc };
use serde::{ Deserialize, Serialize };
use uuid::Uuid;

use crate::error::{ FleetError, Result };
use crate::Amount;

/// Invoice lifecycle status.
#[ derive( Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize ) ]
#[ serde( rename_all = "SCREAMING_SNAKE_CASE" ) ]
pub enum InvoiceStatus
{
  /// Not yet issued; mutable.
  Draft,
  /// Sent to the customer; awaiting payment.
  Issued,
  /// Fully paid. Terminal.
  Paid,
  /// Past its due date with a balance.
  Overdue,
  /// Withdrawn. Terminal.
  Cancelled,
}

impl InvoiceStatus
{
  /// Database / wire representation.
  pub fn as_str( self ) -> &'static str
  {
    match self
    {
      Self::Draft => "DRAFT",
      Self::Issued => "ISSUED",
      Self::Paid => "PAID",
      Self::Overdue => "OVERDUE",
      Self::Cancelled => "CANCELLED",
    }
  }

  /// Parse the database representation.
  pub fn parse( s: &str ) -> Result< Self >
  {
    match s
    {
      "DRAFT" => Ok( Self::Draft ),
      "ISSUED" => Ok( Self::Issued ),
      "PAID" => Ok( Self::Paid ),
      "OVERDUE" => Ok( Self::Overdue ),
      "CANCELLED" => Ok( Self::Cancelled ),
      other => Err( FleetError::Internal( format!( "unknown invoice status '{other}'" ) ) ),
    }
  }
}

/// Payment lifecycle status.
#[ derive( Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize ) ]
#[ serde( rename_all = "SCREAMING_SNAKE_CASE" ) ]
pub enum PaymentStatus
{
  /// Initiated, not yet settled.
  Pending,
  /// Captured.
  Completed,
  /// Gateway declined.
  Failed,
  /// Returned to the customer.
  Refunded,
}

impl PaymentStatus
{
  /// Database / wire representation.
  pub fn as_str( self ) -> &'static str
  {
    match self
    {
      Self::Pending => "PENDING",
      Self::Completed => "COMPLETED",
      Self::Failed => "FAILED",
      Self::Refunded => "REFUNDED",
    }
  }

  /// Parse the database representation.
  pub fn parse( s: &str ) -> Result< Self >
  {
    match s
    {
      "PENDING" => Ok( Self::Pending ),
      "COMPLETED" => Ok( Self::Completed ),
      "FAILED" => Ok( Self::Failed ),
      "REFUNDED" => Ok( Self::Refunded ),
      other => Err( FleetError::Internal( format!( "unknown payment status '{other}'" ) ) ),
    }
  }
}

/// A customer invoice, optionally tied to a rental.
#[ derive( Debug, Clone, Serialize, Deserialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct Invoice
{
  /// Stable identifier.
  pub id: Uuid,
  /// Human-facing number, unique, `INV-...`.
  pub invoice_number: String,
  /// Billed customer.
  pub customer_id: Uuid,
  /// Source rental, if the invoice bills one.
  pub rental_id: Option< Uuid >,
  /// Lifecycle status.
  pub status: InvoiceStatus,
  /// Pre-tax amount, whole pesos.
  pub subtotal: Amount,
  /// Tax amount, whole pesos.
  pub tax: Amount,
  /// Captured so far, whole pesos.
  pub paid: Amount,
  /// Issue date.
  pub issue_date: DateTime< Utc >,
  /// Due date, never before issue.
  pub due_date: DateTime< Utc >,
  /// Instant the balance reached zero.
  pub paid_date: Option< DateTime< Utc > >,
  /// Optimistic-locking version.
  pub version: i64,
  /// Creation instant.
  pub created_at: DateTime< Utc >,
  /// Last update instant.
  pub updated_at: DateTime< Utc >,
}

impl Invoice
{
  /// Derived grand total: subtotal + tax.
  pub fn total( &self ) -> Amount
  {
    self.subtotal + self.tax
  }

  /// Derived outstanding balance: total − paid.
  pub fn balance( &self ) -> Amount
  {
    self.total() - self.paid
  }

  /// Validate construction-time invariants.
  pub fn validate( &self ) -> Result< () >
  {
    let mut details = Vec::new();
    if self.subtotal < 0
    {
      details.push( crate::FieldViolation::new( "subtotal", "negative" ) );
    }
    if self.tax < 0
    {
      details.push( crate::FieldViolation::new( "tax", "negative" ) );
    }
    if self.due_date < self.issue_date
    {
      details.push( crate::FieldViolation::new( "dueDate", "before_issue_date" ) );
    }
    if details.is_empty()
    {
      Ok( () )
    }
    else
    {
      Err( FleetError::validation_fields( "invoice failed validation", details ) )
    }
  }

  /// Record a captured payment against the invoice.
  ///
  /// Flips the status to PAID the moment the balance reaches zero.
  ///
  /// # Errors
  ///
  /// `INVALID_STATE` for draft/cancelled invoices; `VALIDATION_ERROR` for
  /// non-positive amounts or overpayment.
  pub fn apply_payment( &mut self, amount: Amount, now: DateTime< Utc > ) -> Result< () >
  {
    match self.status
    {
      InvoiceStatus::Issued | InvoiceStatus::Overdue => {}
      current =>
      {
        return Err( FleetError::InvalidState( format!(
          "cannot pay invoice {} in {} status", self.id, current.as_str()
        ) ) );
      }
    }
    if amount <= 0
    {
      return Err( FleetError::validation( "payment amount must be positive" ) );
    }
    if amount > self.balance()
    {
      return Err( FleetError::validation( format!(
        "payment {amount} exceeds outstanding balance {}", self.balance()
      ) ) );
    }

    self.paid += amount;
    self.updated_at = now;
    if self.balance() == 0
    {
      self.status = InvoiceStatus::Paid;
      self.paid_date = Some( now );
    }
    Ok( () )
  }
}

/// A payment captured against an invoice (or on account).
#[ derive( Debug, Clone, Serialize, Deserialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct Payment
{
  /// Stable identifier.
  pub id: Uuid,
  /// Human-facing number, unique, `PAY-...`.
  pub payment_number: String,
  /// Paying customer.
  pub customer_id: Uuid,
  /// Settled invoice, if any.
  pub invoice_id: Option< Uuid >,
  /// Captured amount, positive, whole pesos.
  pub amount: Amount,
  /// Free-form method code, e.g. `GCASH`.
  pub method: String,
  /// Lifecycle status.
  pub status: PaymentStatus,
  /// Capture date.
  pub payment_date: DateTime< Utc >,
  /// Gateway reference, if any.
  pub transaction_reference: Option< String >,
  /// Free-form notes.
  pub notes: Option< String >,
  /// Creation instant.
  pub created_at: DateTime< Utc >,
}

/// Configuration row mapping a payment-method code to the asset account
/// debited on capture.
#[ derive( Debug, Clone, Serialize, Deserialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct PaymentMethod
{
  /// Method code, unique, e.g. `GCASH`.
  pub code: String,
  /// Human-facing name.
  pub display_name: String,
  /// Asset account debited on capture.
  pub target_account_code: String,
}

#[ cfg( test ) ]
mod tests
{
  use super::*;
  use chrono::Duration;

  fn invoice() -> Invoice
  {
    let now = Utc::now();
    Invoice
    {
      id: Uuid::new_v4(),
      invoice_number: "INV-000001".to_string(),
      customer_id: Uuid::new_v4(),
      rental_id: None,
      status: InvoiceStatus::Issued,
      subtotal: 2_500,
      tax: 300,
      paid: 0,
      issue_date: now,
      due_date: now + Duration::days( 30 ),
      paid_date: None,
      version: 1,
      created_at: now,
      updated_at: now,
    }
  }

  #[ test ]
  fn totals_are_derived()
  {
    let inv = invoice();
    assert_eq!( inv.total(), 2_800 );
    assert_eq!( inv.balance(), 2_800 );
  }

  #[ test ]
  fn full_payment_marks_paid()
  {
    let mut inv = invoice();
    inv.apply_payment( 2_800, Utc::now() ).unwrap();
    assert_eq!( inv.status, InvoiceStatus::Paid );
    assert_eq!( inv.balance(), 0 );
    assert!( inv.paid_date.is_some() );
  }

  #[ test ]
  fn partial_payment_keeps_issued()
  {
    let mut inv = invoice();
    inv.apply_payment( 1_000, Utc::now() ).unwrap();
    assert_eq!( inv.status, InvoiceStatus::Issued );
    assert_eq!( inv.balance(), 1_800 );
  }

  #[ test ]
  fn overpayment_is_rejected()
  {
    let mut inv = invoice();
    assert_eq!( inv.apply_payment( 3_000, Utc::now() ).unwrap_err().code(), "VALIDATION_ERROR" );
  }

  #[ test ]
  fn draft_invoice_cannot_take_payment()
  {
    let mut inv = invoice();
    inv.status = InvoiceStatus::Draft;
    assert_eq!( inv.apply_payment( 100, Utc::now() ).unwrap_err().code(), "INVALID_STATE" );
  }
}
