//! Chart of accounts and journal entries.
//!
//! Every entry must balance (Σ debits = Σ credits) and every line is
//! pure-debit or pure-credit. The storage layer re-checks balance with a
//! deferred trigger at commit; this module rejects unbalanced entries
//! before they reach storage at all.

use chrono::{ DateTime, Utc };
use serde::{ Deserialize, Serialize };
use uuid::Uuid;

use crate::error::{ FleetError, Result };
use crate::Amount;

/// Canonical account codes participating in core postings.
pub mod codes
{
  /// 1000 Cash on hand.
  pub const CASH: &str = "1000";
  /// 1100 Accounts Receivable.
  pub const ACCOUNTS_RECEIVABLE: &str = "1100";
  /// 1200 GCash clearing account.
  pub const GCASH_CLEARING: &str = "1200";
  /// 1500 Fleet vehicles at cost.
  pub const FLEET_VEHICLES: &str = "1500";
  /// 2000 Accounts Payable.
  pub const ACCOUNTS_PAYABLE: &str = "2000";
  /// 3000 Owner equity.
  pub const OWNER_EQUITY: &str = "3000";
  /// 4000 Rental revenue.
  pub const RENTAL_REVENUE: &str = "4000";
  /// 4100 Late fee revenue.
  pub const LATE_FEE_REVENUE: &str = "4100";
  /// 5000 Maintenance expense.
  pub const MAINTENANCE_EXPENSE: &str = "5000";
  /// 5100 Fuel expense.
  pub const FUEL_EXPENSE: &str = "5100";
}

/// The five account classifications.
#[ derive( Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize ) ]
#[ serde( rename_all = "SCREAMING_SNAKE_CASE" ) ]
pub enum AccountType
{
  /// Resources owned.
  Asset,
  /// Obligations owed.
  Liability,
  /// Residual interest.
  Equity,
  /// Income earned.
  Revenue,
  /// Costs incurred.
  Expense,
}

impl AccountType
{
  /// Database / wire representation.
  pub fn as_str( self ) -> &'static str
  {
    match self
    {
      Self::Asset => "ASSET",
      Self::Liability => "LIABILITY",
      Self::Equity => "EQUITY",
      Self::Revenue => "REVENUE",
      Self::Expense => "EXPENSE",
    }
  }

  /// Parse the database representation.
  pub fn parse( s: &str ) -> Result< Self >
  {
    match s
    {
      "ASSET" => Ok( Self::Asset ),
      "LIABILITY" => Ok( Self::Liability ),
      "EQUITY" => Ok( Self::Equity ),
      "REVENUE" => Ok( Self::Revenue ),
      "EXPENSE" => Ok( Self::Expense ),
      other => Err( FleetError::Internal( format!( "unknown account type '{other}'" ) ) ),
    }
  }

  /// Whether display flips the raw `debits − credits` sign so a normal
  /// credit balance presents as positive.
  pub fn display_flips_sign( self ) -> bool
  {
    matches!( self, Self::Liability | Self::Equity | Self::Revenue )
  }
}

/// One account in the chart.
#[ derive( Debug, Clone, Serialize, Deserialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct Account
{
  /// Stable identifier.
  pub id: Uuid,
  /// Numeric-looking code, unique, e.g. `1100`.
  pub code: String,
  /// Display name.
  pub name: String,
  /// Classification.
  pub account_type: AccountType,
  /// Parent account for hierarchy, if any.
  pub parent_id: Option< Uuid >,
  /// Whether the account accepts postings.
  pub is_active: bool,
  /// Free-form description.
  pub description: String,
  /// Creation instant.
  pub created_at: DateTime< Utc >,
  /// Last update instant.
  pub updated_at: DateTime< Utc >,
}

/// One debit-or-credit line of a journal entry.
#[ derive( Debug, Clone, PartialEq, Eq, Serialize, Deserialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct LedgerLine
{
  /// Posted account.
  pub account_id: Uuid,
  /// Debit amount, non-negative; zero when the line is a credit.
  pub debit: Amount,
  /// Credit amount, non-negative; zero when the line is a debit.
  pub credit: Amount,
  /// Optional line memo.
  pub memo: Option< String >,
}

impl LedgerLine
{
  /// Pure-debit line.
  pub fn debit( account_id: Uuid, amount: Amount ) -> Self
  {
    Self { account_id, debit: amount, credit: 0, memo: None }
  }

  /// Pure-credit line.
  pub fn credit( account_id: Uuid, amount: Amount ) -> Self
  {
    Self { account_id, debit: 0, credit: amount, memo: None }
  }
}

/// A balanced journal entry.
#[ derive( Debug, Clone, Serialize, Deserialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct LedgerEntry
{
  /// Stable identifier.
  pub id: Uuid,
  /// Human-facing number, unique, `JE-...`.
  pub entry_number: String,
  /// Caller-chosen idempotency anchor, unique.
  pub external_reference: String,
  /// Accounting date of the entry.
  pub entry_date: DateTime< Utc >,
  /// What the entry records.
  pub description: String,
  /// Debit/credit lines; balanced, at least two.
  pub lines: Vec< LedgerLine >,
  /// Creation instant.
  pub created_at: DateTime< Utc >,
}

/// Validate a prospective set of lines: balanced, pure-sided, non-negative,
/// at least two lines.
///
/// # Errors
///
/// `VALIDATION_ERROR` describing the first violated rule.
pub fn validate_lines( lines: &[ LedgerLine ] ) -> Result< () >
{
  if lines.len() < 2
  {
    return Err( FleetError::validation( "a journal entry needs at least two lines" ) );
  }

  let mut debits: Amount = 0;
  let mut credits: Amount = 0;

  for ( index, line ) in lines.iter().enumerate()
  {
    if line.debit < 0 || line.credit < 0
    {
      return Err( FleetError::validation( format!( "line {index} has a negative amount" ) ) );
    }
    let is_debit = line.debit > 0;
    let is_credit = line.credit > 0;
    if is_debit == is_credit
    {
      return Err( FleetError::validation( format!(
        "line {index} must be pure-debit or pure-credit"
      ) ) );
    }
    debits += line.debit;
    credits += line.credit;
  }

  if debits != credits
  {
    return Err( FleetError::validation( format!(
      "entry does not balance: debits {debits} vs credits {credits}"
    ) ) );
  }

  Ok( () )
}

#[ cfg( test ) ]
mod tests
{
  use super::*;

  #[ test ]
  fn balanced_pair_passes()
  {
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    validate_lines( &[ LedgerLine::debit( a, 2_000 ), LedgerLine::credit( b, 2_000 ) ] ).unwrap();
  }

  #[ test ]
  fn unbalanced_entry_is_rejected()
  {
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let err =
      validate_lines( &[ LedgerLine::debit( a, 500 ), LedgerLine::credit( b, 400 ) ] ).unwrap_err();
    assert_eq!( err.code(), "VALIDATION_ERROR" );
  }

  #[ test ]
  fn mixed_side_line_is_rejected()
  {
    let a = Uuid::new_v4();
    let line = LedgerLine { account_id: a, debit: 100, credit: 100, memo: None };
    let other = LedgerLine::credit( Uuid::new_v4(), 100 );
    assert!( validate_lines( &[ line, other ] ).is_err() );
  }

  #[ test ]
  fn zero_line_is_rejected()
  {
    let line = LedgerLine { account_id: Uuid::new_v4(), debit: 0, credit: 0, memo: None };
    let other = LedgerLine::credit( Uuid::new_v4(), 0 );
    assert!( validate_lines( &[ line, other ] ).is_err() );
  }

  #[ test ]
  fn single_line_is_rejected()
  {
    assert!( validate_lines( &[ LedgerLine::debit( Uuid::new_v4(), 10 ) ] ).is_err() );
  }

  #[ test ]
  fn display_sign_flips_for_credit_normal_accounts()
  {
    assert!( AccountType::Revenue.display_flips_sign() );
    assert!( AccountType::Liability.display_flips_sign() );
    assert!( AccountType::Equity.display_flips_sign() );
    assert!( !AccountType::Asset.display_flips_sign() );
    assert!( !AccountType::Expense.display_flips_sign() );
  }
}
