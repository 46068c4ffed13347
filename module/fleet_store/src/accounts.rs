//! Chart-of-accounts and ledger storage.
//!
//! `insert_entry` is the one write path for journal entries. The unique
//! `external_reference` is the idempotency anchor: a duplicate insert is
//! detected here and reported distinctly so the posting service can treat
//! it as success.

use chrono::{ DateTime, Utc };
use sqlx::{ PgConnection, Row };
use uuid::Uuid;

use crate::error::{ is_ledger_reference_conflict, map_db_err };
use fleet_types::{ Account, AccountType, FleetError, LedgerEntry, LedgerLine, Result };

const ACCOUNT_COLUMNS: &str =
  "id, code, name, account_type, parent_id, is_active, description, created_at, updated_at";

fn account_from_row( row: &sqlx::postgres::PgRow ) -> Result< Account >
{
  Ok( Account
  {
    id: row.get( "id" ),
    code: row.get( "code" ),
    name: row.get( "name" ),
    account_type: AccountType::parse( row.get( "account_type" ) )?,
    parent_id: row.get( "parent_id" ),
    is_active: row.get( "is_active" ),
    description: row.get( "description" ),
    created_at: row.get( "created_at" ),
    updated_at: row.get( "updated_at" ),
  } )
}

/// Fetch an account by its code.
///
/// # Errors
///
/// `NOT_FOUND` for an unknown code.
pub async fn find_by_code( conn: &mut PgConnection, code: &str ) -> Result< Account >
{
  let query = format!( "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE code = $1" );
  let row = sqlx::query( &query )
    .bind( code )
    .fetch_optional( conn )
    .await
    .map_err( map_db_err )?
    .ok_or_else( || FleetError::NotFound( format!( "account {code}" ) ) )?;
  account_from_row( &row )
}

/// Fetch every active account, ordered by code.
pub async fn list_active( conn: &mut PgConnection ) -> Result< Vec< Account > >
{
  let query = format!( "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE is_active ORDER BY code" );
  let rows = sqlx::query( &query )
    .fetch_all( conn )
    .await
    .map_err( map_db_err )?;
  rows.iter().map( account_from_row ).collect()
}

/// Outcome of a journal-entry insert.
#[ derive( Debug, Clone, Copy, PartialEq, Eq ) ]
pub enum InsertOutcome
{
  /// The entry is new.
  Inserted,
  /// An entry with this external reference already exists.
  Duplicate,
}

/// Insert a journal entry and its lines.
///
/// The caller validated balance already; the deferred trigger re-checks
/// at commit. A duplicate `external_reference` reports
/// [`InsertOutcome::Duplicate`] instead of failing.
pub async fn insert_entry( conn: &mut PgConnection, entry: &LedgerEntry ) -> Result< InsertOutcome >
{
  let inserted = sqlx::query(
    "INSERT INTO ledger_entries (id, entry_number, external_reference, entry_date, description)
     VALUES ($1, $2, $3, $4, $5)",
  )
  .bind( entry.id )
  .bind( &entry.entry_number )
  .bind( &entry.external_reference )
  .bind( entry.entry_date )
  .bind( &entry.description )
  .execute( &mut *conn )
  .await;

  match inserted
  {
    Err( e ) if is_ledger_reference_conflict( &e ) => return Ok( InsertOutcome::Duplicate ),
    Err( e ) => return Err( map_db_err( e ) ),
    Ok( _ ) => {}
  }

  for line in &entry.lines
  {
    sqlx::query(
      "INSERT INTO ledger_entry_lines (entry_id, account_id, debit, credit, memo)
       VALUES ($1, $2, $3, $4, $5)",
    )
    .bind( entry.id )
    .bind( line.account_id )
    .bind( line.debit )
    .bind( line.credit )
    .bind( &line.memo )
    .execute( &mut *conn )
    .await
    .map_err( map_db_err )?;
  }

  Ok( InsertOutcome::Inserted )
}

/// Fetch an entry (with lines) by its external reference.
pub async fn find_by_external_reference(
  conn: &mut PgConnection,
  external_reference: &str,
) -> Result< Option< LedgerEntry > >
{
  let row = sqlx::query(
    "SELECT id, entry_number, external_reference, entry_date, description, created_at
       FROM ledger_entries WHERE external_reference = $1",
  )
  .bind( external_reference )
  .fetch_optional( &mut *conn )
  .await
  .map_err( map_db_err )?;

  let Some( row ) = row else { return Ok( None ) };

  let entry_id: Uuid = row.get( "id" );
  let lines = sqlx::query(
    "SELECT account_id, debit, credit, memo FROM ledger_entry_lines
      WHERE entry_id = $1 ORDER BY id",
  )
  .bind( entry_id )
  .fetch_all( &mut *conn )
  .await
  .map_err( map_db_err )?;

  Ok( Some( LedgerEntry
  {
    id: entry_id,
    entry_number: row.get( "entry_number" ),
    external_reference: row.get( "external_reference" ),
    entry_date: row.get( "entry_date" ),
    description: row.get( "description" ),
    lines: lines.iter().map( |l| LedgerLine
    {
      account_id: l.get( "account_id" ),
      debit: l.get( "debit" ),
      credit: l.get( "credit" ),
      memo: l.get( "memo" ),
    } ).collect(),
    created_at: row.get( "created_at" ),
  } ) )
}

/// Raw balance of one account: Σ debits − Σ credits over entries dated
/// at or before `as_of`.
pub async fn balance_of(
  conn: &mut PgConnection,
  account_id: Uuid,
  as_of: DateTime< Utc >,
) -> Result< i64 >
{
  sqlx::query_scalar(
    "SELECT COALESCE(SUM(l.debit - l.credit), 0)::bigint
       FROM ledger_entry_lines l
       JOIN ledger_entries e ON e.id = l.entry_id
      WHERE l.account_id = $1 AND e.entry_date <= $2",
  )
  .bind( account_id )
  .bind( as_of )
  .fetch_one( conn )
  .await
  .map_err( map_db_err )
}

/// Raw balance of one account restricted to entries whose external
/// reference starts with `reference_prefix`. Reconciliation uses this to
/// isolate, say, the payments of one invoice.
pub async fn balance_of_with_reference_prefix(
  conn: &mut PgConnection,
  account_id: Uuid,
  as_of: DateTime< Utc >,
  reference_prefix: &str,
) -> Result< i64 >
{
  let pattern = format!( "{}%", reference_prefix.replace( '%', "\\%" ).replace( '_', "\\_" ) );
  sqlx::query_scalar(
    "SELECT COALESCE(SUM(l.debit - l.credit), 0)::bigint
       FROM ledger_entry_lines l
       JOIN ledger_entries e ON e.id = l.entry_id
      WHERE l.account_id = $1 AND e.entry_date <= $2
        AND e.external_reference LIKE $3",
  )
  .bind( account_id )
  .bind( as_of )
  .bind( pattern )
  .fetch_one( conn )
  .await
  .map_err( map_db_err )
}

/// Raw balance per account id, for every active account, in one pass.
pub async fn balances_as_of(
  conn: &mut PgConnection,
  as_of: DateTime< Utc >,
) -> Result< Vec< ( Uuid, i64 ) > >
{
  let rows = sqlx::query(
    "SELECT a.id,
            COALESCE(SUM(CASE WHEN e.entry_date <= $1 THEN l.debit - l.credit ELSE 0 END), 0)::bigint
              AS balance
       FROM accounts a
       LEFT JOIN ledger_entry_lines l ON l.account_id = a.id
       LEFT JOIN ledger_entries e ON e.id = l.entry_id
      WHERE a.is_active
      GROUP BY a.id",
  )
  .bind( as_of )
  .fetch_all( conn )
  .await
  .map_err( map_db_err )?;

  Ok( rows.iter().map( |row| ( row.get( "id" ), row.get( "balance" ) ) ).collect() )
}
