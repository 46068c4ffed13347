//! Startup seed data: chart of accounts, role set, payment methods, and
//! an optional bootstrap admin.
//!
//! Every insert is `ON CONFLICT DO NOTHING`, so seeding is idempotent and
//! runs unconditionally after migrations on every boot.

use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::error::map_db_err;
use fleet_types::accounting::codes;
use fleet_types::{ FleetError, Result, Role };

/// The seeded chart: (code, name, type, description).
const CHART_OF_ACCOUNTS: &[ ( &str, &str, &str, &str ) ] = &[
  ( codes::CASH, "Cash", "ASSET", "Cash on hand and in banks" ),
  ( codes::ACCOUNTS_RECEIVABLE, "Accounts Receivable", "ASSET", "Amounts due from customers" ),
  ( codes::GCASH_CLEARING, "GCash Clearing", "ASSET", "GCash settlements in transit" ),
  ( codes::FLEET_VEHICLES, "Fleet Vehicles", "ASSET", "Vehicles at acquisition cost" ),
  ( codes::ACCOUNTS_PAYABLE, "Accounts Payable", "LIABILITY", "Amounts owed to suppliers" ),
  ( codes::OWNER_EQUITY, "Owner Equity", "EQUITY", "Owner capital" ),
  ( codes::RENTAL_REVENUE, "Rental Revenue", "REVENUE", "Vehicle rental income" ),
  ( codes::LATE_FEE_REVENUE, "Late Fee Revenue", "REVENUE", "Late return charges" ),
  ( codes::MAINTENANCE_EXPENSE, "Maintenance Expense", "EXPENSE", "Vehicle upkeep" ),
  ( codes::FUEL_EXPENSE, "Fuel Expense", "EXPENSE", "Fuel purchases" ),
];

/// Payment-method configuration: (code, display name, debited account).
const PAYMENT_METHODS: &[ ( &str, &str, &str ) ] = &[
  ( "CASH", "Cash", codes::CASH ),
  ( "GCASH", "GCash", codes::GCASH_CLEARING ),
];

/// Seed all reference data.
///
/// # Errors
///
/// `DATABASE_ERROR` when an insert fails; seeding runs before the server
/// binds, so a failure aborts the boot.
pub async fn seed_all(
  pool: &PgPool,
  bootstrap_admin: Option< ( &str, &str ) >,
) -> Result< () >
{
  seed_roles( pool ).await?;
  seed_chart_of_accounts( pool ).await?;
  seed_payment_methods( pool ).await?;

  if let Some( ( email, password ) ) = bootstrap_admin
  {
    seed_bootstrap_admin( pool, email, password ).await?;
  }

  Ok( () )
}

async fn seed_roles( pool: &PgPool ) -> Result< () >
{
  for role in [ Role::Admin, Role::FleetManager, Role::RentalAgent, Role::FinanceOwner, Role::Customer ]
  {
    sqlx::query( "INSERT INTO roles (name) VALUES ($1) ON CONFLICT (name) DO NOTHING" )
      .bind( role.as_str() )
      .execute( pool )
      .await
      .map_err( map_db_err )?;
  }
  Ok( () )
}

async fn seed_chart_of_accounts( pool: &PgPool ) -> Result< () >
{
  for ( code, name, account_type, description ) in CHART_OF_ACCOUNTS
  {
    sqlx::query(
      "INSERT INTO accounts (id, code, name, account_type, description)
       VALUES ($1, $2, $3, $4, $5)
       ON CONFLICT (code) DO NOTHING",
    )
    .bind( Uuid::new_v4() )
    .bind( code )
    .bind( name )
    .bind( account_type )
    .bind( description )
    .execute( pool )
    .await
    .map_err( map_db_err )?;
  }
  info!( accounts = CHART_OF_ACCOUNTS.len(), "chart of accounts seeded" );
  Ok( () )
}

async fn seed_payment_methods( pool: &PgPool ) -> Result< () >
{
  for ( code, display_name, target_account_code ) in PAYMENT_METHODS
  {
    sqlx::query(
      "INSERT INTO payment_methods (code, display_name, target_account_code)
       VALUES ($1, $2, $3)
       ON CONFLICT (code) DO NOTHING",
    )
    .bind( code )
    .bind( display_name )
    .bind( target_account_code )
    .execute( pool )
    .await
    .map_err( map_db_err )?;
  }
  Ok( () )
}

async fn seed_bootstrap_admin( pool: &PgPool, email: &str, password: &str ) -> Result< () >
{
  let password_hash = bcrypt::hash( password, bcrypt::DEFAULT_COST )
    .map_err( |e| FleetError::Internal( format!( "bootstrap admin hash failed: {e}" ) ) )?;

  let inserted = sqlx::query(
    "INSERT INTO app_users (id, email, password_hash, roles)
     VALUES ($1, $2, $3, $4)
     ON CONFLICT (email) DO NOTHING",
  )
  .bind( Uuid::new_v4() )
  .bind( email )
  .bind( &password_hash )
  .bind( vec![ Role::Admin.as_str().to_string() ] )
  .execute( pool )
  .await
  .map_err( map_db_err )?;

  if inserted.rows_affected() > 0
  {
    info!( email, "bootstrap admin created" );
  }
  Ok( () )
}
