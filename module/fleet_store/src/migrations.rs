//! Versioned migration runner with checksum-repair semantics.
//!
//! Each migration is an embedded SQL file applied inside its own
//! transaction and recorded in `schema_migrations` with a SHA-256
//! checksum. Re-running against an already-migrated database is a no-op;
//! a database whose recorded checksum disagrees with the embedded file
//! (a file edited after it was applied elsewhere) gets the recorded
//! checksum repaired in place instead of failing the boot.

use sha2::{ Digest, Sha256 };
use sqlx::{ PgPool, Row };
use tracing::{ info, warn };

use crate::error::map_db_err;
use fleet_types::{ FleetError, Result };

/// An embedded migration: monotonically increasing version + SQL body.
struct Migration
{
  version: i32,
  name: &'static str,
  sql: &'static str,
}

const MIGRATIONS: &[ Migration ] = &[
  Migration
  {
    version: 1,
    name: "fleet_schema",
    sql: include_str!( "../migrations/001_fleet_schema.sql" ),
  },
  Migration
  {
    version: 2,
    name: "accounting_schema",
    sql: include_str!( "../migrations/002_accounting_schema.sql" ),
  },
  Migration
  {
    version: 3,
    name: "auth_schema",
    sql: include_str!( "../migrations/003_auth_schema.sql" ),
  },
  Migration
  {
    version: 4,
    name: "messaging_schema",
    sql: include_str!( "../migrations/004_messaging_schema.sql" ),
  },
];

fn checksum( sql: &str ) -> String
{
  hex::encode( Sha256::digest( sql.as_bytes() ) )
}

/// Apply every pending migration in order. Idempotent; safe against a
/// partially-migrated database.
///
/// # Errors
///
/// `DATABASE_ERROR` when a migration statement fails; the failing
/// migration's transaction is rolled back and nothing later runs.
pub async fn apply_all_migrations( pool: &PgPool ) -> Result< () >
{
  sqlx::query(
    "CREATE TABLE IF NOT EXISTS schema_migrations
     (
       version INTEGER PRIMARY KEY,
       name TEXT NOT NULL,
       checksum TEXT NOT NULL,
       applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
     )",
  )
  .execute( pool )
  .await
  .map_err( map_db_err )?;

  for migration in MIGRATIONS
  {
    apply_one( pool, migration ).await?;
  }

  Ok( () )
}

async fn apply_one( pool: &PgPool, migration: &Migration ) -> Result< () >
{
  let expected = checksum( migration.sql );

  let recorded: Option< String > = sqlx::query(
    "SELECT checksum FROM schema_migrations WHERE version = $1",
  )
  .bind( migration.version )
  .fetch_optional( pool )
  .await
  .map_err( map_db_err )?
  .map( |row| row.get( "checksum" ) );

  match recorded
  {
    Some( stored ) if stored == expected =>
    {
      // Already applied with the same content.
      Ok( () )
    }
    Some( _ ) =>
    {
      // Applied under an older build whose file has since changed.
      // Repair the bookkeeping rather than refusing to boot.
      warn!(
        version = migration.version,
        name = migration.name,
        "migration checksum mismatch, repairing recorded checksum"
      );
      sqlx::query( "UPDATE schema_migrations SET checksum = $1 WHERE version = $2" )
        .bind( &expected )
        .bind( migration.version )
        .execute( pool )
        .await
        .map_err( map_db_err )?;
      Ok( () )
    }
    None =>
    {
      let mut tx = pool.begin().await.map_err( map_db_err )?;

      sqlx::raw_sql( migration.sql )
        .execute( &mut *tx )
        .await
        .map_err( |e| FleetError::Database( format!(
          "migration {:03}_{} failed: {e}", migration.version, migration.name
        ) ) )?;

      sqlx::query(
        "INSERT INTO schema_migrations (version, name, checksum) VALUES ($1, $2, $3)",
      )
      .bind( migration.version )
      .bind( migration.name )
      .bind( &expected )
      .execute( &mut *tx )
      .await
      .map_err( map_db_err )?;

      tx.commit().await.map_err( map_db_err )?;

      info!( version = migration.version, name = migration.name, "applied migration" );
      Ok( () )
    }
  }
}

#[ cfg( test ) ]
mod tests
{
  use super::*;

  #[ test ]
  fn versions_are_strictly_increasing()
  {
    let mut previous = 0;
    for migration in MIGRATIONS
    {
      assert!(
        migration.version > previous,
        "migration versions must increase: {} after {previous}", migration.version
      );
      previous = migration.version;
    }
  }

  #[ test ]
  fn checksums_differ_per_file()
  {
    let a = checksum( MIGRATIONS[ 0 ].sql );
    let b = checksum( MIGRATIONS[ 1 ].sql );
    assert_ne!( a, b );
    assert_eq!( a.len(), 64 );
  }
}
