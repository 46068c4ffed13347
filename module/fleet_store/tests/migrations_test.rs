//! Migration runner semantics: idempotence and checksum repair.

mod common;

use sqlx::{ PgPool, Row };

use fleet_store::migrations::apply_all_migrations;

#[ sqlx::test( migrations = false ) ]
async fn apply_twice_is_a_no_op( pool: PgPool )
{
  apply_all_migrations( &pool ).await.unwrap();
  apply_all_migrations( &pool ).await.unwrap();

  let applied: i64 = sqlx::query_scalar( "SELECT COUNT(*) FROM schema_migrations" )
    .fetch_one( &pool )
    .await
    .unwrap();
  assert_eq!( applied, 4, "each migration is recorded exactly once" );
}

#[ sqlx::test( migrations = false ) ]
async fn checksum_mismatch_is_repaired_not_fatal( pool: PgPool )
{
  apply_all_migrations( &pool ).await.unwrap();

  // Simulate a database migrated by an older build whose file content
  // has since changed.
  sqlx::query( "UPDATE schema_migrations SET checksum = 'stale' WHERE version = 1" )
    .execute( &pool )
    .await
    .unwrap();

  apply_all_migrations( &pool ).await.unwrap();

  let row = sqlx::query( "SELECT checksum FROM schema_migrations WHERE version = 1" )
    .fetch_one( &pool )
    .await
    .unwrap();
  let checksum: String = row.get( "checksum" );
  assert_ne!( checksum, "stale", "recorded checksum is repaired in place" );
  assert_eq!( checksum.len(), 64 );
}

#[ sqlx::test( migrations = false ) ]
async fn seed_is_idempotent( pool: PgPool )
{
  common::prepare( &pool ).await;
  common::prepare( &pool ).await;

  let accounts: i64 = sqlx::query_scalar( "SELECT COUNT(*) FROM accounts" )
    .fetch_one( &pool )
    .await
    .unwrap();
  assert_eq!( accounts, 10, "chart of accounts seeded exactly once" );

  let roles: i64 = sqlx::query_scalar( "SELECT COUNT(*) FROM roles" )
    .fetch_one( &pool )
    .await
    .unwrap();
  assert_eq!( roles, 5 );

  let methods: i64 = sqlx::query_scalar( "SELECT COUNT(*) FROM payment_methods" )
    .fetch_one( &pool )
    .await
    .unwrap();
  assert_eq!( methods, 2 );
}
