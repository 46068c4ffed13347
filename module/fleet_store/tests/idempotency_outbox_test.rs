//! Idempotency-record lifecycle and outbox/inbox scaffolding.

mod common;

use chrono::{ Duration, Utc };
use sqlx::PgPool;
use uuid::Uuid;

use fleet_store::idempotency::{ self, ReserveOutcome };
use fleet_store::{ housekeeping, outbox };
use fleet_types::{ IdempotencyRecord, OutboxEvent };

#[ sqlx::test( migrations = false ) ]
async fn reserve_finalize_replay_lifecycle( pool: PgPool )
{
  common::prepare( &pool ).await;
  let mut conn = pool.acquire().await.unwrap();
  let expires = IdempotencyRecord::expiry_for( Utc::now(), 60 );

  let first = idempotency::reserve( &mut *conn, "k1", "/v1/x", "POST", Some( "fp" ), expires )
    .await
    .unwrap();
  assert!( matches!( first, ReserveOutcome::Reserved ) );

  // A concurrent duplicate sees the in-progress reservation.
  let racing = idempotency::reserve( &mut *conn, "k1", "/v1/x", "POST", Some( "fp" ), expires )
    .await
    .unwrap();
  match racing
  {
    ReserveOutcome::Existing( record ) => assert!( !record.is_finalized() ),
    ReserveOutcome::Reserved => panic!( "duplicate reservation must not win" ),
  }

  idempotency::finalize( &mut *conn, "k1", 200, r#"{"success":true}"# ).await.unwrap();

  let replayed = idempotency::reserve( &mut *conn, "k1", "/v1/x", "POST", Some( "fp" ), expires )
    .await
    .unwrap();
  match replayed
  {
    ReserveOutcome::Existing( record ) =>
    {
      assert_eq!( record.response_status, Some( 200 ) );
      assert_eq!( record.response_body.as_deref(), Some( r#"{"success":true}"# ) );
    }
    ReserveOutcome::Reserved => panic!( "finalized key must replay" ),
  }
}

#[ sqlx::test( migrations = false ) ]
async fn release_frees_an_unfinalized_key( pool: PgPool )
{
  common::prepare( &pool ).await;
  let mut conn = pool.acquire().await.unwrap();
  let expires = IdempotencyRecord::expiry_for( Utc::now(), 60 );

  idempotency::reserve( &mut *conn, "k2", "/v1/x", "POST", None, expires ).await.unwrap();
  idempotency::release( &mut *conn, "k2" ).await.unwrap();

  let retried = idempotency::reserve( &mut *conn, "k2", "/v1/x", "POST", None, expires )
    .await
    .unwrap();
  assert!( matches!( retried, ReserveOutcome::Reserved ), "released key is fresh again" );
}

#[ sqlx::test( migrations = false ) ]
async fn purge_evicts_only_expired_records( pool: PgPool )
{
  common::prepare( &pool ).await;
  let mut conn = pool.acquire().await.unwrap();
  let now = Utc::now();

  idempotency::reserve( &mut *conn, "dead", "/v1/x", "POST", None, now - Duration::minutes( 1 ) )
    .await
    .unwrap();
  idempotency::reserve( &mut *conn, "alive", "/v1/x", "POST", None, now + Duration::minutes( 60 ) )
    .await
    .unwrap();
  drop( conn );

  let ( evicted, _tokens ) = housekeeping::purge_expired( &pool, now ).await.unwrap();
  assert_eq!( evicted, 1 );

  let mut conn = pool.acquire().await.unwrap();
  let expires = IdempotencyRecord::expiry_for( now, 60 );
  let dead = idempotency::reserve( &mut *conn, "dead", "/v1/x", "POST", None, expires )
    .await
    .unwrap();
  assert!( matches!( dead, ReserveOutcome::Reserved ) );
  let alive = idempotency::reserve( &mut *conn, "alive", "/v1/x", "POST", None, expires )
    .await
    .unwrap();
  assert!( matches!( alive, ReserveOutcome::Existing( _ ) ) );
}

fn event( aggregate_id: Uuid, event_type: &str ) -> OutboxEvent
{
  OutboxEvent
  {
    id: Uuid::new_v4(),
    aggregate_type: "rental".to_string(),
    aggregate_id,
    event_type: event_type.to_string(),
    payload: serde_json::json!( { "k": "v" } ),
    created_at: Utc::now(),
    published_at: None,
  }
}

#[ sqlx::test( migrations = false ) ]
async fn outbox_drains_in_insertion_order( pool: PgPool )
{
  common::prepare( &pool ).await;
  let mut conn = pool.acquire().await.unwrap();
  let aggregate = Uuid::new_v4();

  let first = event( aggregate, "rental.reserved" );
  let second = event( aggregate, "rental.activated" );
  outbox::append( &mut *conn, &first ).await.unwrap();
  outbox::append( &mut *conn, &second ).await.unwrap();

  let pending = outbox::fetch_unpublished( &mut *conn, 10 ).await.unwrap();
  assert_eq!( pending.len(), 2 );
  assert_eq!( pending[ 0 ].event_type, "rental.reserved" );
  assert_eq!( pending[ 1 ].event_type, "rental.activated" );

  outbox::mark_published( &mut *conn, first.id, Utc::now() ).await.unwrap();
  let remaining = outbox::fetch_unpublished( &mut *conn, 10 ).await.unwrap();
  assert_eq!( remaining.len(), 1 );
  assert_eq!( remaining[ 0 ].id, second.id );
}

#[ sqlx::test( migrations = false ) ]
async fn inbox_deduplicates_by_message_and_group( pool: PgPool )
{
  common::prepare( &pool ).await;
  let mut conn = pool.acquire().await.unwrap();
  let message = Uuid::new_v4();

  assert!( outbox::inbox_mark_processed( &mut *conn, message, "billing" ).await.unwrap() );
  assert!( !outbox::inbox_mark_processed( &mut *conn, message, "billing" ).await.unwrap() );
  // A different consumer group still processes the same message.
  assert!( outbox::inbox_mark_processed( &mut *conn, message, "notifications" ).await.unwrap() );
}
